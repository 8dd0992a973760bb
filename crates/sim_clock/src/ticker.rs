// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::sync::mpsc as std_mpsc;
use std::task::Poll;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use futures::StreamExt;
use futures::future::{self, Either};
use tick::{Clock, PeriodicTimer};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::mpsc::WeakSender;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::envelope::{Envelope, Request};

const THREAD_NAME: &str = "sim-clock-ticker";

/// Feeds automatic steps into the stepper's input queue while the measured policy is active.
///
/// The feeder runs on its own thread and never touches the stepper state; it only enqueues
/// [`Request::AutoStep`] messages stamped with the epoch it was started in.
#[derive(Debug)]
pub(crate) struct Ticker {
    stop: oneshot::Sender<()>,
    feeder: JoinHandle<()>,
}

impl Ticker {
    /// Starts the feeder and returns once its timer is registered with `clock`.
    pub(crate) fn start(
        clock: &Clock,
        period: Duration,
        epoch: i64,
        queue: WeakSender<Request>,
    ) -> std::io::Result<Self> {
        let (stop, stopped) = oneshot::channel();
        let (armed_tx, armed_rx) = std_mpsc::sync_channel(1);
        let clock = clock.clone();

        let feeder = thread::Builder::new().name(THREAD_NAME.into()).spawn(move || {
            futures::executor::block_on(feed(&clock, period, epoch, &queue, stopped, armed_tx));
        })?;

        // An error means the feeder is already gone, which `stop` reports when joining.
        let _armed = armed_rx.recv();
        debug!(epoch, period_ms = period.as_millis(), "automatic ticker started");

        Ok(Self { stop, feeder })
    }

    /// Signals the feeder to stop and waits for its thread to exit.
    ///
    /// Once this returns no further automatic step can be enqueued by this ticker.
    pub(crate) fn stop(self) -> thread::Result<()> {
        let Self { stop, feeder } = self;
        // The feeder may have exited on its own already, in which case nobody listens.
        let _listening = stop.send(());
        feeder.join()?;
        debug!("automatic ticker stopped");
        Ok(())
    }
}

async fn feed(
    clock: &Clock,
    period: Duration,
    epoch: i64,
    queue: &WeakSender<Request>,
    mut stopped: oneshot::Receiver<()>,
    armed: std_mpsc::SyncSender<()>,
) {
    let mut timer = PeriodicTimer::new(clock, period);

    // The first poll registers the timer, so firings that happen after `start` returns are not lost.
    let first = future::poll_fn(|cx| Poll::Ready(timer.poll_next_unpin(cx))).await;
    let _starter_waiting = armed.send(());
    drop(armed);

    if matches!(first, Poll::Ready(Some(()))) && !enqueue(queue, epoch) {
        return;
    }

    loop {
        match future::select(&mut stopped, timer.next()).await {
            Either::Left(_) | Either::Right((None, _)) => return,
            Either::Right((Some(()), _)) => {
                if !enqueue(queue, epoch) {
                    return;
                }
            }
        }
    }
}

/// Returns `false` once the stepper is gone and feeding should end.
fn enqueue(queue: &WeakSender<Request>, epoch: i64) -> bool {
    let Some(queue) = queue.upgrade() else {
        return false;
    };

    match queue.try_send(Request::AutoStep {
        envelope: Envelope::detached(),
        epoch,
    }) {
        Ok(()) => true,
        Err(TrySendError::Full(_)) => {
            warn!(epoch, "stepper input queue is full, dropping an automatic step");
            true
        }
        Err(TrySendError::Closed(_)) => false,
    }
}
