// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::thread::{self, JoinHandle};

use sim_fsm::Message;
use tokio::sync::mpsc;
use tracing::{debug, error, info_span, trace, warn};

use crate::envelope::Request;
use crate::machine::{StateName, StepperMachine};

const THREAD_NAME: &str = "sim-clock-stepper";

/// Spawns the thread that owns the state machine and processes requests one at a time.
///
/// The thread exits once every sender of the queue has been dropped.
pub(crate) fn spawn(machine: StepperMachine, queue: mpsc::Receiver<Request>) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new().name(THREAD_NAME.into()).spawn(move || {
        let _span = info_span!("stepper").entered();
        run(machine, queue);
    })
}

fn run(mut machine: StepperMachine, mut queue: mpsc::Receiver<Request>) {
    debug!(state = ?machine.current(), "stepper worker started");

    while let Some(request) = queue.blocking_recv() {
        process(&mut machine, request);
    }

    machine.data_mut().shutdown();
    debug!(
        state = ?machine.current(),
        latest = machine.data().latest(),
        epoch = machine.data().epoch(),
        "stepper worker stopped"
    );
}

fn process(machine: &mut StepperMachine, request: Request) {
    let span = request.envelope().span().clone();
    let _entered = span.enter();
    trace!(tag = ?request.tag(), state = ?machine.current(), "processing request");

    if let Err(e) = machine.receive(request) {
        if e.is_fatal() {
            error!(error = %e, state = ?machine.current(), "stepper state machine failed, entering the faulted state");
            if let Err(e) = machine.change_state(StateName::Faulted) {
                error!(error = %e, "failed to enter the faulted state");
            }
        } else {
            warn!(error = %e, state = ?machine.current(), "state transition hook failed");
        }
    }

    machine.data_mut().flush_replies();
}
