// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::collections::BTreeMap;

use crate::envelope::Envelope;

/// Callers blocked in a delay, ordered by the tick they wait for.
///
/// Callers that share a due tick are kept together; their relative order is not significant.
#[derive(Debug, Default)]
pub(crate) struct Waiters {
    by_due: BTreeMap<i64, Vec<Envelope>>,
    len: usize,
}

impl Waiters {
    pub(crate) fn add(&mut self, due: i64, envelope: Envelope) {
        self.by_due.entry(due).or_default().push(envelope);
        self.len += 1;
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The smallest due tick among all waiters.
    pub(crate) fn first_due(&self) -> Option<i64> {
        self.by_due.first_key_value().map(|(due, _)| *due)
    }

    /// Removes and returns every waiter whose due tick is at or before `latest`.
    pub(crate) fn take_expired(&mut self, latest: i64) -> Vec<Envelope> {
        let mut expired = Vec::new();
        while let Some(entry) = self.by_due.first_entry() {
            if *entry.key() > latest {
                break;
            }
            expired.extend(entry.remove());
        }
        self.len -= expired.len();
        expired
    }

    /// Removes and returns every waiter regardless of its due tick.
    pub(crate) fn take_all(&mut self) -> Vec<Envelope> {
        self.len = 0;
        std::mem::take(&mut self.by_due).into_values().flatten().collect()
    }
}
