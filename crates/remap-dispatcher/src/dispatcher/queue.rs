//! Time-ordered entry queue owned by a dispatcher.

use std::{collections::BTreeMap, mem, time::Duration};

use crate::{ObjectIdValue, TimePoint};

/// Boxed closure executed on the worker thread.
pub(crate) type Job = Box<dyn FnOnce() + Send + 'static>;

/// Due time of a queued entry.
///
/// Variant order is execution order: detach cleanups run ahead of everything,
/// then untimed work, then timed work by time point.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) enum When {
    /// Reserved for `detach_with` cleanups.
    Detached,
    /// Due as soon as the worker gets to it.
    Immediately,
    /// Due once the time source reads at least this value.
    At(TimePoint),
}

/// One scheduled closure.
pub(crate) struct Entry {
    /// Value of the id that must still be attached when the job runs.
    pub(crate) owner: ObjectIdValue,
    /// The work itself.
    pub(crate) job: Job,
}

/// What the worker should do next.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Wait {
    /// Nothing can become due without being woken.
    Idle,
    /// The front entry is due now.
    Ready,
    /// The front entry becomes due after this long.
    For(Duration),
}

/// Decide how long the worker may sleep given the earliest due time and the clock.
///
/// `now` is `None` once the time source has been dropped; timed entries then never
/// become due on their own.
pub(crate) fn wait_for(next: Option<When>, now: Option<TimePoint>) -> Wait {
    match (next, now) {
        (None, _) => Wait::Idle,
        (Some(When::Detached | When::Immediately), _) => Wait::Ready,
        (Some(When::At(_)), None) => Wait::Idle,
        (Some(When::At(due)), Some(now)) if due <= now => Wait::Ready,
        (Some(When::At(due)), Some(now)) => Wait::For(due.saturating_duration_since(now)),
    }
}

/// Entries keyed by due time with insertion order as the tie-break.
#[derive(Default)]
pub(crate) struct Queue {
    /// Pending entries; the first key is the next to run.
    entries: BTreeMap<(When, u64), Entry>,
    /// Sequence number for the next insertion.
    next_seq: u64,
    /// Set by `terminate`; the worker exits when it observes this.
    pub(crate) exit: bool,
}

impl Queue {
    /// Insert `job` for `owner`, due at `when`.
    pub(crate) fn push(&mut self, owner: ObjectIdValue, when: When, job: Job) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.insert((when, seq), Entry { owner, job });
    }

    /// Due time of the front entry.
    pub(crate) fn next_due(&self) -> Option<When> {
        self.entries.keys().next().map(|(when, _)| *when)
    }

    /// Remove and return the front entry.
    pub(crate) fn pop_front(&mut self) -> Option<Entry> {
        self.entries.pop_first().map(|(_, entry)| entry)
    }

    /// Remove every entry owned by `owner`.
    ///
    /// The removed entries are returned so the caller can drop them after releasing
    /// the queue lock.
    pub(crate) fn remove_owner(&mut self, owner: ObjectIdValue) -> Vec<Entry> {
        let keys: Vec<(When, u64)> = self
            .entries
            .iter()
            .filter(|(_, e)| e.owner == owner)
            .map(|(k, _)| *k)
            .collect();
        keys.into_iter()
            .filter_map(|k| self.entries.remove(&k))
            .collect()
    }

    /// Remove all entries.
    pub(crate) fn take_all(&mut self) -> Vec<Entry> {
        let entries = mem::take(&mut self.entries);
        entries.into_values().collect()
    }

    /// Number of pending entries.
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}
