// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Debouncing driven by explicit instants. Nothing here sleeps or spawns;
//! the event loop asks for due commits with the current time.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::ids::TableId;
use crate::scope::ColumnScope;

#[derive(Debug, Clone, PartialEq)]
struct Pending<T> {
    value: T,
    deadline: Instant,
    token: u64,
}

/// Holds at most one pending value. Each push replaces the value and moves
/// the deadline; only the last value of a burst is ever fired.
#[derive(Debug, Clone, PartialEq)]
pub struct Debouncer<T> {
    delay: Duration,
    pending: Option<Pending<T>>,
    generation: u64,
}

impl<T> Debouncer<T> {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
            generation: 0,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Stores `value` to fire one delay after `now`. Returns the token of the
    /// new timer; any earlier timer is superseded.
    pub fn push(&mut self, value: T, now: Instant) -> u64 {
        self.generation += 1;
        self.pending = Some(Pending {
            value,
            deadline: now + self.delay,
            token: self.generation,
        });
        self.generation
    }

    pub fn cancel(&mut self) -> Option<T> {
        self.pending.take().map(|pending| pending.value)
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn pending(&self) -> Option<&T> {
        self.pending.as_ref().map(|pending| &pending.value)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|pending| pending.deadline)
    }

    pub fn token(&self) -> Option<u64> {
        self.pending.as_ref().map(|pending| pending.token)
    }

    /// Takes the pending value once its deadline has passed.
    pub fn fire(&mut self, now: Instant) -> Option<T> {
        match &self.pending {
            Some(pending) if pending.deadline <= now => self.cancel(),
            _ => None,
        }
    }
}

/// An input source that owns its own timer. Filter inputs are keyed by the
/// column they edit; `None` is the shared filter input.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Control {
    Sort(String),
    Filter(Option<String>),
    Scope,
    Refresh,
}

impl Control {
    pub fn is_filter(&self) -> bool {
        matches!(self, Self::Filter(_))
    }
}

/// The state transition a timer commits when it fires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingCommit {
    Sort {
        column: String,
        descending: bool,
        multi: bool,
    },
    Filter {
        column: Option<String>,
        value: String,
    },
    Scope(ColumnScope),
    Refresh,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DueCommit {
    pub table: TableId,
    pub control: Control,
    pub commit: PendingCommit,
}

/// One debouncer per (table, control) pair.
#[derive(Debug, Clone)]
pub struct DebounceCoordinator {
    delay: Duration,
    slots: BTreeMap<(TableId, Control), Debouncer<PendingCommit>>,
}

impl DebounceCoordinator {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            slots: BTreeMap::new(),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn schedule(
        &mut self,
        table: &TableId,
        control: Control,
        commit: PendingCommit,
        now: Instant,
    ) -> u64 {
        let delay = self.delay;
        let slot = self
            .slots
            .entry((table.clone(), control.clone()))
            .or_insert_with(|| Debouncer::new(delay));
        let superseded = slot.is_pending();
        let token = slot.push(commit, now);
        debug!(%table, ?control, token, superseded, "debounce scheduled");
        token
    }

    pub fn pending(&self, table: &TableId, control: &Control) -> Option<&PendingCommit> {
        self.slots
            .get(&(table.clone(), control.clone()))
            .and_then(Debouncer::pending)
    }

    pub fn cancel(&mut self, table: &TableId, control: &Control) -> Option<PendingCommit> {
        self.slots
            .remove(&(table.clone(), control.clone()))
            .and_then(|mut slot| slot.cancel())
    }

    /// Drops every in-flight filter keystroke for `table`.
    pub fn cancel_filters(&mut self, table: &TableId) -> usize {
        self.cancel_where(|key| &key.0 == table && key.1.is_filter())
    }

    /// Cancels every timer owned by `table`.
    pub fn teardown(&mut self, table: &TableId) -> usize {
        let cancelled = self.cancel_where(|key| &key.0 == table);
        if cancelled > 0 {
            debug!(%table, cancelled, "debounce timers torn down");
        }
        cancelled
    }

    pub fn has_pending(&self, table: &TableId) -> bool {
        self.slots
            .iter()
            .any(|((owner, _), slot)| owner == table && slot.is_pending())
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.slots.values().filter_map(Debouncer::deadline).min()
    }

    /// Removes and returns every commit whose deadline has passed, earliest
    /// deadline first.
    pub fn due(&mut self, now: Instant) -> Vec<DueCommit> {
        let mut fired = Vec::new();
        for ((table, control), slot) in &mut self.slots {
            let Some(deadline) = slot.deadline() else {
                continue;
            };
            if let Some(commit) = slot.fire(now) {
                fired.push((
                    deadline,
                    DueCommit {
                        table: table.clone(),
                        control: control.clone(),
                        commit,
                    },
                ));
            }
        }
        self.slots.retain(|_, slot| slot.is_pending());
        fired.sort_by_key(|(deadline, _)| *deadline);
        fired.into_iter().map(|(_, due)| due).collect()
    }

    fn cancel_where(&mut self, matches: impl Fn(&(TableId, Control)) -> bool) -> usize {
        let before = self.slots.len();
        self.slots.retain(|key, _| !matches(key));
        before - self.slots.len()
    }
}

#[cfg(test)]
mod tests {
    use super::{Control, DebounceCoordinator, Debouncer, PendingCommit};
    use crate::TableId;
    use std::time::{Duration, Instant};

    const DELAY: Duration = Duration::from_millis(1500);

    fn filter(value: &str) -> PendingCommit {
        PendingCommit::Filter {
            column: None,
            value: value.to_owned(),
        }
    }

    #[test]
    fn debouncer_fires_only_after_the_deadline() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(DELAY);
        debouncer.push("a", start);
        assert_eq!(debouncer.fire(start + Duration::from_millis(1499)), None);
        assert_eq!(debouncer.fire(start + DELAY), Some("a"));
        assert!(!debouncer.is_pending());
    }

    #[test]
    fn debouncer_push_supersedes_the_previous_timer() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(DELAY);
        let first = debouncer.push("a", start);
        let second = debouncer.push("ab", start + Duration::from_millis(1000));
        assert_ne!(first, second);
        assert_eq!(debouncer.token(), Some(second));
        assert_eq!(debouncer.fire(start + DELAY), None);
        assert_eq!(
            debouncer.fire(start + Duration::from_millis(2500)),
            Some("ab")
        );
    }

    #[test]
    fn bursts_coalesce_into_one_commit_with_the_last_value() {
        let start = Instant::now();
        let table = TableId::users();
        let mut coordinator = DebounceCoordinator::new(DELAY);
        for (offset, value) in [(0, "l"), (300, "le"), (900, "lea")] {
            coordinator.schedule(
                &table,
                Control::Filter(None),
                filter(value),
                start + Duration::from_millis(offset),
            );
        }

        assert!(coordinator.due(start + DELAY).is_empty());
        let due = coordinator.due(start + Duration::from_millis(2400));
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].commit, filter("lea"));
        assert!(!coordinator.has_pending(&table));
    }

    #[test]
    fn controls_fire_independently_in_deadline_order() {
        let start = Instant::now();
        let table = TableId::elements();
        let mut coordinator = DebounceCoordinator::new(DELAY);
        coordinator.schedule(
            &table,
            Control::Sort("name".to_owned()),
            PendingCommit::Sort {
                column: "name".to_owned(),
                descending: false,
                multi: false,
            },
            start + Duration::from_millis(100),
        );
        coordinator.schedule(&table, Control::Filter(None), filter("he"), start);

        assert_eq!(coordinator.next_deadline(), Some(start + DELAY));
        let due = coordinator.due(start + Duration::from_secs(2));
        let controls = due.iter().map(|due| due.control.clone()).collect::<Vec<_>>();
        assert_eq!(
            controls,
            vec![Control::Filter(None), Control::Sort("name".to_owned())]
        );
    }

    #[test]
    fn teardown_cancels_only_the_owning_table() {
        let start = Instant::now();
        let users = TableId::users();
        let elements = TableId::elements();
        let mut coordinator = DebounceCoordinator::new(DELAY);
        coordinator.schedule(&users, Control::Filter(None), filter("a"), start);
        coordinator.schedule(&users, Control::Scope, PendingCommit::Refresh, start);
        coordinator.schedule(&elements, Control::Filter(None), filter("b"), start);

        assert_eq!(coordinator.teardown(&users), 2);
        assert!(!coordinator.has_pending(&users));
        let due = coordinator.due(start + DELAY);
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].table, elements);
    }

    #[test]
    fn cancel_filters_leaves_other_controls() {
        let start = Instant::now();
        let table = TableId::users();
        let mut coordinator = DebounceCoordinator::new(DELAY);
        coordinator.schedule(&table, Control::Filter(None), filter("a"), start);
        coordinator.schedule(
            &table,
            Control::Filter(Some("name".to_owned())),
            filter("b"),
            start,
        );
        coordinator.schedule(&table, Control::Refresh, PendingCommit::Refresh, start);

        assert_eq!(coordinator.cancel_filters(&table), 2);
        assert!(coordinator.has_pending(&table));
        assert_eq!(
            coordinator.pending(&table, &Control::Refresh),
            Some(&PendingCommit::Refresh)
        );
    }
}
