//! Convergence polling after a mutating call.
//!
//! A poll re-reads the registry on a fixed interval until a predicate over
//! the instance record holds or the attempt budget runs out. Every read is
//! pushed to the event sink so optimistic UI state gets corrected as soon as
//! the daemon reports something.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::application::ports::{EventSink, InstanceInspector, PollOutcome, SessionEvent};
use crate::application::services::registry::list_instances;
use crate::domain::{Instance, InstanceState};

/// Interval and budget for one poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

/// Outstanding polls keyed by lower-cased instance name.
///
/// Starting a poll for a name supersedes any poll already running for it;
/// the older one notices at its next tick and stops.
#[derive(Debug, Default)]
pub struct PollRegistry {
    generations: Mutex<HashMap<String, Arc<AtomicU64>>>,
}

/// Handle held by a running poll.
#[derive(Debug)]
pub struct PollTicket {
    name: String,
    generation: u64,
    counter: Arc<AtomicU64>,
}

impl PollTicket {
    #[must_use]
    pub fn is_current(&self) -> bool {
        self.counter.load(Ordering::SeqCst) == self.generation
    }
}

impl PollRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new poll for `name`, superseding any older one.
    pub fn begin(&self, name: &str) -> PollTicket {
        let counter = {
            let mut map = self
                .generations
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            Arc::clone(map.entry(name.to_lowercase()).or_default())
        };
        let generation = counter.fetch_add(1, Ordering::SeqCst) + 1;
        PollTicket {
            name: name.to_lowercase(),
            generation,
            counter,
        }
    }

    /// Release `ticket`. The entry for its name is dropped only while the
    /// ticket is still current, so a newer poll keeps its slot.
    pub fn finish(&self, ticket: PollTicket) {
        let mut map = self
            .generations
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let owned = map
            .get(&ticket.name)
            .is_some_and(|c| Arc::ptr_eq(c, &ticket.counter) && ticket.is_current());
        if owned {
            map.remove(&ticket.name);
        }
    }

    /// Number of names with a registered poll.
    #[must_use]
    pub fn outstanding(&self) -> usize {
        self.generations
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }
}

/// Done-predicate: the instance exists in `state`.
pub fn reaches(state: InstanceState) -> impl Fn(Option<&Instance>) -> bool {
    move |inst| inst.is_some_and(|i| i.state == state)
}

/// Done-predicate: running with an address.
#[must_use]
pub fn reachable() -> impl Fn(Option<&Instance>) -> bool {
    |inst: Option<&Instance>| inst.is_some_and(Instance::is_reachable)
}

/// Done-predicate: the instance is gone from both lists.
#[must_use]
pub fn gone() -> impl Fn(Option<&Instance>) -> bool {
    |inst: Option<&Instance>| inst.is_none()
}

/// Poll until `done` holds for `name`.
///
/// Each tick sleeps `interval`, then reads once. Exactly
/// `min(ticks until done, max_attempts)` reads happen. A failed read uses up
/// its attempt and is still emitted, but it is not an observation: `done` is
/// not consulted and the last observed record is kept. When `ticket` is
/// superseded the poll stops before its next read.
pub async fn poll_until(
    mp: &impl InstanceInspector,
    events: &impl EventSink,
    name: &str,
    done: impl Fn(Option<&Instance>) -> bool,
    policy: PollPolicy,
    ticket: Option<&PollTicket>,
) -> PollOutcome {
    let mut last: Option<Instance> = None;

    for attempt in 1..=policy.max_attempts {
        tokio::time::sleep(policy.interval).await;

        if ticket.is_some_and(|t| !t.is_current()) {
            tracing::debug!(name, attempt, "poll superseded");
            return PollOutcome::Superseded {
                attempts: attempt - 1,
            };
        }

        let lists = list_instances(mp).await;
        if let Some(err) = &lists.error {
            tracing::debug!(name, attempt, kind = ?err.kind, "poll tick read failed");
            events.emit(SessionEvent::Snapshot(lists));
            continue;
        }
        let found = lists.find(name).cloned();
        tracing::debug!(
            name,
            attempt,
            state = ?found.as_ref().map(|i| i.state.as_str()),
            "poll tick"
        );
        events.emit(SessionEvent::Snapshot(lists));

        if done(found.as_ref()) {
            return PollOutcome::Converged {
                attempts: attempt,
                instance: found,
            };
        }
        last = found;
    }

    tracing::warn!(name, attempts = policy.max_attempts, "poll budget exhausted");
    PollOutcome::TimedOut {
        attempts: policy.max_attempts,
        last,
    }
}
