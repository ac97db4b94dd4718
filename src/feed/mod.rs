// src/feed/mod.rs

//! Per-run event feed.
//!
//! An ordered, append-only log of state transitions. Only the run state store
//! appends (while holding its own lock, so feed order matches transition
//! order); everyone else reads:
//! - [`EventFeed::events`] / [`EventFeed::events_since`] for polling,
//! - [`EventFeed::subscribe`] for live updates,
//! - [`jsonl`] to stream the feed into a JSON-lines file.

pub mod jsonl;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

use crate::state::{RunStatus, StepState};
use crate::types::{RunId, StepName};

const LIVE_CAPACITY: usize = 1024;

/// What happened.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FeedEventKind {
    StepTransition {
        step: StepName,
        from: StepState,
        to: StepState,
        #[serde(skip_serializing_if = "Option::is_none")]
        detail: Option<String>,
    },
    RunStatusChanged {
        from: RunStatus,
        to: RunStatus,
    },
}

/// One entry of the feed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedEvent {
    /// Position in the feed, starting at 1.
    pub seq: u64,
    pub run_id: RunId,
    pub at: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: FeedEventKind,
}

impl FeedEvent {
    /// True for the event that moves the run into a terminal status.
    pub fn is_run_finished(&self) -> bool {
        matches!(self.kind, FeedEventKind::RunStatusChanged { to, .. } if to.is_terminal())
    }
}

#[derive(Debug)]
struct FeedLog {
    events: Vec<FeedEvent>,
    live: broadcast::Sender<FeedEvent>,
}

/// Shared handle to a run's feed.
#[derive(Debug, Clone)]
pub struct EventFeed {
    run_id: RunId,
    inner: Arc<Mutex<FeedLog>>,
}

impl EventFeed {
    pub fn new(run_id: RunId) -> Self {
        let (live, _) = broadcast::channel(LIVE_CAPACITY);
        Self {
            run_id,
            inner: Arc::new(Mutex::new(FeedLog {
                events: Vec::new(),
                live,
            })),
        }
    }

    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    /// Append an event stamped with the next sequence number.
    pub(crate) fn append(&self, kind: FeedEventKind, at: DateTime<Utc>) -> FeedEvent {
        let mut log = self.lock();
        let event = FeedEvent {
            seq: log.events.len() as u64 + 1,
            run_id: self.run_id,
            at,
            kind,
        };
        log.events.push(event.clone());
        // No live subscribers is fine.
        let _ = log.live.send(event.clone());
        event
    }

    /// Every event so far, oldest first.
    pub fn events(&self) -> Vec<FeedEvent> {
        self.lock().events.clone()
    }

    /// Events with `seq > after`.
    pub fn events_since(&self, after: u64) -> Vec<FeedEvent> {
        let log = self.lock();
        let start = (after as usize).min(log.events.len());
        log.events[start..].to_vec()
    }

    pub fn len(&self) -> usize {
        self.lock().events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Live updates from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<FeedEvent> {
        self.lock().live.subscribe()
    }

    /// Backlog plus a live receiver, with no gap and no duplicate between
    /// the two.
    pub fn subscribe_with_backlog(&self) -> (Vec<FeedEvent>, broadcast::Receiver<FeedEvent>) {
        let log = self.lock();
        (log.events.clone(), log.live.subscribe())
    }

    fn lock(&self) -> MutexGuard<'_, FeedLog> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
