//! In-memory audit journal, mirrored to persistence (spec §4.8).
//!
//! Distinct from `tracing`'s free-text operator log: every domain mutation
//! pairs with one structured [`backsim_models::Event`] here. The persistence
//! mirror is best-effort — a failed `insert_event_log` is logged via
//! `tracing` and otherwise swallowed, it never aborts the caller's minute
//! loop (see `backsim-engine`'s `mark_persistence_error`, which is the path
//! actually responsible for halting a run on a *write-path* failure).

use serde_json::Value;

use backsim_db::Persistence;
use backsim_models::{Event, EventKind};

/// The in-memory journal plus its best-effort persistence mirror.
#[derive(Default)]
pub struct Logger {
    journal: Vec<Event>,
}

impl Logger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn journal(&self) -> &[Event] {
        &self.journal
    }

    /// Appends `kind` to the in-memory journal and mirrors it to
    /// `persistence`. The mirror's failure is logged and otherwise ignored.
    pub async fn log(
        &mut self,
        kind: EventKind,
        ts: i64,
        investor_fk: i64,
        op_id: Option<i64>,
        detail: Value,
        persistence: &dyn Persistence,
    ) -> Event {
        let event = Event::new(kind, ts, investor_fk, op_id, detail);
        self.journal.push(event.clone());

        if let Err(err) = persistence.insert_event_log(&event).await {
            tracing::warn!(kind = kind.as_str(), investor_fk, error = %err, "audit persist mirror failed, continuing");
        }

        event
    }
}
