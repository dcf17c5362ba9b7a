//! Registry of open stream sessions.
//!
//! Insert and remove are O(1); publishing never touches the registry.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::collections::BTreeMap;
use uuid::Uuid;

/// What the gateway knows about an open session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    pub id: Uuid,
    /// Canonical subject the session follows.
    pub subject: String,
    /// Cursor the session was opened with.
    pub since: Option<String>,
    pub opened_at: DateTime<Utc>,
}

/// Open stream sessions keyed by id.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: DashMap<Uuid, SessionInfo>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, info: SessionInfo) {
        self.sessions.insert(info.id, info);
    }

    /// Remove a session; returns whether it was present.
    pub fn remove(&self, id: &Uuid) -> bool {
        self.sessions.remove(id).is_some()
    }

    /// Number of open sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Open sessions per canonical subject.
    pub fn subject_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for entry in self.sessions.iter() {
            *counts.entry(entry.value().subject.clone()).or_insert(0) += 1;
        }
        counts
    }
}
