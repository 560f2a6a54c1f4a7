//! Event/memory recorder collaborator.
//!
//! The engine only ever *writes* to memory: observability events, knowledge
//! organization payloads and learning records. Reads belong to the
//! long-term store behind this trait.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::MemoryError;

/// One recorded event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub id: String,
    pub event_type: String,
    pub data: Value,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
    /// Relevance weight, lowered by each decay pass.
    pub importance: f64,
    #[serde(default)]
    pub archived: bool,
    pub timestamp: DateTime<Utc>,
}

impl EventRecord {
    pub fn new(event_type: impl Into<String>, data: Value) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            event_type: event_type.into(),
            data,
            description: None,
            task_id: None,
            project_id: None,
            importance: 1.0,
            archived: false,
            timestamp: Utc::now(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_task_id(mut self, task_id: impl Into<String>) -> Self {
        self.task_id = Some(task_id.into());
        self
    }

    pub fn with_project_id(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }
}

/// Outcome of a decay/archival pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DecayReport {
    pub examined: usize,
    pub decayed: usize,
    pub archived: usize,
}

/// The memory collaborator interface.
#[async_trait]
pub trait MemoryStore: Send + Sync {
    /// Record an event. Callers treat this as fire-and-forget.
    async fn record_event(&self, event: EventRecord) -> Result<(), MemoryError>;

    /// Run the store's decay/archival pass.
    async fn apply_decay(&self) -> Result<DecayReport, MemoryError>;
}

/// Record an event, logging instead of propagating failures.
pub async fn record_quietly(store: &dyn MemoryStore, event: EventRecord) {
    let event_type = event.event_type.clone();
    if let Err(e) = store.record_event(event).await {
        log::warn!("Failed to record '{}' event: {}", event_type, e);
    }
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

/// Bounded, process-local store.
///
/// Decay multiplies the importance of every live event by `decay_factor`;
/// events falling below `archive_threshold` are archived. When `capacity` is
/// exceeded the oldest archived events are dropped first, then the oldest
/// live ones.
#[derive(Debug)]
pub struct InMemoryStore {
    events: RwLock<Vec<EventRecord>>,
    decay_factor: f64,
    archive_threshold: f64,
    capacity: usize,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new(10_000)
    }
}

impl InMemoryStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            events: RwLock::new(Vec::new()),
            decay_factor: 0.5,
            archive_threshold: 0.2,
            capacity: capacity.max(1),
        }
    }

    /// Builder: tune the decay pass.
    pub fn with_decay(mut self, factor: f64, archive_threshold: f64) -> Self {
        self.decay_factor = factor.clamp(0.0, 1.0);
        self.archive_threshold = archive_threshold.max(0.0);
        self
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Snapshot of every stored event.
    pub fn events(&self) -> Vec<EventRecord> {
        self.events.read().clone()
    }

    pub fn events_of_type(&self, event_type: &str) -> Vec<EventRecord> {
        self.events
            .read()
            .iter()
            .filter(|e| e.event_type == event_type)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }

    fn evict_overflow(events: &mut Vec<EventRecord>, capacity: usize) {
        while events.len() > capacity {
            let idx = events.iter().position(|e| e.archived).unwrap_or(0);
            events.remove(idx);
        }
    }
}

#[async_trait]
impl MemoryStore for InMemoryStore {
    async fn record_event(&self, event: EventRecord) -> Result<(), MemoryError> {
        if event.event_type.trim().is_empty() {
            return Err(MemoryError::InvalidEvent("event type is empty".into()));
        }
        let mut events = self.events.write();
        events.push(event);
        Self::evict_overflow(&mut events, self.capacity);
        Ok(())
    }

    async fn apply_decay(&self) -> Result<DecayReport, MemoryError> {
        let mut events = self.events.write();
        let mut report = DecayReport { examined: events.len(), ..DecayReport::default() };
        for event in events.iter_mut().filter(|e| !e.archived) {
            event.importance *= self.decay_factor;
            report.decayed += 1;
            if event.importance < self.archive_threshold {
                event.archived = true;
                report.archived += 1;
            }
        }
        log::debug!(
            "Memory decay pass: {} examined, {} decayed, {} archived",
            report.examined, report.decayed, report.archived,
        );
        Ok(report)
    }
}

/// Store that accepts and discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullMemoryStore;

#[async_trait]
impl MemoryStore for NullMemoryStore {
    async fn record_event(&self, _event: EventRecord) -> Result<(), MemoryError> {
        Ok(())
    }

    async fn apply_decay(&self) -> Result<DecayReport, MemoryError> {
        Ok(DecayReport::default())
    }
}
