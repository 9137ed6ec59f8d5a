//! Cache events.
//!
//! The cache records what each flush did; the application drains the queue
//! after `update()` to react to finished loads (or just to log them).

use crate::id::ResourceId;
use crate::loader::LoadError;

/// Something a flush did to an entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEvent {
    Loaded {
        id: ResourceId,
        kind: &'static str,
    },
    Failed {
        id: ResourceId,
        kind: &'static str,
        error: LoadError,
    },
    Destroyed {
        id: ResourceId,
        kind: &'static str,
    },
}

impl CacheEvent {
    pub fn id(&self) -> ResourceId {
        match self {
            CacheEvent::Loaded { id, .. }
            | CacheEvent::Failed { id, .. }
            | CacheEvent::Destroyed { id, .. } => *id,
        }
    }
}

/// FIFO of events awaiting the application.
#[derive(Debug, Default)]
pub struct EventQueue {
    events: Vec<CacheEvent>,
}

impl EventQueue {
    pub fn push(&mut self, event: CacheEvent) {
        self.events.push(event);
    }

    /// Takes every queued event, oldest first.
    pub fn drain(&mut self) -> Vec<CacheEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
