//! New-connection events produced by a snapshot refresh.

use serde_json::Value;
use tracing::warn;

use crate::models::{ClientKind, Controller, Pilot};

/// Buffer size for the per-store event channel.
/// One refresh emits at most two events; 64 leaves room for slow listeners.
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq)]
pub enum NetworkEvent {
    NewPilots(Vec<Pilot>),
    NewControllers(Vec<Controller>),
}

impl NetworkEvent {
    pub fn len(&self) -> usize {
        match self {
            NetworkEvent::NewPilots(p) => p.len(),
            NetworkEvent::NewControllers(c) => c.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Newly created clients from one refresh, split by kind.
#[derive(Debug, Default)]
pub struct ClassificationBatch {
    pub pilots: Vec<Pilot>,
    pub controllers: Vec<Controller>,
}

impl ClassificationBatch {
    /// Split raw created entries into pilots and controllers. Entries that
    /// do not deserialize are logged and dropped.
    pub fn partition(created: impl IntoIterator<Item = Value>) -> Self {
        let mut batch = Self::default();
        for entry in created {
            let kind = ClientKind::of(&entry);
            match kind {
                ClientKind::Pilot => match serde_json::from_value::<Pilot>(entry) {
                    Ok(pilot) => batch.pilots.push(pilot),
                    Err(e) => warn!(%kind, error = %e, "Skipping malformed new client"),
                },
                ClientKind::Controller => match serde_json::from_value::<Controller>(entry) {
                    Ok(controller) => batch.controllers.push(controller),
                    Err(e) => warn!(%kind, error = %e, "Skipping malformed new client"),
                },
            }
        }
        batch
    }

    pub fn is_empty(&self) -> bool {
        self.pilots.is_empty() && self.controllers.is_empty()
    }

    /// One event per non-empty kind, controllers first.
    pub fn into_events(self) -> Vec<NetworkEvent> {
        let mut events = Vec::with_capacity(2);
        if !self.controllers.is_empty() {
            events.push(NetworkEvent::NewControllers(self.controllers));
        }
        if !self.pilots.is_empty() {
            events.push(NetworkEvent::NewPilots(self.pilots));
        }
        events
    }
}
