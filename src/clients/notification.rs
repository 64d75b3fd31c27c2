use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

use crate::domain::{ComputationKind, ComputationStatus};

/// Events published towards study clients after tree, build or result
/// changes. Serialized as JSON on the wire.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum StudyEvent {
    #[serde(rename_all = "camelCase")]
    TreeChanged { study_id: Uuid },
    #[serde(rename_all = "camelCase")]
    NodesDeleted { study_id: Uuid, node_ids: Vec<Uuid> },
    #[serde(rename_all = "camelCase")]
    BuildStatusChanged {
        study_id: Uuid,
        node_id: Uuid,
        root_network_id: Uuid,
    },
    #[serde(rename_all = "camelCase")]
    ComputationStatusChanged {
        study_id: Uuid,
        node_id: Uuid,
        root_network_id: Uuid,
        kind: ComputationKind,
        /// `None` once the result handle has been cleared.
        status: Option<ComputationStatus>,
    },
    #[serde(rename_all = "camelCase")]
    StudyDeleted { study_id: Uuid },
}

/// Outbound notification bus. Publishing never blocks a request and never
/// fails it: an event with no subscriber is simply dropped.
pub trait NotificationBus: Send + Sync {
    fn publish(&self, event: StudyEvent);
}

/// Broadcast-channel bus; websocket/bridge consumers subscribe to the
/// receiving side.
pub struct ChannelNotificationBus {
    tx: broadcast::Sender<StudyEvent>,
}

impl ChannelNotificationBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StudyEvent> {
        self.tx.subscribe()
    }
}

impl Default for ChannelNotificationBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl NotificationBus for ChannelNotificationBus {
    fn publish(&self, event: StudyEvent) {
        debug!(?event, "publishing study event");
        // Err means no subscriber is currently listening.
        let _ = self.tx.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_reaches_subscriber() {
        let bus = ChannelNotificationBus::new(8);
        let mut rx = bus.subscribe();
        let event = StudyEvent::TreeChanged {
            study_id: Uuid::new_v4(),
        };
        bus.publish(event.clone());
        assert_eq!(rx.try_recv().unwrap(), event);
    }

    #[test]
    fn publish_without_subscriber_is_dropped() {
        let bus = ChannelNotificationBus::new(8);
        bus.publish(StudyEvent::TreeChanged {
            study_id: Uuid::new_v4(),
        });
    }
}
