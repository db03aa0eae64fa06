//! Broadcast bus for `PipelineDiagnostic` events.
//!
//! Built on `tokio::sync::broadcast`. Publishing with no active subscribers
//! is a no-op, so the pipeline can report unconditionally.

use companion_types::event::PipelineDiagnostic;
use tokio::sync::broadcast;

/// Multi-consumer bus for swallowed pipeline conditions.
///
/// Cloning the bus clones the sender.
#[derive(Clone)]
pub struct DiagnosticBus {
    sender: broadcast::Sender<PipelineDiagnostic>,
}

impl DiagnosticBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Create a subscriber that will receive all future diagnostics.
    pub fn subscribe(&self) -> broadcast::Receiver<PipelineDiagnostic> {
        self.sender.subscribe()
    }

    /// If there are no subscribers, the diagnostic is silently dropped.
    pub fn publish(&self, diagnostic: PipelineDiagnostic) {
        let _ = self.sender.send(diagnostic);
    }
}

impl Default for DiagnosticBus {
    fn default() -> Self {
        Self::new(64)
    }
}

impl std::fmt::Debug for DiagnosticBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiagnosticBus")
            .field("receiver_count", &self.sender.receiver_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use companion_types::character::CharacterId;

    fn sample() -> PipelineDiagnostic {
        PipelineDiagnostic::RelationshipAbsent {
            character_id: CharacterId::new("chr_aaaaaaaaaaaa"),
        }
    }

    #[tokio::test]
    async fn publish_and_subscribe_delivers_diagnostic() {
        let bus = DiagnosticBus::new(8);
        let mut rx = bus.subscribe();
        bus.publish(sample());
        assert_eq!(rx.recv().await.unwrap(), sample());
    }

    #[test]
    fn publish_without_subscribers_is_noop() {
        let bus = DiagnosticBus::new(8);
        bus.publish(sample());
    }

    #[tokio::test]
    async fn clones_share_the_channel() {
        let bus = DiagnosticBus::new(8);
        let mut rx = bus.subscribe();
        bus.clone().publish(sample());
        assert!(rx.recv().await.is_ok());
    }
}
