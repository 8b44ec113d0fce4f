//! Scan state machine vocabulary and the event bus
//!
//! The orchestrator publishes every state transition and branch outcome on a
//! broadcast channel. Subscribers (a UI, a test) receive only events emitted
//! after they subscribed; emitting never blocks and never fails a scan.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Scan lifecycle
///
/// `Idle → Identifying → {IdentificationFailed | Identified} → EnrichingParallel → Complete`,
/// with `Cancelled` reachable from `Identifying` and `EnrichingParallel`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScanState {
    Idle,
    Identifying,
    IdentificationFailed,
    Identified,
    EnrichingParallel,
    Complete,
    Cancelled,
}

impl ScanState {
    /// Terminal states accept no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ScanState::IdentificationFailed | ScanState::Complete | ScanState::Cancelled
        )
    }

    /// Whether `self → next` is an edge of the state machine
    pub fn can_transition_to(&self, next: ScanState) -> bool {
        use ScanState::*;
        matches!(
            (self, next),
            (Idle, Identifying)
                | (Identifying, IdentificationFailed)
                | (Identifying, Identified)
                | (Identifying, Cancelled)
                | (Identified, EnrichingParallel)
                | (EnrichingParallel, Complete)
                | (EnrichingParallel, Cancelled)
        )
    }
}

impl std::fmt::Display for ScanState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ScanState::Idle => "idle",
            ScanState::Identifying => "identifying",
            ScanState::IdentificationFailed => "identification_failed",
            ScanState::Identified => "identified",
            ScanState::EnrichingParallel => "enriching_parallel",
            ScanState::Complete => "complete",
            ScanState::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// One of the two concurrent enrichment tasks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScanBranch {
    Review,
    Artwork,
}

/// Events published during a scan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ScanEvent {
    StateChanged {
        scan_id: Uuid,
        old_state: ScanState,
        new_state: ScanState,
        timestamp: DateTime<Utc>,
    },

    /// The first identification round asked for a refinement round
    RefinementRequested {
        scan_id: Uuid,
        query: String,
        reason: String,
    },

    /// An enrichment branch finished (successfully or not)
    BranchSettled {
        scan_id: Uuid,
        branch: ScanBranch,
        failed: bool,
        /// Review reused from a previous record instead of calling the service
        from_cache: bool,
    },

    RecordCommitted {
        scan_id: Uuid,
        record_id: String,
    },

    ScanFailed {
        scan_id: Uuid,
        message: String,
    },
}

impl ScanEvent {
    pub fn scan_id(&self) -> Uuid {
        match self {
            ScanEvent::StateChanged { scan_id, .. }
            | ScanEvent::RefinementRequested { scan_id, .. }
            | ScanEvent::BranchSettled { scan_id, .. }
            | ScanEvent::RecordCommitted { scan_id, .. }
            | ScanEvent::ScanFailed { scan_id, .. } => *scan_id,
        }
    }
}

/// Broadcast channel for scan events
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ScanEvent>,
    capacity: usize,
}

impl EventBus {
    /// Create a bus buffering up to `capacity` events per lagging subscriber
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            tx,
            capacity: capacity.max(1),
        }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<ScanEvent> {
        self.tx.subscribe()
    }

    /// Emit an event, ignoring the absence of subscribers
    pub fn emit_lossy(&self, event: ScanEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_edges() {
        use ScanState::*;
        let path = [Idle, Identifying, Identified, EnrichingParallel, Complete];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{} -> {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_enrichment_never_starts_before_identification() {
        assert!(!ScanState::Identifying.can_transition_to(ScanState::EnrichingParallel));
        assert!(!ScanState::Idle.can_transition_to(ScanState::Identified));
    }

    #[test]
    fn test_terminal_states_are_final() {
        use ScanState::*;
        let all = [
            Idle,
            Identifying,
            IdentificationFailed,
            Identified,
            EnrichingParallel,
            Complete,
            Cancelled,
        ];
        for terminal in [IdentificationFailed, Complete, Cancelled] {
            assert!(terminal.is_terminal());
            assert!(all.iter().all(|next| !terminal.can_transition_to(*next)));
        }
    }

    #[tokio::test]
    async fn test_emit_without_subscribers_is_silent() {
        let bus = EventBus::new(4);
        bus.emit_lossy(ScanEvent::ScanFailed {
            scan_id: Uuid::new_v4(),
            message: "nobody listening".to_string(),
        });
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_subscriber_receives_events_in_order() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();
        let scan_id = Uuid::new_v4();

        bus.emit_lossy(ScanEvent::RefinementRequested {
            scan_id,
            query: "radiohead ok computer".to_string(),
            reason: "text partially occluded".to_string(),
        });
        bus.emit_lossy(ScanEvent::RecordCommitted {
            scan_id,
            record_id: "rec-1".to_string(),
        });

        assert!(matches!(rx.recv().await.unwrap(), ScanEvent::RefinementRequested { .. }));
        let second = rx.recv().await.unwrap();
        assert_eq!(second.scan_id(), scan_id);
        assert!(matches!(second, ScanEvent::RecordCommitted { .. }));
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let event = ScanEvent::BranchSettled {
            scan_id: Uuid::nil(),
            branch: ScanBranch::Artwork,
            failed: true,
            from_cache: false,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "BranchSettled");
        assert_eq!(json["branch"], "Artwork");
    }
}
