//! Per-scan state tracking
//!
//! Every transition is published as [`ScanEvent::StateChanged`]. Leaving a
//! state waits out the remainder of the minimum dwell time so a UI following
//! the events can show each stage; with a zero dwell transitions are immediate.
//! `Idle` is left without waiting, and a cancelled scan stops waiting.

use albumscan_common::{EventBus, ScanEvent, ScanState};
use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

/// Transition record returned to the caller
#[derive(Debug, Clone, PartialEq)]
pub struct StateTransition {
    pub scan_id: Uuid,
    pub old_state: ScanState,
    pub new_state: ScanState,
    pub transitioned_at: DateTime<Utc>,
}

pub struct ScanSession {
    scan_id: Uuid,
    state: ScanState,
    entered_at: Instant,
    min_dwell: Duration,
    events: EventBus,
    cancel: CancellationToken,
    history: Vec<StateTransition>,
}

impl ScanSession {
    pub fn new(scan_id: Uuid, min_dwell: Duration, events: EventBus) -> Self {
        Self {
            scan_id,
            state: ScanState::Idle,
            entered_at: Instant::now(),
            min_dwell,
            events,
            cancel: CancellationToken::new(),
            history: Vec::new(),
        }
    }

    /// Cut the dwell short once `cancel` fires
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn scan_id(&self) -> Uuid {
        self.scan_id
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    pub fn history(&self) -> &[StateTransition] {
        &self.history
    }

    /// Move to `new_state` after the dwell throttle
    ///
    /// Edges outside the state machine are refused (logged, state unchanged).
    pub async fn transition_to(&mut self, new_state: ScanState) -> Option<StateTransition> {
        if !self.state.can_transition_to(new_state) {
            warn!(
                scan_id = %self.scan_id,
                from = %self.state,
                to = %new_state,
                "Refusing invalid scan state transition"
            );
            return None;
        }

        let elapsed = self.entered_at.elapsed();
        if self.state != ScanState::Idle && elapsed < self.min_dwell {
            tokio::select! {
                _ = tokio::time::sleep(self.min_dwell - elapsed) => {}
                _ = self.cancel.cancelled() => {}
            }
        }

        let transition = StateTransition {
            scan_id: self.scan_id,
            old_state: self.state,
            new_state,
            transitioned_at: Utc::now(),
        };
        self.state = new_state;
        self.entered_at = Instant::now();

        debug!(scan_id = %self.scan_id, from = %transition.old_state, to = %new_state, "Scan state changed");

        self.events.emit_lossy(ScanEvent::StateChanged {
            scan_id: self.scan_id,
            old_state: transition.old_state,
            new_state,
            timestamp: transition.transitioned_at,
        });
        self.history.push(transition.clone());

        Some(transition)
    }
}
