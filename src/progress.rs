//! Progress reporting side channel.
//!
//! Progress is fire-and-forget: providers emit into a [`ProgressSink`] and
//! the caller observes an unbounded channel. Events for one generation are
//! emitted in order with non-decreasing percentages; nothing is persisted.

use crate::types::ProviderKind;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::UnboundedSender;

/// A status/percentage/estimate tuple emitted during a long-running
/// generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressEvent {
    /// Human-readable phase label.
    pub status: String,
    /// Completion percentage, 0-100, non-decreasing within one generation.
    pub percentage: u8,
    /// Optional human-readable estimate of remaining time.
    pub estimated_remaining: Option<String>,
}

/// Sender half of the progress channel a caller hands to the orchestrator.
pub type ProgressSender = UnboundedSender<ProgressEvent>;

/// Per-generation progress emitter handed to provider clients.
///
/// Attaches the provider-appropriate estimated-remaining label and honors
/// best-effort cancellation: once the generation's id has been forgotten
/// from the shared pending set, emits become no-ops.
pub struct ProgressSink {
    tx: Option<ProgressSender>,
    provider: ProviderKind,
    gate: Option<(Arc<Mutex<HashSet<u64>>>, u64)>,
}

impl ProgressSink {
    /// Creates a sink forwarding to `tx`, or a no-op sink when `tx` is
    /// `None`.
    pub fn new(tx: Option<ProgressSender>, provider: ProviderKind) -> Self {
        Self {
            tx,
            provider,
            gate: None,
        }
    }

    /// Creates a sink that discards all events.
    pub fn disabled(provider: ProviderKind) -> Self {
        Self::new(None, provider)
    }

    /// Ties the sink to a pending-generation set. Events are forwarded only
    /// while `id` is still a member.
    pub(crate) fn with_gate(mut self, pending: Arc<Mutex<HashSet<u64>>>, id: u64) -> Self {
        self.gate = Some((pending, id));
        self
    }

    /// Emits a progress event. Never fails; a closed channel or a cancelled
    /// generation simply drops the event.
    pub fn emit(&self, status: &str, percentage: u8) {
        let Some(tx) = &self.tx else {
            return;
        };

        if let Some((pending, id)) = &self.gate {
            let still_pending = pending.lock().unwrap().contains(id);
            if !still_pending {
                return;
            }
        }

        let event = ProgressEvent {
            status: status.to_string(),
            percentage,
            estimated_remaining: estimated_remaining(self.provider, percentage)
                .map(str::to_string),
        };
        let _ = tx.send(event);
    }
}

/// Provider-appropriate estimated-remaining label for the given completion
/// percentage.
fn estimated_remaining(provider: ProviderKind, percentage: u8) -> Option<&'static str> {
    match provider {
        // Synchronous call; only the initial event carries an estimate.
        ProviderKind::OpenAi => (percentage == 0).then_some("10-30 seconds"),
        ProviderKind::Replicate => {
            if percentage > 50 {
                Some("Less than a minute")
            } else {
                Some("1-2 minutes")
            }
        }
    }
}
