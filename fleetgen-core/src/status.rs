//! Generation state and its read-only view.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crate::types::{StatusLabel, StatusSnapshot};

/// Counters shared between the controller, its loop and status readers.
///
/// `running` is only written by the controller while it holds its
/// transition lock; `generated` is only written by the active loop.
#[derive(Debug, Default)]
pub struct GenerationState {
    running: AtomicBool,
    generated: AtomicU64,
}

impl GenerationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn generated_count(&self) -> u64 {
        self.generated.load(Ordering::Acquire)
    }

    pub(crate) fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::Release);
    }

    /// Count one tick; returns the new total.
    pub(crate) fn record_tick(&self) -> u64 {
        self.generated.fetch_add(1, Ordering::AcqRel) + 1
    }
}

/// Read-only accessor used by the control API and the broadcast path.
#[derive(Debug, Clone)]
pub struct StatusQuery {
    state: Arc<GenerationState>,
}

impl StatusQuery {
    pub fn new(state: Arc<GenerationState>) -> Self {
        Self { state }
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        let is_generating = self.state.is_running();
        StatusSnapshot {
            is_generating,
            generated_count: self.state.generated_count(),
            status_label: if is_generating {
                StatusLabel::Running
            } else {
                StatusLabel::Stopped
            },
        }
    }
}
