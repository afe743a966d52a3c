//! Lifecycle state of the orchestration core.
//!
//! The core moves through an explicit finite-state machine:
//!
//! ```text
//! Uninitialized -> Initializing -> Ready -> ShuttingDown -> Uninitialized
//! ```
//!
//! with a single allowed-transition table; invalid calls are rejected
//! deterministically. `Ready` carries an orthogonal `learning` sub-flag
//! owned by at most one learning cycle at a time. The whole record is
//! guarded by one lock in the core and is never touched by collaborators.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::Display;

use crate::error::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
pub enum LifecycleStage {
    Uninitialized,
    Initializing,
    Ready,
    ShuttingDown,
}

impl LifecycleStage {
    /// The allowed-transition table. Shutdown may be entered from any
    /// stage; a failed initialization rolls back to `Uninitialized`.
    pub fn can_transition_to(self, next: Self) -> bool {
        use LifecycleStage::*;
        matches!(
            (self, next),
            (Uninitialized, Initializing)
                | (Initializing, Ready)
                | (Initializing, Uninitialized)
                | (Uninitialized, ShuttingDown)
                | (Initializing, ShuttingDown)
                | (Ready, ShuttingDown)
                | (ShuttingDown, Uninitialized)
        )
    }
}

/// Mutable lifecycle record owned exclusively by the core.
#[derive(Debug, Clone)]
pub struct LifecycleState {
    pub stage: LifecycleStage,
    /// True only while a learning cycle holds the flag; implies
    /// `stage == Ready`.
    pub learning: bool,
    /// Bumped each time the core lands back on `Uninitialized`. A learning
    /// cycle records the epoch it started under and may only touch the
    /// `learning` flag while that epoch is still current.
    pub epoch: u64,
    /// Monotonically increasing count of successfully processed items.
    pub total_processed: u64,
    /// Timestamp of the most recent completed operation.
    pub last_update: Option<DateTime<Utc>>,
}

impl LifecycleState {
    pub fn new() -> Self {
        Self {
            stage: LifecycleStage::Uninitialized,
            learning: false,
            epoch: 0,
            total_processed: 0,
            last_update: None,
        }
    }

    /// Moves to the next stage if the transition table allows it. Leaving
    /// `Ready` always clears the learning flag, which may only be held
    /// while the core is ready.
    pub fn transition_to(&mut self, next: LifecycleStage) -> Result<(), CoreError> {
        if !self.stage.can_transition_to(next) {
            return Err(CoreError::InvalidTransition {
                from: self.stage,
                to: next,
            });
        }
        if next != LifecycleStage::Ready {
            self.learning = false;
        }
        self.stage = next;
        Ok(())
    }

    /// Lands the core back on `Uninitialized`. Used where the contract
    /// mandates it regardless of intermediate failures: after a failed
    /// initialize/restore and at the end of every shutdown attempt.
    /// Bumping the epoch here invalidates any learning cycle that started
    /// before the reset.
    pub fn reset(&mut self) {
        self.learning = false;
        self.epoch += 1;
        self.stage = LifecycleStage::Uninitialized;
    }

    /// Stamps `last_update` with the current time.
    pub fn stamp(&mut self) {
        self.last_update = Some(Utc::now());
    }
}

impl Default for LifecycleState {
    fn default() -> Self {
        Self::new()
    }
}
