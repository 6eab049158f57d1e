//! Worker version lifecycle.
//!
//! | State | Meaning |
//! |-------|---------|
//! | installing | Manifest being fetched into a new generation |
//! | waiting | Installed, an older version still controls pages |
//! | active | Controls fetches; stale generations evicted |
//! | superseded | Replaced by a newer active version |
//! | redundant | Install failed, version discarded |

use std::fmt;

use serde::{Deserialize, Serialize};

use super::CacheController;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    Installing,
    Waiting,
    Active,
    Superseded,
    Redundant,
}

impl WorkerState {
    pub fn can_advance_to(self, next: WorkerState) -> bool {
        use WorkerState::*;
        matches!(
            (self, next),
            (Installing, Waiting) | (Installing, Redundant) | (Waiting, Active) | (Waiting, Redundant) | (Active, Superseded)
        )
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WorkerState::Installing => "installing",
            WorkerState::Waiting => "waiting",
            WorkerState::Active => "active",
            WorkerState::Superseded => "superseded",
            WorkerState::Redundant => "redundant",
        };
        f.write_str(s)
    }
}

/// One deployed worker version and where it is in its lifecycle.
#[derive(Clone)]
pub struct WorkerVersion {
    controller: CacheController,
    state: WorkerState,
    skip_waiting: bool,
}

impl WorkerVersion {
    pub fn new(controller: CacheController) -> Self {
        Self { controller, state: WorkerState::Installing, skip_waiting: false }
    }

    /// A version restored from the durable registration record.
    pub(crate) fn resumed(controller: CacheController) -> Self {
        Self { controller, state: WorkerState::Active, skip_waiting: false }
    }

    pub fn controller(&self) -> &CacheController {
        &self.controller
    }

    pub fn generation(&self) -> &str {
        &self.controller.config().generation
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    /// Whether the version asked to skip its waiting period.
    pub fn skip_waiting_requested(&self) -> bool {
        self.skip_waiting
    }

    pub fn request_skip_waiting(&mut self) {
        self.skip_waiting = true;
    }

    /// Move to `next`, ignoring transitions the lifecycle does not allow.
    pub fn advance(&mut self, next: WorkerState) -> bool {
        if !self.state.can_advance_to(next) {
            tracing::warn!(generation = %self.generation(), from = %self.state, to = %next, "ignored invalid transition");
            return false;
        }
        tracing::info!(generation = %self.generation(), from = %self.state, to = %next, "worker state changed");
        self.state = next;
        true
    }
}
