//! Periodic hard synchronization of the target network from the online
//! network.
//!
//! Bootstrapped targets are computed against a frozen parameter snapshot
//! rather than the network being fitted, so the regression target does not
//! move on every gradient step. The copy is unconditional and wholesale;
//! there is no soft interpolation.

use crate::error::{Result, TalosError};
use crate::network::QNetwork;
use serde::{Deserialize, Serialize};

/// Copy policy: overwrite the target parameters every `interval` global
/// environment steps.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetSync {
    interval: usize,
}

impl TargetSync {
    pub fn new(interval: usize) -> Result<Self> {
        if interval == 0 {
            return Err(TalosError::invalid_parameter(
                "target_sync_interval",
                "must be at least 1",
            ));
        }
        Ok(TargetSync { interval })
    }

    pub fn interval(&self) -> usize {
        self.interval
    }

    /// Whether a synchronization is due at this global step count.
    pub fn due(&self, global_step: u64) -> bool {
        global_step % self.interval as u64 == 0
    }

    /// Overwrite the target's parameters with a full snapshot of the
    /// online network's.
    pub fn apply(&self, online: &QNetwork, target: &mut QNetwork) -> Result<()> {
        target.set_parameters(&online.parameters())
    }
}
