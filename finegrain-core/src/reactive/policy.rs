//! Notification policy shared by cells and reactive objects.

use serde::{Deserialize, Serialize};

/// When a write notifies its dependents.
///
/// `Changed` is the fine-grained default: writes that leave the value equal
/// are silent. `Always` notifies on every write and exists to demonstrate
/// coarse-grained propagation side by side with the gated one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotifyPolicy {
    /// Notify only if the new value differs from the old one.
    #[default]
    Changed,
    /// Notify on every write, even when nothing changed.
    Always,
}

impl NotifyPolicy {
    /// Decide whether a write should notify, given whether it changed anything.
    pub fn should_notify(self, changed: bool) -> bool {
        match self {
            Self::Changed => changed,
            Self::Always => true,
        }
    }
}
