use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Launch mode for the daemon.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum LaunchMode {
    /// Fork into the background and detach from the controlling terminal.
    #[default]
    Background,
    /// Remain attached to the launching process, as under a service manager
    /// that already supervises the daemon.
    Foreground,
}

impl LaunchMode {
    /// Reports whether this mode detaches from the controlling terminal.
    #[must_use]
    pub const fn detaches(self) -> bool {
        matches!(self, Self::Background)
    }
}
