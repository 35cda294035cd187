use std::fmt;

/// Where the manager is in the install/activate lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Constructed, nothing run yet
    Parsed,
    Installing,
    Installed,
    Activating,
    /// In control of requests
    Activated,
    /// The last install failed; a new install may be attempted
    Redundant,
}

impl WorkerState {
    pub fn can_install(&self) -> bool {
        matches!(self, WorkerState::Parsed | WorkerState::Redundant)
    }

    pub fn can_activate(&self) -> bool {
        matches!(self, WorkerState::Installed)
    }

    /// Only an activated manager intercepts requests.
    pub fn controls_requests(&self) -> bool {
        matches!(self, WorkerState::Activated)
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            WorkerState::Parsed => "parsed",
            WorkerState::Installing => "installing",
            WorkerState::Installed => "installed",
            WorkerState::Activating => "activating",
            WorkerState::Activated => "activated",
            WorkerState::Redundant => "redundant",
        }
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}
