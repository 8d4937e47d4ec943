use std::fmt;

/// Lifecycle state of a [`MeterSession`](crate::MeterSession)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SessionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Associating,
    Associated,
    Releasing,
}

impl SessionState {
    /// Service requests are only allowed once associated
    pub fn is_associated(&self) -> bool {
        matches!(self, SessionState::Associated)
    }

    /// A socket is (or is being) held
    pub fn has_link(&self) -> bool {
        !matches!(self, SessionState::Disconnected | SessionState::Connecting)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Disconnected => "disconnected",
            SessionState::Connecting => "connecting",
            SessionState::Connected => "connected",
            SessionState::Associating => "associating",
            SessionState::Associated => "associated",
            SessionState::Releasing => "releasing",
        };
        f.write_str(name)
    }
}
