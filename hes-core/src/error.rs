use thiserror::Error;

/// Error type for every layer of the head-end protocol engine
#[derive(Error, Debug)]
pub enum DlmsError {
    /// TCP-level failure: refused, unreachable, connect timeout, link lost
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Link (SNRM/UA) or association (AARQ/AARE) negotiation failed
    #[error("Association error: {0}")]
    Association(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    /// Unexpected tag, non-success result code, malformed or truncated frame
    #[error("Protocol error: {message}{}", fmt_code(.code))]
    Protocol { message: String, code: Option<u8> },

    /// Malformed OBIS text or a value that cannot be encoded
    #[error("Format error: {0}")]
    Format(String),

    #[error("Relay control error: {0}")]
    RelayControl(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// A second request was issued while one is still outstanding on the session
    #[error("Request rejected: invoke id {invoke_id} is still pending")]
    RequestInFlight { invoke_id: u8 },
}

fn fmt_code(code: &Option<u8>) -> String {
    match code {
        Some(code) => format!(" (code {})", code),
        None => String::new(),
    }
}

/// Coarse classification of a [`DlmsError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Connection,
    Association,
    Timeout,
    Protocol,
    Format,
    RelayControl,
    InvalidState,
}

impl DlmsError {
    /// Protocol error without a vendor code
    pub fn protocol(message: impl Into<String>) -> Self {
        DlmsError::Protocol {
            message: message.into(),
            code: None,
        }
    }

    /// Protocol error carrying the result code reported by the meter
    pub fn protocol_code(message: impl Into<String>, code: u8) -> Self {
        DlmsError::Protocol {
            message: message.into(),
            code: Some(code),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            DlmsError::Connection(_) | DlmsError::Io(_) => ErrorKind::Connection,
            DlmsError::Association(_) => ErrorKind::Association,
            DlmsError::Timeout(_) => ErrorKind::Timeout,
            DlmsError::Protocol { .. } => ErrorKind::Protocol,
            DlmsError::Format(_) => ErrorKind::Format,
            DlmsError::RelayControl(_) => ErrorKind::RelayControl,
            DlmsError::InvalidState(_) | DlmsError::RequestInFlight { .. } => {
                ErrorKind::InvalidState
            }
        }
    }

    /// Result code reported by the meter, if any
    pub fn code(&self) -> Option<u8> {
        match self {
            DlmsError::Protocol { code, .. } => *code,
            _ => None,
        }
    }
}

/// Result type alias for head-end operations
pub type DlmsResult<T> = Result<T, DlmsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_error_display_includes_code() {
        let err = DlmsError::protocol_code("Data access failed", 3);
        assert_eq!(err.to_string(), "Protocol error: Data access failed (code 3)");
        assert_eq!(err.code(), Some(3));

        let err = DlmsError::protocol("Unexpected tag");
        assert_eq!(err.to_string(), "Protocol error: Unexpected tag");
    }

    #[test]
    fn test_io_error_is_connection_kind() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        let err: DlmsError = io.into();
        assert_eq!(err.kind(), ErrorKind::Connection);
        assert_eq!(
            DlmsError::RequestInFlight { invoke_id: 2 }.kind(),
            ErrorKind::InvalidState
        );
    }
}
