//! APDU tags and response classification
//!
//! Every COSEM APDU starts with a one-byte tag. Service responses carry the
//! invoke-id-and-priority byte at offset 2 (`tag | response-type | invoke`).

use hes_core::{DlmsError, DlmsResult};

/// APDU tags used by the head-end
pub mod tags {
    pub const AARQ: u8 = 0x60;
    pub const AARE: u8 = 0x61;
    pub const RLRQ: u8 = 0x62;
    pub const RLRE: u8 = 0x63;

    pub const GET_REQUEST: u8 = 0xC0;
    pub const SET_REQUEST: u8 = 0xC1;
    pub const ACTION_REQUEST: u8 = 0xC3;
    pub const GET_RESPONSE: u8 = 0xC4;
    pub const SET_RESPONSE: u8 = 0xC5;
    pub const ACTION_RESPONSE: u8 = 0xC7;

    pub const EXCEPTION_RESPONSE: u8 = 0xD8;
    pub const CONFIRMED_SERVICE_ERROR: u8 = 0x0E;

    /// Request/response type "normal"
    pub const NORMAL: u8 = 0x01;
    /// Get response type "with-datablock"
    pub const WITH_DATABLOCK: u8 = 0x02;
}

/// Coarse classification of an inbound APDU
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApduKind {
    Aare,
    Rlre,
    GetResponse { invoke_id: u8 },
    SetResponse { invoke_id: u8 },
    ActionResponse { invoke_id: u8 },
    ExceptionResponse,
    ConfirmedServiceError,
    Other(u8),
}

impl ApduKind {
    pub fn classify(apdu: &[u8]) -> Option<Self> {
        let tag = *apdu.first()?;
        let invoke_id = || apdu.get(2).map(|b| b & 0x0F);
        Some(match tag {
            tags::AARE => ApduKind::Aare,
            tags::RLRE => ApduKind::Rlre,
            tags::GET_RESPONSE => ApduKind::GetResponse {
                invoke_id: invoke_id()?,
            },
            tags::SET_RESPONSE => ApduKind::SetResponse {
                invoke_id: invoke_id()?,
            },
            tags::ACTION_RESPONSE => ApduKind::ActionResponse {
                invoke_id: invoke_id()?,
            },
            tags::EXCEPTION_RESPONSE => ApduKind::ExceptionResponse,
            tags::CONFIRMED_SERVICE_ERROR => ApduKind::ConfirmedServiceError,
            other => ApduKind::Other(other),
        })
    }

    /// Invoke id of a service response
    pub fn invoke_id(&self) -> Option<u8> {
        match self {
            ApduKind::GetResponse { invoke_id }
            | ApduKind::SetResponse { invoke_id }
            | ApduKind::ActionResponse { invoke_id } => Some(*invoke_id),
            _ => None,
        }
    }

    /// Error responses that answer whatever request is outstanding
    pub fn is_error_response(&self) -> bool {
        matches!(
            self,
            ApduKind::ExceptionResponse | ApduKind::ConfirmedServiceError
        )
    }
}

/// Turn an exception-response or confirmed-service-error APDU into an error
///
/// ```text
/// D8 state-error service-error
/// 0E confirmed-service-error-choice service-error-choice value
/// ```
pub fn error_response(apdu: &[u8]) -> DlmsError {
    match apdu.first() {
        Some(&tags::EXCEPTION_RESPONSE) => {
            let state = apdu.get(1).copied();
            match apdu.get(2).copied() {
                Some(service) => DlmsError::protocol_code(
                    format!(
                        "Exception response (state error {})",
                        state.map_or_else(|| "?".to_string(), |s| s.to_string())
                    ),
                    service,
                ),
                None => DlmsError::protocol("Exception response truncated"),
            }
        }
        Some(&tags::CONFIRMED_SERVICE_ERROR) => match apdu.get(3).copied() {
            Some(code) => DlmsError::protocol_code(
                format!(
                    "Confirmed service error (service {}, error type {})",
                    apdu[1], apdu[2]
                ),
                code,
            ),
            None => DlmsError::protocol("Confirmed service error truncated"),
        },
        Some(other) => DlmsError::protocol(format!("Unexpected APDU tag 0x{:02X}", other)),
        None => DlmsError::protocol("Empty APDU"),
    }
}

/// Check the leading tag and response type of a service response
pub(crate) fn expect_header(apdu: &[u8], tag: u8, name: &str) -> DlmsResult<u8> {
    match apdu.first() {
        None => Err(DlmsError::protocol(format!("Empty {}", name))),
        Some(&first) if first == tag => {
            if apdu.len() < 3 {
                return Err(DlmsError::protocol(format!("{} truncated", name)));
            }
            Ok(apdu[1])
        }
        Some(&tags::EXCEPTION_RESPONSE) | Some(&tags::CONFIRMED_SERVICE_ERROR) => {
            Err(error_response(apdu))
        }
        Some(&other) => Err(DlmsError::protocol(format!(
            "Expected {} (0x{:02X}), got tag 0x{:02X}",
            name, tag, other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_service_responses() {
        assert_eq!(
            ApduKind::classify(&[0xC4, 0x01, 0xC3, 0x00, 0x11, 0x05]),
            Some(ApduKind::GetResponse { invoke_id: 3 })
        );
        assert_eq!(
            ApduKind::classify(&[0xC7, 0x01, 0xC1, 0x00]).and_then(|k| k.invoke_id()),
            Some(1)
        );
        assert_eq!(ApduKind::classify(&[0x61, 0x00]), Some(ApduKind::Aare));
        assert_eq!(ApduKind::classify(&[0xC4, 0x01]), None);
        assert_eq!(ApduKind::classify(&[]), None);
    }

    #[test]
    fn test_exception_response_carries_code() {
        let err = error_response(&[0xD8, 0x01, 0x02]);
        assert_eq!(err.code(), Some(2));
        assert_eq!(err.kind(), hes_core::ErrorKind::Protocol);

        let err = error_response(&[0x0E, 0x01, 0x06, 0x03]);
        assert_eq!(err.code(), Some(3));
    }

    #[test]
    fn test_expect_header_rejects_wrong_tag() {
        let err = expect_header(&[0xC5, 0x01, 0xC1, 0x00], tags::GET_RESPONSE, "GET response")
            .unwrap_err();
        assert!(err.to_string().contains("0xC5"));
        let err = expect_header(&[0xD8, 0x01, 0x01], tags::GET_RESPONSE, "GET response")
            .unwrap_err();
        assert_eq!(err.code(), Some(1));
    }
}
