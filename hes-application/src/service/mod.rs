//! xDLMS services: GET, SET and ACTION with logical name referencing

pub mod action;
pub mod get;
pub mod set;

pub use action::{
    build_action_request, build_action_response, decode_action_request, parse_action_response,
};
pub use get::{
    build_get_request, build_get_response, decode_get_request, decode_get_response,
    parse_get_response, GetResponse,
};
pub use set::{build_set_request, build_set_response, decode_set_request, parse_set_response};

use crate::addressing::{CosemAttributeDescriptor, CosemMethodDescriptor};
use crate::apdu::tags;
use crate::invoke::InvokeIdAndPriority;
use hes_axdr::AxdrDecoder;
use hes_core::{DlmsError, DlmsResult, DlmsValue};
use std::fmt;

/// Decoder positioned after `tag | request-type`, for normal requests only
fn request_decoder<'a>(apdu: &'a [u8], tag: u8, name: &str) -> DlmsResult<AxdrDecoder<'a>> {
    match apdu {
        [first, kind, ..] if *first == tag && *kind == tags::NORMAL => AxdrDecoder::at(apdu, 2),
        [first, kind, ..] if *first == tag => Err(DlmsError::protocol(format!(
            "Unsupported {} type {}",
            name, kind
        ))),
        _ => Err(DlmsError::protocol(format!("Malformed {}", name))),
    }
}

/// Data-access-result / action-result codes reported by the meter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataAccessResult {
    Success,
    HardwareFault,
    TemporaryFailure,
    ReadWriteDenied,
    ObjectUndefined,
    ObjectClassInconsistent,
    ObjectUnavailable,
    TypeUnmatched,
    ScopeOfAccessViolated,
    DataBlockUnavailable,
    LongOperationAborted,
    NoLongOperationInProgress,
    OtherReason,
    Unknown(u8),
}

impl DataAccessResult {
    pub fn code(&self) -> u8 {
        match self {
            DataAccessResult::Success => 0,
            DataAccessResult::HardwareFault => 1,
            DataAccessResult::TemporaryFailure => 2,
            DataAccessResult::ReadWriteDenied => 3,
            DataAccessResult::ObjectUndefined => 4,
            DataAccessResult::ObjectClassInconsistent => 9,
            DataAccessResult::ObjectUnavailable => 11,
            DataAccessResult::TypeUnmatched => 12,
            DataAccessResult::ScopeOfAccessViolated => 13,
            DataAccessResult::DataBlockUnavailable => 14,
            DataAccessResult::LongOperationAborted => 15,
            DataAccessResult::NoLongOperationInProgress => 16,
            DataAccessResult::OtherReason => 250,
            DataAccessResult::Unknown(code) => *code,
        }
    }

    pub fn is_success(&self) -> bool {
        *self == DataAccessResult::Success
    }
}

impl From<u8> for DataAccessResult {
    fn from(code: u8) -> Self {
        match code {
            0 => DataAccessResult::Success,
            1 => DataAccessResult::HardwareFault,
            2 => DataAccessResult::TemporaryFailure,
            3 => DataAccessResult::ReadWriteDenied,
            4 => DataAccessResult::ObjectUndefined,
            9 => DataAccessResult::ObjectClassInconsistent,
            11 => DataAccessResult::ObjectUnavailable,
            12 => DataAccessResult::TypeUnmatched,
            13 => DataAccessResult::ScopeOfAccessViolated,
            14 => DataAccessResult::DataBlockUnavailable,
            15 => DataAccessResult::LongOperationAborted,
            16 => DataAccessResult::NoLongOperationInProgress,
            250 => DataAccessResult::OtherReason,
            other => DataAccessResult::Unknown(other),
        }
    }
}

impl fmt::Display for DataAccessResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataAccessResult::Success => "success",
            DataAccessResult::HardwareFault => "hardware-fault",
            DataAccessResult::TemporaryFailure => "temporary-failure",
            DataAccessResult::ReadWriteDenied => "read-write-denied",
            DataAccessResult::ObjectUndefined => "object-undefined",
            DataAccessResult::ObjectClassInconsistent => "object-class-inconsistent",
            DataAccessResult::ObjectUnavailable => "object-unavailable",
            DataAccessResult::TypeUnmatched => "type-unmatched",
            DataAccessResult::ScopeOfAccessViolated => "scope-of-access-violated",
            DataAccessResult::DataBlockUnavailable => "data-block-unavailable",
            DataAccessResult::LongOperationAborted => "long-operation-aborted",
            DataAccessResult::NoLongOperationInProgress => "no-long-operation-in-progress",
            DataAccessResult::OtherReason => "other-reason",
            DataAccessResult::Unknown(code) => return write!(f, "result({})", code),
        };
        f.write_str(name)
    }
}

/// Get-Data-Result choice
#[derive(Debug, Clone, PartialEq)]
pub enum GetDataResult {
    Data(DlmsValue),
    DataAccessError(DataAccessResult),
}

/// A confirmed service request, encoded once the invoke id is known
#[derive(Debug, Clone, PartialEq)]
pub enum ServiceRequest {
    Get {
        attribute: CosemAttributeDescriptor,
    },
    Set {
        attribute: CosemAttributeDescriptor,
        value: DlmsValue,
    },
    Action {
        method: CosemMethodDescriptor,
        parameters: Option<DlmsValue>,
    },
}

impl ServiceRequest {
    pub fn encode(&self, invoke: InvokeIdAndPriority) -> Vec<u8> {
        match self {
            ServiceRequest::Get { attribute } => get::encode_get_request(invoke, attribute),
            ServiceRequest::Set { attribute, value } => {
                set::encode_set_request(invoke, attribute, &hes_axdr::encode(value))
            }
            ServiceRequest::Action { method, parameters } => {
                let encoded = parameters.as_ref().map(hes_axdr::encode);
                action::encode_action_request(invoke, method, encoded.as_deref())
            }
        }
    }

    /// Tag of the APDU that answers this request
    pub fn response_tag(&self) -> u8 {
        match self {
            ServiceRequest::Get { .. } => tags::GET_RESPONSE,
            ServiceRequest::Set { .. } => tags::SET_RESPONSE,
            ServiceRequest::Action { .. } => tags::ACTION_RESPONSE,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ServiceRequest::Get { .. } => "GET",
            ServiceRequest::Set { .. } => "SET",
            ServiceRequest::Action { .. } => "ACTION",
        }
    }
}

impl fmt::Display for ServiceRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceRequest::Get { attribute } => write!(f, "GET {}", attribute),
            ServiceRequest::Set { attribute, .. } => write!(f, "SET {}", attribute),
            ServiceRequest::Action { method, .. } => write!(f, "ACTION {}", method),
        }
    }
}
