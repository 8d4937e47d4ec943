//! COSEM application layer for the smart meter head-end
//!
//! Builders produce complete APDUs ready to be placed in an HDLC information
//! frame; parsers validate the response header and result codes before
//! handing the payload to the A-XDR decoder.

pub mod addressing;
pub mod apdu;
pub mod association;
mod ber;
pub mod invoke;
pub mod service;

pub use addressing::{CosemAttributeDescriptor, CosemMethodDescriptor};
pub use apdu::{ApduKind, tags};
pub use association::{
    build_aarq, build_rlre, build_rlrq, parse_aare, parse_rlre, AareResponse, AarqRequest,
    AssociationResult, InitiateResponse,
};
pub use invoke::{InvokeIdAndPriority, InvokeIdCounter};
pub use service::{
    build_action_request, build_action_response, build_get_request, build_get_response,
    build_set_request, build_set_response, decode_action_request, decode_get_request,
    decode_set_request, parse_action_response, parse_get_response, parse_set_response,
    DataAccessResult, GetDataResult, ServiceRequest,
};
