//! Session layer for the smart meter head-end
//!
//! HDLC framing (IEC 62056-46) as used by DLMS meters over TCP: frame
//! construction and parsing, HCS/FCS checking, and a streaming decoder that
//! reassembles frames from arbitrary TCP chunks.

pub mod hdlc;

pub use hdlc::*;
