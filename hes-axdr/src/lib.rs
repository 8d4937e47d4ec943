//! A-XDR data codec for DLMS/COSEM
//!
//! Every value is self-describing: a one-byte type tag, then a fixed-width
//! big-endian body or, for strings and collections, a length prefix.
//!
//! ```
//! use hes_axdr::{decode, encode};
//! use hes_core::DlmsValue;
//!
//! let bytes = encode(&DlmsValue::Unsigned16(2300));
//! assert_eq!(bytes, [0x12, 0x08, 0xFC]);
//! let (value, consumed) = decode(&bytes, 0).unwrap();
//! assert_eq!(value, DlmsValue::Unsigned16(2300));
//! assert_eq!(consumed, 3);
//! ```

pub mod decoder;
pub mod encoder;
pub mod length;

pub use decoder::AxdrDecoder;
pub use encoder::AxdrEncoder;
pub use length::{decode_length, encode_length};

use hes_core::{DlmsResult, DlmsValue};

/// Encode one value with its type tag
pub fn encode(value: &DlmsValue) -> Vec<u8> {
    let mut encoder = AxdrEncoder::new();
    encoder.encode_value(value);
    encoder.into_bytes()
}

/// Decode one value starting at `offset`
///
/// Returns the value and the number of bytes it occupied.
pub fn decode(bytes: &[u8], offset: usize) -> DlmsResult<(DlmsValue, usize)> {
    let mut decoder = AxdrDecoder::at(bytes, offset)?;
    let value = decoder.decode_value()?;
    Ok((value, decoder.position() - offset))
}
