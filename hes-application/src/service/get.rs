//! GET service
//!
//! ```text
//! Get-Request-Normal:  C0 01 invoke class(2) instance(6) attribute(1) 00
//! Get-Response-Normal: C4 01 invoke 00 <data>
//!                      C4 01 invoke 01 <data-access-result>
//! ```
//!
//! The trailing `00` of the request means "no selective access". Block
//! transfer (`C4 02`) is not supported and is reported as a protocol error.

use super::{request_decoder, DataAccessResult, GetDataResult};
use crate::addressing::CosemAttributeDescriptor;
use crate::apdu::{expect_header, tags};
use crate::invoke::InvokeIdAndPriority;
use bytes::{BufMut, BytesMut};
use hes_axdr::{AxdrDecoder, AxdrEncoder};
use hes_core::{DlmsError, DlmsResult, DlmsValue, ObisCode};

/// Decoded Get-Response-Normal
#[derive(Debug, Clone, PartialEq)]
pub struct GetResponse {
    pub invoke: InvokeIdAndPriority,
    pub result: GetDataResult,
}

/// Build a Get-Request-Normal
pub fn build_get_request(
    invoke: InvokeIdAndPriority,
    obis: ObisCode,
    class_id: u16,
    attribute_id: u8,
) -> Vec<u8> {
    encode_get_request(
        invoke,
        &CosemAttributeDescriptor::new(class_id, obis, attribute_id),
    )
}

pub(crate) fn encode_get_request(
    invoke: InvokeIdAndPriority,
    attribute: &CosemAttributeDescriptor,
) -> Vec<u8> {
    let mut buf = BytesMut::with_capacity(13);
    buf.put_u8(tags::GET_REQUEST);
    buf.put_u8(tags::NORMAL);
    buf.put_u8(invoke.byte());
    attribute.encode_into(&mut buf);
    buf.put_u8(0x00);
    buf.to_vec()
}

/// Decode a Get-Request-Normal (meter side)
pub fn decode_get_request(
    apdu: &[u8],
) -> DlmsResult<(InvokeIdAndPriority, CosemAttributeDescriptor)> {
    let mut decoder = request_decoder(apdu, tags::GET_REQUEST, "GET request")?;
    let invoke = InvokeIdAndPriority::from_byte(decoder.read_u8()?);
    let attribute = CosemAttributeDescriptor::decode(&mut decoder)?;
    if decoder.remaining() > 0 && decoder.read_u8()? != 0 {
        return Err(DlmsError::protocol("Selective access is not supported"));
    }
    Ok((invoke, attribute))
}

/// Build a Get-Response-Normal (meter side)
pub fn build_get_response(invoke: InvokeIdAndPriority, result: &GetDataResult) -> Vec<u8> {
    let mut encoder = AxdrEncoder::with_capacity(16);
    encoder.encode_raw(&[tags::GET_RESPONSE, tags::NORMAL, invoke.byte()]);
    match result {
        GetDataResult::Data(value) => {
            encoder.encode_raw(&[0x00]);
            encoder.encode_value(value);
        }
        GetDataResult::DataAccessError(error) => encoder.encode_raw(&[0x01, error.code()]),
    }
    encoder.into_bytes()
}

/// Decode a GET response without interpreting the result choice
pub fn decode_get_response(apdu: &[u8]) -> DlmsResult<GetResponse> {
    match expect_header(apdu, tags::GET_RESPONSE, "GET response")? {
        tags::NORMAL => {}
        tags::WITH_DATABLOCK => {
            return Err(DlmsError::protocol(
                "GET response with data block: block transfer is not supported",
            ));
        }
        other => {
            return Err(DlmsError::protocol(format!(
                "Unsupported GET response type {}",
                other
            )));
        }
    }

    let mut decoder = AxdrDecoder::at(apdu, 2)?;
    let invoke = InvokeIdAndPriority::from_byte(decoder.read_u8()?);
    let result = match decoder.read_u8()? {
        0x00 => GetDataResult::Data(decoder.decode_value()?),
        0x01 => GetDataResult::DataAccessError(DataAccessResult::from(decoder.read_u8()?)),
        other => {
            return Err(DlmsError::protocol(format!(
                "Invalid Get-Data-Result choice {}",
                other
            )));
        }
    };
    Ok(GetResponse { invoke, result })
}

/// Parse a GET response down to its value
///
/// # Errors
///
/// A data-access-result other than success becomes a `Protocol` error
/// carrying that code.
pub fn parse_get_response(apdu: &[u8]) -> DlmsResult<DlmsValue> {
    match decode_get_response(apdu)?.result {
        GetDataResult::Data(value) => Ok(value),
        GetDataResult::DataAccessError(result) => Err(DlmsError::protocol_code(
            format!("GET failed: {}", result),
            result.code(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hes_core::ErrorKind;

    #[test]
    fn test_build_get_request() {
        let apdu = build_get_request(
            InvokeIdAndPriority::new(1),
            ObisCode::new(1, 0, 15, 8, 0, 255),
            3,
            2,
        );
        assert_eq!(
            apdu,
            vec![0xC0, 0x01, 0xC1, 0x00, 0x03, 0x01, 0x00, 0x0F, 0x08, 0x00, 0xFF, 0x02, 0x00]
        );
    }

    #[test]
    fn test_get_request_decode() {
        let invoke = InvokeIdAndPriority::new(9);
        let obis = ObisCode::new(1, 0, 32, 7, 0, 255);
        let (decoded_invoke, attribute) =
            decode_get_request(&build_get_request(invoke, obis, 3, 2)).unwrap();
        assert_eq!(decoded_invoke, invoke);
        assert_eq!(attribute, CosemAttributeDescriptor::new(3, obis, 2));

        let mut selective = build_get_request(invoke, obis, 7, 2);
        *selective.last_mut().unwrap() = 0x01;
        assert!(decode_get_request(&selective).is_err());
    }

    #[test]
    fn test_get_response_builder() {
        let invoke = InvokeIdAndPriority::new(1);
        let apdu = build_get_response(invoke, &GetDataResult::Data(DlmsValue::Unsigned32(12345)));
        assert_eq!(apdu, vec![0xC4, 0x01, 0xC1, 0x00, 0x06, 0x00, 0x00, 0x30, 0x39]);

        let apdu = build_get_response(
            invoke,
            &GetDataResult::DataAccessError(DataAccessResult::ReadWriteDenied),
        );
        assert_eq!(apdu, vec![0xC4, 0x01, 0xC1, 0x01, 0x03]);
    }

    #[test]
    fn test_parse_get_response_value() {
        let apdu = [0xC4, 0x01, 0xC1, 0x00, 0x06, 0x00, 0x00, 0x30, 0x39];
        assert_eq!(parse_get_response(&apdu).unwrap(), DlmsValue::Unsigned32(12345));

        let decoded = decode_get_response(&apdu).unwrap();
        assert_eq!(decoded.invoke.invoke_id(), 1);
    }

    #[test]
    fn test_parse_get_response_access_error() {
        let apdu = [0xC4, 0x01, 0xC2, 0x01, 0x04];
        let decoded = decode_get_response(&apdu).unwrap();
        assert_eq!(
            decoded.result,
            GetDataResult::DataAccessError(DataAccessResult::ObjectUndefined)
        );

        let err = parse_get_response(&apdu).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Protocol);
        assert_eq!(err.code(), Some(4));
    }

    #[test]
    fn test_parse_get_response_rejects_block_transfer_and_truncation() {
        let err = parse_get_response(&[0xC4, 0x02, 0xC1, 0x00]).unwrap_err();
        assert!(err.to_string().contains("block transfer"));

        let err = parse_get_response(&[0xC4, 0x01, 0xC1, 0x00, 0x06, 0x00]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Protocol);

        let err = parse_get_response(&[0xC4, 0x01, 0xC1]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Protocol);
    }

    #[test]
    fn test_parse_get_response_unknown_type_tag_is_format_error() {
        let err = parse_get_response(&[0xC4, 0x01, 0xC1, 0x00, 0x07, 0x00]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);
    }
}
