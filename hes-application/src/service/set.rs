//! SET service
//!
//! ```text
//! Set-Request-Normal:  C1 01 invoke class(2) instance(6) attribute(1) 00 <data>
//! Set-Response-Normal: C5 01 invoke <data-access-result>
//! ```

use super::{request_decoder, DataAccessResult};
use crate::addressing::CosemAttributeDescriptor;
use crate::apdu::{expect_header, tags};
use crate::invoke::InvokeIdAndPriority;
use bytes::{BufMut, BytesMut};
use hes_core::{DlmsError, DlmsResult, DlmsValue, ObisCode};

/// Build a Set-Request-Normal around an already encoded value
pub fn build_set_request(
    invoke: InvokeIdAndPriority,
    obis: ObisCode,
    class_id: u16,
    attribute_id: u8,
    encoded_value: &[u8],
) -> Vec<u8> {
    encode_set_request(
        invoke,
        &CosemAttributeDescriptor::new(class_id, obis, attribute_id),
        encoded_value,
    )
}

pub(crate) fn encode_set_request(
    invoke: InvokeIdAndPriority,
    attribute: &CosemAttributeDescriptor,
    encoded_value: &[u8],
) -> Vec<u8> {
    let mut buf = BytesMut::with_capacity(13 + encoded_value.len());
    buf.put_u8(tags::SET_REQUEST);
    buf.put_u8(tags::NORMAL);
    buf.put_u8(invoke.byte());
    attribute.encode_into(&mut buf);
    buf.put_u8(0x00);
    buf.put_slice(encoded_value);
    buf.to_vec()
}

/// Decode a Set-Request-Normal (meter side)
pub fn decode_set_request(
    apdu: &[u8],
) -> DlmsResult<(InvokeIdAndPriority, CosemAttributeDescriptor, DlmsValue)> {
    let mut decoder = request_decoder(apdu, tags::SET_REQUEST, "SET request")?;
    let invoke = InvokeIdAndPriority::from_byte(decoder.read_u8()?);
    let attribute = CosemAttributeDescriptor::decode(&mut decoder)?;
    if decoder.read_u8()? != 0 {
        return Err(DlmsError::protocol("Selective access is not supported"));
    }
    let value = decoder.decode_value()?;
    Ok((invoke, attribute, value))
}

pub fn build_set_response(invoke: InvokeIdAndPriority, result: DataAccessResult) -> Vec<u8> {
    vec![tags::SET_RESPONSE, tags::NORMAL, invoke.byte(), result.code()]
}

/// Validate a Set-Response-Normal
pub fn parse_set_response(apdu: &[u8]) -> DlmsResult<()> {
    let response_type = expect_header(apdu, tags::SET_RESPONSE, "SET response")?;
    if response_type != tags::NORMAL {
        return Err(DlmsError::protocol(format!(
            "Unsupported SET response type {}",
            response_type
        )));
    }
    let result = DataAccessResult::from(
        *apdu
            .get(3)
            .ok_or_else(|| DlmsError::protocol("SET response truncated"))?,
    );
    if result.is_success() {
        Ok(())
    } else {
        Err(DlmsError::protocol_code(
            format!("SET failed: {}", result),
            result.code(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hes_core::ErrorKind;

    #[test]
    fn test_build_set_request() {
        let value = hes_axdr::encode(&DlmsValue::Unsigned8(5));
        let apdu = build_set_request(
            InvokeIdAndPriority::new(2),
            ObisCode::new(0, 0, 96, 3, 10, 255),
            70,
            4,
            &value,
        );
        assert_eq!(
            apdu,
            vec![
                0xC1, 0x01, 0xC2, 0x00, 0x46, 0x00, 0x00, 0x60, 0x03, 0x0A, 0xFF, 0x04, 0x00,
                0x11, 0x05
            ]
        );
    }

    #[test]
    fn test_set_request_decode() {
        let obis = ObisCode::new(0, 0, 1, 0, 0, 255);
        let value = DlmsValue::OctetString(vec![0x07, 0xE8, 0x03, 0x0F]);
        let apdu = build_set_request(
            InvokeIdAndPriority::new(4),
            obis,
            8,
            2,
            &hes_axdr::encode(&value),
        );
        let (invoke, attribute, decoded) = decode_set_request(&apdu).unwrap();
        assert_eq!(invoke.invoke_id(), 4);
        assert_eq!(attribute, CosemAttributeDescriptor::new(8, obis, 2));
        assert_eq!(decoded, value);

        let response = build_set_response(invoke, DataAccessResult::TypeUnmatched);
        assert_eq!(parse_set_response(&response).unwrap_err().code(), Some(12));
    }

    #[test]
    fn test_parse_set_response() {
        assert!(parse_set_response(&[0xC5, 0x01, 0xC1, 0x00]).is_ok());

        let err = parse_set_response(&[0xC5, 0x01, 0xC1, 0x03]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Protocol);
        assert_eq!(err.code(), Some(3));

        assert!(parse_set_response(&[0xC5, 0x01, 0xC1]).is_err());
    }
}
