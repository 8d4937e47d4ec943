//! ACTION service
//!
//! ```text
//! Action-Request-Normal:  C3 01 invoke class(2) instance(6) method(1) 01 <data>
//!                         C3 01 invoke class(2) instance(6) method(1) 00
//! Action-Response-Normal: C7 01 invoke <action-result> [01 <get-data-result> | 00]
//! ```

use super::{request_decoder, DataAccessResult};
use crate::addressing::CosemMethodDescriptor;
use crate::apdu::{expect_header, tags};
use crate::invoke::InvokeIdAndPriority;
use bytes::{BufMut, BytesMut};
use hes_axdr::{AxdrDecoder, AxdrEncoder};
use hes_core::{DlmsError, DlmsResult, DlmsValue, ObisCode};

/// Build an Action-Request-Normal; `encoded_params` is an encoded value
pub fn build_action_request(
    invoke: InvokeIdAndPriority,
    obis: ObisCode,
    class_id: u16,
    method_id: u8,
    encoded_params: Option<&[u8]>,
) -> Vec<u8> {
    encode_action_request(
        invoke,
        &CosemMethodDescriptor::new(class_id, obis, method_id),
        encoded_params,
    )
}

pub(crate) fn encode_action_request(
    invoke: InvokeIdAndPriority,
    method: &CosemMethodDescriptor,
    encoded_params: Option<&[u8]>,
) -> Vec<u8> {
    let mut buf = BytesMut::with_capacity(14 + encoded_params.map_or(0, <[u8]>::len));
    buf.put_u8(tags::ACTION_REQUEST);
    buf.put_u8(tags::NORMAL);
    buf.put_u8(invoke.byte());
    method.encode_into(&mut buf);
    match encoded_params {
        Some(params) => {
            buf.put_u8(0x01);
            buf.put_slice(params);
        }
        None => buf.put_u8(0x00),
    }
    buf.to_vec()
}

/// Decode an Action-Request-Normal (meter side)
pub fn decode_action_request(
    apdu: &[u8],
) -> DlmsResult<(InvokeIdAndPriority, CosemMethodDescriptor, Option<DlmsValue>)> {
    let mut decoder = request_decoder(apdu, tags::ACTION_REQUEST, "ACTION request")?;
    let invoke = InvokeIdAndPriority::from_byte(decoder.read_u8()?);
    let method = CosemMethodDescriptor::decode(&mut decoder)?;
    let parameters = match decoder.read_u8()? {
        0 => None,
        _ => Some(decoder.decode_value()?),
    };
    Ok((invoke, method, parameters))
}

/// Build an Action-Response-Normal (meter side)
pub fn build_action_response(
    invoke: InvokeIdAndPriority,
    result: DataAccessResult,
    return_value: Option<&DlmsValue>,
) -> Vec<u8> {
    let mut encoder = AxdrEncoder::with_capacity(8);
    encoder.encode_raw(&[tags::ACTION_RESPONSE, tags::NORMAL, invoke.byte(), result.code()]);
    match return_value {
        Some(value) => {
            encoder.encode_raw(&[0x01, 0x00]);
            encoder.encode_value(value);
        }
        None => encoder.encode_raw(&[0x00]),
    }
    encoder.into_bytes()
}

/// Validate an Action-Response-Normal, returning the optional return value
///
/// # Errors
///
/// A non-success action-result becomes a `Protocol` error carrying the code.
pub fn parse_action_response(apdu: &[u8]) -> DlmsResult<Option<DlmsValue>> {
    let response_type = expect_header(apdu, tags::ACTION_RESPONSE, "ACTION response")?;
    if response_type != tags::NORMAL {
        return Err(DlmsError::protocol(format!(
            "Unsupported ACTION response type {}",
            response_type
        )));
    }

    let mut decoder = AxdrDecoder::at(apdu, 3)?;
    let result = DataAccessResult::from(decoder.read_u8()?);
    if !result.is_success() {
        return Err(DlmsError::protocol_code(
            format!("ACTION failed: {}", result),
            result.code(),
        ));
    }

    // return-parameters are optional; some meters omit even the presence byte
    if decoder.remaining() == 0 || decoder.read_u8()? == 0 {
        return Ok(None);
    }
    match decoder.read_u8()? {
        0x00 => Ok(Some(decoder.decode_value()?)),
        0x01 => {
            let result = DataAccessResult::from(decoder.read_u8()?);
            Err(DlmsError::protocol_code(
                format!("ACTION return data unavailable: {}", result),
                result.code(),
            ))
        }
        other => Err(DlmsError::protocol(format!(
            "Invalid Get-Data-Result choice {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hes_core::ErrorKind;

    const RELAY: ObisCode = ObisCode::new(0, 0, 96, 3, 10, 255);

    #[test]
    fn test_build_relay_disconnect() {
        let params = hes_axdr::encode(&DlmsValue::Integer8(0));
        let apdu = build_action_request(InvokeIdAndPriority::new(3), RELAY, 70, 2, Some(&params));
        assert_eq!(
            apdu,
            vec![
                0xC3, 0x01, 0xC3, 0x00, 0x46, 0x00, 0x00, 0x60, 0x03, 0x0A, 0xFF, 0x02, 0x01,
                0x0F, 0x00
            ]
        );
    }

    #[test]
    fn test_build_action_without_parameters() {
        let apdu = build_action_request(InvokeIdAndPriority::new(1), RELAY, 70, 1, None);
        assert_eq!(apdu.len(), 13);
        assert_eq!(apdu[11], 0x01);
        assert_eq!(apdu[12], 0x00);
    }

    #[test]
    fn test_parse_action_response() {
        assert_eq!(parse_action_response(&[0xC7, 0x01, 0xC1, 0x00]).unwrap(), None);
        assert_eq!(
            parse_action_response(&[0xC7, 0x01, 0xC1, 0x00, 0x00]).unwrap(),
            None
        );
        assert_eq!(
            parse_action_response(&[0xC7, 0x01, 0xC1, 0x00, 0x01, 0x00, 0x03, 0x01]).unwrap(),
            Some(DlmsValue::Boolean(true))
        );
    }

    #[test]
    fn test_action_request_decode() {
        let params = hes_axdr::encode(&DlmsValue::Integer8(0));
        let apdu = build_action_request(InvokeIdAndPriority::new(3), RELAY, 70, 2, Some(&params));
        let (invoke, method, parameters) = decode_action_request(&apdu).unwrap();
        assert_eq!(invoke.invoke_id(), 3);
        assert_eq!(method, CosemMethodDescriptor::new(70, RELAY, 2));
        assert_eq!(parameters, Some(DlmsValue::Integer8(0)));

        let response = build_action_response(invoke, DataAccessResult::Success, None);
        assert_eq!(response, vec![0xC7, 0x01, 0xC3, 0x00, 0x00]);
        assert_eq!(parse_action_response(&response).unwrap(), None);
    }

    #[test]
    fn test_parse_action_response_failure() {
        let err = parse_action_response(&[0xC7, 0x01, 0xC1, 0x03]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Protocol);
        assert_eq!(err.code(), Some(3));
    }
}
