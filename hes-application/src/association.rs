//! Association control: AARQ/AARE and RLRQ/RLRE
//!
//! The association PDUs are BER encoded (ISO ACSE); the user-information field
//! wraps an A-XDR encoded xDLMS InitiateRequest/InitiateResponse.
//!
//! ```text
//! AARQ: 60 len
//!         A1 09 06 07 60 85 74 05 08 01 01      application-context-name (LN, no ciphering)
//!         [8A 02 07 80]                         sender-acse-requirements (authentication)
//!         [8B 07 60 85 74 05 08 02 01]          mechanism-name (low level security)
//!         [AC len 80 len <password>]            calling-authentication-value
//!         BE 10 04 0E <InitiateRequest>         user-information
//! ```

use crate::apdu::tags;
use crate::ber::{write_tlv, BerReader};
use hes_axdr::AxdrDecoder;
use hes_core::{DlmsError, DlmsResult};
use log::debug;
use std::fmt;

/// Logical name referencing, no ciphering
pub const LN_NO_CIPHERING: [u8; 7] = [0x60, 0x85, 0x74, 0x05, 0x08, 0x01, 0x01];
/// Low level security (password) authentication mechanism
pub const LOW_LEVEL_SECURITY: [u8; 7] = [0x60, 0x85, 0x74, 0x05, 0x08, 0x02, 0x01];

/// Conformance bits proposed by default: GET, SET, ACTION, selective access, block transfer flags
pub const DEFAULT_CONFORMANCE: u32 = 0x00_7E_1F;
pub const DEFAULT_MAX_PDU_SIZE: u16 = 0x04B0;
pub const DLMS_VERSION: u8 = 6;

const INITIATE_REQUEST: u8 = 0x01;
const INITIATE_RESPONSE: u8 = 0x08;

/// AARQ parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AarqRequest {
    pub password: Option<Vec<u8>>,
    pub conformance: u32,
    pub max_receive_pdu_size: u16,
}

impl AarqRequest {
    pub fn new(password: Option<&[u8]>) -> Self {
        Self {
            password: password.map(<[u8]>::to_vec),
            conformance: DEFAULT_CONFORMANCE,
            max_receive_pdu_size: DEFAULT_MAX_PDU_SIZE,
        }
    }

    /// Encode the complete AARQ APDU
    pub fn encode(&self) -> Vec<u8> {
        let mut body = Vec::with_capacity(64);

        let mut context = Vec::with_capacity(9);
        write_tlv(&mut context, 0x06, &LN_NO_CIPHERING);
        write_tlv(&mut body, 0xA1, &context);

        if let Some(password) = &self.password {
            // sender-acse-requirements: bit string, authentication bit set
            write_tlv(&mut body, 0x8A, &[0x07, 0x80]);
            write_tlv(&mut body, 0x8B, &LOW_LEVEL_SECURITY);
            let mut auth = Vec::with_capacity(password.len() + 2);
            write_tlv(&mut auth, 0x80, password);
            write_tlv(&mut body, 0xAC, &auth);
        }

        let initiate = self.encode_initiate_request();
        let mut user_information = Vec::with_capacity(initiate.len() + 2);
        write_tlv(&mut user_information, 0x04, &initiate);
        write_tlv(&mut body, 0xBE, &user_information);

        let mut apdu = Vec::with_capacity(body.len() + 2);
        write_tlv(&mut apdu, tags::AARQ, &body);
        apdu
    }

    /// Parse an AARQ (meter side)
    pub fn decode(apdu: &[u8]) -> DlmsResult<Self> {
        let outer = BerReader::new(apdu).read_tlv()?;
        if outer.tag != tags::AARQ {
            return Err(DlmsError::protocol(format!(
                "Expected AARQ (0x60), got tag 0x{:02X}",
                outer.tag
            )));
        }

        let mut request = Self::new(None);
        let mut reader = BerReader::new(outer.value);
        while reader.has_remaining() {
            let element = reader.read_tlv()?;
            match element.tag {
                0xA1 => {
                    let name = BerReader::new(element.value).read_tlv()?;
                    if name.value != LN_NO_CIPHERING {
                        return Err(DlmsError::protocol(format!(
                            "Unsupported application context {:02X?}",
                            name.value
                        )));
                    }
                }
                0xAC => {
                    let value = BerReader::new(element.value).read_tlv()?;
                    request.password = Some(value.value.to_vec());
                }
                0xBE => {
                    let octets = BerReader::new(element.value).read_tlv()?;
                    request.decode_initiate_request(octets.value)?;
                }
                _ => {}
            }
        }
        Ok(request)
    }

    fn decode_initiate_request(&mut self, bytes: &[u8]) -> DlmsResult<()> {
        let mut decoder = AxdrDecoder::new(bytes);
        if decoder.read_u8()? != INITIATE_REQUEST {
            return Err(DlmsError::protocol("Expected InitiateRequest (0x01)"));
        }
        if decoder.read_u8()? != 0 {
            decoder.read_octet_string()?; // dedicated-key
        }
        if decoder.read_u8()? != 0 {
            decoder.read_u8()?; // response-allowed
        }
        if decoder.read_u8()? != 0 {
            decoder.read_u8()?; // proposed-quality-of-service
        }
        decoder.read_u8()?; // proposed-dlms-version
        if decoder.read_bytes(3)? != [0x5F, 0x1F, 0x04] {
            return Err(DlmsError::protocol("Malformed proposed conformance block"));
        }
        decoder.read_u8()?;
        let c = decoder.read_bytes(3)?;
        self.conformance = u32::from_be_bytes([0, c[0], c[1], c[2]]);
        self.max_receive_pdu_size = decoder.read_u16()?;
        Ok(())
    }

    /// `01 00 00 00 06 5F 1F 04 00 <conformance:3> <max-pdu:2>`
    fn encode_initiate_request(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(14);
        out.push(INITIATE_REQUEST);
        out.push(0x00); // dedicated-key absent
        out.push(0x00); // response-allowed default (true)
        out.push(0x00); // proposed-quality-of-service absent
        out.push(DLMS_VERSION);
        out.extend_from_slice(&[0x5F, 0x1F, 0x04, 0x00]);
        out.extend_from_slice(&self.conformance.to_be_bytes()[1..]);
        out.extend_from_slice(&self.max_receive_pdu_size.to_be_bytes());
        out
    }
}

/// Build an AARQ, with low level security when `password` is given
///
/// The client identity travels in the HDLC source address, not in the AARQ.
pub fn build_aarq(password: Option<&[u8]>) -> Vec<u8> {
    AarqRequest::new(password).encode()
}

/// Association-result field of the AARE
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssociationResult {
    Accepted,
    RejectedPermanent,
    RejectedTransient,
    Unknown(u8),
}

impl From<u8> for AssociationResult {
    fn from(value: u8) -> Self {
        match value {
            0 => AssociationResult::Accepted,
            1 => AssociationResult::RejectedPermanent,
            2 => AssociationResult::RejectedTransient,
            other => AssociationResult::Unknown(other),
        }
    }
}

impl AssociationResult {
    pub fn code(&self) -> u8 {
        match self {
            AssociationResult::Accepted => 0,
            AssociationResult::RejectedPermanent => 1,
            AssociationResult::RejectedTransient => 2,
            AssociationResult::Unknown(code) => *code,
        }
    }
}

impl fmt::Display for AssociationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssociationResult::Accepted => write!(f, "accepted"),
            AssociationResult::RejectedPermanent => write!(f, "rejected-permanent"),
            AssociationResult::RejectedTransient => write!(f, "rejected-transient"),
            AssociationResult::Unknown(code) => write!(f, "unknown({})", code),
        }
    }
}

/// Negotiated xDLMS parameters from the AARE user-information
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InitiateResponse {
    pub dlms_version: u8,
    pub conformance: u32,
    pub max_pdu_size: u16,
    pub vaa_name: u16,
}

impl InitiateResponse {
    /// `08 [01 qos | 00] version 5F 1F 04 unused <conformance:3> <max-pdu:2> <vaa:2>`
    pub fn decode(bytes: &[u8]) -> DlmsResult<Self> {
        let mut decoder = AxdrDecoder::new(bytes);
        let tag = decoder.read_u8()?;
        if tag != INITIATE_RESPONSE {
            return Err(DlmsError::protocol(format!(
                "Expected InitiateResponse (0x08), got 0x{:02X}",
                tag
            )));
        }
        if decoder.read_u8()? != 0 {
            decoder.read_u8()?; // negotiated-quality-of-service
        }
        let dlms_version = decoder.read_u8()?;
        if decoder.read_bytes(3)? != [0x5F, 0x1F, 0x04] {
            return Err(DlmsError::protocol("Malformed negotiated conformance block"));
        }
        decoder.read_u8()?; // unused bits
        let c = decoder.read_bytes(3)?;
        let conformance = u32::from_be_bytes([0, c[0], c[1], c[2]]);
        let max_pdu_size = decoder.read_u16()?;
        let vaa_name = decoder.read_u16()?;
        Ok(Self {
            dlms_version,
            conformance,
            max_pdu_size,
            vaa_name,
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(14);
        out.push(INITIATE_RESPONSE);
        out.push(0x00);
        out.push(self.dlms_version);
        out.extend_from_slice(&[0x5F, 0x1F, 0x04, 0x00]);
        out.extend_from_slice(&self.conformance.to_be_bytes()[1..]);
        out.extend_from_slice(&self.max_pdu_size.to_be_bytes());
        out.extend_from_slice(&self.vaa_name.to_be_bytes());
        out
    }
}

/// Parsed AARE
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AareResponse {
    pub result: AssociationResult,
    /// result-source-diagnostic value (acse-service-user or -provider)
    pub diagnostic: Option<u8>,
    pub initiate: Option<InitiateResponse>,
    /// confirmed-service-error code found in place of an InitiateResponse
    pub service_error: Option<u8>,
}

impl AareResponse {
    pub fn accepted(initiate: InitiateResponse) -> Self {
        Self {
            result: AssociationResult::Accepted,
            diagnostic: Some(0),
            initiate: Some(initiate),
            service_error: None,
        }
    }

    pub fn rejected(diagnostic: u8) -> Self {
        Self {
            result: AssociationResult::RejectedPermanent,
            diagnostic: Some(diagnostic),
            initiate: None,
            service_error: None,
        }
    }

    /// Encode the AARE (meter side); the diagnostic is reported as acse-service-user
    pub fn encode(&self) -> Vec<u8> {
        let mut body = Vec::with_capacity(48);

        let mut context = Vec::with_capacity(9);
        write_tlv(&mut context, 0x06, &LN_NO_CIPHERING);
        write_tlv(&mut body, 0xA1, &context);

        let mut result = Vec::with_capacity(3);
        write_tlv(&mut result, 0x02, &[self.result.code()]);
        write_tlv(&mut body, 0xA2, &result);

        let mut integer = Vec::with_capacity(3);
        write_tlv(&mut integer, 0x02, &[self.diagnostic.unwrap_or(0)]);
        let mut source = Vec::with_capacity(5);
        write_tlv(&mut source, 0xA1, &integer);
        write_tlv(&mut body, 0xA3, &source);

        let user_information = match (self.service_error, self.initiate) {
            (Some(code), _) => Some(vec![tags::CONFIRMED_SERVICE_ERROR, 0x01, 0x06, code]),
            (None, Some(initiate)) => Some(initiate.encode()),
            (None, None) => None,
        };
        if let Some(information) = user_information {
            let mut octets = Vec::with_capacity(information.len() + 2);
            write_tlv(&mut octets, 0x04, &information);
            write_tlv(&mut body, 0xBE, &octets);
        }

        let mut apdu = Vec::with_capacity(body.len() + 2);
        write_tlv(&mut apdu, tags::AARE, &body);
        apdu
    }

    pub fn is_accepted(&self) -> bool {
        self.result == AssociationResult::Accepted && self.service_error.is_none()
    }

    /// `Ok` with the negotiated parameters, or `Association` carrying the diagnostic
    pub fn into_result(self) -> DlmsResult<Option<InitiateResponse>> {
        if let Some(code) = self.service_error {
            return Err(DlmsError::Association(format!(
                "Association refused by xDLMS layer (service error {})",
                code
            )));
        }
        match self.result {
            AssociationResult::Accepted => Ok(self.initiate),
            result => {
                let diagnostic = self.diagnostic.unwrap_or(0);
                Err(DlmsError::Association(format!(
                    "Association {} with diagnostic {} ({})",
                    result,
                    diagnostic,
                    diagnostic_description(diagnostic)
                )))
            }
        }
    }
}

/// acse-service-user diagnostic names
pub fn diagnostic_description(code: u8) -> &'static str {
    match code {
        0 => "null",
        1 => "no-reason-given",
        2 => "application-context-name-not-supported",
        11 => "authentication-mechanism-name-not-recognised",
        12 => "authentication-mechanism-name-required",
        13 => "authentication-failure",
        14 => "authentication-required",
        _ => "unknown",
    }
}

/// Parse an AARE APDU
pub fn parse_aare(apdu: &[u8]) -> DlmsResult<AareResponse> {
    let outer = BerReader::new(apdu).read_tlv()?;
    if outer.tag != tags::AARE {
        return Err(DlmsError::protocol(format!(
            "Expected AARE (0x61), got tag 0x{:02X}",
            outer.tag
        )));
    }

    let mut result = None;
    let mut diagnostic = None;
    let mut initiate = None;
    let mut service_error = None;

    let mut reader = BerReader::new(outer.value);
    while reader.has_remaining() {
        let element = reader.read_tlv()?;
        match element.tag {
            0xA2 => result = Some(read_integer(element.value)?),
            0xA3 => {
                // A1 = acse-service-user, A2 = acse-service-provider
                let source = BerReader::new(element.value).read_tlv()?;
                diagnostic = Some(read_integer(source.value)?);
            }
            0xBE => {
                let octets = BerReader::new(element.value).read_tlv()?;
                match octets.value.first() {
                    Some(&INITIATE_RESPONSE) => {
                        initiate = Some(InitiateResponse::decode(octets.value)?)
                    }
                    Some(&tags::CONFIRMED_SERVICE_ERROR) => {
                        service_error = octets.value.last().copied()
                    }
                    _ => debug!("Ignoring unrecognised AARE user-information"),
                }
            }
            other => debug!("Skipping AARE element 0x{:02X}", other),
        }
    }

    let result = result.ok_or_else(|| DlmsError::protocol("AARE without association result"))?;
    Ok(AareResponse {
        result: AssociationResult::from(result),
        diagnostic,
        initiate,
        service_error,
    })
}

/// `02 01 value` wrapped in a context tag
fn read_integer(value: &[u8]) -> DlmsResult<u8> {
    let integer = BerReader::new(value).read_tlv()?;
    if integer.tag != 0x02 || integer.value.len() != 1 {
        return Err(DlmsError::protocol("Malformed AARE integer field"));
    }
    Ok(integer.value[0])
}

/// Release request with reason "normal"
pub fn build_rlrq() -> Vec<u8> {
    vec![tags::RLRQ, 0x03, 0x80, 0x01, 0x00]
}

/// Release response with reason "normal"
pub fn build_rlre() -> Vec<u8> {
    vec![tags::RLRE, 0x03, 0x80, 0x01, 0x00]
}

/// Parse an RLRE, returning the release reason when present
pub fn parse_rlre(apdu: &[u8]) -> DlmsResult<Option<u8>> {
    let outer = BerReader::new(apdu).read_tlv()?;
    if outer.tag != tags::RLRE {
        return Err(DlmsError::protocol(format!(
            "Expected RLRE (0x63), got tag 0x{:02X}",
            outer.tag
        )));
    }
    let mut reader = BerReader::new(outer.value);
    while reader.has_remaining() {
        let element = reader.read_tlv()?;
        if element.tag == 0x80 {
            return Ok(element.value.first().copied());
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hes_core::ErrorKind;

    const ACCEPTED_AARE: [u8; 43] = [
        0x61, 0x29, 0xA1, 0x09, 0x06, 0x07, 0x60, 0x85, 0x74, 0x05, 0x08, 0x01, 0x01, 0xA2, 0x03,
        0x02, 0x01, 0x00, 0xA3, 0x05, 0xA1, 0x03, 0x02, 0x01, 0x00, 0xBE, 0x10, 0x04, 0x0E, 0x08,
        0x00, 0x06, 0x5F, 0x1F, 0x04, 0x00, 0x00, 0x50, 0x1F, 0x01, 0xF4, 0x00, 0x07,
    ];

    #[test]
    fn test_aarq_without_password() {
        let expected = vec![
            0x60, 0x1D, 0xA1, 0x09, 0x06, 0x07, 0x60, 0x85, 0x74, 0x05, 0x08, 0x01, 0x01, 0xBE,
            0x10, 0x04, 0x0E, 0x01, 0x00, 0x00, 0x00, 0x06, 0x5F, 0x1F, 0x04, 0x00, 0x00, 0x7E,
            0x1F, 0x04, 0xB0,
        ];
        assert_eq!(build_aarq(None), expected);
    }

    #[test]
    fn test_aarq_with_password() {
        let apdu = build_aarq(Some(b"12345678"));
        assert_eq!(apdu[0], 0x60);
        assert_eq!(apdu[1] as usize, apdu.len() - 2);
        assert_eq!(apdu[1], 0x36);
        assert_eq!(&apdu[13..17], &[0x8A, 0x02, 0x07, 0x80]);
        assert_eq!(&apdu[17..19], &[0x8B, 0x07]);
        assert_eq!(&apdu[19..26], &LOW_LEVEL_SECURITY);
        assert_eq!(&apdu[26..30], &[0xAC, 0x0A, 0x80, 0x08]);
        assert_eq!(&apdu[30..38], b"12345678");
        assert_eq!(apdu[38], 0xBE);
    }

    #[test]
    fn test_parse_accepted_aare() {
        let aare = parse_aare(&ACCEPTED_AARE).unwrap();
        assert!(aare.is_accepted());
        assert_eq!(aare.diagnostic, Some(0));
        let initiate = aare.into_result().unwrap().unwrap();
        assert_eq!(initiate.dlms_version, 6);
        assert_eq!(initiate.conformance, 0x00501F);
        assert_eq!(initiate.max_pdu_size, 500);
        assert_eq!(initiate.vaa_name, 7);
    }

    #[test]
    fn test_rejected_aare_is_association_error() {
        let mut apdu = ACCEPTED_AARE;
        apdu[17] = 0x01; // rejected-permanent
        apdu[24] = 0x0D; // authentication-failure
        let aare = parse_aare(&apdu).unwrap();
        assert_eq!(aare.result, AssociationResult::RejectedPermanent);
        let err = aare.into_result().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Association);
        assert!(err.to_string().contains("13"));
        assert!(err.to_string().contains("authentication-failure"));
    }

    #[test]
    fn test_parse_aare_rejects_other_tag() {
        let err = parse_aare(&[0x63, 0x00]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Protocol);
        let err = parse_aare(&[0x61, 0x05, 0xA1, 0x03, 0x06, 0x01, 0x00]).unwrap_err();
        assert!(err.to_string().contains("without association result"));
    }

    #[test]
    fn test_aare_encode_matches_wire_form() {
        let initiate = InitiateResponse {
            dlms_version: 6,
            conformance: 0x00501F,
            max_pdu_size: 500,
            vaa_name: 7,
        };
        assert_eq!(AareResponse::accepted(initiate).encode(), ACCEPTED_AARE.to_vec());

        let rejected = parse_aare(&AareResponse::rejected(13).encode()).unwrap();
        assert_eq!(rejected.result, AssociationResult::RejectedPermanent);
        assert_eq!(rejected.diagnostic, Some(13));
        assert!(rejected.initiate.is_none());
    }

    #[test]
    fn test_aarq_decode() {
        let request = AarqRequest::decode(&build_aarq(Some(b"secret"))).unwrap();
        assert_eq!(request.password.as_deref(), Some(&b"secret"[..]));
        assert_eq!(request.conformance, DEFAULT_CONFORMANCE);
        assert_eq!(request.max_receive_pdu_size, DEFAULT_MAX_PDU_SIZE);

        let request = AarqRequest::decode(&build_aarq(None)).unwrap();
        assert!(request.password.is_none());

        assert!(AarqRequest::decode(&build_rlrq()).is_err());
    }

    #[test]
    fn test_release() {
        assert_eq!(build_rlrq(), vec![0x62, 0x03, 0x80, 0x01, 0x00]);
        assert_eq!(parse_rlre(&[0x63, 0x03, 0x80, 0x01, 0x00]).unwrap(), Some(0));
        assert_eq!(parse_rlre(&[0x63, 0x00]).unwrap(), None);
        assert!(parse_rlre(&[0x61, 0x00]).is_err());
        assert_eq!(parse_rlre(&build_rlre()).unwrap(), Some(0));
    }
}
