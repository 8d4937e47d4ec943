//! HDLC frame structure and encoding/decoding
//!
//! ```text
//! 7E | A0|len (2) | dest | src | control | HCS (2) | information | FCS (2) | 7E
//! ```
//! Frames without an information field carry only the FCS after the control
//! byte. The 11-bit length counts every byte between the flags.

use crate::hdlc::address::HdlcAddress;
use crate::hdlc::fcs::{fcs16, verify};
use hes_core::{DlmsError, DlmsResult};
use std::fmt;

/// HDLC frame flag
pub const FLAG: u8 = 0x7E;

/// LLC header on client-to-server information frames
pub const LLC_REQUEST: [u8; 3] = [0xE6, 0xE6, 0x00];

/// LLC header on server-to-client information frames
pub const LLC_RESPONSE: [u8; 3] = [0xE6, 0xE7, 0x00];

const FORMAT_TYPE_3: u8 = 0xA0;
const SEGMENTATION_BIT: u8 = 0x08;
const LENGTH_MASK: u16 = 0x07FF;
const POLL_FINAL: u8 = 0x10;

/// HDLC frame type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameType {
    Information,
    ReceiveReady,
    ReceiveNotReady,
    SetNormalResponseMode,
    Disconnect,
    UnnumberedAcknowledge,
    DisconnectMode,
    FrameReject,
    UnnumberedInformation,
}

impl FrameType {
    /// Classify a control byte, ignoring the poll/final bit
    pub fn from_control_byte(control: u8) -> Option<Self> {
        let frame_type = match control {
            x if x & 0x01 == 0x00 => FrameType::Information,
            x if x & 0x0F == 0x01 => FrameType::ReceiveReady,
            x if x & 0x0F == 0x05 => FrameType::ReceiveNotReady,
            x if x & 0xEF == 0x83 => FrameType::SetNormalResponseMode,
            x if x & 0xEF == 0x43 => FrameType::Disconnect,
            x if x & 0xEF == 0x63 => FrameType::UnnumberedAcknowledge,
            x if x & 0xEF == 0x0F => FrameType::DisconnectMode,
            x if x & 0xEF == 0x87 => FrameType::FrameReject,
            x if x & 0xEF == 0x03 => FrameType::UnnumberedInformation,
            _ => return None,
        };
        Some(frame_type)
    }
}

/// Strip the LLC header from an information field, if present
pub fn strip_llc(information: &[u8]) -> &[u8] {
    if information.starts_with(&LLC_REQUEST) || information.starts_with(&LLC_RESPONSE) {
        &information[3..]
    } else {
        information
    }
}

/// HDLC frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HdlcFrame {
    destination: HdlcAddress,
    source: HdlcAddress,
    control: u8,
    information: Vec<u8>,
    segmented: bool,
}

impl HdlcFrame {
    fn unnumbered(destination: HdlcAddress, source: HdlcAddress, control: u8, information: Vec<u8>) -> Self {
        Self {
            destination,
            source,
            control: control | POLL_FINAL,
            information,
            segmented: false,
        }
    }

    /// Set Normal Response Mode, opens the link
    pub fn snrm(destination: HdlcAddress, source: HdlcAddress) -> Self {
        Self::unnumbered(destination, source, 0x83, Vec::new())
    }

    /// Disconnect, closes the link
    pub fn disc(destination: HdlcAddress, source: HdlcAddress) -> Self {
        Self::unnumbered(destination, source, 0x43, Vec::new())
    }

    /// Unnumbered acknowledge, optionally carrying link parameters
    pub fn ua(destination: HdlcAddress, source: HdlcAddress, information: Vec<u8>) -> Self {
        Self::unnumbered(destination, source, 0x63, information)
    }

    /// Disconnected mode, the link is not open
    pub fn dm(destination: HdlcAddress, source: HdlcAddress) -> Self {
        Self::unnumbered(destination, source, 0x0F, Vec::new())
    }

    /// Information frame with send sequence `ns` and receive sequence `nr` (mod 8)
    pub fn information(
        destination: HdlcAddress,
        source: HdlcAddress,
        ns: u8,
        nr: u8,
        information: Vec<u8>,
    ) -> Self {
        Self {
            destination,
            source,
            control: ((nr & 0x07) << 5) | POLL_FINAL | ((ns & 0x07) << 1),
            information,
            segmented: false,
        }
    }

    pub fn receive_ready(destination: HdlcAddress, source: HdlcAddress, nr: u8) -> Self {
        Self::unnumbered(destination, source, ((nr & 0x07) << 5) | 0x01, Vec::new())
    }

    /// Encode the frame, flags included
    pub fn encode(&self) -> DlmsResult<Vec<u8>> {
        let destination = self.destination.encode();
        let source = self.source.encode();
        let header_len = 2 + destination.len() + source.len() + 1;
        let length = if self.information.is_empty() {
            header_len + 2
        } else {
            header_len + 2 + self.information.len() + 2
        };
        if length > LENGTH_MASK as usize {
            return Err(DlmsError::Format(format!(
                "Frame of {} bytes exceeds the 11-bit length field",
                length
            )));
        }

        let mut body = Vec::with_capacity(length + 2);
        let mut format = FORMAT_TYPE_3 | ((length >> 8) as u8 & 0x07);
        if self.segmented {
            format |= SEGMENTATION_BIT;
        }
        body.push(format);
        body.push(length as u8);
        body.extend_from_slice(&destination);
        body.extend_from_slice(&source);
        body.push(self.control);

        let hcs = fcs16(&body);
        body.extend_from_slice(&hcs);
        if !self.information.is_empty() {
            body.extend_from_slice(&self.information);
            let fcs = fcs16(&body);
            body.extend_from_slice(&fcs);
        }

        let mut frame = Vec::with_capacity(body.len() + 2);
        frame.push(FLAG);
        frame.extend_from_slice(&body);
        frame.push(FLAG);
        Ok(frame)
    }

    /// Decode one frame, flags included
    ///
    /// # Errors
    ///
    /// Returns `Protocol` for a bad flag, format, length, address, control
    /// byte, HCS or FCS.
    pub fn decode(frame: &[u8]) -> DlmsResult<Self> {
        if frame.len() < 9 || frame[0] != FLAG || frame[frame.len() - 1] != FLAG {
            return Err(DlmsError::protocol("HDLC frame is not delimited by flags"));
        }
        let body = &frame[1..frame.len() - 1];

        let format = u16::from_be_bytes([body[0], body[1]]);
        if body[0] & 0xF0 != FORMAT_TYPE_3 {
            return Err(DlmsError::protocol(format!(
                "Illegal frame format 0x{:04X}",
                format
            )));
        }
        if (format & LENGTH_MASK) as usize != body.len() {
            return Err(DlmsError::protocol(format!(
                "Frame length field {} does not match {} bytes",
                format & LENGTH_MASK,
                body.len()
            )));
        }
        let segmented = body[0] & SEGMENTATION_BIT != 0;

        let mut pos = 2;
        let (destination, len) = HdlcAddress::decode(&body[pos..])?;
        pos += len;
        let (source, len) = HdlcAddress::decode(&body[pos..])?;
        pos += len;
        let control = *body
            .get(pos)
            .ok_or_else(|| DlmsError::protocol("Frame too short for control field"))?;
        pos += 1;
        if FrameType::from_control_byte(control).is_none() {
            return Err(DlmsError::protocol(format!(
                "Control field unknown: 0x{:02X}",
                control
            )));
        }

        if body.len() < pos + 2 {
            return Err(DlmsError::protocol("Frame too short for check sequence"));
        }
        if !verify(&body[..pos + 2]) {
            return Err(DlmsError::protocol("Header check sequence mismatch"));
        }

        let information = if body.len() == pos + 2 {
            Vec::new()
        } else {
            if body.len() < pos + 4 {
                return Err(DlmsError::protocol("Frame too short for frame check sequence"));
            }
            if !verify(body) {
                return Err(DlmsError::protocol("Frame check sequence mismatch"));
            }
            body[pos + 2..body.len() - 2].to_vec()
        };

        Ok(Self {
            destination,
            source,
            control,
            information,
            segmented,
        })
    }

    pub fn frame_type(&self) -> FrameType {
        // Control bytes are validated on construction and decode.
        FrameType::from_control_byte(self.control).unwrap_or(FrameType::FrameReject)
    }

    pub fn control(&self) -> u8 {
        self.control
    }

    /// N(S) of an information frame
    pub fn send_sequence(&self) -> Option<u8> {
        (self.frame_type() == FrameType::Information).then_some((self.control >> 1) & 0x07)
    }

    /// N(R) of an information or supervisory frame
    pub fn receive_sequence(&self) -> Option<u8> {
        match self.frame_type() {
            FrameType::Information | FrameType::ReceiveReady | FrameType::ReceiveNotReady => {
                Some(self.control >> 5)
            }
            _ => None,
        }
    }

    pub fn information_field(&self) -> &[u8] {
        &self.information
    }

    pub fn into_information(self) -> Vec<u8> {
        self.information
    }

    pub fn destination(&self) -> HdlcAddress {
        self.destination
    }

    pub fn source(&self) -> HdlcAddress {
        self.source
    }

    pub fn is_segmented(&self) -> bool {
        self.segmented
    }

    pub fn set_segmented(&mut self, segmented: bool) {
        self.segmented = segmented;
    }
}

impl fmt::Display for HdlcFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "HDLC {:?} {} -> {} ({} info bytes)",
            self.frame_type(),
            self.source,
            self.destination,
            self.information.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server() -> HdlcAddress {
        HdlcAddress::server(1, None).unwrap()
    }

    fn client() -> HdlcAddress {
        HdlcAddress::client(16).unwrap()
    }

    #[test]
    fn test_snrm_bytes() {
        let bytes = HdlcFrame::snrm(server(), client()).encode().unwrap();
        assert_eq!(&bytes[..6], &[0x7E, 0xA0, 0x07, 0x03, 0x21, 0x93]);
        assert_eq!(bytes.len(), 9);
        assert_eq!(bytes[8], FLAG);
        let decoded = HdlcFrame::decode(&bytes).unwrap();
        assert_eq!(decoded.frame_type(), FrameType::SetNormalResponseMode);
        assert!(decoded.information_field().is_empty());
    }

    #[test]
    fn test_control_bytes() {
        assert_eq!(HdlcFrame::disc(server(), client()).control(), 0x53);
        assert_eq!(HdlcFrame::ua(client(), server(), vec![]).control(), 0x73);
        assert_eq!(HdlcFrame::receive_ready(server(), client(), 1).control(), 0x31);
        assert_eq!(
            HdlcFrame::information(server(), client(), 0, 0, vec![1]).control(),
            0x10
        );
        let frame = HdlcFrame::information(server(), client(), 3, 5, vec![1]);
        assert_eq!(frame.control(), 0xB6);
        assert_eq!(frame.send_sequence(), Some(3));
        assert_eq!(frame.receive_sequence(), Some(5));
    }

    #[test]
    fn test_information_frame_round_trip() {
        let mut info = LLC_REQUEST.to_vec();
        info.extend_from_slice(&[0xC0, 0x01, 0xC1, 0x00, 0x08]);
        let frame = HdlcFrame::information(server(), client(), 0, 0, info.clone());
        let bytes = frame.encode().unwrap();
        assert_eq!(bytes[2] as usize, bytes.len() - 2);
        let decoded = HdlcFrame::decode(&bytes).unwrap();
        assert_eq!(decoded, frame);
        assert_eq!(strip_llc(decoded.information_field()), &info[3..]);
    }

    #[test]
    fn test_decode_rejects_corruption() {
        let frame = HdlcFrame::information(server(), client(), 0, 0, vec![0xE6, 0xE7, 0x00, 0xC4]);
        let bytes = frame.encode().unwrap();

        let mut bad_hcs = bytes.clone();
        bad_hcs[6] ^= 0xFF;
        assert!(HdlcFrame::decode(&bad_hcs).is_err());

        let mut bad_fcs = bytes.clone();
        let fcs_pos = bad_fcs.len() - 2;
        bad_fcs[fcs_pos] ^= 0xFF;
        assert!(HdlcFrame::decode(&bad_fcs).is_err());

        let mut bad_info = bytes;
        bad_info[9] ^= 0x01;
        assert!(HdlcFrame::decode(&bad_info).is_err());
    }

    #[test]
    fn test_segmented_flag_survives() {
        let mut frame = HdlcFrame::information(server(), client(), 0, 0, vec![0xAA]);
        frame.set_segmented(true);
        let bytes = frame.encode().unwrap();
        assert_eq!(bytes[1], 0xA8);
        assert!(HdlcFrame::decode(&bytes).unwrap().is_segmented());
    }
}
