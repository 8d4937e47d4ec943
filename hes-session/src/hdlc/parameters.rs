//! HDLC link parameter negotiation (SNRM/UA information field)
//!
//! ```text
//! 81 80 len | 05 n max-info-transmit | 06 n max-info-receive
//!           | 07 n window-transmit   | 08 n window-receive
//! ```
//! Values are big-endian and of variable width; directions are as seen by
//! the station that sends the field.

use hes_core::{DlmsError, DlmsResult};

const FORMAT_IDENTIFIER: u8 = 0x81;
const GROUP_IDENTIFIER: u8 = 0x80;
const MAX_INFO_TRANSMIT: u8 = 0x05;
const MAX_INFO_RECEIVE: u8 = 0x06;
const WINDOW_TRANSMIT: u8 = 0x07;
const WINDOW_RECEIVE: u8 = 0x08;

/// Negotiated link parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkParameters {
    pub max_info_transmit: u16,
    pub max_info_receive: u16,
    pub window_transmit: u8,
    pub window_receive: u8,
}

impl Default for LinkParameters {
    fn default() -> Self {
        Self {
            max_info_transmit: 128,
            max_info_receive: 128,
            window_transmit: 1,
            window_receive: 1,
        }
    }
}

impl LinkParameters {
    /// Parse a UA (or SNRM) information field
    ///
    /// An empty field yields the defaults. Unknown parameter ids are skipped.
    pub fn decode(information: &[u8]) -> DlmsResult<Self> {
        let mut params = Self::default();
        if information.is_empty() {
            return Ok(params);
        }
        if information.len() < 3
            || information[0] != FORMAT_IDENTIFIER
            || information[1] != GROUP_IDENTIFIER
        {
            return Err(DlmsError::protocol(format!(
                "Invalid link parameter header {:02X?}",
                &information[..information.len().min(3)]
            )));
        }
        let group_len = information[2] as usize;
        let group = information
            .get(3..3 + group_len)
            .ok_or_else(|| DlmsError::protocol("Link parameter group is truncated"))?;

        let mut pos = 0;
        while pos + 2 <= group.len() {
            let id = group[pos];
            let len = group[pos + 1] as usize;
            let value = group
                .get(pos + 2..pos + 2 + len)
                .ok_or_else(|| DlmsError::protocol(format!("Link parameter 0x{:02X} is truncated", id)))?;
            let number = value.iter().fold(0u32, |acc, b| (acc << 8) | *b as u32);
            match id {
                MAX_INFO_TRANSMIT => params.max_info_transmit = number.min(u16::MAX as u32) as u16,
                MAX_INFO_RECEIVE => params.max_info_receive = number.min(u16::MAX as u32) as u16,
                WINDOW_TRANSMIT => params.window_transmit = number.min(7) as u8,
                WINDOW_RECEIVE => params.window_receive = number.min(7) as u8,
                other => log::debug!("HDLC: ignoring link parameter 0x{:02X}", other),
            }
            pos += 2 + len;
        }
        Ok(params)
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut group = Vec::with_capacity(20);
        group.extend_from_slice(&[MAX_INFO_TRANSMIT, 0x02]);
        group.extend_from_slice(&self.max_info_transmit.to_be_bytes());
        group.extend_from_slice(&[MAX_INFO_RECEIVE, 0x02]);
        group.extend_from_slice(&self.max_info_receive.to_be_bytes());
        group.extend_from_slice(&[WINDOW_TRANSMIT, 0x04]);
        group.extend_from_slice(&(self.window_transmit as u32).to_be_bytes());
        group.extend_from_slice(&[WINDOW_RECEIVE, 0x04]);
        group.extend_from_slice(&(self.window_receive as u32).to_be_bytes());

        let mut out = vec![FORMAT_IDENTIFIER, GROUP_IDENTIFIER, group.len() as u8];
        out.extend_from_slice(&group);
        out
    }
}
