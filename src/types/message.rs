//! CCID messages as carried inside link frames.
//!
//! ```text
//! Offset  Size  Description
//! 0       1     Message type
//! 1       4     Data length (little-endian)
//! 5       1     Slot
//! 6       1     Sequence number
//! 7       3     Message specific header
//! 10      N     Data
//! ```

use crate::{
    constants::{message_type, CCID_HEADER_LEN, MAX_CCID_DATA_LEN},
    types::Slot,
};

#[derive(Copy, Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum MessageError {
    #[error("message of {0} bytes is shorter than the CCID header")]
    TooShort(usize),
    #[error("declared data length {declared} does not match the {actual} bytes present")]
    LengthMismatch { declared: usize, actual: usize },
    #[error("invalid slot {0:#04x}")]
    InvalidSlot(u8),
    #[error("unknown message type {0:#04x}")]
    UnknownType(u8),
    #[error("data of {0} bytes does not fit the length field")]
    DataTooLarge(usize),
}

#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MessageType {
    // PC_to_RDR
    SetParameters = message_type::SET_PARAMETERS,
    IccPowerOn = message_type::ICC_POWER_ON,
    IccPowerOff = message_type::ICC_POWER_OFF,
    GetSlotStatus = message_type::GET_SLOT_STATUS,
    Escape = message_type::ESCAPE,
    XfrBlock = message_type::XFR_BLOCK,

    // RDR_to_PC
    Error = message_type::ERROR,
    DataBlock = message_type::DATA_BLOCK,
    SlotStatus = message_type::SLOT_STATUS,
    Parameters = message_type::PARAMETERS,
    EscapeResponse = message_type::ESCAPE_RESPONSE,
}

impl TryFrom<u8> for MessageType {
    type Error = MessageError;

    fn try_from(byte: u8) -> Result<Self, MessageError> {
        Ok(match byte {
            message_type::SET_PARAMETERS => MessageType::SetParameters,
            message_type::ICC_POWER_ON => MessageType::IccPowerOn,
            message_type::ICC_POWER_OFF => MessageType::IccPowerOff,
            message_type::GET_SLOT_STATUS => MessageType::GetSlotStatus,
            message_type::ESCAPE => MessageType::Escape,
            message_type::XFR_BLOCK => MessageType::XfrBlock,
            message_type::ERROR => MessageType::Error,
            message_type::DATA_BLOCK => MessageType::DataBlock,
            message_type::SLOT_STATUS => MessageType::SlotStatus,
            message_type::PARAMETERS => MessageType::Parameters,
            message_type::ESCAPE_RESPONSE => MessageType::EscapeResponse,
            _ => return Err(MessageError::UnknownType(byte)),
        })
    }
}

/// `wLevelParameter` of an XfrBlock, `bChainParameter` of a DataBlock.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum Chain {
    BeginsAndEnds = 0,
    Begins = 1,
    Ends = 2,
    Continues = 3,
    ExpectingMore = 0x10,
}

impl Chain {
    pub fn level_parameter(self) -> u16 {
        self as u16
    }
}

impl TryFrom<u8> for Chain {
    type Error = u8;

    fn try_from(byte: u8) -> Result<Self, u8> {
        match byte {
            0x00 => Ok(Chain::BeginsAndEnds),
            0x01 => Ok(Chain::Begins),
            0x02 => Ok(Chain::Ends),
            0x03 => Ok(Chain::Continues),
            0x10 => Ok(Chain::ExpectingMore),
            _ => Err(byte),
        }
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct CcidMessage {
    pub message_type: MessageType,
    pub slot: Slot,
    pub seq: u8,
    pub header: [u8; 3],
    pub data: Vec<u8>,
}

impl CcidMessage {
    pub fn new(message_type: MessageType, slot: Slot, seq: u8) -> Self {
        Self {
            message_type,
            slot,
            seq,
            header: [0; 3],
            data: Vec::new(),
        }
    }

    pub fn with_header(mut self, header: [u8; 3]) -> Self {
        self.header = header;
        self
    }

    pub fn with_data(mut self, data: impl Into<Vec<u8>>) -> Self {
        self.data = data.into();
        self
    }

    /// An XfrBlock carrying one block of a (possibly chained) command APDU.
    pub fn xfr_block(slot: Slot, seq: u8, bwi: u8, chain: Chain, data: &[u8]) -> Self {
        let level = chain.level_parameter().to_le_bytes();
        Self::new(MessageType::XfrBlock, slot, seq)
            .with_header([bwi, level[0], level[1]])
            .with_data(data)
    }

    /// Level parameter of a command, header bytes 1..3 little-endian.
    pub fn level_parameter(&self) -> u16 {
        u16::from_le_bytes([self.header[1], self.header[2]])
    }

    /// Top two bits of `bStatus`.
    pub fn command_status(&self) -> u8 {
        self.header[0] >> 6
    }

    /// `bError` of a response.
    pub fn error(&self) -> u8 {
        self.header[1]
    }

    /// `bChainParameter` of a response.
    pub fn chain_parameter(&self) -> u8 {
        self.header[2]
    }

    pub fn encoded_len(&self) -> usize {
        CCID_HEADER_LEN + self.data.len()
    }

    pub fn encode(&self) -> Result<Vec<u8>, MessageError> {
        let len = self.data.len();
        if len > MAX_CCID_DATA_LEN {
            return Err(MessageError::DataTooLarge(len));
        }

        let mut buf = Vec::with_capacity(self.encoded_len());
        buf.push(self.message_type as u8);
        // bounded by MAX_CCID_DATA_LEN above
        buf.extend_from_slice(&(len as u32).to_le_bytes());
        buf.push(self.slot as u8);
        buf.push(self.seq);
        buf.extend_from_slice(&self.header);
        buf.extend_from_slice(&self.data);
        Ok(buf)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, MessageError> {
        let len = bytes.len();
        untrusted::Input::from(bytes).read_all(MessageError::TooShort(len), |reader| {
            let short = |_| MessageError::TooShort(len);

            let kind = reader.read_byte().map_err(short)?;

            let declared = reader.read_bytes(4).map_err(short)?.as_slice_less_safe();
            let declared =
                u32::from_le_bytes([declared[0], declared[1], declared[2], declared[3]]) as usize;
            if CCID_HEADER_LEN.checked_add(declared) != Some(len) {
                return Err(MessageError::LengthMismatch {
                    declared,
                    actual: len.saturating_sub(CCID_HEADER_LEN),
                });
            }

            let slot = reader.read_byte().map_err(short)?;
            let slot = Slot::try_from(slot).map_err(MessageError::InvalidSlot)?;
            let message_type = MessageType::try_from(kind)?;

            let seq = reader.read_byte().map_err(short)?;
            let header = reader.read_bytes(3).map_err(short)?.as_slice_less_safe();
            let header = [header[0], header[1], header[2]];
            let data = reader.read_bytes_to_end().as_slice_less_safe().to_vec();

            Ok(CcidMessage {
                message_type,
                slot,
                seq,
                header,
                data,
            })
        })
    }
}

impl core::fmt::Debug for CcidMessage {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let mut debug_struct = f.debug_struct("CcidMessage");
        debug_struct
            .field("type", &self.message_type)
            .field("slot", &self.slot)
            .field("seq", &self.seq)
            .field("header", &format_args!("{:02X?}", self.header))
            .field("len", &self.data.len());

        let l = core::cmp::min(self.data.len(), 8);
        if l < self.data.len() {
            debug_struct.field("data[..8]", &format_args!("{:02X?}", &self.data[..l]))
        } else {
            debug_struct.field("data", &format_args!("{:02X?}", &self.data))
        };
        debug_struct.finish()
    }
}
