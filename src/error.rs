//! Error taxonomy of the driver and the response checks shared by all commands.

use crate::{
    transport::TransportError,
    types::{
        frame::FrameError,
        message::{CcidMessage, MessageError, MessageType},
    },
};

pub type Result<T, E = Error> = core::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("framing error: {0}")]
    Frame(#[from] FrameError),

    #[error("malformed CCID message: {0}")]
    Message(#[from] MessageError),

    #[error("expected a {expected:?} response, got {actual:?}")]
    UnexpectedType {
        expected: MessageType,
        actual: MessageType,
    },

    #[error("unexpected chain parameter {0:#04x}")]
    UnexpectedChain(u8),

    #[error("unexpected command status in bStatus {0:#04x}")]
    UnknownCommandStatus(u8),

    #[error("reader error: {0}")]
    Device(ErrorCode),

    #[error("unknown reader error code {0:#04x}")]
    UnknownErrorCode(u8),

    #[error("slot error: {0}")]
    Slot(SlotError),

    #[error("unknown slot error {0:#04x}")]
    UnknownSlotError(u8),

    /// The card asked for more time; the command may be reissued.
    #[error("time extension requested (multiplier {multiplier})")]
    TimeExtension { multiplier: u8 },

    #[error("reserved value {0:#04x} in slot status")]
    InvalidSlotStatus(u8),

    #[error("ATR of {0} bytes is too long")]
    AtrTooLong(usize),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("cancelled")]
    Cancelled,

    #[error("deadline exceeded")]
    DeadlineExceeded,

    #[error("CCID message of {0} bytes does not fit a link chain")]
    MessageTooLarge(usize),

    #[error("unsupported control code {0}")]
    UnsupportedControl(u16),

    #[error("MTU {0} leaves no room for link frame payload")]
    InvalidMtu(usize),

    #[error("connection closed")]
    Closed,
}

impl Error {
    /// Soft conditions a caller may retry.
    pub fn is_time_extension(&self) -> bool {
        matches!(self, Error::TimeExtension { .. })
    }

    /// Deadline or explicit cancellation.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Error::Cancelled | Error::DeadlineExceeded)
    }
}

/// `bError` of a `RDR_to_PC_Error` message.
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ErrorCode {
    #[error("checksum error")]
    Checksum = 0x01,
    #[error("timeout")]
    Timeout = 0x02,
    #[error("command error")]
    Command = 0x03,
    #[error("unauthorized")]
    Unauthorized = 0x04,
    #[error("undefined error")]
    Undefined = 0x05,
    #[error("receive data error")]
    ReceiveData = 0x06,
    #[error("receive data length error")]
    ReceiveDataLength = 0x07,
}

impl TryFrom<u8> for ErrorCode {
    type Error = u8;

    fn try_from(byte: u8) -> core::result::Result<Self, u8> {
        Ok(match byte {
            0x01 => ErrorCode::Checksum,
            0x02 => ErrorCode::Timeout,
            0x03 => ErrorCode::Command,
            0x04 => ErrorCode::Unauthorized,
            0x05 => ErrorCode::Undefined,
            0x06 => ErrorCode::ReceiveData,
            0x07 => ErrorCode::ReceiveDataLength,
            _ => return Err(byte),
        })
    }
}

/// `bError` of a response whose command status reports a failure (CCID Rev 1.1, 6.2.6).
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SlotError {
    #[error("command aborted")]
    CommandAborted = 0xFF,
    #[error("ICC mute")]
    Timeout = 0xFE,
    #[error("parity error")]
    Parity = 0xFD,
    #[error("buffer overrun")]
    Overrun = 0xFC,
    #[error("hardware error")]
    Hardware = 0xFB,
    #[error("bad ATR TS")]
    BadAtrTs = 0xF8,
    #[error("bad ATR TCK")]
    BadAtrTck = 0xF7,
    #[error("protocol not supported")]
    ProtocolNotSupported = 0xF6,
    #[error("ICC class not supported")]
    ClassNotSupported = 0xF5,
    #[error("procedure byte conflict")]
    ProcedureByteConflict = 0xF4,
    #[error("deactivated protocol")]
    DeactivatedProtocol = 0xF3,
    #[error("busy with auto sequence")]
    BusyWithAutoSequence = 0xF2,
    #[error("slot busy")]
    SlotBusy = 0xE0,
    #[error("invalid NAD")]
    InvalidNad = 0x10,
    #[error("invalid IFSC")]
    InvalidIfsc = 0x0F,
    #[error("invalid clock stop")]
    InvalidClockStop = 0x0E,
    #[error("invalid waiting integer")]
    InvalidWi = 0x0D,
    #[error("invalid guard time")]
    InvalidGuardTime = 0x0C,
    #[error("invalid TCCKTS")]
    InvalidTcckts = 0x0B,
    #[error("invalid Fi/Di")]
    InvalidFiDi = 0x0A,
    #[error("invalid level parameter")]
    InvalidLevelParameter = 0x08,
    #[error("invalid power select")]
    InvalidPowerSelect = 0x07,
    #[error("invalid slot")]
    InvalidSlot = 0x05,
    #[error("invalid length")]
    InvalidLength = 0x01,
    #[error("command not supported")]
    CommandNotSupported = 0x00,
}

impl TryFrom<u8> for SlotError {
    type Error = u8;

    fn try_from(byte: u8) -> core::result::Result<Self, u8> {
        use SlotError::*;
        Ok(match byte {
            0xFF => CommandAborted,
            0xFE => Timeout,
            0xFD => Parity,
            0xFC => Overrun,
            0xFB => Hardware,
            0xF8 => BadAtrTs,
            0xF7 => BadAtrTck,
            0xF6 => ProtocolNotSupported,
            0xF5 => ClassNotSupported,
            0xF4 => ProcedureByteConflict,
            0xF3 => DeactivatedProtocol,
            0xF2 => BusyWithAutoSequence,
            0xE0 => SlotBusy,
            0x10 => InvalidNad,
            0x0F => InvalidIfsc,
            0x0E => InvalidClockStop,
            0x0D => InvalidWi,
            0x0C => InvalidGuardTime,
            0x0B => InvalidTcckts,
            0x0A => InvalidFiDi,
            0x08 => InvalidLevelParameter,
            0x07 => InvalidPowerSelect,
            0x05 => InvalidSlot,
            0x01 => InvalidLength,
            0x00 => CommandNotSupported,
            _ => return Err(byte),
        })
    }
}

/// Classifies a response against the type the command expects.
pub fn check_response(response: &CcidMessage, expected: MessageType) -> Result<()> {
    if response.message_type == MessageType::Error {
        return Err(ErrorCode::try_from(response.error())
            .map_or_else(Error::UnknownErrorCode, Error::Device));
    }

    if response.message_type != expected {
        return Err(Error::UnexpectedType {
            expected,
            actual: response.message_type,
        });
    }

    match response.command_status() {
        0b00 => Ok(()),
        0b01 => Err(SlotError::try_from(response.error())
            .map_or_else(Error::UnknownSlotError, Error::Slot)),
        0b10 => Err(Error::TimeExtension {
            multiplier: response.error(),
        }),
        _ => Err(Error::UnknownCommandStatus(response.header[0])),
    }
}
