//! Wire constants of the reader's link framing and CCID command set.

/// Link frame start delimiter.
pub const FRAME_START: u8 = 0x55;
/// Link frame stop delimiter.
pub const FRAME_STOP: u8 = 0xAA;
/// Start, slot, total length (2), reserved, host seq, reader seq, checksum, stop.
pub const FRAME_OVERHEAD: usize = 9;
/// Offset of the payload within an encoded link frame.
pub const FRAME_HEADER_LEN: usize = 7;
/// The total length field of a link frame is 16 bits wide.
pub const MAX_FRAMED_LEN: usize = 0xFFFF;

/// ATT opcode (1) and attribute handle (2) of a write-without-response.
pub const GATT_WRITE_OVERHEAD: usize = 3;
/// Smallest MTU BLE allows.
pub const MIN_MTU: usize = 23;

pub const CCID_HEADER_LEN: usize = 10;
/// The CCID data length field is 32 bits wide, but the reader only accepts 24.
pub const MAX_CCID_DATA_LEN: usize = 0xFF_FFFF;

/// Largest XfrBlock payload the reader accepts in practice; lower than its nominal limit.
pub const DEFAULT_MAX_BLOCK_SIZE: usize = 256;

/// ISO 7816-3 caps the ATR at 33 bytes.
pub const MAX_ATR_LEN: usize = 33;

/// `SCardControl` code routed to `PC_to_RDR_Escape`.
pub const CONTROL_CODE_ESCAPE: u16 = 3500;

pub mod message_type {
    pub const SET_PARAMETERS: u8 = 0x61;
    pub const ICC_POWER_ON: u8 = 0x62;
    pub const ICC_POWER_OFF: u8 = 0x63;
    pub const GET_SLOT_STATUS: u8 = 0x65;
    pub const ESCAPE: u8 = 0x6B;
    pub const XFR_BLOCK: u8 = 0x6F;

    pub const ERROR: u8 = 0x53;
    pub const DATA_BLOCK: u8 = 0x80;
    pub const SLOT_STATUS: u8 = 0x81;
    pub const PARAMETERS: u8 = 0x82;
    pub const ESCAPE_RESPONSE: u8 = 0x83;
}

/// GATT identifiers of the reader's CCID service, big-endian.
pub mod uuid {
    pub const SERVICE: [u8; 16] = [
        0x00, 0x00, 0x39, 0x70, 0x81, 0x7c, 0x48, 0xdf, 0x8d, 0xb2, 0x47, 0x6a, 0x81, 0x34, 0xed,
        0xe0,
    ];
    pub const COMMAND_REQUEST: [u8; 16] = [
        0x00, 0x00, 0x39, 0x71, 0x81, 0x7c, 0x48, 0xdf, 0x8d, 0xb2, 0x47, 0x6a, 0x81, 0x34, 0xed,
        0xe0,
    ];
    pub const COMMAND_RESPONSE: [u8; 16] = [
        0x00, 0x00, 0x39, 0x72, 0x81, 0x7c, 0x48, 0xdf, 0x8d, 0xb2, 0x47, 0x6a, 0x81, 0x34, 0xed,
        0xe0,
    ];
    pub const CARD_NOTIFICATION: [u8; 16] = [
        0x00, 0x00, 0x39, 0x73, 0x81, 0x7c, 0x48, 0xdf, 0x8d, 0xb2, 0x47, 0x6a, 0x81, 0x34, 0xed,
        0xe0,
    ];
}
