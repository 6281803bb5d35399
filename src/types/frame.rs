//! Link framing of CCID messages over the GATT characteristics.
//!
//! Every notification or write carries exactly one frame:
//!
//! ```text
//! Offset  Size  Description
//! 0       1     Start (0x55)
//! 1       1     Slot (0 = PICC, 1 = SAM)
//! 2       2     Total length of the framed message (big-endian)
//! 4       1     Reserved (0x00)
//! 5       1     Host sequence
//! 6       1     Reader sequence
//! 7       N     Fragment of the framed message
//! 7+N     1     XOR of bytes 1..7+N
//! 8+N     1     Stop (0xAA)
//! ```
//!
//! A frame whose fragment is shorter than the total length is one link of a chain;
//! reassembly is left to [`Pipe`](crate::pipe::Pipe).

use crate::{constants::*, types::Slot};

#[derive(Copy, Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    #[error("frame of {0} bytes is shorter than the link overhead")]
    TooShort(usize),
    #[error("bad start or stop delimiter")]
    Delimiters,
    #[error("checksum mismatch: frame says {expected:#04x}, computed {computed:#04x}")]
    Checksum { expected: u8, computed: u8 },
    #[error("invalid slot {0:#04x}")]
    InvalidSlot(u8),
    #[error("unknown frame type {0:#04x}")]
    Reserved(u8),
    #[error("fragment of {len} bytes exceeds the total length {total}")]
    FragmentTooLong { len: usize, total: usize },
    #[error("chained total length changed from {expected} to {got}")]
    ChainLengthChanged { expected: usize, got: usize },
    #[error("chained data overflows the total length {total}")]
    ChainOverflow { total: usize },
}

/// XOR of all bytes.
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0, |acc, byte| acc ^ byte)
}

#[derive(Clone, PartialEq, Eq)]
pub struct LinkFrame {
    pub slot: Slot,
    /// Length of the complete message this frame is (a fragment of).
    pub total_len: u16,
    pub host_seq: u8,
    pub reader_seq: u8,
    pub payload: Vec<u8>,
}

impl LinkFrame {
    /// Whether this frame carries the whole message by itself.
    pub fn is_complete(&self) -> bool {
        self.payload.len() == usize::from(self.total_len)
    }

    pub fn encoded_len(&self) -> usize {
        FRAME_OVERHEAD + self.payload.len()
    }

    pub fn encode(&self) -> Result<Vec<u8>, FrameError> {
        let total = usize::from(self.total_len);
        if self.payload.len() > total {
            return Err(FrameError::FragmentTooLong {
                len: self.payload.len(),
                total,
            });
        }

        let mut buf = Vec::with_capacity(self.encoded_len());
        buf.push(FRAME_START);
        buf.push(self.slot as u8);
        buf.extend_from_slice(&self.total_len.to_be_bytes());
        buf.push(0x00);
        buf.push(self.host_seq);
        buf.push(self.reader_seq);
        debug_assert_eq!(buf.len(), FRAME_HEADER_LEN);
        buf.extend_from_slice(&self.payload);
        // covers everything except the delimiters
        buf.push(checksum(&buf[1..]));
        buf.push(FRAME_STOP);
        Ok(buf)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, FrameError> {
        let len = bytes.len();
        if len < FRAME_OVERHEAD {
            return Err(FrameError::TooShort(len));
        }
        if bytes[0] != FRAME_START || bytes[len - 1] != FRAME_STOP {
            return Err(FrameError::Delimiters);
        }

        let body = &bytes[1..len - 2];
        let expected = bytes[len - 2];
        let computed = checksum(body);
        if expected != computed {
            return Err(FrameError::Checksum { expected, computed });
        }

        untrusted::Input::from(body).read_all(FrameError::TooShort(len), |reader| {
            let short = |_| FrameError::TooShort(len);

            let slot = reader.read_byte().map_err(short)?;
            let slot = Slot::try_from(slot).map_err(|_| FrameError::InvalidSlot(slot))?;

            let total = reader.read_bytes(2).map_err(short)?.as_slice_less_safe();
            let total_len = u16::from_be_bytes([total[0], total[1]]);

            let reserved = reader.read_byte().map_err(short)?;
            if reserved != 0x00 {
                return Err(FrameError::Reserved(reserved));
            }

            let host_seq = reader.read_byte().map_err(short)?;
            let reader_seq = reader.read_byte().map_err(short)?;

            let payload = reader.read_bytes_to_end().as_slice_less_safe();
            if payload.len() > usize::from(total_len) {
                return Err(FrameError::FragmentTooLong {
                    len: payload.len(),
                    total: usize::from(total_len),
                });
            }

            Ok(LinkFrame {
                slot,
                total_len,
                host_seq,
                reader_seq,
                payload: payload.to_vec(),
            })
        })
    }
}

impl core::fmt::Debug for LinkFrame {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let l = core::cmp::min(self.payload.len(), 16);
        let mut debug_struct = f.debug_struct("LinkFrame");
        debug_struct
            .field("slot", &self.slot)
            .field("total", &self.total_len)
            .field("host_seq", &self.host_seq)
            .field("reader_seq", &self.reader_seq)
            .field("len", &self.payload.len());
        if l < self.payload.len() {
            debug_struct.field("payload[..16]", &format_args!("{:02X?}", &self.payload[..l]))
        } else {
            debug_struct.field("payload", &format_args!("{:02X?}", &self.payload))
        };
        debug_struct.finish()
    }
}

/// Reassembles one chained message from successive fragments.
///
/// The declared total is fixed by the first fragment. Any inconsistency discards
/// the partial data.
#[derive(Debug, Default)]
pub struct ChainingBuffer {
    buffer: Option<(Vec<u8>, usize)>,
}

impl ChainingBuffer {
    pub fn is_idle(&self) -> bool {
        self.buffer.is_none()
    }

    pub fn reset(&mut self) {
        self.buffer = None;
    }

    /// Appends one fragment; returns the complete message once `total` bytes are in.
    pub fn push(&mut self, fragment: &[u8], total: usize) -> Result<Option<Vec<u8>>, FrameError> {
        let (buffer, expected) = self
            .buffer
            .get_or_insert_with(|| (Vec::with_capacity(total), total));

        if *expected != total {
            let expected = *expected;
            self.buffer = None;
            return Err(FrameError::ChainLengthChanged {
                expected,
                got: total,
            });
        }

        buffer.extend_from_slice(fragment);
        match buffer.len() {
            n if n > total => {
                self.buffer = None;
                Err(FrameError::ChainOverflow { total })
            }
            n if n == total => Ok(self.buffer.take().map(|(buffer, _)| buffer)),
            _ => Ok(None),
        }
    }
}
