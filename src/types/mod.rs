pub mod frame;
pub mod message;
pub mod status;

/// Logical slot of the reader a message is addressed to.
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Slot {
    /// Contactless card in the field.
    Picc = 0,
    /// Embedded secure access module.
    Sam = 1,
}

impl Slot {
    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

impl TryFrom<u8> for Slot {
    type Error = u8;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        match byte {
            0x00 => Ok(Slot::Picc),
            0x01 => Ok(Slot::Sam),
            _ => Err(byte),
        }
    }
}
