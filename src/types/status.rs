use crate::types::message::CcidMessage;

/// `bmICCStatus`, bits 0-1 of `bStatus`.
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum IccStatus {
    /// Present and active.
    Running = 0,
    /// Present but not powered.
    Inactive = 1,
    Absent = 2,
}

/// `bClockStatus`.
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ClockStatus {
    Running = 0,
    StoppedLow = 1,
    StoppedHigh = 2,
    StoppedUnknown = 3,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SlotStatus {
    pub icc: IccStatus,
    pub clock: ClockStatus,
}

impl IccStatus {
    pub fn from_status_byte(status: u8) -> Option<Self> {
        match status & 0x03 {
            0 => Some(IccStatus::Running),
            1 => Some(IccStatus::Inactive),
            2 => Some(IccStatus::Absent),
            _ => None,
        }
    }
}

impl TryFrom<u8> for ClockStatus {
    type Error = u8;

    fn try_from(byte: u8) -> Result<Self, u8> {
        match byte {
            0 => Ok(ClockStatus::Running),
            1 => Ok(ClockStatus::StoppedLow),
            2 => Ok(ClockStatus::StoppedHigh),
            3 => Ok(ClockStatus::StoppedUnknown),
            _ => Err(byte),
        }
    }
}

impl SlotStatus {
    /// Reads the slot status out of a `RDR_to_PC_SlotStatus` header.
    ///
    /// Returns the offending byte if either field holds a reserved value.
    pub fn from_response(response: &CcidMessage) -> Result<Self, u8> {
        let icc = IccStatus::from_status_byte(response.header[0]).ok_or(response.header[0])?;
        let clock = ClockStatus::try_from(response.header[2])?;
        Ok(SlotStatus { icc, clock })
    }

    pub fn is_present(&self) -> bool {
        self.icc != IccStatus::Absent
    }
}
