use crate::constants::DEFAULT_MAX_BLOCK_SIZE;

/// `bPowerSelect` of `PC_to_RDR_IccPowerOn`.
#[repr(u8)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum PowerSelect {
    #[default]
    Automatic = 0x00,
    V5 = 0x01,
    V3 = 0x02,
    V1_8 = 0x03,
}

/// Protocol data structure of `PC_to_RDR_SetParameters` (CCID Rev 1.1, 6.1.7).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ProtocolParameters {
    pub fi_di: u8,
    pub tccks: u8,
    pub guard_time: u8,
    pub waiting_integer: u8,
    pub clock_stop: u8,
    /// T=1 only.
    pub ifsc: u8,
}

impl ProtocolParameters {
    /// T=1 blocks carry IFSC and NAD on top of the T=0 fields.
    pub fn block(&self, t1: bool) -> heapless::Vec<u8, 7> {
        let mut block = heapless::Vec::new();
        // capacity covers the longest (T=1) variant
        block
            .extend_from_slice(&[
                self.fi_di,
                self.tccks,
                self.guard_time,
                self.waiting_integer,
                self.clock_stop,
            ])
            .ok();
        if t1 {
            // the reader only supports NAD 0
            block.extend_from_slice(&[self.ifsc, 0x00]).ok();
        }
        block
    }
}

impl Default for ProtocolParameters {
    /// Timing the SAM slot is configured with after power on.
    fn default() -> Self {
        Self {
            fi_di: 0x96,
            tccks: 0x10,
            guard_time: 0x00,
            waiting_integer: 0x55,
            clock_stop: 0x00,
            ifsc: 0xFE,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// Largest APDU block per XfrBlock before command chaining kicks in.
    pub max_block_size: usize,
    pub power_select: PowerSelect,
    pub sam_parameters: ProtocolParameters,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_block_size: DEFAULT_MAX_BLOCK_SIZE,
            power_select: PowerSelect::default(),
            sam_parameters: ProtocolParameters::default(),
        }
    }
}

impl Config {
    pub fn with_max_block_size(mut self, max_block_size: usize) -> Self {
        self.max_block_size = max_block_size.max(1);
        self
    }

    pub fn with_power_select(mut self, power_select: PowerSelect) -> Self {
        self.power_select = power_select;
        self
    }

    pub fn with_sam_parameters(mut self, sam_parameters: ProtocolParameters) -> Self {
        self.sam_parameters = sam_parameters;
        self
    }
}
