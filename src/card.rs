use crate::{
    constants::CONTROL_CODE_ESCAPE,
    context::Context,
    error::{Error, Result},
    reader::{Atr, Reader},
    transport::Peripheral,
    types::Slot,
};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Protocol {
    /// SAM, character protocol.
    T0,
    /// SAM, block protocol.
    T1,
    /// Card in the field.
    Contactless,
}

impl Protocol {
    pub fn slot(self) -> Slot {
        match self {
            Protocol::Contactless => Slot::Picc,
            Protocol::T0 | Protocol::T1 => Slot::Sam,
        }
    }
}

/// A powered card in one slot of the reader.
pub struct Card<'r, P: Peripheral> {
    reader: &'r Reader<P>,
    protocol: Protocol,
    atr: Atr,
}

impl<'r, P: Peripheral> Card<'r, P> {
    /// Power cycles the slot selected by `protocol` and keeps the fresh ATR.
    pub fn connect(reader: &'r Reader<P>, protocol: Protocol, context: &Context) -> Result<Self> {
        let mut card = Self {
            reader,
            protocol,
            atr: Atr::new(),
        };
        card.reconnect(context)?;
        info!("connected {} ATR {:02X?}", card.device_name(), &card.atr[..]);
        Ok(card)
    }

    pub fn reconnect(&mut self, context: &Context) -> Result<()> {
        let slot = self.slot();
        self.reader.icc_power_off(slot, context)?;
        self.atr = self
            .reader
            .icc_power_on(slot, self.reader.config().power_select, context)?;

        if slot == Slot::Sam {
            let parameters = self.reader.config().sam_parameters;
            self.reader.set_parameters(
                slot,
                self.protocol == Protocol::T1,
                &parameters,
                context,
            )?;
        }
        Ok(())
    }

    /// Powers the card off.
    pub fn close(self, context: &Context) -> Result<()> {
        self.reader.icc_power_off(self.slot(), context)?;
        Ok(())
    }

    pub fn slot(&self) -> Slot {
        self.protocol.slot()
    }

    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    pub fn atr(&self) -> &[u8] {
        &self.atr
    }

    pub fn device_name(&self) -> &'static str {
        match self.slot() {
            Slot::Picc => "ACS ACR1552 1S CL Reader PICC 0",
            Slot::Sam => "ACS ACR1552 1S CL Reader SAM 0",
        }
    }

    pub fn exchange(&self, apdu: &[u8], context: &Context) -> Result<Vec<u8>> {
        self.reader.xfr_block(self.slot(), 0, apdu, context)
    }

    /// Only the escape control code is supported.
    pub fn control(&self, code: u16, data: &[u8], context: &Context) -> Result<Vec<u8>> {
        match code {
            CONTROL_CODE_ESCAPE => self.reader.escape(self.slot(), data, context),
            _ => Err(Error::UnsupportedControl(code)),
        }
    }
}
