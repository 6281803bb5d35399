//! The CCID command set of the reader.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::{
    config::{Config, PowerSelect, ProtocolParameters},
    constants::MAX_ATR_LEN,
    context::Context,
    error::{check_response, Error, Result},
    pipe::Pipe,
    transport::Peripheral,
    types::{
        message::{CcidMessage, Chain, MessageType},
        status::SlotStatus,
        Slot,
    },
};

pub type Atr = heapless::Vec<u8, MAX_ATR_LEN>;

/// Issues CCID commands to either slot of one reader.
///
/// Each command takes the next value of a sequence counter shared by both slots,
/// whether or not it succeeds.
pub struct Reader<P: Peripheral> {
    pipe: Arc<Pipe<P>>,
    config: Config,
    seq: Mutex<u8>,
}

impl<P: Peripheral> Reader<P> {
    pub fn new(pipe: Arc<Pipe<P>>, config: Config) -> Self {
        Self {
            pipe,
            config,
            seq: Mutex::new(0),
        }
    }

    /// Sets up the link on an already connected peripheral.
    pub fn open(peripheral: P, config: Config) -> Result<Self> {
        Ok(Self::new(Pipe::new(peripheral)?, config))
    }

    pub fn pipe(&self) -> &Arc<Pipe<P>> {
        &self.pipe
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn next_sequence(&self) -> u8 {
        let mut seq = self.seq.lock();
        let current = *seq;
        *seq = seq.wrapping_add(1);
        current
    }

    fn transact(
        &self,
        message: CcidMessage,
        expected: MessageType,
        context: &Context,
    ) -> Result<CcidMessage> {
        let response = self.pipe.exchange(&message, context)?;
        check_response(&response, expected)?;
        Ok(response)
    }

    fn command(&self, message_type: MessageType, slot: Slot) -> CcidMessage {
        CcidMessage::new(message_type, slot, self.next_sequence())
    }

    /// Powers the card up and returns its ATR.
    pub fn icc_power_on(
        &self,
        slot: Slot,
        power_select: PowerSelect,
        context: &Context,
    ) -> Result<Atr> {
        let message = self
            .command(MessageType::IccPowerOn, slot)
            .with_header([power_select as u8, 0, 0]);
        let response = self.transact(message, MessageType::DataBlock, context)?;

        // an ATR always fits one block
        if response.chain_parameter() != Chain::BeginsAndEnds as u8 {
            return Err(Error::UnexpectedChain(response.chain_parameter()));
        }
        Atr::from_slice(&response.data).map_err(|_| Error::AtrTooLong(response.data.len()))
    }

    pub fn icc_power_off(&self, slot: Slot, context: &Context) -> Result<SlotStatus> {
        let message = self.command(MessageType::IccPowerOff, slot);
        self.slot_status(message, context)
    }

    pub fn get_slot_status(&self, slot: Slot, context: &Context) -> Result<SlotStatus> {
        let message = self.command(MessageType::GetSlotStatus, slot);
        self.slot_status(message, context)
    }

    fn slot_status(&self, message: CcidMessage, context: &Context) -> Result<SlotStatus> {
        let response = self.transact(message, MessageType::SlotStatus, context)?;
        SlotStatus::from_response(&response).map_err(Error::InvalidSlotStatus)
    }

    /// Sends a command APDU and returns the response APDU.
    ///
    /// APDUs longer than the configured block size go out as a chain of XfrBlocks;
    /// chained responses are collected by requesting each continuation with an
    /// empty block.
    pub fn xfr_block(&self, slot: Slot, bwi: u8, apdu: &[u8], context: &Context) -> Result<Vec<u8>> {
        let max_block = self.config.max_block_size.max(1);
        let mut sent = 0;
        let mut first = true;
        let mut receiving = false;
        let mut response = Vec::new();

        loop {
            // TODO: send PC_to_RDR_Abort so the reader drops the half finished chain
            context.check()?;

            let (chain, block) = if first || sent < apdu.len() {
                let n = core::cmp::min(max_block, apdu.len() - sent);
                let block = &apdu[sent..][..n];
                sent += n;
                let more = sent < apdu.len();
                let chain = match (first, more) {
                    (true, false) => Chain::BeginsAndEnds,
                    (true, true) => Chain::Begins,
                    (false, true) => Chain::Continues,
                    (false, false) => Chain::Ends,
                };
                first = false;
                (chain, block)
            } else {
                (Chain::ExpectingMore, &[][..])
            };

            let message = CcidMessage::xfr_block(slot, self.next_sequence(), bwi, chain, block);
            let reply = self.transact(message, MessageType::DataBlock, context)?;

            match Chain::try_from(reply.chain_parameter()) {
                Ok(Chain::BeginsAndEnds) => {
                    if receiving {
                        warn!(
                            "unchained block ends a chained response, dropping {} bytes",
                            response.len()
                        );
                    }
                    return Ok(reply.data);
                }
                Ok(Chain::Begins) => {
                    receiving = true;
                    response = reply.data;
                }
                Ok(Chain::Continues) => response.extend_from_slice(&reply.data),
                Ok(Chain::Ends) => {
                    response.extend_from_slice(&reply.data);
                    return Ok(response);
                }
                Ok(Chain::ExpectingMore) => {}
                Err(parameter) => {
                    error!("unknown chain parameter {:#04x}", parameter);
                    return Err(Error::UnexpectedChain(parameter));
                }
            }
        }
    }

    /// Vendor command passed through `PC_to_RDR_Escape`.
    pub fn escape(&self, slot: Slot, data: &[u8], context: &Context) -> Result<Vec<u8>> {
        let message = self.command(MessageType::Escape, slot).with_data(data);
        let response = self.transact(message, MessageType::EscapeResponse, context)?;

        if response.chain_parameter() != Chain::BeginsAndEnds as u8 {
            return Err(Error::UnexpectedChain(response.chain_parameter()));
        }
        Ok(response.data)
    }

    pub fn set_parameters(
        &self,
        slot: Slot,
        t1: bool,
        parameters: &ProtocolParameters,
        context: &Context,
    ) -> Result<()> {
        let message = self
            .command(MessageType::SetParameters, slot)
            .with_header([t1 as u8, 0, 0])
            .with_data(&parameters.block(t1)[..]);
        self.transact(message, MessageType::Parameters, context)?;
        Ok(())
    }
}
