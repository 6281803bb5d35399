#![allow(dead_code)]

use std::sync::Arc;

use ble_ccid::{
    transport::{Characteristic, NotificationHandler, Peripheral, TransportError},
    types::{
        frame::{ChainingBuffer, LinkFrame},
        message::{CcidMessage, Chain, MessageType},
    },
    Slot,
};
use parking_lot::Mutex;

pub type Responder = Box<dyn FnMut(&CcidMessage) -> Vec<CcidMessage> + Send>;

/// Plays the reader side of the link in memory.
///
/// Every complete command is recorded and answered synchronously with whatever
/// the responder returns, split into notifications of `fragment` bytes.
#[derive(Clone)]
pub struct SimulatedReader {
    inner: Arc<Inner>,
}

struct Inner {
    mtu: usize,
    fragment: Mutex<usize>,
    responses: Mutex<Option<NotificationHandler>>,
    cards: Mutex<Option<NotificationHandler>>,
    chains: Mutex<[ChainingBuffer; 2]>,
    frames: Mutex<Vec<LinkFrame>>,
    received: Mutex<Vec<CcidMessage>>,
    responder: Mutex<Responder>,
    reader_seq: Mutex<u8>,
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

impl SimulatedReader {
    pub fn new(mtu: usize) -> Self {
        init_logging();
        Self {
            inner: Arc::new(Inner {
                mtu,
                fragment: Mutex::new(mtu - 3 - 9),
                responses: Mutex::new(None),
                cards: Mutex::new(None),
                chains: Mutex::new(Default::default()),
                frames: Mutex::new(Vec::new()),
                received: Mutex::new(Vec::new()),
                responder: Mutex::new(Box::new(|_| Vec::new())),
                reader_seq: Mutex::new(0),
            }),
        }
    }

    pub fn respond_with<F>(&self, responder: F)
    where
        F: FnMut(&CcidMessage) -> Vec<CcidMessage> + Send + 'static,
    {
        *self.inner.responder.lock() = Box::new(responder);
    }

    /// Payload bytes per notification sent back to the host.
    pub fn set_fragment(&self, fragment: usize) {
        *self.inner.fragment.lock() = fragment.max(1);
    }

    pub fn received(&self) -> Vec<CcidMessage> {
        self.inner.received.lock().clone()
    }

    pub fn frames(&self) -> Vec<LinkFrame> {
        self.inner.frames.lock().clone()
    }

    pub fn notify_raw(&self, value: &[u8]) {
        if let Some(handler) = self.inner.responses.lock().as_mut() {
            handler(value);
        }
    }

    pub fn notify_card(&self, value: &[u8]) {
        if let Some(handler) = self.inner.cards.lock().as_mut() {
            handler(value);
        }
    }

    /// Sends `message` as a (possibly chained) run of link frames.
    pub fn notify(&self, slot: Slot, message: &CcidMessage) {
        let bytes = message.encode().unwrap();
        let fragment = *self.inner.fragment.lock();
        for chunk in bytes.chunks(fragment) {
            let reader_seq = {
                let mut seq = self.inner.reader_seq.lock();
                *seq = seq.wrapping_add(1);
                *seq
            };
            let frame = LinkFrame {
                slot,
                total_len: bytes.len() as u16,
                host_seq: 0,
                reader_seq,
                payload: chunk.to_vec(),
            };
            self.notify_raw(&frame.encode().unwrap());
        }
    }
}

impl Peripheral for SimulatedReader {
    fn mtu(&self) -> usize {
        self.inner.mtu
    }

    fn write(&self, value: &[u8]) -> Result<(), TransportError> {
        assert!(value.len() <= self.inner.mtu - 3, "write exceeds MTU");
        let frame = LinkFrame::decode(value).map_err(TransportError::new)?;
        self.inner.frames.lock().push(frame.clone());

        let complete = self.inner.chains.lock()[frame.slot as usize]
            .push(&frame.payload, frame.total_len as usize)
            .map_err(TransportError::new)?;
        let Some(bytes) = complete else {
            return Ok(());
        };

        let command = CcidMessage::decode(&bytes).map_err(TransportError::new)?;
        self.inner.received.lock().push(command.clone());
        let responses = {
            let mut responder = self.inner.responder.lock();
            (*responder)(&command)
        };
        for response in responses {
            self.notify(frame.slot, &response);
        }
        Ok(())
    }

    fn subscribe(
        &self,
        characteristic: Characteristic,
        handler: NotificationHandler,
    ) -> Result<(), TransportError> {
        let slot = match characteristic {
            Characteristic::CommandResponse => &self.inner.responses,
            Characteristic::CardNotification => &self.inner.cards,
        };
        *slot.lock() = Some(handler);
        Ok(())
    }
}

pub fn data_block(command: &CcidMessage, chain: Chain, data: &[u8]) -> CcidMessage {
    CcidMessage::new(MessageType::DataBlock, command.slot, command.seq)
        .with_header([0x00, 0x00, chain as u8])
        .with_data(data)
}

pub fn slot_status(command: &CcidMessage, status: u8, error: u8, clock: u8) -> CcidMessage {
    CcidMessage::new(MessageType::SlotStatus, command.slot, command.seq)
        .with_header([status, error, clock])
}

pub fn parameters(command: &CcidMessage) -> CcidMessage {
    CcidMessage::new(MessageType::Parameters, command.slot, command.seq)
        .with_header([0x00, 0x00, command.header[0]])
        .with_data(command.data.clone())
}

pub fn reader_error(command: &CcidMessage, code: u8) -> CcidMessage {
    CcidMessage::new(MessageType::Error, command.slot, command.seq).with_header([0x00, code, 0x00])
}

/// Answers the commands a card connection needs.
pub fn card_responder(atr: &'static [u8]) -> impl FnMut(&CcidMessage) -> Vec<CcidMessage> + Send {
    move |command| match command.message_type {
        MessageType::IccPowerOff => vec![slot_status(command, 0x01, 0x00, 0x00)],
        MessageType::IccPowerOn => vec![data_block(command, Chain::BeginsAndEnds, atr)],
        MessageType::SetParameters => vec![parameters(command)],
        MessageType::GetSlotStatus => vec![slot_status(command, 0x00, 0x00, 0x00)],
        MessageType::Escape => vec![CcidMessage::new(
            MessageType::EscapeResponse,
            command.slot,
            command.seq,
        )
        .with_data(command.data.iter().rev().copied().collect::<Vec<u8>>())],
        MessageType::XfrBlock => vec![data_block(command, Chain::BeginsAndEnds, &[0x90, 0x00])],
        _ => Vec::new(),
    }
}
