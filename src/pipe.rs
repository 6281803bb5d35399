//! Request/response correlation over the link.
//!
//! Outbound, a CCID message is split into link frames no larger than the MTU allows
//! and written in order. Inbound, notifications are decoded, chained frames are
//! reassembled per slot, and the resulting CCID message is handed to the one
//! caller waiting on that slot.
//!
//! Each slot admits a single outstanding exchange. Its delivery point is a fresh
//! one-element channel per exchange, so a response that shows up after its waiter
//! gave up is dropped as unsolicited instead of reaching the next exchange.

use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc,
};

use crossbeam::channel::{self, Sender};
use parking_lot::Mutex;

use crate::{
    constants::*,
    context::Context,
    error::{Error, Result},
    transport::{Characteristic, NotificationHandler, Peripheral},
    types::{
        frame::{ChainingBuffer, LinkFrame},
        message::CcidMessage,
        Slot,
    },
};

/// Called with the raw value of every card notification.
pub type CardObserver = Box<dyn FnMut(&[u8]) + Send + 'static>;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct LinkSequence {
    /// Incremented per frame written.
    pub host: u8,
    /// Incremented per frame received.
    pub reader: u8,
}

struct Waiter {
    id: u64,
    seq: u8,
    sender: Sender<CcidMessage>,
}

pub struct Pipe<P: Peripheral> {
    peripheral: P,
    max_payload: usize,
    seq: Mutex<LinkSequence>,
    // frames of one message must not interleave with another slot's
    write_lock: Mutex<()>,
    chains: Mutex<[ChainingBuffer; 2]>,
    waiters: [Mutex<Option<Waiter>>; 2],
    next_waiter: AtomicU64,
    closed: AtomicBool,
}

impl<P: Peripheral> Pipe<P> {
    /// Subscribes to the reader's notifications; card notifications are only logged.
    pub fn new(peripheral: P) -> Result<Arc<Self>> {
        Self::with_card_observer(peripheral, Box::new(|_| {}))
    }

    pub fn with_card_observer(peripheral: P, mut observer: CardObserver) -> Result<Arc<Self>> {
        let mtu = peripheral.mtu();
        if mtu < MIN_MTU {
            return Err(Error::InvalidMtu(mtu));
        }
        // MIN_MTU leaves room for at least one payload byte
        let max_payload = mtu - GATT_WRITE_OVERHEAD - FRAME_OVERHEAD;

        let pipe = Arc::new(Self {
            peripheral,
            max_payload,
            seq: Mutex::new(LinkSequence::default()),
            write_lock: Mutex::new(()),
            chains: Mutex::new(Default::default()),
            waiters: [Mutex::new(None), Mutex::new(None)],
            next_waiter: AtomicU64::new(0),
            closed: AtomicBool::new(false),
        });

        let weak = Arc::downgrade(&pipe);
        let responses: NotificationHandler = Box::new(move |value| {
            if let Some(pipe) = weak.upgrade() {
                pipe.handle_notification(value);
            }
        });
        pipe.peripheral
            .subscribe(Characteristic::CommandResponse, responses)?;

        let notifications: NotificationHandler = Box::new(move |value| {
            info!("card notification {:02X?}", value);
            observer(value);
        });
        pipe.peripheral
            .subscribe(Characteristic::CardNotification, notifications)?;

        debug!("pipe ready, mtu {}, {} bytes per frame", mtu, max_payload);
        Ok(pipe)
    }

    pub fn peripheral(&self) -> &P {
        &self.peripheral
    }

    /// Largest fragment carried by one link frame.
    pub fn max_payload(&self) -> usize {
        self.max_payload
    }

    pub fn sequence(&self) -> LinkSequence {
        *self.seq.lock()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Sends `message` and blocks until the reader answers on the same slot.
    ///
    /// Only one exchange per slot may be outstanding; callers serialize their own
    /// use of a slot. Frames already written are not recalled when the context
    /// fires first.
    pub fn exchange(&self, message: &CcidMessage, context: &Context) -> Result<CcidMessage> {
        if self.is_closed() {
            return Err(Error::Closed);
        }
        context.check()?;

        let bytes = message.encode()?;
        if bytes.len() > MAX_FRAMED_LEN {
            return Err(Error::MessageTooLarge(bytes.len()));
        }

        let slot = message.slot;
        let id = self.next_waiter.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = channel::bounded(1);
        let stale = self.waiters[slot.index()].lock().replace(Waiter {
            id,
            seq: message.seq,
            sender,
        });
        if stale.is_some() {
            warn!("{:?} slot already had a pending exchange, replacing it", slot);
        }

        let result = self
            .write_message(slot, &bytes)
            .and_then(|()| context.recv(&receiver));

        let mut waiter = self.waiters[slot.index()].lock();
        if waiter.as_ref().map_or(false, |waiter| waiter.id == id) {
            waiter.take();
        }
        drop(waiter);

        if let Err(ref _error) = result {
            debug!("exchange on {:?} slot failed: {}", slot, _error);
        }
        result
    }

    fn write_message(&self, slot: Slot, bytes: &[u8]) -> Result<()> {
        // checked by the caller against MAX_FRAMED_LEN
        let total_len = bytes.len() as u16;
        let _guard = self.write_lock.lock();

        for chunk in bytes.chunks(self.max_payload) {
            let (host_seq, reader_seq) = {
                let mut seq = self.seq.lock();
                let current = (seq.host, seq.reader);
                seq.host = seq.host.wrapping_add(1);
                current
            };

            let frame = LinkFrame {
                slot,
                total_len,
                host_seq,
                reader_seq,
                payload: chunk.to_vec(),
            };
            let encoded = frame.encode()?;
            trace!("--> {:?}", &frame);
            self.peripheral.write(&encoded)?;
        }
        Ok(())
    }

    /// Processes one command response notification.
    ///
    /// Failures are logged and dropped here; the waiting caller runs into its
    /// deadline instead.
    pub fn handle_notification(&self, value: &[u8]) {
        let frame = match LinkFrame::decode(value) {
            Ok(frame) => frame,
            Err(_error) => {
                error!("dropping link frame {:02X?}: {}", value, _error);
                return;
            }
        };

        {
            let mut seq = self.seq.lock();
            seq.reader = seq.reader.wrapping_add(1);
        }
        trace!("<-- {:?}", &frame);

        let slot = frame.slot;
        let bytes = if frame.is_complete() {
            let mut chains = self.chains.lock();
            if !chains[slot.index()].is_idle() {
                warn!("unchained frame interrupts reassembly on {:?} slot", slot);
                chains[slot.index()].reset();
            }
            frame.payload
        } else {
            let total = usize::from(frame.total_len);
            match self.chains.lock()[slot.index()].push(&frame.payload, total) {
                Ok(Some(bytes)) => bytes,
                Ok(None) => return,
                Err(_error) => {
                    error!("discarding chain on {:?} slot: {}", slot, _error);
                    return;
                }
            }
        };

        let message = match CcidMessage::decode(&bytes) {
            Ok(message) => message,
            Err(_error) => {
                error!("dropping CCID message {:02X?}: {}", &bytes, _error);
                return;
            }
        };

        if message.slot != slot {
            warn!(
                "CCID message for {:?} slot arrived in a {:?} frame",
                message.slot, slot
            );
        }
        self.deliver(slot, message);
    }

    fn deliver(&self, slot: Slot, message: CcidMessage) {
        let mut pending = self.waiters[slot.index()].lock();
        match pending.as_ref() {
            None => {
                warn!("unsolicited response on {:?} slot: {:?}", slot, &message);
                return;
            }
            // answer to an exchange that already gave up; the current one keeps waiting
            Some(waiter) if waiter.seq != message.seq => {
                warn!(
                    "dropping stale response seq {} on {:?} slot, waiting for seq {}",
                    message.seq, slot, waiter.seq
                );
                return;
            }
            Some(_) => {}
        }
        let Some(waiter) = pending.take() else {
            return;
        };
        drop(pending);

        // the channel holds one message and this waiter only ever gets one
        if waiter.sender.try_send(message).is_err() {
            warn!("waiter on {:?} slot went away", slot);
        }
    }

    /// Fails pending and future exchanges and disconnects the peripheral.
    pub fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        for waiter in &self.waiters {
            waiter.lock().take();
        }
        self.chains.lock().iter_mut().for_each(ChainingBuffer::reset);
        self.peripheral.disconnect()?;
        Ok(())
    }
}
