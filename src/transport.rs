//! The GATT connection as seen by the driver.
//!
//! Discovery, connection setup and MTU negotiation happen in the BLE stack; the
//! driver only needs to write to the command request characteristic and to be
//! notified on the two notifying characteristics.

pub use crate::constants::uuid;

/// Receives the raw value of every notification on one characteristic.
pub type NotificationHandler = Box<dyn FnMut(&[u8]) + Send + 'static>;

/// Notifying characteristics of the reader service.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Characteristic {
    /// Link frames answering host commands.
    CommandResponse,
    /// Card insertion and removal events.
    CardNotification,
}

impl Characteristic {
    pub fn uuid(&self) -> [u8; 16] {
        match self {
            Characteristic::CommandResponse => uuid::COMMAND_RESPONSE,
            Characteristic::CardNotification => uuid::CARD_NOTIFICATION,
        }
    }
}

/// A connected reader.
///
/// Notifications on one characteristic must be delivered in order and never
/// concurrently with each other.
pub trait Peripheral: Send + Sync + 'static {
    /// Negotiated ATT MTU.
    fn mtu(&self) -> usize;

    /// Write without response to the command request characteristic.
    fn write(&self, value: &[u8]) -> Result<(), TransportError>;

    fn subscribe(
        &self,
        characteristic: Characteristic,
        handler: NotificationHandler,
    ) -> Result<(), TransportError>;

    fn disconnect(&self) -> Result<(), TransportError> {
        Ok(())
    }
}

/// Failure reported by the BLE stack.
#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct TransportError(Box<dyn std::error::Error + Send + Sync>);

impl TransportError {
    pub fn new<E>(error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self(error.into())
    }

    pub fn get_ref(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
        &*self.0
    }

    pub fn into_inner(self) -> Box<dyn std::error::Error + Send + Sync> {
        self.0
    }
}
