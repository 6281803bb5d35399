//! CCID smart-card reader driver over Bluetooth Low Energy.
//!
//! The reader exposes two logical slots, the contactless card (PICC) and an
//! embedded SAM, behind one GATT service. CCID messages travel inside checksummed
//! link frames sized to the negotiated MTU; responses arrive as notifications.
//!
//! [`Pipe`] turns those notifications back into blocking exchanges, [`Reader`]
//! implements the CCID commands on top, and [`Card`] binds a slot to a protocol.
//!
//! [CCID Specification for Integrated Circuit(s) Cards Interface Devices](https://www.usb.org/sites/default/files/DWG_Smart-Card_CCID_Rev110.pdf)

#[macro_use]
extern crate delog;
generate_macros!();

pub mod card;
pub mod config;
pub mod constants;
pub mod context;
pub mod error;
pub mod pipe;
pub mod reader;
pub mod transport;
pub mod types;

pub use card::{Card, Protocol};
pub use config::{Config, PowerSelect, ProtocolParameters};
pub use context::{Canceller, Context};
pub use error::{Error, ErrorCode, Result, SlotError};
pub use pipe::Pipe;
pub use reader::{Atr, Reader};
pub use transport::{Characteristic, NotificationHandler, Peripheral, TransportError};
pub use types::{
    status::{ClockStatus, IccStatus, SlotStatus},
    Slot,
};

#[allow(clippy::assertions_on_constants)]
const _: () = assert!(constants::MIN_MTU > constants::GATT_WRITE_OVERHEAD + constants::FRAME_OVERHEAD);
