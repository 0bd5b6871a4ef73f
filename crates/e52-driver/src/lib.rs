//! Host-side driver for the EBYTE E52-xxxNW22S LoRa mesh module.
//!
//! The module speaks a line-oriented, half-duplex AT dialect over a UART and
//! interleaves command responses, send confirmations, and unsolicited mesh
//! payload on the same stream. This crate owns the port, runs a reader thread
//! that demultiplexes that stream, and correlates command exchanges with
//! their responses.
//!
//! # Example
//!
//! ```rust,no_run
//! use e52_driver::{LoRaModule, SerialConfig};
//! use e52_protocol::AtCommand;
//!
//! # fn main() -> e52_driver::DriverResult<()> {
//! let module = LoRaModule::open(&SerialConfig::new("/dev/ttyUSB0"))?;
//! module.on_async(|segment| println!("received: {segment}"));
//!
//! module.execute(&AtCommand::SetChannel { channel: 13, save: true })?;
//! let confirmation = module.send(b"Hello Module B!")?;
//! println!("delivered: {confirmation}");
//! # Ok(())
//! # }
//! ```

mod error;
mod module;
mod session;
mod transport;

pub use error::*;
pub use module::*;
pub use session::*;
pub use transport::*;
