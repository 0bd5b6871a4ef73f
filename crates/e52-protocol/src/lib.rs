//! E52-xxxNW22S AT Command Protocol
//!
//! This crate provides types and utilities for the UART dialect spoken by the
//! EBYTE E52-xxxNW22S LoRa mesh module. The module mixes three kinds of
//! traffic on a single line-oriented byte stream:
//!
//! - **Command responses** (module → host): lines such as `AT+CHANNEL=OK` or
//!   `AT+CHANNEL=0x0d,13`, produced in reply to an `AT+` command.
//! - **Send confirmations**: a line containing `SUCCESS` after user data has
//!   been delivered to the mesh.
//! - **Unsolicited messages**: raw payload received over the air, which the
//!   module prints on the same UART with no framing of its own.
//!
//! Because the wire protocol has no length or boundary field, the module will
//! happily glue an incoming payload and a command acknowledgment onto one
//! physical line (`"Hello Module A!AT+OPTION=OK"`). The pieces here deal with
//! that reality:
//!
//! - [`LineAssembler`] reconstructs decoded text lines from raw bytes.
//! - [`split_merged_line`] heuristically separates merged lines into segments.
//! - [`is_command_response`] is the default segment classifier.
//! - [`AtCommand`] is the typed catalog of module operations with their wire
//!   encoding.
//!
//! # Example
//!
//! ```rust
//! use e52_protocol::{AtCommand, split_merged_line};
//!
//! let cmd = AtCommand::SetChannel { channel: 13, save: true };
//! assert_eq!(cmd.to_command_string(false), "AT+CHANNEL=13,1");
//!
//! let segments = split_merged_line("Hello Module A!AT+OPTION=OK");
//! assert_eq!(segments, vec!["Hello Module A!", "AT+OPTION=OK"]);
//! ```

mod classify;
mod codec;
mod command;
mod splitter;

pub use classify::*;
pub use codec::*;
pub use command::*;
pub use splitter::*;
