//! Error types for the driver.

use std::io;
use std::time::Duration;

use thiserror::Error;

/// Errors raised by a transport implementation.
#[derive(Error, Debug)]
pub enum TransportError {
    /// I/O error on the underlying stream.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Serial port error.
    #[error("serial port error: {0}")]
    Serial(#[from] serialport::Error),
}

/// Errors raised by driver operations.
#[derive(Error, Debug)]
pub enum DriverError {
    /// The deadline elapsed without the expected response.
    #[error("timed out after {0:?} waiting for module response")]
    Timeout(Duration),

    /// The module answered, but not with what the command requires.
    #[error("unexpected response to {command}: {response:?}")]
    UnexpectedResponse {
        /// Command string that was sent.
        command: String,
        /// Joined response text that was collected.
        response: String,
    },

    /// The underlying transport failed.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The driver has been shut down.
    #[error("driver is closed")]
    Closed,
}

/// Result type for driver operations.
pub type DriverResult<T> = Result<T, DriverError>;
