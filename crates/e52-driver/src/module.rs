//! The module handle: transport ownership, reader thread, and the exchange
//! entry points.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use e52_protocol::{
    AtCommand, LineAssembler, SEND_SUCCESS_TOKEN, is_command_response, split_merged_line,
};

use crate::error::{DriverError, DriverResult};
use crate::session::{
    AccumulateOutcome, Correlator, FirstMatchOutcome, SegmentFilter,
};
use crate::transport::{SerialConfig, SerialTransport, Transport};

/// Default window for a configuration command.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(2);

/// Default window for a user-data send confirmation.
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(5);

/// How long shutdown waits for the reader thread before detaching it.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

const READ_BUFFER_SIZE: usize = 512;

/// Per-command overrides for [`LoRaModule::execute_with`].
#[derive(Clone)]
pub struct CommandOptions {
    /// Response window for the exchange.
    pub timeout: Duration,
    /// Replacement for the default response filter.
    pub filter: Option<SegmentFilter>,
}

impl Default for CommandOptions {
    fn default() -> Self {
        CommandOptions {
            timeout: DEFAULT_COMMAND_TIMEOUT,
            filter: None,
        }
    }
}

/// Handle to an E52 module on a UART.
///
/// One reader thread drains the transport for the life of the handle; all
/// command and send entry points serialize on an internal exchange lock, so
/// the handle can be shared behind an `Arc<LoRaModule>` across threads.
pub struct LoRaModule {
    transport: Arc<Mutex<Box<dyn Transport>>>,
    correlator: Arc<Correlator>,
    exchange_lock: Mutex<()>,
    stop: Arc<AtomicBool>,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl LoRaModule {
    /// Open the configured serial port and start the reader thread.
    pub fn open(config: &SerialConfig) -> DriverResult<Self> {
        let transport = SerialTransport::open(config)?;
        Ok(Self::with_transport(Box::new(transport)))
    }

    /// Build a handle over an existing transport and start the reader thread.
    pub fn with_transport(transport: Box<dyn Transport>) -> Self {
        let transport = Arc::new(Mutex::new(transport));
        let correlator = Arc::new(Correlator::new());
        let stop = Arc::new(AtomicBool::new(false));

        let reader = {
            let transport = Arc::clone(&transport);
            let correlator = Arc::clone(&correlator);
            let stop = Arc::clone(&stop);
            thread::spawn(move || reader_loop(transport, correlator, stop))
        };

        LoRaModule {
            transport,
            correlator,
            exchange_lock: Mutex::new(()),
            stop,
            reader: Mutex::new(Some(reader)),
        }
    }

    /// Register the handler for unsolicited traffic. The handler runs on the
    /// reader thread, one segment at a time, in arrival order.
    pub fn on_async(&self, handler: impl FnMut(&str) + Send + 'static) {
        self.correlator.set_handler(Box::new(handler));
    }

    /// Execute a command against the locally attached module.
    pub fn execute(&self, command: &AtCommand) -> DriverResult<String> {
        self.execute_with(command, false, &CommandOptions::default())
    }

    /// Execute a command against a remote module through the mesh.
    ///
    /// The target is selected by the current destination address and port;
    /// the command itself only differs in its `++AT+` prefix.
    pub fn execute_remote(&self, command: &AtCommand) -> DriverResult<String> {
        self.execute_with(command, true, &CommandOptions::default())
    }

    /// Execute a command with explicit options.
    ///
    /// The exchange accumulates matching segments for the whole window, then
    /// checks the command's expectation against the joined text. Queries
    /// return whatever was collected, possibly the empty string.
    pub fn execute_with(
        &self,
        command: &AtCommand,
        remote: bool,
        options: &CommandOptions,
    ) -> DriverResult<String> {
        let _guard = self.exchange_lock.lock();

        let wire = command.to_command_string(remote);
        let filter = options
            .filter
            .clone()
            .unwrap_or_else(|| Arc::new(|s: &str| is_command_response(s)));

        tracing::debug!(command = %wire, "executing command");

        // Stale bytes from before the exchange would be misattributed.
        self.transport.lock().discard_input()?;
        self.correlator.begin_accumulate(filter)?;

        if let Err(e) = self.transport.lock().write_all(&command.encode(remote)) {
            self.correlator.abort();
            return Err(e.into());
        }

        let lines = match self.correlator.wait_accumulate(options.timeout) {
            AccumulateOutcome::Collected(lines) => lines,
            AccumulateOutcome::Interrupted => return Err(DriverError::Timeout(options.timeout)),
        };
        let response = lines.join("\n");
        tracing::debug!(command = %wire, response = %response, "command finished");

        // A silent window fails the check too: the empty string never
        // contains the token.
        match command.expectation() {
            Some(token) if !response.to_ascii_uppercase().contains(token) => {
                Err(DriverError::UnexpectedResponse {
                    command: wire,
                    response,
                })
            }
            _ => Ok(response),
        }
    }

    /// Send user data to the mesh and wait for the delivery confirmation.
    pub fn send(&self, payload: &[u8]) -> DriverResult<String> {
        self.send_with(payload, DEFAULT_SEND_TIMEOUT)
    }

    /// Send user data with an explicit confirmation window.
    ///
    /// The first segment containing `SUCCESS` finishes the exchange; segments
    /// arriving before it (including payload from other nodes) go to the
    /// async handler.
    pub fn send_with(&self, payload: &[u8], timeout: Duration) -> DriverResult<String> {
        let _guard = self.exchange_lock.lock();

        tracing::debug!(len = payload.len(), "sending user data");

        // Stale bytes from before the exchange would be misattributed.
        self.transport.lock().discard_input()?;
        self.correlator.begin_first_match(SEND_SUCCESS_TOKEN)?;

        if let Err(e) = self.transport.lock().write_all(payload) {
            self.correlator.abort();
            return Err(e.into());
        }

        match self.correlator.wait_first_match(timeout) {
            FirstMatchOutcome::Matched(line) => Ok(line),
            FirstMatchOutcome::TimedOut | FirstMatchOutcome::Interrupted => {
                Err(DriverError::Timeout(timeout))
            }
        }
    }

    /// Stop the reader thread and refuse further exchanges.
    ///
    /// An exchange awaiting at shutdown reports a timeout. The reader thread
    /// gets [`SHUTDOWN_GRACE`] to notice the stop flag; if it is still inside
    /// a read after that, it is detached and exits on its next wakeup.
    pub fn shutdown(&self) {
        if self.stop.swap(true, Ordering::SeqCst) {
            return;
        }
        self.correlator.close();

        if let Some(handle) = self.reader.lock().take() {
            let deadline = Instant::now() + SHUTDOWN_GRACE;
            while !handle.is_finished() && Instant::now() < deadline {
                thread::sleep(Duration::from_millis(10));
            }
            if handle.is_finished() {
                let _ = handle.join();
            } else {
                tracing::warn!("reader thread still running after shutdown grace, detaching");
            }
        }
    }

    /// Whether [`shutdown`](Self::shutdown) has been called.
    pub fn is_shut_down(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }
}

impl Drop for LoRaModule {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Drain the transport: read chunks, assemble lines, split merged lines, and
/// dispatch each segment. A failed read is logged and the loop keeps going;
/// bytes lost that way are gone without further notice.
fn reader_loop(
    transport: Arc<Mutex<Box<dyn Transport>>>,
    correlator: Arc<Correlator>,
    stop: Arc<AtomicBool>,
) {
    let mut assembler = LineAssembler::new();
    let mut buf = [0u8; READ_BUFFER_SIZE];

    while !stop.load(Ordering::SeqCst) {
        let read = transport.lock().read_chunk(&mut buf);
        match read {
            Ok(Some(n)) => {
                assembler.push(&buf[..n]);
                while let Some(line) = assembler.next_line() {
                    for segment in split_merged_line(&line) {
                        correlator.dispatch(&segment);
                    }
                }
            }
            Ok(None) => {}
            Err(e) => {
                // Back off so a dead port does not spin the log.
                tracing::warn!(error = %e, "transport read failed");
                thread::sleep(Duration::from_millis(50));
            }
        }
    }
    tracing::debug!("reader thread stopped");
}
