//! Correlation of stream segments with in-flight commands.
//!
//! The reader thread pushes decoded segments into the [`Correlator`]; the
//! caller thread opens an exchange, writes the command, and waits. At most one
//! exchange is active at a time, so every segment either belongs to it or is
//! unsolicited traffic for the async handler.
//!
//! Two exchange policies exist:
//!
//! - **Accumulate**: collect every segment the exchange filter accepts for
//!   the whole deadline window, then hand back the lot. Command responses can
//!   span several lines and the module gives no end marker, so waiting out
//!   the window is the only way to know the response is complete.
//! - **First match**: the first segment containing a success token finishes
//!   the exchange immediately; every other segment goes to the async handler.
//!   Used for user-data sends, where the confirmation is a single line.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::error::{DriverError, DriverResult};

/// Wait granularity for exchange deadlines. A deadline is overshot by at most
/// this much.
pub const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Predicate selecting the segments that belong to an accumulate exchange.
pub type SegmentFilter = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Handler invoked with each unsolicited segment, on the reader thread.
pub type AsyncHandler = Box<dyn FnMut(&str) + Send>;

enum Exchange {
    Accumulate {
        filter: SegmentFilter,
        collected: Vec<String>,
    },
    FirstMatch {
        token: String,
        matched: Option<String>,
    },
}

struct State {
    closed: bool,
    exchange: Option<Exchange>,
}

/// Outcome of an accumulate exchange.
pub enum AccumulateOutcome {
    /// The window elapsed; these are the segments the filter accepted.
    Collected(Vec<String>),
    /// The correlator was closed while the exchange was awaiting.
    Interrupted,
}

/// Outcome of a first-match exchange.
pub enum FirstMatchOutcome {
    /// A segment containing the success token arrived.
    Matched(String),
    /// The window elapsed without a match.
    TimedOut,
    /// The correlator was closed while the exchange was awaiting.
    Interrupted,
}

/// Routes segments between the active exchange and the async handler.
pub struct Correlator {
    state: Mutex<State>,
    cond: Condvar,
    handler: Mutex<Option<AsyncHandler>>,
}

impl Default for Correlator {
    fn default() -> Self {
        Self::new()
    }
}

impl Correlator {
    /// Create an idle correlator.
    pub fn new() -> Self {
        Correlator {
            state: Mutex::new(State {
                closed: false,
                exchange: None,
            }),
            cond: Condvar::new(),
            handler: Mutex::new(None),
        }
    }

    /// Register the handler for unsolicited segments. Replaces any previous
    /// handler.
    pub fn set_handler(&self, handler: AsyncHandler) {
        *self.handler.lock() = Some(handler);
    }

    /// Open an accumulate exchange.
    pub fn begin_accumulate(&self, filter: SegmentFilter) -> DriverResult<()> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(DriverError::Closed);
        }
        state.exchange = Some(Exchange::Accumulate {
            filter,
            collected: Vec::new(),
        });
        Ok(())
    }

    /// Open a first-match exchange for `token` (matched case-insensitively).
    pub fn begin_first_match(&self, token: &str) -> DriverResult<()> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(DriverError::Closed);
        }
        state.exchange = Some(Exchange::FirstMatch {
            token: token.to_ascii_uppercase(),
            matched: None,
        });
        Ok(())
    }

    /// Abandon the active exchange without waiting. Used when the command
    /// write itself failed.
    pub fn abort(&self) {
        self.state.lock().exchange = None;
    }

    /// Feed one segment in. Called from the reader thread.
    ///
    /// The state lock is released before the async handler runs, so a slow
    /// handler never stalls an exchange wait.
    pub fn dispatch(&self, segment: &str) {
        let to_async = {
            let mut state = self.state.lock();
            match &mut state.exchange {
                Some(Exchange::Accumulate { filter, collected }) if filter(segment) => {
                    collected.push(segment.to_string());
                    false
                }
                Some(Exchange::FirstMatch { token, matched }) if matched.is_none() => {
                    if segment.to_ascii_uppercase().contains(token.as_str()) {
                        *matched = Some(segment.to_string());
                        self.cond.notify_all();
                        false
                    } else {
                        true
                    }
                }
                _ => true,
            }
        };

        if to_async {
            tracing::debug!(segment, "unsolicited segment");
            if let Some(handler) = self.handler.lock().as_mut() {
                handler(segment);
            }
        }
    }

    /// Wait out the full `window`, then return everything the exchange
    /// collected. There is no early return on a match; the response may keep
    /// growing until the deadline.
    pub fn wait_accumulate(&self, window: Duration) -> AccumulateOutcome {
        let deadline = Instant::now() + window;
        let mut state = self.state.lock();
        loop {
            if state.closed {
                state.exchange = None;
                return AccumulateOutcome::Interrupted;
            }
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            let step = POLL_INTERVAL.min(deadline - now);
            let _ = self.cond.wait_for(&mut state, step);
        }
        match state.exchange.take() {
            Some(Exchange::Accumulate { collected, .. }) => {
                AccumulateOutcome::Collected(collected)
            }
            _ => AccumulateOutcome::Collected(Vec::new()),
        }
    }

    /// Wait until a segment containing the success token arrives or the
    /// `window` elapses.
    pub fn wait_first_match(&self, window: Duration) -> FirstMatchOutcome {
        let deadline = Instant::now() + window;
        let mut state = self.state.lock();
        loop {
            if state.closed {
                state.exchange = None;
                return FirstMatchOutcome::Interrupted;
            }
            if let Some(Exchange::FirstMatch {
                matched: Some(_), ..
            }) = &state.exchange
            {
                break;
            }
            let now = Instant::now();
            if now >= deadline {
                state.exchange = None;
                return FirstMatchOutcome::TimedOut;
            }
            let step = POLL_INTERVAL.min(deadline - now);
            let _ = self.cond.wait_for(&mut state, step);
        }
        match state.exchange.take() {
            Some(Exchange::FirstMatch {
                matched: Some(line),
                ..
            }) => FirstMatchOutcome::Matched(line),
            _ => FirstMatchOutcome::TimedOut,
        }
    }

    /// Mark the correlator closed. Awaiting exchanges return interrupted; new
    /// exchanges are refused.
    pub fn close(&self) {
        let mut state = self.state.lock();
        state.closed = true;
        self.cond.notify_all();
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    fn accept_all() -> SegmentFilter {
        Arc::new(|_: &str| true)
    }

    #[test]
    fn test_idle_segments_go_to_handler() {
        let correlator = Correlator::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        correlator.set_handler(Box::new(move |s| sink.lock().push(s.to_string())));

        correlator.dispatch("Hello Module A!");
        assert_eq!(*seen.lock(), vec!["Hello Module A!"]);
    }

    #[test]
    fn test_accumulate_collects_until_deadline() {
        let correlator = Arc::new(Correlator::new());
        correlator.begin_accumulate(accept_all()).unwrap();

        let feeder = Arc::clone(&correlator);
        let t = thread::spawn(move || {
            feeder.dispatch("AT+CHANNEL=0x0d,13");
            thread::sleep(Duration::from_millis(30));
            feeder.dispatch("AT+CHANNEL=OK");
        });

        match correlator.wait_accumulate(Duration::from_millis(100)) {
            AccumulateOutcome::Collected(lines) => {
                assert_eq!(lines, vec!["AT+CHANNEL=0x0d,13", "AT+CHANNEL=OK"]);
            }
            AccumulateOutcome::Interrupted => panic!("unexpected interrupt"),
        }
        t.join().unwrap();
    }

    #[test]
    fn test_accumulate_filter_rejects_to_handler() {
        let correlator = Correlator::new();
        let count = Arc::new(AtomicUsize::new(0));
        let sink = Arc::clone(&count);
        correlator.set_handler(Box::new(move |_| {
            sink.fetch_add(1, Ordering::SeqCst);
        }));

        correlator
            .begin_accumulate(Arc::new(|s: &str| s.contains("OK")))
            .unwrap();
        correlator.dispatch("payload");
        correlator.dispatch("AT+OPTION=OK");

        match correlator.wait_accumulate(Duration::from_millis(10)) {
            AccumulateOutcome::Collected(lines) => assert_eq!(lines, vec!["AT+OPTION=OK"]),
            AccumulateOutcome::Interrupted => panic!("unexpected interrupt"),
        }
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_first_match_returns_early() {
        let correlator = Arc::new(Correlator::new());
        correlator.begin_first_match("SUCCESS").unwrap();

        let feeder = Arc::clone(&correlator);
        let t = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            feeder.dispatch("USER:xSUCCESS");
        });

        let start = Instant::now();
        match correlator.wait_first_match(Duration::from_secs(5)) {
            FirstMatchOutcome::Matched(line) => assert_eq!(line, "USER:xSUCCESS"),
            _ => panic!("expected match"),
        }
        assert!(start.elapsed() < Duration::from_secs(1));
        t.join().unwrap();
    }

    #[test]
    fn test_first_match_non_matching_goes_to_handler() {
        let correlator = Correlator::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        correlator.set_handler(Box::new(move |s| sink.lock().push(s.to_string())));

        correlator.begin_first_match("SUCCESS").unwrap();
        correlator.dispatch("junk1");
        correlator.dispatch("USER:xSUCCESS");
        correlator.dispatch("junk2");

        match correlator.wait_first_match(Duration::from_millis(10)) {
            FirstMatchOutcome::Matched(line) => assert_eq!(line, "USER:xSUCCESS"),
            _ => panic!("expected match"),
        }
        assert_eq!(*seen.lock(), vec!["junk1", "junk2"]);
    }

    #[test]
    fn test_close_interrupts_waiter() {
        let correlator = Arc::new(Correlator::new());
        correlator.begin_accumulate(accept_all()).unwrap();

        let closer = Arc::clone(&correlator);
        let t = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            closer.close();
        });

        let start = Instant::now();
        assert!(matches!(
            correlator.wait_accumulate(Duration::from_secs(10)),
            AccumulateOutcome::Interrupted
        ));
        assert!(start.elapsed() < Duration::from_secs(1));
        t.join().unwrap();
    }

    #[test]
    fn test_closed_refuses_new_exchange() {
        let correlator = Correlator::new();
        correlator.close();
        assert!(matches!(
            correlator.begin_accumulate(accept_all()),
            Err(DriverError::Closed)
        ));
        assert!(matches!(
            correlator.begin_first_match("SUCCESS"),
            Err(DriverError::Closed)
        ));
    }
}
