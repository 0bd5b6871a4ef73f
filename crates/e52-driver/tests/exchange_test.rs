//! End-to-end exchange tests over a scripted transport.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use e52_driver::{
    CommandOptions, DriverError, LoRaModule, ScriptedHandle, ScriptedTransport, Transport,
    TransportError,
};
use e52_protocol::{AtCommand, DeliveryMode};

/// Wraps a scripted transport and counts input discards.
struct CountingTransport {
    inner: ScriptedTransport,
    discards: Arc<AtomicUsize>,
}

impl Transport for CountingTransport {
    fn read_chunk(&mut self, buf: &mut [u8]) -> Result<Option<usize>, TransportError> {
        self.inner.read_chunk(buf)
    }

    fn write_all(&mut self, data: &[u8]) -> Result<(), TransportError> {
        self.inner.write_all(data)
    }

    fn discard_input(&mut self) -> Result<(), TransportError> {
        self.discards.fetch_add(1, Ordering::SeqCst);
        self.inner.discard_input()
    }
}

fn setup() -> (Arc<LoRaModule>, ScriptedHandle) {
    let (transport, handle) = ScriptedTransport::pair();
    let module = Arc::new(LoRaModule::with_transport(Box::new(transport)));
    (module, handle)
}

fn short_options(millis: u64) -> CommandOptions {
    CommandOptions {
        timeout: Duration::from_millis(millis),
        ..CommandOptions::default()
    }
}

fn wait_until(pred: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if pred() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    false
}

#[test]
fn test_set_command_with_merged_response() {
    let (module, handle) = setup();

    let received = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&received);
    module.on_async(move |s| sink.lock().push(s.to_string()));

    let worker = Arc::clone(&module);
    let t = thread::spawn(move || {
        worker.execute_with(
            &AtCommand::SetOption {
                mode: DeliveryMode::Broadcast,
                save: true,
            },
            false,
            &short_options(200),
        )
    });

    let written = handle
        .next_written(Duration::from_secs(2))
        .expect("command should be written");
    assert_eq!(written, b"AT+OPTION=3,1");

    // Payload and acknowledgment glued onto one physical line.
    handle.feed_line("Hello Module A!AT+OPTION=OK");

    let response = t.join().unwrap().expect("command should succeed");
    assert_eq!(response, "AT+OPTION=OK");

    assert!(wait_until(|| received.lock().contains(&"Hello Module A!".to_string())));
    module.shutdown();
}

#[test]
fn test_query_with_empty_response() {
    let (module, handle) = setup();

    let worker = Arc::clone(&module);
    let t = thread::spawn(move || {
        worker.execute_with(&AtCommand::GetChannel, false, &short_options(50))
    });

    assert_eq!(
        handle.next_written(Duration::from_secs(2)).unwrap(),
        b"AT+CHANNEL=?"
    );

    // Queries have no expectation; silence is an empty result, not an error.
    let response = t.join().unwrap().expect("query should not fail");
    assert_eq!(response, "");
    module.shutdown();
}

#[test]
fn test_query_collects_multiple_lines() {
    let (module, handle) = setup();

    let worker = Arc::clone(&module);
    let t = thread::spawn(move || {
        worker.execute_with(&AtCommand::GetInfo, false, &short_options(200))
    });

    assert_eq!(
        handle.next_written(Duration::from_secs(2)).unwrap(),
        b"AT+INFO=?"
    );
    handle.feed_line("AT+CHANNEL=0x0d,13");
    handle.feed_line("AT+PANID=0x1234");

    let response = t.join().unwrap().unwrap();
    assert_eq!(response, "AT+CHANNEL=0x0d,13\nAT+PANID=0x1234");
    module.shutdown();
}

#[test]
fn test_set_command_unexpected_response() {
    let (module, handle) = setup();

    let worker = Arc::clone(&module);
    let t = thread::spawn(move || {
        worker.execute_with(
            &AtCommand::SetChannel { channel: 13, save: true },
            false,
            &short_options(200),
        )
    });

    assert_eq!(
        handle.next_written(Duration::from_secs(2)).unwrap(),
        b"AT+CHANNEL=13,1"
    );
    handle.feed_line("AT+CHANNEL=ERR");

    match t.join().unwrap() {
        Err(DriverError::UnexpectedResponse { command, response }) => {
            assert_eq!(command, "AT+CHANNEL=13,1");
            assert_eq!(response, "AT+CHANNEL=ERR");
        }
        other => panic!("expected UnexpectedResponse, got {other:?}"),
    }
    module.shutdown();
}

#[test]
fn test_set_command_silence_is_mismatch() {
    let (module, handle) = setup();

    let worker = Arc::clone(&module);
    let t = thread::spawn(move || {
        worker.execute_with(
            &AtCommand::SetChannel { channel: 13, save: false },
            false,
            &short_options(50),
        )
    });

    assert!(handle.next_written(Duration::from_secs(2)).is_some());

    // A set answered by nothing fails the expectation check, same as a wrong
    // answer would.
    match t.join().unwrap() {
        Err(DriverError::UnexpectedResponse { response, .. }) => {
            assert_eq!(response, "");
        }
        other => panic!("expected UnexpectedResponse, got {other:?}"),
    }
    module.shutdown();
}

#[test]
fn test_remote_command_prefix() {
    let (module, handle) = setup();

    let worker = Arc::clone(&module);
    let t = thread::spawn(move || {
        worker.execute_with(
            &AtCommand::SetOption {
                mode: DeliveryMode::Unicast,
                save: true,
            },
            true,
            &short_options(100),
        )
    });

    assert_eq!(
        handle.next_written(Duration::from_secs(2)).unwrap(),
        b"++AT+OPTION=1,1"
    );
    handle.feed_line("AT+OPTION=OK");
    assert!(t.join().unwrap().is_ok());
    module.shutdown();
}

#[test]
fn test_send_first_match_routes_rest_to_handler() {
    let (module, handle) = setup();

    let received = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&received);
    module.on_async(move |s| sink.lock().push(s.to_string()));

    let worker = Arc::clone(&module);
    let t = thread::spawn(move || worker.send_with(b"Hello Module B!", Duration::from_secs(5)));

    assert_eq!(
        handle.next_written(Duration::from_secs(2)).unwrap(),
        b"Hello Module B!"
    );
    handle.feed_line("junk1");
    // Payload glued to the confirmation: the splitter separates "USER:x"
    // from "SUCCESS", and only the matching segment wins the exchange.
    handle.feed_line("USER:xSUCCESS");
    handle.feed_line("junk2");

    let confirmation = t.join().unwrap().expect("send should confirm");
    assert_eq!(confirmation, "SUCCESS");

    // Non-matching traffic, before and after the match, goes to the handler.
    assert!(wait_until(|| {
        let seen = received.lock();
        seen.contains(&"junk1".to_string())
            && seen.contains(&"USER:x".to_string())
            && seen.contains(&"junk2".to_string())
    }));
    module.shutdown();
}

#[test]
fn test_exchanges_are_mutually_exclusive() {
    let (module, handle) = setup();
    let window = Duration::from_millis(80);

    let a = Arc::clone(&module);
    let ta = thread::spawn(move || {
        let _ = a.execute_with(&AtCommand::GetChannel, false, &short_options(80));
    });
    let b = Arc::clone(&module);
    let tb = thread::spawn(move || {
        let _ = b.execute_with(&AtCommand::GetPanId, false, &short_options(80));
    });

    assert!(handle.next_written(Duration::from_secs(2)).is_some());
    let first_done = Instant::now();
    assert!(handle.next_written(Duration::from_secs(2)).is_some());

    // The second command cannot reach the wire until the first window closed.
    assert!(first_done.elapsed() >= window - Duration::from_millis(10));

    ta.join().unwrap();
    tb.join().unwrap();
    module.shutdown();
}

#[test]
fn test_shutdown_interrupts_awaiting_exchange() {
    let (module, handle) = setup();

    let worker = Arc::clone(&module);
    let t = thread::spawn(move || {
        worker.execute_with(&AtCommand::GetChannel, false, &short_options(10_000))
    });

    assert!(handle.next_written(Duration::from_secs(2)).is_some());

    let start = Instant::now();
    module.shutdown();
    assert!(matches!(t.join().unwrap(), Err(DriverError::Timeout(_))));
    assert!(start.elapsed() < Duration::from_secs(2));
}

#[test]
fn test_exchange_after_shutdown_is_refused() {
    let (module, _handle) = setup();
    module.shutdown();

    assert!(matches!(
        module.execute(&AtCommand::GetChannel),
        Err(DriverError::Closed)
    ));
    assert!(matches!(module.send(b"data"), Err(DriverError::Closed)));
}

#[test]
fn test_send_discards_stale_input() {
    let (inner, handle) = ScriptedTransport::pair();
    let discards = Arc::new(AtomicUsize::new(0));
    let transport = CountingTransport {
        inner,
        discards: Arc::clone(&discards),
    };
    let module = Arc::new(LoRaModule::with_transport(Box::new(transport)));

    let worker = Arc::clone(&module);
    let t = thread::spawn(move || worker.send_with(b"payload", Duration::from_secs(2)));

    assert_eq!(
        handle.next_written(Duration::from_secs(2)).unwrap(),
        b"payload"
    );
    handle.feed_line("SUCCESS");

    assert_eq!(t.join().unwrap().unwrap(), "SUCCESS");
    // The send path drops residual input before opening its exchange, same
    // as the command path.
    assert!(discards.load(Ordering::SeqCst) >= 1);
    module.shutdown();
}

#[test]
fn test_idle_traffic_goes_to_handler() {
    let (module, handle) = setup();

    let received = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&received);
    module.on_async(move |s| sink.lock().push(s.to_string()));

    handle.feed_line("Hello Module A!");
    handle.feed_line("sensor reading 42");

    assert!(wait_until(|| received.lock().len() == 2));
    assert_eq!(
        *received.lock(),
        vec!["Hello Module A!".to_string(), "sensor reading 42".to_string()]
    );
    module.shutdown();
}
