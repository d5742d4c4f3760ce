use std::sync::{Arc, Mutex};
use std::time::Duration;

use keyrhythm::keyboard::{CollectorHandle, KeyCode, RawKeyEvent};
use keyrhythm::mapping::{Command, DeviceRequest};
use keyrhythm::monitor::{KeyboardMonitor, MonitorEvent, MonitorSettings};
use keyrhythm::transport::{forward_commands, DeviceTransport, TransportError};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

#[derive(Clone, Default)]
struct RecordingTransport {
    sent: Arc<Mutex<Vec<Command>>>,
    reconnects: Arc<Mutex<usize>>,
}

impl RecordingTransport {
    fn requests(&self) -> Vec<DeviceRequest> {
        self.sent.lock().unwrap().iter().map(|c| c.request).collect()
    }
}

impl DeviceTransport for RecordingTransport {
    fn send(&mut self, command: Command) -> Result<(), TransportError> {
        self.sent.lock().unwrap().push(command);
        Ok(())
    }

    fn reconnect(&mut self) -> Result<(), TransportError> {
        *self.reconnects.lock().unwrap() += 1;
        Ok(())
    }
}

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

/// Feeds `presses` as (key, offset in ms) key-downs followed by releases
fn press_all(tx: &mpsc::UnboundedSender<RawKeyEvent>, t0: Instant, presses: &[(KeyCode, u64)]) {
    for &(key, offset) in presses {
        tx.send(RawKeyEvent::pressed(key, t0 + ms(offset))).unwrap();
        tx.send(RawKeyEvent::released(key, t0 + ms(offset + 5))).unwrap();
    }
}

#[tokio::test]
async fn session_reaches_transport_in_order() {
    let mut monitor = KeyboardMonitor::default();
    let status = monitor.status_relay();
    let events = monitor.new_event_stream();
    let transport = RecordingTransport::default();

    let mut bridge_transport = transport.clone();
    let bridge_status = status.clone();
    let bridge = tokio::spawn(async move {
        forward_commands(events, &mut bridge_transport, &bridge_status).await;
    });

    let (raw_tx, raw_rx) = mpsc::unbounded_channel();
    monitor.start(raw_rx);

    let t0 = Instant::now();
    press_all(
        &raw_tx,
        t0,
        &[
            (KeyCode::J, 0),
            (KeyCode::K, 120),
            (KeyCode::L, 240),
            (KeyCode::SPACE, 400),
            (KeyCode::SPACE, 500),
            (KeyCode::SPACE, 600),
            (KeyCode::SPACE, 700),
            (KeyCode::PRINT_SCREEN, 750),
        ],
    );
    monitor.connect();

    // Wait until the pipeline drained everything before stopping
    let mut status_rx = monitor.subscribe_status();
    status_rx
        .wait_for(|s| s.last_command.is_some_and(|c| c.request == DeviceRequest::BothQuad))
        .await
        .unwrap();
    drop(status_rx);

    monitor.stop().await.unwrap();
    bridge.await.unwrap();

    assert_eq!(
        transport.requests(),
        vec![
            DeviceRequest::Right,
            DeviceRequest::Right,
            DeviceRequest::RightTriple,
            DeviceRequest::Both,
            DeviceRequest::Both,
            DeviceRequest::BothTriple,
            DeviceRequest::BothQuad,
        ]
    );
    assert_eq!(*transport.reconnects.lock().unwrap(), 1);
}

#[tokio::test]
async fn multi_press_interval_averages_the_burst() {
    let mut monitor = KeyboardMonitor::default();
    let mut events = monitor.new_event_stream();
    let (raw_tx, raw_rx) = mpsc::unbounded_channel();
    monitor.start(raw_rx);

    // Left, Right, Left, Right at 150 ms spacing
    let t0 = Instant::now();
    press_all(
        &raw_tx,
        t0,
        &[(KeyCode::A, 0), (KeyCode::J, 150), (KeyCode::S, 300), (KeyCode::K, 450)],
    );

    let mut commands = Vec::new();
    while commands.len() < 4 {
        match events.recv().await {
            Some(MonitorEvent::DeviceAction(command)) => commands.push(command),
            other => panic!("unexpected event {:?}", other),
        }
    }
    monitor.stop().await.unwrap();

    assert_eq!(commands[0], Command::new(DeviceRequest::Left, ms(500)));
    assert_eq!(commands[1], Command::new(DeviceRequest::Right, ms(150)));
    assert_eq!(commands[2], Command::new(DeviceRequest::Left, ms(150)));
    // Three 150 ms intervals over six movements
    assert_eq!(
        commands[3],
        Command::new(DeviceRequest::AlternateStartingLeft, ms(75))
    );
}

#[tokio::test]
async fn pause_starts_a_new_burst() {
    let mut monitor = KeyboardMonitor::new(MonitorSettings::default());
    let mut events = monitor.new_event_stream();
    let (raw_tx, raw_rx) = mpsc::unbounded_channel();
    monitor.start(raw_rx);

    let t0 = Instant::now();
    press_all(&raw_tx, t0, &[(KeyCode::D, 0), (KeyCode::F, 300), (KeyCode::G, 2_600)]);

    let mut intervals = Vec::new();
    while intervals.len() < 3 {
        if let Some(MonitorEvent::DeviceAction(command)) = events.recv().await {
            intervals.push(command.interval);
        }
    }
    monitor.stop().await.unwrap();

    assert_eq!(intervals, vec![ms(500), ms(300), ms(500)]);
}

#[tokio::test]
async fn collector_feeds_the_monitor() {
    // Repeated key-down and the junk line are dropped by the collector
    let input: &[u8] = b"0x04 down\n0x04 down\nbogus\n0x04 up\n";
    let token = CancellationToken::new();
    let (raw_tx, raw_rx) = mpsc::unbounded_channel();

    let mut monitor = KeyboardMonitor::default();
    let mut events = monitor.new_event_stream();
    monitor.start(raw_rx);

    let collector = CollectorHandle::spawn(input, raw_tx, token);
    collector.join().await.unwrap();

    assert_eq!(
        events.recv().await,
        Some(MonitorEvent::DeviceAction(Command::new(DeviceRequest::Left, ms(500))))
    );
    monitor.stop().await.unwrap();
    assert_eq!(events.recv().await, None);
}
