use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use keyrhythm::config::AppConfig;
use keyrhythm::keyboard::{spawn_blocking_reader, CollectorHandle};
use keyrhythm::monitor::{KeyboardMonitor, StatusRelay};
use keyrhythm::transport::{
    forward_commands, relay_transport_events, DeviceTransport, LoggingTransport, MqttTransport,
};
use tokio::io::BufReader;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    setup()?;

    let config = AppConfig::load()
        .await
        .wrap_err("Failed to load config")?;

    let mut monitor = KeyboardMonitor::new(config.monitor_settings());
    let status = monitor.status_relay();

    let (transport_tx, transport_rx) = mpsc::unbounded_channel();
    let mut transport: Box<dyn DeviceTransport> = match &config.transport.mqtt {
        Some(mqtt) => Box::new(MqttTransport::connect(mqtt, transport_tx)),
        None => {
            info!("No MQTT broker configured, logging commands only");
            Box::new(LoggingTransport::new(transport_tx))
        }
    };
    let _relay_handle = tokio::spawn(relay_transport_events(transport_rx, status.clone()));
    let _status_handle = tokio::spawn(log_status_changes(status.clone()));

    // Key transitions arrive on stdin as "<usage> <down|up>" lines. The read
    // happens on a plain thread so a quiet terminal cannot stall shutdown.
    let token = CancellationToken::new();
    let (raw_tx, raw_rx) = mpsc::unbounded_channel();
    let stdin = spawn_blocking_reader(std::io::stdin(), "stdin").wrap_err("Failed to read stdin")?;
    let collector = CollectorHandle::spawn(BufReader::new(stdin), raw_tx, token.clone());

    let events = monitor.new_event_stream();
    monitor.start(raw_rx);

    let bridge_status = status.clone();
    let bridge = tokio::spawn(async move {
        forward_commands(events, &mut transport, &bridge_status).await;
    });

    info!("Monitoring keyboard, press Ctrl+C to stop");
    tokio::signal::ctrl_c().await?;
    info!("Shutting down");

    token.cancel();
    monitor.stop().await.wrap_err("Failed to stop monitor")?;
    bridge.await?;
    if let Err(e) = collector.join().await {
        warn!("Key collector ended with error: {}", e);
    }

    Ok(())
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }
    setup_logging_env();
    Ok(())
}

fn setup_logging_env() {
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .init();
}

async fn log_status_changes(status: StatusRelay) {
    let mut receiver = status.subscribe();
    while receiver.changed().await.is_ok() {
        let current = receiver.borrow_and_update().clone();
        debug!(
            "Status: connection={:?} tempo={:.0}ms ({:.1} keys/s) last={:?}",
            current.connection,
            current.typing_interval_ms,
            current.keys_per_second,
            current.last_command.map(|c| c.to_string())
        );
    }
}
