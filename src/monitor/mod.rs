//! # Keyboard Monitor
//!
//! Owns one monitoring session at a time and wires the keyboard subsystem to
//! the mapper:
//!
//! ```text
//! monitor/
//! ├── pipeline.rs    - statum key pipeline (classify → tempo → mapper)
//! ├── event_sink.rs  - single-consumer outbound stream
//! ├── status.rs      - display status on a watch channel
//! └── debounce.rs    - flash and idle display timers
//! ```
//!
//! # Session lifecycle
//!
//! ```text
//! start(raw_rx) ──► KeyPipeline<Active> task + flash timer + idle timer
//!                         │
//! stop() ──► cancel ──► join all ──► close stream ──► reset display
//! ```
//!
//! Every `start` builds a fresh tempo tracker and mapper, so nothing carries
//! over from a previous session.

pub mod debounce;
pub mod event_sink;
pub mod pipeline;
pub mod status;

pub use event_sink::{EventSink, MonitorEvent};
pub use pipeline::KeyPipeline;
pub use status::{MonitorStatus, StatusRelay};

use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::keyboard::{RawKeyEvent, TempoSettings, TempoTracker};
use crate::mapping::{MapperSettings, PatternMapper};
use debounce::Debouncer;

#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    #[error("Monitor task panicked: {0}")]
    TaskPanicked(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MonitorSettings {
    pub tempo: TempoSettings,
    pub mapper: MapperSettings,
    /// How long a pressed side stays lit on the display
    pub flash_reset: Duration,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            tempo: TempoSettings::default(),
            mapper: MapperSettings::default(),
            flash_reset: Duration::from_millis(200),
        }
    }
}

struct ActiveSession {
    token: CancellationToken,
    pipeline: JoinHandle<()>,
    flash_timer: Debouncer,
    idle_timer: Debouncer,
}

pub struct KeyboardMonitor {
    settings: MonitorSettings,
    sink: EventSink,
    status: StatusRelay,
    session: Option<ActiveSession>,
}

impl KeyboardMonitor {
    pub fn new(settings: MonitorSettings) -> Self {
        Self {
            settings,
            sink: EventSink::new(),
            status: StatusRelay::new(),
            session: None,
        }
    }

    pub fn settings(&self) -> &MonitorSettings {
        &self.settings
    }

    pub fn is_monitoring(&self) -> bool {
        self.session.is_some()
    }

    /// Starts a session reading key events from `raw_receiver`
    ///
    /// Ignored while a session is already running.
    pub fn start(&mut self, raw_receiver: mpsc::UnboundedReceiver<RawKeyEvent>) {
        if self.session.is_some() {
            warn!("Monitoring already active, ignoring start request");
            return;
        }

        let token = CancellationToken::new();

        let flash_status = self.status.clone();
        let flash_timer = Debouncer::spawn(
            "flash",
            self.settings.flash_reset,
            token.clone(),
            move || flash_status.clear_flash(),
        );

        let idle_status = self.status.clone();
        let idle_timer = Debouncer::spawn(
            "idle",
            self.settings.tempo.idle_reset(),
            token.clone(),
            move || idle_status.reset_tempo(),
        );

        let pipeline = KeyPipeline::create(
            raw_receiver,
            self.sink.clone(),
            self.status.clone(),
            TempoTracker::new(self.settings.tempo.clone()),
            PatternMapper::new(self.settings.mapper.clone()),
            flash_timer.trigger(),
            idle_timer.trigger(),
        )
        .activate();

        let pipeline_token = token.clone();
        let pipeline = tokio::spawn(async move {
            pipeline.run_until_cancelled(pipeline_token).await.shutdown();
        });

        self.status.set_monitoring(true);
        self.session = Some(ActiveSession {
            token,
            pipeline,
            flash_timer,
            idle_timer,
        });
        info!("Keyboard monitoring started");
    }

    /// Ends the current session and waits for its tasks
    ///
    /// The outbound stream is closed and the display returns to idle even if
    /// a task failed.
    pub async fn stop(&mut self) -> Result<(), MonitorError> {
        let Some(session) = self.session.take() else {
            debug!("Monitoring not active, nothing to stop");
            return Ok(());
        };

        debug!("Stopping keyboard monitoring");
        session.token.cancel();

        let mut result = Ok(());
        if let Err(e) = session.pipeline.await {
            error!("Key pipeline task panicked: {}", e);
            result = Err(MonitorError::TaskPanicked(e.to_string()));
        }
        for timer in [session.flash_timer, session.idle_timer] {
            if let Err(e) = timer.join().await {
                result = result.and(Err(MonitorError::TaskPanicked(e.to_string())));
            }
        }

        self.sink.close();
        self.status.reset_session();
        info!("Keyboard monitoring stopped");
        result
    }

    /// Returns a fresh outbound stream, displacing any previous consumer
    pub fn new_event_stream(&self) -> mpsc::UnboundedReceiver<MonitorEvent> {
        self.sink.attach()
    }

    /// Asks the transport side to retry the device connection
    pub fn connect(&self) {
        info!("Reconnect requested");
        self.status.begin_reconnect();
        if !self.sink.publish(MonitorEvent::ReconnectRequested) {
            warn!("Reconnect requested but no consumer is attached");
        }
    }

    pub fn status_relay(&self) -> StatusRelay {
        self.status.clone()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<MonitorStatus> {
        self.status.subscribe()
    }
}

impl Default for KeyboardMonitor {
    fn default() -> Self {
        Self::new(MonitorSettings::default())
    }
}

impl Drop for KeyboardMonitor {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            debug!("Monitor dropped while active, cancelling session");
            session.token.cancel();
        }
    }
}
