//! Per-session key pipeline with statum state machine
//!
//! One pipeline lives for one monitoring session and owns the session's
//! tempo tracker and pattern mapper. Raw key events are handled strictly one
//! at a time, in arrival order.
//!
//! # State Machine
//!
//! ```text
//! Initializing ──► Active ──► Stopping
//!                    │
//!               (cancelled or
//!               input closed)
//! ```
//!
//! # Per-event path
//!
//! ```text
//! RawKeyEvent ──► classify ──► flash ──► TempoTracker ──► PatternMapper ──► EventSink
//!  (press only)   (drop None)            (drop bounce)    (drop None)
//! ```

use statum::{machine, state};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::debounce::DebounceTrigger;
use super::event_sink::{EventSink, MonitorEvent};
use super::status::StatusRelay;
use crate::keyboard::{classify, RawKeyEvent, Region, TempoSample, TempoTracker};
use crate::mapping::{Command, PatternMapper};

#[state]
#[derive(Debug, Clone)]
pub enum PipelineState {
    Initializing, // Tracker and mapper freshly built
    Active,       // Consuming raw key events
    Stopping,     // Input released, session winding down
}

#[machine]
pub struct KeyPipeline<S: PipelineState> {
    raw_receiver: mpsc::UnboundedReceiver<RawKeyEvent>,
    sink: EventSink,
    status: StatusRelay,
    tempo: TempoTracker,
    mapper: PatternMapper,
    flash_trigger: DebounceTrigger,
    idle_trigger: DebounceTrigger,
    processed: u64,
}

impl<S: PipelineState> KeyPipeline<S> {
    pub fn tempo(&self) -> &TempoTracker {
        &self.tempo
    }

    pub fn mapper(&self) -> &PatternMapper {
        &self.mapper
    }

    pub fn processed(&self) -> u64 {
        self.processed
    }
}

impl KeyPipeline<Initializing> {
    pub fn create(
        raw_receiver: mpsc::UnboundedReceiver<RawKeyEvent>,
        sink: EventSink,
        status: StatusRelay,
        tempo: TempoTracker,
        mapper: PatternMapper,
        flash_trigger: DebounceTrigger,
        idle_trigger: DebounceTrigger,
    ) -> Self {
        debug!("Initializing key pipeline");
        Self::new(
            raw_receiver,
            sink,
            status,
            tempo,
            mapper,
            flash_trigger,
            idle_trigger,
            0, // processed
        )
    }

    pub fn activate(self) -> KeyPipeline<Active> {
        info!("Key pipeline active");
        self.transition()
    }
}

impl KeyPipeline<Active> {
    /// Runs one raw event through classify → tempo → mapper
    ///
    /// Returns the published command, if the event produced one.
    pub fn handle_key_event(&mut self, event: RawKeyEvent) -> Option<Command> {
        if !event.pressed {
            trace!("Key {} released", event.key);
            return None;
        }

        let region = classify(event.key);
        if region == Region::None {
            trace!("Ignoring unmapped key {}", event.key);
            return None;
        }

        self.status.flash(region);
        self.flash_trigger.kick();

        let sample = self.tempo.observe(event.timestamp);
        if sample.is_bounce() {
            debug!("Suppressed bounce on key {}", event.key);
            return None;
        }

        if let TempoSample::Interval(_) = sample {
            self.status.update_tempo(self.tempo.snapshot());
        }
        self.idle_trigger.kick();
        self.processed += 1;

        let command = self.mapper.map(region, sample.interval())?;
        debug!(
            "Key {} ({}) → {} every {:?}",
            event.key, region, command.request, command.interval
        );

        self.status.record_command(command);
        if !self.sink.publish(MonitorEvent::DeviceAction(command)) {
            trace!("No consumer attached for {}", command);
        }
        Some(command)
    }

    /// Main processing loop
    ///
    /// Runs until `token` is cancelled or the raw event source closes.
    pub async fn run_until_cancelled(mut self, token: CancellationToken) -> KeyPipeline<Stopping> {
        info!("Starting key processing loop");

        loop {
            tokio::select! {
                biased;

                _ = token.cancelled() => {
                    info!("Stop requested for key pipeline");
                    break;
                }

                event = self.raw_receiver.recv() => match event {
                    Some(event) => {
                        self.handle_key_event(event);
                    }
                    None => {
                        warn!("Raw key event source closed");
                        break;
                    }
                }
            }
        }

        self.transition()
    }
}

impl KeyPipeline<Stopping> {
    pub fn shutdown(mut self) {
        self.raw_receiver.close();
        info!(
            "Key pipeline stopped after {} accepted key-downs",
            self.processed
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyboard::KeyCode;
    use crate::mapping::DeviceRequest;
    use crate::monitor::debounce::Debouncer;
    use std::time::Duration;
    use tokio::time::Instant;

    struct Fixture {
        pipeline: KeyPipeline<Active>,
        sink: EventSink,
        status: StatusRelay,
        _raw_tx: mpsc::UnboundedSender<RawKeyEvent>,
        _timers: (Debouncer, Debouncer),
    }

    fn fixture() -> Fixture {
        let (raw_tx, raw_rx) = mpsc::unbounded_channel();
        let sink = EventSink::new();
        let status = StatusRelay::new();
        let token = CancellationToken::new();
        let flash = Debouncer::spawn("flash", Duration::from_millis(200), token.clone(), || {});
        let idle = Debouncer::spawn("idle", Duration::from_secs(2), token, || {});

        let pipeline = KeyPipeline::create(
            raw_rx,
            sink.clone(),
            status.clone(),
            TempoTracker::default(),
            PatternMapper::default(),
            flash.trigger(),
            idle.trigger(),
        )
        .activate();

        Fixture {
            pipeline,
            sink,
            status,
            _raw_tx: raw_tx,
            _timers: (flash, idle),
        }
    }

    fn at(t0: Instant, ms: u64) -> Instant {
        t0 + Duration::from_millis(ms)
    }

    #[tokio::test]
    async fn press_is_mapped_and_published() {
        let mut f = fixture();
        let mut stream = f.sink.attach();
        let t0 = Instant::now();

        let command = f.pipeline.handle_key_event(RawKeyEvent::pressed(KeyCode::J, t0)).unwrap();
        assert_eq!(command, Command::new(DeviceRequest::Right, Duration::from_millis(500)));
        assert_eq!(stream.recv().await, Some(MonitorEvent::DeviceAction(command)));

        let status = f.status.current();
        assert!(status.right_active);
        assert_eq!(status.last_command, Some(command));
    }

    #[tokio::test]
    async fn release_and_unmapped_keys_do_nothing() {
        let mut f = fixture();
        let t0 = Instant::now();

        assert_eq!(f.pipeline.handle_key_event(RawKeyEvent::released(KeyCode::A, t0)), None);
        assert_eq!(
            f.pipeline.handle_key_event(RawKeyEvent::pressed(KeyCode::PRINT_SCREEN, t0)),
            None
        );
        assert_eq!(f.pipeline.processed(), 0);
        assert_eq!(f.pipeline.mapper().state().consecutive_count, 0);
        assert!(!f.status.current().left_active);
    }

    #[tokio::test]
    async fn bounce_is_dropped_before_the_mapper() {
        let mut f = fixture();
        let t0 = Instant::now();

        f.pipeline.handle_key_event(RawKeyEvent::pressed(KeyCode::J, t0));
        f.pipeline.handle_key_event(RawKeyEvent::pressed(KeyCode::K, at(t0, 100)));
        let state = f.pipeline.mapper().state().clone();
        let tempo = f.pipeline.tempo().snapshot();

        assert_eq!(f.pipeline.handle_key_event(RawKeyEvent::pressed(KeyCode::L, at(t0, 105))), None);
        assert_eq!(f.pipeline.mapper().state(), &state);
        assert_eq!(f.pipeline.tempo().snapshot(), tempo);
        assert_eq!(f.pipeline.processed(), 2);

        let command = f
            .pipeline
            .handle_key_event(RawKeyEvent::pressed(KeyCode::L, at(t0, 200)))
            .unwrap();
        assert_eq!(command.request, DeviceRequest::RightTriple);
        // (100 + 100) / 3
        assert_eq!(command.interval, Duration::from_millis(200) / 3);
    }

    #[tokio::test]
    async fn tempo_is_published_for_display() {
        let mut f = fixture();
        let t0 = Instant::now();

        f.pipeline.handle_key_event(RawKeyEvent::pressed(KeyCode::A, t0));
        f.pipeline.handle_key_event(RawKeyEvent::pressed(KeyCode::S, at(t0, 250)));

        let status = f.status.current();
        assert!((status.typing_interval_ms - 250.0).abs() < 1e-9);
        assert!((status.keys_per_second - 4.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn loop_stops_on_cancellation() {
        let (raw_tx, raw_rx) = mpsc::unbounded_channel();
        let token = CancellationToken::new();
        let flash = Debouncer::spawn("flash", Duration::from_millis(200), token.clone(), || {});
        let idle = Debouncer::spawn("idle", Duration::from_secs(2), token.clone(), || {});
        let sink = EventSink::new();
        let mut stream = sink.attach();

        let pipeline = KeyPipeline::create(
            raw_rx,
            sink,
            StatusRelay::new(),
            TempoTracker::default(),
            PatternMapper::default(),
            flash.trigger(),
            idle.trigger(),
        )
        .activate();
        let run = tokio::spawn(pipeline.run_until_cancelled(token.clone()));

        raw_tx.send(RawKeyEvent::pressed(KeyCode::SPACE, Instant::now())).unwrap();
        let event = stream.recv().await.unwrap();
        assert!(matches!(
            event,
            MonitorEvent::DeviceAction(Command { request: DeviceRequest::Both, .. })
        ));

        token.cancel();
        let stopping = run.await.unwrap();
        assert_eq!(stopping.processed(), 1);
        stopping.shutdown();
        assert!(raw_tx.send(RawKeyEvent::pressed(KeyCode::A, Instant::now())).is_err());
    }
}
