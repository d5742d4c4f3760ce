use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace};

/// Background timer that fires once things have been quiet for `period`
///
/// Every [`DebounceTrigger::kick`] re-arms the timer. The callback runs on the
/// timer's own task, so the key pipeline never waits for it.
pub struct Debouncer {
    name: &'static str,
    trigger: DebounceTrigger,
    task_handle: JoinHandle<()>,
}

/// Cloneable handle that re-arms a [`Debouncer`]
#[derive(Clone, Debug)]
pub struct DebounceTrigger {
    kick_tx: mpsc::UnboundedSender<()>,
}

impl DebounceTrigger {
    pub fn kick(&self) {
        // The timer task only goes away on shutdown
        let _ = self.kick_tx.send(());
    }
}

impl Debouncer {
    pub fn spawn<F>(
        name: &'static str,
        period: Duration,
        token: CancellationToken,
        mut on_quiet: F,
    ) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        debug!("Spawning {} debouncer with {:?} period", name, period);
        let (kick_tx, mut kick_rx) = mpsc::unbounded_channel::<()>();

        let task_handle = tokio::spawn(async move {
            let mut deadline: Option<Instant> = None;
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    kick = kick_rx.recv() => match kick {
                        Some(()) => deadline = Some(Instant::now() + period),
                        None => break,
                    },
                    _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                        trace!("{} debouncer fired", name);
                        deadline = None;
                        on_quiet();
                    }
                }
            }
            debug!("{} debouncer stopped", name);
        });

        Self {
            name,
            trigger: DebounceTrigger { kick_tx },
            task_handle,
        }
    }

    pub fn trigger(&self) -> DebounceTrigger {
        self.trigger.clone()
    }

    /// Waits for the timer task after its token was cancelled
    pub async fn join(self) -> Result<(), tokio::task::JoinError> {
        let name = self.name;
        drop(self.trigger);
        self.task_handle.await.inspect_err(|e| {
            error!("{} debouncer task failed: {}", name, e);
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counting_debouncer(token: CancellationToken) -> (Debouncer, Arc<AtomicUsize>) {
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();
        let debouncer = Debouncer::spawn("test", Duration::from_millis(200), token, move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        (debouncer, fired)
    }

    #[tokio::test(start_paused = true)]
    async fn fires_once_after_quiet_period() {
        let (debouncer, fired) = counting_debouncer(CancellationToken::new());
        let trigger = debouncer.trigger();

        trigger.kick();
        tokio::time::sleep(Duration::from_millis(150)).await;
        trigger.kick();
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_stops_pending_fire() {
        let token = CancellationToken::new();
        let (debouncer, fired) = counting_debouncer(token.clone());

        debouncer.trigger().kick();
        tokio::time::sleep(Duration::from_millis(50)).await;
        token.cancel();
        debouncer.join().await.unwrap();

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }
}
