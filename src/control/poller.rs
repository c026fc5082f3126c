use super::surface::ControlSurface;
use parking_lot::Mutex;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

struct PollTask {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

/// Periodic status refresh owned by a view's lifecycle.
///
/// `mount` starts at most one polling task; `unmount` cancels it.
pub struct StatusPoller {
    surface: ControlSurface,
    period: Duration,
    task: Mutex<Option<PollTask>>,
}

impl StatusPoller {
    pub fn new(surface: ControlSurface, period: Duration) -> Self {
        Self {
            surface,
            period,
            task: Mutex::new(None),
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Start polling. Returns false when a poll task is already running.
    pub fn mount(&self) -> bool {
        let mut task = self.task.lock();

        if let Some(existing) = task.as_ref() {
            if !existing.handle.is_finished() {
                debug!("Status poller already mounted");
                return false;
            }
        }

        let token = CancellationToken::new();
        let child = token.clone();
        let surface = self.surface.clone();
        let period = self.period;

        let handle = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = child.cancelled() => break,
                    _ = ticker.tick() => {
                        tokio::select! {
                            _ = child.cancelled() => break,
                            _ = surface.refresh_status() => {}
                        }
                    }
                }
            }

            debug!("Status poller stopped");
        });

        info!("Status poller mounted with period {:?}", period);
        *task = Some(PollTask { token, handle });
        true
    }

    pub fn is_mounted(&self) -> bool {
        self.task
            .lock()
            .as_ref()
            .map(|task| !task.handle.is_finished())
            .unwrap_or(false)
    }

    /// Stop polling and wait for the task to exit
    pub async fn unmount(&self) {
        let task = self.task.lock().take();

        if let Some(PollTask { token, handle }) = task {
            token.cancel();
            let _ = handle.await;
            info!("Status poller unmounted");
        }
    }
}

impl Drop for StatusPoller {
    fn drop(&mut self) {
        if let Some(task) = self.task.get_mut().take() {
            task.token.cancel();
        }
    }
}
