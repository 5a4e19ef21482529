use crate::traits::Exchange;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Running housekeeping loop for one driver.
#[derive(Debug)]
pub struct DriverHandle {
    name: String,
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl DriverHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Signal the loop to stop and wait for the current pass to finish.
    pub async fn stop(self) {
        let _ = self.stop.send(true);
        if let Err(e) = self.task.await {
            warn!(exchange = %self.name, error = %e, "Housekeeping task ended abnormally");
        }
    }
}

/// Spawn the driver's housekeeping loop on its own task.
///
/// `run` executes immediately and then every `interval`. A zero interval runs
/// a single pass. Failed passes are logged and the loop carries on. When the
/// driver has websocket streaming enabled, the loop also connects it with the
/// driver's subscriptions and hands every frame to the driver until stopped.
pub fn start(driver: Arc<dyn Exchange>, interval: Duration) -> DriverHandle {
    let name = driver.name().to_string();
    let (stop, mut stopped) = watch::channel(false);

    let task_name = name.clone();
    let task = tokio::spawn(async move {
        info!(exchange = %task_name, ?interval, "Housekeeping started");

        if interval.is_zero() {
            run_once(driver.as_ref(), &task_name).await;
            return;
        }

        let mut frames = connect_websocket(driver.as_ref(), &task_name).await;
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                changed = stopped.changed() => {
                    if changed.is_err() || *stopped.borrow() {
                        break;
                    }
                }
                _ = ticker.tick() => run_once(driver.as_ref(), &task_name).await,
                frame = next_frame(&mut frames), if frames.is_some() => match frame {
                    Some(frame) => driver.on_websocket_frame(&frame),
                    None => {
                        warn!(exchange = %task_name, "Websocket stream ended");
                        frames = None;
                    }
                },
            }
        }

        if let Ok(websocket) = driver.websocket() {
            websocket.disconnect();
        }
        info!(exchange = %task_name, "Housekeeping stopped");
    });

    DriverHandle { name, stop, task }
}

async fn connect_websocket(driver: &dyn Exchange, name: &str) -> Option<mpsc::Receiver<String>> {
    if !driver.base().features.websocket {
        return None;
    }
    let websocket = driver.websocket().ok()?;
    match websocket.connect(driver.subscriptions()).await {
        Ok(frames) => Some(frames),
        Err(e) => {
            warn!(exchange = %name, error = %e, "Websocket connect failed; continuing with REST");
            None
        }
    }
}

async fn next_frame(frames: &mut Option<mpsc::Receiver<String>>) -> Option<String> {
    match frames {
        Some(frames) => frames.recv().await,
        None => std::future::pending().await,
    }
}

async fn run_once(driver: &dyn Exchange, name: &str) {
    match driver.run().await {
        Ok(()) => debug!(exchange = %name, "Housekeeping pass complete"),
        Err(e) if e.is_permanent() => debug!(exchange = %name, error = %e, "Housekeeping skipped"),
        Err(e) => warn!(exchange = %name, error = %e, "Housekeeping pass failed"),
    }
}
