//! Periodic commit schedule.
//!
//! A cancellable task that checkpoints a running surface at a fixed
//! interval. It stops when cancelled, when the surface is dropped, or when
//! the surface is no longer running.

use std::sync::Weak;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use rte_kernel::surface::RteSurface;

pub fn spawn_commit_schedule(
    runtime: &Handle,
    surface: Weak<Mutex<RteSurface>>,
    every: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    runtime.spawn(async move {
        let mut ticker = interval_at(Instant::now() + every, every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("commit schedule cancelled");
                    break;
                }
                _ = ticker.tick() => {
                    let Some(surface) = surface.upgrade() else {
                        break;
                    };
                    if !surface.lock().checkpoint() {
                        debug!("surface no longer running; schedule stops");
                        break;
                    }
                }
            }
        }
    })
}
