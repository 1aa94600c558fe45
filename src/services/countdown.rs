use std::time::Duration;

use tokio::{
    task::JoinHandle,
    time::{MissedTickBehavior, interval},
};
use tracing::{debug, info};

use crate::{services::coordinator::CoordinatorHandle, state::session::SessionClock};

/// Periodic ticker that watches a round's clock and reports expiry.
///
/// The driver stops itself right after it reports expiry; dropping it (or
/// calling [`CountdownDriver::stop`]) stops it earlier.
pub struct CountdownDriver {
    task: JoinHandle<()>,
}

impl CountdownDriver {
    /// Start ticking every `period` for the round identified by `generation`.
    pub fn spawn(
        clock: SessionClock,
        period: Duration,
        generation: u64,
        coordinator: CoordinatorHandle,
    ) -> Self {
        let task = tokio::spawn(run(clock, period, generation, coordinator));
        Self { task }
    }

    /// Stop ticking. Harmless when the driver already finished.
    pub fn stop(&self) {
        self.task.abort();
    }
}

impl Drop for CountdownDriver {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run(clock: SessionClock, period: Duration, generation: u64, coordinator: CoordinatorHandle) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        let remaining = clock.remaining();

        if !coordinator.tick(generation, remaining) {
            debug!(generation, "coordinator gone; stopping countdown");
            return;
        }

        if remaining.is_zero() {
            info!(generation, "countdown reached zero; requesting session end");
            coordinator.countdown_expired(generation);
            return;
        }
    }
}
