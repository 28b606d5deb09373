//! Heartbeat Scheduler
//!
//! N independent recurring timers, each able to trigger a heartbeat on its
//! own. Timer `i` first fires at `initial_delay + i * stagger` and then every
//! `period`. If the process is suspended and some timers are lost, the rest
//! keep the link fresh.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, trace};

/// Stand-in start for a first fire too far away to represent.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Timer layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeartbeatPlan {
    pub timers: usize,
    pub initial_delay: Duration,
    pub stagger: Duration,
    pub period: Duration,
}

impl Default for HeartbeatPlan {
    fn default() -> Self {
        Self {
            timers: 4,
            initial_delay: Duration::from_secs(1),
            stagger: Duration::from_secs(15),
            period: Duration::from_secs(60),
        }
    }
}

impl HeartbeatPlan {
    /// Delay before timer `index` first fires. Saturates instead of overflowing.
    pub fn first_fire(&self, index: usize) -> Duration {
        u32::try_from(index)
            .ok()
            .and_then(|index| self.stagger.checked_mul(index))
            .and_then(|offset| self.initial_delay.checked_add(offset))
            .unwrap_or(Duration::MAX)
    }
}

/// Something a timer tick drives.
#[async_trait]
pub trait Beat: Send + Sync + 'static {
    async fn beat(&self, timer: usize);
}

/// Running timers. Dropping the handle stops them.
#[derive(Debug)]
pub struct Heartbeat {
    tasks: Vec<JoinHandle<()>>,
}

impl Heartbeat {
    /// Spawn every timer of `plan` on the current runtime.
    pub fn spawn<B: Beat>(plan: &HeartbeatPlan, target: Arc<B>) -> Self {
        let period = plan.period.max(Duration::from_millis(1));
        let now = Instant::now();

        let tasks = (0..plan.timers)
            .map(|index| {
                let target = Arc::clone(&target);
                let start = now
                    .checked_add(plan.first_fire(index))
                    .unwrap_or_else(|| now + FAR_FUTURE);
                tokio::spawn(async move {
                    let mut interval = tokio::time::interval_at(start, period);
                    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
                    loop {
                        interval.tick().await;
                        trace!("Heartbeat timer {} fired", index);
                        target.beat(index).await;
                    }
                })
            })
            .collect();

        debug!(
            "Heartbeat: {} timers, first after {:?}, every {:?}",
            plan.timers, plan.initial_delay, period
        );
        Self { tasks }
    }

    pub fn timers(&self) -> usize {
        self.tasks.len()
    }

    /// Abort every timer.
    pub fn stop(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

impl Drop for Heartbeat {
    fn drop(&mut self) {
        self.stop();
    }
}
