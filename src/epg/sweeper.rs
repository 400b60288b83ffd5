use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info, trace};

use super::Epg;

impl Epg {
    /// Spawn the periodic expiry sweep. The first pass runs one full period
    /// after start; abort the handle to stop it.
    pub fn start_sweeper(self: &Arc<Self>) -> JoinHandle<()> {
        let epg = Arc::clone(self);
        let period = epg.config().check_for_expired_events_time;
        info!(
            "Starting expiry sweeper: every {}, removing events older than {}",
            humantime::format_duration(period),
            humantime::format_duration(epg.config().expired_events_time)
        );

        tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // Immediate first tick
            ticker.tick().await;

            loop {
                ticker.tick().await;
                trace!("Expiry sweeper tick");
                if let Err(e) = epg.sweep_expired().await {
                    error!("Expiry sweep failed: {}", e);
                }
            }
        })
    }
}
