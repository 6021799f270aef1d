use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::state::AppState;

/// Spawn the process-wide game clock: one 1 Hz tick that ages every battle
/// session, fans out the periodic broadcasts, and sweeps sessions whose
/// cleanup deadline has passed.
pub fn spawn_game_clock(state: AppState) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(1));
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            let mut registry = state.registry.write().await;
            registry.tick_all(Instant::now());
        }
    })
}
