//! Periodic tick background task

use std::{sync::Arc, time::Duration};
use tokio::{
    sync::watch,
    time::{interval, MissedTickBehavior},
};
use tracing::{debug, error, info};

use crate::engine::Engine;

/// Drive `Engine::tick` at a fixed period until `shutdown` flips to true
///
/// Stopping the task never touches timer state: open history blocks stay
/// open and a restarted engine picks them up from `lastStartedAt`.
pub async fn tick_task(engine: Arc<Engine>, period: Duration, mut shutdown: watch::Receiver<bool>) {
    info!("Starting tick task ({}ms period)", period.as_millis());

    let mut interval = interval(period);
    // Elapsed time comes from timestamps, so a late tick only needs to run once
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                match engine.tick() {
                    Ok(report) if report.completed > 0 || report.skipped > 0 => {
                        info!("Tick completed {} timers, skipped {}", report.completed, report.skipped);
                    }
                    Ok(report) => {
                        debug!("Tick advanced {} timers", report.advanced);
                    }
                    Err(e) => {
                        error!("Tick failed: {}", e);
                    }
                }
            }

            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    info!("Stopping tick task");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        engine::NullSink,
        state::TimerStatus,
        utils::{Clock, ManualClock},
    };
    use chrono::{TimeZone, Utc};

    #[tokio::test]
    async fn completes_expired_timers_and_stops_on_shutdown() {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 3, 10, 9, 0, 0).unwrap(),
        ));
        let engine = Arc::new(Engine::in_memory(
            Arc::clone(&clock) as Arc<dyn Clock>,
            Arc::new(NullSink),
        ));
        let timer = engine.create("A15", 1_000).unwrap();
        engine.start(timer.id()).unwrap();

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(tick_task(
            Arc::clone(&engine),
            Duration::from_millis(5),
            shutdown_rx,
        ));

        clock.advance_ms(1_500);
        let mut status = TimerStatus::Running;
        for _ in 0..200 {
            status = engine.get(timer.id()).unwrap().status();
            if status == TimerStatus::Completed {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(status, TimerStatus::Completed);

        shutdown_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("tick task did not stop")
            .unwrap();
    }
}
