//! In-process scheduler: runs publication on a fixed interval so no external
//! caller is needed to hit the trigger endpoint.

use std::time::Duration;

use chrono::Utc;

use crate::publication::Publication;

pub async fn start_background_scheduler(publication: Publication, every: Duration) {
    let mut interval = tokio::time::interval(every);
    // A slow run must not be followed by a burst of catch-up ticks
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    tracing::info!(interval_secs = every.as_secs(), "Background scheduler started");

    loop {
        interval.tick().await;

        match publication.run_due(Utc::now()).await {
            Ok(summary) if summary.processed > 0 => {
                tracing::info!(
                    processed = summary.processed,
                    "[scheduler] Publication run finished"
                );
            }
            Ok(_) => {}
            Err(e) => {
                tracing::error!(error = %e, "[scheduler] Error selecting due threads");
            }
        }
    }
}
