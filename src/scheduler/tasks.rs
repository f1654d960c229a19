use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::Mutex;
use tracing::debug;

use crate::events::{FollowEvent, FollowPoller, FollowSource};
use crate::scheduler::Scheduler;

/// Register the follow poll on `schedule`.
pub async fn register_follow_task<S>(
    scheduler: &Scheduler,
    schedule: &str,
    poller: FollowPoller<S>,
    events: UnboundedSender<FollowEvent>,
) -> anyhow::Result<()>
where
    S: FollowSource + 'static,
{
    let poller = Arc::new(Mutex::new(poller));
    scheduler
        .add_exclusive_job(schedule, "follows", move || {
            let poller = Arc::clone(&poller);
            let events = events.clone();
            Box::pin(async move {
                run_follow_poll(&poller, &events).await;
            })
        })
        .await
}

/// Poll once unless another poll holds the poller. Returns whether it ran.
async fn run_follow_poll<S: FollowSource>(
    poller: &Mutex<FollowPoller<S>>,
    events: &UnboundedSender<FollowEvent>,
) -> bool {
    let Ok(mut poller) = poller.try_lock() else {
        debug!("Follow poll already in progress, skipping this run");
        return false;
    };
    poller.tick(events).await;
    true
}
