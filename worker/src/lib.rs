pub mod bootstrap;
pub mod error;
pub mod session;
pub mod state;

use std::{sync::Arc, time::Duration};

use farm_shared::{logger::log_error, models::scene::ColumnRenderer, networking::worker::Worker};
use log::{info, warn};
use rand::{rngs::StdRng, SeedableRng};
use tokio::task::JoinSet;

use self::{bootstrap::download_snapshot, error::WorkerResult, session::run_session};

/// Pause between attempts when the server is unreachable or a job ends.
pub const CLIENT_RETRY_WAIT: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct JobSummary {
    pub sessions: usize,
    pub failed: usize,
    pub rendered: usize,
    pub relinquished: u32,
}

/// Serves render jobs until the process is stopped.
pub async fn run_worker(worker: Worker) {
    info!("Starting worker {} with {} sessions", worker.name, worker.threads.max(1));
    loop {
        match run(&worker).await {
            Ok(summary) => info!(
                "Job done: {} columns rendered over {} sessions ({} failed)",
                summary.rendered, summary.sessions, summary.failed
            ),
            Err(e) => log_error("Worker error", &e),
        }
        tokio::time::sleep(CLIENT_RETRY_WAIT).await;
    }
}

/// Downloads the current scene and renders it with `worker.threads`
/// concurrent sessions.
pub async fn run(worker: &Worker) -> WorkerResult<JobSummary> {
    let address = worker.server_address();
    let scene = download_snapshot(&address).await?;
    info!(
        "Rendering a {}x{} scene from {address}",
        scene.width(),
        scene.height()
    );
    Ok(run_sessions(&address, Arc::new(scene), worker.threads.max(1) as usize).await)
}

pub async fn run_sessions<R>(address: &str, renderer: Arc<R>, sessions: usize) -> JobSummary
where
    R: ColumnRenderer + Send + Sync + 'static,
{
    let mut set = JoinSet::new();
    for _ in 0..sessions {
        set.spawn(run_session(
            address.to_string(),
            Arc::clone(&renderer),
            StdRng::from_entropy(),
        ));
    }

    let mut summary = JobSummary {
        sessions,
        ..JobSummary::default()
    };
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok(Ok(report)) => {
                summary.rendered += report.rendered;
                summary.relinquished += report.relinquished;
            }
            Ok(Err(e)) => {
                summary.failed += 1;
                log_error("Worker session failed", &e);
            }
            Err(e) => {
                summary.failed += 1;
                warn!("Worker session task ended abnormally: {e}");
            }
        }
    }
    summary
}
