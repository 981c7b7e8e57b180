pub mod assembly;
pub mod coordinator;
pub mod error;
pub mod rebalance;
pub mod scheduler;
pub mod session;

use std::path::PathBuf;

use farm_shared::{
    logger::log_error,
    models::scene::{ColumnRenderer, Scene},
    networking::server::Server,
};
use log::{debug, error, info, warn};
use tokio::net::TcpListener;

use self::{
    assembly::PngSink,
    coordinator::Coordinator,
    error::{ServerError, ServerResult},
};

/// Runs one render job to completion and writes the image to `output`.
pub async fn run_server(server: &Server, scene: Scene, output: PathBuf) {
    match run(server, scene, output).await {
        Ok(()) => info!("Server shutdown gracefully"),
        Err(e) => log_error("Server error", &e),
    }
}

async fn run(server: &Server, scene: Scene, output: PathBuf) -> ServerResult<()> {
    let listener = start_server(&server.socket_address()).await?;
    info!(
        "Server listening on {} for a {}x{} image",
        server.socket_address(),
        scene.width(),
        scene.height()
    );

    let coordinator = Coordinator::new(listener, &scene, Box::new(PngSink::new(output)))?;
    let mut progress = coordinator.subscribe();
    let job = tokio::spawn(coordinator.run());
    let abort = job.abort_handle();

    tokio::spawn(async move {
        while progress.changed().await.is_ok() {
            debug!("{}", *progress.borrow_and_update());
        }
    });

    tokio::select! {
        finished = job => match finished {
            Ok(result) => result.map(|_| ()),
            Err(e) => {
                error!("Coordinator task ended abnormally: {e}");
                Ok(())
            }
        },
        Ok(()) = tokio::signal::ctrl_c() => {
            // Dropping the coordinator closes every connection; no image is written.
            warn!("Interrupted, shutting down without writing an image");
            abort.abort();
            Ok(())
        }
    }
}

async fn start_server(address: &str) -> ServerResult<TcpListener> {
    TcpListener::bind(address)
        .await
        .map_err(|source| ServerError::Bind {
            address: address.to_string(),
            source,
        })
}
