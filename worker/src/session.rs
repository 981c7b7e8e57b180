//! One worker session: its own connection, its own queue and results.
//!
//! A listener task is the connection's only reader. It decodes frames as they
//! arrive, including while a column is rendering, and queues them for the
//! session loop.

use std::sync::Arc;

use farm_shared::{
    models::scene::ColumnRenderer,
    networking::{
        error::NetworkingError,
        message::{Identify, MasterMessage, WorkerMessage},
        result::NetworkingResult,
    },
};
use log::{debug, info};
use rand::rngs::StdRng;
use tokio::{
    io::AsyncWriteExt,
    net::tcp::{OwnedReadHalf, OwnedWriteHalf},
    sync::mpsc::{self, UnboundedReceiver, UnboundedSender},
    task,
};

use crate::{
    bootstrap::connect_to_server,
    error::WorkerResult,
    state::{Action, SessionState},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionReport {
    pub rendered: usize,
    pub relinquished: u32,
}

pub async fn run_session<R>(
    address: String,
    renderer: Arc<R>,
    rng: StdRng,
) -> WorkerResult<SessionReport>
where
    R: ColumnRenderer + Send + Sync + 'static,
{
    let stream = connect_to_server(&address).await?;
    let (reader, mut writer) = stream.into_split();
    Identify::Worker.write(&mut writer).await?;
    info!("Worker session connected to {address}");

    let (inbound_tx, mut inbound) = mpsc::unbounded_channel();
    let listener = tokio::spawn(listen(reader, inbound_tx));

    let result = drive(&mut writer, &mut inbound, renderer, rng).await;
    if result.is_err() {
        listener.abort();
    }
    let report = result?;

    writer.shutdown().await?;
    // The master closes its side once it has the results.
    while let Some(message) = inbound.recv().await {
        debug!("Ignoring {:?} after finishing", message?);
    }
    info!(
        "Worker session finished: {} columns rendered, {} given back",
        report.rendered, report.relinquished
    );
    Ok(report)
}

async fn drive<R>(
    writer: &mut OwnedWriteHalf,
    inbound: &mut UnboundedReceiver<NetworkingResult<MasterMessage>>,
    renderer: Arc<R>,
    mut rng: StdRng,
) -> WorkerResult<SessionReport>
where
    R: ColumnRenderer + Send + Sync + 'static,
{
    let mut state = SessionState::new();

    loop {
        // Service anything the master pushed while we were busy.
        while let Ok(message) = inbound.try_recv() {
            apply(&mut state, message?, writer).await?;
        }

        match state.next_action() {
            Action::Render(column) => {
                let renderer = Arc::clone(&renderer);
                let (returned, rendered) = task::spawn_blocking(move || {
                    let rendered = renderer.render_column(column, &mut rng);
                    (rng, rendered)
                })
                .await?;
                rng = returned;
                debug!("Rendered column {column}");
                state.record(rendered);
            }
            Action::RequestMore => WorkerMessage::WantMore.write(writer).await?,
            Action::AwaitReply => {
                let message = inbound.recv().await.ok_or(NetworkingError::ConnectionClosed)?;
                apply(&mut state, message?, writer).await?;
            }
            Action::Finish => break,
        }
    }

    let rendered = state.rendered();
    for message in state.finish() {
        if let WorkerMessage::Results(columns) = &message {
            info!("Sending {} finished columns to the server", columns.len());
        }
        message.write(writer).await?;
    }

    Ok(SessionReport {
        rendered,
        relinquished: state.relinquished(),
    })
}

async fn apply(
    state: &mut SessionState,
    message: MasterMessage,
    writer: &mut OwnedWriteHalf,
) -> WorkerResult<()> {
    debug!("Received {message:?}");
    if let Some(reply) = state.on_message(message)? {
        reply.write(writer).await?;
    }
    Ok(())
}

/// Forwards every frame to the session. A clean end of stream just closes
/// the channel.
async fn listen(
    mut reader: OwnedReadHalf,
    inbound: UnboundedSender<NetworkingResult<MasterMessage>>,
) {
    loop {
        match MasterMessage::read(&mut reader).await {
            Ok(message) => {
                if inbound.send(Ok(message)).is_err() {
                    return;
                }
            }
            Err(NetworkingError::ConnectionClosed) => return,
            Err(error) => {
                let _ = inbound.send(Err(error));
                return;
            }
        }
    }
}
