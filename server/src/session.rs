//! Per-connection tasks on the master.
//!
//! A connection task reads the identification byte, then either serves the
//! snapshot or forwards a worker's messages to the coordinator as
//! [`SessionEvent`]s. It never touches scheduler state itself. Every
//! connection task ends by sending exactly one terminal event.

use std::{net::SocketAddr, sync::Arc};

use farm_shared::{
    logger::format_byte_size,
    models::column::RenderedColumn,
    networking::{
        error::NetworkingError,
        expect_end_of_stream,
        message::{Identify, MasterMessage, WorkerMessage},
        write_snapshot,
    },
};
use log::{debug, info};
use tokio::{
    io::AsyncWriteExt,
    net::{tcp::OwnedWriteHalf, TcpStream},
    sync::mpsc::{self, Sender, UnboundedReceiver, UnboundedSender},
};

use crate::scheduler::SessionId;

#[derive(Debug)]
pub enum SessionEvent {
    /// A connection identified itself as a worker.
    Joined {
        id: SessionId,
        outbound: UnboundedSender<MasterMessage>,
    },
    WantMore {
        id: SessionId,
    },
    Relinquished {
        id: SessionId,
        count: u32,
    },
    /// The worker sent its results and then closed its side cleanly.
    Completed {
        id: SessionId,
        columns: Vec<RenderedColumn>,
    },
    /// A downloader got the snapshot and the connection is done.
    Served {
        id: SessionId,
        bytes: usize,
    },
    /// Transport or protocol failure. For a worker, its columns must be requeued.
    Failed {
        id: SessionId,
        error: NetworkingError,
    },
}

/// How a worker connection ended.
#[derive(Debug)]
pub enum SessionEnd {
    Completed(Vec<RenderedColumn>),
    Failed(NetworkingError),
}

pub async fn handle_connection(
    id: SessionId,
    mut stream: TcpStream,
    peer: SocketAddr,
    snapshot: Arc<[u8]>,
    events: Sender<SessionEvent>,
) {
    let terminal = match Identify::read(&mut stream).await {
        Ok(Identify::Downloader) => {
            info!(
                "Connected to new client {peer}, sending scene data ({})",
                format_byte_size(snapshot.len())
            );
            match serve_snapshot(&mut stream, &snapshot).await {
                Ok(()) => SessionEvent::Served {
                    id,
                    bytes: snapshot.len(),
                },
                Err(error) => SessionEvent::Failed { id, error },
            }
        }
        Ok(Identify::Worker) => match run_worker_session(id, stream, &events).await {
            Some(SessionEnd::Completed(columns)) => SessionEvent::Completed { id, columns },
            Some(SessionEnd::Failed(error)) => SessionEvent::Failed { id, error },
            // The coordinator is gone; nobody is left to tell.
            None => return,
        },
        Err(error) => {
            debug!("Refusing connection from {peer}: {error}");
            SessionEvent::Failed { id, error }
        }
    };
    let _ = events.send(terminal).await;
}

async fn serve_snapshot(stream: &mut TcpStream, snapshot: &[u8]) -> Result<(), NetworkingError> {
    write_snapshot(stream, snapshot).await?;
    stream.shutdown().await?;
    Ok(())
}

/// Reads frames until the worker finishes or fails. Returns `None` only if
/// the coordinator stopped listening.
async fn run_worker_session(
    id: SessionId,
    stream: TcpStream,
    events: &Sender<SessionEvent>,
) -> Option<SessionEnd> {
    let (mut reader, writer) = stream.into_split();
    let (outbound, commands) = mpsc::unbounded_channel();
    tokio::spawn(write_loop(id, writer, commands, events.clone()));

    events.send(SessionEvent::Joined { id, outbound }).await.ok()?;

    loop {
        let event = match WorkerMessage::read(&mut reader).await {
            Ok(WorkerMessage::WantMore) => SessionEvent::WantMore { id },
            Ok(WorkerMessage::Relinquished(count)) => SessionEvent::Relinquished { id, count },
            Ok(WorkerMessage::Results(columns)) => {
                debug!("Session {id} sent {} columns, waiting for it to disconnect", columns.len());
                return Some(match expect_end_of_stream(&mut reader).await {
                    Ok(()) => SessionEnd::Completed(columns),
                    Err(error) => SessionEnd::Failed(error),
                });
            }
            Err(error) => return Some(SessionEnd::Failed(error)),
        };
        events.send(event).await.ok()?;
    }
}

/// Drains the coordinator's commands onto the socket. Dropping the sender
/// closes the write side.
async fn write_loop(
    id: SessionId,
    mut writer: OwnedWriteHalf,
    mut commands: UnboundedReceiver<MasterMessage>,
    events: Sender<SessionEvent>,
) {
    while let Some(message) = commands.recv().await {
        if let Err(error) = message.write(&mut writer).await {
            let _ = events.send(SessionEvent::Failed { id, error }).await;
            return;
        }
    }
    let _ = writer.shutdown().await;
}
