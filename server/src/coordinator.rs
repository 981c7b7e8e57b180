//! The master's single coordination task.
//!
//! The coordinator owns the [`Scheduler`] and the outbound channel of every
//! live worker. Connection tasks only send it events; all state changes
//! happen here, one event at a time.

use std::{collections::HashMap, sync::Arc};

use farm_shared::{
    codec,
    logger::format_byte_size,
    models::scene::{ColumnRenderer, Scene},
    networking::message::MasterMessage,
};
use log::{debug, info, warn};
use tokio::{
    net::TcpListener,
    sync::{
        mpsc::{self, Receiver, Sender, UnboundedSender},
        watch,
    },
    task::{AbortHandle, JoinSet},
};

use crate::{
    assembly::{FinishedImage, ImageSink},
    error::ServerResult,
    rebalance::{NeverRebalance, RebalancePolicy},
    scheduler::{Grant, Progress, Scheduler, SchedulerError, SessionFault, SessionId},
    session::{handle_connection, SessionEvent},
};

const EVENT_BUFFER: usize = 1024;

pub struct Coordinator {
    listener: TcpListener,
    snapshot: Arc<[u8]>,
    scheduler: Scheduler,
    outbound: HashMap<SessionId, UnboundedSender<MasterMessage>>,
    handles: HashMap<SessionId, AbortHandle>,
    connections: JoinSet<()>,
    events_tx: Sender<SessionEvent>,
    events_rx: Receiver<SessionEvent>,
    progress: watch::Sender<Progress>,
    sink: Box<dyn ImageSink>,
    policy: Box<dyn RebalancePolicy>,
}

impl Coordinator {
    /// Archives the scene once; every downloader gets the same bytes.
    pub fn new(
        listener: TcpListener,
        scene: &Scene,
        sink: Box<dyn ImageSink>,
    ) -> ServerResult<Self> {
        info!("Compressing scene data...");
        let snapshot: Arc<[u8]> = codec::archive(scene)?.into();
        info!("Scene snapshot is {}", format_byte_size(snapshot.len()));

        let scheduler = Scheduler::new(scene.width(), scene.height());
        let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);
        let (progress, _) = watch::channel(scheduler.progress());

        Ok(Self {
            listener,
            snapshot,
            scheduler,
            outbound: HashMap::new(),
            handles: HashMap::new(),
            connections: JoinSet::new(),
            events_tx,
            events_rx,
            progress,
            sink,
            policy: Box::new(NeverRebalance),
        })
    }

    pub fn with_policy(mut self, policy: Box<dyn RebalancePolicy>) -> Self {
        self.policy = policy;
        self
    }

    pub fn subscribe(&self) -> watch::Receiver<Progress> {
        self.progress.subscribe()
    }

    /// Runs until every column is finished, then writes the image and closes
    /// every remaining connection.
    pub async fn run(mut self) -> ServerResult<FinishedImage> {
        info!("Waiting for incoming connections to automatically start");

        // A zero-width job is done before anyone connects.
        while !self.scheduler.is_complete() {
            tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        let id = SessionId::new();
                        debug!("Accepted {peer} as {id}");
                        let handle = self.connections.spawn(handle_connection(
                            id,
                            stream,
                            peer,
                            Arc::clone(&self.snapshot),
                            self.events_tx.clone(),
                        ));
                        self.handles.insert(id, handle);
                    }
                    Err(e) => warn!("Failed to accept connection: {e}"),
                },
                Some(event) = self.events_rx.recv() => {
                    self.handle_event(event)?;
                    self.progress.send_replace(self.scheduler.progress());
                },
                Some(_) = self.connections.join_next(), if !self.connections.is_empty() => {},
            }
        }

        let Coordinator {
            listener,
            scheduler,
            mut connections,
            mut outbound,
            mut sink,
            ..
        } = self;

        drop(listener);
        let image = FinishedImage::new(
            scheduler.width(),
            scheduler.height(),
            scheduler.into_finished(),
        );
        info!("All {} columns finished", image.width);
        sink.write(&image)?;

        info!("Shutting down server...");
        outbound.clear();
        connections.shutdown().await;
        info!("Server shut down");
        Ok(image)
    }

    fn handle_event(&mut self, event: SessionEvent) -> ServerResult<()> {
        match event {
            SessionEvent::Joined { id, outbound } => {
                self.scheduler.open_session(id)?;
                self.outbound.insert(id, outbound);
                info!(
                    "Connected to new worker {id} ({} workers connected)",
                    self.outbound.len()
                );
                self.consult_policy(id);
            }
            SessionEvent::WantMore { id } => {
                if !self.scheduler.has_session(id) {
                    debug!("Ignoring request from closed session {id}");
                    return Ok(());
                }
                match self.scheduler.want_more(id) {
                    Ok(Grant::Column(column)) => {
                        debug!("Granting column {column} to {id}");
                        self.send(id, MasterMessage::AddColumns(vec![column]));
                    }
                    Ok(Grant::Finish) => {
                        debug!("No work left, telling {id} to finish");
                        self.send(id, MasterMessage::Finish);
                    }
                    Err(SchedulerError::Fault(fault)) => self.drop_session(id, &fault),
                    Err(SchedulerError::Violation(violation)) => return Err(violation.into()),
                }
                self.consult_policy(id);
            }
            SessionEvent::Relinquished { id, count } => {
                if !self.scheduler.has_session(id) {
                    return Ok(());
                }
                let returned = self.scheduler.relinquish(id, count)?;
                if !returned.is_empty() {
                    info!("Worker {id} gave back columns {returned:?}");
                }
                self.consult_policy(id);
            }
            SessionEvent::Completed { id, columns } => {
                self.handles.remove(&id);
                if !self.scheduler.has_session(id) {
                    return Ok(());
                }
                let count = columns.len();
                match self.scheduler.complete(id, columns) {
                    Ok(()) => {
                        self.outbound.remove(&id);
                        info!(
                            "Worker {id} finished, incorporated {count} columns ({})",
                            self.scheduler.progress()
                        );
                    }
                    Err(SchedulerError::Fault(fault)) => self.drop_session(id, &fault),
                    Err(SchedulerError::Violation(violation)) => return Err(violation.into()),
                }
            }
            SessionEvent::Served { id, bytes } => {
                self.handles.remove(&id);
                info!("Sent {} of scene data to {id}", format_byte_size(bytes));
            }
            SessionEvent::Failed { id, error } => {
                self.handles.remove(&id);
                self.outbound.remove(&id);
                match self.scheduler.fail(id) {
                    Some(requeued) => warn!(
                        "Error while communicating with worker {id}: {error}. Requeued {requeued:?}"
                    ),
                    None => debug!("Connection {id} closed: {error}"),
                }
            }
        }
        Ok(())
    }

    fn send(&mut self, id: SessionId, message: MasterMessage) {
        let delivered = self
            .outbound
            .get(&id)
            .is_some_and(|outbound| outbound.send(message).is_ok());
        if !delivered {
            // The writer already reported its failure; that event will clean up.
            debug!("Writer for {id} is gone");
        }
    }

    /// Closes a misbehaving worker's connection and requeues its columns.
    fn drop_session(&mut self, id: SessionId, fault: &SessionFault) {
        let requeued = self.scheduler.fail(id).unwrap_or_default();
        warn!("Worker {id} broke protocol: {fault}. Closing connection, requeued {requeued:?}");
        self.outbound.remove(&id);
        if let Some(handle) = self.handles.remove(&id) {
            handle.abort();
        }
    }

    fn consult_policy(&mut self, id: SessionId) {
        let Some(view) = self.scheduler.session(id) else {
            return;
        };
        let unassigned = self.scheduler.progress().unassigned;
        if let Some(count) = self.policy.relinquish_request(&view, unassigned) {
            debug!("Asking {id} to give back {count} columns");
            self.send(id, MasterMessage::RemoveColumns(count));
        }
    }
}
