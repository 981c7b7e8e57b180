use std::io;

use farm_shared::{codec::CodecError, models::scene::SceneError, networking::error::NetworkingError};
use thiserror::Error;

use crate::state::ProtocolError;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("could not connect to {address}: {source}")]
    Connect { address: String, source: io::Error },

    #[error(transparent)]
    Networking(#[from] NetworkingError),

    #[error("could not decode scene snapshot: {0}")]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Scene(#[from] SceneError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("render task failed: {0}")]
    Render(#[from] tokio::task::JoinError),
}

impl From<io::Error> for WorkerError {
    fn from(err: io::Error) -> Self {
        Self::Networking(err.into())
    }
}

pub type WorkerResult<T> = Result<T, WorkerError>;
