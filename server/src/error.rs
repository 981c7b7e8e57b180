use std::io;

use thiserror::Error;

use crate::{assembly::AssemblyError, scheduler::AccountingViolation};

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("could not listen on {address}: {source}")]
    Bind { address: String, source: io::Error },

    #[error("could not build the scene snapshot: {0}")]
    Snapshot(#[from] farm_shared::codec::CodecError),

    #[error("accounting violation, halting the job: {0}")]
    Accounting(#[from] AccountingViolation),

    #[error(transparent)]
    Assembly(#[from] AssemblyError),
}

pub type ServerResult<T> = Result<T, ServerError>;
