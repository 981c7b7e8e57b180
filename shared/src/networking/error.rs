use std::io;

use thiserror::Error;

use crate::codec::CodecError;

use super::Tag;

#[derive(Debug, Error)]
pub enum NetworkingError {
    /// The peer closed the stream in the middle of a frame, or before one arrived.
    #[error("connection closed by peer")]
    ConnectionClosed,

    #[error("I/O error: {0}")]
    Io(io::Error),

    #[error("unrecognized tag byte {0}")]
    UnknownTag(u8),

    #[error("unexpected {tag:?} while {context}")]
    UnexpectedTag { tag: Tag, context: &'static str },

    #[error("payload of {0} bytes exceeds the frame limit")]
    PayloadTooLarge(u32),

    #[error("could not decode payload: {0}")]
    Codec(#[from] CodecError),
}

impl NetworkingError {
    /// Transport errors are the stream's fault; everything else is the peer
    /// speaking the protocol wrong.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::ConnectionClosed | Self::Io(_))
    }
}

impl From<io::Error> for NetworkingError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::UnexpectedEof
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe => Self::ConnectionClosed,
            _ => Self::Io(err),
        }
    }
}
