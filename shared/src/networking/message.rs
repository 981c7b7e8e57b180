//! Typed messages on top of the frame layer, one enum per direction.

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

use crate::{
    codec,
    models::column::{ColumnIndex, RenderedColumn},
};

use super::{
    error::NetworkingError, read_frame, read_tag, result::NetworkingResult, write_frame, Direction,
    Frame, Payload, Tag,
};

/// The first byte of every connection to the master.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Identify {
    Downloader,
    Worker,
}

impl Identify {
    pub async fn read<R: AsyncRead + Unpin>(stream: &mut R) -> NetworkingResult<Self> {
        match read_tag(stream).await? {
            Tag::IdentifyDownloader => Ok(Identify::Downloader),
            Tag::IdentifyWorker => Ok(Identify::Worker),
            tag => Err(NetworkingError::UnexpectedTag {
                tag,
                context: "waiting for a connection to identify itself",
            }),
        }
    }

    pub async fn write<W: AsyncWrite + Unpin>(self, stream: &mut W) -> NetworkingResult<()> {
        let tag = match self {
            Identify::Downloader => Tag::IdentifyDownloader,
            Identify::Worker => Tag::IdentifyWorker,
        };
        stream.write_u8(tag as u8).await?;
        Ok(stream.flush().await?)
    }
}

/// Worker to master.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerMessage {
    WantMore,
    /// How many columns the worker dropped from the tail of its queue.
    Relinquished(u32),
    /// Every column this session rendered. Always the last message.
    Results(Vec<RenderedColumn>),
}

impl WorkerMessage {
    pub async fn read<R: AsyncRead + Unpin>(stream: &mut R) -> NetworkingResult<Self> {
        let frame = read_frame(stream, Direction::ToMaster).await?;
        match (frame.tag, frame.payload) {
            (Tag::WantMore, Payload::Empty) => Ok(WorkerMessage::WantMore),
            (Tag::RemoveColumns, Payload::Count(count)) => Ok(WorkerMessage::Relinquished(count)),
            (Tag::Finish, Payload::Blob(data)) => {
                Ok(WorkerMessage::Results(codec::unarchive(&data)?))
            }
            (tag, _) => Err(NetworkingError::UnexpectedTag {
                tag,
                context: "reading from a worker",
            }),
        }
    }

    pub async fn write<W: AsyncWrite + Unpin>(&self, stream: &mut W) -> NetworkingResult<()> {
        let frame = match self {
            WorkerMessage::WantMore => Frame::empty(Tag::WantMore),
            WorkerMessage::Relinquished(count) => {
                Frame::new(Tag::RemoveColumns, Payload::Count(*count))
            }
            WorkerMessage::Results(columns) => {
                Frame::new(Tag::Finish, Payload::Blob(codec::archive(columns)?))
            }
        };
        write_frame(stream, Direction::ToMaster, &frame).await
    }
}

/// Master to worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MasterMessage {
    AddColumns(Vec<ColumnIndex>),
    /// Ask the worker to give back up to this many queued columns.
    RemoveColumns(u32),
    /// No work left; the worker should return its results.
    Finish,
}

impl MasterMessage {
    pub async fn read<R: AsyncRead + Unpin>(stream: &mut R) -> NetworkingResult<Self> {
        let frame = read_frame(stream, Direction::ToWorker).await?;
        match (frame.tag, frame.payload) {
            (Tag::AddColumns, Payload::Blob(data)) => {
                Ok(MasterMessage::AddColumns(codec::unarchive(&data)?))
            }
            (Tag::RemoveColumns, Payload::Count(count)) => Ok(MasterMessage::RemoveColumns(count)),
            (Tag::Finish, Payload::Empty) => Ok(MasterMessage::Finish),
            (tag, _) => Err(NetworkingError::UnexpectedTag {
                tag,
                context: "reading from the master",
            }),
        }
    }

    pub async fn write<W: AsyncWrite + Unpin>(&self, stream: &mut W) -> NetworkingResult<()> {
        let frame = match self {
            MasterMessage::AddColumns(columns) => {
                Frame::new(Tag::AddColumns, Payload::Blob(codec::archive(columns)?))
            }
            MasterMessage::RemoveColumns(count) => {
                Frame::new(Tag::RemoveColumns, Payload::Count(*count))
            }
            MasterMessage::Finish => Frame::empty(Tag::Finish),
        };
        write_frame(stream, Direction::ToWorker, &frame).await
    }
}
