//! The envelope shared by master and workers.
//!
//! A frame is one tag byte, optionally followed by a payload. Blob payloads
//! are a 4-byte length and that many bytes of `codec::archive` output; count
//! payloads are a bare 4-byte integer. Integers are big-endian.

pub mod error;
pub mod message;
pub mod result;
pub mod server;
pub mod worker;

use log::trace;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use self::error::NetworkingError;
use self::result::NetworkingResult;

pub const DEFAULT_PORT: u16 = 3678;

/// Upper bound on any length-prefixed payload, checked before allocating.
pub const MAX_PAYLOAD_LEN: u32 = 256 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Tag {
    IdentifyDownloader = 0,
    IdentifyWorker = 1,
    WantMore = 2,
    AddColumns = 3,
    RemoveColumns = 4,
    Finish = 5,
}

impl TryFrom<u8> for Tag {
    type Error = NetworkingError;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        Ok(match byte {
            0 => Tag::IdentifyDownloader,
            1 => Tag::IdentifyWorker,
            2 => Tag::WantMore,
            3 => Tag::AddColumns,
            4 => Tag::RemoveColumns,
            5 => Tag::Finish,
            other => return Err(NetworkingError::UnknownTag(other)),
        })
    }
}

/// Which way a frame travels. FINISH means different things each way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    ToMaster,
    ToWorker,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    Empty,
    Count,
    Blob,
}

impl Tag {
    pub fn payload_kind(self, direction: Direction) -> PayloadKind {
        match (self, direction) {
            (Tag::IdentifyDownloader | Tag::IdentifyWorker | Tag::WantMore, _) => {
                PayloadKind::Empty
            }
            (Tag::AddColumns, _) => PayloadKind::Blob,
            (Tag::RemoveColumns, _) => PayloadKind::Count,
            (Tag::Finish, Direction::ToWorker) => PayloadKind::Empty,
            (Tag::Finish, Direction::ToMaster) => PayloadKind::Blob,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Empty,
    Count(u32),
    Blob(Vec<u8>),
}

impl Payload {
    fn kind(&self) -> PayloadKind {
        match self {
            Payload::Empty => PayloadKind::Empty,
            Payload::Count(_) => PayloadKind::Count,
            Payload::Blob(_) => PayloadKind::Blob,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub tag: Tag,
    pub payload: Payload,
}

impl Frame {
    pub fn new(tag: Tag, payload: Payload) -> Self {
        Self { tag, payload }
    }

    pub fn empty(tag: Tag) -> Self {
        Self::new(tag, Payload::Empty)
    }
}

/// Writes one frame and flushes. The payload must be the kind `direction`
/// allows for the tag; a mismatch is rejected before anything is written.
pub async fn write_frame<W>(
    stream: &mut W,
    direction: Direction,
    frame: &Frame,
) -> NetworkingResult<()>
where
    W: AsyncWrite + Unpin,
{
    if frame.tag.payload_kind(direction) != frame.payload.kind() {
        return Err(NetworkingError::UnexpectedTag {
            tag: frame.tag,
            context: "encoding a frame with the wrong payload kind",
        });
    }

    let mut buffer = vec![frame.tag as u8];
    match &frame.payload {
        Payload::Empty => {}
        Payload::Count(count) => buffer.extend_from_slice(&count.to_be_bytes()),
        Payload::Blob(data) => {
            let length = u32::try_from(data.len())
                .ok()
                .filter(|length| *length <= MAX_PAYLOAD_LEN)
                .ok_or(NetworkingError::PayloadTooLarge(u32::MAX))?;
            buffer.extend_from_slice(&length.to_be_bytes());
            buffer.extend_from_slice(data);
        }
    }

    trace!("-> {:?} ({} bytes)", frame.tag, buffer.len());
    stream.write_all(&buffer).await?;
    Ok(stream.flush().await?)
}

/// Reads one complete frame travelling in `direction`.
pub async fn read_frame<R>(stream: &mut R, direction: Direction) -> NetworkingResult<Frame>
where
    R: AsyncRead + Unpin,
{
    let tag = read_tag(stream).await?;
    let payload = match tag.payload_kind(direction) {
        PayloadKind::Empty => Payload::Empty,
        PayloadKind::Count => Payload::Count(stream.read_u32().await?),
        PayloadKind::Blob => Payload::Blob(read_length_prefixed(stream).await?),
    };
    trace!("<- {:?}", tag);
    Ok(Frame { tag, payload })
}

pub async fn read_tag<R>(stream: &mut R) -> NetworkingResult<Tag>
where
    R: AsyncRead + Unpin,
{
    Tag::try_from(stream.read_u8().await?)
}

/// Reads a 4-byte length followed by that many bytes.
pub async fn read_length_prefixed<R>(stream: &mut R) -> NetworkingResult<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let length = stream.read_u32().await?;
    if length > MAX_PAYLOAD_LEN {
        return Err(NetworkingError::PayloadTooLarge(length));
    }
    let mut data = vec![0u8; length as usize];
    stream.read_exact(&mut data).await?;
    Ok(data)
}

/// Sends the scene snapshot to a downloader: a 4-byte length, then the bytes.
/// Downloads carry no tag.
pub async fn write_snapshot<W>(stream: &mut W, snapshot: &[u8]) -> NetworkingResult<()>
where
    W: AsyncWrite + Unpin,
{
    let length = u32::try_from(snapshot.len())
        .ok()
        .filter(|length| *length <= MAX_PAYLOAD_LEN)
        .ok_or(NetworkingError::PayloadTooLarge(u32::MAX))?;
    stream.write_u32(length).await?;
    stream.write_all(snapshot).await?;
    Ok(stream.flush().await?)
}

pub async fn read_snapshot<R>(stream: &mut R) -> NetworkingResult<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    read_length_prefixed(stream).await
}

/// Waits for the peer to close its write side. Any byte that arrives instead
/// is a protocol violation.
pub async fn expect_end_of_stream<R>(stream: &mut R) -> NetworkingResult<()>
where
    R: AsyncRead + Unpin,
{
    let mut byte = [0u8; 1];
    match stream.read(&mut byte).await? {
        0 => Ok(()),
        _ => Err(NetworkingError::UnexpectedTag {
            tag: Tag::try_from(byte[0])?,
            context: "waiting for the connection to close",
        }),
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::duplex;

    use super::*;

    #[tokio::test]
    async fn zero_payload_tags_are_a_single_byte() {
        let (mut client, mut server) = duplex(64);
        write_frame(&mut client, Direction::ToMaster, &Frame::empty(Tag::WantMore))
            .await
            .unwrap();
        write_frame(&mut client, Direction::ToWorker, &Frame::empty(Tag::Finish))
            .await
            .unwrap();
        drop(client);

        let mut raw = Vec::new();
        server.read_to_end(&mut raw).await.unwrap();
        assert_eq!(raw, vec![Tag::WantMore as u8, Tag::Finish as u8]);
    }

    #[tokio::test]
    async fn finish_shape_depends_on_direction() {
        let (mut client, mut server) = duplex(64);
        let results = Frame::new(Tag::Finish, Payload::Blob(vec![9, 8, 7]));
        write_frame(&mut client, Direction::ToMaster, &results).await.unwrap();
        assert_eq!(read_frame(&mut server, Direction::ToMaster).await.unwrap(), results);

        let err = write_frame(&mut client, Direction::ToWorker, &results).await.unwrap_err();
        assert!(matches!(err, NetworkingError::UnexpectedTag { tag: Tag::Finish, .. }));
    }

    #[tokio::test]
    async fn counts_are_big_endian_without_length() {
        let (mut client, mut server) = duplex(64);
        let frame = Frame::new(Tag::RemoveColumns, Payload::Count(258));
        write_frame(&mut client, Direction::ToWorker, &frame).await.unwrap();
        drop(client);

        let mut raw = Vec::new();
        server.read_to_end(&mut raw).await.unwrap();
        assert_eq!(raw, vec![4, 0, 0, 1, 2]);
    }

    #[tokio::test]
    async fn unknown_tag_is_rejected() {
        let (mut client, mut server) = duplex(64);
        client.write_u8(42).await.unwrap();
        let err = read_frame(&mut server, Direction::ToMaster).await.unwrap_err();
        assert!(matches!(err, NetworkingError::UnknownTag(42)));
        assert!(!err.is_transport());
    }

    #[tokio::test]
    async fn truncated_frame_is_a_closed_connection() {
        let (mut client, mut server) = duplex(64);
        client.write_u8(Tag::AddColumns as u8).await.unwrap();
        client.write_u32(100).await.unwrap();
        client.write_all(&[1, 2, 3]).await.unwrap();
        drop(client);

        let err = read_frame(&mut server, Direction::ToWorker).await.unwrap_err();
        assert!(matches!(err, NetworkingError::ConnectionClosed));
        assert!(err.is_transport());
    }

    #[tokio::test]
    async fn oversized_length_fails_before_reading_body() {
        let (mut client, mut server) = duplex(64);
        client.write_u8(Tag::AddColumns as u8).await.unwrap();
        client.write_u32(MAX_PAYLOAD_LEN + 1).await.unwrap();
        let err = read_frame(&mut server, Direction::ToWorker).await.unwrap_err();
        assert!(matches!(err, NetworkingError::PayloadTooLarge(_)));
    }

    #[tokio::test]
    async fn snapshot_download_has_no_tag() {
        let (mut client, mut server) = duplex(64);
        write_snapshot(&mut server, b"scene").await.unwrap();
        drop(server);

        let mut raw = Vec::new();
        client.read_to_end(&mut raw).await.unwrap();
        assert_eq!(raw, vec![0, 0, 0, 5, b's', b'c', b'e', b'n', b'e']);
    }

    #[tokio::test]
    async fn end_of_stream_is_clean_only_when_nothing_follows() {
        let (client, mut server) = duplex(64);
        drop(client);
        expect_end_of_stream(&mut server).await.unwrap();

        let (mut client, mut server) = duplex(64);
        client.write_u8(Tag::WantMore as u8).await.unwrap();
        assert!(expect_end_of_stream(&mut server).await.is_err());
    }
}
