use farm_shared::{
    codec,
    logger::format_byte_size,
    models::scene::Scene,
    networking::{message::Identify, read_snapshot},
};
use log::info;
use tokio::net::TcpStream;

use crate::error::{WorkerError, WorkerResult};

pub async fn connect_to_server(address: &str) -> WorkerResult<TcpStream> {
    let stream = TcpStream::connect(address)
        .await
        .map_err(|source| WorkerError::Connect {
            address: address.to_string(),
            source,
        })?;
    stream.set_nodelay(true)?;
    Ok(stream)
}

/// Downloads and decodes the scene snapshot over a one-shot connection.
pub async fn download_snapshot(address: &str) -> WorkerResult<Scene> {
    let mut stream = connect_to_server(address).await?;
    info!("Connected to {address}, downloading scene data");
    Identify::Downloader.write(&mut stream).await?;

    let bytes = read_snapshot(&mut stream).await?;
    drop(stream);
    info!("Downloaded {} of scene data", format_byte_size(bytes.len()));

    let scene: Scene = codec::unarchive(&bytes)?;
    scene.validate()?;
    Ok(scene)
}
