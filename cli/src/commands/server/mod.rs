use std::path::PathBuf;

use clap::Parser;

/// 🖥️ Server Command
///
/// This command is used to configure and 🚀 start a render job.
#[derive(Parser, Debug)]
#[command(
    name = "server",
    about = "🚀 Start a render job and wait for workers.",
    long_about = None
)]
pub struct ServerCommand {
    /// 📌 Server IP address
    ///
    /// If not set, the server will listen on all available interfaces.
    #[arg(short, long, value_name = "ADDRESS", env = "FARM_SERVER_ADDRESS")]
    pub address: Option<String>,

    /// 🚪 Server port
    #[arg(short, long, value_name = "PORT", env = "FARM_SERVER_PORT")]
    pub port: Option<u16>,

    /// 🗺️ Scene description in JSON. The built-in Julia scene is used otherwise.
    #[arg(short, long, value_name = "FILE")]
    pub scene: Option<PathBuf>,

    /// 📏 Image width, overriding the scene.
    #[arg(long, value_name = "WIDTH")]
    pub width: Option<u32>,

    /// 📐 Image height, overriding the scene.
    #[arg(long, value_name = "HEIGHT")]
    pub height: Option<u32>,

    /// 🖼️ Where to write the finished PNG.
    #[arg(short, long, value_name = "FILE", default_value = "render.png")]
    pub output: PathBuf,
}
