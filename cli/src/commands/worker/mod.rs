use clap::Parser;

/// 👷 Worker Command
///
/// Connect to a render server and work on its columns.
#[derive(Parser, Debug)]
#[command(name = "worker", about = "👷 Render columns for a server.", long_about = None)]
pub struct WorkerCommand {
    /// 🏷️ Worker name, used in logs. Defaults to `worker-<uuid>`.
    #[arg(short, long)]
    pub name: Option<String>,

    /// 📌 Server address. Defaults to localhost.
    #[arg(short, long, env = "FARM_SERVER_ADDRESS")]
    pub address: Option<String>,

    /// 🚪 Server port.
    #[arg(short, long, env = "FARM_SERVER_PORT")]
    pub port: Option<u16>,

    /// 🧵 Number of concurrent sessions, each with its own connection.
    #[arg(short, long)]
    pub threads: Option<u8>,
}
