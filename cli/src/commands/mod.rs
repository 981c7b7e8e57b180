use clap::Subcommand;

use self::{server::ServerCommand, worker::WorkerCommand};

pub mod server;
pub mod worker;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// 🚀 Start Server
    ///
    /// Split an image into columns and hand them out to workers.
    Server(ServerCommand),

    /// 👷 Worker Mode
    ///
    /// Download the scene from a server and render the columns it assigns.
    Worker(WorkerCommand),
}
