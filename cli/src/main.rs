pub mod commands;

use std::process::ExitCode;

use clap::Parser;
use commands::{server::ServerCommand, worker::WorkerCommand, Commands};
use farm_shared::{
    env, logger,
    models::scene::Scene,
    networking::{
        server::Server,
        worker::{Worker, DEFAULT_THREADS},
        DEFAULT_PORT,
    },
};
use log::info;
use uuid::Uuid;

/// Distributed fractal renderer
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> ExitCode {
    env::init();
    logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Worker(args) => {
            farm_worker::run_worker(worker_config(args)).await;
            ExitCode::SUCCESS
        }
        Commands::Server(args) => {
            let scene = match load_scene(&args) {
                Ok(scene) => scene,
                Err(e) => {
                    logger::log_error("Invalid scene", &e);
                    return ExitCode::FAILURE;
                }
            };
            let server = Server::new(
                args.address.unwrap_or_else(|| "0.0.0.0".to_string()),
                args.port.unwrap_or(DEFAULT_PORT),
            );
            farm_server::run_server(&server, scene, args.output).await;
            ExitCode::SUCCESS
        }
    }
}

fn worker_config(args: WorkerCommand) -> Worker {
    let name = args
        .name
        .unwrap_or_else(|| format!("worker-{}", Uuid::new_v4()));
    Worker::new(
        name,
        args.address.unwrap_or_else(|| "localhost".to_string()),
        args.port.unwrap_or(DEFAULT_PORT),
        args.threads.unwrap_or(DEFAULT_THREADS),
    )
}

fn load_scene(args: &ServerCommand) -> Result<Scene, farm_shared::models::scene::SceneError> {
    let mut scene = match &args.scene {
        Some(path) => {
            info!("Loading scene from {}", path.display());
            Scene::load(path)?
        }
        None => Scene::default(),
    };
    if let Some(width) = args.width {
        scene.resolution.nx = width;
    }
    if let Some(height) = args.height {
        scene.resolution.ny = height;
    }
    scene.validate()?;
    Ok(scene)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worker_defaults() {
        let cli = Cli::parse_from(["farm", "worker"]);
        let Commands::Worker(args) = cli.command else {
            panic!("expected the worker subcommand");
        };
        let worker = worker_config(args);
        assert!(worker.name.starts_with("worker-"));
        assert_eq!(worker.threads, DEFAULT_THREADS);
        assert_eq!(worker.server_address(), format!("localhost:{DEFAULT_PORT}"));
    }

    #[test]
    fn size_overrides_apply_to_the_default_scene() {
        let cli = Cli::parse_from(["farm", "server", "--width", "32", "--height", "16"]);
        let Commands::Server(args) = cli.command else {
            panic!("expected the server subcommand");
        };
        let scene = load_scene(&args).unwrap();
        assert_eq!((scene.resolution.nx, scene.resolution.ny), (32, 16));
        assert_eq!(args.output, std::path::PathBuf::from("render.png"));
    }

    #[test]
    fn zero_width_is_rejected() {
        let cli = Cli::parse_from(["farm", "server", "--width", "0"]);
        let Commands::Server(args) = cli.command else {
            panic!("expected the server subcommand");
        };
        assert!(load_scene(&args).is_err());
    }
}
