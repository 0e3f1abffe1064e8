use std::{fs, path::{Path, PathBuf}, sync::Arc, time::Duration};

use clap::{Parser, Subcommand};
use eyre::Result;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

mod config;
mod core;
mod ipc;
mod log;
mod services;

use crate::config::DimmerConfig;
use crate::core::brightness::{Preset, parse_fraction};
use crate::core::{Action, Controller, dispatch};
use crate::services::xrandr::{DisplayBackend, Xrandr};

/// How long a connection still being served may delay the shutdown hook.
const SERVER_DRAIN_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Parser, Debug)]
#[command(
    name = "dimmer",
    version = env!("CARGO_PKG_VERSION"),
    about = "Per-monitor brightness control through xrandr\n\nRun without a command to start the daemon, which restores saved brightness and listens for commands"
)]
struct Args {
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,
    #[arg(short, long, action)]
    verbose: bool,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(about = "List connected monitors")]
    List,

    #[command(about = "Show the brightness of one monitor")]
    Get { monitor: String },

    #[command(about = "Set one monitor's brightness (0.5 or 50%)")]
    Set {
        monitor: String,
        #[arg(value_parser = parse_fraction)]
        value: f64,
    },

    #[command(about = "Set every connected monitor to the same brightness")]
    SetAll {
        #[arg(value_parser = parse_fraction)]
        value: f64,
    },

    #[command(about = "Apply a brightness preset to all monitors (100, 75, 50, 25)")]
    Preset { level: Preset },

    #[command(about = "Re-detect connected monitors")]
    Refresh,

    #[command(about = "Display configuration and current brightness")]
    Info {
        #[arg(long, help = "Output as JSON (for Waybar or scripts)")]
        json: bool,
    },

    #[command(about = "Stop the running daemon, saving its settings")]
    Stop,
}

impl Commands {
    fn action(&self) -> Action {
        match self {
            Commands::List => Action::ListMonitors,
            Commands::Get { monitor } => Action::SelectMonitor(monitor.clone()),
            Commands::Set { monitor, value } => Action::SetMonitor { monitor: monitor.clone(), fraction: *value },
            Commands::SetAll { value } => Action::SetAll(*value),
            Commands::Preset { level } => Action::SetPreset(*level),
            Commands::Refresh => Action::Refresh,
            Commands::Info { json } => Action::Info { json: *json },
            Commands::Stop => Action::Quit,
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();
    log::init_logging(args.verbose)?;

    let socket = ipc::socket_path();

    match &args.command {
        Some(cmd) => run_client(cmd, args.config.as_deref(), &socket).await,
        None => run_daemon(args.config.as_deref(), &socket).await,
    }
}

/// Forward a command to the daemon, or run it in-process when none is up.
async fn run_client(cmd: &Commands, config_path: Option<&Path>, socket: &Path) -> Result<()> {
    let action = cmd.action();

    if let Ok(stream) = UnixStream::connect(socket).await {
        let reply = ipc::send_on(stream, &ipc::command_for(&action)).await?;
        println!("{}", reply);
        if reply.starts_with("error:") {
            std::process::exit(1);
        }
        return Ok(());
    }

    if action == Action::Quit {
        println!("dimmer is not running");
        return Ok(());
    }

    let cfg = config::load_config(config_path)?;
    let mut controller = Controller::new(Xrandr::from_config(&cfg), cfg);
    controller.load_settings();
    controller.refresh().await;

    let outcome = dispatch(&mut controller, action).await;
    println!("{}", outcome.render());
    if outcome.is_failure() {
        std::process::exit(1);
    }
    Ok(())
}

async fn run_daemon(config_path: Option<&Path>, socket: &Path) -> Result<()> {
    // --- Single instance enforcement ---
    if UnixStream::connect(socket).await.is_ok() {
        println!("Another instance of dimmer is already running.");
        error!("Another instance is already running.");
        return Ok(());
    }

    let cfg = config::load_config(config_path)?;

    let _ = fs::remove_file(socket);
    let listener = UnixListener::bind(socket).map_err(|e| {
        eyre::eyre!("Failed to bind control socket {}: {}", socket.display(), e)
    })?;
    setup_cleanup_handler(socket.to_path_buf());

    // before startup, so a signal during restore is not lost
    let shutdown = CancellationToken::new();
    spawn_signal_listener(shutdown.clone())?;

    info!("Listening on {}", socket.display());
    serve_until_shutdown(Xrandr::from_config(&cfg), cfg, listener, shutdown).await;

    let _ = fs::remove_file(socket);
    info!("Stopped");
    Ok(())
}

/// Start the controller, serve the socket until `shutdown` fires, then run
/// the shutdown hook exactly once. A shutdown requested while starting up
/// takes effect as soon as the restore finishes.
async fn serve_until_shutdown<B>(backend: B, cfg: DimmerConfig, listener: UnixListener, shutdown: CancellationToken)
where
    B: DisplayBackend + Send + Sync + 'static,
{
    let controller = Arc::new(Mutex::new(start_controller(backend, cfg).await));
    if shutdown.is_cancelled() {
        info!("Shutdown requested during startup");
    }

    let mut server = ipc::spawn_control_socket(Arc::clone(&controller), listener, shutdown.clone());
    info!("Running");
    shutdown.cancelled().await;

    if tokio::time::timeout(SERVER_DRAIN_TIMEOUT, &mut server).await.is_err() {
        warn!("Control socket still busy after {:?}, aborting it", SERVER_DRAIN_TIMEOUT);
        server.abort();
    }

    controller.lock().await.quit();
}

/// Load settings, detect monitors and push saved brightness back out.
async fn start_controller<B: DisplayBackend>(backend: B, cfg: DimmerConfig) -> Controller<B> {
    let restore = cfg.restore_on_startup;
    let mut controller = Controller::new(backend, cfg);
    controller.load_settings();
    controller.refresh().await;

    if restore {
        let results = controller.restore().await;
        let failed = results.iter().filter(|r| !r.is_ok()).count();
        if failed > 0 {
            error!("{} of {} monitor(s) could not be restored", failed, results.len());
        }
    }
    controller
}

/// SIGINT / SIGTERM cancel the shutdown token.
fn spawn_signal_listener(shutdown: CancellationToken) -> Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    tokio::spawn(async move {
        tokio::select! {
            _ = sigint.recv() => info!("Received SIGINT, shutting down..."),
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
            _ = shutdown.cancelled() => return,
        }
        shutdown.cancel();
    });
    Ok(())
}

/// Remove the socket file if the daemon panics
fn setup_cleanup_handler(socket: PathBuf) {
    let default_panic = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let _ = fs::remove_file(&socket);
        error!("panic occurred: {}", panic_info);
        default_panic(panic_info);
    }));
}
