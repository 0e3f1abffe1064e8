use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use eyre::Result;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::core::actions::{Action, Outcome, dispatch};
use crate::core::brightness::{Preset, format_fraction, parse_fraction};
use crate::core::controller::Controller;
use crate::services::xrandr::DisplayBackend;

/// Longest command accepted; anything past this is dropped.
const MAX_COMMAND_LEN: u64 = 4096;

/// How long a client may take to send its command and close its write half.
const CLIENT_READ_TIMEOUT: Duration = Duration::from_secs(2);

/// `$XDG_RUNTIME_DIR/dimmer.sock`, or `/tmp/dimmer.sock` without a runtime dir.
pub fn socket_path() -> PathBuf {
    dirs::runtime_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("dimmer.sock")
}

/// Wire form of an action, one line per connection.
pub fn command_for(action: &Action) -> String {
    match action {
        Action::SetPreset(preset) => format!("preset {}", preset.0),
        Action::SetAll(fraction) => format!("set-all {}", format_fraction(*fraction)),
        Action::SetMonitor { monitor, fraction } => format!("set {} {}", monitor, format_fraction(*fraction)),
        Action::SelectMonitor(monitor) => format!("get {}", monitor),
        Action::ListMonitors => "list".to_string(),
        Action::Refresh => "refresh".to_string(),
        Action::Info { json: false } => "info".to_string(),
        Action::Info { json: true } => "info --json".to_string(),
        Action::Quit => "stop".to_string(),
    }
}

pub fn parse_command(line: &str) -> Result<Action, String> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    match parts.as_slice() {
        ["list"] => Ok(Action::ListMonitors),
        ["refresh"] => Ok(Action::Refresh),
        ["info"] => Ok(Action::Info { json: false }),
        ["info", "--json"] => Ok(Action::Info { json: true }),
        ["stop"] => Ok(Action::Quit),
        ["get", monitor] => Ok(Action::SelectMonitor(monitor.to_string())),
        ["preset", level] => Ok(Action::SetPreset(level.parse::<Preset>()?)),
        ["set-all", value] => Ok(Action::SetAll(parse_fraction(value)?)),
        ["set", monitor, value] => Ok(Action::SetMonitor {
            monitor: monitor.to_string(),
            fraction: parse_fraction(value)?,
        }),
        [] => Err("empty command".to_string()),
        _ => Err(format!("unknown command '{}'", line.trim())),
    }
}

/// Serve the control socket until `shutdown` is cancelled. Connections are
/// handled one at a time; `stop` cancels `shutdown` after replying.
pub fn spawn_control_socket<B>(
    controller: Arc<Mutex<Controller<B>>>,
    listener: UnixListener,
    shutdown: CancellationToken,
) -> JoinHandle<()>
where
    B: DisplayBackend + Send + Sync + 'static,
{
    tokio::spawn(async move {
        loop {
            let accepted = tokio::select! {
                _ = shutdown.cancelled() => break,
                accepted = listener.accept() => accepted,
            };

            match accepted {
                Ok((mut stream, _addr)) => {
                    if let Err(e) = handle_client(&mut stream, &controller, &shutdown).await {
                        error!("Control connection failed: {}", e);
                    }
                }
                Err(e) => error!("Failed to accept control connection: {}", e),
            }
        }
        debug!("Control socket closed");
    })
}

async fn handle_client<B: DisplayBackend>(
    stream: &mut UnixStream,
    controller: &Mutex<Controller<B>>,
    shutdown: &CancellationToken,
) -> Result<()> {
    let read = tokio::select! {
        _ = shutdown.cancelled() => return Ok(()),
        read = tokio::time::timeout(CLIENT_READ_TIMEOUT, read_command(stream)) => read,
    };
    let line = match read {
        Ok(line) => line?,
        Err(_) => {
            warn!("Control client sent nothing within {:?}, dropping it", CLIENT_READ_TIMEOUT);
            return Ok(());
        }
    };

    // connect-and-close, e.g. a single-instance check
    if line.is_empty() {
        debug!("Empty control connection");
        return Ok(());
    }
    debug!("Control command: {:?}", line);

    let reply = match parse_command(&line) {
        Ok(action) => {
            let outcome = {
                let mut ctl = controller.lock().await;
                dispatch(&mut ctl, action).await
            };
            if outcome == Outcome::Quit {
                info!("Received stop command, shutting down");
                stream.write_all(outcome.render().as_bytes()).await?;
                shutdown.cancel();
                return Ok(());
            }
            outcome.render()
        }
        Err(reason) => {
            error!("Rejected control command {:?}: {}", line, reason);
            Outcome::Rejected(reason).render()
        }
    };

    stream.write_all(reply.as_bytes()).await?;
    Ok(())
}

/// Read until the client closes its write half, capped at `MAX_COMMAND_LEN`.
async fn read_command(stream: &mut UnixStream) -> Result<String> {
    let mut buf = Vec::new();
    (&mut *stream).take(MAX_COMMAND_LEN).read_to_end(&mut buf).await?;
    Ok(String::from_utf8_lossy(&buf).trim().to_string())
}

/// Send one command to a running daemon and return its reply.
pub async fn send_command(socket: &Path, command: &str) -> Result<String> {
    let stream = UnixStream::connect(socket).await?;
    send_on(stream, command).await
}

/// Like `send_command`, over a connection the caller already opened.
pub async fn send_on(mut stream: UnixStream, command: &str) -> Result<String> {
    stream.write_all(command.as_bytes()).await?;
    stream.shutdown().await?;

    let mut response = Vec::new();
    stream.read_to_end(&mut response).await?;
    Ok(String::from_utf8_lossy(&response).into_owned())
}
