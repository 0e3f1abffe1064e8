use std::future::Future;
use std::process::Stdio;
use std::time::Duration;

use eyre::Result;
use once_cell::sync::Lazy;
use regex::Regex;
use tokio::process::Command;
use tracing::debug;

use crate::config::DimmerConfig;
use crate::core::brightness::format_fraction;

/// `<name> connected ...`; `disconnected` never matches because of the word boundary.
static CONNECTED_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\S+)\s+connected\b").expect("static regex"));

/// The external display-configuration tool, split out so the controller
/// can be driven by a fake in tests.
pub trait DisplayBackend {
    /// Raw text of the query command.
    fn query(&self) -> impl Future<Output = Result<String>> + Send;

    /// Set `output` to `value`; `value` is already clamped by the caller.
    fn set_brightness(&self, output: &str, value: f64) -> impl Future<Output = Result<()>> + Send;
}

/// Shells out to `xrandr` (or a compatible tool named in the config).
#[derive(Debug, Clone)]
pub struct Xrandr {
    tool: String,
    timeout: Duration,
}

impl Xrandr {
    pub fn new(tool: impl Into<String>, timeout: Duration) -> Self {
        Self { tool: tool.into(), timeout }
    }

    pub fn from_config(cfg: &DimmerConfig) -> Self {
        Self::new(cfg.tool.clone(), cfg.command_timeout)
    }

    /// Run the tool with `args`, bounded by the configured timeout.
    /// Non-zero exit is an error carrying the tool's stderr.
    async fn run(&self, args: &[&str]) -> Result<Vec<u8>> {
        debug!("Running {} {}", self.tool, args.join(" "));

        let child = Command::new(&self.tool)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| eyre::eyre!("Failed to start '{}': {}", self.tool, e))?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| eyre::eyre!("'{}' timed out after {:?}", self.tool, self.timeout))??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            eyre::bail!(
                "'{} {}' exited with status {:?}: {}",
                self.tool,
                args.join(" "),
                output.status.code(),
                stderr.trim()
            );
        }

        Ok(output.stdout)
    }
}

impl DisplayBackend for Xrandr {
    async fn query(&self) -> Result<String> {
        let stdout = self.run(&["--query"]).await?;
        String::from_utf8(stdout).map_err(|e| eyre::eyre!("'{}' printed non-UTF-8 output: {}", self.tool, e))
    }

    async fn set_brightness(&self, output: &str, value: f64) -> Result<()> {
        let value = format_fraction(value);
        self.run(&["--output", output, "--brightness", value.as_str()]).await?;
        Ok(())
    }
}

/// Output names of every line reporting `connected`, in tool order.
pub fn parse_connected_outputs(text: &str) -> Vec<String> {
    text.lines()
        .filter_map(|line| CONNECTED_LINE.captures(line))
        .map(|caps| caps[1].to_string())
        .collect()
}

/// Query the tool and parse connected outputs. A failed query is an error
/// value, never a panic; `Controller::refresh` logs it and keeps its list.
pub async fn detect_monitors<B: DisplayBackend>(backend: &B) -> Result<Vec<String>> {
    let text = backend.query().await?;
    Ok(parse_connected_outputs(&text))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
Screen 0: minimum 320 x 200, current 3840 x 1080, maximum 16384 x 16384
DP-1 connected primary 1920x1080+0+0 (normal left inverted right x axis y axis) 527mm x 296mm
   1920x1080     60.00*+  59.94
HDMI-1 disconnected (normal left inverted right x axis y axis)
eDP-1 connected 1920x1080+1920+0 (normal left inverted right x axis y axis) 344mm x 193mm
DP-2 disconnected (normal left inverted right x axis y axis)
";

    #[test]
    fn picks_only_connected_outputs() {
        let lines = "DP-1 connected 1920x1080+0+0\nHDMI-1 disconnected";
        assert_eq!(parse_connected_outputs(lines), vec!["DP-1"]);
    }

    #[test]
    fn parses_full_query_output_in_order() {
        assert_eq!(parse_connected_outputs(SAMPLE), vec!["DP-1", "eDP-1"]);
    }

    #[test]
    fn empty_or_garbage_output_yields_nothing() {
        assert!(parse_connected_outputs("").is_empty());
        assert!(parse_connected_outputs("   1920x1080 60.00*\nconnected\n").is_empty());
    }

    #[tokio::test]
    async fn missing_binary_is_reported() {
        let backend = Xrandr::new("dimmer-test-no-such-binary", Duration::from_secs(1));
        let err = detect_monitors(&backend).await.unwrap_err();
        assert!(err.to_string().contains("Failed to start"));
    }

    #[tokio::test]
    async fn non_zero_exit_is_an_error() {
        let backend = Xrandr::new("false", Duration::from_secs(1));
        assert!(backend.query().await.is_err());
        assert!(backend.set_brightness("DP-1", 0.5).await.is_err());
    }

    #[tokio::test]
    async fn hanging_tool_is_bounded_by_timeout() {
        use std::os::unix::fs::PermissionsExt;

        let dir = std::env::temp_dir().join(format!("dimmer-hang-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let script = dir.join("slow-xrandr");
        std::fs::write(&script, "#!/bin/sh\nsleep 10\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let backend = Xrandr::new(script.to_str().unwrap(), Duration::from_millis(200));
        let started = std::time::Instant::now();
        let err = backend.query().await.unwrap_err();
        assert!(err.to_string().contains("timed out"));
        assert!(started.elapsed() < Duration::from_secs(5));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn detection_is_idempotent() {
        struct Fixed;
        impl DisplayBackend for Fixed {
            async fn query(&self) -> Result<String> {
                Ok(SAMPLE.to_string())
            }
            async fn set_brightness(&self, _: &str, _: f64) -> Result<()> {
                Ok(())
            }
        }

        let first = detect_monitors(&Fixed).await.unwrap();
        let second = detect_monitors(&Fixed).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first, vec!["DP-1", "eDP-1"]);
    }
}
