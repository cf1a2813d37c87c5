//! Focused-window lookup through the platform's own tooling.

use anyhow::Result;
use async_trait::async_trait;

use super::sampler::ActivitySampler;

#[cfg(target_os = "macos")]
const FRONTMOST_SCRIPT: &str = r#"tell application "System Events"
    set frontApp to first application process whose frontmost is true
    set appName to name of frontApp
    try
        return appName & " - " & (name of front window of frontApp)
    on error
        return appName
    end try
end tell"#;

/// Reports the title of the focused window (`osascript` on macOS, `xdotool`
/// elsewhere on Unix).
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemFocusSampler;

impl SystemFocusSampler {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ActivitySampler for SystemFocusSampler {
    async fn current_focus(&self) -> Result<Option<String>> {
        query_focused_window().await
    }
}

#[cfg(target_os = "macos")]
async fn query_focused_window() -> Result<Option<String>> {
    run_focus_command("osascript", &["-e", FRONTMOST_SCRIPT]).await
}

#[cfg(all(unix, not(target_os = "macos")))]
async fn query_focused_window() -> Result<Option<String>> {
    run_focus_command("xdotool", &["getactivewindow", "getwindowname"]).await
}

#[cfg(not(unix))]
async fn query_focused_window() -> Result<Option<String>> {
    anyhow::bail!("focus sampling is not supported on this platform")
}

/// Run `program` and read its stdout. The child is killed if the returned
/// future is dropped before it exits.
#[cfg(unix)]
async fn run_focus_command(program: &str, args: &[&str]) -> Result<Option<String>> {
    use anyhow::{bail, Context};
    use std::process::Stdio;
    use tokio::process::Command;

    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await
        .with_context(|| format!("failed to run {program}"))?;

    if !output.status.success() {
        bail!(
            "{program} exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }

    let label = String::from_utf8_lossy(&output.stdout).trim().to_string();
    Ok((!label.is_empty()).then_some(label))
}
