// src/channel/process.rs
// Spawning the tool executor and watching it until exit

use std::process::Stdio;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStderr, Command};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use super::{ChannelEvent, SubprocessChannel};
use crate::config::ExecutorConfig;
use crate::error::{ProxyError, Result};

impl SubprocessChannel {
    /// Spawn the executor and attach a channel to its stdio
    pub async fn spawn(
        config: &ExecutorConfig,
    ) -> Result<(Arc<Self>, mpsc::Receiver<ChannelEvent>)> {
        info!(
            command = %config.command,
            args = ?config.args,
            framing = config.framing.as_str(),
            "Spawning tool executor"
        );

        let mut cmd = Command::new(&config.command);
        cmd.args(&config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(ref dir) = config.working_dir {
            cmd.current_dir(dir);
        }

        let spawn_error = |source| ProxyError::Spawn {
            command: config.command.clone(),
            source,
        };

        let mut child = cmd.spawn().map_err(spawn_error)?;
        let stdin = child.stdin.take().ok_or_else(|| spawn_error(missing_pipe("stdin")))?;
        let stdout = child.stdout.take().ok_or_else(|| spawn_error(missing_pipe("stdout")))?;
        let stderr = child.stderr.take().ok_or_else(|| spawn_error(missing_pipe("stderr")))?;

        debug!(pid = ?child.id(), "Tool executor spawned");
        drain_stderr(stderr);

        let (channel, events) = Self::attach(
            config.framing,
            config.settle_delay(),
            config.max_frame_bytes,
            stdout,
            stdin,
        )
        .await;

        let (kill_tx, kill_rx) = oneshot::channel();
        channel.install_kill_switch(kill_tx).await;
        watch_exit(Arc::clone(&channel), child, kill_rx);

        Ok((channel, events))
    }
}

fn missing_pipe(name: &str) -> std::io::Error {
    std::io::Error::other(format!("child {} was not captured", name))
}

/// Log executor stderr; never parsed as protocol data
fn drain_stderr(stderr: ChildStderr) {
    tokio::spawn(async move {
        let mut lines = BufReader::new(stderr).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) if line.trim().is_empty() => {}
                Ok(Some(line)) => warn!(line = %line, "Executor stderr"),
                Ok(None) => break,
                Err(e) => {
                    debug!(error = %e, "Executor stderr closed");
                    break;
                }
            }
        }
    });
}

/// Wait for the child to exit (or for a shutdown request) and crash the channel
fn watch_exit(channel: Arc<SubprocessChannel>, mut child: Child, kill: oneshot::Receiver<()>) {
    tokio::spawn(async move {
        let status = tokio::select! {
            status = child.wait() => status,
            _ = kill => {
                if let Err(e) = child.kill().await {
                    warn!(error = %e, "Failed to kill tool executor");
                }
                child.wait().await
            }
        };

        match status {
            Ok(status) => {
                channel
                    .mark_crashed(status.code(), format!("executor exited with {}", status))
                    .await
            }
            Err(e) => {
                channel
                    .mark_crashed(None, format!("failed to wait on executor: {}", e))
                    .await
            }
        }
    });
}
