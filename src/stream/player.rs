//! Local Player - mpv playback over JSON IPC
//!
//! mpv runs idle with an IPC socket. Playback is driven by commands on the
//! socket, and mpv pushes `property-change` events for the properties we
//! observe; those become renderer events.

use std::process::Stdio;

use serde_json::{json, Value};
use tokio::process::Command;

use crate::config::PlayerConfig;
use crate::playback::RendererEvent;

/// Observation ids registered on every connection
pub const OBS_TIME_POS: u64 = 1;
pub const OBS_DURATION: u64 = 2;
pub const OBS_PAUSED_FOR_CACHE: u64 = 3;

/// Check if mpv is installed
pub async fn is_available(config: &PlayerConfig) -> bool {
    let cmd = config.mpv_path.as_str();
    if cmd.starts_with('/') {
        return std::path::Path::new(cmd).exists();
    }

    Command::new("which")
        .arg(cmd)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Map one IPC line to a renderer event
///
/// Replies to our own commands and unobserved events yield `None`.
pub fn parse_mpv_event(line: &str) -> Option<RendererEvent> {
    let value: Value = serde_json::from_str(line).ok()?;
    match value.get("event")?.as_str()? {
        "property-change" => match value.get("name")?.as_str()? {
            "time-pos" => value.get("data")?.as_f64().map(RendererEvent::Progress),
            "duration" => value.get("data")?.as_f64().map(RendererEvent::Load),
            "paused-for-cache" => value.get("data")?.as_bool().map(RendererEvent::Buffer),
            _ => None,
        },
        "end-file" if value.get("reason")?.as_str()? == "error" => {
            let detail = value
                .get("file_error")
                .and_then(Value::as_str)
                .unwrap_or("playback failed");
            Some(RendererEvent::Error(detail.to_string()))
        }
        _ => None,
    }
}

fn command_line(request_id: u64, command: Value) -> String {
    let mut line = json!({ "command": command, "request_id": request_id }).to_string();
    line.push('\n');
    line
}

#[cfg(unix)]
pub use ipc::MpvRenderer;

#[cfg(unix)]
mod ipc {
    use std::path::PathBuf;
    use std::process::Stdio;
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::{json, Value};
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::unix::OwnedWriteHalf;
    use tokio::net::UnixStream;
    use tokio::process::{Child, Command};
    use tokio::sync::Mutex;
    use tokio::task::JoinHandle;
    use tracing::{debug, info, warn};

    use super::{command_line, parse_mpv_event, OBS_DURATION, OBS_PAUSED_FOR_CACHE, OBS_TIME_POS};
    use crate::config::PlayerConfig;
    use crate::playback::{EventHub, Listener, Renderer, RendererError, RendererEvent, Subscription};

    const CONNECT_ATTEMPTS: u32 = 50;
    const CONNECT_RETRY: Duration = Duration::from_millis(100);
    const QUIT_GRACE: Duration = Duration::from_secs(2);

    /// mpv driven over its JSON IPC socket
    pub struct MpvRenderer {
        config: PlayerConfig,
        socket_path: PathBuf,
        events: EventHub<RendererEvent>,
        conn: Mutex<Option<Connection>>,
    }

    struct Connection {
        child: Child,
        writer: OwnedWriteHalf,
        reader: JoinHandle<()>,
        next_request: u64,
    }

    impl Connection {
        async fn send(&mut self, command: Value) -> Result<(), RendererError> {
            self.next_request += 1;
            let line = command_line(self.next_request, command);
            self.writer
                .write_all(line.as_bytes())
                .await
                .map_err(|e| RendererError::Ipc(e.to_string()))
        }
    }

    impl MpvRenderer {
        pub fn new(config: PlayerConfig) -> Self {
            let socket_path = config.ipc_socket.clone().unwrap_or_else(|| {
                std::env::temp_dir().join(format!("flickstream-mpv-{}.sock", std::process::id()))
            });
            Self {
                config,
                socket_path,
                events: EventHub::new(),
                conn: Mutex::new(None),
            }
        }

        async fn launch(&self) -> Result<Connection, RendererError> {
            let _ = tokio::fs::remove_file(&self.socket_path).await;

            let mut cmd = Command::new(&self.config.mpv_path);
            cmd.arg("--idle=yes")
                .arg("--force-window=immediate")
                .arg("--no-terminal")
                .arg(format!("--input-ipc-server={}", self.socket_path.display()))
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .kill_on_drop(true);

            let child = cmd.spawn().map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    RendererError::NotFound(self.config.mpv_path.clone())
                } else {
                    RendererError::StartFailed(e)
                }
            })?;

            let stream = self.connect().await?;
            let (read_half, writer) = stream.into_split();

            let events = self.events.clone();
            let reader = tokio::spawn(async move {
                let mut lines = BufReader::new(read_half).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    match parse_mpv_event(&line) {
                        Some(event) => events.emit(event),
                        None => debug!(line = %line, "Unhandled mpv message"),
                    }
                }
                warn!("mpv IPC connection closed");
                events.emit(RendererEvent::Error("Player window closed".to_string()));
            });

            let mut conn = Connection {
                child,
                writer,
                reader,
                next_request: 0,
            };
            for (id, name) in [
                (OBS_TIME_POS, "time-pos"),
                (OBS_DURATION, "duration"),
                (OBS_PAUSED_FOR_CACHE, "paused-for-cache"),
            ] {
                conn.send(json!(["observe_property", id, name])).await?;
            }
            info!(socket = %self.socket_path.display(), "mpv connected");
            Ok(conn)
        }

        async fn connect(&self) -> Result<UnixStream, RendererError> {
            let mut last_error = None;
            for _ in 0..CONNECT_ATTEMPTS {
                match UnixStream::connect(&self.socket_path).await {
                    Ok(stream) => return Ok(stream),
                    Err(e) => last_error = Some(e),
                }
                tokio::time::sleep(CONNECT_RETRY).await;
            }
            Err(RendererError::Ipc(format!(
                "could not connect to {}: {}",
                self.socket_path.display(),
                last_error.map(|e| e.to_string()).unwrap_or_default()
            )))
        }

        async fn command(&self, command: Value) -> Result<(), RendererError> {
            let mut conn = self.conn.lock().await;
            match conn.as_mut() {
                Some(conn) => conn.send(command).await,
                None => Err(RendererError::NotRunning),
            }
        }
    }

    #[async_trait]
    impl Renderer for MpvRenderer {
        async fn load(&self, url: &str, autoplay: bool) -> Result<(), RendererError> {
            let mut guard = self.conn.lock().await;
            if guard.is_none() {
                *guard = Some(self.launch().await?);
            }
            let Some(conn) = guard.as_mut() else {
                return Err(RendererError::NotRunning);
            };
            conn.send(json!(["loadfile", url, "replace"])).await?;
            conn.send(json!(["set_property", "pause", !autoplay])).await?;
            debug!(url, autoplay, "mpv loading stream");
            Ok(())
        }

        async fn set_paused(&self, paused: bool) -> Result<(), RendererError> {
            self.command(json!(["set_property", "pause", paused])).await
        }

        async fn seek(&self, target_seconds: f64) -> Result<(), RendererError> {
            self.command(json!(["seek", target_seconds, "absolute"])).await
        }

        async fn shutdown(&self) -> Result<(), RendererError> {
            let Some(mut conn) = self.conn.lock().await.take() else {
                return Ok(());
            };
            conn.reader.abort();
            if let Err(e) = conn.send(json!(["quit"])).await {
                debug!(error = %e, "mpv quit command failed");
            }
            match tokio::time::timeout(QUIT_GRACE, conn.child.wait()).await {
                Ok(_) => {}
                Err(_) => {
                    warn!("mpv did not quit in time, killing");
                    let _ = conn.child.kill().await;
                }
            }
            let _ = tokio::fs::remove_file(&self.socket_path).await;
            info!("mpv stopped");
            Ok(())
        }

        fn on_event(&self, listener: Listener<RendererEvent>) -> Subscription {
            self.events.subscribe(listener)
        }
    }

}
