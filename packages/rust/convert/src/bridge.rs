//! Conversion service reached through a child process.
//!
//! The bridge speaks JSON lines on stdin/stdout: it announces
//! `{"type":"ready"}` once, then answers each `convert` request with exactly
//! one `result` or `error` line carrying the same id.

use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::Mutex;

use tracing::{debug, info, warn};

use courseforge_shared::{ConverterSettings, CourseError, Result};

use crate::{Method, TextConverter};

// ---------------------------------------------------------------------------
// Protocol types
// ---------------------------------------------------------------------------

#[derive(Debug, serde::Serialize)]
#[serde(tag = "type")]
enum RequestMessage<'a> {
    #[serde(rename = "convert")]
    Convert {
        id: String,
        method: &'static str,
        content: &'a str,
    },
    #[serde(rename = "shutdown")]
    Shutdown,
}

#[derive(Debug, serde::Deserialize)]
#[serde(tag = "type")]
enum ResponseMessage {
    #[serde(rename = "ready")]
    Ready,
    #[serde(rename = "result")]
    Result { id: String, content: String },
    #[serde(rename = "error")]
    Error { id: String, error: String },
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// How to start the bridge process.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Interpreter, e.g. `node`.
    pub cmd: String,
    /// Script passed as the first argument.
    pub script: String,
    pub working_dir: String,
}

impl From<&ConverterSettings> for BridgeConfig {
    fn from(settings: &ConverterSettings) -> Self {
        Self {
            cmd: settings.bridge_cmd.clone(),
            script: settings.bridge_script.clone(),
            working_dir: settings.working_dir.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Bridge handle
// ---------------------------------------------------------------------------

struct BridgeHandle {
    child: Child,
    stdin: ChildStdin,
    reader: BufReader<ChildStdout>,
    request_counter: u64,
}

impl BridgeHandle {
    fn spawn(config: &BridgeConfig) -> Result<Self> {
        info!(cmd = %config.cmd, script = %config.script, "spawning conversion bridge");

        let mut child = Command::new(&config.cmd)
            .arg(&config.script)
            .current_dir(&config.working_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| {
                CourseError::Conversion(format!(
                    "failed to spawn bridge: {e}. Is `{}` installed?",
                    config.cmd
                ))
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| CourseError::Conversion("failed to capture bridge stdin".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| CourseError::Conversion("failed to capture bridge stdout".into()))?;

        let mut handle = Self {
            child,
            stdin,
            reader: BufReader::new(stdout),
            request_counter: 0,
        };
        handle.wait_for_ready()?;
        Ok(handle)
    }

    fn read_message(&mut self) -> Result<ResponseMessage> {
        let mut line = String::new();
        self.reader
            .read_line(&mut line)
            .map_err(|e| CourseError::Conversion(format!("bridge read error: {e}")))?;

        if line.is_empty() {
            return Err(CourseError::Conversion(
                "bridge closed stdout unexpectedly".into(),
            ));
        }

        serde_json::from_str(line.trim()).map_err(|e| {
            CourseError::Conversion(format!(
                "invalid bridge message: {e} (got: {})",
                preview(line.trim_end())
            ))
        })
    }

    fn wait_for_ready(&mut self) -> Result<()> {
        match self.read_message()? {
            ResponseMessage::Ready => {
                info!("bridge is ready");
                Ok(())
            }
            other => Err(CourseError::Conversion(format!(
                "expected ready message, got: {other:?}"
            ))),
        }
    }

    fn send(&mut self, method: Method, content: &str) -> Result<String> {
        self.request_counter += 1;
        let id = format!("req-{}", self.request_counter);

        let request = RequestMessage::Convert {
            id: id.clone(),
            method: method.as_str(),
            content,
        };
        let json = serde_json::to_string(&request)
            .map_err(|e| CourseError::Conversion(format!("failed to serialize request: {e}")))?;

        writeln!(self.stdin, "{json}").map_err(|e| {
            CourseError::Conversion(format!("failed to write to bridge stdin: {e}"))
        })?;
        self.stdin
            .flush()
            .map_err(|e| CourseError::Conversion(format!("failed to flush bridge stdin: {e}")))?;

        match self.read_message()? {
            ResponseMessage::Result {
                id: resp_id,
                content,
            } if resp_id == id => Ok(content),
            ResponseMessage::Error {
                id: resp_id,
                error,
            } if resp_id == id => Err(CourseError::Conversion(format!(
                "{} failed: {error}",
                method.as_str()
            ))),
            other => Err(CourseError::Conversion(format!(
                "unexpected bridge response to {id}: {other:?}"
            ))),
        }
    }

    fn shutdown(&mut self) {
        if let Ok(json) = serde_json::to_string(&RequestMessage::Shutdown) {
            let _ = writeln!(self.stdin, "{json}");
            let _ = self.stdin.flush();
        }

        match self.child.wait() {
            Ok(status) => info!(?status, "bridge exited"),
            Err(e) => warn!("bridge wait error: {e}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Converter
// ---------------------------------------------------------------------------

/// [`TextConverter`] backed by a long-lived bridge process.
///
/// Requests are serialized through one pipe; concurrent callers queue on the
/// handle's lock.
pub struct BridgeConverter {
    handle: Mutex<BridgeHandle>,
}

impl BridgeConverter {
    /// Start the bridge and wait for its ready signal.
    pub fn spawn(config: &BridgeConfig) -> Result<Self> {
        Ok(Self {
            handle: Mutex::new(BridgeHandle::spawn(config)?),
        })
    }
}

impl TextConverter for BridgeConverter {
    fn convert(&self, method: Method, content: &str) -> Result<String> {
        let mut handle = self
            .handle
            .lock()
            .map_err(|_| CourseError::Conversion("bridge lock poisoned".into()))?;
        debug!(method = method.as_str(), len = content.len(), "bridge request");
        handle.send(method, content)
    }

    fn name(&self) -> &str {
        "bridge"
    }
}

impl Drop for BridgeConverter {
    fn drop(&mut self) {
        if let Ok(handle) = self.handle.get_mut() {
            handle.shutdown();
        }
    }
}

/// The first 200 characters of a bridge line, for error messages.
fn preview(line: &str) -> String {
    line.chars().take(200).collect()
}
