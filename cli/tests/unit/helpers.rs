//! Shared test helpers: scripted runners, fake ports and output constructors.

#![allow(dead_code, clippy::expect_used)]

use std::collections::VecDeque;
use std::io;
use std::path::Path;
use std::process::{ExitStatus, Output};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use multipass_run::application::ports::{
    CommandRunner, EventSink, FileTransfer, InstanceInspector, InstanceLifecycle, SessionEvent,
    ShellExecutor, SshClient,
};
use multipass_run::domain::{InvokeError, LaunchSpec};

// ── Cross-platform ExitStatus construction ───────────────────────────────────

/// Build an `ExitStatus` from a logical exit code (0 = success, non-zero = failure).
///
/// On Unix the raw wait-status encodes the exit code in bits 8–15, so we shift.
#[cfg(unix)]
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::unix::process::ExitStatusExt;
    ExitStatus::from_raw(code << 8)
}

#[cfg(windows)]
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::windows::process::ExitStatusExt;
    #[allow(clippy::cast_sign_loss)]
    ExitStatus::from_raw(code as u32)
}

// ── Output constructors ──────────────────────────────────────────────────────

pub fn ok_output(stdout: &[u8]) -> Output {
    Output {
        status: exit_status(0),
        stdout: stdout.to_vec(),
        stderr: Vec::new(),
    }
}

pub fn err_output(code: i32, stderr: &[u8]) -> Output {
    Output {
        status: exit_status(code),
        stdout: Vec::new(),
        stderr: stderr.to_vec(),
    }
}

/// `multipass list --format json` body for `(name, state, ipv4)` rows.
pub fn list_json(rows: &[(&str, &str, Option<&str>)]) -> Vec<u8> {
    let list: Vec<serde_json::Value> = rows
        .iter()
        .map(|(name, state, ip)| {
            serde_json::json!({
                "name": name,
                "state": state,
                "ipv4": ip.map_or_else(Vec::new, |ip| vec![ip.to_string()]),
                "release": "24.04 LTS",
            })
        })
        .collect();
    serde_json::to_vec(&serde_json::json!({ "list": list })).expect("serialize list")
}

// ── ScriptedRunner ───────────────────────────────────────────────────────────

/// What one scripted invocation does.
#[derive(Clone)]
pub enum Reply {
    /// The process ran; stdout lines are streamed when streaming.
    Exit(Output),
    /// The program does not exist (`io::ErrorKind::NotFound`).
    NotFound,
    /// The program exists but is not executable.
    PermissionDenied,
    /// Some other spawn failure.
    Fail(String),
}

/// A `CommandRunner` that replays `Reply`s in order and records every call.
///
/// Clones share the same script and call log, so a test can keep one handle
/// while the code under test owns another.
#[derive(Clone, Default)]
pub struct ScriptedRunner {
    replies: Arc<Mutex<VecDeque<Reply>>>,
    calls: Arc<Mutex<Vec<(String, Vec<String>)>>>,
}

impl ScriptedRunner {
    pub fn new(replies: impl IntoIterator<Item = Reply>) -> Self {
        Self {
            replies: Arc::new(Mutex::new(replies.into_iter().collect())),
            calls: Arc::default(),
        }
    }

    /// All recorded `(program, args)` pairs in call order.
    pub fn calls(&self) -> Vec<(String, Vec<String>)> {
        self.calls.lock().expect("mutex poisoned").clone()
    }

    /// Programs invoked, in order.
    pub fn programs(&self) -> Vec<String> {
        self.calls().into_iter().map(|(p, _)| p).collect()
    }

    fn next(&self, program: &str, args: &[&str]) -> Result<Output> {
        self.calls.lock().expect("mutex poisoned").push((
            program.to_owned(),
            args.iter().map(|s| (*s).to_string()).collect(),
        ));
        let reply = self
            .replies
            .lock()
            .expect("mutex poisoned")
            .pop_front()
            .unwrap_or_else(|| Reply::Exit(ok_output(b"")));
        match reply {
            Reply::Exit(output) => Ok(output),
            Reply::NotFound => Err(io::Error::from(io::ErrorKind::NotFound))
                .with_context(|| format!("failed to spawn {program}")),
            Reply::PermissionDenied => Err(io::Error::from(io::ErrorKind::PermissionDenied))
                .with_context(|| format!("failed to spawn {program}")),
            Reply::Fail(msg) => Err(anyhow::anyhow!(msg)),
        }
    }
}

impl CommandRunner for ScriptedRunner {
    async fn run(&self, program: &str, args: &[&str]) -> Result<Output> {
        self.next(program, args)
    }

    async fn run_with_timeout(
        &self,
        program: &str,
        args: &[&str],
        _timeout: Duration,
    ) -> Result<Output> {
        self.next(program, args)
    }

    async fn run_streaming(
        &self,
        program: &str,
        args: &[&str],
        on_line: &mut dyn FnMut(&str),
    ) -> Result<Output> {
        let output = self.next(program, args)?;
        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        for line in stdout.split(['\n', '\r']).filter(|l| !l.is_empty()) {
            on_line(line);
        }
        Ok(output)
    }

    async fn run_status(&self, program: &str, args: &[&str]) -> Result<ExitStatus> {
        self.next(program, args).map(|o| o.status)
    }
}

// ── FakeMultipass ────────────────────────────────────────────────────────────

/// In-memory multipass covering every port the services use.
///
/// `list` replays `lists` in order and keeps returning the last one.
pub struct FakeMultipass {
    pub lists: Mutex<VecDeque<Output>>,
    pub info: Mutex<Option<Output>>,
    pub find: Mutex<Option<Output>>,
    /// Reply to every lifecycle verb.
    pub lifecycle: Mutex<Output>,
    /// Stdout lines streamed by `launch`, then its exit.
    pub launch_lines: Vec<String>,
    pub launch_exit: Mutex<Output>,
    /// Whether the remote `authorized_keys` already holds the key.
    pub key_present: Mutex<bool>,
    /// Every call, rendered like the multipass command line.
    pub calls: Mutex<Vec<String>>,
    /// Contents of each transferred file at transfer time.
    pub transferred: Mutex<Vec<String>>,
}

impl Default for FakeMultipass {
    fn default() -> Self {
        Self {
            lists: Mutex::new(VecDeque::from([ok_output(&list_json(&[]))])),
            info: Mutex::new(None),
            find: Mutex::new(None),
            lifecycle: Mutex::new(ok_output(b"")),
            launch_lines: Vec::new(),
            launch_exit: Mutex::new(ok_output(b"")),
            key_present: Mutex::new(false),
            calls: Mutex::new(Vec::new()),
            transferred: Mutex::new(Vec::new()),
        }
    }
}

impl FakeMultipass {
    /// A fake whose `list` returns each of `lists` in turn.
    pub fn with_lists(lists: Vec<Vec<u8>>) -> Self {
        Self {
            lists: Mutex::new(lists.iter().map(|l| ok_output(l)).collect()),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("mutex poisoned").clone()
    }

    /// Number of calls whose command line starts with `prefix`.
    pub fn count(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }

    fn record(&self, call: String) {
        self.calls.lock().expect("mutex poisoned").push(call);
    }

    fn lifecycle_reply(&self, call: String) -> Result<Output, InvokeError> {
        self.record(call);
        Ok(self.lifecycle.lock().expect("mutex poisoned").clone())
    }
}

impl InstanceLifecycle for FakeMultipass {
    async fn launch(
        &self,
        spec: &LaunchSpec,
        on_line: Option<&mut dyn FnMut(&str)>,
    ) -> Result<Output, InvokeError> {
        self.record(spec.launch_args().join(" "));
        if let Some(on_line) = on_line {
            for line in &self.launch_lines {
                on_line(line);
            }
        }
        Ok(self.launch_exit.lock().expect("mutex poisoned").clone())
    }

    async fn start(&self, name: &str) -> Result<Output, InvokeError> {
        self.lifecycle_reply(format!("start {name}"))
    }

    async fn stop(&self, name: &str) -> Result<Output, InvokeError> {
        self.lifecycle_reply(format!("stop {name}"))
    }

    async fn suspend(&self, name: &str) -> Result<Output, InvokeError> {
        self.lifecycle_reply(format!("suspend {name}"))
    }

    async fn delete(&self, name: &str, purge: bool) -> Result<Output, InvokeError> {
        if purge {
            self.lifecycle_reply(format!("delete --purge {name}"))
        } else {
            self.lifecycle_reply(format!("delete {name}"))
        }
    }

    async fn recover(&self, name: &str) -> Result<Output, InvokeError> {
        self.lifecycle_reply(format!("recover {name}"))
    }

    async fn purge(&self) -> Result<Output, InvokeError> {
        self.lifecycle_reply("purge".to_string())
    }
}

impl InstanceInspector for FakeMultipass {
    async fn list(&self) -> Result<Output, InvokeError> {
        self.record("list".to_string());
        let mut lists = self.lists.lock().expect("mutex poisoned");
        let next = if lists.len() > 1 {
            lists.pop_front()
        } else {
            lists.front().cloned()
        };
        Ok(next.unwrap_or_else(|| ok_output(&list_json(&[]))))
    }

    async fn info(&self, name: &str) -> Result<Output, InvokeError> {
        self.record(format!("info {name}"));
        self.info
            .lock()
            .expect("mutex poisoned")
            .clone()
            .ok_or_else(|| InvokeError::Spawn("info not scripted".to_string()))
    }

    async fn find(&self) -> Result<Output, InvokeError> {
        self.record("find".to_string());
        self.find
            .lock()
            .expect("mutex poisoned")
            .clone()
            .ok_or_else(|| InvokeError::Spawn("find not scripted".to_string()))
    }

    async fn version(&self) -> Result<Output, InvokeError> {
        Ok(ok_output(b"multipass   1.14.0\n"))
    }
}

impl FileTransfer for FakeMultipass {
    async fn transfer(
        &self,
        local: &Path,
        name: &str,
        remote: &str,
    ) -> Result<Output, InvokeError> {
        self.record(format!("transfer {} {name}:{remote}", local.display()));
        let content = std::fs::read_to_string(local).unwrap_or_default();
        self.transferred
            .lock()
            .expect("mutex poisoned")
            .push(content);
        Ok(ok_output(b""))
    }
}

impl ShellExecutor for FakeMultipass {
    async fn exec(&self, name: &str, args: &[&str]) -> Result<Output, InvokeError> {
        let script = args.join(" ");
        self.record(format!("exec {name} -- {script}"));
        if script.contains("grep -qxF") {
            let present = *self.key_present.lock().expect("mutex poisoned");
            let out: &[u8] = if present { b"present\n" } else { b"not_found\n" };
            return Ok(ok_output(out));
        }
        Ok(ok_output(b""))
    }
}

// ── FakeSshClient ────────────────────────────────────────────────────────────

pub const TEST_PUBLIC_KEY: &str = "ssh-rsa AAAAB3NzaC1yc2EAAAADAQABAAABAQC7test multipass-run";

/// Writes a fixed key pair instead of running `ssh-keygen`.
#[derive(Default)]
pub struct FakeSshClient {
    pub generated: Mutex<u32>,
    pub connection_ok: bool,
    pub connected_to: Mutex<Vec<String>>,
}

impl FakeSshClient {
    pub fn reachable() -> Self {
        Self {
            connection_ok: true,
            ..Self::default()
        }
    }

    pub fn generated(&self) -> u32 {
        *self.generated.lock().expect("mutex poisoned")
    }
}

impl SshClient for FakeSshClient {
    async fn generate_key(&self, private_key: &Path) -> Result<()> {
        *self.generated.lock().expect("mutex poisoned") += 1;
        std::fs::write(private_key, "PRIVATE KEY\n")?;
        let mut public = private_key.as_os_str().to_owned();
        public.push(".pub");
        std::fs::write(public, format!("{TEST_PUBLIC_KEY}\n"))?;
        Ok(())
    }

    async fn test_connection(
        &self,
        _user: &str,
        _ip: &str,
        _identity: &Path,
        _timeout: Duration,
    ) -> Result<bool> {
        Ok(self.connection_ok)
    }

    async fn connect(&self, host_alias: &str) -> Result<ExitStatus> {
        self.connected_to
            .lock()
            .expect("mutex poisoned")
            .push(host_alias.to_string());
        Ok(exit_status(0))
    }
}

// ── RecordingEvents ──────────────────────────────────────────────────────────

/// Captures every emitted event.
#[derive(Default)]
pub struct RecordingEvents {
    events: Mutex<Vec<SessionEvent>>,
}

impl RecordingEvents {
    pub fn events(&self) -> Vec<SessionEvent> {
        self.events.lock().expect("mutex poisoned").clone()
    }

    pub fn warnings(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                SessionEvent::Warning { message } => Some(message),
                _ => None,
            })
            .collect()
    }

    pub fn snapshots(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, SessionEvent::Snapshot(_)))
            .count()
    }
}

impl EventSink for RecordingEvents {
    fn emit(&self, event: SessionEvent) {
        self.events.lock().expect("mutex poisoned").push(event);
    }
}
