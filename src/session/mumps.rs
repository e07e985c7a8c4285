//! Direct-mode ("roll and scroll") sessions against a GT.M / YottaDB runtime.
//!
//! The session speaks over plain pipes. Every command is followed by a
//! `WRITE` of a unique marker line; reading up to that marker tells us the
//! command returned, while end-of-stream before the marker means the backend
//! halted the process. Everything the backend prints is appended to the
//! session log.
use super::{Completion, ConnectError, Connector, Session, SessionError, SessionId};
use regex::Regex;
use std::ffi::OsString;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::OnceLock;
use std::thread;
use std::time::{Duration, Instant};

/// Environment marker naming the GT.M distribution directory.
pub const GTM_DIST_ENV: &str = "gtm_dist";

const MUMPS_EXECUTABLE: &str = "mumps";
const DIRECT_MODE_ARG: &str = "-direct";
const READY_PROBE: &str = "W $ZVERSION";

/// How long a dropped session's process gets to exit on its own.
const EXIT_GRACE: Duration = Duration::from_secs(2);
const EXIT_POLL: Duration = Duration::from_millis(25);

/// Executable and arguments that start a direct-mode session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl BackendCommand {
    /// Decide how to start the backend.
    ///
    /// An explicit command line wins; otherwise `$gtm_dist/mumps -direct` is
    /// used, which requires `gtm_dist` to name an existing distribution.
    pub fn resolve(
        command_override: Option<&str>,
        gtm_dist: Option<OsString>,
    ) -> Result<Self, ConnectError> {
        if !cfg!(unix) {
            return Err(ConnectError::Environment(
                "direct-mode sessions require a Unix host".to_string(),
            ));
        }

        if let Some(command) = command_override {
            let mut words = shell_words::split(command).map_err(|err| {
                ConnectError::Environment(format!("parse backend command {command:?}: {err}"))
            })?;
            if words.is_empty() {
                return Err(ConnectError::Environment(
                    "backend command is empty".to_string(),
                ));
            }
            let name = words.remove(0);
            let program = which::which(&name).map_err(|err| {
                ConnectError::Environment(format!("backend executable {name}: {err}"))
            })?;
            return Ok(Self {
                program,
                args: words,
            });
        }

        let dist = gtm_dist
            .filter(|value| !value.is_empty())
            .ok_or_else(|| ConnectError::Environment(format!("{GTM_DIST_ENV} is not set")))?;
        let program = PathBuf::from(dist).join(MUMPS_EXECUTABLE);
        if !program.is_file() {
            return Err(ConnectError::Environment(format!(
                "{} not found (check {GTM_DIST_ENV})",
                program.display()
            )));
        }
        Ok(Self {
            program,
            args: vec![DIRECT_MODE_ARG.to_string()],
        })
    }

    pub fn display(&self) -> String {
        let mut words = vec![self.program.display().to_string()];
        words.extend(self.args.iter().cloned());
        shell_words::join(words)
    }
}

/// Opens direct-mode sessions, numbering them in connect order.
#[derive(Debug, Default)]
pub struct MumpsConnector {
    command_override: Option<String>,
    connects: u64,
}

impl MumpsConnector {
    pub fn new(command_override: Option<String>) -> Self {
        Self {
            command_override,
            connects: 0,
        }
    }
}

impl Connector for MumpsConnector {
    type Session = MumpsSession;

    fn connect(&mut self, log: &Path) -> Result<MumpsSession, ConnectError> {
        let command = BackendCommand::resolve(
            self.command_override.as_deref(),
            std::env::var_os(GTM_DIST_ENV),
        )?;

        let log_error = |source| ConnectError::Log {
            path: log.to_path_buf(),
            source,
        };
        let transcript = OpenOptions::new()
            .create(true)
            .append(true)
            .open(log)
            .map_err(log_error)?;
        let child_stderr = transcript.try_clone().map_err(log_error)?;

        self.connects += 1;
        let id = SessionId(self.connects);
        tracing::debug!(session = %id, command = %command.display(), "spawning backend");

        let mut child = Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::from(child_stderr))
            .spawn()
            .map_err(|source| ConnectError::Spawn {
                program: command.program.display().to_string(),
                source,
            })?;
        let stdin = child.stdin.take();
        let stdout = child.stdout.take();

        let mut session = MumpsSession {
            id,
            child,
            stdin,
            stdout: stdout.map(BufReader::new),
            transcript,
            markers: 0,
            halted: false,
        };
        session.note(&format!("session {id} connected: {}", command.display()));

        match session.execute(READY_PROBE, "ready probe") {
            Ok(Completion::Returned) => Ok(session),
            Ok(Completion::Halted) => Err(ConnectError::NotReady(SessionError::Closed)),
            Err(err) => Err(ConnectError::NotReady(err)),
        }
    }
}

/// One live direct-mode process.
///
/// Dropping the session closes its pipes and reaps the process; a backend
/// still running after `EXIT_GRACE` is killed.
pub struct MumpsSession {
    id: SessionId,
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: Option<BufReader<ChildStdout>>,
    transcript: File,
    markers: u64,
    halted: bool,
}

impl Session for MumpsSession {
    fn id(&self) -> SessionId {
        self.id
    }
}

impl MumpsSession {
    /// Issue one command line and wait for it to finish.
    ///
    /// `label` is what the transcript records in place of the command, so
    /// credentials in arguments stay out of the log.
    pub fn execute(&mut self, command: &str, label: &str) -> Result<Completion, SessionError> {
        if self.halted {
            return Err(SessionError::Closed);
        }
        self.markers += 1;
        let marker = format!("<<vprovision:{}:{}>>", self.id.0, self.markers);
        self.note(&format!("> {label}"));

        let request = format!("{command}\nW !,\"{marker}\",!\n");
        let written = match self.stdin.as_mut() {
            Some(stdin) => stdin
                .write_all(request.as_bytes())
                .and_then(|()| stdin.flush()),
            None => return Err(SessionError::Closed),
        };
        if let Err(err) = written {
            if err.kind() == ErrorKind::BrokenPipe {
                self.mark_halted();
                return Err(SessionError::Closed);
            }
            return Err(SessionError::Io(err));
        }

        let mut backend_error = None;
        let mut line = String::new();
        loop {
            line.clear();
            let read = match self.stdout.as_mut() {
                Some(stdout) => stdout.read_line(&mut line)?,
                None => 0,
            };
            if read == 0 {
                self.mark_halted();
                // A halt only counts as completion when nothing failed first.
                return match backend_error {
                    Some(message) => Err(SessionError::Backend(message)),
                    None => Ok(Completion::Halted),
                };
            }
            let text = line.trim_end_matches(['\r', '\n']);
            // Transcript loss is not worth failing a provisioning step over.
            let _ = writeln!(self.transcript, "{text}");
            if text.ends_with(&marker) {
                break;
            }
            if backend_error.is_none() && is_backend_error(text) {
                backend_error = Some(text.trim().to_string());
            }
        }

        match backend_error {
            Some(message) => Err(SessionError::Backend(message)),
            None => Ok(Completion::Returned),
        }
    }

    fn mark_halted(&mut self) {
        self.halted = true;
        self.stdin = None;
        self.note(&format!("session {} halted", self.id));
    }

    fn note(&mut self, text: &str) {
        let _ = writeln!(self.transcript, "## {text}");
    }
}

impl Drop for MumpsSession {
    fn drop(&mut self) {
        self.stdin = None;
        self.stdout = None;
        let started = Instant::now();
        loop {
            match self.child.try_wait() {
                Ok(Some(status)) => {
                    tracing::debug!(session = %self.id, %status, "backend exited");
                    return;
                }
                Ok(None) if started.elapsed() < EXIT_GRACE => thread::sleep(EXIT_POLL),
                Ok(None) => {
                    tracing::warn!(
                        session = %self.id,
                        grace_ms = EXIT_GRACE.as_millis() as u64,
                        "backend ignored end of input, killing"
                    );
                    self.note(&format!("session {} killed after input closed", self.id));
                    let _ = self.child.kill();
                    let _ = self.child.wait();
                    return;
                }
                Err(err) => {
                    tracing::warn!(session = %self.id, error = %err, "reap backend");
                    return;
                }
            }
        }
    }
}

/// Whether a line of direct-mode output reports an error or fatal condition.
pub fn is_backend_error(line: &str) -> bool {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^\s*%(?:GTM|YDB)-[EF]-").expect("regex for backend errors"))
        .is_match(line)
}
