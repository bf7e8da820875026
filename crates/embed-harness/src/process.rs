use std::ffi::{OsStr, OsString};
use std::io::Read;
use std::path::{Component, Path, PathBuf};
use std::process::{Child, Command, Stdio};

use anyhow::{Context, Result};
use tracing::{debug, info};

/// One subprocess invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: OsString,
    pub args: Vec<OsString>,
    /// Overlaid on the inherited environment.
    pub env_extra: Vec<(OsString, OsString)>,
    pub cwd: PathBuf,
}

impl CommandSpec {
    pub fn new(program: impl Into<OsString>, cwd: impl Into<PathBuf>) -> Self {
        CommandSpec {
            program: program.into(),
            args: Vec::new(),
            env_extra: Vec::new(),
            cwd: cwd.into(),
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<OsString>, value: impl Into<OsString>) -> Self {
        self.env_extra.push((key.into(), value.into()));
        self
    }

    /// The command line for diagnostics, e.g. `cc -c add1-test.c`.
    pub fn display(&self) -> String {
        let mut out = self.program.to_string_lossy().into_owned();
        for a in &self.args {
            out.push(' ');
            out.push_str(&a.to_string_lossy());
        }
        out
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcOutput {
    pub exit_status: i32,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl ProcOutput {
    pub fn success(&self) -> bool {
        self.exit_status == 0
    }

    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    /// stdout followed by stderr.
    pub fn combined_text(&self) -> String {
        let mut out = self.stdout_text();
        out.push_str(&String::from_utf8_lossy(&self.stderr));
        out
    }
}

/// The subprocess seam. Every generation, compile, link and execution step
/// goes through one of these.
pub trait ProcessRunner {
    /// Run to completion. A non-zero exit is reported in
    /// [`ProcOutput::exit_status`], not as an error; errors mean the process
    /// could not be run at all.
    fn run(&self, spec: &CommandSpec) -> Result<ProcOutput>;
}

impl<R: ProcessRunner + ?Sized> ProcessRunner for &R {
    fn run(&self, spec: &CommandSpec) -> Result<ProcOutput> {
        (**self).run(spec)
    }
}

/// Runs real child processes, blocking until each exits.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl ProcessRunner for SystemRunner {
    fn run(&self, spec: &CommandSpec) -> Result<ProcOutput> {
        info!(
            program = %spec.program.to_string_lossy(),
            args = ?spec.args,
            env_extra = ?spec.env_extra,
            cwd = %spec.cwd.display(),
            "RUNNING"
        );

        let mut cmd = Command::new(resolve_program(&spec.program, &spec.cwd));
        cmd.args(&spec.args);
        for (k, v) in &spec.env_extra {
            cmd.env(k, v);
        }
        cmd.current_dir(&spec.cwd);
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        let child = cmd
            .spawn()
            .with_context(|| format!("spawn: {}", spec.display()))?;
        let mut guard = ChildGuard::new(child);

        let mut stdout = guard.child().stdout.take().context("take stdout")?;
        let stderr = guard.child().stderr.take().context("take stderr")?;

        let stderr_thread = std::thread::spawn(move || -> std::io::Result<Vec<u8>> {
            let mut buf = Vec::new();
            let mut stderr = stderr;
            stderr.read_to_end(&mut buf)?;
            Ok(buf)
        });

        let mut stdout_bytes = Vec::new();
        stdout
            .read_to_end(&mut stdout_bytes)
            .with_context(|| format!("read stdout: {}", spec.display()))?;
        drop(stdout);

        let status = guard.wait().with_context(|| format!("wait: {}", spec.display()))?;
        let stderr_bytes = join_reader(stderr_thread, "stderr", spec)?;

        #[cfg(unix)]
        let exit_signal = {
            use std::os::unix::process::ExitStatusExt as _;
            status.signal()
        };
        #[cfg(not(unix))]
        let exit_signal: Option<i32> = None;

        let exit_status = match status.code() {
            Some(code) => code,
            None => exit_signal.map(|s| 128 + s).unwrap_or(1),
        };

        debug!(
            exit_status,
            stdout = %String::from_utf8_lossy(&stdout_bytes).trim_end(),
            stderr = %String::from_utf8_lossy(&stderr_bytes).trim_end(),
            "finished: {}",
            spec.display()
        );

        Ok(ProcOutput {
            exit_status,
            stdout: stdout_bytes,
            stderr: stderr_bytes,
        })
    }
}

fn join_reader(
    handle: std::thread::JoinHandle<std::io::Result<Vec<u8>>>,
    stream: &str,
    spec: &CommandSpec,
) -> Result<Vec<u8>> {
    handle
        .join()
        .map_err(|_| anyhow::anyhow!("{stream} reader panicked: {}", spec.display()))?
        .with_context(|| format!("read {stream}: {}", spec.display()))
}

/// How `Command` resolves `./name` against `current_dir` is platform
/// specific; anchor such programs to `cwd` explicitly.
fn resolve_program(program: &OsStr, cwd: &Path) -> PathBuf {
    let p = Path::new(program);
    if matches!(p.components().next(), Some(Component::CurDir)) {
        cwd.join(p)
    } else {
        p.to_path_buf()
    }
}

/// Kills and reaps the child unless it was waited for.
struct ChildGuard {
    child: Child,
    reaped: bool,
}

impl ChildGuard {
    fn new(child: Child) -> Self {
        ChildGuard {
            child,
            reaped: false,
        }
    }

    fn child(&mut self) -> &mut Child {
        &mut self.child
    }

    fn wait(&mut self) -> std::io::Result<std::process::ExitStatus> {
        let status = self.child.wait()?;
        self.reaped = true;
        Ok(status)
    }
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        if !self.reaped {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}
