use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{info, warn};

use crate::binding::generator_env;
use crate::config::HarnessConfig;
use crate::process::{CommandSpec, ProcessRunner};

/// Whether the host can build and run embedding scenarios at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Availability {
    Available,
    Unavailable { reason: String },
}

impl Availability {
    pub fn is_available(&self) -> bool {
        matches!(self, Availability::Available)
    }
}

/// Check the C compiler is reachable, then let the probe script try to build
/// an embeddable library in `work_dir`.
pub fn probe_environment(
    config: &HarnessConfig,
    runner: &dyn ProcessRunner,
    work_dir: &Path,
) -> Availability {
    let availability = probe_inner(config, runner, work_dir);
    match &availability {
        Availability::Available => info!("embedding environment available"),
        Availability::Unavailable { reason } => warn!(%reason, "embedding environment unavailable"),
    }
    availability
}

fn probe_inner(config: &HarnessConfig, runner: &dyn ProcessRunner, work_dir: &Path) -> Availability {
    let cc = &config.toolchain.cc;
    if find_program(cc).is_none() {
        return Availability::Unavailable {
            reason: format!("C compiler not found: {}", cc.to_string_lossy()),
        };
    }

    let Some(probe) = &config.generator.probe_script else {
        return Availability::Available;
    };
    let script = config
        .fixtures_dir
        .join(format!("{probe}.{}", config.generator.script_ext));
    if !script.is_file() {
        return Availability::Available;
    }

    let mut spec = CommandSpec::new(config.generator.program.clone(), work_dir).arg(&script);
    match generator_env(&config.generator) {
        Ok(Some((k, v))) => spec = spec.env(k, v),
        Ok(None) => {}
        Err(err) => {
            return Availability::Unavailable {
                reason: format!("{err:#}"),
            }
        }
    }

    match runner.run(&spec) {
        Ok(out) if out.success() => Availability::Available,
        Ok(out) => Availability::Unavailable {
            reason: format!(
                "{} exited with {}:\n{}",
                spec.display(),
                out.exit_status,
                tail(&out.combined_text(), 2000)
            ),
        },
        Err(err) => Availability::Unavailable {
            reason: format!("{err:#}"),
        },
    }
}

fn tail(text: &str, limit: usize) -> &str {
    if text.len() <= limit {
        return text;
    }
    let mut start = text.len() - limit;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    &text[start..]
}

/// Resolve `prog` as a path or through `PATH`.
pub fn find_program(prog: &OsStr) -> Option<PathBuf> {
    let p = Path::new(prog);
    if p.components().count() > 1 {
        return is_executable(p).then(|| p.to_path_buf());
    }
    let path = std::env::var_os("PATH")?;
    for dir in std::env::split_paths(&path) {
        for cand in candidates(&dir, prog) {
            if is_executable(&cand) {
                return Some(cand);
            }
        }
    }
    None
}

fn candidates(dir: &Path, prog: &OsStr) -> Vec<PathBuf> {
    let mut out = vec![dir.join(prog)];
    if cfg!(windows) && Path::new(prog).extension().is_none() {
        let mut with_ext = prog.to_os_string();
        with_ext.push(".exe");
        out.push(dir.join(with_ext));
    }
    out
}

fn is_executable(path: &Path) -> bool {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt as _;
        if let Ok(meta) = std::fs::metadata(path) {
            return meta.is_file() && meta.permissions().mode() & 0o111 != 0;
        }
        false
    }
    #[cfg(not(unix))]
    {
        path.is_file()
    }
}
