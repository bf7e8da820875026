use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{Context, Result};
use embed_contracts::SCENARIO_DIR_PARENT;

use crate::error::HarnessError;

/// Resolves per-scenario working directories and shared fixture files.
#[derive(Debug)]
pub struct ArtifactLocator {
    work_root: PathBuf,
    fixtures_dir: PathBuf,
    session_root: Option<PathBuf>,
    claimed: BTreeSet<String>,
}

impl ArtifactLocator {
    pub fn new(work_root: impl Into<PathBuf>, fixtures_dir: impl Into<PathBuf>) -> Self {
        ArtifactLocator {
            work_root: work_root.into(),
            fixtures_dir: fixtures_dir.into(),
            session_root: None,
            claimed: BTreeSet::new(),
        }
    }

    pub fn fixtures_dir(&self) -> &Path {
        &self.fixtures_dir
    }

    /// `<work>/session-<pid>-<n>`, created on first use. No other locator,
    /// in this process or another, gets the same directory.
    pub fn session_root(&mut self) -> Result<PathBuf> {
        if let Some(root) = &self.session_root {
            return Ok(root.clone());
        }
        let root = create_session_root(&self.work_root)?;
        self.session_root = Some(root.clone());
        Ok(root)
    }

    /// `<session>/embedding`, created on demand.
    pub fn embedding_root(&mut self) -> Result<PathBuf> {
        let dir = self.session_root()?.join(SCENARIO_DIR_PARENT);
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("create embedding dir: {}", dir.display()))?;
        Ok(dir)
    }

    /// Working directory for `scenario`. Each name can be claimed once per
    /// locator, so two scenarios never write into the same directory.
    pub fn claim(&mut self, scenario: &str) -> Result<PathBuf> {
        ensure_single_component(scenario)?;
        if self.claimed.contains(scenario) {
            return Err(HarnessError::DirectoryClaimed {
                name: scenario.to_string(),
            }
            .into());
        }
        let dir = self.embedding_root()?.join(scenario);
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("create scenario dir: {}", dir.display()))?;
        self.claimed.insert(scenario.to_string());
        Ok(dir)
    }

    pub fn fixture(&self, file_name: &str) -> Result<PathBuf> {
        let path = self.fixtures_dir.join(file_name);
        if !path.is_file() {
            anyhow::bail!("missing fixture: {}", path.display());
        }
        Ok(path)
    }

    /// Copy a fixture into `dir`, returning the copy's path.
    pub fn stage_fixture(&self, file_name: &str, dir: &Path) -> Result<PathBuf> {
        let src = self.fixture(file_name)?;
        let dst = dir.join(file_name);
        std::fs::copy(&src, &dst)
            .with_context(|| format!("copy fixture {} to {}", src.display(), dst.display()))?;
        Ok(dst)
    }
}

fn create_session_root(work_root: &Path) -> Result<PathBuf> {
    static SESSION_COUNTER: AtomicU64 = AtomicU64::new(0);

    std::fs::create_dir_all(work_root)
        .with_context(|| format!("create work root: {}", work_root.display()))?;
    let pid = std::process::id();
    loop {
        let n = SESSION_COUNTER.fetch_add(1, Ordering::Relaxed);
        let dir = work_root.join(format!("session-{pid}-{n}"));
        match std::fs::create_dir(&dir) {
            Ok(()) => return Ok(dir),
            // Left behind by an earlier process with the same pid.
            Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => continue,
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("create session dir: {}", dir.display()))
            }
        }
    }
}

fn ensure_single_component(name: &str) -> Result<()> {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(c)), None) if c == name => Ok(()),
        _ => Err(HarnessError::InvalidScenarioName {
            name: name.to_string(),
        }
        .into()),
    }
}
