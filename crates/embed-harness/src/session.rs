use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::{debug, info};

use crate::binding::{BindingArtifact, BindingCache, BindingCompiler};
use crate::config::HarnessConfig;
use crate::error::HarnessError;
use crate::locator::ArtifactLocator;
use crate::platform::PlatformTable;
use crate::probe::{probe_environment, Availability};
use crate::process::{ProcessRunner, SystemRunner};
use crate::runner::ExecutableRunner;
use crate::toolchain::{BuildOptions, NativeCompiler};

/// Owns everything that outlives a single scenario: configuration, the
/// platform table, the subprocess runner, the binding cache and the memoized
/// environment probe.
pub struct Session {
    config: HarnessConfig,
    table: &'static PlatformTable,
    runner: Box<dyn ProcessRunner>,
    cache: BindingCache,
    locator: ArtifactLocator,
    availability: Option<Availability>,
}

impl Session {
    pub fn new(
        config: HarnessConfig,
        table: &'static PlatformTable,
        runner: Box<dyn ProcessRunner>,
    ) -> Self {
        let locator = ArtifactLocator::new(&config.work_root, &config.fixtures_dir);
        Session {
            config,
            table,
            runner,
            cache: BindingCache::new(),
            locator,
            availability: None,
        }
    }

    /// A session on the host platform driving real subprocesses.
    pub fn system(config: HarnessConfig) -> Result<Self> {
        Ok(Self::new(config, PlatformTable::host()?, Box::new(SystemRunner)))
    }

    /// Record the environment as already probed.
    pub fn with_availability(mut self, availability: Availability) -> Self {
        self.availability = Some(availability);
        self
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    pub fn table(&self) -> &'static PlatformTable {
        self.table
    }

    pub fn cache(&self) -> &BindingCache {
        &self.cache
    }

    /// This session's private directory under the work root. Scenario
    /// directories live below it.
    pub fn session_dir(&mut self) -> Result<PathBuf> {
        self.locator.session_root()
    }

    /// Probe once per session; later calls return the memoized answer.
    pub fn availability(&mut self) -> Result<&Availability> {
        if self.availability.is_none() {
            let dir = self.locator.embedding_root()?;
            let probed = probe_environment(&self.config, self.runner.as_ref(), &dir);
            self.availability = Some(probed);
        }
        self.availability
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("internal error: availability not recorded"))
    }

    /// Start `name`: fail with [`HarnessError::Unavailable`] if the
    /// environment cannot embed, otherwise claim a fresh working directory.
    pub fn begin(&mut self, name: &str) -> Result<Scenario<'_>> {
        if let Availability::Unavailable { reason } = self.availability()? {
            return Err(HarnessError::Unavailable {
                reason: reason.clone(),
            }
            .into());
        }
        if self.table.clears_bindings_per_scenario && !self.cache.is_empty() {
            debug!(entries = self.cache.len(), "clearing binding cache");
            self.cache.clear();
        }
        let dir = self.locator.claim(name)?;
        info!(scenario = name, dir = %dir.display(), "scenario started");
        Ok(Scenario {
            session: self,
            name: name.to_string(),
            dir,
            bindings: Vec::new(),
            executable: None,
        })
    }
}

/// One scenario's view of the session, bound to its working directory.
pub struct Scenario<'s> {
    session: &'s mut Session,
    name: String,
    dir: PathBuf,
    bindings: Vec<BindingArtifact>,
    executable: Option<PathBuf>,
}

impl Scenario<'_> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Bindings prepared so far, in request order.
    pub fn bindings(&self) -> &[BindingArtifact] {
        &self.bindings
    }

    pub fn executable(&self) -> Option<&Path> {
        self.executable.as_deref()
    }

    /// Generate (or fetch from the cache) the library for `binding`.
    pub fn prepare_module(&mut self, binding: &str) -> Result<PathBuf> {
        let s = &mut *self.session;
        let compiler = BindingCompiler {
            runner: s.runner.as_ref(),
            generator: &s.config.generator,
            fixtures_dir: s.locator.fixtures_dir(),
            expected_suffix: s.table.artifact_suffix(&s.config.artifact_tag),
        };
        let artifact = compiler.prepare(&mut s.cache, &self.dir, binding)?;
        let library = artifact.library.clone();
        if !self.bindings.iter().any(|b| b.name == artifact.name) {
            self.bindings.push(artifact);
        }
        Ok(library)
    }

    pub fn compile(
        &mut self,
        name: &str,
        libraries: &[PathBuf],
        options: &BuildOptions,
    ) -> Result<PathBuf> {
        let s = &*self.session;
        let compiler = NativeCompiler {
            runner: s.runner.as_ref(),
            toolchain: &s.config.toolchain,
            table: s.table,
        };
        let exe = compiler.build(&s.locator, &self.dir, name, libraries, options)?;
        self.executable = Some(exe.clone());
        Ok(exe)
    }

    pub fn execute(&self, name: &str) -> Result<String> {
        let s = &*self.session;
        let runner = ExecutableRunner {
            runner: s.runner.as_ref(),
            generator: &s.config.generator,
            table: s.table,
        };
        runner.execute(&self.dir, name)
    }
}
