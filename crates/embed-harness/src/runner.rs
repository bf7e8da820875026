use std::path::Path;

use anyhow::Result;
use tracing::info;

use crate::binding::generator_env;
use crate::config::GeneratorConfig;
use crate::error::HarnessError;
use crate::platform::PlatformTable;
use crate::process::{CommandSpec, ProcessRunner};
use crate::util::prepended_search_path;

/// Launches produced executables from their build directory.
pub struct ExecutableRunner<'a> {
    pub runner: &'a dyn ProcessRunner,
    pub generator: &'a GeneratorConfig,
    pub table: &'static PlatformTable,
}

impl ExecutableRunner<'_> {
    pub fn command(&self, dir: &Path, name: &str) -> Result<CommandSpec> {
        let mut spec = CommandSpec::new(self.table.invocation(dir, name), dir);
        if let Some((k, v)) = generator_env(self.generator)? {
            spec = spec.env(k, v);
        }
        let existing = std::env::var_os(self.table.lib_path_var);
        let lib_path = prepended_search_path(existing.as_deref(), dir)?;
        Ok(spec.env(self.table.lib_path_var, lib_path))
    }

    /// Run `name` in `dir` and return its complete stdout. A non-zero exit is
    /// an [`HarnessError::Execution`].
    pub fn execute(&self, dir: &Path, name: &str) -> Result<String> {
        let spec = self.command(dir, name)?;
        info!(executable = name, dir = %dir.display(), "running");
        let out = self.runner.run(&spec)?;
        if !out.success() {
            return Err(HarnessError::Execution {
                scenario: name.to_string(),
                exit_code: out.exit_status,
            }
            .into());
        }
        Ok(out.stdout_text())
    }
}
