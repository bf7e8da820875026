use std::ffi::OsString;
use std::path::PathBuf;

use embed_contracts::{
    DEFAULT_ARTIFACT_TAG, ENV_CC, ENV_CC_ARGS, ENV_GENERATOR, ENV_GENERATOR_PATH, ENV_LINKER,
    ENV_WORK_DIR, GENERATOR_SCRIPT_EXT, GENERATOR_SEARCH_PATH_VAR, PROBE_SCRIPT, SHARED_HEADER,
};

use crate::platform::PlatformTable;

/// How binding-generation scripts are executed.
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// Interpreter the scripts are handed to.
    pub program: OsString,
    pub script_ext: String,
    pub search_path_var: String,
    /// Root of the generator library under test. Prepended to
    /// `search_path_var` so it wins over any globally installed copy.
    pub search_root: Option<PathBuf>,
    /// Fixture script used by the environment probe, without extension.
    pub probe_script: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ToolchainConfig {
    pub cc: OsString,
    pub linker: OsString,
    /// Appended to every link invocation.
    pub extra_link_args: Vec<String>,
    /// Copied next to every driver source.
    pub shared_header: String,
}

#[derive(Debug, Clone)]
pub struct HarnessConfig {
    pub fixtures_dir: PathBuf,
    pub work_root: PathBuf,
    pub artifact_tag: String,
    pub generator: GeneratorConfig,
    pub toolchain: ToolchainConfig,
}

impl HarnessConfig {
    /// Built-in defaults, with no environment consulted.
    pub fn defaults(table: &PlatformTable) -> Self {
        let interpreter = if cfg!(windows) { "python" } else { "python3" };
        HarnessConfig {
            fixtures_dir: default_fixtures_dir(),
            work_root: std::env::temp_dir().join("embed-harness"),
            artifact_tag: DEFAULT_ARTIFACT_TAG.to_string(),
            generator: GeneratorConfig {
                program: OsString::from(interpreter),
                script_ext: GENERATOR_SCRIPT_EXT.to_string(),
                search_path_var: GENERATOR_SEARCH_PATH_VAR.to_string(),
                search_root: None,
                probe_script: Some(PROBE_SCRIPT.to_string()),
            },
            toolchain: ToolchainConfig {
                cc: OsString::from(table.default_cc),
                linker: OsString::from(table.default_linker),
                extra_link_args: Vec::new(),
                shared_header: SHARED_HEADER.to_string(),
            },
        }
    }

    /// Defaults overlaid with the `EMBED_*` environment variables.
    pub fn from_env(table: &PlatformTable) -> Self {
        let mut cfg = Self::defaults(table);
        cfg.apply_env(|k| std::env::var_os(k));
        cfg
    }

    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<OsString>,
    {
        let non_empty = |k: &str| lookup(k).filter(|v| !v.is_empty());

        if let Some(v) = non_empty(ENV_GENERATOR) {
            self.generator.program = v;
        }
        if let Some(v) = non_empty(ENV_GENERATOR_PATH) {
            self.generator.search_root = Some(PathBuf::from(v));
        }
        if let Some(v) = non_empty(ENV_CC) {
            self.toolchain.cc = v;
        }
        if let Some(v) = non_empty(ENV_LINKER) {
            self.toolchain.linker = v;
        }
        if let Some(v) = non_empty(ENV_CC_ARGS) {
            self.toolchain.extra_link_args = v
                .to_string_lossy()
                .split_whitespace()
                .map(str::to_string)
                .collect();
        }
        if let Some(v) = non_empty(ENV_WORK_DIR) {
            self.work_root = PathBuf::from(v);
        }
    }
}

fn default_fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")
}
