use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::Result;
use regex::Regex;
use serde::Serialize;
use tracing::{debug, info};

use embed_contracts::ARTIFACT_MARKER;

use crate::config::GeneratorConfig;
use crate::error::HarnessError;
use crate::process::{CommandSpec, ProcessRunner};
use crate::util::prefixed_search_path;

static ARTIFACT_MARKER_RE: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(&artifact_marker_pattern()));

fn artifact_marker_pattern() -> String {
    format!(r"\b{}(.+)", regex::escape(ARTIFACT_MARKER))
}

/// A dynamic library produced by one generation script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BindingArtifact {
    pub name: String,
    pub script: PathBuf,
    pub library: PathBuf,
}

/// Produced libraries, keyed by binding name. Owned by the session and
/// shared by every scenario it starts.
#[derive(Debug, Default)]
pub struct BindingCache {
    entries: BTreeMap<String, BindingArtifact>,
}

impl BindingCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&BindingArtifact> {
        self.entries.get(name)
    }

    pub fn insert(&mut self, artifact: BindingArtifact) -> &BindingArtifact {
        let name = artifact.name.clone();
        self.entries.entry(name).or_insert(artifact)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Runs binding-generation scripts and validates what they produce.
pub struct BindingCompiler<'a> {
    pub runner: &'a dyn ProcessRunner,
    pub generator: &'a GeneratorConfig,
    pub fixtures_dir: &'a Path,
    /// e.g. `_cffi.so`.
    pub expected_suffix: String,
}

impl BindingCompiler<'_> {
    pub fn script_path(&self, name: &str) -> PathBuf {
        self.fixtures_dir
            .join(format!("{name}.{}", self.generator.script_ext))
    }

    /// Return the cached artifact for `name`, generating it in `cwd` on the
    /// first request.
    pub fn prepare(
        &self,
        cache: &mut BindingCache,
        cwd: &Path,
        name: &str,
    ) -> Result<BindingArtifact> {
        if let Some(hit) = cache.get(name) {
            debug!(binding = name, library = %hit.library.display(), "binding cache hit");
            return Ok(hit.clone());
        }

        let script = self.script_path(name);
        if !script.is_file() {
            anyhow::bail!("missing binding script: {}", script.display());
        }

        let mut spec = CommandSpec::new(self.generator.program.clone(), cwd).arg(&script);
        if let Some((k, v)) = generator_env(self.generator)? {
            spec = spec.env(k, v);
        }

        let out = self.runner.run(&spec)?;
        if !out.success() {
            return Err(HarnessError::Subprocess {
                command: spec.display(),
                exit_code: out.exit_status,
            }
            .into());
        }

        let text = out.combined_text();
        let Some(reported) = parse_artifact_marker(&text)? else {
            return Err(HarnessError::MissingArtifactMarker {
                binding: name.to_string(),
            }
            .into());
        };
        check_artifact_suffix(name, &reported, &self.expected_suffix)?;

        let library = if reported.is_absolute() {
            reported
        } else {
            cwd.join(reported)
        };
        info!(binding = name, library = %library.display(), "binding prepared");

        let artifact = BindingArtifact {
            name: name.to_string(),
            script,
            library,
        };
        Ok(cache.insert(artifact).clone())
    }
}

/// Search-path override handed to the generator and to produced executables,
/// so the generator library under test is found before any installed copy.
pub fn generator_env(generator: &GeneratorConfig) -> Result<Option<(OsString, OsString)>> {
    let Some(root) = &generator.search_root else {
        return Ok(None);
    };
    let existing = std::env::var_os(&generator.search_path_var);
    let value = prefixed_search_path(existing.as_deref(), root)?;
    Ok(Some((OsString::from(&generator.search_path_var), value)))
}

/// Path following the first `FILENAME: ` marker, if any.
pub fn parse_artifact_marker(output: &str) -> Result<Option<PathBuf>> {
    let re = ARTIFACT_MARKER_RE
        .as_ref()
        .map_err(|err| anyhow::anyhow!("artifact marker regex: {err}"))?;
    let Some(caps) = re.captures(output) else {
        return Ok(None);
    };
    let path = caps.get(1).map_or("", |m| m.as_str()).trim_end();
    if path.is_empty() {
        return Ok(None);
    }
    Ok(Some(PathBuf::from(path)))
}

pub fn check_artifact_suffix(binding: &str, path: &Path, expected: &str) -> Result<()> {
    let ok = path
        .to_str()
        .is_some_and(|p| p.ends_with(expected));
    if ok {
        return Ok(());
    }
    Err(HarnessError::ArtifactSuffix {
        binding: binding.to_string(),
        path: path.to_path_buf(),
        expected: expected.to_string(),
    }
    .into())
}
