use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::info;

use crate::config::ToolchainConfig;
use crate::error::HarnessError;
use crate::locator::ArtifactLocator;
use crate::platform::{PlatformTable, ToolchainFlavor};
use crate::process::{CommandSpec, ProcessRunner};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildOptions {
    pub optimize: bool,
    pub threads: bool,
    /// `NAME` or `NAME=VALUE`. Emitted sorted by name.
    pub defines: BTreeMap<String, Option<String>>,
}

impl BuildOptions {
    pub fn define(mut self, name: impl Into<String>, value: Option<&str>) -> Self {
        self.defines.insert(name.into(), value.map(str::to_string));
        self
    }
}

/// Compiles one driver source and links it against binding libraries.
pub struct NativeCompiler<'a> {
    pub runner: &'a dyn ProcessRunner,
    pub toolchain: &'a ToolchainConfig,
    pub table: &'static PlatformTable,
}

impl NativeCompiler<'_> {
    /// Copy `<name>.c` and the shared header into `dir`, compile, and link the
    /// executable `<name>`. Returns the executable's path.
    pub fn build(
        &self,
        locator: &ArtifactLocator,
        dir: &Path,
        name: &str,
        libraries: &[PathBuf],
        options: &BuildOptions,
    ) -> Result<PathBuf> {
        let source = format!("{name}.c");
        locator.stage_fixture(&source, dir)?;
        locator.stage_fixture(&self.toolchain.shared_header, dir)?;

        info!(executable = name, libraries = ?libraries, "compiling");

        let object = format!("{name}.{}", self.table.object_ext);
        let compile = CommandSpec::new(self.toolchain.cc.clone(), dir)
            .args(compile_args(self.table, &source, &object, options));
        self.run_step("compile", &compile)?;

        let mut link_refs = Vec::with_capacity(libraries.len());
        for lib in libraries {
            link_refs.push(self.table.link_reference(lib)?);
        }
        let exe = self.table.executable_path(dir, name);
        let link = CommandSpec::new(self.linker(), dir).args(link_args(
            self.table,
            &object,
            &link_refs,
            &exe,
            options,
            &self.toolchain.extra_link_args,
        ));
        self.run_step("link", &link)?;

        if !exe.is_file() {
            anyhow::bail!("linker reported success but produced no {}", exe.display());
        }
        Ok(exe)
    }

    fn linker(&self) -> OsString {
        self.toolchain.linker.clone()
    }

    fn run_step(&self, step: &'static str, spec: &CommandSpec) -> Result<()> {
        let out = self
            .runner
            .run(spec)
            .with_context(|| format!("invoke {step}: {}", spec.display()))?;
        if out.success() {
            return Ok(());
        }
        Err(HarnessError::Toolchain {
            step,
            command: spec.display(),
            exit_code: out.exit_status,
            stderr: out.combined_text(),
        }
        .into())
    }
}

pub fn define_args(table: &PlatformTable, defines: &BTreeMap<String, Option<String>>) -> Vec<String> {
    let flag = match table.flavor {
        ToolchainFlavor::Unix => "-D",
        ToolchainFlavor::Msvc => "/D",
    };
    defines
        .iter()
        .map(|(k, v)| match v {
            Some(v) => format!("{flag}{k}={v}"),
            None => format!("{flag}{k}"),
        })
        .collect()
}

/// Object compile. Debug info is always on.
pub fn compile_args(
    table: &PlatformTable,
    source: &str,
    object: &str,
    options: &BuildOptions,
) -> Vec<String> {
    let mut args: Vec<String> = Vec::new();
    match table.flavor {
        ToolchainFlavor::Unix => {
            args.push("-c".to_string());
            args.push("-g".to_string());
            if options.optimize {
                args.push("-O2".to_string());
            }
        }
        ToolchainFlavor::Msvc => {
            args.push("/nologo".to_string());
            args.push("/c".to_string());
            args.push("/Zi".to_string());
            if options.optimize {
                args.push("/Ox".to_string());
            }
        }
    }
    if options.threads {
        args.extend(table.thread_args.iter().map(|s| s.to_string()));
    }
    args.extend(define_args(table, &options.defines));
    args.push(source.to_string());
    match table.flavor {
        ToolchainFlavor::Unix => {
            args.push("-o".to_string());
            args.push(object.to_string());
        }
        ToolchainFlavor::Msvc => args.push(format!("/Fo{object}")),
    }
    args
}

pub fn link_args(
    table: &PlatformTable,
    object: &str,
    libraries: &[PathBuf],
    exe: &Path,
    options: &BuildOptions,
    extra: &[String],
) -> Vec<String> {
    let mut args: Vec<String> = Vec::new();
    if table.flavor == ToolchainFlavor::Msvc {
        args.push("/nologo".to_string());
        args.push("/DEBUG".to_string());
    }
    args.extend(table.link_preargs.iter().map(|s| s.to_string()));
    if options.threads {
        args.extend(table.thread_args.iter().map(|s| s.to_string()));
    }
    args.push(object.to_string());
    args.extend(libraries.iter().map(|l| l.display().to_string()));
    args.extend(extra.iter().cloned());
    match table.flavor {
        ToolchainFlavor::Unix => {
            args.push("-o".to_string());
            args.push(exe.display().to_string());
        }
        ToolchainFlavor::Msvc => args.push(format!("/OUT:{}", exe.display())),
    }
    args
}
