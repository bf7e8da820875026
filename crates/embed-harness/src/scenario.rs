use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::Serialize;
use tracing::{error, info, warn};

use embed_contracts::EMBED_HARNESS_REPORT_SCHEMA_VERSION;

use crate::error::{error_kind, HarnessError};
use crate::probe::Availability;
use crate::session::{Scenario, Session};
use crate::toolchain::BuildOptions;
use crate::transcript::assert_transcript;
use crate::util::sha256_file;

/// An end-to-end scenario: generate bindings, build a driver against them,
/// run it and compare its stdout.
#[derive(Debug, Clone)]
pub struct ScenarioSpec {
    pub name: &'static str,
    pub bindings: &'static [&'static str],
    /// Driver source `<driver>.c`; also the executable's name.
    pub driver: &'static str,
    pub optimize: bool,
    pub threads: bool,
    pub defines: &'static [(&'static str, Option<&'static str>)],
    pub expected: &'static str,
}

impl ScenarioSpec {
    pub fn build_options(&self) -> BuildOptions {
        let mut opts = BuildOptions {
            optimize: self.optimize,
            threads: self.threads,
            ..BuildOptions::default()
        };
        for (k, v) in self.defines {
            opts = opts.define(*k, *v);
        }
        opts
    }
}

pub const BASIC: ScenarioSpec = ScenarioSpec {
    name: "basic",
    bindings: &["add1"],
    driver: "add1-test",
    optimize: false,
    threads: false,
    defines: &[],
    expected: "preparing...\n\
               adding 40 and 2\n\
               adding 100 and -5\n\
               got: 42 95\n",
};

pub const TWO_MODULES: ScenarioSpec = ScenarioSpec {
    name: "two_modules",
    bindings: &["add1", "add2"],
    driver: "add2-test",
    optimize: false,
    threads: false,
    defines: &[],
    expected: "preparing...\n\
               adding 40 and 2\n\
               prepADD2\n\
               adding 100 and -5 and -20\n\
               got: 42 75\n",
};

pub fn builtin_scenarios() -> Vec<ScenarioSpec> {
    vec![BASIC, TWO_MODULES]
}

pub fn find_scenario(name: &str) -> Option<ScenarioSpec> {
    builtin_scenarios().into_iter().find(|s| s.name == name)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioStatus {
    Pass,
    Skip,
    Fail,
}

#[derive(Debug, Clone, Serialize)]
pub struct BindingReport {
    pub name: String,
    pub library: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport {
    pub name: String,
    pub status: ScenarioStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
    pub bindings: Vec<BindingReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub executable: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub passed: u64,
    pub skipped: u64,
    pub failed: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct HarnessReport {
    pub schema_version: &'static str,
    pub ok: bool,
    pub platform: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub work_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<Availability>,
    pub scenarios: Vec<ScenarioReport>,
    pub summary: Summary,
}

/// Run one scenario to completion. Every failure ends the scenario; the
/// returned report says how.
pub fn run_scenario(session: &mut Session, spec: &ScenarioSpec) -> ScenarioReport {
    let mut report = ScenarioReport {
        name: spec.name.to_string(),
        status: ScenarioStatus::Pass,
        error_kind: None,
        detail: None,
        dir: None,
        bindings: Vec::new(),
        executable: None,
    };

    let result = match session.begin(spec.name) {
        Ok(mut scenario) => {
            let result = drive(&mut scenario, spec);
            report.dir = Some(scenario.dir().to_path_buf());
            report.bindings = scenario
                .bindings()
                .iter()
                .map(|b| BindingReport {
                    name: b.name.clone(),
                    library: b.library.clone(),
                    sha256: library_digest(spec.name, &b.library),
                })
                .collect();
            report.executable = scenario.executable().map(|p| p.to_path_buf());
            result
        }
        Err(err) => Err(err),
    };

    match result {
        Ok(()) => info!(scenario = spec.name, "pass"),
        Err(err) => {
            let skip = err
                .downcast_ref::<HarnessError>()
                .is_some_and(HarnessError::is_skip);
            if skip {
                warn!(scenario = spec.name, "skip: {err:#}");
                report.status = ScenarioStatus::Skip;
            } else {
                error!(scenario = spec.name, "fail: {err:#}");
                report.status = ScenarioStatus::Fail;
            }
            report.error_kind = Some(error_kind(&err));
            report.detail = Some(format!("{err:#}"));
        }
    }
    report
}

fn library_digest(scenario: &str, library: &Path) -> Option<String> {
    match sha256_file(library) {
        Ok(digest) => Some(digest),
        Err(err) => {
            warn!(scenario, library = %library.display(), "no digest: {err:#}");
            None
        }
    }
}

fn drive(scenario: &mut Scenario<'_>, spec: &ScenarioSpec) -> Result<()> {
    let mut libraries = Vec::with_capacity(spec.bindings.len());
    for binding in spec.bindings {
        libraries.push(scenario.prepare_module(binding)?);
    }
    scenario.compile(spec.driver, &libraries, &spec.build_options())?;
    let output = scenario.execute(spec.driver)?;
    assert_transcript(spec.expected, &output)?;
    Ok(())
}

pub fn run_all(session: &mut Session, specs: &[ScenarioSpec]) -> HarnessReport {
    let mut scenarios = Vec::with_capacity(specs.len());
    let mut summary = Summary::default();
    for spec in specs {
        let report = run_scenario(session, spec);
        match report.status {
            ScenarioStatus::Pass => summary.passed += 1,
            ScenarioStatus::Skip => summary.skipped += 1,
            ScenarioStatus::Fail => summary.failed += 1,
        }
        scenarios.push(report);
    }
    HarnessReport {
        schema_version: EMBED_HARNESS_REPORT_SCHEMA_VERSION,
        ok: summary.failed == 0,
        platform: session.table().platform.as_str(),
        work_dir: session.session_dir().ok(),
        environment: session.availability().ok().cloned(),
        scenarios,
        summary,
    }
}
