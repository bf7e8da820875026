use std::io::Write as _;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;

use embed_contracts::EMBED_HARNESS_REPORT_SCHEMA_VERSION;
use embed_harness::scenario::find_scenario;
use embed_harness::{builtin_scenarios, run_all, HarnessConfig, PlatformTable, Session};

#[derive(Parser)]
#[command(name = "embed-harness")]
#[command(about = "Build and verify embedded binding scenarios.", long_about = None)]
struct Cli {
    /// Directory holding generator scripts, driver sources and the shared header.
    #[arg(long)]
    fixtures: Option<PathBuf>,

    /// Root under which per-scenario working directories are created.
    #[arg(long)]
    work_dir: Option<PathBuf>,

    /// Interpreter used to run generator scripts.
    #[arg(long)]
    generator: Option<String>,

    /// Generator library root, prepended to the generator search path.
    #[arg(long)]
    generator_path: Option<PathBuf>,

    #[arg(long)]
    cc: Option<String>,

    #[arg(long)]
    linker: Option<String>,

    /// Scenario to run; repeatable. Defaults to all built-in scenarios.
    #[arg(long = "scenario")]
    scenarios: Vec<String>,

    /// Print the scenario catalog and exit.
    #[arg(long)]
    list: bool,
}

#[derive(Serialize)]
struct ListReport {
    schema_version: &'static str,
    scenarios: Vec<ListEntry>,
}

#[derive(Serialize)]
struct ListEntry {
    name: &'static str,
    bindings: &'static [&'static str],
    driver: &'static str,
}

fn main() -> std::process::ExitCode {
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .try_init();

    match try_main() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{err:#}");
            std::process::ExitCode::from(2)
        }
    }
}

fn try_main() -> Result<std::process::ExitCode> {
    let cli = Cli::parse();

    if cli.list {
        let doc = ListReport {
            schema_version: EMBED_HARNESS_REPORT_SCHEMA_VERSION,
            scenarios: builtin_scenarios()
                .into_iter()
                .map(|s| ListEntry {
                    name: s.name,
                    bindings: s.bindings,
                    driver: s.driver,
                })
                .collect(),
        };
        write_json(&doc)?;
        return Ok(std::process::ExitCode::SUCCESS);
    }

    let specs = if cli.scenarios.is_empty() {
        builtin_scenarios()
    } else {
        let mut specs = Vec::with_capacity(cli.scenarios.len());
        for name in &cli.scenarios {
            let spec = find_scenario(name)
                .with_context(|| format!("unknown scenario: {name:?} (see --list)"))?;
            specs.push(spec);
        }
        specs
    };

    let table = PlatformTable::host()?;
    let mut config = HarnessConfig::from_env(table);
    if let Some(dir) = cli.fixtures {
        config.fixtures_dir = dir;
    }
    if let Some(dir) = cli.work_dir {
        config.work_root = dir;
    }
    if let Some(program) = cli.generator {
        config.generator.program = program.into();
    }
    if let Some(root) = cli.generator_path {
        config.generator.search_root = Some(root);
    }
    if let Some(cc) = cli.cc {
        config.toolchain.cc = cc.into();
    }
    if let Some(linker) = cli.linker {
        config.toolchain.linker = linker.into();
    }

    let mut session = Session::system(config)?;
    let report = run_all(&mut session, &specs);
    write_json(&report)?;

    Ok(if report.ok {
        std::process::ExitCode::SUCCESS
    } else {
        std::process::ExitCode::from(1)
    })
}

fn write_json<T: Serialize>(doc: &T) -> Result<()> {
    let mut bytes = serde_json::to_vec(doc)?;
    bytes.push(b'\n');
    std::io::stdout()
        .write_all(&bytes)
        .context("write stdout")?;
    Ok(())
}
