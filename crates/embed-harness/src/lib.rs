//! Build-and-verify harness for embedded binding libraries.
//!
//! A scenario generates one or more binding libraries with an external
//! generator, compiles a C driver against them, runs the driver with the
//! libraries on the dynamic-library search path and compares its stdout with
//! an expected transcript.

pub mod binding;
pub mod config;
pub mod error;
pub mod locator;
pub mod platform;
pub mod probe;
pub mod process;
pub mod runner;
pub mod scenario;
pub mod session;
pub mod toolchain;
pub mod transcript;
pub mod util;

pub use binding::{BindingArtifact, BindingCache};
pub use config::HarnessConfig;
pub use error::HarnessError;
pub use platform::{HostPlatform, PlatformTable};
pub use probe::Availability;
pub use process::{CommandSpec, ProcOutput, ProcessRunner, SystemRunner};
pub use scenario::{builtin_scenarios, run_all, run_scenario, HarnessReport, ScenarioSpec};
pub use session::{Scenario, Session};
pub use toolchain::BuildOptions;
