//! Shared, version-pinned identifiers.
//!
//! These constants are the single source of truth for the names that appear in
//! machine-readable harness output and in the environment the harness reads.

pub const EMBED_HARNESS_REPORT_SCHEMA_VERSION: &str = "embed-harness.report@0.1.0";

pub const ENV_GENERATOR: &str = "EMBED_GENERATOR";
pub const ENV_GENERATOR_PATH: &str = "EMBED_GENERATOR_PATH";
pub const ENV_CC: &str = "EMBED_CC";
pub const ENV_LINKER: &str = "EMBED_LINKER";
pub const ENV_CC_ARGS: &str = "EMBED_CC_ARGS";
pub const ENV_WORK_DIR: &str = "EMBED_WORK_DIR";

/// Search-path variable the generator interpreter reads its import roots from.
pub const GENERATOR_SEARCH_PATH_VAR: &str = "PYTHONPATH";
pub const GENERATOR_SCRIPT_EXT: &str = "py";

/// Marker the generator prints on stdout, followed by the produced library path.
pub const ARTIFACT_MARKER: &str = "FILENAME: ";
pub const DEFAULT_ARTIFACT_TAG: &str = "_cffi";

pub const SHARED_HEADER: &str = "thread-test.h";
pub const PROBE_SCRIPT: &str = "probe";

/// Parent of every per-scenario working directory under the work root.
pub const SCENARIO_DIR_PARENT: &str = "embedding";
