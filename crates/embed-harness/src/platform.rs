use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::Serialize;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum HostPlatform {
    Linux,
    MacOS,
    Windows,
}

impl HostPlatform {
    pub fn as_str(self) -> &'static str {
        match self {
            HostPlatform::Linux => "linux",
            HostPlatform::MacOS => "macos",
            HostPlatform::Windows => "windows",
        }
    }
}

/// Which argument dialect the native toolchain speaks.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ToolchainFlavor {
    /// `cc`-style driver: `-c`, `-g`, `-D`, `-o`.
    Unix,
    /// `cl.exe` + `link.exe`.
    Msvc,
}

/// How the produced executable is named on the command line.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ExecForm {
    /// `./name`, resolved against the working directory.
    DotRelative,
    /// `<dir>/name.exe`.
    Absolute,
}

/// Everything that differs between hosts, resolved once at startup.
#[derive(Debug)]
pub struct PlatformTable {
    pub platform: HostPlatform,
    pub dylib_ext: &'static str,
    pub exe_ext: &'static str,
    pub object_ext: &'static str,
    pub lib_path_var: &'static str,
    pub flavor: ToolchainFlavor,
    pub default_cc: &'static str,
    pub default_linker: &'static str,
    pub thread_args: &'static [&'static str],
    pub link_preargs: &'static [&'static str],
    /// Libraries are linked through import libraries found here.
    pub import_lib_dir: Option<&'static str>,
    /// Stale libraries collide across scenarios on these hosts.
    pub clears_bindings_per_scenario: bool,
    pub exec_form: ExecForm,
}

const LINUX: PlatformTable = PlatformTable {
    platform: HostPlatform::Linux,
    dylib_ext: ".so",
    exe_ext: "",
    object_ext: "o",
    lib_path_var: "LD_LIBRARY_PATH",
    flavor: ToolchainFlavor::Unix,
    default_cc: "cc",
    default_linker: "cc",
    thread_args: &["-pthread"],
    link_preargs: &[],
    import_lib_dir: None,
    clears_bindings_per_scenario: false,
    exec_form: ExecForm::DotRelative,
};

const MACOS: PlatformTable = PlatformTable {
    platform: HostPlatform::MacOS,
    dylib_ext: ".dylib",
    exe_ext: "",
    object_ext: "o",
    lib_path_var: "DYLD_LIBRARY_PATH",
    flavor: ToolchainFlavor::Unix,
    default_cc: "cc",
    default_linker: "cc",
    thread_args: &["-pthread"],
    link_preargs: &[],
    import_lib_dir: None,
    clears_bindings_per_scenario: true,
    exec_form: ExecForm::DotRelative,
};

const WINDOWS: PlatformTable = PlatformTable {
    platform: HostPlatform::Windows,
    dylib_ext: ".dll",
    exe_ext: "exe",
    object_ext: "obj",
    lib_path_var: "PATH",
    flavor: ToolchainFlavor::Msvc,
    default_cc: "cl",
    default_linker: "link",
    thread_args: &[],
    link_preargs: &["/MANIFEST"],
    import_lib_dir: Some("Release"),
    clears_bindings_per_scenario: true,
    exec_form: ExecForm::Absolute,
};

impl PlatformTable {
    pub fn for_platform(platform: HostPlatform) -> &'static PlatformTable {
        match platform {
            HostPlatform::Linux => &LINUX,
            HostPlatform::MacOS => &MACOS,
            HostPlatform::Windows => &WINDOWS,
        }
    }

    pub fn host() -> Result<&'static PlatformTable> {
        Ok(Self::for_platform(host_platform()?))
    }

    /// Suffix every produced binding library must carry, e.g. `_cffi.so`.
    pub fn artifact_suffix(&self, tag: &str) -> String {
        format!("{tag}{}", self.dylib_ext)
    }

    pub fn executable_path(&self, dir: &Path, name: &str) -> PathBuf {
        if self.exe_ext.is_empty() {
            return dir.join(name);
        }
        dir.join(format!("{name}.{}", self.exe_ext))
    }

    /// Program argument used to launch `name` from inside `dir`.
    pub fn invocation(&self, dir: &Path, name: &str) -> PathBuf {
        match self.exec_form {
            ExecForm::DotRelative => Path::new(".").join(name),
            ExecForm::Absolute => self.executable_path(dir, name),
        }
    }

    /// Translate a dynamic library into what the linker is handed.
    ///
    /// On hosts with import libraries `_add1_cffi.dll` becomes
    /// `Release\_add1_cffi.lib`; elsewhere the library is linked directly.
    pub fn link_reference(&self, library: &Path) -> Result<PathBuf> {
        let Some(dir) = self.import_lib_dir else {
            return Ok(library.to_path_buf());
        };
        let file_name = library
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| anyhow::anyhow!("library path has no file name: {}", library.display()))?;
        let Some(stem) = file_name.strip_suffix(self.dylib_ext) else {
            anyhow::bail!(
                "library {} does not end in {}",
                library.display(),
                self.dylib_ext
            );
        };
        Ok(Path::new(dir).join(format!("{stem}.lib")))
    }
}

pub fn host_platform() -> Result<HostPlatform> {
    if cfg!(target_os = "linux") {
        return Ok(HostPlatform::Linux);
    }
    if cfg!(target_os = "macos") {
        return Ok(HostPlatform::MacOS);
    }
    if cfg!(windows) {
        return Ok(HostPlatform::Windows);
    }
    anyhow::bail!("unsupported host platform");
}
