//! Locating the packaged engine library for the running platform.
//!
//! Each supported platform maps to exactly one artifact path relative to the engine directory.
//! The engine directory is `$FLIPT_ENGINE_DIR` when set, or `ext/` next to the running executable.
use std::{
    ffi::OsString,
    path::{Path, PathBuf},
    sync::OnceLock,
};

use crate::{Error, Result};

/// Environment variable overriding the directory that holds packaged engine libraries.
pub const ENGINE_DIR_ENV: &str = "FLIPT_ENGINE_DIR";

/// A platform with a packaged build of the native engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    /// macOS on Intel.
    DarwinX86_64,
    /// macOS on Apple silicon.
    DarwinAarch64,
    /// glibc Linux on x86-64.
    LinuxX86_64,
    /// glibc Linux on ARM64.
    LinuxAarch64,
    /// Statically-linked (MUSL) Linux on x86-64.
    LinuxMuslX86_64,
    /// Statically-linked (MUSL) Linux on ARM64.
    LinuxMuslAarch64,
    /// Windows on x86-64.
    WindowsX86_64,
}

impl Platform {
    /// Detect the platform this binary was built for.
    ///
    /// MUSL builds select the MUSL engine artifact.
    pub fn current() -> Result<Platform> {
        let platform = Platform::from_os_arch(std::env::consts::OS, std::env::consts::ARCH)?;
        if cfg!(target_env = "musl") {
            Ok(platform.musl())
        } else {
            Ok(platform)
        }
    }

    /// Map an operating system and architecture name to a platform.
    ///
    /// Accepts the spellings of [`std::env::consts`] (`linux`, `macos`, `windows`; `x86_64`,
    /// `aarch64`) as well as `darwin`, `arm64` and `amd64`.
    pub fn from_os_arch(os: &str, arch: &str) -> Result<Platform> {
        let platform = match (os.to_ascii_lowercase().as_str(), arch.to_ascii_lowercase().as_str())
        {
            ("macos" | "darwin", "x86_64" | "amd64") => Platform::DarwinX86_64,
            ("macos" | "darwin", "aarch64" | "arm64") => Platform::DarwinAarch64,
            ("linux", "x86_64" | "amd64") => Platform::LinuxX86_64,
            ("linux", "aarch64" | "arm64") => Platform::LinuxAarch64,
            ("windows", "x86_64" | "amd64") => Platform::WindowsX86_64,
            _ => {
                return Err(Error::UnsupportedPlatform {
                    os: os.to_owned(),
                    arch: arch.to_owned(),
                })
            }
        };
        Ok(platform)
    }

    /// The MUSL counterpart of a Linux platform. Other platforms are returned unchanged.
    pub fn musl(self) -> Platform {
        match self {
            Platform::LinuxX86_64 => Platform::LinuxMuslX86_64,
            Platform::LinuxAarch64 => Platform::LinuxMuslAarch64,
            other => other,
        }
    }

    /// Path of the engine artifact relative to the engine directory.
    pub fn artifact_path(self) -> &'static str {
        match self {
            Platform::DarwinX86_64 => "darwin_x86_64/libfliptengine.dylib",
            Platform::DarwinAarch64 => "darwin_aarch64/libfliptengine.dylib",
            Platform::LinuxX86_64 => "linux_x86_64/libfliptengine.so",
            Platform::LinuxAarch64 => "linux_aarch64/libfliptengine.so",
            Platform::LinuxMuslX86_64 => "linux_x86_64_musl/libfliptengine.so",
            Platform::LinuxMuslAarch64 => "linux_aarch64_musl/libfliptengine.so",
            Platform::WindowsX86_64 => "windows_x86_64/fliptengine.dll",
        }
    }
}

/// Directory holding the packaged engine libraries.
pub fn engine_dir() -> Result<PathBuf> {
    engine_dir_from(std::env::var_os(ENGINE_DIR_ENV), std::env::current_exe)
}

/// `override_dir` when set and non-empty, otherwise `ext/` next to the executable.
fn engine_dir_from(
    override_dir: Option<OsString>,
    current_exe: impl FnOnce() -> std::io::Result<PathBuf>,
) -> Result<PathBuf> {
    if let Some(dir) = override_dir.filter(|dir| !dir.is_empty()) {
        return Ok(PathBuf::from(dir));
    }

    let exe = current_exe()?;
    let base = exe.parent().unwrap_or_else(|| Path::new("."));
    Ok(base.join("ext"))
}

/// Resolve the engine library for `platform` inside `dir`, failing if the file does not exist.
pub fn resolve_library_path(dir: &Path, platform: Platform) -> Result<PathBuf> {
    let path = dir.join(platform.artifact_path());
    if !path.is_file() {
        return Err(Error::LibraryNotFound(path));
    }
    Ok(path)
}

/// Engine library path for the current platform.
///
/// Resolved once per process; later calls return the first outcome, including a failure.
pub fn default_library_path() -> Result<PathBuf> {
    static LIBRARY_PATH: OnceLock<Result<PathBuf>> = OnceLock::new();

    LIBRARY_PATH
        .get_or_init(|| {
            let platform = Platform::current()?;
            let path = resolve_library_path(&engine_dir()?, platform)?;
            log::debug!(target: "flipt", platform:?, path:?; "resolved engine library");
            Ok(path)
        })
        .clone()
}
