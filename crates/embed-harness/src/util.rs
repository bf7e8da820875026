use std::ffi::{OsStr, OsString};
use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};

pub fn sha256_file(path: &Path) -> Result<String> {
    let mut f =
        std::fs::File::open(path).with_context(|| format!("open for digest: {}", path.display()))?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = f
            .read(&mut buf)
            .with_context(|| format!("read for digest: {}", path.display()))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex_lower(&hasher.finalize()))
}

pub fn hex_lower(bytes: &[u8]) -> String {
    const LUT: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for &b in bytes {
        out.push(LUT[(b >> 4) as usize] as char);
        out.push(LUT[(b & 0x0F) as usize] as char);
    }
    out
}

/// `entry` followed by the entries of `existing`, unless `existing` already
/// lists it.
pub fn prefixed_search_path(existing: Option<&OsStr>, entry: &Path) -> Result<OsString> {
    let mut paths: Vec<std::path::PathBuf> = existing
        .map(|v| std::env::split_paths(v).filter(|p| !p.as_os_str().is_empty()).collect())
        .unwrap_or_default();
    if !paths.iter().any(|p| p == entry) {
        paths.insert(0, entry.to_path_buf());
    }
    std::env::join_paths(paths)
        .with_context(|| format!("join search path with {}", entry.display()))
}

/// `entry` always first, then `existing` if non-empty.
pub fn prepended_search_path(existing: Option<&OsStr>, entry: &Path) -> Result<OsString> {
    let mut paths = vec![entry.to_path_buf()];
    if let Some(v) = existing {
        paths.extend(std::env::split_paths(v).filter(|p| !p.as_os_str().is_empty()));
    }
    std::env::join_paths(paths)
        .with_context(|| format!("join search path with {}", entry.display()))
}
