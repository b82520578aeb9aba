// SPDX-License-Identifier: AGPL-3.0-or-later
// SochMQ - NATS-Compatible Message Streaming
// Copyright (C) 2026 Sushanth Reddy Vanagala (https://github.com/sushanthpy)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Server-level JetStream configuration
//!
//! The configuration is immutable once the control plane is enabled. Any
//! missing or non-positive field is filled dynamically:
//!
//! - `max_memory`: 3/4 of detected system memory, 256 MiB when detection fails
//! - `max_store`: disk available under the store directory, 1 TiB fallback
//! - `store_dir`: `<tmp>/nats/jetstream`
//!
//! System memory detection reads `/proc/meminfo` on Linux and uses
//! `sysctl hw.memsize` on macOS.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{JetStreamError, Result};

/// Directory name appended under a caller-supplied storage root.
pub const JETSTREAM_STORE_DIR: &str = "jetstream";

/// Default disk storage limit when the filesystem cannot be probed. 1 TiB.
pub const MAX_STORE_DEFAULT: i64 = 1024 * 1024 * 1024 * 1024;

/// Default memory limit when system memory cannot be determined. 256 MiB.
pub const MAX_MEMORY_DEFAULT: i64 = 256 * 1024 * 1024;

/// Server-wide JetStream configuration. Byte limits cap the resource
/// ledger's reservations across all enabled accounts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JetStreamConfig {
    #[serde(rename = "max_memory")]
    pub max_memory: i64,
    #[serde(rename = "max_storage")]
    pub max_store: i64,
    pub store_dir: PathBuf,
}

impl JetStreamConfig {
    /// Resolve an optional, possibly partial configuration into a complete
    /// one, probing the system for any missing or non-positive field.
    pub fn resolve(config: Option<JetStreamConfig>) -> JetStreamConfig {
        match config {
            Some(cfg) if cfg.max_memory > 0 && cfg.max_store > 0 => {
                let mut cfg = cfg;
                if cfg.store_dir.as_os_str().is_empty() {
                    cfg.store_dir = default_store_dir();
                }
                cfg
            }
            Some(cfg) => {
                let store_dir = if cfg.store_dir.as_os_str().is_empty() {
                    None
                } else {
                    Some(cfg.store_dir)
                };
                Self::dynamic(store_dir, cfg.max_store)
            }
            None => Self::dynamic(None, 0),
        }
    }

    /// Build a dynamic configuration from a caller-supplied storage root
    /// (gets `jetstream/` appended) and an optional storage cap.
    pub fn dynamic(store_dir: Option<PathBuf>, max_store: i64) -> JetStreamConfig {
        let store_dir = match store_dir {
            Some(dir) => dir.join(JETSTREAM_STORE_DIR),
            None => default_store_dir(),
        };
        let max_store = if max_store > 0 {
            max_store
        } else {
            disk_available(&store_dir)
        };
        Self::fill(store_dir, max_store, system_memory())
    }

    fn fill(store_dir: PathBuf, max_store: i64, sys_mem: i64) -> JetStreamConfig {
        let max_memory = if sys_mem > 0 {
            sys_mem / 4 * 3
        } else {
            MAX_MEMORY_DEFAULT
        };
        JetStreamConfig {
            max_memory,
            max_store,
            store_dir,
        }
    }
}

/// The repeatable temp-dir location used when no store directory is given.
pub fn default_store_dir() -> PathBuf {
    std::env::temp_dir().join("nats").join(JETSTREAM_STORE_DIR)
}

/// Create `path` (0755) if missing, or verify an existing path is a
/// writable directory by dropping an anonymous temp file into it.
pub fn prepare_store_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        create_dir_0755(path)?;
        return Ok(());
    }
    if !path.is_dir() {
        return Err(JetStreamError::StoreDirNotDirectory);
    }
    tempfile::tempfile_in(path).map_err(|_| JetStreamError::StoreDirNotWritable)?;
    Ok(())
}

/// Create a directory and any missing parents with 0755 permissions.
pub fn create_dir_0755(path: &Path) -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        fs::DirBuilder::new().recursive(true).mode(0o755).create(path)
    }
    #[cfg(not(unix))]
    {
        fs::create_dir_all(path)
    }
}

/// Total system memory in bytes, 0 when it cannot be determined.
pub fn system_memory() -> i64 {
    #[cfg(target_os = "linux")]
    {
        linux_total_memory().unwrap_or(0)
    }
    #[cfg(target_os = "macos")]
    {
        macos_total_memory().unwrap_or(0)
    }
    #[cfg(not(any(target_os = "linux", target_os = "macos")))]
    {
        0
    }
}

#[cfg(target_os = "linux")]
fn linux_total_memory() -> Option<i64> {
    let meminfo = fs::read_to_string("/proc/meminfo").ok()?;
    for line in meminfo.lines() {
        if let Some(rest) = line.strip_prefix("MemTotal:") {
            let kb: i64 = rest.trim().trim_end_matches(" kB").trim().parse().ok()?;
            return Some(kb * 1024);
        }
    }
    None
}

#[cfg(target_os = "macos")]
fn macos_total_memory() -> Option<i64> {
    use std::process::Command;
    let output = Command::new("sysctl")
        .args(["-n", "hw.memsize"])
        .output()
        .ok()?;
    String::from_utf8_lossy(&output.stdout).trim().parse().ok()
}

/// Bytes available to unprivileged users on the filesystem holding `path`,
/// falling back to [`MAX_STORE_DEFAULT`] when the probe fails (e.g. the
/// directory does not exist yet).
pub fn disk_available(path: &Path) -> i64 {
    #[cfg(unix)]
    {
        match nix::sys::statvfs::statvfs(path) {
            Ok(vfs) => (vfs.blocks_available() as i64).saturating_mul(vfs.fragment_size() as i64),
            Err(_) => MAX_STORE_DEFAULT,
        }
    }
    #[cfg(not(unix))]
    {
        let _ = path;
        MAX_STORE_DEFAULT
    }
}

/// Render a byte count for diagnostics: base 1024, two decimal places
/// above bytes.
pub fn friendly_bytes(bytes: i64) -> String {
    const SUFFIXES: [&str; 6] = ["KB", "MB", "GB", "TB", "PB", "EB"];
    let mut fbytes = bytes as f64;
    if fbytes < 1024.0 {
        return format!("{} B", bytes);
    }
    let mut exp = 0;
    while fbytes >= 1024.0 && exp < SUFFIXES.len() {
        fbytes /= 1024.0;
        exp += 1;
    }
    format!("{:.2} {}", fbytes, SUFFIXES[exp - 1])
}
