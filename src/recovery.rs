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

//! Per-account recovery walk
//!
//! Reconstructs an account's world from its on-disk slice, in dependency
//! order: templates first (streams need ownership bookkeeping), then
//! streams, then each stream's consumers, finishing with snapshot
//! cleanup. Every metafile is checksum-verified before it is trusted; a
//! bad or missing checksum makes recovery skip exactly that entity with a
//! warning. Nothing in these passes aborts the enclosing account enable.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::account::JsAccount;
use crate::consumer::is_durable;
use crate::meta::{
    self, FileConsumerInfo, FileStreamInfo, CONSUMER_DIR, TEMPLATES_CHECKSUM_KEY,
};
use crate::stream::Stream;
use crate::template::StreamTemplateConfig;

/// Subdirectories of `dir`, sorted by name for deterministic recovery
/// order. Missing directories yield an empty list.
fn sorted_subdirs(dir: &Path) -> Vec<(String, PathBuf)> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(_) => return Vec::new(),
    };
    let mut dirs: Vec<(String, PathBuf)> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_dir())
        .filter_map(|entry| {
            entry
                .file_name()
                .to_str()
                .map(|name| (name.to_string(), entry.path()))
        })
        .collect();
    dirs.sort();
    dirs
}

/// Rebuild one account from disk. Invoked once per account during enable,
/// after `<account>/streams/` exists.
pub(crate) fn recover_account(jsa: &Arc<JsAccount>) {
    recover_templates(jsa);
    recover_streams(jsa);

    // Leftover snapshots from a previous run are stale now.
    let _ = fs::remove_dir_all(jsa.snapshots_dir());

    debug!(account = %jsa.name(), "jetstream state recovered");
}

fn recover_templates(jsa: &Arc<JsAccount>) {
    for (name, dir) in sorted_subdirs(&jsa.templates_dir()) {
        let mut cfg: StreamTemplateConfig =
            match meta::load_meta(&dir, TEMPLATES_CHECKSUM_KEY) {
                Ok(cfg) => cfg,
                Err(e) => {
                    warn!(account = %jsa.name(), template = %name, error = %e,
                        "skipping stream template");
                    continue;
                }
            };
        // The persisted skeleton carries the validation sentinel; adding
        // the template re-stamps it.
        cfg.config.name.clear();
        let tname = cfg.name.clone();
        if let Err(e) = jsa.add_stream_template(cfg) {
            warn!(account = %jsa.name(), template = %tname, error = %e,
                "error recreating stream template");
        }
    }
}

fn recover_streams(jsa: &Arc<JsAccount>) {
    for (name, dir) in sorted_subdirs(&jsa.streams_dir()) {
        let info: FileStreamInfo = match meta::load_meta(&dir, &name) {
            Ok(info) => info,
            Err(e) => {
                warn!(account = %jsa.name(), stream = %name, error = %e, "skipping stream");
                continue;
            }
        };

        // Ownership bookkeeping only; no message replay happens here. A
        // missing template leaves the stream detached.
        if !info.config.template.is_empty() {
            if let Err(e) =
                jsa.add_stream_name_to_template(&info.config.template, &info.config.name)
            {
                warn!(account = %jsa.name(), stream = %name,
                    template = %info.config.template, error = %e,
                    "error adding stream to template");
            }
        }

        let stream = match jsa.restore_stream(info.config, info.created) {
            Ok(stream) => stream,
            Err(e) => {
                warn!(account = %jsa.name(), stream = %name, error = %e,
                    "error recreating stream");
                continue;
            }
        };

        let state = stream.state();
        info!(account = %jsa.name(), stream = %name, msgs = state.msgs,
            "restored stream");

        recover_consumers(jsa, &dir, &name, &stream);
    }
}

fn recover_consumers(jsa: &Arc<JsAccount>, stream_dir: &Path, stream_name: &str, stream: &Arc<dyn Stream>) {
    let consumers = sorted_subdirs(&stream_dir.join(CONSUMER_DIR));
    if consumers.is_empty() {
        return;
    }
    info!(account = %jsa.name(), stream = %stream_name, count = consumers.len(),
        "recovering consumers");

    for (name, dir) in consumers {
        let mut info: FileConsumerInfo = match meta::load_meta(&dir, &name) {
            Ok(info) => info,
            Err(e) => {
                warn!(account = %jsa.name(), stream = %stream_name, consumer = %name,
                    error = %e, "skipping consumer");
                continue;
            }
        };

        // An ephemeral consumer cannot re-attach until its client comes
        // back. Recover it as a durable under its directory name, then
        // flip it back so its lifetime is session-bound again.
        let ephemeral = !is_durable(&info.config);
        if ephemeral {
            info.config.durable = Some(name.clone());
        }

        let consumer = match stream.add_consumer(&info.config) {
            Ok(consumer) => consumer,
            Err(e) => {
                warn!(account = %jsa.name(), stream = %stream_name, consumer = %name,
                    error = %e, "error adding consumer");
                continue;
            }
        };
        if ephemeral {
            if let Err(e) = consumer.switch_to_ephemeral() {
                warn!(account = %jsa.name(), stream = %stream_name, consumer = %name,
                    error = %e, "error reverting consumer to ephemeral");
            }
        }
        consumer.set_created(info.created);
        if let Err(e) = consumer.restore_state() {
            warn!(account = %jsa.name(), stream = %stream_name, consumer = %name,
                error = %e, "error restoring consumer state");
        }
    }
}
