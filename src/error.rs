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

//! Error types for the JetStream control plane

use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum JetStreamError {
    #[error("jetstream not enabled")]
    NotEnabled,

    #[error("jetstream not enabled for account")]
    NotEnabledForAccount,

    #[error("jetstream already enabled for account")]
    AlreadyEnabledForAccount,

    #[error("jetstream can not be enabled on the system account")]
    SystemAccount,

    #[error("insufficient memory resources available")]
    InsufficientMemory,

    #[error("insufficient storage resources available")]
    InsufficientStorage,

    #[error("maximum number of streams reached")]
    MaximumStreamsReached,

    #[error("maximum consumers exceeds account limit")]
    MaximumConsumersExceeded,

    #[error("invalid name '{0}'")]
    InvalidName(String),

    #[error("invalid subject '{0}'")]
    InvalidSubject(String),

    #[error("name is too long, maximum allowed is {0}")]
    NameTooLong(usize),

    #[error("stream name already in use")]
    StreamNameInUse,

    #[error("template with name '{0}' already exists")]
    TemplateNameInUse(String),

    #[error("template config name should be empty")]
    TemplateNameNotEmpty,

    #[error("stream not found")]
    StreamNotFound,

    #[error("template not found")]
    TemplateNotFound,

    #[error("missing metadata file: {0}")]
    MissingMetadata(String),

    #[error("missing metadata checksum: {0}")]
    MissingChecksum(String),

    #[error("metadata checksum mismatch: stored {stored}, computed {computed}")]
    ChecksumMismatch { stored: String, computed: String },

    #[error("corrupt metadata: {0}")]
    BadMetadata(String),

    #[error("storage directory is not a directory")]
    StoreDirNotDirectory,

    #[error("storage directory is not writable")]
    StoreDirNotWritable,

    #[error("no service export for subject '{0}'")]
    ExportNotFound(String),

    #[error("consumer error: {0}")]
    Consumer(String),

    #[error("stream error: {0}")]
    Stream(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),
}

pub type Result<T> = std::result::Result<T, JetStreamError>;
