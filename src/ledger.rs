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

//! Server-wide resource ledger
//!
//! Tracks memory and storage reserved by enabled accounts against the hard
//! server caps. The ledger is plain data; it lives inside the control
//! plane's state lock and every method here expects that lock to be held.
//! Admission and reservation therefore compose into single critical
//! sections ([`ResourceLedger::try_reserve`], [`ResourceLedger::replace`]),
//! which is what keeps two concurrent enables from both passing the same
//! headroom check. All operations are constant-time and never block.

use crate::config::JetStreamConfig;
use crate::error::{JetStreamError, Result};
use crate::limits::AccountLimits;

#[derive(Debug)]
pub struct ResourceLedger {
    max_memory: i64,
    max_store: i64,
    mem_reserved: i64,
    store_reserved: i64,
}

impl ResourceLedger {
    pub fn new(config: &JetStreamConfig) -> ResourceLedger {
        ResourceLedger {
            max_memory: config.max_memory,
            max_store: config.max_store,
            mem_reserved: 0,
            store_reserved: 0,
        }
    }

    /// Check whether the requested limits fit in the remaining headroom.
    /// Negative components always fit.
    pub fn sufficient(&self, limits: &AccountLimits) -> Result<()> {
        if self.mem_reserved + limits.max_memory > self.max_memory {
            return Err(JetStreamError::InsufficientMemory);
        }
        if self.store_reserved + limits.max_store > self.max_store {
            return Err(JetStreamError::InsufficientStorage);
        }
        Ok(())
    }

    /// Blindly reserve the positive components of `limits`.
    pub fn reserve(&mut self, limits: &AccountLimits) {
        if limits.max_memory > 0 {
            self.mem_reserved += limits.max_memory;
        }
        if limits.max_store > 0 {
            self.store_reserved += limits.max_store;
        }
    }

    /// Release the positive components of `limits`.
    pub fn release(&mut self, limits: &AccountLimits) {
        if limits.max_memory > 0 {
            self.mem_reserved -= limits.max_memory;
        }
        if limits.max_store > 0 {
            self.store_reserved -= limits.max_store;
        }
    }

    /// Zero both counters. Safe only as part of a full reload that will
    /// re-enable every account afterwards.
    pub fn clear(&mut self) {
        self.mem_reserved = 0;
        self.store_reserved = 0;
    }

    /// Admission check plus reservation in one step.
    pub fn try_reserve(&mut self, limits: &AccountLimits) -> Result<()> {
        self.sufficient(limits)?;
        self.reserve(limits);
        Ok(())
    }

    /// Atomically swap one account's reservation for another. The delta is
    /// what gets admission-checked, so shrinking limits always succeeds.
    pub fn replace(&mut self, old: &AccountLimits, new: &AccountLimits) -> Result<()> {
        self.sufficient(&old.diff(new))?;
        self.release(old);
        self.reserve(new);
        Ok(())
    }

    pub fn mem_reserved(&self) -> i64 {
        self.mem_reserved
    }

    pub fn store_reserved(&self) -> i64 {
        self.store_reserved
    }
}
