// Copyright 2025 Sushanth (https://github.com/sushanthpy)
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

//! Shared error taxonomy for the Hermes prompt lifecycle engine.
//!
//! Every component surfaces failures through [`HermesError`] rather than ad hoc
//! result types, so callers across crate boundaries can match on `kind()`
//! without depending on component-specific error enums.

use thiserror::Error;

/// Error kinds shared by every Hermes component.
///
/// `NotFound` and `Invalid` are never retried. `Conflict` may be retried by the
/// caller. `Transient` is retried internally with bounded exponential backoff
/// before being surfaced as `Degraded`. `Policy` carries an explanation for a
/// refused-but-well-formed operation.
#[derive(Error, Debug, Clone)]
pub enum HermesError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid input: {0}")]
    Invalid(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("transient failure: {0}")]
    Transient(String),

    #[error("external dependency degraded: {0}")]
    Degraded(String),

    #[error("policy violation: {0}")]
    Policy(String),
}

impl HermesError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn invalid(what: impl Into<String>) -> Self {
        Self::Invalid(what.into())
    }

    pub fn conflict(what: impl Into<String>) -> Self {
        Self::Conflict(what.into())
    }

    /// True when a caller may reasonably retry the operation unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict(_) | Self::Transient(_))
    }
}

pub type Result<T> = std::result::Result<T, HermesError>;
