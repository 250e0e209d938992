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

//! # Hermes Prompts
//!
//! The content-addressed, semver-versioned Prompt Store (C1). Every
//! content-changing update produces an immutable [`types::PromptVersion`],
//! auto-bumping the patch component; rollback appends rather than rewrites
//! history.

pub mod diff;
pub mod store;
pub mod types;

pub use diff::unified_diff;
pub use store::{
    compute_hash, CreatePromptParams, InMemoryPromptStorage, ListFilter, ListPage, Paging,
    PromptStorage, PromptStore, UpdateOutcome, UpdatePromptParams,
};
pub use types::{
    OwnerKind, Prompt, PromptId, PromptKind, PromptState, PromptVersion, VariableSchema,
    Visibility,
};
