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

//! The Prompt Store's data model: the mutable head (`Prompt`) and its
//! immutable history (`PromptVersion`), plus the small enums that classify
//! them.

use std::collections::HashMap;

use semver::Version;
use serde::{Deserialize, Serialize};

pub type PromptId = u128;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PromptKind {
    AgentSystem,
    UserTemplate,
    ToolDefinition,
    InstructionSpec,
}

impl Default for PromptKind {
    fn default() -> Self {
        PromptKind::InstructionSpec
    }
}

impl PromptKind {
    /// The suite a fresh benchmark should use for this kind, per the
    /// suite-for-kind mapping in `SPEC_FULL.md` §4.2.
    pub fn default_suite(self) -> &'static str {
        match self {
            PromptKind::AgentSystem => "agent",
            PromptKind::UserTemplate => "quality",
            PromptKind::ToolDefinition => "default",
            PromptKind::InstructionSpec => "default",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptState {
    Draft,
    Review,
    Staged,
    Deployed,
    Archived,
}

impl PromptState {
    /// Whether `self -> next` is a legal transition per the state machine in
    /// `spec.md` §4.1: draft -> review -> staged -> deployed -> archived;
    /// draft/review may return to draft; deployed may be archived; archived
    /// is terminal.
    pub fn can_transition_to(self, next: PromptState) -> bool {
        use PromptState::*;
        match (self, next) {
            (a, b) if a == b => true,
            (Draft, Review) => true,
            (Review, Draft) => true,
            (Review, Staged) => true,
            (Staged, Draft) => true,
            (Staged, Deployed) => true,
            (Deployed, Archived) => true,
            (Draft, Archived) | (Review, Archived) | (Staged, Archived) => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OwnerKind {
    User,
    Agent,
    System,
}

impl Default for OwnerKind {
    fn default() -> Self {
        OwnerKind::User
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Private,
    Team,
    Org,
    Public,
}

impl Default for Visibility {
    fn default() -> Self {
        Visibility::Private
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariableSchema {
    pub var_type: String,
    pub required: bool,
    pub description: Option<String>,
    pub default: Option<serde_json::Value>,
}

/// The canonical, mutable head of a versioned prompt document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prompt {
    pub id: PromptId,
    pub slug: String,
    pub name: String,
    pub kind: PromptKind,
    pub category: Option<String>,
    pub tags: Vec<String>,

    pub content: String,
    pub variables: HashMap<String, VariableSchema>,
    pub metadata: HashMap<String, serde_json::Value>,

    pub version: Version,
    pub content_hash: String,

    pub state: PromptState,
    pub deployed_at: Option<u64>,

    pub owner_id: String,
    pub owner_kind: OwnerKind,
    pub team_id: Option<String>,
    pub visibility: Visibility,

    pub last_benchmark_score: Option<f64>,
    pub last_benchmark_at: Option<u64>,

    pub source_path: Option<String>,
    pub source_commit: Option<String>,

    pub created_at: u64,
    pub updated_at: u64,
}

impl Prompt {
    /// `metadata.autoBenchmark`, defaulting to enabled per `spec.md` §4.2.
    pub fn auto_benchmark_enabled(&self) -> bool {
        self.metadata
            .get("autoBenchmark")
            .and_then(|v| v.as_bool())
            .unwrap_or(true)
    }
}

/// An immutable historical snapshot of a prompt's content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptVersion {
    pub prompt_id: PromptId,
    pub version: Version,
    pub content: String,
    pub content_hash: String,
    /// Unified diff against the prior version; `None` for the initial version.
    pub diff: Option<String>,
    pub change_summary: String,
    pub author_id: String,
    pub variables: HashMap<String, VariableSchema>,
    pub metadata: HashMap<String, serde_json::Value>,
    pub created_at: u64,
}
