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

//! Persistence for [`BenchmarkResult`]s. Kept separate from
//! [`hermes_prompts::PromptStorage`] since a Prompt exclusively owns its
//! result list (cascade-deleted with the prompt, per `spec.md` §3) but the
//! two are indexed independently.

use std::collections::HashMap;

use async_trait::async_trait;
use hermes_core::Result;
use hermes_prompts::PromptId;
use parking_lot::RwLock;

use crate::types::BenchmarkResult;

#[async_trait]
pub trait BenchmarkResultStorage: Send + Sync {
    async fn insert(&self, result: BenchmarkResult) -> Result<()>;

    /// Most recent results for a prompt, newest first.
    async fn recent(&self, prompt_id: PromptId, limit: usize) -> Result<Vec<BenchmarkResult>>;

    async fn latest(&self, prompt_id: PromptId) -> Result<Option<BenchmarkResult>> {
        Ok(self.recent(prompt_id, 1).await?.into_iter().next())
    }

    async fn delete_for_prompt(&self, prompt_id: PromptId) -> Result<()>;
}

#[derive(Default)]
pub struct InMemoryBenchmarkResultStorage {
    /// Newest-first per prompt.
    by_prompt: RwLock<HashMap<PromptId, Vec<BenchmarkResult>>>,
}

impl InMemoryBenchmarkResultStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BenchmarkResultStorage for InMemoryBenchmarkResultStorage {
    async fn insert(&self, result: BenchmarkResult) -> Result<()> {
        let mut guard = self.by_prompt.write();
        let entry = guard.entry(result.prompt_id).or_default();
        entry.insert(0, result);
        Ok(())
    }

    async fn recent(&self, prompt_id: PromptId, limit: usize) -> Result<Vec<BenchmarkResult>> {
        Ok(self
            .by_prompt
            .read()
            .get(&prompt_id)
            .map(|v| v.iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    async fn delete_for_prompt(&self, prompt_id: PromptId) -> Result<()> {
        self.by_prompt.write().remove(&prompt_id);
        Ok(())
    }
}
