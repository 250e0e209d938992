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

//! The Prompt Store (C1): content-addressed storage of prompts and their
//! linear version history.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use hermes_core::{now_millis, HermesError, Result};
use parking_lot::RwLock;
use semver::Version;
use sha2::{Digest, Sha256};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info};

use crate::diff::unified_diff;
use crate::types::{OwnerKind, Prompt, PromptId, PromptKind, PromptState, PromptVersion, Visibility};

/// SHA-256 fingerprint of prompt content, hex-encoded.
pub fn compute_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

fn bump_patch(version: &Version) -> Version {
    Version::new(version.major, version.minor, version.patch + 1)
}

/// Low-level persistence abstraction. `PromptStore` builds the versioning
/// protocol, slug uniqueness, and state-machine validation on top of this.
#[async_trait]
pub trait PromptStorage: Send + Sync {
    async fn insert_prompt(&self, prompt: Prompt) -> Result<()>;
    async fn get_prompt(&self, id: PromptId) -> Result<Option<Prompt>>;
    async fn get_prompt_by_slug(&self, slug: &str) -> Result<Option<Prompt>>;
    async fn update_prompt(&self, prompt: Prompt) -> Result<()>;
    async fn delete_prompt(&self, id: PromptId) -> Result<()>;
    async fn list_prompts(&self) -> Result<Vec<Prompt>>;

    async fn insert_version(&self, version: PromptVersion) -> Result<()>;
    async fn get_version(&self, prompt_id: PromptId, version: &Version) -> Result<Option<PromptVersion>>;
    /// All versions for a prompt, oldest first.
    async fn list_versions(&self, prompt_id: PromptId) -> Result<Vec<PromptVersion>>;
    async fn delete_versions(&self, prompt_id: PromptId) -> Result<()>;
}

/// Reference in-memory implementation of [`PromptStorage`], used by tests and
/// by embedders that have not wired a durable backend yet.
#[derive(Default)]
pub struct InMemoryPromptStorage {
    prompts: RwLock<HashMap<PromptId, Prompt>>,
    slugs: RwLock<HashMap<String, PromptId>>,
    versions: RwLock<HashMap<PromptId, Vec<PromptVersion>>>,
}

impl InMemoryPromptStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PromptStorage for InMemoryPromptStorage {
    async fn insert_prompt(&self, prompt: Prompt) -> Result<()> {
        self.slugs.write().insert(prompt.slug.clone(), prompt.id);
        self.prompts.write().insert(prompt.id, prompt);
        Ok(())
    }

    async fn get_prompt(&self, id: PromptId) -> Result<Option<Prompt>> {
        Ok(self.prompts.read().get(&id).cloned())
    }

    async fn get_prompt_by_slug(&self, slug: &str) -> Result<Option<Prompt>> {
        let id = self.slugs.read().get(slug).copied();
        Ok(match id {
            Some(id) => self.prompts.read().get(&id).cloned(),
            None => None,
        })
    }

    async fn update_prompt(&self, prompt: Prompt) -> Result<()> {
        self.prompts.write().insert(prompt.id, prompt);
        Ok(())
    }

    async fn delete_prompt(&self, id: PromptId) -> Result<()> {
        if let Some(prompt) = self.prompts.write().remove(&id) {
            self.slugs.write().remove(&prompt.slug);
        }
        Ok(())
    }

    async fn list_prompts(&self) -> Result<Vec<Prompt>> {
        Ok(self.prompts.read().values().cloned().collect())
    }

    async fn insert_version(&self, version: PromptVersion) -> Result<()> {
        self.versions
            .write()
            .entry(version.prompt_id)
            .or_default()
            .push(version);
        Ok(())
    }

    async fn get_version(&self, prompt_id: PromptId, version: &Version) -> Result<Option<PromptVersion>> {
        Ok(self
            .versions
            .read()
            .get(&prompt_id)
            .and_then(|vs| vs.iter().find(|v| &v.version == version).cloned()))
    }

    async fn list_versions(&self, prompt_id: PromptId) -> Result<Vec<PromptVersion>> {
        Ok(self.versions.read().get(&prompt_id).cloned().unwrap_or_default())
    }

    async fn delete_versions(&self, prompt_id: PromptId) -> Result<()> {
        self.versions.write().remove(&prompt_id);
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct CreatePromptParams {
    pub slug: String,
    pub name: String,
    pub kind: PromptKind,
    pub category: Option<String>,
    pub tags: Vec<String>,
    pub content: String,
    pub variables: HashMap<String, crate::types::VariableSchema>,
    pub metadata: HashMap<String, serde_json::Value>,
    pub owner_id: String,
    pub owner_kind: OwnerKind,
    pub team_id: Option<String>,
    pub visibility: Visibility,
}

/// Fields that may change on `update`. `None` means "leave unchanged"; a
/// `content: Some(_)` that equals the current content still counts as
/// "unchanged" for versioning purposes.
#[derive(Debug, Clone, Default)]
pub struct UpdatePromptParams {
    pub content: Option<String>,
    pub name: Option<String>,
    pub category: Option<Option<String>>,
    pub tags: Option<Vec<String>>,
    pub metadata: Option<HashMap<String, serde_json::Value>>,
    pub variables: Option<HashMap<String, crate::types::VariableSchema>>,
    pub state: Option<PromptState>,
}

#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    pub kind: Option<PromptKind>,
    pub state: Option<PromptState>,
    pub category: Option<String>,
    pub owner_id: Option<String>,
    pub team_id: Option<String>,
    pub visibility: Option<Visibility>,
    pub search: Option<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct Paging {
    pub offset: usize,
    pub limit: usize,
}

impl Default for Paging {
    fn default() -> Self {
        Self { offset: 0, limit: 50 }
    }
}

pub struct ListPage {
    pub items: Vec<Prompt>,
    pub total: usize,
}

/// Outcome of `update`: the resulting head, and whether content actually
/// changed (and therefore a new version was created).
pub struct UpdateOutcome {
    pub prompt: Prompt,
    pub version_bumped: bool,
}

/// The Prompt Store. Wraps a [`PromptStorage`] backend with the versioning
/// protocol, slug uniqueness, and per-prompt serialization the spec requires.
pub struct PromptStore<S: PromptStorage + ?Sized> {
    storage: Arc<S>,
    locks: RwLock<HashMap<PromptId, Arc<AsyncMutex<()>>>>,
}

impl<S: PromptStorage + ?Sized> PromptStore<S> {
    pub fn new(storage: Arc<S>) -> Self {
        Self {
            storage,
            locks: RwLock::new(HashMap::new()),
        }
    }

    fn lock_for(&self, id: PromptId) -> Arc<AsyncMutex<()>> {
        if let Some(lock) = self.locks.read().get(&id) {
            return lock.clone();
        }
        self.locks
            .write()
            .entry(id)
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    pub async fn create(&self, params: CreatePromptParams) -> Result<Prompt> {
        if params.slug.trim().is_empty() {
            return Err(HermesError::invalid("slug must not be empty"));
        }
        if self.storage.get_prompt_by_slug(&params.slug).await?.is_some() {
            return Err(HermesError::conflict(format!("slug already taken: {}", params.slug)));
        }

        let now = now_millis();
        let content_hash = compute_hash(&params.content);
        let version = Version::new(1, 0, 0);
        let id: PromptId = rand::random();

        let prompt = Prompt {
            id,
            slug: params.slug,
            name: params.name,
            kind: params.kind,
            category: params.category,
            tags: params.tags,
            content: params.content.clone(),
            variables: params.variables.clone(),
            metadata: params.metadata,
            version: version.clone(),
            content_hash: content_hash.clone(),
            state: PromptState::Draft,
            deployed_at: None,
            owner_id: params.owner_id,
            owner_kind: params.owner_kind,
            team_id: params.team_id,
            visibility: params.visibility,
            last_benchmark_score: None,
            last_benchmark_at: None,
            source_path: None,
            source_commit: None,
            created_at: now,
            updated_at: now,
        };

        let initial_version = PromptVersion {
            prompt_id: id,
            version,
            content: params.content,
            content_hash,
            diff: None,
            change_summary: "Initial version".to_string(),
            author_id: prompt.owner_id.clone(),
            variables: params.variables,
            metadata: prompt.metadata.clone(),
            created_at: now,
        };

        self.storage.insert_prompt(prompt.clone()).await?;
        self.storage.insert_version(initial_version).await?;

        info!(prompt_id = %id, slug = %prompt.slug, "prompt created");
        Ok(prompt)
    }

    pub async fn get(&self, id: PromptId) -> Result<Prompt> {
        self.storage
            .get_prompt(id)
            .await?
            .ok_or_else(|| HermesError::not_found(format!("prompt {id}")))
    }

    pub async fn get_by_slug(&self, slug: &str) -> Result<Option<Prompt>> {
        self.storage.get_prompt_by_slug(slug).await
    }

    pub async fn get_version(&self, id: PromptId, version: &Version) -> Result<PromptVersion> {
        self.storage
            .get_version(id, version)
            .await?
            .ok_or_else(|| HermesError::not_found(format!("prompt {id} version {version}")))
    }

    pub async fn list_versions(&self, id: PromptId) -> Result<Vec<PromptVersion>> {
        self.storage.list_versions(id).await
    }

    pub async fn list(&self, filter: ListFilter, paging: Paging) -> Result<ListPage> {
        let mut items = self.storage.list_prompts().await?;

        items.retain(|p| {
            filter.kind.map_or(true, |k| p.kind == k)
                && filter.state.map_or(true, |s| p.state == s)
                && filter
                    .category
                    .as_ref()
                    .map_or(true, |c| p.category.as_deref() == Some(c.as_str()))
                && filter.owner_id.as_ref().map_or(true, |o| &p.owner_id == o)
                && filter.team_id.as_ref().map_or(true, |t| p.team_id.as_deref() == Some(t.as_str()))
                && filter.visibility.map_or(true, |v| p.visibility == v)
                && filter.search.as_ref().map_or(true, |q| {
                    let q = q.to_lowercase();
                    p.name.to_lowercase().contains(&q)
                        || p.slug.to_lowercase().contains(&q)
                        || p.content.to_lowercase().contains(&q)
                })
        });

        items.sort_by_key(|p| p.created_at);
        let total = items.len();
        let page = items
            .into_iter()
            .skip(paging.offset)
            .take(paging.limit)
            .collect();

        Ok(ListPage { items: page, total })
    }

    pub async fn update(
        &self,
        id: PromptId,
        params: UpdatePromptParams,
        change_summary: impl Into<String>,
        author_id: impl Into<String>,
    ) -> Result<UpdateOutcome> {
        let lock = self.lock_for(id);
        let _guard = lock.lock().await;

        let mut prompt = self.get(id).await?;

        if let Some(next_state) = params.state {
            if !prompt.state.can_transition_to(next_state) {
                return Err(HermesError::invalid(format!(
                    "illegal transition {:?} -> {:?}",
                    prompt.state, next_state
                )));
            }
            prompt.state = next_state;
            if next_state == PromptState::Deployed {
                prompt.deployed_at = Some(now_millis());
            }
        }

        let mut version_bumped = false;

        if let Some(new_content) = params.content {
            let new_hash = compute_hash(&new_content);
            if new_hash != prompt.content_hash {
                let new_version = bump_patch(&prompt.version);
                let diff = unified_diff(&prompt.content, &new_content);

                let version_record = PromptVersion {
                    prompt_id: id,
                    version: new_version.clone(),
                    content: new_content.clone(),
                    content_hash: new_hash.clone(),
                    diff: Some(diff),
                    change_summary: change_summary.into(),
                    author_id: author_id.into(),
                    variables: params.variables.clone().unwrap_or_else(|| prompt.variables.clone()),
                    metadata: params.metadata.clone().unwrap_or_else(|| prompt.metadata.clone()),
                    created_at: now_millis(),
                };
                self.storage.insert_version(version_record).await?;

                prompt.content = new_content;
                prompt.content_hash = new_hash;
                prompt.version = new_version;
                version_bumped = true;

                debug!(prompt_id = %id, version = %prompt.version, "content-changing update created new version");
            }
        }

        if let Some(name) = params.name {
            prompt.name = name;
        }
        if let Some(category) = params.category {
            prompt.category = category;
        }
        if let Some(tags) = params.tags {
            prompt.tags = tags;
        }
        if let Some(metadata) = params.metadata {
            prompt.metadata = metadata;
        }
        if let Some(variables) = params.variables {
            prompt.variables = variables;
        }

        prompt.updated_at = now_millis();
        self.storage.update_prompt(prompt.clone()).await?;

        Ok(UpdateOutcome { prompt, version_bumped })
    }

    /// Updates the advisory benchmark-score cache on the prompt head. Never
    /// creates a version: this is cache maintenance, not a content change.
    /// Per `spec.md` §4.2, if this write is lost the next run is still
    /// correct because callers read the max-by-timestamp result directly.
    pub async fn record_benchmark(&self, id: PromptId, score: f64, at: u64) -> Result<()> {
        let lock = self.lock_for(id);
        let _guard = lock.lock().await;

        let mut prompt = self.get(id).await?;
        prompt.last_benchmark_score = Some(score);
        prompt.last_benchmark_at = Some(at);
        self.storage.update_prompt(prompt).await
    }

    pub async fn delete(&self, id: PromptId, hard: bool) -> Result<()> {
        let lock = self.lock_for(id);
        let _guard = lock.lock().await;

        let prompt = self.get(id).await?;

        if hard {
            self.storage.delete_prompt(id).await?;
            self.storage.delete_versions(id).await?;
        } else {
            let mut archived = prompt.clone();
            if !archived.state.can_transition_to(PromptState::Archived) {
                return Err(HermesError::invalid("prompt cannot be archived from its current state"));
            }
            archived.state = PromptState::Archived;
            archived.updated_at = now_millis();
            self.storage.update_prompt(archived).await?;
        }
        Ok(())
    }

    pub async fn diff(&self, id: PromptId, version_a: &Version, version_b: &Version) -> Result<String> {
        let a = self.get_version(id, version_a).await?;
        let b = self.get_version(id, version_b).await?;
        Ok(unified_diff(&a.content, &b.content))
    }

    /// Rollback never rewrites history: it appends a new version whose
    /// content equals `target_version`'s content.
    pub async fn rollback(
        &self,
        id: PromptId,
        target_version: &Version,
        author_id: impl Into<String>,
    ) -> Result<Prompt> {
        let lock = self.lock_for(id);
        let _guard = lock.lock().await;

        let mut prompt = self.get(id).await?;
        let target = self.get_version(id, target_version).await?;

        let new_version = bump_patch(&prompt.version);
        let diff = unified_diff(&prompt.content, &target.content);
        let content_hash = compute_hash(&target.content);

        let version_record = PromptVersion {
            prompt_id: id,
            version: new_version.clone(),
            content: target.content.clone(),
            content_hash: content_hash.clone(),
            diff: Some(diff),
            change_summary: format!("Rollback to v{target_version}"),
            author_id: author_id.into(),
            variables: target.variables.clone(),
            metadata: target.metadata.clone(),
            created_at: now_millis(),
        };
        self.storage.insert_version(version_record).await?;

        prompt.content = target.content;
        prompt.content_hash = content_hash;
        prompt.version = new_version;
        prompt.updated_at = now_millis();
        self.storage.update_prompt(prompt.clone()).await?;

        info!(prompt_id = %id, target_version = %target_version, "prompt rolled back");
        Ok(prompt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> PromptStore<InMemoryPromptStorage> {
        PromptStore::new(Arc::new(InMemoryPromptStorage::new()))
    }

    async fn create_t1(store: &PromptStore<InMemoryPromptStorage>, content: &str) -> Prompt {
        store
            .create(CreatePromptParams {
                slug: "t1".to_string(),
                name: "Test Prompt".to_string(),
                kind: PromptKind::InstructionSpec,
                content: content.to_string(),
                owner_id: "u-1".to_string(),
                ..Default::default()
            })
            .await
            .unwrap()
    }

    // S1 — version bump on content change.
    #[tokio::test]
    async fn s1_version_bump_on_content_change() {
        let store = store();
        let prompt = create_t1(&store, "A").await;
        assert_eq!(prompt.version, Version::new(1, 0, 0));
        assert_eq!(prompt.content_hash, compute_hash("A"));

        let outcome = store
            .update(prompt.id, UpdatePromptParams { content: Some("B".to_string()), ..Default::default() }, "change to B", "u-1")
            .await
            .unwrap();
        assert!(outcome.version_bumped);
        assert_eq!(outcome.prompt.version, Version::new(1, 0, 1));

        let versions = store.list_versions(prompt.id).await.unwrap();
        assert_eq!(versions.len(), 2);

        let diff = store
            .diff(prompt.id, &Version::new(1, 0, 0), &Version::new(1, 0, 1))
            .await
            .unwrap();
        assert!(diff.contains("-A"));
        assert!(diff.contains("+B"));

        // Updating again with identical content creates no new version.
        let outcome2 = store
            .update(prompt.id, UpdatePromptParams { content: Some("B".to_string()), ..Default::default() }, "no-op", "u-1")
            .await
            .unwrap();
        assert!(!outcome2.version_bumped);
        let versions = store.list_versions(prompt.id).await.unwrap();
        assert_eq!(versions.len(), 2);
    }

    #[tokio::test]
    async fn slug_must_be_unique() {
        let store = store();
        create_t1(&store, "A").await;
        let err = store
            .create(CreatePromptParams {
                slug: "t1".to_string(),
                name: "dup".to_string(),
                content: "x".to_string(),
                owner_id: "u-1".to_string(),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, HermesError::Conflict(_)));
    }

    #[tokio::test]
    async fn rollback_creates_new_version_matching_target_content() {
        let store = store();
        let prompt = create_t1(&store, "A").await;
        store
            .update(prompt.id, UpdatePromptParams { content: Some("B".to_string()), ..Default::default() }, "to B", "u-1")
            .await
            .unwrap();

        let rolled_back = store.rollback(prompt.id, &Version::new(1, 0, 0), "u-1").await.unwrap();
        assert_eq!(rolled_back.content, "A");
        assert_eq!(rolled_back.version, Version::new(1, 0, 2));

        let versions = store.list_versions(prompt.id).await.unwrap();
        assert_eq!(versions.len(), 3);
    }

    #[tokio::test]
    async fn illegal_state_transition_is_rejected() {
        let store = store();
        let prompt = create_t1(&store, "A").await;
        let err = store
            .update(prompt.id, UpdatePromptParams { state: Some(PromptState::Deployed), ..Default::default() }, "skip ahead", "u-1")
            .await
            .unwrap_err();
        assert!(matches!(err, HermesError::Invalid(_)));
    }
}
