//! Org-tagged read cache.
//!
//! Entries are tagged `org/scope/classification/residency` and keyed by the
//! cache-safe projection of the reading context, so two callers only share an
//! entry when nothing that could change the result differs between them. Only
//! `OFFICIAL` contexts ever read or write the shared store.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::Serialize;
use serde::de::DeserializeOwned;

use orgcentral_auth::{CacheMode, RepositoryAuthorizationContext, cache_mode_for, to_cache_safe_authorization_context};
use orgcentral_core::{DataClassification, DataResidency, DomainResult, OrgId};

use crate::clock::Clock;

pub const DEFAULT_CACHE_TTL_SECONDS: i64 = 60;
pub const DEFAULT_CACHE_MAX_ENTRIES: usize = 10_000;

pub const CACHE_SCOPE_ABAC_POLICIES: &str = "org:abac-policies";
pub const CACHE_SCOPE_ROLES: &str = "org:roles";
pub const CACHE_SCOPE_HR_PROFILES: &str = "hr:profiles";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheTag {
    pub org_id: OrgId,
    pub scope: String,
    pub classification: DataClassification,
    pub residency: DataResidency,
}

impl CacheTag {
    pub fn new(
        org_id: OrgId,
        scope: impl Into<String>,
        classification: DataClassification,
        residency: DataResidency,
    ) -> Self {
        Self {
            org_id,
            scope: scope.into(),
            classification,
            residency,
        }
    }

    fn for_context(ctx: &RepositoryAuthorizationContext, scope: &str) -> Self {
        let tenant = to_cache_safe_authorization_context(ctx).tenant_scope;
        Self::new(tenant.org_id, scope, tenant.data_classification, tenant.data_residency)
    }

    /// Whether an invalidation for `org_id`/`scope`/`residency` at
    /// `classification` covers this tag.
    fn covered_by(
        &self,
        org_id: &OrgId,
        scope: &str,
        classification: DataClassification,
        residency: DataResidency,
    ) -> bool {
        &self.org_id == org_id
            && self.scope == scope
            && self.residency == residency
            && self.classification <= classification
    }
}

impl fmt::Display for CacheTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "org:{}:{}:{}:{}",
            self.org_id, self.scope, self.classification, self.residency
        )
    }
}

/// Where a cached read's value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CachedReadMode {
    Hit,
    Miss,
    /// Context not eligible for the shared cache; loader always ran.
    NoStore,
}

impl CachedReadMode {
    pub fn as_str(self) -> &'static str {
        match self {
            CachedReadMode::Hit => "hit",
            CachedReadMode::Miss => "miss",
            CachedReadMode::NoStore => "no-store",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CachedRead<T> {
    pub value: T,
    pub mode: CachedReadMode,
}

struct Entry {
    tags: Vec<CacheTag>,
    value: serde_json::Value,
    expires_at: DateTime<Utc>,
    last_accessed: DateTime<Utc>,
}

impl Entry {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Bounded, tag-invalidated cache shared by every org.
///
/// Each registered tag carries a generation. Invalidation bumps the
/// generation before removing entries, and a read re-checks the generations
/// it loaded under after storing, so a load that overlapped an invalidation
/// never survives it.
pub struct OrgCache {
    entries: DashMap<String, Entry>,
    generations: DashMap<CacheTag, u64>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    max_entries: usize,
    eviction_batch_size: usize,
}

impl OrgCache {
    pub fn new(clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            generations: DashMap::new(),
            clock,
            ttl,
            max_entries: DEFAULT_CACHE_MAX_ENTRIES,
            eviction_batch_size: eviction_batch_for(DEFAULT_CACHE_MAX_ENTRIES),
        }
    }

    pub fn with_default_ttl(clock: Arc<dyn Clock>) -> Self {
        Self::new(clock, Duration::seconds(DEFAULT_CACHE_TTL_SECONDS))
    }

    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries.max(1);
        self.eviction_batch_size = eviction_batch_for(self.max_entries);
        self
    }

    /// Record that `tag` is in use. Returns the tag's string form.
    pub fn register_org_cache_tag(&self, tag: CacheTag) -> String {
        let rendered = tag.to_string();
        self.generations.entry(tag).or_insert(0);
        rendered
    }

    pub fn registered_tags(&self) -> Vec<String> {
        let mut tags: Vec<String> = self.generations.iter().map(|t| t.key().to_string()).collect();
        tags.sort();
        tags
    }

    /// Drop every entry tagged with `org_id`/`scope`/`residency` at or below
    /// `classification`.
    ///
    /// A writer at a higher tier also clears entries cached by `OFFICIAL`
    /// readers of the same scope. Returns the number of entries removed.
    pub fn invalidate_org_cache(
        &self,
        org_id: &OrgId,
        scope: &str,
        classification: DataClassification,
        residency: DataResidency,
    ) -> DomainResult<usize> {
        for mut generation in self.generations.iter_mut() {
            if generation.key().covered_by(org_id, scope, classification, residency) {
                *generation.value_mut() += 1;
            }
        }

        let before = self.entries.len();
        self.entries.retain(|_, entry| {
            !entry
                .tags
                .iter()
                .any(|tag| tag.covered_by(org_id, scope, classification, residency))
        });
        let removed = before.saturating_sub(self.entries.len());
        tracing::debug!(org_id = %org_id, scope, removed, "org cache invalidated");
        Ok(removed)
    }

    /// Read through the cache under every scope in `scopes`.
    ///
    /// Loader errors are returned as-is and nothing is stored.
    pub async fn cached_read<T, F, Fut>(
        &self,
        ctx: &RepositoryAuthorizationContext,
        scopes: &[&str],
        key: &str,
        loader: F,
    ) -> DomainResult<CachedRead<T>>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = DomainResult<T>>,
    {
        if cache_mode_for(ctx) == CacheMode::NoStore {
            let value = loader().await?;
            return Ok(CachedRead {
                value,
                mode: CachedReadMode::NoStore,
            });
        }

        let tags: Vec<CacheTag> = scopes.iter().map(|s| CacheTag::for_context(ctx, s)).collect();
        for tag in &tags {
            self.register_org_cache_tag(tag.clone());
        }
        let entry_key = entry_key(ctx, &tags, key);

        if let Some(value) = self.lookup(&entry_key, self.clock.now()) {
            match serde_json::from_value::<T>(value) {
                Ok(value) => {
                    return Ok(CachedRead {
                        value,
                        mode: CachedReadMode::Hit,
                    });
                }
                Err(err) => {
                    tracing::warn!(key, error = %err, "discarding undecodable cache entry");
                }
            }
        }

        let loaded_under = self.generations_of(&tags);
        let value = loader().await?;
        match serde_json::to_value(&value) {
            Ok(json) => self.store(entry_key, tags, json, &loaded_under),
            Err(err) => tracing::warn!(key, error = %err, "value not cacheable"),
        }

        Ok(CachedRead {
            value,
            mode: CachedReadMode::Miss,
        })
    }

    fn lookup(&self, entry_key: &str, now: DateTime<Utc>) -> Option<serde_json::Value> {
        let mut entry = self.entries.get_mut(entry_key)?;
        if entry.is_expired(now) {
            drop(entry);
            self.entries.remove(entry_key);
            return None;
        }
        entry.last_accessed = now;
        Some(entry.value.clone())
    }

    fn generations_of(&self, tags: &[CacheTag]) -> Vec<u64> {
        tags.iter()
            .map(|tag| self.generations.get(tag).map(|g| *g).unwrap_or(0))
            .collect()
    }

    fn store(&self, entry_key: String, tags: Vec<CacheTag>, value: serde_json::Value, loaded_under: &[u64]) {
        let now = self.clock.now();
        self.evict_if_needed(now);

        let stale = self.generations_of(&tags) != loaded_under;
        if stale {
            tracing::debug!(key = %entry_key, "skipping store for load that overlapped an invalidation");
            return;
        }
        self.entries.insert(
            entry_key.clone(),
            Entry {
                tags: tags.clone(),
                value,
                expires_at: now + self.ttl,
                last_accessed: now,
            },
        );

        // An invalidation may have landed between the check and the insert.
        if self.generations_of(&tags) != loaded_under {
            self.entries.remove(&entry_key);
        }
    }

    fn evict_if_needed(&self, now: DateTime<Utc>) {
        if self.entries.len() < self.max_entries {
            return;
        }

        self.entries.retain(|_, entry| !entry.is_expired(now));
        let current = self.entries.len();
        if current < self.max_entries {
            return;
        }

        let target = self.max_entries.saturating_sub(self.eviction_batch_size);
        let to_evict = current.saturating_sub(target);
        let mut by_age: Vec<(String, DateTime<Utc>)> = self
            .entries
            .iter()
            .map(|entry| (entry.key().clone(), entry.last_accessed))
            .collect();
        by_age.sort_by_key(|(_, last_accessed)| *last_accessed);
        for (key, _) in by_age.into_iter().take(to_evict) {
            self.entries.remove(&key);
        }
        tracing::debug!(evicted = to_evict, "org cache at capacity");
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn eviction_batch_for(max_entries: usize) -> usize {
    (max_entries / 10).max(1)
}

fn entry_key(ctx: &RepositoryAuthorizationContext, tags: &[CacheTag], key: &str) -> String {
    let rendered: Vec<String> = tags.iter().map(ToString::to_string).collect();
    format!(
        "{}|{}|{}",
        rendered.join(","),
        key,
        to_cache_safe_authorization_context(ctx).cache_key()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use chrono::TimeZone;
    use orgcentral_auth::PermissionMap;
    use orgcentral_core::{DomainError, UserId};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn clock() -> Arc<FixedClock> {
        Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()))
    }

    fn ctx(classification: DataClassification) -> RepositoryAuthorizationContext {
        ctx_for("user-1", classification)
    }

    fn ctx_for(user: &str, classification: DataClassification) -> RepositoryAuthorizationContext {
        RepositoryAuthorizationContext::builder(OrgId::new("org-1"), UserId::new(user))
            .permissions(PermissionMap::single("hr.people.profile", "read"))
            .data_classification(classification)
            .build()
    }

    async fn read(cache: &OrgCache, ctx: &RepositoryAuthorizationContext, calls: &AtomicUsize) -> CachedRead<String> {
        cache
            .cached_read(ctx, &[CACHE_SCOPE_HR_PROFILES], "profile-1", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok("Ada".to_string())
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn official_reads_hit_after_first_miss() {
        let cache = OrgCache::with_default_ttl(clock());
        let calls = AtomicUsize::new(0);
        let ctx = ctx(DataClassification::Official);

        assert_eq!(read(&cache, &ctx, &calls).await.mode, CachedReadMode::Miss);
        let second = read(&cache, &ctx, &calls).await;
        assert_eq!(second.mode, CachedReadMode::Hit);
        assert_eq!(second.value, "Ada");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            cache.registered_tags(),
            vec!["org:org-1:hr:profiles:OFFICIAL:UK_ONLY".to_string()]
        );
    }

    #[tokio::test]
    async fn sensitive_contexts_never_touch_the_store() {
        let cache = OrgCache::with_default_ttl(clock());
        let calls = AtomicUsize::new(0);
        let ctx = ctx(DataClassification::Secret);

        for _ in 0..2 {
            assert_eq!(read(&cache, &ctx, &calls).await.mode, CachedReadMode::NoStore);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(cache.is_empty());
        assert!(cache.registered_tags().is_empty());
    }

    #[tokio::test]
    async fn entries_expire_after_ttl() {
        let clock = clock();
        let cache = OrgCache::new(clock.clone(), Duration::seconds(30));
        let calls = AtomicUsize::new(0);
        let ctx = ctx(DataClassification::Official);

        read(&cache, &ctx, &calls).await;
        clock.advance(Duration::seconds(31));
        assert_eq!(read(&cache, &ctx, &calls).await.mode, CachedReadMode::Miss);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn higher_tier_writers_invalidate_official_entries() {
        let cache = OrgCache::with_default_ttl(clock());
        let calls = AtomicUsize::new(0);
        let ctx = ctx(DataClassification::Official);
        read(&cache, &ctx, &calls).await;

        let removed = cache
            .invalidate_org_cache(
                &OrgId::new("org-2"),
                CACHE_SCOPE_HR_PROFILES,
                DataClassification::TopSecret,
                DataResidency::UkOnly,
            )
            .unwrap();
        assert_eq!(removed, 0);

        let removed = cache
            .invalidate_org_cache(
                &OrgId::new("org-1"),
                CACHE_SCOPE_HR_PROFILES,
                DataClassification::Secret,
                DataResidency::UkOnly,
            )
            .unwrap();
        assert_eq!(removed, 1);
        assert_eq!(read(&cache, &ctx, &calls).await.mode, CachedReadMode::Miss);
    }

    #[tokio::test]
    async fn loader_errors_are_not_cached() {
        let cache = OrgCache::with_default_ttl(clock());
        let ctx = ctx(DataClassification::Official);
        let result: DomainResult<CachedRead<String>> = cache
            .cached_read(&ctx, &[CACHE_SCOPE_HR_PROFILES], "missing", || async {
                Err(DomainError::not_found("EmployeeProfile"))
            })
            .await;
        assert_eq!(result.unwrap_err(), DomainError::not_found("EmployeeProfile"));
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn expired_entries_are_pruned_once_capacity_is_reached() {
        let clock = clock();
        let cache = OrgCache::new(clock.clone(), Duration::seconds(60)).with_max_entries(16);
        let calls = AtomicUsize::new(0);

        for i in 0..500 {
            let ctx = ctx_for(&format!("user-{i}"), DataClassification::Official);
            read(&cache, &ctx, &calls).await;
            clock.advance(Duration::seconds(120));
        }
        assert!(cache.len() <= 16, "cache grew to {}", cache.len());
    }

    #[tokio::test]
    async fn least_recently_used_entries_are_evicted_at_capacity() {
        let clock = clock();
        let cache = OrgCache::with_default_ttl(clock.clone()).with_max_entries(4);
        let calls = AtomicUsize::new(0);
        let first = ctx_for("user-0", DataClassification::Official);
        read(&cache, &first, &calls).await;

        for i in 1..10 {
            clock.advance(Duration::seconds(1));
            read(&cache, &ctx_for(&format!("user-{i}"), DataClassification::Official), &calls).await;
            // keep the first reader warm
            assert_eq!(read(&cache, &first, &calls).await.mode, CachedReadMode::Hit);
        }
        assert!(cache.len() <= 4);
    }

    #[tokio::test]
    async fn load_overlapping_an_invalidation_is_not_stored() {
        let cache = OrgCache::with_default_ttl(clock());
        let ctx = ctx(DataClassification::Official);

        let stale: CachedRead<Vec<String>> = cache
            .cached_read(&ctx, &[CACHE_SCOPE_ABAC_POLICIES], "policies", || async {
                // a writer replaces the list while this load is in flight
                cache
                    .invalidate_org_cache(
                        &OrgId::new("org-1"),
                        CACHE_SCOPE_ABAC_POLICIES,
                        DataClassification::Official,
                        DataResidency::UkOnly,
                    )
                    .unwrap();
                Ok(Vec::new())
            })
            .await
            .unwrap();
        assert_eq!(stale.mode, CachedReadMode::Miss);
        assert!(cache.is_empty());

        let fresh: CachedRead<Vec<String>> = cache
            .cached_read(&ctx, &[CACHE_SCOPE_ABAC_POLICIES], "policies", || async {
                Ok(vec!["deny-all".to_string()])
            })
            .await
            .unwrap();
        assert_eq!(fresh.mode, CachedReadMode::Miss);
        assert_eq!(fresh.value, vec!["deny-all".to_string()]);
    }
}
