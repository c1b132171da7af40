use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, RwLock};

use orgcentral_auth::{
    GuardViolation, RepositoryAuthorizationContext, TenantAccessGuard, WriteOperation,
};
use orgcentral_core::{DomainError, DomainResult, Entity, OrgId, TenantScoped};

use crate::audit::{AuditEvent, AuditLogger, record_best_effort};
use crate::cache::OrgCache;

/// Primary-key record storage.
///
/// Lookups are by id only, exactly like a database row fetch: the caller's
/// org is *not* part of the key, so the guard has to run on every result.
pub trait RecordStore<T: Entity>: Send + Sync {
    fn get(&self, id: &T::Id) -> Option<T>;
    fn upsert(&self, record: T);
    fn remove(&self, id: &T::Id) -> Option<T>;
    fn list_for_org(&self, org_id: &OrgId) -> Vec<T>;
}

impl<T, S> RecordStore<T> for Arc<S>
where
    T: Entity,
    S: RecordStore<T> + ?Sized,
{
    fn get(&self, id: &T::Id) -> Option<T> {
        (**self).get(id)
    }

    fn upsert(&self, record: T) {
        (**self).upsert(record)
    }

    fn remove(&self, id: &T::Id) -> Option<T> {
        (**self).remove(id)
    }

    fn list_for_org(&self, org_id: &OrgId) -> Vec<T> {
        (**self).list_for_org(org_id)
    }
}

/// In-memory record store for tests/dev.
#[derive(Debug)]
pub struct InMemoryRecordStore<T: Entity> {
    inner: RwLock<HashMap<T::Id, T>>,
}

impl<T: Entity> InMemoryRecordStore<T> {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }
}

impl<T: Entity> Default for InMemoryRecordStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> RecordStore<T> for InMemoryRecordStore<T>
where
    T: Entity + TenantScoped + Clone + Send + Sync,
    T::Id: Send + Sync,
{
    fn get(&self, id: &T::Id) -> Option<T> {
        let map = self.inner.read().ok()?;
        map.get(id).cloned()
    }

    fn upsert(&self, record: T) {
        if let Ok(mut map) = self.inner.write() {
            map.insert(record.id().clone(), record);
        }
    }

    fn remove(&self, id: &T::Id) -> Option<T> {
        self.inner.write().ok()?.remove(id)
    }

    fn list_for_org(&self, org_id: &OrgId) -> Vec<T> {
        let map = match self.inner.read() {
            Ok(m) => m,
            Err(_) => return vec![],
        };

        map.values()
            .filter(|r| r.org_id() == Some(org_id))
            .cloned()
            .collect()
    }
}

/// Guarded access to one kind of org-scoped record.
///
/// Every read runs [`TenantAccessGuard::assert_readable`] on the fetched row,
/// every write runs [`TenantAccessGuard::assert_writable`] before touching
/// storage. Violations are audited and logged before the error is returned.
pub struct TenantScopedRepository<T, S> {
    store: S,
    guard: TenantAccessGuard,
    audit: Arc<dyn AuditLogger>,
    resource_type: &'static str,
    /// Cache scope cleared after every successful write.
    invalidates: Option<(Arc<OrgCache>, &'static str)>,
    _record: std::marker::PhantomData<fn() -> T>,
}

impl<T, S> TenantScopedRepository<T, S>
where
    T: Entity + TenantScoped + Clone,
    S: RecordStore<T>,
{
    pub fn new(store: S, audit: Arc<dyn AuditLogger>, resource_type: &'static str) -> Self {
        Self {
            store,
            guard: TenantAccessGuard,
            audit,
            resource_type,
            invalidates: None,
            _record: std::marker::PhantomData,
        }
    }

    pub fn invalidating(mut self, cache: Arc<OrgCache>, scope: &'static str) -> Self {
        self.invalidates = Some((cache, scope));
        self
    }

    fn invalidate(&self, ctx: &RepositoryAuthorizationContext) -> DomainResult<()> {
        if let Some((cache, scope)) = &self.invalidates {
            cache.invalidate_org_cache(ctx.org_id(), scope, ctx.data_classification(), ctx.data_residency())?;
        }
        Ok(())
    }

    pub fn resource_type(&self) -> &'static str {
        self.resource_type
    }

    /// Fetch by id; `NotFound` when absent, guard failure when not readable.
    pub async fn find_by_id(
        &self,
        ctx: &RepositoryAuthorizationContext,
        id: &T::Id,
    ) -> DomainResult<T> {
        let record = self
            .store
            .get(id)
            .ok_or_else(|| DomainError::not_found(self.resource_type))?;
        self.check(ctx, self.guard.assert_readable(&record, ctx, self.resource_type))
            .await?;
        Ok(record)
    }

    /// Records owned by the caller's org that the caller may read.
    pub async fn list(&self, ctx: &RepositoryAuthorizationContext) -> DomainResult<Vec<T>> {
        let owned = self.store.list_for_org(ctx.org_id());
        let total = owned.len();
        let readable: Vec<T> = owned
            .into_iter()
            .filter(|r| self.guard.assert_readable(r, ctx, self.resource_type).is_ok())
            .collect();
        if readable.len() < total {
            tracing::debug!(
                resource_type = self.resource_type,
                hidden = total - readable.len(),
                "records filtered by classification or residency"
            );
        }
        Ok(readable)
    }

    pub async fn create(&self, ctx: &RepositoryAuthorizationContext, record: T) -> DomainResult<T> {
        self.check(
            ctx,
            self.guard
                .assert_writable(record.org_id(), ctx, self.resource_type, WriteOperation::Create),
        )
        .await?;
        self.store.upsert(record.clone());
        self.invalidate(ctx)?;
        Ok(record)
    }

    /// Load, guard, mutate, persist. The owning org cannot be changed.
    pub async fn update<F>(
        &self,
        ctx: &RepositoryAuthorizationContext,
        id: &T::Id,
        mutate: F,
    ) -> DomainResult<T>
    where
        F: FnOnce(&mut T),
    {
        let mut record = self
            .store
            .get(id)
            .ok_or_else(|| DomainError::not_found(self.resource_type))?;
        self.check(
            ctx,
            self.guard
                .assert_writable(record.org_id(), ctx, self.resource_type, WriteOperation::Update),
        )
        .await?;

        mutate(&mut record);
        if record.org_id() != Some(ctx.org_id()) {
            return Err(DomainError::validation("Record organization cannot be changed."));
        }
        self.store.upsert(record.clone());
        self.invalidate(ctx)?;
        Ok(record)
    }

    pub async fn delete(&self, ctx: &RepositoryAuthorizationContext, id: &T::Id) -> DomainResult<()> {
        let record = self
            .store
            .get(id)
            .ok_or_else(|| DomainError::not_found(self.resource_type))?;
        self.check(
            ctx,
            self.guard
                .assert_writable(record.org_id(), ctx, self.resource_type, WriteOperation::Delete),
        )
        .await?;
        self.store.remove(id);
        self.invalidate(ctx)
    }

    async fn check(
        &self,
        ctx: &RepositoryAuthorizationContext,
        outcome: Result<(), GuardViolation>,
    ) -> DomainResult<()> {
        let Err(violation) = outcome else {
            return Ok(());
        };
        tracing::error!(
            security_event = violation.event.event_type,
            org_id = %ctx.org_id(),
            user_id = %ctx.user_id(),
            resource_type = self.resource_type,
            reason = %violation.error.reason(),
            "tenant guard rejected access"
        );
        record_best_effort(self.audit.as_ref(), AuditEvent::security(ctx, &violation.event)).await;
        Err(violation.into())
    }
}
