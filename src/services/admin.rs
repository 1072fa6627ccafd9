//! Back-office mutations with optimistic cache updates.
//!
//! Every create/update/delete first writes the expected list into the cache, then calls the
//! backend. Success invalidates the resource tag so the next read refetches; failure puts
//! the previous list back.

use std::future::Future;
use tokio::sync::Mutex;
use uuid::Uuid;
use validator::Validate;
use crate::api::{Resource, ResourceRemote};
use crate::cache::{QueryCache, QueryKey};
use crate::domain::events::{AdminEvent, DomainEvent};
use crate::Result;

pub struct AdminService<C> {
    remote: C,
    cache: QueryCache,
    events: Mutex<Vec<DomainEvent>>,
}

impl<C> AdminService<C> {
    pub fn new(remote: C, cache: QueryCache) -> Self {
        Self { remote, cache, events: Mutex::new(vec![]) }
    }

    pub async fn list<R: Resource>(&self) -> Result<Vec<R>>
    where
        C: ResourceRemote<R>,
    {
        self.cache.fetch(QueryKey::list(R::TAG), || ResourceRemote::<R>::list(&self.remote)).await
    }

    /// Creates an entry. Until the backend answers, the cached list shows a placeholder
    /// with a `tmp-` id.
    pub async fn create<R: Resource>(&self, draft: &R::Draft) -> Result<R>
    where
        C: ResourceRemote<R>,
    {
        draft.validate()?;
        let placeholder = R::preview(draft, format!("tmp-{}", Uuid::now_v7()));
        self.mutate::<R, _, _, _>("create", move |list| list.push(placeholder), ResourceRemote::<R>::create(&self.remote, draft)).await
    }

    pub async fn update<R: Resource>(&self, id: &str, draft: &R::Draft) -> Result<R>
    where
        C: ResourceRemote<R>,
    {
        draft.validate()?;
        self.mutate::<R, _, _, _>(
            "update",
            |list| {
                if let Some(entry) = list.iter_mut().find(|e| e.id() == id) { *entry = entry.patched(draft); }
            },
            ResourceRemote::<R>::update(&self.remote, id, draft),
        )
        .await
    }

    pub async fn delete<R: Resource>(&self, id: &str) -> Result<()>
    where
        C: ResourceRemote<R>,
    {
        self.mutate::<R, _, _, _>("delete", |list| list.retain(|e| e.id() != id), ResourceRemote::<R>::delete(&self.remote, id)).await
    }

    pub async fn take_events(&self) -> Vec<DomainEvent> { std::mem::take(&mut *self.events.lock().await) }

    async fn mutate<R, T, F, Fut>(&self, action: &str, optimistic: F, call: Fut) -> Result<T>
    where
        R: Resource,
        F: FnOnce(&mut Vec<R>),
        Fut: Future<Output = Result<T>>,
    {
        let key = QueryKey::list(R::TAG);
        let snapshot: Option<Vec<R>> = self.cache.get(&key).await;
        // Only a list that is already cached gets an optimistic version.
        if let Some(mut list) = snapshot.clone() {
            optimistic(&mut list);
            self.cache.insert(key.clone(), list).await;
        }

        match call.await {
            Ok(value) => {
                tracing::info!(resource = R::TAG, action, "admin mutation applied");
                self.cache.invalidate_tag(R::TAG);
                Ok(value)
            }
            Err(e) => {
                match snapshot {
                    Some(list) => self.cache.insert(key, list).await,
                    None => self.cache.remove(&key).await,
                }
                tracing::warn!(resource = R::TAG, action, error = %e, "admin mutation failed, rolled back");
                self.events.lock().await.push(DomainEvent::Admin(AdminEvent::MutationRolledBack { resource: R::TAG, reason: e.to_string() }));
                Err(e)
            }
        }
    }
}
