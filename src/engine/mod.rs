mod availability;
mod conflict;
mod error;
mod mutations;
mod queries;
mod sources;

pub use availability::{
    merge_overlapping, open_intervals, open_intervals_in_range, subtract_intervals, uncovered,
    AvailabilityPolicy,
};
pub use conflict::find_conflict;
pub(crate) use conflict::now_ms;
pub use error::EngineError;
pub use mutations::Confirmation;

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use ulid::Ulid;

use crate::config::EngineConfig;
use crate::ledger::RewardLedger;
use crate::model::*;
use crate::scheduler::NotificationScheduler;
use crate::store::Store;

pub type ResourceLock = Arc<Mutex<()>>;

/// Availability resolver, conflict checker, and reservation lifecycle over a [`Store`].
///
/// Transitions that must not race (accept, confirm, cancel) hold the resource's
/// lock across check-then-write. Availability reads take no lock.
pub struct Engine {
    pub(super) store: Arc<dyn Store>,
    pub(super) ledger: Arc<dyn RewardLedger>,
    pub(super) scheduler: NotificationScheduler,
    pub(super) config: EngineConfig,
    locks: DashMap<ResourceId, ResourceLock>,
    goal_locks: DashMap<UserId, Arc<Mutex<()>>>,
}

impl Engine {
    pub fn new(store: Arc<dyn Store>, ledger: Arc<dyn RewardLedger>, config: EngineConfig) -> Self {
        Self {
            scheduler: NotificationScheduler::new(store.clone()),
            store,
            ledger,
            config,
            locks: DashMap::new(),
            goal_locks: DashMap::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn scheduler(&self) -> &NotificationScheduler {
        &self.scheduler
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    fn resource_lock(&self, resource_id: ResourceId) -> ResourceLock {
        self.locks
            .entry(resource_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone()
    }

    fn goal_lock(&self, user: UserId) -> Arc<Mutex<()>> {
        self.goal_locks
            .entry(user)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone()
    }

    pub(super) async fn require_resource(&self, resource_id: ResourceId) -> Result<Resource, EngineError> {
        self.store
            .resource(resource_id)
            .await?
            .ok_or(EngineError::ResourceNotFound(resource_id))
    }

    /// Owner-only operations on availability data.
    pub(super) async fn require_owner(
        &self,
        actor: UserId,
        resource_id: ResourceId,
        action: &'static str,
    ) -> Result<Resource, EngineError> {
        let resource = self.require_resource(resource_id).await?;
        if resource.owner != actor {
            return Err(EngineError::NotAuthorizedParty { user: actor, action });
        }
        Ok(resource)
    }

    /// Lookup reservation → resource, acquire the resource lock, and re-read the
    /// reservation under it.
    pub(super) async fn lock_reservation(
        &self,
        id: Ulid,
    ) -> Result<(Reservation, OwnedMutexGuard<()>), EngineError> {
        let resource_id = self
            .store
            .reservation(id)
            .await?
            .ok_or(EngineError::ReservationNotFound(id))?
            .resource_id;
        let guard = self.resource_lock(resource_id).lock_owned().await;
        let reservation = self
            .store
            .reservation(id)
            .await?
            .ok_or(EngineError::ReservationNotFound(id))?;
        Ok((reservation, guard))
    }
}
