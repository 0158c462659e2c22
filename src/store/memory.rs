use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::NaiveDate;
use dashmap::DashMap;
use ulid::Ulid;

use crate::engine::EngineError;
use crate::model::*;

use super::Store;

pub struct MemoryStore {
    resources: DashMap<ResourceId, Resource>,
    templates: DashMap<ResourceId, Vec<WeeklyTemplate>>,
    overrides: DashMap<ResourceId, BTreeMap<NaiveDate, DateOverride>>,
    /// Sorted by `span.start`.
    blackouts: DashMap<ResourceId, Vec<BlackoutPeriod>>,
    reservations: DashMap<Ulid, Reservation>,
    by_resource: DashMap<ResourceId, Vec<Ulid>>,
    notifications: DashMap<Ulid, ScheduledNotification>,
    goals: DashMap<Ulid, Goal>,
    /// Creation order per user.
    goals_by_user: DashMap<UserId, Vec<Ulid>>,
    /// Reverse lookup: template/blackout id → resource id
    entity_to_resource: DashMap<Ulid, ResourceId>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            resources: DashMap::new(),
            templates: DashMap::new(),
            overrides: DashMap::new(),
            blackouts: DashMap::new(),
            reservations: DashMap::new(),
            by_resource: DashMap::new(),
            notifications: DashMap::new(),
            goals: DashMap::new(),
            goals_by_user: DashMap::new(),
            entity_to_resource: DashMap::new(),
        }
    }

    pub fn get_resource_for_entity(&self, entity_id: &Ulid) -> Option<ResourceId> {
        self.entity_to_resource.get(entity_id).map(|e| *e.value())
    }

    // ── Event application ────────────────────────────────────

    pub fn apply_event(&self, event: &Event) {
        match event {
            Event::ResourceRegistered { id, owner } => {
                self.resources.insert(*id, Resource { id: *id, owner: *owner });
            }
            Event::TemplateSaved { template } => {
                let mut list = self.templates.entry(template.resource_id).or_default();
                match list.iter_mut().find(|t| t.id == template.id) {
                    Some(existing) => *existing = template.clone(),
                    None => list.push(template.clone()),
                }
                self.entity_to_resource.insert(template.id, template.resource_id);
            }
            Event::OverrideSaved { date_override } => {
                self.overrides
                    .entry(date_override.resource_id)
                    .or_default()
                    .insert(date_override.date, date_override.clone());
            }
            Event::OverrideRemoved { resource_id, date } => {
                if let Some(mut by_date) = self.overrides.get_mut(resource_id) {
                    by_date.remove(date);
                }
            }
            Event::BlackoutSaved { blackout } => {
                let mut list = self.blackouts.entry(blackout.resource_id).or_default();
                list.retain(|b| b.id != blackout.id);
                let pos = list
                    .binary_search_by_key(&blackout.span.start, |b| b.span.start)
                    .unwrap_or_else(|e| e);
                list.insert(pos, blackout.clone());
                self.entity_to_resource.insert(blackout.id, blackout.resource_id);
            }
            Event::BlackoutRemoved { id, resource_id } => {
                if let Some(mut list) = self.blackouts.get_mut(resource_id) {
                    list.retain(|b| b.id != *id);
                }
                self.entity_to_resource.remove(id);
            }
            Event::ReservationSaved { reservation } => {
                let is_new = self
                    .reservations
                    .insert(reservation.id, reservation.clone())
                    .is_none();
                if is_new {
                    self.by_resource
                        .entry(reservation.resource_id)
                        .or_default()
                        .push(reservation.id);
                }
            }
            Event::NotificationScheduled { notification } => {
                self.notifications.insert(notification.id, notification.clone());
            }
            Event::NotificationDelivered { id } => {
                if let Some(mut n) = self.notifications.get_mut(id) {
                    n.delivered = true;
                }
            }
            Event::NotificationsDiscarded { reservation_id } => {
                self.notifications
                    .retain(|_, n| n.delivered || n.payload.reservation_id() != *reservation_id);
            }
            Event::GoalSaved { goal } => {
                if self.goals.insert(goal.id, goal.clone()).is_none() {
                    self.goals_by_user.entry(goal.user_id).or_default().push(goal.id);
                }
            }
            Event::GoalLinked {
                goal_id,
                reservation_id,
            } => {
                if let Some(mut g) = self.goals.get_mut(goal_id) {
                    // First link wins.
                    if g.linked_reservation.is_none() {
                        g.linked_reservation = Some(*reservation_id);
                    }
                }
            }
        }
    }

    /// Minimal event sequence that recreates the current state.
    /// Delivered notifications are dropped.
    pub fn snapshot(&self) -> Vec<Event> {
        let mut events = Vec::new();

        let mut resources: Vec<Resource> = self.resources.iter().map(|e| *e.value()).collect();
        resources.sort_by_key(|r| r.id);
        for r in resources {
            events.push(Event::ResourceRegistered { id: r.id, owner: r.owner });
        }

        for entry in self.templates.iter() {
            for template in entry.value() {
                events.push(Event::TemplateSaved {
                    template: template.clone(),
                });
            }
        }
        for entry in self.overrides.iter() {
            for date_override in entry.value().values() {
                events.push(Event::OverrideSaved {
                    date_override: date_override.clone(),
                });
            }
        }
        for entry in self.blackouts.iter() {
            for blackout in entry.value() {
                events.push(Event::BlackoutSaved {
                    blackout: blackout.clone(),
                });
            }
        }

        let mut reservations: Vec<Reservation> =
            self.reservations.iter().map(|e| e.value().clone()).collect();
        reservations.sort_by_key(|r| r.id);
        events.extend(
            reservations
                .into_iter()
                .map(|reservation| Event::ReservationSaved { reservation }),
        );

        let mut pending: Vec<ScheduledNotification> = self
            .notifications
            .iter()
            .filter(|e| !e.value().delivered)
            .map(|e| e.value().clone())
            .collect();
        pending.sort_by_key(|n| n.id);
        events.extend(
            pending
                .into_iter()
                .map(|notification| Event::NotificationScheduled { notification }),
        );

        for entry in self.goals_by_user.iter() {
            for id in entry.value() {
                if let Some(goal) = self.goals.get(id) {
                    events.push(Event::GoalSaved {
                        goal: goal.value().clone(),
                    });
                }
            }
        }

        events
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn commit(&self, event: Event) -> Result<(), EngineError> {
        self.apply_event(&event);
        Ok(())
    }

    async fn resource(&self, id: ResourceId) -> Result<Option<Resource>, EngineError> {
        Ok(self.resources.get(&id).map(|e| *e.value()))
    }

    async fn weekly_templates(&self, resource_id: ResourceId) -> Result<Vec<WeeklyTemplate>, EngineError> {
        Ok(self
            .templates
            .get(&resource_id)
            .map(|e| e.value().clone())
            .unwrap_or_default())
    }

    async fn weekly_template(&self, id: Ulid) -> Result<Option<WeeklyTemplate>, EngineError> {
        let Some(resource_id) = self.get_resource_for_entity(&id) else {
            return Ok(None);
        };
        Ok(self
            .templates
            .get(&resource_id)
            .and_then(|list| list.iter().find(|t| t.id == id).cloned()))
    }

    async fn date_overrides(
        &self,
        resource_id: ResourceId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<DateOverride>, EngineError> {
        if from > to {
            return Ok(Vec::new());
        }
        Ok(self
            .overrides
            .get(&resource_id)
            .map(|by_date| by_date.range(from..=to).map(|(_, o)| o.clone()).collect())
            .unwrap_or_default())
    }

    async fn blackout_periods(
        &self,
        resource_id: ResourceId,
        window: &Span,
    ) -> Result<Vec<BlackoutPeriod>, EngineError> {
        let Some(list) = self.blackouts.get(&resource_id) else {
            return Ok(Vec::new());
        };
        // Everything at index >= right_bound starts at or after window.end.
        let right_bound = list.partition_point(|b| b.span.start < window.end);
        Ok(list[..right_bound]
            .iter()
            .filter(|b| b.recurring || b.span.end > window.start)
            .cloned()
            .collect())
    }

    async fn blackout(&self, id: Ulid) -> Result<Option<BlackoutPeriod>, EngineError> {
        let Some(resource_id) = self.get_resource_for_entity(&id) else {
            return Ok(None);
        };
        Ok(self
            .blackouts
            .get(&resource_id)
            .and_then(|list| list.iter().find(|b| b.id == id).cloned()))
    }

    async fn reservation(&self, id: Ulid) -> Result<Option<Reservation>, EngineError> {
        Ok(self.reservations.get(&id).map(|e| e.value().clone()))
    }

    async fn reservations_by_resource(
        &self,
        resource_id: ResourceId,
        statuses: &[ReservationStatus],
    ) -> Result<Vec<Reservation>, EngineError> {
        let ids = self
            .by_resource
            .get(&resource_id)
            .map(|e| e.value().clone())
            .unwrap_or_default();
        let mut out: Vec<Reservation> = ids
            .iter()
            .filter_map(|id| self.reservations.get(id).map(|e| e.value().clone()))
            .filter(|r| statuses.is_empty() || statuses.contains(&r.status))
            .collect();
        out.sort_by_key(|r| (r.span.start, r.id));
        Ok(out)
    }

    async fn due_notifications(&self, now: Ms) -> Result<Vec<ScheduledNotification>, EngineError> {
        let mut due: Vec<ScheduledNotification> = self
            .notifications
            .iter()
            .filter(|e| !e.value().delivered && e.value().fire_at <= now)
            .map(|e| e.value().clone())
            .collect();
        due.sort_by_key(|n| (n.fire_at, n.id));
        Ok(due)
    }

    async fn pending_notifications(&self) -> Result<Vec<ScheduledNotification>, EngineError> {
        let mut pending: Vec<ScheduledNotification> = self
            .notifications
            .iter()
            .filter(|e| !e.value().delivered)
            .map(|e| e.value().clone())
            .collect();
        pending.sort_by_key(|n| (n.fire_at, n.id));
        Ok(pending)
    }

    async fn open_goals(&self, user: UserId) -> Result<Vec<Goal>, EngineError> {
        let ids = self
            .goals_by_user
            .get(&user)
            .map(|e| e.value().clone())
            .unwrap_or_default();
        Ok(ids
            .iter()
            .filter_map(|id| self.goals.get(id).map(|e| e.value().clone()))
            .filter(Goal::is_open_and_unlinked)
            .collect())
    }

    async fn goal(&self, id: Ulid) -> Result<Option<Goal>, EngineError> {
        Ok(self.goals.get(&id).map(|e| e.value().clone()))
    }
}
