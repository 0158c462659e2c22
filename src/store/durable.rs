use std::io;
use std::path::Path;

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::{mpsc, oneshot};
use ulid::Ulid;

use crate::engine::EngineError;
use crate::model::*;
use crate::wal::Wal;

use super::{MemoryStore, Store};

// ── Group-commit WAL channel ─────────────────────────────

enum WalCommand {
    Append {
        event: Event,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

type PendingAppend = (Event, oneshot::Sender<io::Result<()>>);

/// Background task that owns the WAL and batches appends for group commit.
/// 1. Block until the first Append arrives.
/// 2. Buffer it (no fsync).
/// 3. Drain all immediately available Appends (the batch window).
/// 4. Single flush_sync for the whole batch.
/// 5. Respond to all senders.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        let (event, response) = match cmd {
            WalCommand::Append { event, response } => (event, response),
            other => {
                handle_non_append(&mut wal, other);
                continue;
            }
        };
        let mut batch = vec![(event, response)];
        let mut deferred = None;

        loop {
            match rx.try_recv() {
                Ok(WalCommand::Append { event, response }) => batch.push((event, response)),
                Ok(other) => {
                    // Flush what we have first, then handle the non-append command.
                    deferred = Some(other);
                    break;
                }
                Err(_) => break, // channel empty, flush batch
            }
        }

        metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
        let flush_start = std::time::Instant::now();
        let result = flush_batch(&mut wal, &batch);
        metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
            .record(flush_start.elapsed().as_secs_f64());
        respond_batch(batch, &result);

        if let Some(other) = deferred {
            handle_non_append(&mut wal, other);
        }
    }
}

fn flush_batch(wal: &mut Wal, batch: &[PendingAppend]) -> io::Result<()> {
    let mut append_err: Option<io::Error> = None;
    for (event, _) in batch {
        if let Err(e) = wal.append_buffered(event) {
            append_err = Some(e);
            break;
        }
    }
    // Always flush, even on append error, so partially buffered bytes
    // don't leak into the next batch.
    let flush_err = wal.flush_sync().err();
    match (append_err, flush_err) {
        (Some(e), _) | (None, Some(e)) => Err(e),
        (None, None) => Ok(()),
    }
}

fn respond_batch(batch: Vec<PendingAppend>, result: &io::Result<()>) {
    for (_, tx) in batch {
        let r = match result {
            Ok(()) => Ok(()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = tx.send(r);
    }
}

fn handle_non_append(wal: &mut Wal, cmd: WalCommand) {
    match cmd {
        WalCommand::Compact { events, response } => {
            let result = Wal::write_compact_file(wal.path(), &events)
                .and_then(|()| wal.swap_compact_file());
            let _ = response.send(result);
        }
        WalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(wal.appends_since_compact());
        }
        WalCommand::Append { event, response } => {
            let batch = vec![(event, response)];
            let result = flush_batch(wal, &batch);
            respond_batch(batch, &result);
        }
    }
}

/// Event-sourced store: a [`MemoryStore`] whose every mutation is first made
/// durable in the write-ahead log. State is rebuilt by replay on open.
pub struct WalStore {
    inner: MemoryStore,
    wal_tx: mpsc::Sender<WalCommand>,
}

impl WalStore {
    /// Replay `path` and start the group-commit writer. Must run inside a tokio runtime.
    pub fn open(path: &Path) -> io::Result<Self> {
        let events = Wal::replay(path)?;
        let inner = MemoryStore::new();
        for event in &events {
            inner.apply_event(event);
        }
        tracing::info!("replayed {} events from {}", events.len(), path.display());

        let wal = Wal::open(path)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        Ok(Self { inner, wal_tx })
    }

    /// Write event to WAL via the background group-commit writer.
    async fn wal_append(&self, event: &Event) -> Result<(), EngineError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Append {
                event: event.clone(),
                response: tx,
            })
            .await
            .map_err(|_| EngineError::Storage("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::Storage("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::Storage(e.to_string()))
    }

    /// Rewrite the WAL with only the events needed to recreate the current state.
    pub async fn compact(&self) -> Result<(), EngineError> {
        let events = self.inner.snapshot();
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Compact { events, response: tx })
            .await
            .map_err(|_| EngineError::Storage("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::Storage("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::Storage(e.to_string()))
    }

    pub async fn appends_since_compact(&self) -> u64 {
        let (tx, rx) = oneshot::channel();
        if self
            .wal_tx
            .send(WalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}

#[async_trait]
impl Store for WalStore {
    async fn commit(&self, event: Event) -> Result<(), EngineError> {
        self.wal_append(&event).await?;
        self.inner.apply_event(&event);
        Ok(())
    }

    async fn resource(&self, id: ResourceId) -> Result<Option<Resource>, EngineError> {
        self.inner.resource(id).await
    }

    async fn weekly_templates(&self, resource_id: ResourceId) -> Result<Vec<WeeklyTemplate>, EngineError> {
        self.inner.weekly_templates(resource_id).await
    }

    async fn weekly_template(&self, id: Ulid) -> Result<Option<WeeklyTemplate>, EngineError> {
        self.inner.weekly_template(id).await
    }

    async fn date_overrides(
        &self,
        resource_id: ResourceId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<DateOverride>, EngineError> {
        self.inner.date_overrides(resource_id, from, to).await
    }

    async fn blackout_periods(
        &self,
        resource_id: ResourceId,
        window: &Span,
    ) -> Result<Vec<BlackoutPeriod>, EngineError> {
        self.inner.blackout_periods(resource_id, window).await
    }

    async fn blackout(&self, id: Ulid) -> Result<Option<BlackoutPeriod>, EngineError> {
        self.inner.blackout(id).await
    }

    async fn reservation(&self, id: Ulid) -> Result<Option<Reservation>, EngineError> {
        self.inner.reservation(id).await
    }

    async fn reservations_by_resource(
        &self,
        resource_id: ResourceId,
        statuses: &[ReservationStatus],
    ) -> Result<Vec<Reservation>, EngineError> {
        self.inner.reservations_by_resource(resource_id, statuses).await
    }

    async fn due_notifications(&self, now: Ms) -> Result<Vec<ScheduledNotification>, EngineError> {
        self.inner.due_notifications(now).await
    }

    async fn pending_notifications(&self) -> Result<Vec<ScheduledNotification>, EngineError> {
        self.inner.pending_notifications().await
    }

    async fn open_goals(&self, user: UserId) -> Result<Vec<Goal>, EngineError> {
        self.inner.open_goals(user).await
    }

    async fn goal(&self, id: Ulid) -> Result<Option<Goal>, EngineError> {
        self.inner.goal(id).await
    }
}
