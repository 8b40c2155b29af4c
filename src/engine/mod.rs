mod availability;
mod conflict;
mod error;
mod mutations;
mod queries;
mod store;

pub use availability::free_slots;
pub use conflict::{SlotCandidate, find_conflict, validate_range};
pub use error::{ConflictDetails, EngineError};
pub use store::ReservationStore;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{RwLock, mpsc, oneshot};
use ulid::Ulid;

use crate::model::*;
use crate::registry::ResourceCatalog;
use crate::wal::Wal;

pub type SharedBook = Arc<RwLock<ResourceBook>>;

// ── Group-commit WAL channel ─────────────────────────────

pub(super) enum WalCommand {
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

/// Background task that owns the WAL and batches appends for group commit.
/// 1. Block until the first Append arrives.
/// 2. Buffer it (no fsync).
/// 3. Drain all immediately available Appends (the batch window).
/// 4. Single flush_sync for the whole batch.
/// 5. Respond to each sender with its own outcome.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            WalCommand::Append { event, response } => {
                let mut batch = vec![(event, response)];

                // Drain all immediately available appends
                loop {
                    match rx.try_recv() {
                        Ok(WalCommand::Append { event, response }) => {
                            batch.push((event, response));
                        }
                        Ok(other) => {
                            // Flush current batch first, then handle the non-append command
                            flush_and_respond(&mut wal, &mut batch);
                            handle_non_append(&mut wal, other);
                            break;
                        }
                        Err(_) => break, // channel empty — flush batch
                    }
                }

                if !batch.is_empty() {
                    flush_and_respond(&mut wal, &mut batch);
                }
            }
            other => handle_non_append(&mut wal, other),
        }
    }
}

/// A caller gets `Ok` exactly when its record is durable on disk. `Err`
/// means the record is NOT on disk: callers that saw `Err` never apply
/// their event, and a record that replayed anyway would recreate a
/// reservation the conflict check never admitted.
fn flush_and_respond(wal: &mut Wal, batch: &mut Vec<(Event, oneshot::Sender<io::Result<()>>)>) {
    metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
    let flush_start = std::time::Instant::now();

    let base = wal.durable_len();
    let mut appended = 0usize;
    let mut append_err: Option<io::Error> = None;
    for (event, _) in batch.iter() {
        match wal.append_buffered(event) {
            Ok(()) => appended += 1,
            Err(e) => {
                append_err = Some(e);
                break;
            }
        }
    }

    let flush_err = wal.flush_sync().err();
    if flush_err.is_some() {
        // Durability of the buffered prefix is unknown; everyone gets Err,
        // so nothing from this batch may survive on disk.
        appended = 0;
        match base {
            Ok(base) => {
                if let Err(e) = wal.truncate_to(base) {
                    tracing::error!("WAL truncate after failed flush: {e}");
                }
            }
            Err(ref e) => tracing::error!("WAL length unknown, cannot truncate: {e}"),
        }
    }

    metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
        .record(flush_start.elapsed().as_secs_f64());

    for (i, (_, tx)) in batch.drain(..).enumerate() {
        let r = if i < appended {
            Ok(())
        } else if let Some(e) = flush_err.as_ref().or(append_err.as_ref()) {
            Err(io::Error::new(e.kind(), e.to_string()))
        } else {
            Err(io::Error::other("batch entry was not written"))
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
        WalCommand::Append { .. } => unreachable!(),
    }
}

/// The authoritative reservation store.
///
/// One `ResourceBook` per catalog entry, each behind its own `RwLock`. The
/// write lock is held across conflict check + WAL append + in-memory apply,
/// so creates are serialized per resource — two concurrent overlapping
/// requests for the same resource and day can never both succeed.
pub struct Engine {
    pub(super) books: DashMap<String, SharedBook>,
    pub catalog: Arc<ResourceCatalog>,
    wal_tx: mpsc::Sender<WalCommand>,
    /// Reverse lookup: reservation id → resource id.
    pub(super) reservation_index: DashMap<Ulid, String>,
}

/// Apply an event directly to a ResourceBook (no locking — caller holds the
/// lock) and keep the reverse index in step.
fn apply_to_book(book: &mut ResourceBook, event: &Event, index: &DashMap<Ulid, String>) {
    match event {
        Event::ReservationCreated { reservation } => {
            index.insert(reservation.id, reservation.resource_id.clone());
            book.insert(reservation.clone());
        }
        Event::ReservationDeleted { id, .. } => {
            book.remove(*id);
            index.remove(id);
        }
    }
}

impl Engine {
    pub fn new(wal_path: PathBuf, catalog: Arc<ResourceCatalog>) -> io::Result<Self> {
        let events = Wal::replay(&wal_path)?;
        let wal = Wal::open(&wal_path)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        let engine = Self {
            books: DashMap::new(),
            catalog,
            wal_tx,
            reservation_index: DashMap::new(),
        };

        // One book per catalog entry, up front. The set never changes at
        // runtime, so lookups after this point are infallible for known ids.
        for resource in engine.catalog.iter() {
            engine.books.insert(
                resource.id.clone(),
                Arc::new(RwLock::new(ResourceBook::new(resource.id.clone()))),
            );
        }

        // Replay — we're the sole owner of these Arcs, so try_write always
        // succeeds instantly. Never use blocking_write here because this may
        // run inside an async context.
        for event in &events {
            let resource_id = match event {
                Event::ReservationCreated { reservation } => reservation.resource_id.as_str(),
                Event::ReservationDeleted { resource_id, .. } => resource_id.as_str(),
            };
            match engine.books.get(resource_id) {
                Some(entry) => {
                    let book = entry.value().clone();
                    let mut guard = book.try_write().expect("replay: uncontended write");
                    apply_to_book(&mut guard, event, &engine.reservation_index);
                }
                None => {
                    // Catalog changed out from under an old WAL — skip, loudly.
                    tracing::warn!("replay: dropping event for unknown resource {resource_id}");
                }
            }
        }

        Ok(engine)
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
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()))
    }

    pub fn book(&self, resource_id: &str) -> Option<SharedBook> {
        self.books.get(resource_id).map(|e| e.value().clone())
    }

    pub(super) fn resource_for_reservation(&self, id: &Ulid) -> Option<String> {
        self.reservation_index.get(id).map(|e| e.value().clone())
    }

    /// Arc clones of every book, so callers can await locks without holding
    /// a DashMap shard reference across a suspension point.
    pub(super) fn books_snapshot(&self) -> Vec<SharedBook> {
        self.books.iter().map(|e| e.value().clone()).collect()
    }

    /// WAL-append + apply in one call, under the caller's write lock.
    pub(super) async fn persist_and_apply(
        &self,
        book: &mut ResourceBook,
        event: &Event,
    ) -> Result<(), EngineError> {
        self.wal_append(event).await?;
        apply_to_book(book, event, &self.reservation_index);
        Ok(())
    }

    /// Rewrite the WAL with only the events needed to recreate current state
    /// (one ReservationCreated per live reservation).
    ///
    /// Every book's read lock is held until the writer confirms the rewrite.
    /// A mutation admitted after its book was snapshotted would have its
    /// acknowledged append erased by a rewrite built from the stale
    /// snapshot; holding the locks forces such mutations to queue behind
    /// the Compact command instead.
    pub async fn compact_wal(&self) -> Result<(), EngineError> {
        let books = self.books_snapshot();
        let mut guards = Vec::with_capacity(books.len());
        for book in &books {
            guards.push(book.read().await);
        }

        let mut events = Vec::new();
        for guard in &guards {
            for reservation in guard.iter() {
                events.push(Event::ReservationCreated {
                    reservation: reservation.clone(),
                });
            }
        }

        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Compact { events, response: tx })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()))
    }

    pub async fn wal_appends_since_compact(&self) -> u64 {
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
