//! Latest-snapshot storage shared between refresh loops and readers.
//!
//! Each feed owns an independent slot holding an `Arc` to its current
//! snapshot. Readers clone the `Arc` and release the lock immediately;
//! writers build the new snapshot outside the lock and only swap the pointer
//! under it. There is no lock spanning several feeds.

use std::sync::{Arc, PoisonError, RwLock};

use crate::records::{Departure, EquipmentDetail, Feed, Parking, Snapshot};

/// One feed's current snapshot.
#[derive(Debug)]
pub struct Slot<T> {
    feed: Feed,
    current: RwLock<Arc<Snapshot<T>>>,
}

impl<T> Slot<T> {
    pub fn new(feed: Feed) -> Self {
        Self {
            feed,
            current: RwLock::new(Arc::new(Snapshot::empty(feed))),
        }
    }

    /// The snapshot visible right now. Later replacements do not affect it.
    pub fn get(&self) -> Arc<Snapshot<T>> {
        // poisoning cannot leave a half-written pointer behind
        let guard = self.current.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    /// Makes `records` the visible snapshot and returns the one it replaced.
    pub fn replace(&self, records: Vec<T>) -> Arc<Snapshot<T>> {
        let next = Arc::new(Snapshot::new(self.feed, records));
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *guard, next)
    }
}

/// Current snapshot of every feed.
#[derive(Debug)]
pub struct SnapshotStore {
    departures: Slot<Departure>,
    parkings: Slot<Parking>,
    equipments: Slot<EquipmentDetail>,
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self {
            departures: Slot::new(Feed::Departures),
            parkings: Slot::new(Feed::Parkings),
            equipments: Slot::new(Feed::Equipments),
        }
    }

    pub fn departures(&self) -> &Slot<Departure> {
        &self.departures
    }

    pub fn parkings(&self) -> &Slot<Parking> {
        &self.parkings
    }

    pub fn equipments(&self) -> &Slot<EquipmentDetail> {
        &self.equipments
    }
}

/// Picks the slot a record type lives in.
pub trait Stored: Sized {
    fn slot(store: &SnapshotStore) -> &Slot<Self>;
}

impl Stored for Departure {
    fn slot(store: &SnapshotStore) -> &Slot<Self> {
        store.departures()
    }
}

impl Stored for Parking {
    fn slot(store: &SnapshotStore) -> &Slot<Self> {
        store.parkings()
    }
}

impl Stored for EquipmentDetail {
    fn slot(store: &SnapshotStore) -> &Slot<Self> {
        store.equipments()
    }
}
