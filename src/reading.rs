//! Shared reading cache.
//!
//! The one piece of state both BLE roles touch. The upstream link writes
//! single fields as notifications arrive, the command path writes the
//! fields its records carry, and the relay loop takes whole-record
//! snapshots on its own cadence.
//!
//! A single `embassy_sync` mutex guards the whole record. Writers wait for
//! it; the relay loop only ever *tries* it and falls back to its previous
//! snapshot, so publishing never stalls behind a writer. The guard is
//! dropped before any transport I/O.

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::mutex::Mutex;

/// Most recent values seen from the source and the command input.
///
/// Every field holds the last value written for it, or 0 before the first
/// write.
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Reading {
    /// Sensor value from the source (heart rate).
    pub primary: u8,
    /// Command value, or posture in the two-field input variant.
    pub secondary: u8,
    /// Movement flag in the two-field input variant.
    pub tertiary: u8,
}

/// Names one field of a [`Reading`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Field {
    Primary,
    Secondary,
    Tertiary,
}

impl Reading {
    pub const fn new() -> Self {
        Self {
            primary: 0,
            secondary: 0,
            tertiary: 0,
        }
    }

    pub fn get(&self, field: Field) -> u8 {
        match field {
            Field::Primary => self.primary,
            Field::Secondary => self.secondary,
            Field::Tertiary => self.tertiary,
        }
    }

    pub fn set(&mut self, field: Field, value: u8) {
        match field {
            Field::Primary => self.primary = value,
            Field::Secondary => self.secondary = value,
            Field::Tertiary => self.tertiary = value,
        }
    }
}

/// Mutex-guarded [`Reading`], generic over the raw mutex so the firmware
/// can use `CriticalSectionRawMutex` and tests `NoopRawMutex`.
pub struct ReadingCache<M: RawMutex> {
    inner: Mutex<M, Reading>,
}

impl<M: RawMutex> ReadingCache<M> {
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(Reading::new()),
        }
    }

    /// Overwrite one field.
    pub async fn update(&self, field: Field, value: u8) {
        let mut reading = self.inner.lock().await;
        reading.set(field, value);
    }

    /// Overwrite several fields under a single lock acquisition.
    pub async fn update_many(&self, fields: &[(Field, u8)]) {
        let mut reading = self.inner.lock().await;
        for &(field, value) in fields {
            reading.set(field, value);
        }
    }

    /// Copy of the whole record, waiting for the lock if needed.
    pub async fn snapshot(&self) -> Reading {
        *self.inner.lock().await
    }

    /// Copy of the whole record, or `None` if a writer holds the lock.
    pub fn try_snapshot(&self) -> Option<Reading> {
        self.inner.try_lock().ok().map(|reading| *reading)
    }

    /// Hold the lock the way a slow writer would.
    #[cfg(test)]
    pub(crate) fn hold(&self) -> embassy_sync::mutex::MutexGuard<'_, M, Reading> {
        self.inner.try_lock().unwrap()
    }
}

impl<M: RawMutex> Default for ReadingCache<M> {
    fn default() -> Self {
        Self::new()
    }
}
