use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use uuid::Uuid;

/// Trait for providing the current time.
/// Decouples logic from `Utc::now()` so tests control the clock.
pub trait TimeProvider: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Trait for generating unique IDs.
/// Decouples logic from `Uuid::new_v4()` so tests are deterministic.
pub trait IdProvider: Send + Sync {
    fn new_id(&self) -> String;
}

/// Context holding the providers. Passed down to the ledger, registry
/// and settlement service.
#[derive(Clone)]
pub struct ServiceContext {
    pub time: Arc<dyn TimeProvider>,
    pub id: Arc<dyn IdProvider>,
}

impl ServiceContext {
    pub fn new_system() -> Self {
        Self {
            time: Arc::new(SystemTimeProvider),
            id: Arc::new(RandomIdProvider),
        }
    }

    pub fn new_simulated(start: DateTime<Utc>) -> Self {
        Self {
            time: Arc::new(SimulatedTimeProvider::new(start)),
            id: Arc::new(SequentialIdProvider::new()),
        }
    }
}

// --- Live implementations ---

pub struct SystemTimeProvider;

impl TimeProvider for SystemTimeProvider {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

pub struct RandomIdProvider;

impl IdProvider for RandomIdProvider {
    fn new_id(&self) -> String {
        Uuid::new_v4().to_string()
    }
}

// --- Simulated implementations ---

pub struct SimulatedTimeProvider {
    current_ms: AtomicI64,
}

impl SimulatedTimeProvider {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            current_ms: AtomicI64::new(start.timestamp_millis()),
        }
    }

    pub fn set(&self, at: DateTime<Utc>) {
        self.current_ms.store(at.timestamp_millis(), Ordering::SeqCst);
    }

    pub fn advance_ms(&self, delta: i64) {
        self.current_ms.fetch_add(delta, Ordering::SeqCst);
    }
}

impl TimeProvider for SimulatedTimeProvider {
    fn now(&self) -> DateTime<Utc> {
        let ms = self.current_ms.load(Ordering::SeqCst);
        Utc.timestamp_millis_opt(ms).unwrap()
    }
}

pub struct SequentialIdProvider {
    counter: Mutex<u64>,
}

impl SequentialIdProvider {
    pub fn new() -> Self {
        Self {
            counter: Mutex::new(0),
        }
    }
}

impl Default for SequentialIdProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl IdProvider for SequentialIdProvider {
    fn new_id(&self) -> String {
        let mut n = self.counter.lock();
        *n += 1;
        format!("00000000-0000-0000-0000-{:012x}", *n)
    }
}
