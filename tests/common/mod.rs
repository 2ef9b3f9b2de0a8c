//! Shared utilities for agent integration tests.

#![allow(dead_code)]

use std::collections::{BTreeSet, HashSet};
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, RwLock};
use std::time::Duration;

use masq_agent::maps::MapOp;
use masq_agent::{AgentSettings, Cidr, CidrMap, MapError};

pub fn cidr(s: &str) -> Cidr {
    s.parse().unwrap()
}

/// Settings tuned so tests converge in well under a second.
pub fn fast_settings() -> AgentSettings {
    AgentSettings {
        debounce_ms: 50,
        max_debounce_ms: 500,
        poll_interval_ms: 100,
        resync_interval_secs: 3600,
        retry_base_ms: 50,
        retry_max_ms: 500,
    }
}

/// In-memory map with the kernel map's contract plus call recording and
/// failure injection.
#[derive(Default)]
pub struct RecordingMap {
    cidrs: RwLock<BTreeSet<Cidr>>,
    failing_updates: Mutex<HashSet<Cidr>>,
    fail_dump: AtomicBool,
    history: Mutex<Vec<(MapOp, Cidr)>>,
    dumps: AtomicUsize,
    update_delay_ms: AtomicU64,
}

impl RecordingMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries(entries: &[&str]) -> Self {
        let map = Self::new();
        for entry in entries {
            map.insert_out_of_band(entry);
        }
        map
    }

    /// Mutate the map behind the agent's back.
    pub fn insert_out_of_band(&self, entry: &str) {
        self.cidrs.write().unwrap().insert(cidr(entry));
    }

    pub fn fail_updates_for(&self, entry: &str) {
        self.failing_updates.lock().unwrap().insert(cidr(entry));
    }

    pub fn clear_failures(&self) {
        self.failing_updates.lock().unwrap().clear();
        self.fail_dump.store(false, Ordering::SeqCst);
    }

    pub fn set_dump_failure(&self, fail: bool) {
        self.fail_dump.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent `update` block for `delay` before applying.
    pub fn slow_updates(&self, delay: Duration) {
        self.update_delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    /// Current contents as sorted strings.
    pub fn snapshot(&self) -> Vec<String> {
        self.cidrs.read().unwrap().iter().map(ToString::to_string).collect()
    }

    /// Successful and failed update/delete calls, in order.
    pub fn history(&self) -> Vec<(MapOp, Cidr)> {
        self.history.lock().unwrap().clone()
    }

    pub fn mutation_calls(&self) -> usize {
        self.history.lock().unwrap().len()
    }

    pub fn dump_calls(&self) -> usize {
        self.dumps.load(Ordering::SeqCst)
    }
}

impl CidrMap for RecordingMap {
    fn update(&self, cidr: Cidr) -> Result<(), MapError> {
        self.history.lock().unwrap().push((MapOp::Update, cidr));
        let delay = self.update_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            std::thread::sleep(Duration::from_millis(delay));
        }
        if self.failing_updates.lock().unwrap().contains(&cidr) {
            return Err(MapError::Unavailable(format!("injected failure for {cidr}")));
        }

        let mut cidrs = self.cidrs.write().unwrap();
        if !cidrs.insert(cidr) {
            return Err(MapError::AlreadyExists(cidr));
        }
        Ok(())
    }

    fn delete(&self, cidr: Cidr) -> Result<(), MapError> {
        self.history.lock().unwrap().push((MapOp::Delete, cidr));

        let mut cidrs = self.cidrs.write().unwrap();
        if !cidrs.remove(&cidr) {
            return Err(MapError::NotFound(cidr));
        }
        Ok(())
    }

    fn dump(&self) -> Result<Vec<Cidr>, MapError> {
        self.dumps.fetch_add(1, Ordering::SeqCst);
        if self.fail_dump.load(Ordering::SeqCst) {
            return Err(MapError::Unavailable("injected dump failure".into()));
        }
        Ok(self.cidrs.read().unwrap().iter().copied().collect())
    }
}

/// Poll `cond` until it holds or `timeout` elapses.
pub async fn wait_until<F>(timeout: Duration, mut cond: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if cond() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

/// Run `fut` with a generous upper bound so a hung agent fails the test.
pub async fn bounded<T>(fut: impl Future<Output = T>) -> T {
    tokio::time::timeout(Duration::from_secs(10), fut)
        .await
        .expect("operation timed out")
}
