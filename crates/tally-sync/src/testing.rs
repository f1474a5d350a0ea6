//! In-memory [`RemoteStore`] for engine tests.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;
use tally_core::SyncTable;

use crate::error::{SyncError, SyncResult};
use crate::remote::{RemoteAck, RemoteStore, SyncBeacon, UpsertRequest};

#[derive(Default)]
struct State {
    records: HashMap<(SyncTable, String), Value>,
    calls: Vec<(SyncTable, String)>,
    beacons: Vec<SyncBeacon>,
    rejected: HashSet<String>,
    /// Successful upserts allowed before the link drops.
    online_for: Option<usize>,
}

#[derive(Clone, Default)]
pub struct MemoryRemote {
    state: Arc<Mutex<State>>,
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every upsert of this record id is refused.
    pub fn reject(&self, id: &str) {
        self.state.lock().unwrap().rejected.insert(id.to_string());
    }

    pub fn accept_all(&self) {
        self.state.lock().unwrap().rejected.clear();
    }

    /// Drops the connection after `n` more upserts.
    pub fn go_offline_after(&self, n: usize) {
        self.state.lock().unwrap().online_for = Some(n);
    }

    pub fn go_online(&self) {
        self.state.lock().unwrap().online_for = None;
    }

    pub fn record(&self, table: SyncTable, id: &str) -> Option<Value> {
        self.state
            .lock()
            .unwrap()
            .records
            .get(&(table, id.to_string()))
            .cloned()
    }

    pub fn record_count(&self, table: SyncTable) -> usize {
        self.state
            .lock()
            .unwrap()
            .records
            .keys()
            .filter(|(t, _)| *t == table)
            .count()
    }

    /// Upsert attempts in order, including refused ones.
    pub fn calls(&self) -> Vec<(SyncTable, String)> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn beacons(&self) -> Vec<SyncBeacon> {
        self.state.lock().unwrap().beacons.clone()
    }
}

#[async_trait]
impl RemoteStore for MemoryRemote {
    async fn upsert(&self, request: &UpsertRequest) -> SyncResult<RemoteAck> {
        let mut state = self.state.lock().unwrap();

        match state.online_for {
            Some(0) => return Err(SyncError::ConnectionFailed("link down".into())),
            Some(ref mut left) => *left -= 1,
            None => {}
        }

        state.calls.push((request.table, request.record_id.clone()));
        if state.rejected.contains(&request.record_id) {
            return Err(SyncError::RemoteRejected {
                table: request.table.to_string(),
                id: request.record_id.clone(),
                message: "rejected by test".into(),
            });
        }

        state
            .records
            .insert((request.table, request.record_id.clone()), request.payload.clone());
        Ok(RemoteAck {
            remote_id: Some(format!("remote-{}", request.record_id)),
        })
    }

    async fn beacon(&self, beacon: &SyncBeacon) -> SyncResult<()> {
        let mut state = self.state.lock().unwrap();
        if state.online_for == Some(0) {
            return Err(SyncError::ConnectionFailed("link down".into()));
        }
        state.beacons.push(beacon.clone());
        Ok(())
    }
}
