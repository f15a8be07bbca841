//! In-memory stand-ins for the remote library and the page, shared by the
//! unit tests.

use serde_json::{json, Value};
use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::rc::Rc;
use tokio::sync::Notify;

use crate::client::Transport;
use crate::error::{Result, SyncError};
use crate::reconciler::{TrackRow, TrackView};
use crate::toggle::ToggleState;
use crate::track::TrackId;

#[derive(Clone, Debug)]
pub struct RecordedCall {
    pub endpoint: String,
    pub headers: Vec<(String, String)>,
    pub body: Value,
}

impl RecordedCall {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn uris(&self) -> Vec<String> {
        self.body["variables"]["uris"]
            .as_array()
            .map(|uris| {
                uris.iter()
                    .filter_map(|uri| uri.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Remote library answering the persisted queries from a set of saved URIs.
#[derive(Default)]
pub struct FakeLibrary {
    saved: RefCell<HashSet<String>>,
    calls: RefCell<Vec<RecordedCall>>,
    auth_required: Cell<bool>,
    offline: Cell<bool>,
    mutation_gate: RefCell<Option<Rc<Notify>>>,
    lookup_gate: RefCell<Option<Rc<Notify>>>,
}

impl FakeLibrary {
    pub fn with_saved(ids: &[&str]) -> Self {
        let library = Self::default();
        for id in ids {
            library.set_saved(id, true);
        }
        library
    }

    pub fn set_saved(&self, id: &str, saved: bool) {
        let uri = format!("spotify:track:{id}");
        if saved {
            self.saved.borrow_mut().insert(uri);
        } else {
            self.saved.borrow_mut().remove(&uri);
        }
    }

    pub fn is_saved(&self, id: &str) -> bool {
        self.saved.borrow().contains(&format!("spotify:track:{id}"))
    }

    /// Reject requests without an `authorization` header with a 401.
    pub fn require_auth(&self) {
        self.auth_required.set(true);
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.set(offline);
    }

    /// Makes add/remove calls wait until the returned gate is notified.
    pub fn gate_mutations(&self) -> Rc<Notify> {
        let gate = Rc::new(Notify::new());
        *self.mutation_gate.borrow_mut() = Some(Rc::clone(&gate));
        gate
    }

    /// Makes lookups wait until the returned gate is notified. The answer
    /// is taken when the call starts, like a response already on the wire.
    pub fn gate_lookups(&self) -> Rc<Notify> {
        let gate = Rc::new(Notify::new());
        *self.lookup_gate.borrow_mut() = Some(Rc::clone(&gate));
        gate
    }

    pub fn open_gates(&self) {
        self.mutation_gate.borrow_mut().take();
        self.lookup_gate.borrow_mut().take();
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.borrow().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.borrow().len()
    }

    pub fn last_call(&self) -> Option<RecordedCall> {
        self.calls.borrow().last().cloned()
    }
}

impl Transport for FakeLibrary {
    async fn post_query(
        &self,
        endpoint: &str,
        headers: &[(String, String)],
        body: String,
    ) -> Result<Value> {
        let body: Value = serde_json::from_str(&body)?;
        let call = RecordedCall {
            endpoint: endpoint.to_string(),
            headers: headers.to_vec(),
            body,
        };
        let uris = call.uris();
        let operation = call.body["operationName"].as_str().unwrap_or_default().to_string();
        let authorized = call.header("authorization").is_some();
        self.calls.borrow_mut().push(call);

        if self.offline.get() {
            return Err(SyncError::Network("offline".to_string()));
        }
        if self.auth_required.get() && !authorized {
            return Err(SyncError::Status(401));
        }

        if operation == "areEntitiesInLibrary" {
            let lookup: Vec<Value> = {
                let saved = self.saved.borrow();
                uris.iter()
                    .map(|uri| json!({"data": {"saved": saved.contains(uri)}}))
                    .collect()
            };
            let gate = self.lookup_gate.borrow().clone();
            if let Some(gate) = gate {
                gate.notified().await;
            }
            return Ok(json!({"data": {"lookup": lookup}}));
        }

        let gate = self.mutation_gate.borrow().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        let mut saved = self.saved.borrow_mut();
        match operation.as_str() {
            "addToLibrary" => {
                saved.extend(uris);
                Ok(json!({"data": {}}))
            }
            "removeFromLibrary" => {
                for uri in &uris {
                    saved.remove(uri);
                }
                Ok(json!({"data": {}}))
            }
            _ => Ok(json!({"errors": [{"message": "unknown operation"}]})),
        }
    }
}

/// A page whose rows are plain numbers; painting is recorded in order.
#[derive(Default)]
pub struct FakePage {
    rows: RefCell<Vec<TrackRow<u32>>>,
    now_playing: RefCell<Option<TrackRow<u32>>>,
    paints: RefCell<Vec<(u32, ToggleState)>>,
}

impl FakePage {
    pub fn with_rows(ids: &[&str]) -> Self {
        let page = Self::default();
        page.set_rows(ids);
        page
    }

    pub fn set_rows(&self, ids: &[&str]) {
        *self.rows.borrow_mut() = ids
            .iter()
            .enumerate()
            .map(|(idx, id)| TrackRow {
                handle: idx as u32,
                track_id: TrackId::from_base62(id).unwrap(),
            })
            .collect();
    }

    pub fn set_now_playing(&self, id: Option<&str>) {
        *self.now_playing.borrow_mut() = id.map(|id| TrackRow {
            handle: u32::MAX,
            track_id: TrackId::from_base62(id).unwrap(),
        });
    }

    pub fn take_paints(&self) -> Vec<(u32, ToggleState)> {
        std::mem::take(&mut *self.paints.borrow_mut())
    }
}

impl TrackView for FakePage {
    type Row = u32;

    fn visible_rows(&self) -> Vec<TrackRow<u32>> {
        self.rows.borrow().clone()
    }

    fn now_playing(&self) -> Option<TrackRow<u32>> {
        self.now_playing.borrow().clone()
    }

    fn paint(&self, row: &TrackRow<u32>, state: ToggleState) {
        self.paints.borrow_mut().push((row.handle, state));
    }
}
