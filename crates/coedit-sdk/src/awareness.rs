//! Awareness broadcast: ephemeral per-participant state such as identity,
//! color and cursor.
//!
//! Every client owns one JSON field map and a clock. Updates carry the
//! clock, and a receiver keeps whichever state has the higher clock. A
//! `null` state in an update means the client left.

use crate::error::Result;
use coedit_text::{ListenerRegistry, Subscription};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Default time after which a silent remote client is dropped.
pub const DEFAULT_AWARENESS_TIMEOUT: Duration = Duration::from_secs(30);

/// The field map one client publishes.
pub type StateFields = serde_json::Map<String, Value>;

/// Unique identifier for an awareness client.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClientId(pub String);

impl ClientId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which clients a change touched.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AwarenessChange {
    pub added: Vec<ClientId>,
    pub updated: Vec<ClientId>,
    pub removed: Vec<ClientId>,
}

impl AwarenessChange {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.updated.is_empty() && self.removed.is_empty()
    }
}

/// What the awareness mirror needs from a presence broadcast.
pub trait AwarenessBroadcast {
    /// This participant's id.
    fn local_client_id(&self) -> &ClientId;

    /// Every known participant's fields, the local one included.
    fn get_all_states(&self) -> HashMap<ClientId, StateFields>;

    /// Set one field of the local state and broadcast it.
    fn set_local_field(&mut self, key: &str, value: Value);

    /// Subscribe to change notifications.
    fn observe(&self) -> Subscription<AwarenessChange>;

    /// Read one field of the local state.
    fn local_field(&self, key: &str) -> Option<Value> {
        self.get_all_states()
            .remove(self.local_client_id())
            .and_then(|mut fields| fields.remove(key))
    }
}

/// Clock bookkeeping for a client, kept after removal so stale updates
/// cannot resurrect it.
#[derive(Clone, Debug)]
struct ClientMeta {
    clock: u64,
    last_updated: Instant,
}

/// One client's entry in an encoded update.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct ClientUpdate {
    client: ClientId,
    clock: u64,
    state: Option<StateFields>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
struct AwarenessUpdate {
    clients: Vec<ClientUpdate>,
}

/// Reference awareness broadcast.
pub struct Awareness {
    local: ClientId,
    states: HashMap<ClientId, StateFields>,
    meta: HashMap<ClientId, ClientMeta>,
    listeners: ListenerRegistry<AwarenessChange>,
    timeout: Duration,
    /// Whether the local state changed since the last `take_update`.
    dirty: bool,
}

impl Awareness {
    /// Create a broadcast whose local state starts as an empty map.
    pub fn new(local: ClientId) -> Self {
        let mut states = HashMap::new();
        let mut meta = HashMap::new();
        states.insert(local.clone(), StateFields::new());
        meta.insert(
            local.clone(),
            ClientMeta {
                clock: 0,
                last_updated: Instant::now(),
            },
        );

        Self {
            local,
            states,
            meta,
            listeners: ListenerRegistry::new(),
            timeout: DEFAULT_AWARENESS_TIMEOUT,
            dirty: true,
        }
    }

    /// Set the timeout after which silent remote clients are dropped.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// The local state, or `None` after [`destroy`](Self::destroy).
    pub fn local_state(&self) -> Option<&StateFields> {
        self.states.get(&self.local)
    }

    /// Number of clients with a state, the local one included.
    pub fn client_count(&self) -> usize {
        self.states.len()
    }

    /// Encode the local state if it changed since the last call.
    pub fn take_update(&mut self) -> Result<Option<Vec<u8>>> {
        if !self.dirty {
            return Ok(None);
        }
        self.dirty = false;
        let local = self.local.clone();
        self.encode_update(&[local]).map(Some)
    }

    /// Encode the given clients' states. Unknown clients are skipped.
    pub fn encode_update(&self, clients: &[ClientId]) -> Result<Vec<u8>> {
        let update = AwarenessUpdate {
            clients: clients
                .iter()
                .filter_map(|client| {
                    let meta = self.meta.get(client)?;
                    Some(ClientUpdate {
                        client: client.clone(),
                        clock: meta.clock,
                        state: self.states.get(client).cloned(),
                    })
                })
                .collect(),
        };
        Ok(serde_json::to_vec(&update)?)
    }

    /// Encode every known client, for peers that join late.
    pub fn encode_state(&self) -> Result<Vec<u8>> {
        let mut clients: Vec<ClientId> = self.meta.keys().cloned().collect();
        clients.sort();
        self.encode_update(&clients)
    }

    /// Apply an encoded update from another client.
    pub fn apply_update(&mut self, update: &[u8]) -> Result<AwarenessChange> {
        self.apply_update_at(update, Instant::now())
    }

    /// Apply an encoded update received at `now`.
    pub fn apply_update_at(&mut self, update: &[u8], now: Instant) -> Result<AwarenessChange> {
        let update: AwarenessUpdate = serde_json::from_slice(update)?;
        let mut change = AwarenessChange::default();

        for entry in update.clients {
            if entry.client == self.local {
                self.defend_local(&entry, now);
                continue;
            }

            let current = self.meta.get(&entry.client).map(|m| m.clock);
            let exists = self.states.contains_key(&entry.client);
            // An equal clock still wins when it removes a live client
            let newer = match current {
                None => true,
                Some(clock) => entry.clock > clock || (entry.clock == clock && entry.state.is_none() && exists),
            };
            if !newer {
                continue;
            }

            self.meta.insert(
                entry.client.clone(),
                ClientMeta {
                    clock: entry.clock,
                    last_updated: now,
                },
            );

            match entry.state {
                Some(state) => {
                    let previous = self.states.insert(entry.client.clone(), state);
                    match previous {
                        None => change.added.push(entry.client),
                        Some(previous) if Some(&previous) != self.states.get(&entry.client) => {
                            change.updated.push(entry.client)
                        }
                        // Same fields, only the heartbeat was renewed
                        Some(_) => {}
                    }
                }
                None => {
                    if self.states.remove(&entry.client).is_some() {
                        change.removed.push(entry.client);
                    }
                }
            }
        }

        self.notify(&change);
        Ok(change)
    }

    /// Drop remote clients, e.g. when the transport reports a disconnect.
    /// The local client is never removed this way.
    pub fn remove_states(&mut self, clients: &[ClientId]) -> AwarenessChange {
        self.remove_states_at(clients, Instant::now())
    }

    fn remove_states_at(&mut self, clients: &[ClientId], now: Instant) -> AwarenessChange {
        let mut change = AwarenessChange::default();
        for client in clients {
            if *client == self.local {
                continue;
            }
            if self.states.remove(client).is_some() {
                // The clock outlives the state for one more timeout so stale
                // updates cannot bring the client back
                if let Some(meta) = self.meta.get_mut(client) {
                    meta.last_updated = now;
                }
                change.removed.push(client.clone());
            }
        }
        self.notify(&change);
        change
    }

    /// Drop remote clients that have been silent for longer than the timeout.
    pub fn remove_outdated(&mut self) -> AwarenessChange {
        self.remove_outdated_at(Instant::now())
    }

    /// Like [`remove_outdated`](Self::remove_outdated) at `now`. Clocks of
    /// clients that left more than one timeout ago are forgotten.
    pub fn remove_outdated_at(&mut self, now: Instant) -> AwarenessChange {
        let timeout = self.timeout;
        let states = &self.states;
        self.meta.retain(|id, meta| {
            states.contains_key(id) || now.saturating_duration_since(meta.last_updated) <= timeout
        });

        let outdated: Vec<ClientId> = self
            .states
            .keys()
            .filter(|id| **id != self.local)
            .filter(|id| {
                self.meta
                    .get(*id)
                    .is_some_and(|m| now.saturating_duration_since(m.last_updated) > self.timeout)
            })
            .cloned()
            .collect();

        if !outdated.is_empty() {
            tracing::debug!(count = outdated.len(), "dropping outdated awareness states");
        }
        self.remove_states_at(&outdated, now)
    }

    /// Re-broadcast the local state so peers do not time it out.
    pub fn renew_local(&mut self) {
        if self.states.contains_key(&self.local) {
            self.tick_local();
        }
    }

    /// Remove the local state and release every listener.
    ///
    /// The removal is still available from [`take_update`](Self::take_update)
    /// so peers can be told this client left.
    pub fn destroy(&mut self) {
        if self.states.remove(&self.local).is_some() {
            self.tick_local();
            self.notify(&AwarenessChange {
                removed: vec![self.local.clone()],
                ..Default::default()
            });
        }
        self.listeners.clear();
    }

    fn tick_local(&mut self) {
        let meta = self.meta.entry(self.local.clone()).or_insert(ClientMeta {
            clock: 0,
            last_updated: Instant::now(),
        });
        meta.clock += 1;
        meta.last_updated = Instant::now();
        self.dirty = true;
    }

    /// A peer reported our own state, typically a stale removal after a
    /// reconnect. Outbid it so the peer learns we are still here.
    fn defend_local(&mut self, entry: &ClientUpdate, now: Instant) {
        let Some(meta) = self.meta.get_mut(&self.local) else {
            return;
        };
        if entry.state.is_none() && entry.clock >= meta.clock && self.states.contains_key(&self.local) {
            meta.clock = entry.clock + 1;
            meta.last_updated = now;
            self.dirty = true;
            tracing::trace!(client = %self.local, "renewed local state after remote removal");
        }
    }

    fn notify(&self, change: &AwarenessChange) {
        if !change.is_empty() {
            self.listeners.emit(change.clone());
        }
    }
}

impl AwarenessBroadcast for Awareness {
    fn local_client_id(&self) -> &ClientId {
        &self.local
    }

    fn get_all_states(&self) -> HashMap<ClientId, StateFields> {
        self.states.clone()
    }

    fn set_local_field(&mut self, key: &str, value: Value) {
        let Some(state) = self.states.get_mut(&self.local) else {
            tracing::trace!(key, "ignoring awareness field on destroyed state");
            return;
        };
        if state.get(key) == Some(&value) {
            return;
        }
        state.insert(key.to_string(), value);
        self.tick_local();
        self.notify(&AwarenessChange {
            updated: vec![self.local.clone()],
            ..Default::default()
        });
    }

    fn observe(&self) -> Subscription<AwarenessChange> {
        self.listeners.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn exchange(from: &mut Awareness, to: &mut Awareness) -> AwarenessChange {
        let update = from.take_update().unwrap().unwrap();
        to.apply_update(&update).unwrap()
    }

    #[test]
    fn test_departed_clocks_are_forgotten_after_timeout() {
        let mut alice = Awareness::new(ClientId::new("alice"));
        let mut bob = Awareness::new(ClientId::new("bob"));
        bob.set_local_field("user", json!({ "name": "Bob" }));
        let stale = bob.take_update().unwrap().unwrap();

        let t0 = Instant::now();
        let timeout = alice.timeout();
        alice.apply_update_at(&stale, t0).unwrap();

        let gone = t0 + timeout + Duration::from_secs(1);
        let change = alice.remove_outdated_at(gone);
        assert_eq!(change.removed, vec![ClientId::new("bob")]);

        // Still remembered, so the old update is refused
        assert!(alice.meta.contains_key(&ClientId::new("bob")));
        assert!(alice.apply_update_at(&stale, gone).unwrap().is_empty());

        alice.remove_outdated_at(gone + timeout + Duration::from_secs(1));
        assert!(!alice.meta.contains_key(&ClientId::new("bob")));
        assert!(alice.meta.contains_key(&ClientId::new("alice")));
    }

    #[test]
    fn test_local_field() {
        let mut awareness = Awareness::new(ClientId::new("alice"));
        awareness.set_local_field("user", json!({ "color": "#30bced" }));

        assert_eq!(
            awareness.local_field("user"),
            Some(json!({ "color": "#30bced" }))
        );
        assert_eq!(awareness.client_count(), 1);
    }

    #[test]
    fn test_set_same_value_is_silent() {
        let mut awareness = Awareness::new(ClientId::new("alice"));
        awareness.set_local_field("cursor", json!(1));
        let mut changes = awareness.observe();

        awareness.set_local_field("cursor", json!(1));
        assert!(changes.try_next().is_none());

        awareness.set_local_field("cursor", json!(2));
        assert_eq!(
            changes.try_next().unwrap().updated,
            vec![ClientId::new("alice")]
        );
    }

    #[test]
    fn test_update_exchange() {
        let mut alice = Awareness::new(ClientId::new("alice"));
        let mut bob = Awareness::new(ClientId::new("bob"));
        alice.set_local_field("user", json!({ "name": "Alice" }));

        let change = exchange(&mut alice, &mut bob);
        assert_eq!(change.added, vec![ClientId::new("alice")]);
        assert_eq!(bob.get_all_states().len(), 2);

        alice.set_local_field("user", json!({ "name": "Alicia" }));
        let change = exchange(&mut alice, &mut bob);
        assert_eq!(change.updated, vec![ClientId::new("alice")]);
        assert!(alice.take_update().unwrap().is_none());
    }

    #[test]
    fn test_stale_update_is_ignored() {
        let mut alice = Awareness::new(ClientId::new("alice"));
        let mut bob = Awareness::new(ClientId::new("bob"));

        alice.set_local_field("cursor", json!(1));
        let old = alice.take_update().unwrap().unwrap();
        alice.set_local_field("cursor", json!(2));
        let new = alice.take_update().unwrap().unwrap();

        bob.apply_update(&new).unwrap();
        let change = bob.apply_update(&old).unwrap();
        assert!(change.is_empty());
        assert_eq!(
            bob.get_all_states()[&ClientId::new("alice")]["cursor"],
            json!(2)
        );
    }

    #[test]
    fn test_destroy_broadcasts_removal() {
        let mut alice = Awareness::new(ClientId::new("alice"));
        let mut bob = Awareness::new(ClientId::new("bob"));
        exchange(&mut alice, &mut bob);

        let mut changes = alice.observe();
        alice.destroy();
        assert!(alice.local_state().is_none());

        let change = exchange(&mut alice, &mut bob);
        assert_eq!(change.removed, vec![ClientId::new("alice")]);
        assert_eq!(bob.get_all_states().len(), 1);

        // Listeners are released after the final notification
        assert_eq!(changes.drain().len(), 1);
        alice.set_local_field("cursor", json!(3));
        assert!(changes.try_next().is_none());
    }

    #[test]
    fn test_remove_states_keeps_local() {
        let mut alice = Awareness::new(ClientId::new("alice"));
        let mut bob = Awareness::new(ClientId::new("bob"));
        exchange(&mut alice, &mut bob);

        let change = bob.remove_states(&[ClientId::new("alice"), ClientId::new("bob")]);
        assert_eq!(change.removed, vec![ClientId::new("alice")]);
        assert!(bob.local_state().is_some());
    }

    #[test]
    fn test_remove_outdated() {
        let mut alice = Awareness::new(ClientId::new("alice"));
        let mut bob = Awareness::new(ClientId::new("bob")).with_timeout(Duration::from_secs(30));
        let t0 = Instant::now();
        let update = alice.take_update().unwrap().unwrap();
        bob.apply_update_at(&update, t0).unwrap();

        assert!(bob.remove_outdated_at(t0 + Duration::from_secs(10)).is_empty());
        let change = bob.remove_outdated_at(t0 + Duration::from_secs(31));
        assert_eq!(change.removed, vec![ClientId::new("alice")]);
    }

    #[test]
    fn test_renew_local_produces_update() {
        let mut alice = Awareness::new(ClientId::new("alice"));
        alice.take_update().unwrap();
        assert!(alice.take_update().unwrap().is_none());

        alice.renew_local();
        assert!(alice.take_update().unwrap().is_some());
    }

    #[test]
    fn test_stale_removal_of_local_is_outbid() {
        let mut alice = Awareness::new(ClientId::new("alice"));
        let mut bob = Awareness::new(ClientId::new("bob"));
        exchange(&mut alice, &mut bob);

        bob.remove_states(&[ClientId::new("alice")]);
        let removal = AwarenessUpdate {
            clients: vec![ClientUpdate {
                client: ClientId::new("alice"),
                clock: 5,
                state: None,
            }],
        };
        alice
            .apply_update(&serde_json::to_vec(&removal).unwrap())
            .unwrap();

        assert!(alice.local_state().is_some());
        let change = exchange(&mut alice, &mut bob);
        assert_eq!(change.added, vec![ClientId::new("alice")]);
    }

    #[test]
    fn test_malformed_update() {
        let mut awareness = Awareness::new(ClientId::new("alice"));
        assert!(awareness.apply_update(b"{").is_err());
    }
}
