use crate::api::PropertyApi;
use crate::errors::ApiError;
use crate::models::{Property, User};
use crate::storage::{Persistence, PROPERTY_STATE_KEY};
use crate::sync::{Consistency, FetchOutcome, StalenessPolicy};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// The two cached property collections
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionKey {
    /// Every listing on the platform
    All,
    /// Listings owned by the logged-in user
    Mine,
}

impl CollectionKey {
    fn index(self) -> usize {
        match self {
            CollectionKey::All => 0,
            CollectionKey::Mine => 1,
        }
    }

    fn fallback_message(self) -> &'static str {
        match self {
            CollectionKey::All => "Failed to fetch",
            CollectionKey::Mine => "Failed to fetch your properties",
        }
    }
}

impl fmt::Display for CollectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CollectionKey::All => f.write_str("all properties"),
            CollectionKey::Mine => f.write_str("my properties"),
        }
    }
}

/// Cached records plus the time they were fetched
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub records: Vec<Property>,
    pub fetched_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyState {
    pub all: Snapshot,
    pub mine: Snapshot,
    /// Filled one property id at a time, on request
    pub interested: BTreeMap<String, Vec<User>>,
    pub loading: bool,
    pub error: Option<String>,
}

impl PropertyState {
    pub fn collection(&self, key: CollectionKey) -> &Snapshot {
        match key {
            CollectionKey::All => &self.all,
            CollectionKey::Mine => &self.mine,
        }
    }

    fn collection_mut(&mut self, key: CollectionKey) -> &mut Snapshot {
        match key {
            CollectionKey::All => &mut self.all,
            CollectionKey::Mine => &mut self.mine,
        }
    }
}

/// Persisted subset of [`PropertyState`]
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersistedProperties {
    #[serde(default)]
    properties: Vec<Property>,
    #[serde(default)]
    my_properties: Vec<Property>,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    last_fetched: Option<DateTime<Utc>>,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    last_my_fetched: Option<DateTime<Utc>>,
    #[serde(default)]
    interested_users_map: BTreeMap<String, Vec<User>>,
}

impl From<&PropertyState> for PersistedProperties {
    fn from(state: &PropertyState) -> Self {
        Self {
            properties: state.all.records.clone(),
            my_properties: state.mine.records.clone(),
            last_fetched: state.all.fetched_at,
            last_my_fetched: state.mine.fetched_at,
            interested_users_map: state.interested.clone(),
        }
    }
}

impl From<PersistedProperties> for PropertyState {
    fn from(saved: PersistedProperties) -> Self {
        Self {
            all: Snapshot {
                records: saved.properties,
                fetched_at: saved.last_fetched,
            },
            mine: Snapshot {
                records: saved.my_properties,
                fetched_at: saved.last_my_fetched,
            },
            interested: saved.interested_users_map,
            loading: false,
            error: None,
        }
    }
}

/// Read-through cache of the "all" and "mine" collections and of
/// interested users per property.
///
/// Fetches are neither deduplicated nor serialized. With
/// [`Consistency::LastWriteWins`] overlapping forced refreshes each write
/// their result as they resolve.
pub struct PropertyStore {
    api: Arc<dyn PropertyApi>,
    persistence: Arc<dyn Persistence>,
    policy: StalenessPolicy,
    consistency: Consistency,
    state: watch::Sender<PropertyState>,
    issued: [AtomicU64; 2],
}

impl PropertyStore {
    /// Create a store, rehydrating from `persistence` when a blob exists
    pub fn new(
        api: Arc<dyn PropertyApi>,
        persistence: Arc<dyn Persistence>,
        policy: StalenessPolicy,
    ) -> Self {
        let initial = rehydrate(persistence.as_ref());
        let (state, _) = watch::channel(initial);
        Self {
            api,
            persistence,
            policy,
            consistency: Consistency::default(),
            state,
            issued: [AtomicU64::new(0), AtomicU64::new(0)],
        }
    }

    pub fn with_consistency(mut self, consistency: Consistency) -> Self {
        self.consistency = consistency;
        self
    }

    pub fn snapshot(&self) -> PropertyState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PropertyState> {
        self.state.subscribe()
    }

    /// Serve `key` from cache when fresh, otherwise fetch it.
    /// `force` skips the freshness check.
    pub async fn ensure_fresh(&self, key: CollectionKey, force: bool) -> FetchOutcome {
        if !force {
            let fetched_at = self.state.borrow().collection(key).fetched_at;
            if self.policy.is_fresh(fetched_at) {
                debug!("Serving {} from cache", key);
                return FetchOutcome::CacheHit;
            }
        }

        let ticket = self.issued[key.index()].fetch_add(1, Ordering::SeqCst) + 1;
        self.update(|s| {
            s.loading = true;
            s.error = None;
        });

        debug!("Fetching {} (request #{})", key, ticket);
        let result = match key {
            CollectionKey::All => self.api.list_properties().await,
            CollectionKey::Mine => self.api.list_my_properties().await,
        };

        if !self.is_latest(key, ticket) {
            debug!("Dropping response #{} for {}, a newer request is in flight", ticket, key);
            return FetchOutcome::Discarded;
        }

        match result {
            Ok(records) => {
                let count = records.len();
                let now = self.policy.now();
                self.update(|s| {
                    let snapshot = s.collection_mut(key);
                    snapshot.records = records;
                    snapshot.fetched_at = Some(now);
                    s.loading = false;
                });
                info!("Fetched {} record(s) for {}", count, key);
                FetchOutcome::Fetched { count }
            }
            Err(e) => {
                warn!("Fetching {} failed: {}", key, e);
                let message = e.user_message(key.fallback_message());
                self.update(|s| {
                    s.error = Some(message);
                    s.loading = false;
                });
                FetchOutcome::Failed(e.kind())
            }
        }
    }

    /// Always fetches; the result replaces only the entry for `property_id`.
    pub async fn fetch_interested_users(&self, property_id: &str) -> FetchOutcome {
        self.update(|s| {
            s.loading = true;
            s.error = None;
        });

        match self.api.interested_users(property_id).await {
            Ok(users) => {
                let count = users.len();
                self.update(|s| {
                    s.interested.insert(property_id.to_string(), users);
                    s.loading = false;
                });
                info!("Fetched {} interested user(s) for {}", count, property_id);
                FetchOutcome::Fetched { count }
            }
            Err(e) => {
                warn!("Fetching interested users for {} failed: {}", property_id, e);
                let message = e.user_message("Failed to fetch interested users");
                self.update(|s| {
                    s.error = Some(message);
                    s.loading = false;
                });
                FetchOutcome::Failed(e.kind())
            }
        }
    }

    /// Drop both collections so the next `ensure_fresh` refetches.
    pub fn invalidate_all(&self) {
        self.update(|s| {
            s.all = Snapshot::default();
            s.mine = Snapshot::default();
        });
        debug!("Property collections invalidated");
    }

    pub fn clear_error(&self) {
        self.update(|s| s.error = None);
    }

    fn is_latest(&self, key: CollectionKey, ticket: u64) -> bool {
        match self.consistency {
            Consistency::LastWriteWins => true,
            Consistency::LatestRequestWins => {
                self.issued[key.index()].load(Ordering::SeqCst) == ticket
            }
        }
    }

    /// Apply `change` and persist the result while the watch lock is held,
    /// so the stored blob always matches the latest in-memory state.
    fn update<F>(&self, change: F)
    where
        F: FnOnce(&mut PropertyState),
    {
        self.state.send_modify(|state| {
            change(state);
            let saved = PersistedProperties::from(&*state);
            let result = serde_json::to_string(&saved)
                .map_err(ApiError::from)
                .and_then(|json| self.persistence.store(PROPERTY_STATE_KEY, &json));
            if let Err(e) = result {
                warn!("Could not persist property state: {}", e);
            }
        });
    }
}

fn rehydrate(persistence: &dyn Persistence) -> PropertyState {
    match persistence.load(PROPERTY_STATE_KEY) {
        Ok(Some(json)) => match serde_json::from_str::<PersistedProperties>(&json) {
            Ok(saved) => {
                debug!("Rehydrated property state");
                saved.into()
            }
            Err(e) => {
                warn!("Ignoring unreadable property state: {}", e);
                PropertyState::default()
            }
        },
        Ok(None) => PropertyState::default(),
        Err(e) => {
            warn!("Could not load property state: {}", e);
            PropertyState::default()
        }
    }
}
