//! Client-side caches over the backend.
//!
//! Each store owns its state in a `tokio::sync::watch::Sender`. Writes go
//! through `send_modify`, which also persists the new state before the lock
//! is released; the state is never borrowed across an `.await`. Readers get
//! clones via `snapshot()` or follow changes through `subscribe()`.

pub mod policy;
pub mod property_store;
pub mod session_store;

pub use policy::{Clock, ManualClock, StalenessPolicy, SystemClock};
pub use property_store::{CollectionKey, PropertyState, PropertyStore, Snapshot};
pub use session_store::{SessionState, SessionStatus, SessionStore};

use crate::errors::ErrorKind;
use std::fmt;
use std::str::FromStr;

/// What a fetch call ended up doing. Failures are already recorded in the
/// store's `error` field; the kind lets callers react to a 401.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Served from cache, no request issued
    CacheHit,
    /// Request succeeded and the snapshot was replaced
    Fetched { count: usize },
    /// Request succeeded but a newer request for the same key had been issued
    Discarded,
    Failed(ErrorKind),
}

impl FetchOutcome {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, FetchOutcome::Failed(ErrorKind::Unauthorized))
    }

    pub fn issued_request(&self) -> bool {
        !matches!(self, FetchOutcome::CacheHit)
    }
}

/// How overlapping fetches of the same collection resolve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Consistency {
    /// Whichever response arrives last is kept, even if its request was older
    #[default]
    LastWriteWins,
    /// Only the response to the most recently issued request is kept
    LatestRequestWins,
}

impl FromStr for Consistency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "last-write-wins" => Ok(Consistency::LastWriteWins),
            "latest-request-wins" => Ok(Consistency::LatestRequestWins),
            other => Err(format!(
                "unknown fetch consistency '{other}' (expected last-write-wins or latest-request-wins)"
            )),
        }
    }
}

impl fmt::Display for Consistency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Consistency::LastWriteWins => f.write_str("last-write-wins"),
            Consistency::LatestRequestWins => f.write_str("latest-request-wins"),
        }
    }
}
