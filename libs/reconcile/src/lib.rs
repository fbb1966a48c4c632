//! List-view reconciliation primitives.
//!
//! This library keeps a client-side list consistent with server state by
//! merging two sources:
//!
//! - **Snapshots**: a full list fetched over request/response; it replaces
//!   the current list wholesale.
//! - **Events**: pushed notifications projected onto the list as
//!   incremental changes.
//!
//! # Invariants
//!
//! - Events are applied in arrival order
//! - Events that arrive while a fetch is in flight are buffered and replayed
//!   on top of the snapshot once it lands
//! - The most recently issued fetch wins; results of superseded fetches are
//!   rejected
//! - Applying the same upsert twice is a no-op (changes are keyed)

use std::collections::VecDeque;
use std::fmt;

use serde::Serialize;
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Reconciliation errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReconcileError {
    /// A newer fetch was started after this one.
    #[error("fetch {ticket} superseded by fetch {current}")]
    Superseded { ticket: u64, current: u64 },

    /// The view was reset while the fetch was in flight.
    #[error("view is not loading (state: {state})")]
    NotLoading { state: String },

    /// Snapshot could not be serialized for digesting.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Lifecycle of a list-backed view.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ViewState {
    /// Nothing fetched yet.
    #[default]
    Idle,

    /// A fetch is in flight.
    Loading,

    /// The list reflects a snapshot plus the events applied since.
    Ready,

    /// The last fetch failed.
    Error(String),
}

impl ViewState {
    /// Returns true if the view holds a usable list.
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }

    /// Returns true if a fetch is in flight.
    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }
}

impl fmt::Display for ViewState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViewState::Idle => write!(f, "idle"),
            ViewState::Loading => write!(f, "loading"),
            ViewState::Ready => write!(f, "ready"),
            ViewState::Error(message) => write!(f, "error: {message}"),
        }
    }
}

/// An item that can be identified within its list.
pub trait Keyed {
    type Key: PartialEq + Clone + fmt::Debug;

    fn key(&self) -> Self::Key;
}

/// An incremental change derived from an event.
#[derive(Debug, Clone, PartialEq)]
pub enum Change<T: Keyed> {
    /// Replace the item with the same key, or append it.
    Upsert(T),

    /// Remove the item with this key.
    Remove(T::Key),

    /// The event concerns this list but does not carry enough to update it;
    /// the list must be re-fetched.
    Stale,
}

/// Maps events onto changes for one view.
///
/// Returning `None` means the event does not concern this view.
pub trait Projection {
    type Item: Keyed;
    type Event;

    fn project(&self, event: &Self::Event) -> Option<Change<Self::Item>>;
}

/// Handle for one fetch, returned by [`ListView::begin_fetch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use = "a fetch ticket must be passed back to complete_fetch"]
pub struct FetchTicket {
    generation: u64,
}

impl FetchTicket {
    /// Generation number of this fetch.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Result of completing a fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The snapshot was installed.
    Applied {
        /// Whether the snapshot differs from the previous one.
        changed: bool,
        /// Number of buffered changes replayed on top of it.
        replayed: usize,
        /// Whether a replayed change or a buffer overflow requires
        /// another fetch.
        stale: bool,
    },

    /// The fetch failed; the view is in the error state.
    Failed,
}

/// Result of feeding an event to a view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    /// The event does not concern this view, or the view holds no list.
    Ignored,

    /// The change was applied to the list.
    Applied,

    /// A fetch is in flight; the change will be replayed after it.
    Buffered,

    /// The caller should re-fetch.
    RefetchNeeded,
}

/// Default bound on changes buffered during a fetch.
pub const DEFAULT_MAX_PENDING: usize = 256;

/// A list view reconciled from snapshots and events.
#[derive(Debug)]
pub struct ListView<P: Projection> {
    projection: P,
    state: ViewState,
    items: Vec<P::Item>,
    generation: u64,
    pending: VecDeque<Change<P::Item>>,
    max_pending: usize,
    overflowed: bool,
    stale: bool,
    digest: Option<SnapshotDigest>,
}

impl<P: Projection> ListView<P> {
    /// Create an idle view.
    pub fn new(projection: P) -> Self {
        Self::with_max_pending(projection, DEFAULT_MAX_PENDING)
    }

    /// Create an idle view with a custom bound on buffered changes.
    pub fn with_max_pending(projection: P, max_pending: usize) -> Self {
        Self {
            projection,
            state: ViewState::Idle,
            items: Vec::new(),
            generation: 0,
            pending: VecDeque::new(),
            max_pending,
            overflowed: false,
            stale: false,
            digest: None,
        }
    }

    /// The projection this view uses.
    pub fn projection(&self) -> &P {
        &self.projection
    }

    /// Current state.
    pub fn state(&self) -> &ViewState {
        &self.state
    }

    /// Current list.
    pub fn items(&self) -> &[P::Item] {
        &self.items
    }

    /// Number of items in the list.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true if the list is empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns true if an event could not be applied and the list should be
    /// re-fetched.
    pub fn is_stale(&self) -> bool {
        self.stale
    }

    /// Digest of the last installed snapshot.
    pub fn digest(&self) -> Option<&SnapshotDigest> {
        self.digest.as_ref()
    }

    /// Start a fetch. Any fetch already in flight is superseded.
    pub fn begin_fetch(&mut self) -> FetchTicket {
        self.generation += 1;
        self.state = ViewState::Loading;
        FetchTicket {
            generation: self.generation,
        }
    }

    /// Feed one event to the view.
    pub fn on_event(&mut self, event: &P::Event) -> EventOutcome {
        let Some(change) = self.projection.project(event) else {
            return EventOutcome::Ignored;
        };

        match self.state {
            ViewState::Loading => {
                if self.pending.len() >= self.max_pending {
                    self.pending.clear();
                    self.overflowed = true;
                } else {
                    self.pending.push_back(change);
                }
                EventOutcome::Buffered
            }
            ViewState::Ready => {
                if self.apply(change) {
                    EventOutcome::Applied
                } else {
                    EventOutcome::RefetchNeeded
                }
            }
            ViewState::Idle | ViewState::Error(_) => EventOutcome::Ignored,
        }
    }

    /// Drop the list and invalidate any fetch in flight.
    pub fn reset(&mut self) {
        self.generation += 1;
        self.state = ViewState::Idle;
        self.items.clear();
        self.pending.clear();
        self.overflowed = false;
        self.stale = false;
        self.digest = None;
    }

    /// Applies a change to the list. Returns false if the change was `Stale`.
    fn apply(&mut self, change: Change<P::Item>) -> bool {
        match change {
            Change::Upsert(item) => {
                let key = item.key();
                match self.items.iter_mut().find(|existing| existing.key() == key) {
                    Some(existing) => *existing = item,
                    None => self.items.push(item),
                }
                true
            }
            Change::Remove(key) => {
                self.items.retain(|existing| existing.key() != key);
                true
            }
            Change::Stale => {
                self.stale = true;
                false
            }
        }
    }

    fn check_ticket(&self, ticket: FetchTicket) -> Result<(), ReconcileError> {
        if ticket.generation != self.generation {
            return Err(ReconcileError::Superseded {
                ticket: ticket.generation,
                current: self.generation,
            });
        }
        if !self.state.is_loading() {
            return Err(ReconcileError::NotLoading {
                state: self.state.to_string(),
            });
        }
        Ok(())
    }
}

impl<P> ListView<P>
where
    P: Projection,
    P::Item: Serialize,
{
    /// Complete a fetch with its result.
    ///
    /// On success the snapshot replaces the list and buffered changes are
    /// replayed in arrival order. On failure the view enters the error state
    /// and buffered changes are discarded.
    pub fn complete_fetch<E: fmt::Display>(
        &mut self,
        ticket: FetchTicket,
        result: Result<Vec<P::Item>, E>,
    ) -> Result<FetchOutcome, ReconcileError> {
        self.check_ticket(ticket)?;

        let snapshot = match result {
            Ok(snapshot) => snapshot,
            Err(err) => {
                self.state = ViewState::Error(err.to_string());
                self.pending.clear();
                self.overflowed = false;
                return Ok(FetchOutcome::Failed);
            }
        };

        let digest = SnapshotDigest::of(&snapshot)?;
        let changed = self.digest.as_ref() != Some(&digest);

        self.items = snapshot;
        self.digest = Some(digest);
        self.state = ViewState::Ready;
        self.stale = std::mem::take(&mut self.overflowed);

        let mut replayed = 0;
        while let Some(change) = self.pending.pop_front() {
            self.apply(change);
            replayed += 1;
        }

        Ok(FetchOutcome::Applied {
            changed,
            replayed,
            stale: self.stale,
        })
    }
}

/// Content digest of a fetched snapshot, rendered as `sha256:{hex}`.
///
/// Object keys are hashed in sorted order, so two snapshots that differ
/// only in field order share a digest.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SnapshotDigest(String);

impl SnapshotDigest {
    pub fn from_json(json: &serde_json::Value) -> Self {
        let mut hasher = Sha256::new();
        hash_canonical(json, &mut hasher);
        Self(format!("sha256:{}", hex::encode(hasher.finalize())))
    }

    /// Digest of any serializable snapshot.
    pub fn of<T: Serialize + ?Sized>(snapshot: &T) -> Result<Self, ReconcileError> {
        let json = serde_json::to_value(snapshot)
            .map_err(|e| ReconcileError::Serialization(e.to_string()))?;
        Ok(Self::from_json(&json))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SnapshotDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Feeds compact JSON with sorted object keys into the hasher.
fn hash_canonical(value: &serde_json::Value, hasher: &mut Sha256) {
    use serde_json::Value;

    match value {
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_unstable_by(|(a, _), (b, _)| a.cmp(b));
            hasher.update(b"{");
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    hasher.update(b",");
                }
                hasher.update(Value::from(key.as_str()).to_string().as_bytes());
                hasher.update(b":");
                hash_canonical(item, hasher);
            }
            hasher.update(b"}");
        }
        Value::Array(items) => {
            hasher.update(b"[");
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    hasher.update(b",");
                }
                hash_canonical(item, hasher);
            }
            hasher.update(b"]");
        }
        scalar => hasher.update(scalar.to_string().as_bytes()),
    }
}
