//! Session persistence contract and built-in session store implementations.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

// self
use crate::{
	_prelude::*,
	auth::{SessionToken, UserId},
};

/// Boxed future returned by [`SessionStore`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Storage backend contract implemented by session stores.
///
/// `commit` replaces the whole record (last writer wins); it never merges with a concurrent
/// write. `find` must never return a record whose expiry has passed.
pub trait SessionStore
where
	Self: Send + Sync,
{
	/// Fetches the live record stored under `token`, if any.
	fn find<'a>(&'a self, token: &'a SessionToken) -> StoreFuture<'a, Option<SessionData>>;

	/// Persists or replaces the record stored under `token`.
	fn commit<'a>(
		&'a self,
		token: &'a SessionToken,
		data: SessionData,
		expiry: OffsetDateTime,
	) -> StoreFuture<'a, ()>;

	/// Removes the record stored under `token`; deleting a missing record succeeds.
	fn delete<'a>(&'a self, token: &'a SessionToken) -> StoreFuture<'a, ()>;
}

/// Typed values held by one session.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionData {
	/// Authenticated local user; absent until login completes.
	pub user_id: Option<UserId>,
	/// CSRF state of the pending OAuth round-trip.
	pub oauth_state: Option<String>,
	/// Path (and query) to return to once the pending round-trip completes.
	pub redirect_target: Option<String>,
}
impl SessionData {
	/// Returns true when the session carries no values at all.
	pub fn is_empty(&self) -> bool {
		self.user_id.is_none() && self.oauth_state.is_none() && self.redirect_target.is_none()
	}
}

/// Stored form of a session: its data plus the instant it stops being valid.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
	/// Session values.
	pub data: SessionData,
	/// Expiry instant; the record is invisible to `find` from this moment on.
	pub expiry: OffsetDateTime,
}
impl SessionRecord {
	/// Returns true once `now` has reached the expiry instant.
	pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
		now >= self.expiry
	}
}

/// Error type produced by [`SessionStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}
