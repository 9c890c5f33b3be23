//! Thread-safe in-memory [`SessionStore`] implementation.
//!
//! Records live only as long as the process: a restart logs every user out and invalidates
//! every pending OAuth round-trip. Use it for tests and single-process development servers;
//! use [`FileStore`](crate::store::FileStore) when sessions must survive restarts.

// self
use crate::{
	_prelude::*,
	auth::SessionToken,
	store::{SessionData, SessionRecord, SessionStore, StoreError, StoreFuture},
};

type StoreMap = Arc<RwLock<HashMap<SessionToken, SessionRecord>>>;

/// Thread-safe session backend that keeps records in-process.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore(StoreMap);
impl MemoryStore {
	/// Drops every record that has expired at `now`, returning how many were removed.
	pub fn purge_expired(&self, now: OffsetDateTime) -> usize {
		let mut guard = self.0.write();
		let before = guard.len();

		guard.retain(|_, record| !record.is_expired_at(now));

		before - guard.len()
	}

	/// Number of records currently held, expired or not.
	pub fn len(&self) -> usize {
		self.0.read().len()
	}

	/// Returns true when no records are held.
	pub fn is_empty(&self) -> bool {
		self.0.read().is_empty()
	}

	fn find_now(map: StoreMap, token: SessionToken) -> Option<SessionData> {
		let now = OffsetDateTime::now_utc();

		{
			let guard = map.read();

			match guard.get(&token) {
				Some(record) if !record.is_expired_at(now) => return Some(record.data.clone()),
				Some(_) => {},
				None => return None,
			}
		}

		map.write().remove(&token);

		None
	}

	fn commit_now(
		map: StoreMap,
		token: SessionToken,
		data: SessionData,
		expiry: OffsetDateTime,
	) -> Result<(), StoreError> {
		let now = OffsetDateTime::now_utc();
		let mut guard = map.write();

		guard.retain(|_, record| !record.is_expired_at(now));
		guard.insert(token, SessionRecord { data, expiry });

		Ok(())
	}
}
impl SessionStore for MemoryStore {
	fn find<'a>(&'a self, token: &'a SessionToken) -> StoreFuture<'a, Option<SessionData>> {
		let map = self.0.clone();
		let token = token.to_owned();

		Box::pin(async move { Ok(Self::find_now(map, token)) })
	}

	fn commit<'a>(
		&'a self,
		token: &'a SessionToken,
		data: SessionData,
		expiry: OffsetDateTime,
	) -> StoreFuture<'a, ()> {
		let map = self.0.clone();
		let token = token.to_owned();

		Box::pin(async move { Self::commit_now(map, token, data, expiry) })
	}

	fn delete<'a>(&'a self, token: &'a SessionToken) -> StoreFuture<'a, ()> {
		let map = self.0.clone();
		let token = token.to_owned();

		Box::pin(async move {
			map.write().remove(&token);

			Ok(())
		})
	}
}
