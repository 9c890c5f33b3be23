//! File-backed [`SessionStore`] that survives process restarts.
//!
//! Records are keyed by the SHA-256 digest of the session token, so the snapshot on disk never
//! contains a usable cookie value.

// std
use std::{
	fs::{self, File},
	io::{self, BufWriter},
	path::{Path, PathBuf},
};
// self
use crate::{
	_prelude::*,
	auth::SessionToken,
	store::{SessionData, SessionRecord, SessionStore, StoreError, StoreFuture},
};

/// On-disk form: token digest → record.
type Snapshot = HashMap<String, SessionRecord>;

/// Session store persisted as a JSON snapshot that is rewritten after each mutation.
///
/// Writes go to a sibling `.tmp` file that is synced and then renamed over the snapshot, so a
/// crash leaves either the previous or the new snapshot on disk.
#[derive(Clone, Debug)]
pub struct FileStore {
	path: PathBuf,
	records: Arc<RwLock<Snapshot>>,
}
impl FileStore {
	/// Opens the snapshot at `path`, creating its directory when needed.
	///
	/// Records that already expired are dropped while loading.
	pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
		let path = path.into();

		create_parent(&path)?;

		let now = OffsetDateTime::now_utc();
		let mut records = read_snapshot(&path)?;

		records.retain(|_, record| !record.is_expired_at(now));

		Ok(Self { path, records: Arc::new(RwLock::new(records)) })
	}

	/// Snapshot location.
	pub fn path(&self) -> &Path {
		&self.path
	}

	/// Drops records expired at `now`; returns how many were removed.
	pub fn purge_expired(&self, now: OffsetDateTime) -> Result<usize, StoreError> {
		let mut records = self.records.write();
		let before = records.len();

		records.retain(|_, record| !record.is_expired_at(now));

		let removed = before - records.len();

		if removed > 0 {
			write_snapshot(&self.path, &records)?;
		}

		Ok(removed)
	}

	/// Applies `change` to a copy of the records with expired entries already dropped.
	///
	/// The copy replaces the in-memory map only after it is on disk. Nothing is written when
	/// `change` reports no change and no record expired.
	fn rewrite(&self, change: impl FnOnce(&mut Snapshot) -> bool) -> Result<(), StoreError> {
		let now = OffsetDateTime::now_utc();
		let mut records = self.records.write();
		let mut next = records.clone();

		next.retain(|_, record| !record.is_expired_at(now));

		let expired = next.len() != records.len();

		if change(&mut next) || expired {
			write_snapshot(&self.path, &next)?;

			*records = next;
		}

		Ok(())
	}
}
impl SessionStore for FileStore {
	fn find<'a>(&'a self, token: &'a SessionToken) -> StoreFuture<'a, Option<SessionData>> {
		Box::pin(async move {
			let now = OffsetDateTime::now_utc();
			let records = self.records.read();

			Ok(records
				.get(&token.digest())
				.filter(|record| !record.is_expired_at(now))
				.map(|record| record.data.clone()))
		})
	}

	fn commit<'a>(
		&'a self,
		token: &'a SessionToken,
		data: SessionData,
		expiry: OffsetDateTime,
	) -> StoreFuture<'a, ()> {
		Box::pin(async move {
			let key = token.digest();

			self.rewrite(|next| {
				next.insert(key, SessionRecord { data, expiry });

				true
			})
		})
	}

	fn delete<'a>(&'a self, token: &'a SessionToken) -> StoreFuture<'a, ()> {
		Box::pin(async move {
			let key = token.digest();

			self.rewrite(|next| next.remove(&key).is_some())
		})
	}
}
fn backend(action: &str, path: &Path, e: io::Error) -> StoreError {
	StoreError::Backend { message: format!("Failed to {action} {}: {e}", path.display()) }
}

fn create_parent(path: &Path) -> Result<(), StoreError> {
	match path.parent() {
		Some(parent) if !parent.as_os_str().is_empty() =>
			fs::create_dir_all(parent).map_err(|e| backend("create", parent, e)),
		_ => Ok(()),
	}
}

fn read_snapshot(path: &Path) -> Result<Snapshot, StoreError> {
	let bytes = match fs::read(path) {
		Ok(bytes) => bytes,
		Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Snapshot::new()),
		Err(e) => return Err(backend("read", path, e)),
	};

	if bytes.iter().all(u8::is_ascii_whitespace) {
		return Ok(Snapshot::new());
	}

	serde_json::from_slice(&bytes).map_err(|e| StoreError::Serialization {
		message: format!("Session snapshot {} is corrupt: {e}", path.display()),
	})
}

fn write_snapshot(path: &Path, records: &Snapshot) -> Result<(), StoreError> {
	let tmp = path.with_extension("tmp");
	let file = File::create(&tmp).map_err(|e| backend("create", &tmp, e))?;
	let mut writer = BufWriter::new(file);

	serde_json::to_writer(&mut writer, records).map_err(|e| StoreError::Serialization {
		message: format!("Session snapshot could not be encoded: {e}"),
	})?;

	let file = writer.into_inner().map_err(|e| backend("flush", &tmp, e.into_error()))?;

	file.sync_all().map_err(|e| backend("sync", &tmp, e))?;
	fs::rename(&tmp, path).map_err(|e| backend("replace", path, e))
}
