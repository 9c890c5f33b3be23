//! In-process [`UserStorage`] and [`ImageManager`] implementations for tests and development.

// self
use crate::{
	_prelude::*,
	auth::{ExternalIdentity, UserId},
	storage::{ImageManager, ImageSize, StorageError, StorageFuture, User, UserStorage},
};

#[derive(Debug, Default)]
struct Users {
	last_id: i64,
	by_id: HashMap<UserId, User>,
	by_identity: HashMap<ExternalIdentity, UserId>,
}

/// User table held in memory, enforcing identity uniqueness.
#[derive(Clone, Debug, Default)]
pub struct MemoryStorage(Arc<RwLock<Users>>);
impl MemoryStorage {
	/// Number of registered users.
	pub fn len(&self) -> usize {
		self.0.read().by_id.len()
	}

	/// Returns true when no user is registered.
	pub fn is_empty(&self) -> bool {
		self.0.read().by_id.is_empty()
	}
}
impl UserStorage for MemoryStorage {
	fn create_user<'a>(
		&'a self,
		name: &'a str,
		identity: &'a ExternalIdentity,
	) -> StorageFuture<'a, UserId> {
		Box::pin(async move {
			let mut users = self.0.write();

			if users.by_identity.contains_key(identity) {
				return Err(StorageError::Conflict { identity: identity.to_string() });
			}

			users.last_id += 1;

			let id = UserId(users.last_id);

			users.by_identity.insert(identity.clone(), id);
			users.by_id.insert(
				id,
				User {
					id,
					name: name.to_owned(),
					identity: identity.clone(),
					images: HashMap::new(),
				},
			);

			Ok(id)
		})
	}

	fn get_user<'a>(&'a self, identity: &'a ExternalIdentity) -> StorageFuture<'a, Option<User>> {
		Box::pin(async move {
			let users = self.0.read();

			Ok(users.by_identity.get(identity).and_then(|id| users.by_id.get(id)).cloned())
		})
	}

	fn get_user_by_id<'a>(&'a self, id: UserId) -> StorageFuture<'a, Option<User>> {
		Box::pin(async move { Ok(self.0.read().by_id.get(&id).cloned()) })
	}

	fn update_user_image<'a>(
		&'a self,
		id: UserId,
		size: ImageSize,
		key: &'a str,
	) -> StorageFuture<'a, ()> {
		Box::pin(async move {
			let mut users = self.0.write();
			let user = users.by_id.get_mut(&id).ok_or(StorageError::NotFound { id })?;

			user.images.insert(size, key.to_owned());

			Ok(())
		})
	}
}

/// Object store held in memory.
#[derive(Clone, Debug, Default)]
pub struct MemoryImages(Arc<RwLock<HashMap<String, Vec<u8>>>>);
impl MemoryImages {
	/// Returns a copy of the object stored under `key`.
	pub fn get(&self, key: &str) -> Option<Vec<u8>> {
		self.0.read().get(key).cloned()
	}

	/// Number of stored objects.
	pub fn len(&self) -> usize {
		self.0.read().len()
	}

	/// Returns true when nothing is stored.
	pub fn is_empty(&self) -> bool {
		self.0.read().is_empty()
	}
}
impl ImageManager for MemoryImages {
	fn upload<'a>(&'a self, key: &'a str, data: Vec<u8>) -> StorageFuture<'a, ()> {
		Box::pin(async move {
			self.0.write().insert(key.to_owned(), data);

			Ok(())
		})
	}
}
