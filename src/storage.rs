//! Collaborator contracts for the user database and the avatar image store.
//!
//! The login core never owns user records; it only resolves and creates them through
//! [`UserStorage`]. Uniqueness of `(source id, external user id)` is the storage's job and is
//! reported as [`StorageError::Conflict`].

pub mod memory;

pub use memory::{MemoryImages, MemoryStorage};

// self
use crate::{
	_prelude::*,
	auth::{ExternalIdentity, UserId},
};

/// Boxed future returned by [`UserStorage`] and [`ImageManager`] operations.
pub type StorageFuture<'a, T> =
	Pin<Box<dyn Future<Output = Result<T, StorageError>> + 'a + Send>>;

/// Avatar sizes stored per user.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImageSize {
	/// Small thumbnail.
	#[serde(rename = "S")]
	Small,
	/// Medium profile picture.
	#[serde(rename = "M")]
	Medium,
}
impl ImageSize {
	/// Returns the stable size label used in storage keys.
	pub const fn as_str(self) -> &'static str {
		match self {
			ImageSize::Small => "S",
			ImageSize::Medium => "M",
		}
	}

	/// Object key under which the avatar of `user` in this size is stored.
	pub fn object_key(self, user: UserId) -> String {
		format!("users/{user}_{}.jpg", self.as_str())
	}
}
impl Display for ImageSize {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Local user record as seen by the login core.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
	/// Local user id.
	pub id: UserId,
	/// Display name taken from the provider profile at registration.
	pub name: String,
	/// External identity the user registered with.
	pub identity: ExternalIdentity,
	/// Stored avatar keys by size.
	#[serde(default)]
	pub images: HashMap<ImageSize, String>,
}

/// User database contract.
pub trait UserStorage
where
	Self: Send + Sync,
{
	/// Creates a user bound to `identity`.
	///
	/// Must fail with [`StorageError::Conflict`] when a user with the same identity exists.
	fn create_user<'a>(
		&'a self,
		name: &'a str,
		identity: &'a ExternalIdentity,
	) -> StorageFuture<'a, UserId>;

	/// Looks up the user bound to `identity`.
	fn get_user<'a>(&'a self, identity: &'a ExternalIdentity) -> StorageFuture<'a, Option<User>>;

	/// Looks up a user by local id.
	fn get_user_by_id<'a>(&'a self, id: UserId) -> StorageFuture<'a, Option<User>>;

	/// Records the object key of a stored avatar.
	fn update_user_image<'a>(
		&'a self,
		id: UserId,
		size: ImageSize,
		key: &'a str,
	) -> StorageFuture<'a, ()>;
}

/// Object store for avatar images.
pub trait ImageManager
where
	Self: Send + Sync,
{
	/// Stores `data` under `key`, replacing any previous object.
	fn upload<'a>(&'a self, key: &'a str, data: Vec<u8>) -> StorageFuture<'a, ()>;
}

/// Error type produced by [`UserStorage`] and [`ImageManager`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StorageError {
	/// A user bound to the identity already exists.
	#[error("User for identity {identity} already exists.")]
	Conflict {
		/// Identity that collided, rendered as `source:user`.
		identity: String,
	},
	/// The referenced user does not exist.
	#[error("User {id} does not exist.")]
	NotFound {
		/// Missing user id.
		id: UserId,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}
impl StorageError {
	/// Returns true when the failure is a uniqueness violation.
	pub fn is_conflict(&self) -> bool {
		matches!(self, Self::Conflict { .. })
	}
}
