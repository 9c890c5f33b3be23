//! Identity provider contract and the built-in VK and SU providers.
//!
//! `descriptor` holds validated provider metadata (endpoints, scopes, consent parameters).
//! [`Provider`] is the behavior the login flow relies on: building the consent URL,
//! exchanging the code, resolving the external user id, and registering first-time users.

pub mod descriptor;
pub mod su;
pub mod vk;

pub use descriptor::*;
pub use su::SuProvider;
pub use vk::VkProvider;

// self
use crate::{
	_prelude::*,
	auth::{ExternalUserId, ProviderId, SourceId, UserId},
	error::TransportError,
	oauth::ProviderToken,
	storage::{StorageError, UserStorage},
};

/// Boxed future returned by [`Provider`] operations.
pub type ProviderFuture<'a, T> =
	Pin<Box<dyn Future<Output = Result<T, ProviderError>> + 'a + Send>>;

/// External identity provider used by the login flow.
///
/// Implementations are registered once at startup and shared across requests.
pub trait Provider
where
	Self: Send + Sync,
{
	/// Provider name used in routes.
	fn name(&self) -> &ProviderId;

	/// User namespace of this provider in the user storage.
	fn source_id(&self) -> SourceId;

	/// Consent page URL carrying `state`, the client id, scopes, and the redirect URI.
	fn authorization_url(&self, state: &str) -> Url;

	/// Exchanges an authorization code for a token.
	fn exchange_code<'a>(&'a self, code: &'a str) -> ProviderFuture<'a, ProviderToken>;

	/// Resolves the provider-scoped user id behind `token`.
	fn external_user_id<'a>(
		&'a self,
		token: &'a ProviderToken,
	) -> ProviderFuture<'a, ExternalUserId>;

	/// Creates a local user from the provider profile behind `token`.
	///
	/// Must return [`ProviderError::Storage`] with a conflict when the identity already exists,
	/// so callers can fall back to a lookup.
	fn register<'a>(
		&'a self,
		token: &'a ProviderToken,
		storage: &'a dyn UserStorage,
	) -> ProviderFuture<'a, UserId>;
}

/// Failures raised by provider operations.
#[derive(Debug, ThisError)]
pub enum ProviderError {
	/// Network, timeout, or IO failure while calling the provider.
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Provider answered with an OAuth error document.
	#[error("Provider returned `{error}` with status {status}.")]
	OAuth {
		/// OAuth `error` code.
		error: String,
		/// OAuth `error_description`, when supplied.
		description: Option<String>,
		/// HTTP status code.
		status: u16,
	},
	/// Provider API reported an application-level error in a successful response.
	#[error("Provider API error {code}: {message}.")]
	Api {
		/// Provider-specific error code.
		code: i64,
		/// Provider-specific error message.
		message: String,
	},
	/// Provider answered with a status that carries no recognizable error document.
	#[error("Provider returned unexpected status {status}.")]
	UnexpectedStatus {
		/// HTTP status code.
		status: u16,
	},
	/// Provider response body did not match the expected shape.
	#[error("Provider response could not be parsed: {source}.")]
	Parse {
		/// Deserialization failure annotated with the offending path.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// A required field was absent or empty.
	#[error("Provider response is missing `{field}`.")]
	MissingField {
		/// Missing field name.
		field: &'static str,
	},
	/// A value returned by the provider is not a valid external user id.
	#[error("Provider returned an invalid user id.")]
	InvalidUserId(#[from] crate::auth::IdentifierError),
	/// User storage rejected the registration.
	#[error(transparent)]
	Storage(#[from] StorageError),
}
impl ProviderError {
	/// Returns true when registration failed because the identity already exists.
	pub fn is_conflict(&self) -> bool {
		matches!(self, Self::Storage(e) if e.is_conflict())
	}
}
