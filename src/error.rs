//! Login-level error types shared across flows, providers, and stores.

// self
use crate::{_prelude::*, auth::ProviderId, provider::ProviderError};

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical login error exposed by public APIs.
///
/// Every variant except the infrastructure ones (`Session`, `SessionDestroyFailed`, `Storage`,
/// `Config`) is caused by the client or the provider and maps to a 4xx response.
#[derive(Debug, ThisError)]
pub enum Error {
	/// The provider named in the path is not registered.
	#[error("Provider `{provider}` is not registered.")]
	UnknownProvider {
		/// Provider name as supplied by the client.
		provider: String,
	},
	/// The provider redirected back with an `error` parameter.
	#[error("Provider `{provider}` denied the authorization: {error}.")]
	ProviderDenied {
		/// Provider that reported the failure.
		provider: ProviderId,
		/// OAuth `error` code.
		error: String,
		/// OAuth `error_description`, when supplied.
		description: Option<String>,
	},
	/// The callback arrived without a pending OAuth round-trip in the session.
	#[error("No OAuth round-trip is pending for this session.")]
	MissingPendingState,
	/// The callback `state` does not match the one issued for this session.
	#[error("Authorization state mismatch.")]
	StateMismatch,
	/// The authorization code could not be exchanged for a token.
	#[error("Code exchange with `{provider}` failed.")]
	ExchangeFailed {
		/// Provider that rejected or failed the exchange.
		provider: ProviderId,
		/// Underlying provider failure.
		#[source]
		source: ProviderError,
	},
	/// The external user id could not be determined from the token.
	#[error("Identity resolution with `{provider}` failed.")]
	IdentityResolutionFailed {
		/// Provider whose identity lookup failed.
		provider: ProviderId,
		/// Underlying provider failure.
		#[source]
		source: ProviderError,
	},
	/// The local user could not be created.
	#[error("Registration through `{provider}` failed.")]
	RegistrationFailed {
		/// Provider used for the registration attempt.
		provider: ProviderId,
		/// Underlying provider or storage failure.
		#[source]
		source: ProviderError,
	},
	/// Logout could not remove the session record.
	#[error("Session could not be destroyed.")]
	SessionDestroyFailed(#[source] crate::store::StoreError),
	/// Session store failure outside of logout.
	#[error("{0}")]
	Session(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// User storage failure outside of registration.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::storage::StorageError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
}
impl Error {
	/// Returns true for failures caused by infrastructure rather than by the client or provider.
	pub fn is_internal(&self) -> bool {
		matches!(
			self,
			Self::SessionDestroyFailed(_) | Self::Session(_) | Self::Storage(_) | Self::Config(_)
		)
	}

	/// Short machine-readable message safe to return to the client.
	///
	/// CSRF failures share a single message so the client cannot tell which check failed.
	pub fn public_message(&self) -> &'static str {
		match self {
			Self::UnknownProvider { .. } => "not_found",
			Self::ProviderDenied { .. } => "authorization_denied",
			Self::MissingPendingState | Self::StateMismatch => "invalid_state",
			Self::ExchangeFailed { .. } => "token_exchange_failed",
			Self::IdentityResolutionFailed { .. } => "identity_resolution_failed",
			Self::RegistrationFailed { .. } => "registration_failed",
			Self::SessionDestroyFailed(_) | Self::Session(_) | Self::Storage(_) | Self::Config(_) =>
				"internal_error",
		}
	}
}

/// Configuration and validation failures raised while wiring the login core.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// A required environment variable is absent.
	#[error("Environment variable `{name}` is required.")]
	MissingVariable {
		/// Variable name.
		name: &'static str,
	},
	/// An environment variable holds a value that cannot be parsed.
	#[error("Environment variable `{name}` is invalid: {reason}.")]
	InvalidVariable {
		/// Variable name.
		name: &'static str,
		/// Parser explanation.
		reason: String,
	},
	/// Provider descriptor contains an invalid URL.
	#[error("Descriptor contains an invalid URL.")]
	InvalidDescriptor {
		/// Underlying parsing failure.
		#[source]
		source: oauth2::url::ParseError,
	},
	/// Provider descriptor failed validation.
	#[error(transparent)]
	Descriptor(#[from] crate::provider::ProviderDescriptorError),
	/// Provider identifier failed validation.
	#[error(transparent)]
	Identifier(#[from] crate::auth::IdentifierError),
	/// Session store could not be opened.
	#[error("Session store could not be opened.")]
	SessionStore(#[source] crate::store::StoreError),
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Transport-level failures (network, timeout, IO) while calling a provider.
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the provider.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// The request deadline elapsed before the provider answered.
	#[error("Request to the provider timed out.")]
	Timeout,
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the provider.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		if e.is_timeout() { Self::Timeout } else { Self::network(e) }
	}
}
