//! Environment-driven configuration for the login core.

// std
use std::{path::PathBuf, time::Duration as StdDuration};
// self
use crate::{
	_prelude::*,
	auth::ProviderId,
	error::ConfigError,
	http::{DEFAULT_PROVIDER_TIMEOUT, ReqwestHttpClient},
	oauth::ClientCredentials,
	session::DEFAULT_SESSION_LIFETIME,
	store::{FileStore, MemoryStore, SessionStore},
};

/// Path prefix under which the login routes are mounted.
pub const AUTH_PATH_PREFIX: &str = "/auth";
/// Default session cookie name.
pub const DEFAULT_COOKIE_NAME: &str = "session";

/// Credentials and optional endpoint override for one provider.
#[derive(Clone, Debug)]
pub struct ProviderSettings {
	/// Client credentials issued by the provider.
	pub credentials: ClientCredentials,
	/// Base URL replacing every production endpoint of the provider.
	pub endpoint_base: Option<Url>,
}

/// Session cookie and store settings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionSettings {
	/// Cookie name carrying the session token.
	pub cookie_name: String,
	/// Lifetime of a committed session; also the cookie `Max-Age`.
	pub lifetime: Duration,
	/// Sets the `Secure` attribute on the session cookie.
	pub secure_cookie: bool,
	/// Snapshot path of the persistent store; `None` keeps sessions in memory.
	pub store_path: Option<PathBuf>,
}
impl Default for SessionSettings {
	fn default() -> Self {
		Self {
			cookie_name: DEFAULT_COOKIE_NAME.into(),
			lifetime: DEFAULT_SESSION_LIFETIME,
			secure_cookie: true,
			store_path: None,
		}
	}
}

/// Complete login core configuration.
#[derive(Clone, Debug)]
pub struct AuthConfig {
	/// Externally reachable base URL used to build redirect URIs.
	pub base_url: Url,
	/// VK settings; `None` leaves the provider unregistered.
	pub vk: Option<ProviderSettings>,
	/// SU settings; `None` leaves the provider unregistered.
	pub su: Option<ProviderSettings>,
	/// Session settings.
	pub session: SessionSettings,
	/// Deadline for each outbound provider call.
	pub provider_timeout: StdDuration,
}
impl AuthConfig {
	/// Creates a configuration with no providers and default session settings.
	pub fn new(base_url: Url) -> Self {
		Self {
			base_url,
			vk: None,
			su: None,
			session: SessionSettings::default(),
			provider_timeout: DEFAULT_PROVIDER_TIMEOUT,
		}
	}

	/// Reads the configuration from process environment variables.
	pub fn from_env() -> Result<Self, ConfigError> {
		Self::from_lookup(|name| std::env::var(name).ok())
	}

	/// Reads the configuration through `lookup`, which maps a variable name to its value.
	pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
	where
		F: Fn(&str) -> Option<String>,
	{
		let var = |name: &str| {
			lookup(name).map(|value| value.trim().to_owned()).filter(|value| !value.is_empty())
		};
		let base_url = var("BASE_URL").ok_or(ConfigError::MissingVariable { name: "BASE_URL" })?;
		let base_url = parse_url_var("BASE_URL", &base_url)?;
		let mut config = Self::new(base_url);

		config.vk = provider_settings(&var, "VK_CLIENT_ID", "VK_CLIENT_SECRET", "VK_ENDPOINT_BASE")?;
		config.su = provider_settings(&var, "SU_CLIENT_ID", "SU_CLIENT_SECRET", "SU_ENDPOINT_BASE")?;

		if let Some(name) = var("SESSION_COOKIE_NAME") {
			if !name.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '-') {
				return Err(ConfigError::InvalidVariable {
					name: "SESSION_COOKIE_NAME",
					reason: "cookie names may only contain ASCII letters, digits, `-` and `_`"
						.into(),
				});
			}

			config.session.cookie_name = name;
		}
		if let Some(hours) = var("SESSION_LIFETIME_HOURS") {
			let hours = parse_positive("SESSION_LIFETIME_HOURS", &hours)?;

			config.session.lifetime = Duration::hours(hours);
		}
		if let Some(secure) = var("SESSION_SECURE_COOKIE") {
			config.session.secure_cookie = parse_bool("SESSION_SECURE_COOKIE", &secure)?;
		}

		config.session.store_path = var("SESSION_STORE_PATH").map(PathBuf::from);

		if let Some(secs) = var("PROVIDER_HTTP_TIMEOUT_SECS") {
			let secs = parse_positive("PROVIDER_HTTP_TIMEOUT_SECS", &secs)?;

			config.provider_timeout = StdDuration::from_secs(secs.unsigned_abs());
		}

		Ok(config)
	}

	/// Redirect URI registered for `provider`: `{base}/auth/authorized/{provider}`.
	pub fn redirect_uri(&self, provider: &ProviderId) -> Result<Url, ConfigError> {
		let base = self.base_url.as_str().trim_end_matches('/');

		Url::parse(&format!("{base}{AUTH_PATH_PREFIX}/authorized/{provider}"))
			.map_err(|source| ConfigError::InvalidDescriptor { source })
	}

	/// Builds the shared provider HTTP client.
	pub fn http_client(&self) -> Result<ReqwestHttpClient, ConfigError> {
		ReqwestHttpClient::with_timeout(self.provider_timeout)
	}

	/// Opens the configured session store.
	pub fn open_session_store(&self) -> Result<Arc<dyn SessionStore>, ConfigError> {
		match self.session.store_path.as_ref() {
			Some(path) => Ok(Arc::new(FileStore::open(path).map_err(ConfigError::SessionStore)?)),
			None => {
				tracing::warn!("Sessions are kept in memory and will not survive a restart.");

				Ok(Arc::new(MemoryStore::default()))
			},
		}
	}
}

fn provider_settings<V>(
	var: &V,
	id_name: &'static str,
	secret_name: &'static str,
	base_name: &'static str,
) -> Result<Option<ProviderSettings>, ConfigError>
where
	V: Fn(&str) -> Option<String>,
{
	let Some(client_id) = var(id_name) else {
		return Ok(None);
	};
	let client_secret = var(secret_name).ok_or(ConfigError::MissingVariable { name: secret_name })?;
	let endpoint_base = var(base_name).map(|base| parse_url_var(base_name, &base)).transpose()?;

	Ok(Some(ProviderSettings {
		credentials: ClientCredentials::new(client_id, client_secret),
		endpoint_base,
	}))
}

fn parse_url_var(name: &'static str, value: &str) -> Result<Url, ConfigError> {
	let url = Url::parse(value)
		.map_err(|e| ConfigError::InvalidVariable { name, reason: e.to_string() })?;

	if !matches!(url.scheme(), "http" | "https") {
		return Err(ConfigError::InvalidVariable { name, reason: "expected an http(s) URL".into() });
	}

	Ok(url)
}

fn parse_positive(name: &'static str, value: &str) -> Result<i64, ConfigError> {
	match value.parse::<i64>() {
		Ok(parsed) if parsed > 0 => Ok(parsed),
		Ok(_) => Err(ConfigError::InvalidVariable { name, reason: "must be positive".into() }),
		Err(e) => Err(ConfigError::InvalidVariable { name, reason: e.to_string() }),
	}
}

fn parse_bool(name: &'static str, value: &str) -> Result<bool, ConfigError> {
	match value.to_ascii_lowercase().as_str() {
		"1" | "true" | "yes" | "on" => Ok(true),
		"0" | "false" | "no" | "off" => Ok(false),
		_ => Err(ConfigError::InvalidVariable {
			name,
			reason: format!("`{value}` is not a boolean"),
		}),
	}
}
