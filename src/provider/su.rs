//! SU (South Ural) OpenID-style provider.
//!
//! The user id is the `sub` claim of the `UserInfo` document; any `error` member in that
//! document is a failure even under a 200 status.

// crates.io
use serde_json::{Map, Value};
// self
use crate::{
	_prelude::*,
	auth::{ExternalIdentity, ExternalUserId, ProviderId, SourceId, UserId},
	error::ConfigError,
	http::ReqwestHttpClient,
	oauth::{ClientCredentials, OAuthClient, ProviderToken},
	provider::{Provider, ProviderDescriptor, ProviderError, ProviderFuture},
	storage::UserStorage,
};

/// User namespace of SU accounts.
pub const SU_SOURCE_ID: SourceId = SourceId(2);
/// Scopes requested on the SU consent page.
pub const SU_SCOPES: [&str; 2] = ["openid", "profile"];

const SU_BASE_URL: &str = "https://www.southural.ru/oauth2/";

/// Endpoints used by [`SuProvider`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SuEndpoints {
	/// Consent page.
	pub authorization: Url,
	/// Token endpoint.
	pub token: Url,
	/// User profile document.
	pub user_info: Url,
}
impl SuEndpoints {
	/// Public SU endpoints.
	pub fn production() -> Result<Self, ConfigError> {
		let base =
			Url::parse(SU_BASE_URL).map_err(|source| ConfigError::InvalidDescriptor { source })?;

		Self::at(&base)
	}

	/// Endpoints rooted at `base` (`authorize`, `token`, and `UserInfo`).
	pub fn at(base: &Url) -> Result<Self, ConfigError> {
		let mut base = base.clone();

		if !base.path().ends_with('/') {
			let path = format!("{}/", base.path());

			base.set_path(&path);
		}

		let join = |path: &str| {
			base.join(path).map_err(|source| ConfigError::InvalidDescriptor { source })
		};

		Ok(Self {
			authorization: join("authorize")?,
			token: join("token")?,
			user_info: join("UserInfo")?,
		})
	}
}

/// Subset of the SU `UserInfo` document used for login.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SuUserInfo {
	/// Stable subject identifier.
	pub sub: ExternalUserId,
	/// Display name; empty when the profile has none.
	pub name: String,
}
impl SuUserInfo {
	fn from_document(document: Map<String, Value>) -> Result<Self, ProviderError> {
		if let Some(error) = document.get("error") {
			let error = match error {
				Value::String(text) => text.clone(),
				other => other.to_string(),
			};
			let description =
				document.get("error_description").and_then(Value::as_str).map(str::to_owned);

			return Err(ProviderError::OAuth { error, description, status: 200 });
		}

		let sub = document
			.get("sub")
			.and_then(Value::as_str)
			.ok_or(ProviderError::MissingField { field: "sub" })?;
		let name = document.get("name").and_then(Value::as_str).unwrap_or_default();

		Ok(Self { sub: ExternalUserId::new(sub)?, name: name.to_owned() })
	}
}

/// SU provider.
#[derive(Debug)]
pub struct SuProvider {
	client: OAuthClient,
}
impl SuProvider {
	/// Builds the provider against `endpoints`.
	pub fn new(
		id: ProviderId,
		endpoints: SuEndpoints,
		credentials: ClientCredentials,
		redirect_uri: Url,
		http: ReqwestHttpClient,
	) -> Result<Self, ConfigError> {
		let descriptor = ProviderDescriptor::builder(id, SU_SOURCE_ID)
			.authorization_endpoint(endpoints.authorization)
			.token_endpoint(endpoints.token)
			.user_info_endpoint(endpoints.user_info)
			.scopes(SU_SCOPES)
			.authorization_param("access_type", "offline")
			.build()?;

		Ok(Self { client: OAuthClient::new(descriptor, credentials, redirect_uri, http) })
	}

	/// Fetches and validates the `UserInfo` document.
	pub async fn user_info(&self, token: &ProviderToken) -> Result<SuUserInfo, ProviderError> {
		let endpoint = &self.client.descriptor().endpoints.user_info;
		let document: Map<String, Value> = self.client.get_json(endpoint, token).await?;

		SuUserInfo::from_document(document)
	}
}
impl Provider for SuProvider {
	fn name(&self) -> &ProviderId {
		&self.client.descriptor().id
	}

	fn source_id(&self) -> SourceId {
		self.client.descriptor().source
	}

	fn authorization_url(&self, state: &str) -> Url {
		self.client.authorization_url(state)
	}

	fn exchange_code<'a>(&'a self, code: &'a str) -> ProviderFuture<'a, ProviderToken> {
		Box::pin(self.client.exchange_code(code))
	}

	fn external_user_id<'a>(
		&'a self,
		token: &'a ProviderToken,
	) -> ProviderFuture<'a, ExternalUserId> {
		Box::pin(async move { Ok(self.user_info(token).await?.sub) })
	}

	fn register<'a>(
		&'a self,
		token: &'a ProviderToken,
		storage: &'a dyn UserStorage,
	) -> ProviderFuture<'a, UserId> {
		Box::pin(async move {
			let info = self.user_info(token).await?;
			let identity = ExternalIdentity::new(self.source_id(), info.sub);

			Ok(storage.create_user(&info.name, &identity).await?)
		})
	}
}
