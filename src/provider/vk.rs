//! VK identity provider.
//!
//! VK returns the user id inside the token response (`user_id`, a number or a string) and has
//! no user-info endpoint; registration reads the profile through the `users.get` API method.

// self
use crate::{
	_prelude::*,
	auth::{ExternalIdentity, ExternalUserId, ProviderId, SourceId, UserId},
	error::ConfigError,
	http::ReqwestHttpClient,
	oauth::{ClientCredentials, OAuthClient, ProviderToken},
	provider::{Provider, ProviderDescriptor, ProviderError, ProviderFuture},
	storage::{ImageManager, ImageSize, UserStorage},
};

/// User namespace of VK accounts.
pub const VK_SOURCE_ID: SourceId = SourceId(1);
/// VK API version requested by `users.get`.
pub const VK_API_VERSION: &str = "5.131";

const VK_AUTHORIZATION_URL: &str = "https://oauth.vk.com/authorize";
const VK_TOKEN_URL: &str = "https://oauth.vk.com/access_token";
const VK_API_BASE_URL: &str = "https://api.vk.com";
const VK_PROFILE_FIELDS: &str = "photo_50,photo_200_orig,has_photo";

/// Endpoints used by [`VkProvider`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VkEndpoints {
	/// Consent page.
	pub authorization: Url,
	/// Token endpoint.
	pub token: Url,
	/// API base; `users.get` lives at `{api}/method/users.get`.
	pub api: Url,
}
impl VkEndpoints {
	/// Public VK endpoints.
	pub fn production() -> Result<Self, ConfigError> {
		Ok(Self {
			authorization: parse_url(VK_AUTHORIZATION_URL)?,
			token: parse_url(VK_TOKEN_URL)?,
			api: parse_url(VK_API_BASE_URL)?,
		})
	}

	/// Endpoints rooted at a single base URL (`authorize`, `access_token`, and the API itself).
	pub fn at(base: &Url) -> Result<Self, ConfigError> {
		Ok(Self {
			authorization: join(base, "authorize")?,
			token: join(base, "access_token")?,
			api: base.clone(),
		})
	}
}

#[derive(Debug, Deserialize)]
struct UsersGetResponse {
	#[serde(default)]
	response: Vec<VkUser>,
	#[serde(default)]
	error: Option<VkApiError>,
}

#[derive(Debug, Deserialize)]
struct VkApiError {
	error_code: i64,
	#[serde(default)]
	error_msg: String,
}

#[derive(Debug, Deserialize)]
struct VkUser {
	id: i64,
	#[serde(default)]
	first_name: String,
	#[serde(default)]
	last_name: String,
	#[serde(default)]
	photo_50: Option<String>,
	#[serde(default)]
	photo_200_orig: Option<String>,
	#[serde(default)]
	has_photo: u8,
}
impl VkUser {
	fn display_name(&self) -> String {
		format!("{} {}", self.first_name, self.last_name).trim().to_owned()
	}

	fn avatars(&self) -> impl Iterator<Item = (ImageSize, &str)> {
		[(ImageSize::Small, &self.photo_50), (ImageSize::Medium, &self.photo_200_orig)]
			.into_iter()
			.filter_map(|(size, url)| {
				url.as_deref().filter(|url| !url.is_empty()).map(|url| (size, url))
			})
	}
}

/// VK provider with optional avatar import.
pub struct VkProvider {
	client: OAuthClient,
	images: Option<Arc<dyn ImageManager>>,
}
impl VkProvider {
	/// Builds the provider against `endpoints`.
	pub fn new(
		id: ProviderId,
		endpoints: VkEndpoints,
		credentials: ClientCredentials,
		redirect_uri: Url,
		http: ReqwestHttpClient,
	) -> Result<Self, ConfigError> {
		let descriptor = ProviderDescriptor::builder(id, VK_SOURCE_ID)
			.authorization_endpoint(endpoints.authorization)
			.token_endpoint(endpoints.token)
			.user_info_endpoint(join(&endpoints.api, "method/users.get")?)
			.authorization_param("access_type", "offline")
			.build()?;

		Ok(Self {
			client: OAuthClient::new(descriptor, credentials, redirect_uri, http),
			images: None,
		})
	}

	/// Downloads avatars into `images` on first registration.
	pub fn with_images(mut self, images: Arc<dyn ImageManager>) -> Self {
		self.images = Some(images);

		self
	}

	async fn fetch_profile(&self, token: &ProviderToken) -> Result<VkUser, ProviderError> {
		let mut url = self.client.descriptor().endpoints.user_info.clone();

		url.query_pairs_mut()
			.append_pair("v", VK_API_VERSION)
			.append_pair("lang", "ru")
			.append_pair("fields", VK_PROFILE_FIELDS);

		let reply: UsersGetResponse = self.client.get_json(&url, token).await?;

		if let Some(error) = reply.error {
			return Err(ProviderError::Api { code: error.error_code, message: error.error_msg });
		}

		reply.response.into_iter().next().ok_or(ProviderError::MissingField { field: "response" })
	}

	/// Imports the profile pictures of a freshly registered user.
	///
	/// Failures are logged and never fail the registration.
	async fn attach_avatars(&self, user: UserId, profile: &VkUser, storage: &dyn UserStorage) {
		let Some(images) = self.images.as_ref() else {
			return;
		};

		if profile.has_photo == 0 {
			return;
		}

		for (size, source) in profile.avatars() {
			let url = match Url::parse(source) {
				Ok(url) => url,
				Err(e) => {
					tracing::warn!(user = %user, %size, error = %e, "Avatar URL is invalid.");

					continue;
				},
			};
			let data = match self.client.http().get(&url).await {
				Ok(reply) if reply.status == 200 => reply.body,
				Ok(reply) => {
					tracing::warn!(
						user = %user,
						%size,
						status = reply.status,
						"Avatar download was rejected."
					);

					continue;
				},
				Err(e) => {
					tracing::warn!(user = %user, %size, error = %e, "Avatar download failed.");

					continue;
				},
			};
			let key = size.object_key(user);

			if let Err(e) = images.upload(&key, data).await {
				tracing::warn!(user = %user, %size, error = %e, "Avatar upload failed.");

				continue;
			}
			if let Err(e) = storage.update_user_image(user, size, &key).await {
				tracing::warn!(user = %user, %size, error = %e, "Avatar key could not be recorded.");
			}
		}
	}
}
impl Provider for VkProvider {
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
		Box::pin(async move { user_id_from_token(token) })
	}

	fn register<'a>(
		&'a self,
		token: &'a ProviderToken,
		storage: &'a dyn UserStorage,
	) -> ProviderFuture<'a, UserId> {
		Box::pin(async move {
			let profile = self.fetch_profile(token).await?;
			let identity =
				ExternalIdentity::new(self.source_id(), ExternalUserId::new(profile.id.to_string())?);
			let user = storage.create_user(&profile.display_name(), &identity).await?;

			self.attach_avatars(user, &profile, storage).await;

			Ok(user)
		})
	}
}
impl Debug for VkProvider {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("VkProvider")
			.field("client", &self.client)
			.field("images", &self.images.is_some())
			.finish()
	}
}

fn user_id_from_token(token: &ProviderToken) -> Result<ExternalUserId, ProviderError> {
	let raw = match token.extra_field("user_id") {
		Some(serde_json::Value::Number(number)) => number.to_string(),
		Some(serde_json::Value::String(text)) => text.clone(),
		_ => return Err(ProviderError::MissingField { field: "user_id" }),
	};

	Ok(ExternalUserId::new(raw)?)
}

fn parse_url(value: &str) -> Result<Url, ConfigError> {
	Url::parse(value).map_err(|source| ConfigError::InvalidDescriptor { source })
}

fn join(base: &Url, path: &str) -> Result<Url, ConfigError> {
	let mut base = base.clone();

	if !base.path().ends_with('/') {
		let path = format!("{}/", base.path());

		base.set_path(&path);
	}

	base.join(path).map_err(|source| ConfigError::InvalidDescriptor { source })
}
