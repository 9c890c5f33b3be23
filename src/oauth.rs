//! OAuth 2.0 client facade shared by the built-in providers.
//!
//! The consent URL is built with the `oauth2` crate. The code exchange is posted by hand:
//! providers such as VK answer without `token_type` and with extra fields (`user_id`) that a
//! standard token response would reject or drop, so the response is parsed into
//! [`ProviderToken`], which keeps every non-standard field.

pub use oauth2;

// crates.io
use oauth2::{
	AccessToken, AuthUrl, ClientId, ClientSecret, CsrfToken, EndpointNotSet, EndpointSet,
	RedirectUrl, RefreshToken, Scope, TokenUrl,
	basic::{BasicClient, BasicErrorResponse},
};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
// self
use crate::{
	_prelude::*,
	http::{HttpReply, ReqwestHttpClient},
	provider::{ProviderDescriptor, ProviderError},
};

type ConfiguredBasicClient =
	BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

/// Client credentials issued by a provider.
#[derive(Clone, Debug)]
pub struct ClientCredentials {
	/// Public client identifier.
	pub client_id: ClientId,
	/// Client secret; `Debug` output is redacted.
	pub client_secret: ClientSecret,
}
impl ClientCredentials {
	/// Wraps raw credential strings.
	pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
		Self {
			client_id: ClientId::new(client_id.into()),
			client_secret: ClientSecret::new(client_secret.into()),
		}
	}
}

/// Token returned by a provider's token endpoint.
///
/// Fields outside the standard set are kept in [`extra`](Self::extra) so providers can read
/// values such as VK's `user_id`.
#[derive(Clone, Debug)]
pub struct ProviderToken {
	/// Access token; `Debug` output is redacted.
	pub access_token: AccessToken,
	/// Token type, when the provider sends one.
	pub token_type: Option<String>,
	/// Lifetime in seconds, when the provider sends one.
	pub expires_in: Option<u64>,
	/// Refresh token issued alongside offline access.
	pub refresh_token: Option<RefreshToken>,
	/// Every other top-level response field.
	pub extra: Map<String, Value>,
}
impl ProviderToken {
	/// Looks up a non-standard response field.
	pub fn extra_field(&self, name: &str) -> Option<&Value> {
		self.extra.get(name)
	}
}

#[derive(Deserialize)]
struct TokenPayload {
	access_token: String,
	#[serde(default)]
	token_type: Option<String>,
	#[serde(default)]
	expires_in: Option<u64>,
	#[serde(default)]
	refresh_token: Option<String>,
	#[serde(flatten)]
	extra: Map<String, Value>,
}
impl From<TokenPayload> for ProviderToken {
	fn from(payload: TokenPayload) -> Self {
		Self {
			access_token: AccessToken::new(payload.access_token),
			token_type: payload.token_type,
			expires_in: payload.expires_in,
			refresh_token: payload.refresh_token.map(RefreshToken::new),
			extra: payload.extra,
		}
	}
}

/// OAuth client bound to one provider descriptor, credential pair, and redirect URI.
pub struct OAuthClient {
	descriptor: ProviderDescriptor,
	credentials: ClientCredentials,
	redirect_uri: RedirectUrl,
	http: ReqwestHttpClient,
	oauth: ConfiguredBasicClient,
}
impl OAuthClient {
	/// Wires the `oauth2` client for `descriptor`.
	pub fn new(
		descriptor: ProviderDescriptor,
		credentials: ClientCredentials,
		redirect_uri: Url,
		http: ReqwestHttpClient,
	) -> Self {
		let redirect_uri = RedirectUrl::from_url(redirect_uri);
		let oauth = BasicClient::new(credentials.client_id.clone())
			.set_client_secret(credentials.client_secret.clone())
			.set_auth_uri(AuthUrl::from_url(descriptor.endpoints.authorization.clone()))
			.set_token_uri(TokenUrl::from_url(descriptor.endpoints.token.clone()))
			.set_redirect_uri(redirect_uri.clone());

		Self { descriptor, credentials, redirect_uri, http, oauth }
	}

	/// Descriptor this client was built from.
	pub fn descriptor(&self) -> &ProviderDescriptor {
		&self.descriptor
	}

	/// Redirect URI registered with the provider.
	pub fn redirect_uri(&self) -> &Url {
		self.redirect_uri.url()
	}

	/// Shared HTTP transport.
	pub fn http(&self) -> &ReqwestHttpClient {
		&self.http
	}

	/// Builds the consent URL carrying `state`, the descriptor scopes, and its extra parameters.
	pub fn authorization_url(&self, state: &str) -> Url {
		let mut request = self.oauth.authorize_url(|| CsrfToken::new(state.to_owned()));

		for scope in &self.descriptor.scopes {
			request = request.add_scope(Scope::new(scope.clone()));
		}
		for (key, value) in &self.descriptor.authorization_params {
			request = request.add_extra_param(key.as_str(), value.as_str());
		}

		request.url().0
	}

	/// Exchanges an authorization code at the token endpoint.
	pub async fn exchange_code(&self, code: &str) -> Result<ProviderToken, ProviderError> {
		let form = [
			("grant_type", "authorization_code"),
			("code", code),
			("redirect_uri", self.redirect_uri.as_str()),
			("client_id", self.credentials.client_id.as_str()),
			("client_secret", self.credentials.client_secret.secret().as_str()),
		];
		let reply = self.http.post_form(&self.descriptor.endpoints.token, &form).await?;

		if !reply.is_success() {
			return Err(oauth_error(&reply));
		}

		let payload: TokenPayload = parse_json(&reply.body)?;

		Ok(payload.into())
	}

	/// GETs a JSON document with the token as bearer credential.
	pub async fn get_json<T>(&self, url: &Url, token: &ProviderToken) -> Result<T, ProviderError>
	where
		T: DeserializeOwned,
	{
		let reply = self.http.get_bearer(url, &token.access_token).await?;

		if !reply.is_success() {
			return Err(oauth_error(&reply));
		}

		parse_json(&reply.body)
	}
}
impl Debug for OAuthClient {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("OAuthClient")
			.field("provider", &self.descriptor.id)
			.field("client_id", &self.credentials.client_id)
			.field("redirect_uri", &self.redirect_uri.as_str())
			.finish()
	}
}

/// Parses a JSON body, reporting the path of the first mismatching field.
pub fn parse_json<T>(body: &[u8]) -> Result<T, ProviderError>
where
	T: DeserializeOwned,
{
	let mut de = serde_json::Deserializer::from_slice(body);

	serde_path_to_error::deserialize(&mut de).map_err(|source| ProviderError::Parse { source })
}

/// Classifies a non-2xx provider reply.
fn oauth_error(reply: &HttpReply) -> ProviderError {
	match serde_json::from_slice::<BasicErrorResponse>(&reply.body) {
		Ok(response) => ProviderError::OAuth {
			error: response.error().as_ref().to_owned(),
			description: response.error_description().cloned(),
			status: reply.status,
		},
		Err(_) => {
			tracing::debug!(
				status = reply.status,
				body = %reply.preview(),
				"Provider returned an unrecognized error body."
			);

			ProviderError::UnexpectedStatus { status: reply.status }
		},
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use httpmock::prelude::*;
	// self
	use super::*;
	use crate::auth::{ProviderId, SourceId};

	fn client(server: &MockServer) -> OAuthClient {
		let descriptor = ProviderDescriptor::builder(
			ProviderId::new("mock").expect("Provider fixture should be valid."),
			SourceId(9),
		)
		.authorization_endpoint(Url::parse(&server.url("/authorize")).expect("URL should parse."))
		.token_endpoint(Url::parse(&server.url("/token")).expect("URL should parse."))
		.user_info_endpoint(Url::parse(&server.url("/me")).expect("URL should parse."))
		.scopes(["openid", "profile"])
		.authorization_param("access_type", "offline")
		.build()
		.expect("Descriptor should build.");

		OAuthClient::new(
			descriptor,
			ClientCredentials::new("mock_client_id", "mock_client_secret"),
			Url::parse("https://summits.example/auth/authorized/mock").expect("URL should parse."),
			ReqwestHttpClient::default(),
		)
	}

	#[tokio::test]
	async fn consent_url_carries_state_scopes_and_params() {
		let server = MockServer::start_async().await;
		let url = client(&server).authorization_url("state-123");
		let pairs: HashMap<_, _> = url.query_pairs().into_owned().collect();

		assert_eq!(url.path(), "/authorize");
		assert_eq!(pairs.get("state").map(String::as_str), Some("state-123"));
		assert_eq!(pairs.get("scope").map(String::as_str), Some("openid profile"));
		assert_eq!(pairs.get("access_type").map(String::as_str), Some("offline"));
		assert_eq!(pairs.get("client_id").map(String::as_str), Some("mock_client_id"));
		assert_eq!(pairs.get("response_type").map(String::as_str), Some("code"));
		assert_eq!(
			pairs.get("redirect_uri").map(String::as_str),
			Some("https://summits.example/auth/authorized/mock")
		);
	}

	#[tokio::test]
	async fn exchange_keeps_non_standard_fields() {
		let server = MockServer::start_async().await;
		let mock = server
			.mock_async(|when, then| {
				when.method(POST)
					.path("/token")
					.form_urlencoded_tuple("grant_type", "authorization_code")
					.form_urlencoded_tuple("client_id", "mock_client_id")
					.form_urlencoded_tuple("client_secret", "mock_client_secret")
					.form_urlencoded_tuple("code", "abc");
				then.status(200).header("content-type", "application/json").body(
					r#"{"access_token":"vk-token","expires_in":43200,"user_id":"2343"}"#,
				);
			})
			.await;
		let token = client(&server).exchange_code("abc").await.expect("Exchange should succeed.");

		mock.assert_async().await;

		assert_eq!(token.access_token.secret(), "vk-token");
		assert!(token.token_type.is_none());
		assert_eq!(token.expires_in, Some(43200));
		assert_eq!(token.extra_field("user_id"), Some(&Value::String("2343".into())));
	}

	#[tokio::test]
	async fn exchange_maps_oauth_errors() {
		let server = MockServer::start_async().await;

		server
			.mock_async(|when, then| {
				when.method(POST).path("/token");
				then.status(401)
					.header("content-type", "application/json")
					.body(r#"{"error":"invalid_grant"}"#);
			})
			.await;

		let err = client(&server).exchange_code("nope").await.expect_err("Exchange must fail.");

		assert!(matches!(
			err,
			ProviderError::OAuth { ref error, status: 401, .. } if error == "invalid_grant"
		));
	}

	#[test]
	fn parse_errors_report_the_field_path() {
		let err = parse_json::<TokenPayload>(br#"{"access_token":5}"#)
			.err()
			.expect("Numeric access token must fail.");

		assert!(matches!(err, ProviderError::Parse { .. }));
		assert!(err.to_string().contains("access_token"));
	}
}
