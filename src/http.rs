//! Outbound HTTP transport shared by every provider.
//!
//! Provider calls never follow redirects: token and API endpoints answer directly, and a
//! redirect from one of them is treated as an unexpected status. Every request carries the
//! client-wide timeout so a hung provider cannot pin a callback handler forever.

// std
use std::{ops::Deref, time::Duration as StdDuration};
// crates.io
use oauth2::AccessToken;
use reqwest::{RequestBuilder, redirect::Policy};
// self
use crate::{
	_prelude::*,
	error::{ConfigError, TransportError},
};

/// Default per-request timeout for provider calls.
pub const DEFAULT_PROVIDER_TIMEOUT: StdDuration = StdDuration::from_secs(10);

/// Status and body of a completed provider response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HttpReply {
	/// HTTP status code.
	pub status: u16,
	/// Raw response body.
	pub body: Vec<u8>,
}
impl HttpReply {
	/// Returns true for 2xx statuses.
	pub fn is_success(&self) -> bool {
		(200..300).contains(&self.status)
	}

	/// Lossy UTF-8 preview of the body, truncated for log fields.
	pub fn preview(&self) -> String {
		const PREVIEW_LIMIT: usize = 256;

		let text = String::from_utf8_lossy(&self.body);

		match text.char_indices().nth(PREVIEW_LIMIT) {
			Some((idx, _)) => format!("{}...", &text[..idx]),
			None => text.into_owned(),
		}
	}
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
#[derive(Clone, Debug)]
pub struct ReqwestHttpClient(pub ReqwestClient);
impl ReqwestHttpClient {
	/// Wraps an existing reqwest [`ReqwestClient`].
	///
	/// The caller is responsible for disabling redirects and setting a timeout on it.
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}

	/// Builds a client with redirects disabled and the provided request timeout.
	pub fn with_timeout(timeout: StdDuration) -> Result<Self, ConfigError> {
		let client = ReqwestClient::builder().redirect(Policy::none()).timeout(timeout).build()?;

		Ok(Self(client))
	}

	/// POSTs an `application/x-www-form-urlencoded` body.
	pub async fn post_form(
		&self,
		url: &Url,
		form: &[(&str, &str)],
	) -> Result<HttpReply, TransportError> {
		self.send(self.0.post(url.clone()).form(form)).await
	}

	/// GETs `url` with the access token in an `Authorization: Bearer` header.
	pub async fn get_bearer(
		&self,
		url: &Url,
		token: &AccessToken,
	) -> Result<HttpReply, TransportError> {
		self.send(self.0.get(url.clone()).bearer_auth(token.secret())).await
	}

	/// GETs `url` without credentials.
	pub async fn get(&self, url: &Url) -> Result<HttpReply, TransportError> {
		self.send(self.0.get(url.clone())).await
	}

	async fn send(&self, request: RequestBuilder) -> Result<HttpReply, TransportError> {
		let response = request.send().await?;
		let status = response.status().as_u16();
		let body = response.bytes().await?.to_vec();

		Ok(HttpReply { status, body })
	}
}
impl Default for ReqwestHttpClient {
	fn default() -> Self {
		Self::with_timeout(DEFAULT_PROVIDER_TIMEOUT)
			.unwrap_or_else(|_| Self(ReqwestClient::default()))
	}
}
impl AsRef<ReqwestClient> for ReqwestHttpClient {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
impl Deref for ReqwestHttpClient {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use httpmock::prelude::*;
	// self
	use super::*;

	#[test]
	fn preview_truncates_long_bodies() {
		let reply = HttpReply { status: 500, body: vec![b'x'; 300] };

		assert!(!reply.is_success());
		assert_eq!(reply.preview().len(), 259);
		assert_eq!(HttpReply { status: 204, body: b"ok".to_vec() }.preview(), "ok");
	}

	#[tokio::test]
	async fn redirects_are_not_followed() {
		let server = MockServer::start_async().await;
		let mock = server
			.mock_async(|when, then| {
				when.method(GET).path("/moved");
				then.status(302).header("location", "/elsewhere");
			})
			.await;
		let client = ReqwestHttpClient::default();
		let url = Url::parse(&server.url("/moved")).expect("Mock URL should parse.");
		let reply = client.get(&url).await.expect("Request should complete.");

		mock.assert_async().await;

		assert_eq!(reply.status, 302);
	}

	#[tokio::test]
	async fn slow_providers_time_out() {
		let server = MockServer::start_async().await;

		server
			.mock_async(|when, then| {
				when.method(GET).path("/slow");
				then.status(200).delay(StdDuration::from_millis(500));
			})
			.await;

		let client = ReqwestHttpClient::with_timeout(StdDuration::from_millis(50))
			.expect("Client should build.");
		let url = Url::parse(&server.url("/slow")).expect("Mock URL should parse.");
		let err = client.get(&url).await.expect_err("Request should time out.");

		assert!(matches!(err, TransportError::Timeout));
	}
}
