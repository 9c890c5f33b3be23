// std
use std::sync::Arc;
// crates.io
use httpmock::prelude::*;
// self
use summit_auth::{
	auth::{ProviderId, UserId},
	http::ReqwestHttpClient,
	oauth::ClientCredentials,
	provider::{
		Provider, ProviderError, SuProvider, VkProvider, su::SuEndpoints, vk::VkEndpoints,
	},
	storage::{ImageSize, MemoryImages, MemoryStorage, UserStorage},
	url::Url,
};

fn base(server: &MockServer) -> Url {
	Url::parse(&server.base_url()).expect("Mock base URL should parse.")
}

fn redirect_uri(provider: &str) -> Url {
	Url::parse(&format!("https://summits.example/auth/authorized/{provider}"))
		.expect("Redirect URI should parse.")
}

fn vk(server: &MockServer, images: Option<MemoryImages>) -> VkProvider {
	let provider = VkProvider::new(
		ProviderId::new("vk").expect("Provider fixture should be valid."),
		VkEndpoints::at(&base(server)).expect("VK endpoints should build."),
		ClientCredentials::new("vk-id", "vk-secret"),
		redirect_uri("vk"),
		ReqwestHttpClient::default(),
	)
	.expect("VK provider should build.");

	match images {
		Some(images) => provider.with_images(Arc::new(images)),
		None => provider,
	}
}

fn su(server: &MockServer) -> SuProvider {
	SuProvider::new(
		ProviderId::new("su").expect("Provider fixture should be valid."),
		SuEndpoints::at(&base(server)).expect("SU endpoints should build."),
		ClientCredentials::new("su-id", "su-secret"),
		redirect_uri("su"),
		ReqwestHttpClient::default(),
	)
	.expect("SU provider should build.")
}

async fn mock_vk_token(server: &MockServer) -> httpmock::Mock<'_> {
	server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/access_token")
				.form_urlencoded_tuple("grant_type", "authorization_code")
				.form_urlencoded_tuple("code", "vk-code")
				.form_urlencoded_tuple("client_id", "vk-id")
				.form_urlencoded_tuple("client_secret", "vk-secret")
				.form_urlencoded_tuple("redirect_uri", "https://summits.example/auth/authorized/vk");
			then.status(200)
				.header("content-type", "application/json")
				.body(r#"{"access_token":"vk-access","expires_in":86400,"user_id":2343}"#);
		})
		.await
}

#[tokio::test]
async fn vk_registers_users_with_avatars() {
	let server = MockServer::start_async().await;
	let images = MemoryImages::default();
	let provider = vk(&server, Some(images.clone()));
	let storage = MemoryStorage::default();
	let token_mock = mock_vk_token(&server).await;
	let profile_mock = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/method/users.get")
				.query_param("v", "5.131")
				.query_param("lang", "ru")
				.query_param("fields", "photo_50,photo_200_orig,has_photo")
				.header("authorization", "Bearer vk-access");
			then.status(200).header("content-type", "application/json").body(format!(
				r#"{{"response":[{{"id":2343,"first_name":"Ivan","last_name":"Petrov","photo_50":"{0}/img/50.jpg","photo_200_orig":"{0}/img/200.jpg","has_photo":1}}]}}"#,
				server.base_url()
			));
		})
		.await;
	let small = server
		.mock_async(|when, then| {
			when.method(GET).path("/img/50.jpg");
			then.status(200).body("small-bytes");
		})
		.await;
	let medium = server
		.mock_async(|when, then| {
			when.method(GET).path("/img/200.jpg");
			then.status(200).body("medium-bytes");
		})
		.await;
	let consent = provider.authorization_url("state-1");

	assert!(consent.as_str().contains("access_type=offline"));
	assert_eq!(provider.source_id().0, 1);

	let token = provider.exchange_code("vk-code").await.expect("Exchange should succeed.");
	let external = provider.external_user_id(&token).await.expect("User id should resolve.");

	assert_eq!(external.as_ref(), "2343");

	let user = provider.register(&token, &storage).await.expect("Registration should succeed.");
	let record = storage
		.get_user_by_id(user)
		.await
		.expect("Lookup should succeed.")
		.expect("User should exist.");

	assert_eq!(user, UserId(1));
	assert_eq!(record.name, "Ivan Petrov");
	assert_eq!(record.identity.user_id.as_ref(), "2343");
	assert_eq!(record.images.get(&ImageSize::Small).map(String::as_str), Some("users/1_S.jpg"));
	assert_eq!(record.images.get(&ImageSize::Medium).map(String::as_str), Some("users/1_M.jpg"));
	assert_eq!(images.get("users/1_S.jpg"), Some(b"small-bytes".to_vec()));
	assert_eq!(images.get("users/1_M.jpg"), Some(b"medium-bytes".to_vec()));

	token_mock.assert_async().await;
	profile_mock.assert_async().await;
	small.assert_async().await;
	medium.assert_async().await;
}

#[tokio::test]
async fn vk_avatar_failures_do_not_fail_registration() {
	let server = MockServer::start_async().await;
	let images = MemoryImages::default();
	let provider = vk(&server, Some(images.clone()));
	let storage = MemoryStorage::default();

	mock_vk_token(&server).await;
	server
		.mock_async(|when, then| {
			when.method(GET).path("/method/users.get");
			then.status(200).header("content-type", "application/json").body(format!(
				r#"{{"response":[{{"id":2343,"first_name":"Ivan","last_name":"Petrov","photo_50":"{0}/img/missing.jpg","has_photo":1}}]}}"#,
				server.base_url()
			));
		})
		.await;
	server
		.mock_async(|when, then| {
			when.method(GET).path("/img/missing.jpg");
			then.status(404);
		})
		.await;

	let token = provider.exchange_code("vk-code").await.expect("Exchange should succeed.");
	let user = provider.register(&token, &storage).await.expect("Registration should succeed.");
	let record = storage
		.get_user_by_id(user)
		.await
		.expect("Lookup should succeed.")
		.expect("User should exist.");

	assert!(record.images.is_empty());
	assert!(images.is_empty());
}

#[tokio::test]
async fn vk_api_errors_fail_registration() {
	let server = MockServer::start_async().await;
	let provider = vk(&server, None);
	let storage = MemoryStorage::default();

	mock_vk_token(&server).await;
	server
		.mock_async(|when, then| {
			when.method(GET).path("/method/users.get");
			then.status(200)
				.header("content-type", "application/json")
				.body(r#"{"error":{"error_code":5,"error_msg":"User authorization failed"}}"#);
		})
		.await;

	let token = provider.exchange_code("vk-code").await.expect("Exchange should succeed.");
	let err = provider
		.register(&token, &storage)
		.await
		.expect_err("API errors should fail registration.");

	assert!(matches!(err, ProviderError::Api { code: 5, .. }));
	assert!(storage.is_empty());
}

#[tokio::test]
async fn vk_duplicate_registration_reports_a_conflict() {
	let server = MockServer::start_async().await;
	let provider = vk(&server, None);
	let storage = MemoryStorage::default();

	mock_vk_token(&server).await;
	server
		.mock_async(|when, then| {
			when.method(GET).path("/method/users.get");
			then.status(200)
				.header("content-type", "application/json")
				.body(r#"{"response":[{"id":2343,"first_name":"Ivan","last_name":"Petrov"}]}"#);
		})
		.await;

	let token = provider.exchange_code("vk-code").await.expect("Exchange should succeed.");

	provider.register(&token, &storage).await.expect("First registration should succeed.");

	let err = provider
		.register(&token, &storage)
		.await
		.expect_err("A second registration should collide.");

	assert!(err.is_conflict());
	assert_eq!(storage.len(), 1);
}

#[tokio::test]
async fn rejected_codes_surface_the_oauth_error() {
	let server = MockServer::start_async().await;
	let provider = vk(&server, None);

	server
		.mock_async(|when, then| {
			when.method(POST).path("/access_token");
			then.status(401).header("content-type", "application/json").body(
				r#"{"error":"invalid_grant","error_description":"Code is invalid or expired."}"#,
			);
		})
		.await;

	let err = provider.exchange_code("stale").await.expect_err("Exchange should fail.");

	assert!(matches!(
		err,
		ProviderError::OAuth { ref error, status: 401, .. } if error == "invalid_grant"
	));
}

#[tokio::test]
async fn su_resolves_and_registers_from_user_info() {
	let server = MockServer::start_async().await;
	let provider = su(&server);
	let storage = MemoryStorage::default();
	let token_mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/token")
				.form_urlencoded_tuple("code", "su-code")
				.form_urlencoded_tuple("client_id", "su-id");
			then.status(200)
				.header("content-type", "application/json")
				.body(r#"{"access_token":"su-access","token_type":"Bearer","expires_in":3600,"refresh_token":"su-refresh"}"#);
		})
		.await;
	let info_mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/UserInfo").header("authorization", "Bearer su-access");
			then.status(200)
				.header("content-type", "application/json")
				.body(r#"{"sub":"su-77","name":"Olga K."}"#);
		})
		.await;
	let consent = provider.authorization_url("state-2");
	let pairs: Vec<(String, String)> = consent.query_pairs().into_owned().collect();

	assert!(pairs.contains(&("scope".into(), "openid profile".into())));
	assert!(pairs.contains(&("state".into(), "state-2".into())));
	assert_eq!(provider.source_id().0, 2);

	let token = provider.exchange_code("su-code").await.expect("Exchange should succeed.");

	assert!(token.refresh_token.is_some());

	let external = provider.external_user_id(&token).await.expect("User id should resolve.");
	let user = provider.register(&token, &storage).await.expect("Registration should succeed.");
	let record = storage
		.get_user_by_id(user)
		.await
		.expect("Lookup should succeed.")
		.expect("User should exist.");

	assert_eq!(external.as_ref(), "su-77");
	assert_eq!(record.name, "Olga K.");
	assert_eq!(record.identity.source.0, 2);

	token_mock.assert_async().await;
	info_mock.assert_hits_async(2).await;
}

#[tokio::test]
async fn su_user_info_errors_fail_identity_resolution() -> color_eyre::Result<()> {
	let server = MockServer::start_async().await;
	let provider = su(&server);

	server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200)
				.header("content-type", "application/json")
				.body(r#"{"access_token":"su-access","token_type":"Bearer"}"#);
		})
		.await;
	server
		.mock_async(|when, then| {
			when.method(GET).path("/UserInfo");
			then.status(200)
				.header("content-type", "application/json")
				.body(r#"{"error":"invalid_token","error_description":"Token revoked."}"#);
		})
		.await;

	let token = provider.exchange_code("su-code").await?;
	let err = provider.external_user_id(&token).await.expect_err("Resolution should fail.");

	assert!(matches!(
		err,
		ProviderError::OAuth { ref error, status: 200, .. } if error == "invalid_token"
	));

	Ok(())
}
