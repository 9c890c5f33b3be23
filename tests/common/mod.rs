#![allow(dead_code)]

// std
use std::sync::{
	Arc,
	atomic::{AtomicUsize, Ordering},
};
// crates.io
use serde::Deserialize;
// self
use summit_auth::{
	auth::{ExternalIdentity, ExternalUserId, ProviderId, SourceId, UserId},
	flows::AuthFlowController,
	http::ReqwestHttpClient,
	oauth::{ClientCredentials, OAuthClient, ProviderToken, oauth2::AccessToken},
	provider::{Provider, ProviderDescriptor, ProviderError, ProviderFuture},
	registry::ProviderRegistry,
	session::SessionManager,
	storage::{ImageSize, MemoryStorage, StorageError, StorageFuture, User, UserStorage},
	store::MemoryStore,
	url::Url,
};

/// Code accepted by every fake provider.
pub const GOOD_CODE: &str = "abc";
/// Source id used by fake providers.
pub const MOCK_SOURCE: SourceId = SourceId(42);

/// Provider without network access that counts every call.
#[derive(Debug)]
pub struct ScriptedProvider {
	id: ProviderId,
	external: String,
	pub fail_register: bool,
	pub fail_identity: bool,
	pub exchanges: AtomicUsize,
	pub identities: AtomicUsize,
	pub registrations: AtomicUsize,
	pub consents: AtomicUsize,
}
impl ScriptedProvider {
	pub fn new(name: &str, external: &str) -> Self {
		Self {
			id: ProviderId::new(name).expect("Provider fixture should be valid."),
			external: external.to_owned(),
			fail_register: false,
			fail_identity: false,
			exchanges: AtomicUsize::new(0),
			identities: AtomicUsize::new(0),
			registrations: AtomicUsize::new(0),
			consents: AtomicUsize::new(0),
		}
	}

	pub fn failing_register(mut self) -> Self {
		self.fail_register = true;

		self
	}

	pub fn failing_identity(mut self) -> Self {
		self.fail_identity = true;

		self
	}

	pub fn provider_calls(&self) -> usize {
		self.consents.load(Ordering::SeqCst)
			+ self.exchanges.load(Ordering::SeqCst)
			+ self.identities.load(Ordering::SeqCst)
			+ self.registrations.load(Ordering::SeqCst)
	}

	pub fn identity(&self) -> ExternalIdentity {
		ExternalIdentity::new(
			MOCK_SOURCE,
			ExternalUserId::new(&self.external).expect("External id fixture should be valid."),
		)
	}
}
impl Provider for ScriptedProvider {
	fn name(&self) -> &ProviderId {
		&self.id
	}

	fn source_id(&self) -> SourceId {
		MOCK_SOURCE
	}

	fn authorization_url(&self, state: &str) -> Url {
		self.consents.fetch_add(1, Ordering::SeqCst);

		let mut url =
			Url::parse("https://provider.example/authorize").expect("Consent URL should parse.");

		url.query_pairs_mut().append_pair("client_id", "scripted").append_pair("state", state);

		url
	}

	fn exchange_code<'a>(&'a self, code: &'a str) -> ProviderFuture<'a, ProviderToken> {
		Box::pin(async move {
			self.exchanges.fetch_add(1, Ordering::SeqCst);

			if code != GOOD_CODE {
				return Err(ProviderError::OAuth {
					error: "invalid_grant".into(),
					description: None,
					status: 400,
				});
			}

			Ok(ProviderToken {
				access_token: AccessToken::new("scripted-token".into()),
				token_type: Some("bearer".into()),
				expires_in: Some(3600),
				refresh_token: None,
				extra: Default::default(),
			})
		})
	}

	fn external_user_id<'a>(
		&'a self,
		_token: &'a ProviderToken,
	) -> ProviderFuture<'a, ExternalUserId> {
		Box::pin(async move {
			self.identities.fetch_add(1, Ordering::SeqCst);

			if self.fail_identity {
				return Err(ProviderError::MissingField { field: "user_id" });
			}

			Ok(ExternalUserId::new(&self.external)?)
		})
	}

	fn register<'a>(
		&'a self,
		_token: &'a ProviderToken,
		storage: &'a dyn UserStorage,
	) -> ProviderFuture<'a, UserId> {
		Box::pin(async move {
			self.registrations.fetch_add(1, Ordering::SeqCst);

			if self.fail_register {
				return Err(ProviderError::Api { code: 5, message: "profile unavailable".into() });
			}

			Ok(storage.create_user("Scripted User", &self.identity()).await?)
		})
	}
}

#[derive(Deserialize)]
struct MockProfile {
	id: String,
	#[serde(default)]
	name: String,
}

/// Generic OAuth provider talking to an httpmock server.
#[derive(Debug)]
pub struct HttpMockProvider {
	client: OAuthClient,
}
impl HttpMockProvider {
	pub fn new(name: &str, base: &str, client_id: &str) -> Self {
		let url = |path: &str| Url::parse(&format!("{base}{path}")).expect("Mock URL should parse.");
		let descriptor = ProviderDescriptor::builder(
			ProviderId::new(name).expect("Provider fixture should be valid."),
			MOCK_SOURCE,
		)
		.authorization_endpoint(url("/authorize"))
		.token_endpoint(url("/token"))
		.user_info_endpoint(url("/me"))
		.build()
		.expect("Mock descriptor should build.");
		let redirect_uri = Url::parse(&format!("https://summits.example/auth/authorized/{name}"))
			.expect("Redirect URI should parse.");

		Self {
			client: OAuthClient::new(
				descriptor,
				ClientCredentials::new(client_id, "mock_client_secret"),
				redirect_uri,
				ReqwestHttpClient::default(),
			),
		}
	}

	async fn profile(&self, token: &ProviderToken) -> Result<MockProfile, ProviderError> {
		self.client.get_json(&self.client.descriptor().endpoints.user_info, token).await
	}
}
impl Provider for HttpMockProvider {
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
		Box::pin(async move { Ok(ExternalUserId::new(self.profile(token).await?.id)?) })
	}

	fn register<'a>(
		&'a self,
		token: &'a ProviderToken,
		storage: &'a dyn UserStorage,
	) -> ProviderFuture<'a, UserId> {
		Box::pin(async move {
			let profile = self.profile(token).await?;
			let identity = ExternalIdentity::new(self.source_id(), ExternalUserId::new(profile.id)?);

			Ok(storage.create_user(&profile.name, &identity).await?)
		})
	}
}

/// User storage whose every call fails.
#[derive(Debug, Default)]
pub struct BrokenStorage;
impl UserStorage for BrokenStorage {
	fn create_user<'a>(
		&'a self,
		_name: &'a str,
		_identity: &'a ExternalIdentity,
	) -> StorageFuture<'a, UserId> {
		Box::pin(async { Err(StorageError::Backend { message: "database is down".into() }) })
	}

	fn get_user<'a>(&'a self, _identity: &'a ExternalIdentity) -> StorageFuture<'a, Option<User>> {
		Box::pin(async { Err(StorageError::Backend { message: "database is down".into() }) })
	}

	fn get_user_by_id<'a>(&'a self, _id: UserId) -> StorageFuture<'a, Option<User>> {
		Box::pin(async { Err(StorageError::Backend { message: "database is down".into() }) })
	}

	fn update_user_image<'a>(
		&'a self,
		_id: UserId,
		_size: ImageSize,
		_key: &'a str,
	) -> StorageFuture<'a, ()> {
		Box::pin(async { Err(StorageError::Backend { message: "database is down".into() }) })
	}
}

/// User storage where another callback registers the identity between lookup and insert.
///
/// The first `get_user` finds nothing, `create_user` always collides, and later lookups return
/// `winner`.
#[derive(Debug)]
pub struct RacingStorage {
	pub winner: Option<User>,
	pub lookups: AtomicUsize,
	pub inserts: AtomicUsize,
}
impl RacingStorage {
	pub fn won_by(winner: Option<User>) -> Self {
		Self { winner, lookups: AtomicUsize::new(0), inserts: AtomicUsize::new(0) }
	}
}
impl UserStorage for RacingStorage {
	fn create_user<'a>(
		&'a self,
		_name: &'a str,
		identity: &'a ExternalIdentity,
	) -> StorageFuture<'a, UserId> {
		Box::pin(async move {
			self.inserts.fetch_add(1, Ordering::SeqCst);

			Err(StorageError::Conflict { identity: identity.to_string() })
		})
	}

	fn get_user<'a>(&'a self, _identity: &'a ExternalIdentity) -> StorageFuture<'a, Option<User>> {
		Box::pin(async move {
			match self.lookups.fetch_add(1, Ordering::SeqCst) {
				0 => Ok(None),
				_ => Ok(self.winner.clone()),
			}
		})
	}

	fn get_user_by_id<'a>(&'a self, id: UserId) -> StorageFuture<'a, Option<User>> {
		Box::pin(async move { Ok(self.winner.clone().filter(|user| user.id == id)) })
	}

	fn update_user_image<'a>(
		&'a self,
		id: UserId,
		_size: ImageSize,
		_key: &'a str,
	) -> StorageFuture<'a, ()> {
		Box::pin(async move { Err(StorageError::NotFound { id }) })
	}
}

/// Controller wired to in-memory stores.
pub struct Harness {
	pub controller: Arc<AuthFlowController>,
	pub users: MemoryStorage,
	pub store: Arc<MemoryStore>,
}
impl Harness {
	pub fn new(providers: Vec<Arc<dyn Provider>>) -> Self {
		let users = MemoryStorage::default();

		Self::with_storage(providers, users.clone(), Arc::new(users))
	}

	pub fn with_storage(
		providers: Vec<Arc<dyn Provider>>,
		users: MemoryStorage,
		storage: Arc<dyn UserStorage>,
	) -> Self {
		let registry = providers
			.into_iter()
			.fold(ProviderRegistry::new(), |registry, provider| registry.with_provider(provider));
		let store = Arc::new(MemoryStore::default());
		let sessions = SessionManager::new(store.clone());
		let controller = AuthFlowController::new(Arc::new(registry), storage, Arc::new(sessions));

		Self { controller: Arc::new(controller), users, store }
	}

	pub fn sessions(&self) -> &SessionManager {
		self.controller.sessions()
	}
}

/// Reads the `state` query parameter of a consent URL.
pub fn state_of(consent: &str) -> String {
	Url::parse(consent)
		.expect("Consent URL should parse.")
		.query_pairs()
		.find(|(key, _)| key == "state")
		.map(|(_, value)| value.into_owned())
		.expect("Consent URL should carry a state.")
}
