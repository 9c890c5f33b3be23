//! Login orchestration: the redirect to a provider, the provider callback, and logout.
//!
//! [`AuthFlowController`] binds a CSRF state and an optional return path to the session before
//! leaving for the provider, then validates the callback against that state, resolves or
//! registers the local user, and marks the session as authenticated. Every operation returns
//! the location the browser should be redirected to; the HTTP surface only translates it.

// self
use crate::{
	_prelude::*,
	auth::{ExternalIdentity, RandomTokenSource, UserId},
	oauth::ProviderToken,
	obs::{FlowKind, FlowOutcome, FlowSpan, record_flow_outcome},
	provider::{Provider, ProviderError},
	registry::ProviderRegistry,
	session::{Session, SessionManager},
	storage::UserStorage,
};

/// Where the browser lands when no return path applies.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LandingPaths {
	/// Landing location of an authenticated user.
	pub authenticated: String,
	/// Landing location after logout.
	pub anonymous: String,
}
impl Default for LandingPaths {
	fn default() -> Self {
		Self { authenticated: "/user/me".into(), anonymous: "/".into() }
	}
}

/// Query parameters of a provider callback.
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CallbackParams {
	/// Authorization code.
	pub code: Option<String>,
	/// Echoed CSRF state.
	pub state: Option<String>,
	/// OAuth error code reported by the provider.
	pub error: Option<String>,
	/// OAuth error description reported by the provider.
	pub error_description: Option<String>,
}
impl Debug for CallbackParams {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CallbackParams")
			.field("code", &self.code.as_ref().map(|_| "<redacted>"))
			.field("state", &self.state.as_ref().map(|_| "<redacted>"))
			.field("error", &self.error)
			.field("error_description", &self.error_description)
			.finish()
	}
}

/// Orchestrates login and logout against the registered providers.
pub struct AuthFlowController {
	providers: Arc<ProviderRegistry>,
	storage: Arc<dyn UserStorage>,
	sessions: Arc<SessionManager>,
	landing: LandingPaths,
	tokens: RandomTokenSource,
}
impl AuthFlowController {
	/// Creates a controller with the default landing paths.
	pub fn new(
		providers: Arc<ProviderRegistry>,
		storage: Arc<dyn UserStorage>,
		sessions: Arc<SessionManager>,
	) -> Self {
		Self {
			providers,
			storage,
			sessions,
			landing: LandingPaths::default(),
			tokens: RandomTokenSource,
		}
	}

	/// Overrides the landing paths.
	pub fn with_landing(mut self, landing: LandingPaths) -> Self {
		self.landing = landing;

		self
	}

	/// Registered providers.
	pub fn providers(&self) -> &ProviderRegistry {
		&self.providers
	}

	/// Session manager shared with the HTTP surface.
	pub fn sessions(&self) -> &Arc<SessionManager> {
		&self.sessions
	}

	/// Landing paths in use.
	pub fn landing(&self) -> &LandingPaths {
		&self.landing
	}

	/// Starts a login round-trip and returns the consent URL to redirect to.
	///
	/// An already authenticated session short-circuits to the authenticated landing path
	/// without touching the provider or the session.
	pub async fn begin_login(
		&self,
		session: &mut Session,
		provider: &str,
		referer: Option<&str>,
	) -> Result<String> {
		const KIND: FlowKind = FlowKind::BeginLogin;

		let span = FlowSpan::new(KIND, "begin_login");

		record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span.instrument(self.begin_login_inner(session, provider, referer)).await;

		record_result(KIND, provider, &result);

		result
	}

	/// Handles a provider callback and returns the location to redirect to.
	pub async fn complete_login(
		&self,
		session: &mut Session,
		provider: &str,
		params: &CallbackParams,
	) -> Result<String> {
		const KIND: FlowKind = FlowKind::CompleteLogin;

		let span = FlowSpan::new(KIND, "complete_login");

		record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span.instrument(self.complete_login_inner(session, provider, params)).await;

		record_result(KIND, provider, &result);

		result
	}

	/// Destroys the session and returns the anonymous landing path.
	pub async fn logout(&self, session: Session) -> Result<String> {
		const KIND: FlowKind = FlowKind::Logout;

		let span = FlowSpan::new(KIND, "logout");

		record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async {
				self.sessions.destroy(session).await.map_err(Error::SessionDestroyFailed)?;

				Ok(self.landing.anonymous.clone())
			})
			.await;

		record_result(KIND, "-", &result);

		result
	}

	async fn begin_login_inner(
		&self,
		session: &mut Session,
		provider: &str,
		referer: Option<&str>,
	) -> Result<String> {
		let provider = self.providers.get(provider)?;

		if session.user_id().is_some() {
			tracing::debug!(provider = %provider.name(), "Session is already authenticated.");

			return Ok(self.landing.authenticated.clone());
		}
		if let Some(target) = referer.and_then(redirect_target_from_referer) {
			session.set_redirect_target(target);
		}

		let state = self.tokens.oauth_state();
		let consent = provider.authorization_url(&state);

		session.set_oauth_state(state);
		self.sessions.commit(session).await?;

		Ok(consent.into())
	}

	async fn complete_login_inner(
		&self,
		session: &mut Session,
		provider: &str,
		params: &CallbackParams,
	) -> Result<String> {
		let provider = self.providers.get(provider)?;
		let name = provider.name().clone();

		if let Some(error) = params.error.as_ref() {
			// A denial still ends the pending round trip.
			self.sessions.pop_oauth_state(session).await?;
			tracing::warn!(
				provider = %name,
				error = %error,
				description = params.error_description.as_deref().unwrap_or_default(),
				"Provider denied the authorization."
			);

			return Err(Error::ProviderDenied {
				provider: name,
				error: error.clone(),
				description: params.error_description.clone(),
			});
		}

		let expected =
			self.sessions.pop_oauth_state(session).await?.ok_or(Error::MissingPendingState)?;

		if params.state.as_deref() != Some(expected.as_str()) {
			return Err(Error::StateMismatch);
		}

		let code = params.code.as_deref().filter(|code| !code.is_empty()).ok_or_else(|| {
			Error::ExchangeFailed {
				provider: name.clone(),
				source: ProviderError::MissingField { field: "code" },
			}
		})?;
		let token = provider
			.exchange_code(code)
			.await
			.map_err(|source| Error::ExchangeFailed { provider: name.clone(), source })?;
		let external = provider
			.external_user_id(&token)
			.await
			.map_err(|source| Error::IdentityResolutionFailed { provider: name.clone(), source })?;
		let identity = ExternalIdentity::new(provider.source_id(), external);
		let user = match self.storage.get_user(&identity).await? {
			Some(user) => user.id,
			None => self.register(provider.as_ref(), &token, &identity).await?,
		};

		session.set_user_id(user);
		session.renew();

		let target =
			session.take_redirect_target().filter(|target| !target.is_empty()).unwrap_or_else(|| {
				self.landing.authenticated.clone()
			});

		self.sessions.commit(session).await?;

		tracing::info!(provider = %name, user = %user, "Login completed.");

		Ok(target)
	}

	/// Registers a first-time user, falling back to a lookup when a concurrent callback won.
	async fn register(
		&self,
		provider: &dyn Provider,
		token: &ProviderToken,
		identity: &ExternalIdentity,
	) -> Result<UserId> {
		let name = provider.name().clone();

		match provider.register(token, self.storage.as_ref()).await {
			Ok(user) => {
				tracing::info!(provider = %name, user = %user, "Registered a new user.");

				Ok(user)
			},
			Err(source) if source.is_conflict() => match self.storage.get_user(identity).await? {
				Some(user) => Ok(user.id),
				None => Err(Error::RegistrationFailed { provider: name, source }),
			},
			Err(source) => Err(Error::RegistrationFailed { provider: name, source }),
		}
	}
}

impl Debug for AuthFlowController {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AuthFlowController")
			.field("providers", &self.providers)
			.field("sessions", &self.sessions)
			.field("landing", &self.landing)
			.finish()
	}
}

fn record_result(kind: FlowKind, provider: &str, result: &Result<String>) {
	match result {
		Ok(_) => record_flow_outcome(kind, FlowOutcome::Success),
		Err(e) => {
			record_flow_outcome(kind, FlowOutcome::Failure);

			if e.is_internal() {
				tracing::error!(flow = %kind, provider, error = %e, "Login flow failed.");
			} else {
				tracing::warn!(flow = %kind, provider, error = %e, "Login flow rejected.");
			}
		},
	}
}

/// Extracts a same-site return path (`path?query`) from a `Referer` header value.
///
/// Absolute and relative references are both accepted; only the path and query survive, so
/// the result always stays on this site. Protocol-relative paths (`//host`) are dropped.
pub fn redirect_target_from_referer(referer: &str) -> Option<String> {
	let referer = referer.trim();

	if referer.is_empty() {
		return None;
	}

	let url = Url::parse(referer)
		.or_else(|_| Url::parse("http://localhost").and_then(|base| base.join(referer)))
		.ok()?;

	if !matches!(url.scheme(), "http" | "https") {
		return None;
	}

	let path = url.path();

	if !path.starts_with('/') || path.starts_with("//") {
		return None;
	}

	Some(match url.query() {
		Some(query) => format!("{path}?{query}"),
		None => path.to_owned(),
	})
}
