//! Axum surface of the login core.
//!
//! Routes live under [`AUTH_PATH_PREFIX`]:
//!
//! - `GET /auth/oauth/{provider}` redirects to the provider consent page.
//! - `GET /auth/authorized/{provider}` handles the provider callback.
//! - `GET /auth/logout` drops the session.
//!
//! Handlers only translate between HTTP and [`AuthFlowController`]; every decision lives there.

pub mod cookies;

pub use cookies::CookieSettings;

// crates.io
use axum::{
	Json, Router,
	extract::{FromRef, FromRequestParts, Path, Query, State},
	http::{HeaderMap, StatusCode, header::REFERER, request::Parts},
	response::{IntoResponse, Redirect, Response},
	routing::get,
};
use axum_extra::extract::cookie::CookieJar;
// self
use crate::{
	_prelude::*,
	auth::UserId,
	config::{AUTH_PATH_PREFIX, AuthConfig},
	error::ConfigError,
	flows::{AuthFlowController, CallbackParams},
	registry::ProviderRegistry,
	session::{Session, SessionManager},
	storage::{ImageManager, UserStorage},
};

/// Shared state of the login routes.
#[derive(Clone, Debug)]
pub struct AuthState {
	/// Flow controller.
	pub controller: Arc<AuthFlowController>,
	/// Session cookie attributes.
	pub cookies: CookieSettings,
}
impl AuthState {
	/// Bundles a controller with the cookie attributes.
	pub fn new(controller: Arc<AuthFlowController>, cookies: CookieSettings) -> Self {
		Self { controller, cookies }
	}

	/// Wires providers, sessions, and cookies from `config`.
	pub fn from_config(
		config: &AuthConfig,
		storage: Arc<dyn UserStorage>,
		images: Option<Arc<dyn ImageManager>>,
	) -> Result<Self, ConfigError> {
		let providers = ProviderRegistry::from_config(config, images)?;
		let sessions =
			SessionManager::new(config.open_session_store()?).with_lifetime(config.session.lifetime);
		let controller =
			AuthFlowController::new(Arc::new(providers), storage, Arc::new(sessions));

		Ok(Self::new(Arc::new(controller), CookieSettings::from(&config.session)))
	}

	async fn load_session(&self, jar: &CookieJar) -> Result<Session> {
		self.controller.sessions().load(self.cookies.token(jar)).await.map_err(|e| {
			tracing::error!(error = %e, "Session could not be loaded.");

			Error::from(e)
		})
	}
}

/// Builds the login router.
pub fn auth_routes(state: AuthState) -> Router {
	Router::new()
		.route(&format!("{AUTH_PATH_PREFIX}/oauth/{{provider}}"), get(begin_login))
		.route(&format!("{AUTH_PATH_PREFIX}/authorized/{{provider}}"), get(complete_login))
		.route(&format!("{AUTH_PATH_PREFIX}/logout"), get(logout))
		.with_state(state)
}

async fn begin_login(
	State(state): State<AuthState>,
	Path(provider): Path<String>,
	headers: HeaderMap,
	jar: CookieJar,
) -> Result<(CookieJar, Redirect)> {
	let mut session = state.load_session(&jar).await?;
	let referer = headers.get(REFERER).and_then(|value| value.to_str().ok());
	let location = state.controller.begin_login(&mut session, &provider, referer).await?;

	Ok((state.cookies.attach(jar, &session), Redirect::temporary(&location)))
}

async fn complete_login(
	State(state): State<AuthState>,
	Path(provider): Path<String>,
	Query(params): Query<CallbackParams>,
	jar: CookieJar,
) -> Result<(CookieJar, Redirect)> {
	let mut session = state.load_session(&jar).await?;
	let location = state.controller.complete_login(&mut session, &provider, &params).await?;

	Ok((state.cookies.attach(jar, &session), Redirect::temporary(&location)))
}

async fn logout(State(state): State<AuthState>, jar: CookieJar) -> Result<(CookieJar, Redirect)> {
	let session = state.load_session(&jar).await?;
	let location = state.controller.logout(session).await?;

	Ok((state.cookies.clear(jar), Redirect::temporary(&location)))
}

impl IntoResponse for Error {
	fn into_response(self) -> Response {
		let status = match &self {
			Self::UnknownProvider { .. } => return StatusCode::NOT_FOUND.into_response(),
			e if e.is_internal() => StatusCode::INTERNAL_SERVER_ERROR,
			_ => StatusCode::BAD_REQUEST,
		};

		(status, Json(serde_json::json!({ "error": self.public_message() }))).into_response()
	}
}

/// Authenticated user of the request, resolved from the session cookie.
///
/// Resolving never creates a session. The router state must provide an [`AuthState`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CurrentUser(pub Option<UserId>);
impl<S> FromRequestParts<S> for CurrentUser
where
	S: Send + Sync,
	AuthState: FromRef<S>,
{
	type Rejection = Error;

	async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
		let state = AuthState::from_ref(state);
		let jar = CookieJar::from_headers(&parts.headers);
		let user = state.controller.sessions().user_id(state.cookies.token(&jar)).await.map_err(
			|e| {
				tracing::error!(error = %e, "Session could not be resolved.");

				Error::from(e)
			},
		)?;

		Ok(Self(user))
	}
}
