//! Request-scoped session handles on top of a [`SessionStore`].
//!
//! A [`SessionManager`] materializes sessions lazily: a request without a known token gets a
//! fresh token and an empty [`Session`], and nothing reaches the store unless the handle is
//! mutated and committed. Handlers receive the manager and the token explicitly; there is no
//! ambient per-request session state.

// self
use crate::{
	_prelude::*,
	auth::{RandomTokenSource, SessionToken, UserId},
	store::{SessionData, SessionStore, StoreError},
};

/// Default lifetime of a committed session.
pub const DEFAULT_SESSION_LIFETIME: Duration = Duration::hours(24);

/// Loads, commits, and destroys sessions for request handlers.
pub struct SessionManager {
	store: Arc<dyn SessionStore>,
	lifetime: Duration,
	tokens: RandomTokenSource,
	pop_guards: Mutex<HashMap<SessionToken, Arc<AsyncMutex<()>>>>,
}
impl SessionManager {
	/// Creates a manager over `store` with the default session lifetime.
	pub fn new(store: Arc<dyn SessionStore>) -> Self {
		Self {
			store,
			lifetime: DEFAULT_SESSION_LIFETIME,
			tokens: RandomTokenSource,
			pop_guards: Default::default(),
		}
	}

	/// Overrides the lifetime applied on every commit.
	pub fn with_lifetime(mut self, lifetime: Duration) -> Self {
		self.lifetime = lifetime;

		self
	}

	/// Lifetime applied on every commit.
	pub fn lifetime(&self) -> Duration {
		self.lifetime
	}

	/// Loads the session named by a cookie value, or starts a fresh one.
	///
	/// Malformed, unknown, and expired tokens all yield a fresh, unpersisted session under a
	/// newly generated token.
	pub async fn load(&self, cookie: Option<&str>) -> Result<Session, StoreError> {
		if let Some(token) = cookie.and_then(SessionToken::parse) {
			if let Some(data) = self.store.find(&token).await? {
				return Ok(Session::existing(token, data));
			}
		}

		Ok(Session::fresh(self.tokens.session_token()))
	}

	/// Resolves the authenticated user behind a cookie value without materializing a session.
	pub async fn user_id(&self, cookie: Option<&str>) -> Result<Option<UserId>, StoreError> {
		let Some(token) = cookie.and_then(SessionToken::parse) else {
			return Ok(None);
		};

		Ok(self.store.find(&token).await?.and_then(|data| data.user_id))
	}

	/// Persists the session if it was mutated since it was loaded or last committed.
	///
	/// A renewed session is written under its new token before the old record is removed.
	pub async fn commit(&self, session: &mut Session) -> Result<(), StoreError> {
		if !session.dirty {
			return Ok(());
		}

		let expiry = OffsetDateTime::now_utc() + self.lifetime;

		self.store.commit(&session.token, session.data.clone(), expiry).await?;

		if let Some(previous) = session.previous.take() {
			self.store.delete(&previous).await?;
		}

		session.dirty = false;
		session.persisted = true;

		Ok(())
	}

	/// Reads and clears the pending OAuth state exactly once.
	///
	/// The read goes to the store rather than the request's snapshot and is serialized per
	/// token, so two concurrent callbacks cannot both observe the same state. The removal is
	/// committed before this returns, which keeps the state invalidated even when the caller
	/// fails afterwards.
	pub async fn pop_oauth_state(&self, session: &mut Session) -> Result<Option<String>, StoreError> {
		let guard = self.pop_guard(&session.token);
		let popped = {
			let _singleflight = guard.lock().await;

			match self.store.find(&session.token).await? {
				Some(mut stored) => match stored.oauth_state.take() {
					Some(state) => {
						let expiry = OffsetDateTime::now_utc() + self.lifetime;

						self.store.commit(&session.token, stored, expiry).await?;

						Some(state)
					},
					None => None,
				},
				None => None,
			}
		};

		drop(guard);
		self.release_pop_guards();
		session.data.oauth_state = None;

		Ok(popped)
	}

	/// Removes the session record entirely.
	pub async fn destroy(&self, session: Session) -> Result<(), StoreError> {
		self.store.delete(&session.token).await?;

		if let Some(previous) = session.previous {
			self.store.delete(&previous).await?;
		}

		Ok(())
	}

	fn pop_guard(&self, token: &SessionToken) -> Arc<AsyncMutex<()>> {
		let mut guards = self.pop_guards.lock();

		guards.entry(token.clone()).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone()
	}

	fn release_pop_guards(&self) {
		self.pop_guards.lock().retain(|_, guard| Arc::strong_count(guard) > 1);
	}
}
impl Debug for SessionManager {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("SessionManager").field("lifetime", &self.lifetime).finish()
	}
}

/// Request-scoped view of one session.
#[derive(Clone, Debug)]
pub struct Session {
	token: SessionToken,
	previous: Option<SessionToken>,
	data: SessionData,
	dirty: bool,
	persisted: bool,
}
impl Session {
	fn fresh(token: SessionToken) -> Self {
		Self { token, previous: None, data: SessionData::default(), dirty: false, persisted: false }
	}

	fn existing(token: SessionToken, data: SessionData) -> Self {
		Self { token, previous: None, data, dirty: false, persisted: true }
	}

	/// Token identifying the session.
	pub fn token(&self) -> &SessionToken {
		&self.token
	}

	/// Returns true once the session exists in the store, so the client should hold its cookie.
	pub fn is_persisted(&self) -> bool {
		self.persisted
	}

	/// Authenticated local user, if any.
	pub fn user_id(&self) -> Option<UserId> {
		self.data.user_id
	}

	/// Pending redirect target, if any.
	pub fn redirect_target(&self) -> Option<&str> {
		self.data.redirect_target.as_deref()
	}

	/// Returns true while an OAuth round-trip is pending in this snapshot.
	pub fn has_pending_state(&self) -> bool {
		self.data.oauth_state.is_some()
	}

	/// Marks the session as authenticated.
	pub fn set_user_id(&mut self, user_id: UserId) {
		self.data.user_id = Some(user_id);
		self.dirty = true;
	}

	/// Records the CSRF state of a new round-trip, replacing any stale one.
	pub fn set_oauth_state(&mut self, state: impl Into<String>) {
		self.data.oauth_state = Some(state.into());
		self.dirty = true;
	}

	/// Records where to send the browser once the round-trip completes.
	pub fn set_redirect_target(&mut self, target: impl Into<String>) {
		self.data.redirect_target = Some(target.into());
		self.dirty = true;
	}

	/// Removes and returns the pending redirect target.
	pub fn take_redirect_target(&mut self) -> Option<String> {
		let target = self.data.redirect_target.take();

		if target.is_some() {
			self.dirty = true;
		}

		target
	}

	/// Moves the session to a freshly generated token; the old record is removed on commit.
	pub fn renew(&mut self) {
		let previous = std::mem::replace(&mut self.token, RandomTokenSource.session_token());

		if self.persisted && self.previous.is_none() {
			self.previous = Some(previous);
		}

		self.dirty = true;
	}
}
