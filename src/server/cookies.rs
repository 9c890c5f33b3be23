//! Session cookie construction.

// crates.io
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
// self
use crate::{_prelude::*, config::SessionSettings, session::Session};

/// Attributes of the session cookie.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CookieSettings {
	/// Cookie name.
	pub name: String,
	/// Sets the `Secure` attribute.
	pub secure: bool,
	/// Cookie `Max-Age`; matches the session lifetime.
	pub max_age: Duration,
}
impl CookieSettings {
	/// Reads the token carried by the request's session cookie.
	pub fn token<'a>(&self, jar: &'a CookieJar) -> Option<&'a str> {
		jar.get(&self.name).map(|cookie| cookie.value())
	}

	/// Adds the session cookie when the session exists in the store.
	pub fn attach(&self, jar: CookieJar, session: &Session) -> CookieJar {
		if !session.is_persisted() {
			return jar;
		}

		jar.add(self.session_cookie(session.token().expose()))
	}

	/// Removes the session cookie from the client.
	pub fn clear(&self, jar: CookieJar) -> CookieJar {
		jar.remove(Cookie::build((self.name.clone(), "")).path("/").max_age(Duration::ZERO).build())
	}

	fn session_cookie(&self, token: &str) -> Cookie<'static> {
		Cookie::build((self.name.clone(), token.to_owned()))
			.http_only(true)
			.secure(self.secure)
			.same_site(SameSite::Lax)
			.path("/")
			.max_age(self.max_age)
			.build()
	}
}
impl From<&SessionSettings> for CookieSettings {
	fn from(settings: &SessionSettings) -> Self {
		Self {
			name: settings.cookie_name.clone(),
			secure: settings.secure_cookie,
			max_age: settings.lifetime,
		}
	}
}
