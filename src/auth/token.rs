//! Random token generation and the opaque session token wrapper.

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::RngCore;
use sha2::{Digest, Sha256};
// self
use crate::_prelude::*;

/// Entropy, in bytes, of every session token.
pub const SESSION_TOKEN_BYTES: usize = 32;
/// Entropy, in bytes, of every OAuth `state` value.
pub const OAUTH_STATE_BYTES: usize = 16;

/// Cryptographically secure random string source backed by the thread-local CSPRNG.
///
/// Output is URL-safe base64 without padding, so `bytes` of entropy produce
/// `ceil(bytes * 4 / 3)` characters.
#[derive(Clone, Copy, Debug, Default)]
pub struct RandomTokenSource;
impl RandomTokenSource {
	/// Returns a random string carrying `bytes` bytes of entropy.
	pub fn generate(self, bytes: usize) -> String {
		let mut buf = vec![0_u8; bytes];

		rand::rng().fill_bytes(&mut buf);

		URL_SAFE_NO_PAD.encode(buf)
	}

	/// Fresh session token.
	pub fn session_token(self) -> SessionToken {
		SessionToken(self.generate(SESSION_TOKEN_BYTES))
	}

	/// Fresh OAuth `state` value.
	pub fn oauth_state(self) -> String {
		self.generate(OAUTH_STATE_BYTES)
	}
}

/// Opaque session token carried by the session cookie.
///
/// The token is a bearer credential; `Debug` and `Display` redact it.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SessionToken(String);
impl SessionToken {
	/// Wraps a token received from a client cookie.
	///
	/// Returns `None` for values that could never have been issued by [`RandomTokenSource`].
	pub fn parse(value: &str) -> Option<Self> {
		let decoded = URL_SAFE_NO_PAD.decode(value).ok()?;

		(decoded.len() == SESSION_TOKEN_BYTES).then(|| Self(value.to_owned()))
	}

	/// Returns the raw token. Callers must avoid logging this string.
	pub fn expose(&self) -> &str {
		&self.0
	}

	/// Hex SHA-256 digest of the token, used as the storage key.
	pub fn digest(&self) -> String {
		let digest = Sha256::digest(self.0.as_bytes());

		digest.iter().map(|byte| format!("{byte:02x}")).collect()
	}
}
impl Debug for SessionToken {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("SessionToken").field(&"<redacted>").finish()
	}
}
impl Display for SessionToken {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("<redacted>")
	}
}
