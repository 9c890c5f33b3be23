//! Auth-domain identifiers, random token generation, and the session token.

pub mod id;
pub mod token;

pub use id::*;
pub use token::*;
