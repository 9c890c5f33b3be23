//! Provider descriptor data structures shared by every provider implementation.
//!
//! A descriptor is validated metadata: endpoints, scopes, and the extra authorization
//! parameters a provider expects on its consent page.

/// Builder API for assembling provider descriptors.
pub mod builder;

pub use builder::*;

// self
use crate::{
	_prelude::*,
	auth::{ProviderId, SourceId},
};

/// Endpoint set declared by a provider descriptor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderEndpoints {
	/// Consent page the browser is sent to.
	pub authorization: Url,
	/// Token endpoint used for the code exchange.
	pub token: Url,
	/// Endpoint returning the user profile.
	pub user_info: Url,
}

/// Immutable provider descriptor consumed by provider implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderDescriptor {
	/// Provider name used in routes.
	pub id: ProviderId,
	/// User namespace of this provider in the user storage.
	pub source: SourceId,
	/// Endpoint definitions exposed by the provider.
	pub endpoints: ProviderEndpoints,
	/// Scopes requested on the consent page, in order.
	pub scopes: Vec<String>,
	/// Extra query parameters appended to the consent URL.
	pub authorization_params: Vec<(String, String)>,
}
impl ProviderDescriptor {
	/// Creates a new builder for the provided identifier and source id.
	pub fn builder(id: ProviderId, source: SourceId) -> ProviderDescriptorBuilder {
		ProviderDescriptorBuilder::new(id, source)
	}
}
