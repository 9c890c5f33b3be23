// self
use crate::{
	_prelude::*,
	auth::{ProviderId, SourceId},
	provider::{ProviderDescriptor, ProviderEndpoints},
};

/// Errors raised while constructing or validating descriptors.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum ProviderDescriptorError {
	/// Authorization endpoint is required.
	#[error("Missing authorization endpoint.")]
	MissingAuthorizationEndpoint,
	/// Token endpoint is required.
	#[error("Missing token endpoint.")]
	MissingTokenEndpoint,
	/// Profile endpoint is required.
	#[error("Missing user info endpoint.")]
	MissingUserInfoEndpoint,
	/// Endpoints must use HTTPS unless they point at a loopback host.
	#[error("The {endpoint} endpoint must use HTTPS: {url}.")]
	InsecureEndpoint {
		/// Which endpoint failed validation.
		endpoint: &'static str,
		/// Endpoint URL that failed validation.
		url: String,
	},
	/// Scopes must be non-empty and free of whitespace.
	#[error("Scope `{scope}` is not a valid scope token.")]
	InvalidScope {
		/// Offending scope.
		scope: String,
	},
}

/// Builder for [`ProviderDescriptor`] values.
#[derive(Debug)]
pub struct ProviderDescriptorBuilder {
	/// Identifier for the descriptor being constructed.
	pub id: ProviderId,
	/// Source id of the provider's user namespace.
	pub source: SourceId,
	/// Consent page endpoint.
	pub authorization_endpoint: Option<Url>,
	/// Token endpoint.
	pub token_endpoint: Option<Url>,
	/// User profile endpoint.
	pub user_info_endpoint: Option<Url>,
	/// Scopes requested on the consent page.
	pub scopes: Vec<String>,
	/// Extra consent URL parameters.
	pub authorization_params: Vec<(String, String)>,
}
impl ProviderDescriptorBuilder {
	/// Creates a new builder seeded with the provided identifier and source id.
	pub fn new(id: ProviderId, source: SourceId) -> Self {
		Self {
			id,
			source,
			authorization_endpoint: None,
			token_endpoint: None,
			user_info_endpoint: None,
			scopes: Vec::new(),
			authorization_params: Vec::new(),
		}
	}

	/// Sets the authorization endpoint.
	pub fn authorization_endpoint(mut self, url: Url) -> Self {
		self.authorization_endpoint = Some(url);

		self
	}

	/// Sets the token endpoint.
	pub fn token_endpoint(mut self, url: Url) -> Self {
		self.token_endpoint = Some(url);

		self
	}

	/// Sets the user profile endpoint.
	pub fn user_info_endpoint(mut self, url: Url) -> Self {
		self.user_info_endpoint = Some(url);

		self
	}

	/// Appends scopes to the consent request.
	pub fn scopes<I, S>(mut self, scopes: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.scopes.extend(scopes.into_iter().map(Into::into));

		self
	}

	/// Appends an extra consent URL parameter.
	pub fn authorization_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.authorization_params.push((key.into(), value.into()));

		self
	}

	/// Consumes the builder and validates the resulting descriptor.
	pub fn build(self) -> Result<ProviderDescriptor, ProviderDescriptorError> {
		let authorization = self
			.authorization_endpoint
			.ok_or(ProviderDescriptorError::MissingAuthorizationEndpoint)?;
		let token = self.token_endpoint.ok_or(ProviderDescriptorError::MissingTokenEndpoint)?;
		let user_info =
			self.user_info_endpoint.ok_or(ProviderDescriptorError::MissingUserInfoEndpoint)?;
		let descriptor = ProviderDescriptor {
			id: self.id,
			source: self.source,
			endpoints: ProviderEndpoints { authorization, token, user_info },
			scopes: self.scopes,
			authorization_params: self.authorization_params,
		};

		descriptor.validate()?;

		Ok(descriptor)
	}
}

impl ProviderDescriptor {
	fn validate(&self) -> Result<(), ProviderDescriptorError> {
		validate_endpoint("authorization", &self.endpoints.authorization)?;
		validate_endpoint("token", &self.endpoints.token)?;

		validate_endpoint("user_info", &self.endpoints.user_info)?;

		for scope in &self.scopes {
			if scope.is_empty() || scope.chars().any(char::is_whitespace) {
				return Err(ProviderDescriptorError::InvalidScope { scope: scope.clone() });
			}
		}

		Ok(())
	}
}

fn validate_endpoint(name: &'static str, url: &Url) -> Result<(), ProviderDescriptorError> {
	let loopback = matches!(url.host_str(), Some("localhost" | "127.0.0.1" | "[::1]"));

	if url.scheme() == "https" || (url.scheme() == "http" && loopback) {
		Ok(())
	} else {
		Err(ProviderDescriptorError::InsecureEndpoint { endpoint: name, url: url.to_string() })
	}
}
