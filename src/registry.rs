//! Immutable name → provider map assembled once at startup.

// self
use crate::{
	_prelude::*,
	auth::ProviderId,
	config::AuthConfig,
	error::ConfigError,
	provider::{Provider, SuProvider, VkProvider, su::SuEndpoints, vk::VkEndpoints},
	storage::ImageManager,
};

/// Route name of the VK provider.
pub const VK_PROVIDER: &str = "vk";
/// Route name of the SU provider.
pub const SU_PROVIDER: &str = "su";

/// Registered providers keyed by route name.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
	providers: HashMap<ProviderId, Arc<dyn Provider>>,
}
impl ProviderRegistry {
	/// Creates an empty registry.
	pub fn new() -> Self {
		Self::default()
	}

	/// Adds `provider` under its own name, replacing any provider registered under that name.
	pub fn with_provider(mut self, provider: Arc<dyn Provider>) -> Self {
		self.providers.insert(provider.name().clone(), provider);

		self
	}

	/// Builds the VK and SU providers enabled in `config`.
	///
	/// VK avatars are imported into `images` when one is supplied.
	pub fn from_config(
		config: &AuthConfig,
		images: Option<Arc<dyn ImageManager>>,
	) -> Result<Self, ConfigError> {
		let http = config.http_client()?;
		let mut registry = Self::new();

		if let Some(settings) = config.vk.as_ref() {
			let id = ProviderId::new(VK_PROVIDER)?;
			let endpoints = match settings.endpoint_base.as_ref() {
				Some(base) => VkEndpoints::at(base)?,
				None => VkEndpoints::production()?,
			};
			let mut provider = VkProvider::new(
				id.clone(),
				endpoints,
				settings.credentials.clone(),
				config.redirect_uri(&id)?,
				http.clone(),
			)?;

			if let Some(images) = images.clone() {
				provider = provider.with_images(images);
			}

			registry = registry.with_provider(Arc::new(provider));
		}
		if let Some(settings) = config.su.as_ref() {
			let id = ProviderId::new(SU_PROVIDER)?;
			let endpoints = match settings.endpoint_base.as_ref() {
				Some(base) => SuEndpoints::at(base)?,
				None => SuEndpoints::production()?,
			};
			let provider = SuProvider::new(
				id.clone(),
				endpoints,
				settings.credentials.clone(),
				config.redirect_uri(&id)?,
				http.clone(),
			)?;

			registry = registry.with_provider(Arc::new(provider));
		}

		tracing::info!(providers = ?registry.names(), "Identity providers registered.");

		Ok(registry)
	}

	/// Looks up a provider by route name.
	pub fn get(&self, name: &str) -> Result<Arc<dyn Provider>> {
		self.providers
			.get(name)
			.cloned()
			.ok_or_else(|| Error::UnknownProvider { provider: name.to_owned() })
	}

	/// Registered route names, sorted.
	pub fn names(&self) -> Vec<&str> {
		let mut names: Vec<_> = self.providers.keys().map(|id| id.as_ref()).collect();

		names.sort_unstable();

		names
	}

	/// Number of registered providers.
	pub fn len(&self) -> usize {
		self.providers.len()
	}

	/// Returns true when no provider is registered.
	pub fn is_empty(&self) -> bool {
		self.providers.is_empty()
	}
}
impl Debug for ProviderRegistry {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ProviderRegistry").field("providers", &self.names()).finish()
	}
}
