//! Deployment configuration consumed by the orchestrator.
//!
//! A [`SetupDescriptor`] captures everything an integrator decides up front: forced
//! or provider-supplied login URLs, the deep-link scheme, scheme defaults for typed
//! addresses, and poll timing. One descriptor with an [`EntryCapabilities`] set
//! replaces per-deployment subclassing of the login controller.

// std
use std::time::Duration;
// self
use crate::{_prelude::*, address::DefaultScheme};

/// Default fixed delay between poll ticks.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// Errors raised while constructing or validating setup descriptors.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ThisError)]
pub enum SetupError {
	/// Pre-configured URLs must be HTTP(S).
	#[error("The {field} URL must use http or https: {url}.")]
	UnsupportedUrlScheme {
		/// Which descriptor field failed validation.
		field: &'static str,
		/// URL that failed validation.
		url: String,
	},
	/// `use_provider_as_login` requires a provider URL.
	#[error("The `use_provider_as_login` flag requires a provider URL.")]
	MissingProviderUrl,
	/// Deep-link scheme must be a bare scheme name.
	#[error("Login scheme `{scheme}` must be a bare scheme without separators.")]
	InvalidLoginScheme {
		/// Offending scheme value.
		scheme: String,
	},
	/// Poll interval must be positive.
	#[error("Poll interval must be greater than zero.")]
	ZeroPollInterval,
}

/// Entry-point capabilities offered by the hosting surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntryCapabilities {
	/// Whether the surface can scan QR login codes.
	pub supports_qr_scan: bool,
	/// Whether the surface can hand users off to an external browser login.
	pub supports_web_login: bool,
}
impl Default for EntryCapabilities {
	fn default() -> Self {
		Self { supports_qr_scan: false, supports_web_login: true }
	}
}

/// Immutable deployment descriptor consumed by the orchestrator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetupDescriptor {
	/// Administrator-fixed server URL; forces the poll-based flow against it.
	pub forced_url: Option<Url>,
	/// Provider URL used when `use_provider_as_login` is set.
	pub provider_url: Option<Url>,
	/// Whether the provider URL doubles as the web-login entry point.
	pub use_provider_as_login: bool,
	/// Deep-link scheme (the `myapp` in `myapp://login/...`).
	pub login_scheme: String,
	/// Scheme assumed for typed addresses without one.
	pub default_scheme: DefaultScheme,
	/// Fixed delay between poll ticks.
	pub poll_interval: Duration,
	/// Optional cap on total polling duration; `None` polls until cancelled.
	pub poll_deadline: Option<Duration>,
	/// Entry-point capability set.
	pub capabilities: EntryCapabilities,
}
impl SetupDescriptor {
	/// Creates a new builder.
	pub fn builder() -> SetupDescriptorBuilder {
		SetupDescriptorBuilder::new()
	}

	/// Returns the full deep-link prefix, e.g. `myapp://login/`.
	pub fn login_link_prefix(&self) -> String {
		format!("{}://login/", self.login_scheme)
	}

	/// Returns `true` when the raw input is a deep link for this deployment.
	pub fn is_login_link(&self, raw: &str) -> bool {
		raw.starts_with(&self.login_link_prefix())
	}
}

/// Builder for [`SetupDescriptor`] values.
#[derive(Clone, Debug)]
pub struct SetupDescriptorBuilder {
	forced_url: Option<Url>,
	provider_url: Option<Url>,
	use_provider_as_login: bool,
	login_scheme: String,
	default_scheme: DefaultScheme,
	poll_interval: Duration,
	poll_deadline: Option<Duration>,
	capabilities: EntryCapabilities,
}
impl SetupDescriptorBuilder {
	fn new() -> Self {
		Self {
			forced_url: None,
			provider_url: None,
			use_provider_as_login: false,
			login_scheme: "cloud".into(),
			default_scheme: DefaultScheme::default(),
			poll_interval: DEFAULT_POLL_INTERVAL,
			poll_deadline: None,
			capabilities: EntryCapabilities::default(),
		}
	}

	/// Fixes the server URL for managed deployments.
	pub fn forced_url(mut self, url: Url) -> Self {
		self.forced_url = Some(url);

		self
	}

	/// Sets the provider URL.
	pub fn provider_url(mut self, url: Url) -> Self {
		self.provider_url = Some(url);

		self
	}

	/// Routes logins through the provider URL.
	pub fn use_provider_as_login(mut self) -> Self {
		self.use_provider_as_login = true;

		self
	}

	/// Overrides the deep-link scheme.
	pub fn login_scheme(mut self, scheme: impl Into<String>) -> Self {
		self.login_scheme = scheme.into();

		self
	}

	/// Overrides the scheme assumed for schemeless addresses.
	pub fn default_scheme(mut self, scheme: DefaultScheme) -> Self {
		self.default_scheme = scheme;

		self
	}

	/// Overrides the fixed delay between poll ticks.
	pub fn poll_interval(mut self, interval: Duration) -> Self {
		self.poll_interval = interval;

		self
	}

	/// Caps the total polling duration.
	pub fn poll_deadline(mut self, deadline: Duration) -> Self {
		self.poll_deadline = Some(deadline);

		self
	}

	/// Overrides the entry-point capability set.
	pub fn capabilities(mut self, capabilities: EntryCapabilities) -> Self {
		self.capabilities = capabilities;

		self
	}

	/// Consumes the builder and validates the resulting descriptor.
	pub fn build(self) -> Result<SetupDescriptor, SetupError> {
		if self.poll_interval.is_zero() {
			return Err(SetupError::ZeroPollInterval);
		}
		if self.use_provider_as_login && self.provider_url.is_none() {
			return Err(SetupError::MissingProviderUrl);
		}
		if self.login_scheme.is_empty()
			|| !self.login_scheme.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
		{
			return Err(SetupError::InvalidLoginScheme { scheme: self.login_scheme });
		}

		validate_http_url("forced", self.forced_url.as_ref())?;
		validate_http_url("provider", self.provider_url.as_ref())?;

		Ok(SetupDescriptor {
			forced_url: self.forced_url,
			provider_url: self.provider_url,
			use_provider_as_login: self.use_provider_as_login,
			login_scheme: self.login_scheme,
			default_scheme: self.default_scheme,
			poll_interval: self.poll_interval,
			poll_deadline: self.poll_deadline,
			capabilities: self.capabilities,
		})
	}
}
impl Default for SetupDescriptorBuilder {
	fn default() -> Self {
		Self::new()
	}
}

fn validate_http_url(field: &'static str, url: Option<&Url>) -> Result<(), SetupError> {
	match url {
		Some(url) if !matches!(url.scheme(), "http" | "https") =>
			Err(SetupError::UnsupportedUrlScheme { field, url: url.to_string() }),
		_ => Ok(()),
	}
}
