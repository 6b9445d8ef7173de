//! Discovered-server model: probe payloads, authentication methods, branding.

pub mod version;
pub use version::ServerVersion;

// self
use crate::{_prelude::*, status::ResultCode};

/// Authentication method required by a probed server.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthenticationMethod {
	#[default]
	/// Detection has not run or produced no usable answer.
	Unknown,
	/// Server accepts unauthenticated access.
	None,
	/// HTTP Basic with login name + password (or app password).
	BasicHttpAuth,
	/// Bearer tokens issued out of band.
	BearerToken,
}
impl AuthenticationMethod {
	/// Derives the method from a `WWW-Authenticate` challenge header.
	pub fn from_www_authenticate(header: Option<&str>) -> Self {
		match header {
			Some(challenge) => {
				let lowered = challenge.to_ascii_lowercase();

				if lowered.starts_with("basic") {
					Self::BasicHttpAuth
				} else if lowered.starts_with("bearer") {
					Self::BearerToken
				} else {
					Self::Unknown
				}
			},
			None => Self::None,
		}
	}
}

/// Everything the capability probe learns about a server.
///
/// Rebuilt on every probe and serde-enabled so it survives configuration-change-style
/// restarts of the hosting UI. The TLS posture is derived from the base URL scheme on
/// demand, so it can never disagree with the URL it belongs to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerInfo {
	/// Canonical base URL after normalization and permanent redirects.
	pub base_url: Url,
	/// Server version reported by the status endpoint.
	pub version: ServerVersion,
	/// Authentication method the server demands.
	pub auth_method: AuthenticationMethod,
	/// Whether the instance carries an extended-support subscription.
	pub has_extended_support: bool,
	/// Whether a secure address was permanently redirected onto plain HTTP.
	pub redirected_from_secure: bool,
}
impl ServerInfo {
	/// TLS posture; always matches the base URL scheme.
	pub fn is_ssl_conn(&self) -> bool {
		self.base_url.scheme() == "https"
	}

	/// Success code for this probe result.
	///
	/// `explicitly_insecure` reports whether the user typed an `http://` address, which
	/// downgrades the warning-bearing `OkNoSsl` to a plain `Ok`.
	pub fn status(&self, explicitly_insecure: bool) -> ResultCode {
		if self.is_ssl_conn() {
			ResultCode::OkSsl
		} else if self.redirected_from_secure {
			ResultCode::OkRedirectToNonSecure
		} else if explicitly_insecure {
			ResultCode::Ok
		} else {
			ResultCode::OkNoSsl
		}
	}

	/// Whether the hosting UI should show the outdated-server warning.
	pub fn is_outdated(&self) -> bool {
		self.version.is_outdated(self.has_extended_support)
	}
}

/// Raw payload of the status endpoint.
#[derive(Clone, Debug, Deserialize)]
pub struct StatusPayload {
	/// Whether the instance finished its setup wizard.
	#[serde(default)]
	pub installed: bool,
	/// Whether the instance is in maintenance mode.
	#[serde(default)]
	pub maintenance: bool,
	/// Dotted version string.
	pub version: String,
	/// Whether the instance carries an extended-support subscription.
	#[serde(default, rename = "extendedSupport")]
	pub extended_support: bool,
}

/// Branding advertised by the capabilities endpoint, fetched best-effort after a
/// successful login.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ServerBranding {
	/// Primary theming color as sent by the server (e.g. `#0082c9`).
	pub color: Option<String>,
	/// Instance display name.
	pub name: Option<String>,
}
impl ServerBranding {
	/// Extracts theming data from an OCS capabilities payload, tolerating absent keys.
	pub fn from_capabilities_json(body: &[u8]) -> Self {
		#[derive(Deserialize)]
		struct Envelope {
			ocs: Ocs,
		}
		#[derive(Deserialize)]
		struct Ocs {
			data: Data,
		}
		#[derive(Deserialize)]
		struct Data {
			capabilities: Capabilities,
		}
		#[derive(Deserialize)]
		struct Capabilities {
			#[serde(default)]
			theming: Option<Theming>,
		}
		#[derive(Deserialize)]
		struct Theming {
			#[serde(default)]
			color: Option<String>,
			#[serde(default)]
			name: Option<String>,
		}

		match serde_json::from_slice::<Envelope>(body) {
			Ok(envelope) => match envelope.ocs.data.capabilities.theming {
				Some(theming) => Self { color: theming.color, name: theming.name },
				None => Self::default(),
			},
			Err(_) => Self::default(),
		}
	}
}
