//! Pure server-address normalization and login-link parsing.
//!
//! Nothing in this module touches the network: every helper is a deterministic string
//! transform, so the whole pipeline is unit-testable and idempotent. The composed
//! [`normalize`] is what the capability prober feeds with user input.

// crates.io
use percent_encoding::percent_decode_str;
// self
use crate::{_prelude::*, auth::PasswordSecret};

/// Path suffix that marks the start of in-app routes appended by copied browser URLs.
const INDEX_PHP_SUFFIX: &str = "/index.php";
/// WebDAV entry points that must never be part of a stored base URL.
const WEBDAV_SUFFIXES: &[&str] = &["/remote.php/webdav", "/remote.php/dav"];
/// Separator between keys and values inside a login link.
const LOGIN_URL_KEY_VALUE_SEPARATOR: char = ':';

/// Errors produced while normalizing addresses or parsing login links.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum AddressError {
	/// The address is not parseable as a URL even after scheme inference.
	#[error("Invalid server address `{url}`.")]
	InvalidUrl {
		/// Offending input.
		url: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// The raw login link is shorter than the expected scheme prefix.
	#[error("Login link is shorter than its scheme prefix.")]
	LoginLinkTooShort,
	/// The login link carries an unsupported number of `&`-separated segments.
	#[error("Login link carries {count} segments, expected 1 to 3.")]
	LoginLinkSegmentCount {
		/// Number of segments found.
		count: usize,
	},
}

/// Login data decoded from a deep link / QR code, or assembled by the poll flow.
///
/// Every field is optional; a link may carry any subset of server, user, and password.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct LoginUrlInfo {
	/// Server address, not yet normalized.
	pub server_address: Option<String>,
	/// Login name as typed or issued.
	pub username: Option<String>,
	/// Password or app password.
	pub password: Option<PasswordSecret>,
}
impl Debug for LoginUrlInfo {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("LoginUrlInfo")
			.field("server_address", &self.server_address)
			.field("username", &self.username)
			.field("password", &self.password.as_ref().map(|_| "<redacted>"))
			.finish()
	}
}

/// Scheme prepended to schemeless addresses.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefaultScheme {
	#[default]
	/// Assume TLS when the user did not type a scheme.
	Https,
	/// Deployments that explicitly opt into plain HTTP defaults.
	Http,
}
impl DefaultScheme {
	/// Returns the `scheme://` prefix string.
	pub const fn prefix(self) -> &'static str {
		match self {
			Self::Https => "https://",
			Self::Http => "http://",
		}
	}
}

/// Infers a scheme when none is present (lowercasing an explicit one) and rejects
/// unparseable addresses.
pub fn normalize_scheme(url: &str, default_scheme: DefaultScheme) -> Result<String, AddressError> {
	let trimmed = url.trim();
	let candidate = match trimmed.split_once("://") {
		Some((scheme, rest)) => format!("{}://{rest}", scheme.to_ascii_lowercase()),
		None => format!("{}{trimmed}", default_scheme.prefix()),
	};

	match Url::parse(&candidate) {
		Ok(_) => Ok(candidate),
		Err(source) => Err(AddressError::InvalidUrl { url: trimmed.to_owned(), source }),
	}
}

/// Removes a trailing `/index.php` or `/index.php/apps/...` route.
pub fn strip_app_path_suffixes(url: &str) -> &str {
	match url.find(INDEX_PHP_SUFFIX) {
		Some(position) => &url[..position],
		None => url,
	}
}

/// Removes a known WebDAV entry-point suffix.
pub fn trim_webdav_suffix(url: &str) -> &str {
	for suffix in WEBDAV_SUFFIXES {
		if let Some(stripped) = url.strip_suffix(suffix) {
			return stripped;
		}
	}

	url
}

/// Removes a trailing slash, then a known WebDAV suffix.
pub fn normalize_url_suffix(url: &str) -> &str {
	trim_webdav_suffix(url.strip_suffix('/').unwrap_or(url))
}

/// Converts an internationalized host to its ASCII (punycode) form.
///
/// On failure the original string is kept and the incident is logged; normalization
/// never aborts over a host the IDNA tables reject.
pub fn convert_idn(url: &str) -> String {
	if url.is_ascii() {
		return url.to_owned();
	}

	let (scheme, rest) = match url.split_once("://") {
		Some((scheme, rest)) => (Some(scheme), rest),
		None => (None, url),
	};
	let (authority, path) = match rest.split_once('/') {
		Some((authority, path)) => (authority, Some(path)),
		None => (rest, None),
	};
	let (host, port) = split_port(authority);
	let ascii_host = match Url::parse(&format!("https://{host}")) {
		Ok(parsed) => match parsed.host_str() {
			Some(ascii) => ascii.to_owned(),
			None => {
				log_idn_failure(url);

				return url.to_owned();
			},
		},
		Err(_) => {
			log_idn_failure(url);

			return url.to_owned();
		},
	};
	let mut converted = String::new();

	if let Some(scheme) = scheme {
		converted.push_str(scheme);
		converted.push_str("://");
	}

	converted.push_str(&ascii_host);

	if let Some(port) = port {
		converted.push(':');
		converted.push_str(port);
	}
	if let Some(path) = path {
		converted.push('/');
		converted.push_str(path);
	}

	converted
}

/// Full normalization pipeline applied to user-entered addresses.
///
/// Strips app routes, infers the scheme, converts the host to ASCII, and trims
/// trailing-slash/WebDAV suffixes. Idempotent: feeding the output back in returns
/// the same string.
pub fn normalize(url: &str, default_scheme: DefaultScheme) -> Result<String, AddressError> {
	let stripped = strip_app_path_suffixes(url.trim());
	let schemed = normalize_scheme(stripped, default_scheme)?;
	let ascii = convert_idn(&schemed);

	Ok(normalize_url_suffix(&ascii).to_owned())
}

/// Parses a `scheme://login/` deep link into its optional login data fields.
///
/// `raw` must begin with `prefix` and continue with 1 to 3 `&`-separated `key:value`
/// segments, keys ∈ {`user`, `password`, `server`}, values percent-encoded. Segment
/// order is irrelevant and duplicate keys resolve last-write-wins. Unknown keys are
/// ignored, matching the permissive QR readers in the wild.
pub fn parse_login_data_url(prefix: &str, raw: &str) -> Result<LoginUrlInfo, AddressError> {
	if raw.len() < prefix.len() {
		return Err(AddressError::LoginLinkTooShort);
	}

	// Also rejects prefixes that would split a multi-byte character.
	let data = raw.get(prefix.len()..).ok_or(AddressError::LoginLinkTooShort)?;
	let segments = data.split('&').collect::<Vec<_>>();

	if segments.is_empty() || segments.len() > 3 {
		return Err(AddressError::LoginLinkSegmentCount { count: segments.len() });
	}

	let mut info = LoginUrlInfo::default();

	for segment in segments {
		let Some((key, value)) = segment.split_once(LOGIN_URL_KEY_VALUE_SEPARATOR) else {
			continue;
		};
		let decoded = percent_decode_str(value).decode_utf8_lossy().into_owned();

		match key {
			"user" => info.username = Some(decoded),
			"password" => info.password = Some(PasswordSecret::new(decoded)),
			"server" => info.server_address = Some(decoded),
			_ => {},
		}
	}

	Ok(info)
}

fn split_port(authority: &str) -> (&str, Option<&str>) {
	match authority.rsplit_once(':') {
		Some((host, port)) if !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()) =>
			(host, Some(port)),
		_ => (authority, None),
	}
}

fn log_idn_failure(url: &str) {
	#[cfg(feature = "tracing")]
	tracing::debug!(url, "Keeping original address, IDN conversion failed");
	#[cfg(not(feature = "tracing"))]
	let _ = url;
}
