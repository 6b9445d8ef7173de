//! Credential primitives: redacted secrets, credential pairs, account identities.

// self
use crate::_prelude::*;

/// Redacted password wrapper keeping secrets out of logs and Debug output.
///
/// Wraps either the user's real password or a server-issued app password; both must
/// never surface in diagnostics.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordSecret(String);
impl PasswordSecret {
	/// Wraps a new secret string.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Returns the inner value. Callers must avoid logging this string.
	pub fn expose(&self) -> &str {
		&self.0
	}

	/// Returns `true` when the secret is the empty string.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}
}
impl AsRef<str> for PasswordSecret {
	fn as_ref(&self) -> &str {
		self.expose()
	}
}
impl Debug for PasswordSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("PasswordSecret").field(&"<redacted>").finish()
	}
}
impl Display for PasswordSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("<redacted>")
	}
}

/// Concrete credential pair handed to the verifier.
///
/// The login name is whatever identified the user at login time (name, email, name
/// with whitespace); the canonical user id is only known after verification.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
	/// Login name as typed or as issued by the poll flow.
	pub login_name: String,
	/// Password or app password.
	pub secret: PasswordSecret,
}
impl Credentials {
	/// Builds a credential pair.
	pub fn new(login_name: impl Into<String>, secret: impl Into<String>) -> Self {
		Self { login_name: login_name.into(), secret: PasswordSecret::new(secret) }
	}
}
impl Debug for Credentials {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Credentials")
			.field("login_name", &self.login_name)
			.field("secret", &"<redacted>")
			.finish()
	}
}

/// Errors raised while building or parsing account identities.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ThisError)]
pub enum IdentityError {
	/// Login name part is empty.
	#[error("Account identity requires a non-empty login name.")]
	EmptyLoginName,
	/// Host part is empty or the URL carries none.
	#[error("Account identity requires a host.")]
	MissingHost,
	/// String form lacks the `login@host` shape.
	#[error("Account identity `{value}` is not of the form login@host[:port].")]
	Unparseable {
		/// Offending input.
		value: String,
	},
}

/// Unique account identity of the form `loginName@host[:port]`.
///
/// The port is present only when the base URL carries a non-default one. Login names
/// may themselves contain `@` (emails), so parsing splits at the *last* separator.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AccountIdentity {
	login_name: String,
	host: String,
	port: Option<u16>,
}
impl AccountIdentity {
	/// Builds the identity for a login name against a base URL.
	pub fn from_login(login_name: &str, base_url: &Url) -> Result<Self, IdentityError> {
		if login_name.is_empty() {
			return Err(IdentityError::EmptyLoginName);
		}

		let host = base_url.host_str().ok_or(IdentityError::MissingHost)?;

		Ok(Self {
			login_name: login_name.to_owned(),
			host: host.to_owned(),
			port: base_url.port(),
		})
	}

	/// Login-name component.
	pub fn login_name(&self) -> &str {
		&self.login_name
	}

	/// Host component.
	pub fn host(&self) -> &str {
		&self.host
	}

	/// Explicit non-default port, if any.
	pub fn port(&self) -> Option<u16> {
		self.port
	}
}
impl Display for AccountIdentity {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		match self.port {
			Some(port) => write!(f, "{}@{}:{port}", self.login_name, self.host),
			None => write!(f, "{}@{}", self.login_name, self.host),
		}
	}
}
impl Debug for AccountIdentity {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "AccountIdentity({self})")
	}
}
impl FromStr for AccountIdentity {
	type Err = IdentityError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let (login_name, rest) =
			s.rsplit_once('@').ok_or_else(|| IdentityError::Unparseable { value: s.to_owned() })?;

		if login_name.is_empty() {
			return Err(IdentityError::EmptyLoginName);
		}

		let (host, port) = match rest.rsplit_once(':') {
			Some((host, port)) => {
				let port = port
					.parse::<u16>()
					.map_err(|_| IdentityError::Unparseable { value: s.to_owned() })?;

				(host, Some(port))
			},
			None => (rest, None),
		};

		if host.is_empty() {
			return Err(IdentityError::MissingHost);
		}

		Ok(Self { login_name: login_name.to_owned(), host: host.to_owned(), port })
	}
}
impl TryFrom<String> for AccountIdentity {
	type Error = IdentityError;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		value.parse()
	}
}
impl From<AccountIdentity> for String {
	fn from(value: AccountIdentity) -> Self {
		value.to_string()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn secret_formatters_redact() {
		let secret = PasswordSecret::new("app-password");

		assert_eq!(format!("{secret:?}"), "PasswordSecret(\"<redacted>\")");
		assert_eq!(format!("{secret}"), "<redacted>");

		let credentials = Credentials::new("alice", "hunter2");

		assert!(!format!("{credentials:?}").contains("hunter2"));
	}

	#[test]
	fn identity_includes_port_only_when_explicit() {
		let url = Url::parse("https://cloud.example.com").expect("URL fixture should parse.");
		let identity = AccountIdentity::from_login("alice", &url)
			.expect("Identity fixture should build successfully.");

		assert_eq!(identity.to_string(), "alice@cloud.example.com");

		let url = Url::parse("https://cloud.example.com:8443").expect("URL fixture should parse.");
		let identity = AccountIdentity::from_login("alice", &url)
			.expect("Identity fixture should build successfully.");

		assert_eq!(identity.to_string(), "alice@cloud.example.com:8443");
	}

	#[test]
	fn identity_parsing_splits_at_the_last_separator() {
		let identity: AccountIdentity = "alice@corp.example@cloud.example.com:8443"
			.parse()
			.expect("Email-style login names should parse.");

		assert_eq!(identity.login_name(), "alice@corp.example");
		assert_eq!(identity.host(), "cloud.example.com");
		assert_eq!(identity.port(), Some(8443));
	}

	#[test]
	fn identity_rejects_malformed_forms() {
		assert!(matches!(
			"no-separator".parse::<AccountIdentity>(),
			Err(IdentityError::Unparseable { .. })
		));
		assert!(matches!("@host".parse::<AccountIdentity>(), Err(IdentityError::EmptyLoginName)));
		assert!(matches!("alice@".parse::<AccountIdentity>(), Err(IdentityError::MissingHost)));
		assert!(matches!(
			"alice@host:99999".parse::<AccountIdentity>(),
			Err(IdentityError::Unparseable { .. })
		));
	}

	#[test]
	fn identity_serde_round_trips_as_string() {
		let identity: AccountIdentity = serde_json::from_str("\"alice@cloud.example.com:8443\"")
			.expect("Identity should deserialize from its string form.");

		assert_eq!(identity.port(), Some(8443));
		assert_eq!(
			serde_json::to_string(&identity).expect("Identity should serialize."),
			"\"alice@cloud.example.com:8443\""
		);
	}
}
