//! Persisted account records and their validating builder.

// self
use crate::{
	_prelude::*,
	auth::{AccountIdentity, PasswordSecret},
	server::ServerVersion,
};

/// Schema version written into new records; bumped when the persisted shape changes.
///
/// Version 2 is the first schema that stores the canonical user id next to the login
/// name instead of conflating the two.
pub const ACCOUNT_SCHEMA_VERSION: u32 = 2;

/// Errors produced by [`AccountRecordBuilder`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum AccountRecordBuilderError {
	/// Issued when no base URL was provided.
	#[error("Account record requires a base URL.")]
	MissingBaseUrl,
	/// Issued when no server version was provided.
	#[error("Account record requires a server version.")]
	MissingVersion,
	/// Issued when no canonical user id was provided.
	#[error("Account record requires the canonical user id.")]
	MissingUserId,
	/// Issued when no secret was provided.
	#[error("Account record requires a secret.")]
	MissingSecret,
}

/// Persisted account record consumed by file-provider collaborators.
///
/// Created exactly once per identity; afterwards only updated (secret rotation),
/// never silently duplicated.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRecord {
	/// Unique identity, `loginName@host[:port]`.
	pub identity: AccountIdentity,
	/// Canonical server base URL.
	pub base_url: Url,
	/// Server version at creation or last verification.
	pub version: ServerVersion,
	/// Canonical user id reported by the server.
	pub user_id: String,
	/// Display name reported by the server.
	pub display_name: String,
	/// Stored password or app password.
	pub secret: PasswordSecret,
	/// Persisted-schema version.
	pub schema_version: u32,
	/// Creation instant.
	pub created_at: OffsetDateTime,
}
impl AccountRecord {
	/// Returns a builder for the given identity.
	pub fn builder(identity: AccountIdentity) -> AccountRecordBuilder {
		AccountRecordBuilder::new(identity)
	}

	/// Replaces the stored secret; callers must also evict cached clients.
	pub fn rotate_secret(&mut self, secret: PasswordSecret) {
		self.secret = secret;
	}
}
impl Debug for AccountRecord {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AccountRecord")
			.field("identity", &self.identity)
			.field("base_url", &self.base_url.as_str())
			.field("version", &self.version)
			.field("user_id", &self.user_id)
			.field("display_name", &self.display_name)
			.field("secret", &"<redacted>")
			.field("schema_version", &self.schema_version)
			.field("created_at", &self.created_at)
			.finish()
	}
}

/// Builder for [`AccountRecord`] values.
#[derive(Clone, Debug)]
pub struct AccountRecordBuilder {
	identity: AccountIdentity,
	base_url: Option<Url>,
	version: Option<ServerVersion>,
	user_id: Option<String>,
	display_name: Option<String>,
	secret: Option<PasswordSecret>,
	created_at: Option<OffsetDateTime>,
}
impl AccountRecordBuilder {
	fn new(identity: AccountIdentity) -> Self {
		Self {
			identity,
			base_url: None,
			version: None,
			user_id: None,
			display_name: None,
			secret: None,
			created_at: None,
		}
	}

	/// Sets the canonical base URL.
	pub fn base_url(mut self, url: Url) -> Self {
		self.base_url = Some(url);

		self
	}

	/// Sets the server version.
	pub fn version(mut self, version: ServerVersion) -> Self {
		self.version = Some(version);

		self
	}

	/// Sets the canonical user id.
	pub fn user_id(mut self, user_id: impl Into<String>) -> Self {
		self.user_id = Some(user_id.into());

		self
	}

	/// Sets the display name; defaults to the login name when absent.
	pub fn display_name(mut self, display_name: impl Into<String>) -> Self {
		self.display_name = Some(display_name.into());

		self
	}

	/// Sets the stored secret.
	pub fn secret(mut self, secret: PasswordSecret) -> Self {
		self.secret = Some(secret);

		self
	}

	/// Overrides the creation instant (defaults to now).
	pub fn created_at(mut self, instant: OffsetDateTime) -> Self {
		self.created_at = Some(instant);

		self
	}

	/// Consumes the builder and produces an [`AccountRecord`].
	pub fn build(self) -> Result<AccountRecord, AccountRecordBuilderError> {
		let base_url = self.base_url.ok_or(AccountRecordBuilderError::MissingBaseUrl)?;
		let version = self.version.ok_or(AccountRecordBuilderError::MissingVersion)?;
		let user_id = self.user_id.ok_or(AccountRecordBuilderError::MissingUserId)?;
		let secret = self.secret.ok_or(AccountRecordBuilderError::MissingSecret)?;
		let display_name =
			self.display_name.unwrap_or_else(|| self.identity.login_name().to_owned());

		Ok(AccountRecord {
			identity: self.identity,
			base_url,
			version,
			user_id,
			display_name,
			secret,
			schema_version: ACCOUNT_SCHEMA_VERSION,
			created_at: self.created_at.unwrap_or_else(OffsetDateTime::now_utc),
		})
	}
}
