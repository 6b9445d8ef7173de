//! Storage contracts and built-in account-store implementations.
//!
//! The [`AccountStore`] trait is the platform seam: hosting applications back it with
//! their account manager, while tests and lightweight deployments use the bundled
//! memory/file stores. The two collaborator traits, [`ClientPool`] and
//! [`RootsChangedNotifier`], cover the side effects the materializer must trigger:
//! evicting cached authenticated clients after a secret rotation and telling
//! document providers that account roots changed.

pub mod file;
pub mod memory;

pub use file::FileAccountStore;
pub use memory::MemoryAccountStore;

// self
use crate::{_prelude::*, account::AccountRecord, auth::AccountIdentity};

/// Boxed future returned by every [`AccountStore`] operation.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Storage backend contract for persisted accounts.
pub trait AccountStore
where
	Self: Send + Sync,
{
	/// Inserts a record only if its identity is new; never overwrites.
	fn insert_new(&self, record: AccountRecord) -> StoreFuture<'_, InsertOutcome>;

	/// Persists or replaces a record; the update path for secret rotations.
	fn save(&self, record: AccountRecord) -> StoreFuture<'_, ()>;

	/// Fetches the record for an identity, if present.
	fn fetch<'a>(&'a self, identity: &'a AccountIdentity)
	-> StoreFuture<'a, Option<AccountRecord>>;

	/// Lists every stored record.
	fn list(&self) -> StoreFuture<'_, Vec<AccountRecord>>;

	/// Returns the identity designated as default, if any.
	fn default_identity(&self) -> StoreFuture<'_, Option<AccountIdentity>>;

	/// Designates an existing identity as the default account.
	fn set_default<'a>(&'a self, identity: &'a AccountIdentity) -> StoreFuture<'a, ()>;
}

/// Result of a uniqueness-checked insert.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum InsertOutcome {
	/// The identity was new and the record was stored.
	Created,
	/// A record with this identity already exists; nothing was written.
	AlreadyExists,
}

/// Error type produced by [`AccountStore`] and trust-store implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

/// Cache of authenticated clients keyed by account identity.
///
/// Secret rotations must evict the cached client so the next request is built with
/// fresh credentials.
pub trait ClientPool
where
	Self: Send + Sync,
{
	/// Drops any cached client for the identity.
	fn evict(&self, identity: &AccountIdentity);
}

/// No-op pool for deployments without client caching.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopClientPool;
impl ClientPool for NoopClientPool {
	fn evict(&self, _: &AccountIdentity) {}
}

/// Document-provider collaborator notified when account roots change.
pub trait RootsChangedNotifier
where
	Self: Send + Sync,
{
	/// Signals that the set of account roots changed.
	fn roots_changed(&self);
}

/// No-op notifier for deployments without a document provider.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopRootsNotifier;
impl RootsChangedNotifier for NoopRootsNotifier {
	fn roots_changed(&self) {}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::error::Error;

	#[test]
	fn store_error_converts_into_broker_error_with_source() {
		let store_error = StoreError::Backend { message: "account db unreachable".into() };
		let broker_error: Error = store_error.clone().into();

		assert!(matches!(broker_error, Error::Storage(_)));
		assert!(broker_error.to_string().contains("account db unreachable"));

		let source = StdError::source(&broker_error)
			.expect("Broker error should expose the original store error as its source.");

		assert_eq!(source.to_string(), store_error.to_string());
	}

	#[test]
	fn insert_outcome_serializes_for_diagnostics() {
		let payload = serde_json::to_string(&InsertOutcome::AlreadyExists)
			.expect("Insert outcome should serialize to JSON.");

		assert_eq!(payload, "\"AlreadyExists\"");
	}
}
