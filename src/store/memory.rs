//! Thread-safe in-memory [`AccountStore`] for local development and tests.

// self
use crate::{
	_prelude::*,
	account::AccountRecord,
	auth::AccountIdentity,
	store::{AccountStore, InsertOutcome, StoreError, StoreFuture},
};

#[derive(Debug, Default)]
struct Inner {
	accounts: HashMap<AccountIdentity, AccountRecord>,
	default: Option<AccountIdentity>,
}

/// Thread-safe storage backend that keeps accounts in-process.
#[derive(Clone, Debug, Default)]
pub struct MemoryAccountStore(Arc<RwLock<Inner>>);
impl MemoryAccountStore {
	fn insert_new_now(state: &Arc<RwLock<Inner>>, record: AccountRecord) -> InsertOutcome {
		let mut guard = state.write();

		if guard.accounts.contains_key(&record.identity) {
			InsertOutcome::AlreadyExists
		} else {
			guard.accounts.insert(record.identity.clone(), record);

			InsertOutcome::Created
		}
	}

	fn set_default_now(
		state: &Arc<RwLock<Inner>>,
		identity: &AccountIdentity,
	) -> Result<(), StoreError> {
		let mut guard = state.write();

		if !guard.accounts.contains_key(identity) {
			return Err(StoreError::Backend {
				message: format!("cannot default unknown account `{identity}`"),
			});
		}

		guard.default = Some(identity.clone());

		Ok(())
	}
}
impl AccountStore for MemoryAccountStore {
	fn insert_new(&self, record: AccountRecord) -> StoreFuture<'_, InsertOutcome> {
		let state = self.0.clone();

		Box::pin(async move { Ok(Self::insert_new_now(&state, record)) })
	}

	fn save(&self, record: AccountRecord) -> StoreFuture<'_, ()> {
		let state = self.0.clone();

		Box::pin(async move {
			state.write().accounts.insert(record.identity.clone(), record);

			Ok(())
		})
	}

	fn fetch<'a>(
		&'a self,
		identity: &'a AccountIdentity,
	) -> StoreFuture<'a, Option<AccountRecord>> {
		let state = self.0.clone();
		let identity = identity.to_owned();

		Box::pin(async move { Ok(state.read().accounts.get(&identity).cloned()) })
	}

	fn list(&self) -> StoreFuture<'_, Vec<AccountRecord>> {
		let state = self.0.clone();

		Box::pin(async move {
			let mut records = state.read().accounts.values().cloned().collect::<Vec<_>>();

			records.sort_by(|a, b| a.identity.cmp(&b.identity));

			Ok(records)
		})
	}

	fn default_identity(&self) -> StoreFuture<'_, Option<AccountIdentity>> {
		let state = self.0.clone();

		Box::pin(async move { Ok(state.read().default.clone()) })
	}

	fn set_default<'a>(&'a self, identity: &'a AccountIdentity) -> StoreFuture<'a, ()> {
		let state = self.0.clone();
		let identity = identity.to_owned();

		Box::pin(async move { Self::set_default_now(&state, &identity) })
	}
}
