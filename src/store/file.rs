//! Simple file-backed [`AccountStore`] for lightweight deployments.

// std
use std::{
	fs::{self, File},
	io::Write,
	path::{Path, PathBuf},
};
// self
use crate::{
	_prelude::*,
	account::AccountRecord,
	auth::AccountIdentity,
	store::{AccountStore, InsertOutcome, StoreError, StoreFuture},
};

#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
	accounts: Vec<AccountRecord>,
	default: Option<AccountIdentity>,
}

#[derive(Debug, Default)]
struct Inner {
	accounts: HashMap<AccountIdentity, AccountRecord>,
	default: Option<AccountIdentity>,
}

/// Persists account records to a JSON file after each mutation.
#[derive(Clone, Debug)]
pub struct FileAccountStore {
	path: PathBuf,
	inner: Arc<RwLock<Inner>>,
}
impl FileAccountStore {
	/// Opens (or creates) a store at the provided path, eagerly loading existing data.
	pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
		let path = path.into();

		Self::ensure_parent_exists(&path)?;

		let inner = if path.exists() { Self::load_snapshot(&path)? } else { Inner::default() };

		Ok(Self { path, inner: Arc::new(RwLock::new(inner)) })
	}

	fn load_snapshot(path: &Path) -> Result<Inner, StoreError> {
		let metadata = path.metadata().map_err(|e| StoreError::Backend {
			message: format!("Failed to inspect {}: {e}", path.display()),
		})?;

		if metadata.len() == 0 {
			return Ok(Inner::default());
		}

		let bytes = fs::read(path).map_err(|e| StoreError::Backend {
			message: format!("Failed to read {}: {e}", path.display()),
		})?;
		let snapshot: Snapshot =
			serde_json::from_slice(&bytes).map_err(|e| StoreError::Serialization {
				message: format!("Failed to parse {}: {e}", path.display()),
			})?;

		Ok(Inner {
			accounts: snapshot
				.accounts
				.into_iter()
				.map(|record| (record.identity.clone(), record))
				.collect(),
			default: snapshot.default,
		})
	}

	fn ensure_parent_exists(path: &Path) -> Result<(), StoreError> {
		if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
			fs::create_dir_all(parent).map_err(|e| StoreError::Backend {
				message: format!("Failed to create store directory {}: {e}", parent.display()),
			})?;
		}
		Ok(())
	}

	fn persist_locked(&self, inner: &Inner) -> Result<(), StoreError> {
		Self::ensure_parent_exists(&self.path)?;

		let mut accounts = inner.accounts.values().cloned().collect::<Vec<_>>();

		accounts.sort_by(|a, b| a.identity.cmp(&b.identity));

		let snapshot = Snapshot { accounts, default: inner.default.clone() };
		let serialized =
			serde_json::to_vec_pretty(&snapshot).map_err(|e| StoreError::Serialization {
				message: format!("Failed to serialize store snapshot: {e}"),
			})?;
		let mut tmp_path = self.path.clone();

		tmp_path.set_extension("tmp");

		{
			let mut file = File::create(&tmp_path).map_err(|e| StoreError::Backend {
				message: format!("Failed to create {}: {e}", tmp_path.display()),
			})?;

			file.write_all(&serialized).map_err(|e| StoreError::Backend {
				message: format!("Failed to write {}: {e}", tmp_path.display()),
			})?;
			file.sync_all().map_err(|e| StoreError::Backend {
				message: format!("Failed to sync {}: {e}", tmp_path.display()),
			})?;
		}

		fs::rename(&tmp_path, &self.path).map_err(|e| StoreError::Backend {
			message: format!("Failed to replace {}: {e}", self.path.display()),
		})
	}
}
impl AccountStore for FileAccountStore {
	fn insert_new(&self, record: AccountRecord) -> StoreFuture<'_, InsertOutcome> {
		Box::pin(async move {
			let mut guard = self.inner.write();

			if guard.accounts.contains_key(&record.identity) {
				return Ok(InsertOutcome::AlreadyExists);
			}

			guard.accounts.insert(record.identity.clone(), record);
			self.persist_locked(&guard)?;

			Ok(InsertOutcome::Created)
		})
	}

	fn save(&self, record: AccountRecord) -> StoreFuture<'_, ()> {
		Box::pin(async move {
			let mut guard = self.inner.write();

			guard.accounts.insert(record.identity.clone(), record);
			self.persist_locked(&guard)?;

			Ok(())
		})
	}

	fn fetch<'a>(
		&'a self,
		identity: &'a AccountIdentity,
	) -> StoreFuture<'a, Option<AccountRecord>> {
		Box::pin(async move { Ok(self.inner.read().accounts.get(identity).cloned()) })
	}

	fn list(&self) -> StoreFuture<'_, Vec<AccountRecord>> {
		Box::pin(async move {
			let mut records = self.inner.read().accounts.values().cloned().collect::<Vec<_>>();

			records.sort_by(|a, b| a.identity.cmp(&b.identity));

			Ok(records)
		})
	}

	fn default_identity(&self) -> StoreFuture<'_, Option<AccountIdentity>> {
		Box::pin(async move { Ok(self.inner.read().default.clone()) })
	}

	fn set_default<'a>(&'a self, identity: &'a AccountIdentity) -> StoreFuture<'a, ()> {
		Box::pin(async move {
			let mut guard = self.inner.write();

			if !guard.accounts.contains_key(identity) {
				return Err(StoreError::Backend {
					message: format!("cannot default unknown account `{identity}`"),
				});
			}

			guard.default = Some(identity.clone());
			self.persist_locked(&guard)?;

			Ok(())
		})
	}
}
