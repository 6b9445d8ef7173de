//! Account materialization: persisting a verified identity exactly once.
//!
//! Creation runs the uniqueness check inside the store so a concurrent duplicate can
//! never overwrite an existing record. Updates bypass the check on purpose: they
//! rotate the stored secret and evict the cached authenticated client tied to the
//! identity.

// self
use crate::{
	_prelude::*,
	account::AccountRecord,
	auth::{AccountIdentity, PasswordSecret},
	error::{AuthError, FlowError},
	flows::{Orchestrator, VerifiedLogin},
	http::LoginHttpClient,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	status::ResultCode,
	store::InsertOutcome,
};

impl<C> Orchestrator<C>
where
	C: ?Sized + LoginHttpClient,
{
	/// Materializes a verified login as a new platform account.
	///
	/// The identity is `loginName@host[:port]`. If an account with this identity
	/// already exists, the attempt fails with the account-not-new status and the
	/// existing record stays untouched — the user must explicitly choose the update
	/// path instead. On success the account becomes the default only when no default
	/// existed, and file-provider collaborators are told that roots changed.
	pub async fn create_account(&self, verified: &VerifiedLogin) -> Result<AccountRecord> {
		const KIND: FlowKind = FlowKind::Materialize;

		let span = FlowSpan::new(KIND, "create_account");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span.instrument(self.create_account_inner(verified)).await;

		match &result {
			Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Err(_) => obs::record_flow_outcome(KIND, FlowOutcome::Failure),
		}

		result
	}

	async fn create_account_inner(&self, verified: &VerifiedLogin) -> Result<AccountRecord> {
		let version = self
			.state
			.lock()
			.server_info
			.as_ref()
			.map(|info| info.version)
			.ok_or(FlowError::MissingServerInfo)?;
		let identity =
			AccountIdentity::from_login(&verified.credentials.login_name, &verified.base_url)?;
		let record = AccountRecord::builder(identity.clone())
			.base_url(verified.base_url.clone())
			.version(version)
			.user_id(&verified.user_id)
			.display_name(&verified.display_name)
			.secret(verified.credentials.secret.clone())
			.build()?;

		match self.accounts.insert_new(record.clone()).await? {
			InsertOutcome::AlreadyExists => {
				self.state.lock().auth_status = Some(ResultCode::AccountNotNew);

				Err(AuthError::AccountNotNew { identity }.into())
			},
			InsertOutcome::Created => {
				if self.accounts.default_identity().await?.is_none() {
					self.accounts.set_default(&identity).await?;
				}

				self.notifier.roots_changed();

				Ok(record)
			},
		}
	}

	/// Rotates the secret of an existing account.
	///
	/// Bypasses the uniqueness check, persists the new secret, and evicts any cached
	/// authenticated client for the identity so the next request authenticates
	/// freshly.
	pub async fn update_account(
		&self,
		identity: &AccountIdentity,
		secret: PasswordSecret,
	) -> Result<AccountRecord> {
		const KIND: FlowKind = FlowKind::Materialize;

		let span = FlowSpan::new(KIND, "update_account");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async move {
				let mut record = self
					.accounts
					.fetch(identity)
					.await?
					.ok_or_else(|| AuthError::AccountGone { identity: identity.clone() })?;

				record.rotate_secret(secret);
				self.accounts.save(record.clone()).await?;
				self.clients.evict(identity);

				Ok(record)
			})
			.await;

		match &result {
			Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Err(_) => obs::record_flow_outcome(KIND, FlowOutcome::Failure),
		}

		result
	}
}
