//! High-level login orchestration: strategy selection, session state, trust retries.
//!
//! The [`Orchestrator`] owns every collaborator the login state machine touches and
//! is the single writer for cross-step session state. Individual flows live in the
//! submodules: capability probing, the poll-based browser login, credential
//! verification, and account materialization.

pub mod poll;
pub mod verify;

pub(crate) mod common;

mod materialize;
mod probe;

pub use poll::*;
pub use verify::*;

// self
use crate::{
	_prelude::*,
	address::{self, LoginUrlInfo},
	auth::Credentials,
	http::LoginHttpClient,
	obs::PollMetrics,
	server::ServerInfo,
	setup::SetupDescriptor,
	status::ResultCode,
	store::{
		AccountStore, ClientPool, NoopClientPool, NoopRootsNotifier, RootsChangedNotifier,
	},
	trust::{CertificateChain, TrustDecision, TrustNegotiator, TrustOutcome, TrustStore},
};
#[cfg(all(feature = "reqwest", feature = "tokio"))] use crate::http::ReqwestHttpClient;

#[cfg(all(feature = "reqwest", feature = "tokio"))]
/// Orchestrator specialized for the crate's default reqwest + tokio stack.
pub type ReqwestOrchestrator = Orchestrator<ReqwestHttpClient>;

/// What the user handed to the login surface.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LoginInput {
	/// A typed (or pre-filled) server address.
	Address(String),
	/// A raw deep link or QR payload.
	LoginLink(String),
}

/// The single login strategy selected at entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LoginStrategy {
	/// Poll-based browser login against a fixed URL (managed or provider setups).
	PollLogin {
		/// URL the poll flow starts against.
		url: Url,
	},
	/// Classic host + credentials path feeding the verifier directly.
	ClassicCredentials,
	/// Deep-link/QR data fed straight to the verifier, bypassing open-ended probing
	/// of the entered text.
	DirectCredentials(LoginUrlInfo),
}

/// Cross-step state owned by the orchestrator; mutated only under its lock.
#[derive(Debug, Default)]
pub(crate) struct SessionState {
	/// Normalized address of the last submitted probe, retained for trust retries.
	pub(crate) candidate_address: Option<String>,
	/// Whether the user explicitly typed an `http://` address.
	pub(crate) explicit_insecure: bool,
	/// Latest accepted probe result.
	pub(crate) server_info: Option<ServerInfo>,
	/// Latest server status shown to the user.
	pub(crate) server_status: Option<ResultCode>,
	/// Latest authentication status shown to the user.
	pub(crate) auth_status: Option<ResultCode>,
	/// Whether a credential check is in flight.
	pub(crate) verifying: bool,
	/// Whether a poll session is in flight.
	pub(crate) polling: bool,
}

/// Serializable snapshot of the session state, for configuration-change-style
/// restarts of the hosting UI.
///
/// The poll token itself is deliberately absent: it never leaves process memory, so
/// a fully terminated process forces a fresh login. The in-flight flags exist so a
/// restored UI avoids *duplicating* work, not so it can resume it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
	/// Normalized address of the last submitted probe.
	pub candidate_address: Option<String>,
	/// Whether the user explicitly typed an `http://` address.
	pub explicit_insecure: bool,
	/// Latest accepted probe result.
	pub server_info: Option<ServerInfo>,
	/// Latest server status.
	pub server_status: Option<ResultCode>,
	/// Latest authentication status.
	pub auth_status: Option<ResultCode>,
	/// Correlation id of the operation that was pending, if any.
	pub pending_op: Option<u64>,
	/// Whether a credential check was in flight.
	pub credential_check_in_flight: bool,
	/// Whether a poll session was in flight.
	pub poll_in_flight: bool,
}

/// Coordinates the login state machine against one setup descriptor.
///
/// The orchestrator owns the HTTP client, account/trust stores, collaborator hooks,
/// and per-session state so the flow implementations can focus on their own wire
/// protocol. All shared fields are single-writer: worker futures return results and
/// the orchestrator applies them under its lock after a liveness check.
#[derive(Clone)]
pub struct Orchestrator<C>
where
	C: ?Sized + LoginHttpClient,
{
	/// HTTP client used for every outbound request.
	pub http_client: Arc<C>,
	/// Account store implementation that persists materialized identities.
	pub accounts: Arc<dyn AccountStore>,
	/// Trust negotiator handling recoverable certificate failures.
	pub trust: TrustNegotiator,
	/// Cache of authenticated clients, evicted on secret rotation.
	pub clients: Arc<dyn ClientPool>,
	/// Document-provider collaborator notified when account roots change.
	pub notifier: Arc<dyn RootsChangedNotifier>,
	/// Deployment descriptor that steers strategy selection and poll timing.
	pub descriptor: SetupDescriptor,
	/// Shared poll-progress counters.
	pub poll_metrics: Arc<PollMetrics>,
	pub(crate) sleeper: Arc<dyn Sleeper>,
	pub(crate) ops: Arc<common::OpTracker>,
	pub(crate) state: Arc<Mutex<SessionState>>,
	pub(crate) active_poll: Arc<Mutex<Option<Arc<PollFlow<C>>>>>,
}
impl<C> Orchestrator<C>
where
	C: ?Sized + LoginHttpClient,
{
	/// Creates an orchestrator that reuses the caller-provided transport + sleeper.
	pub fn with_http_client(
		accounts: Arc<dyn AccountStore>,
		trust_store: Arc<dyn TrustStore>,
		descriptor: SetupDescriptor,
		http_client: impl Into<Arc<C>>,
		sleeper: Arc<dyn Sleeper>,
	) -> Self {
		Self {
			http_client: http_client.into(),
			accounts,
			trust: TrustNegotiator::new(trust_store),
			clients: Arc::new(NoopClientPool),
			notifier: Arc::new(NoopRootsNotifier),
			descriptor,
			poll_metrics: Default::default(),
			sleeper,
			ops: Default::default(),
			state: Default::default(),
			active_poll: Default::default(),
		}
	}

	/// Sets the cached-client pool evicted on secret rotations.
	pub fn with_client_pool(mut self, clients: Arc<dyn ClientPool>) -> Self {
		self.clients = clients;

		self
	}

	/// Sets the roots-changed notifier fired after account creation.
	pub fn with_roots_notifier(mut self, notifier: Arc<dyn RootsChangedNotifier>) -> Self {
		self.notifier = notifier;

		self
	}

	/// Selects exactly one login strategy for the given entry input.
	pub fn select_strategy(&self, input: &LoginInput) -> Result<LoginStrategy> {
		if let Some(url) = &self.descriptor.forced_url {
			return Ok(LoginStrategy::PollLogin { url: url.clone() });
		}
		if self.descriptor.use_provider_as_login
			&& let Some(url) = &self.descriptor.provider_url
		{
			return Ok(LoginStrategy::PollLogin { url: url.clone() });
		}

		match input {
			LoginInput::LoginLink(raw) => {
				let info = address::parse_login_data_url(&self.descriptor.login_link_prefix(), raw)?;

				Ok(LoginStrategy::DirectCredentials(info))
			},
			LoginInput::Address(_) => Ok(LoginStrategy::ClassicCredentials),
		}
	}

	/// Builds the credential pair for a parsed login link, if it is complete.
	pub fn credentials_from_login_data(&self, info: &LoginUrlInfo) -> Option<Credentials> {
		match (&info.username, &info.password) {
			(Some(username), Some(password)) if !username.is_empty() && !password.is_empty() =>
				Some(Credentials { login_name: username.clone(), secret: password.clone() }),
			_ => None,
		}
	}

	/// Latest accepted probe result.
	pub fn server_info(&self) -> Option<ServerInfo> {
		self.state.lock().server_info.clone()
	}

	/// Latest server status badge code.
	pub fn server_status(&self) -> Option<ResultCode> {
		self.state.lock().server_status
	}

	/// Latest authentication status badge code.
	pub fn auth_status(&self) -> Option<ResultCode> {
		self.state.lock().auth_status
	}

	/// Normalized address retained from the last probe, if any.
	pub fn candidate_address(&self) -> Option<String> {
		self.state.lock().candidate_address.clone()
	}

	/// Applies a trust decision for a presented certificate chain.
	///
	/// Accepting persists the chain and returns [`TrustOutcome::RetryProbe`]; call
	/// [`retry_probe`](Self::retry_probe) next — the retained address makes re-entry
	/// unnecessary. Rejecting flips the session into an unverified-connection status
	/// and creates no account.
	pub fn resolve_trust(
		&self,
		chain: &CertificateChain,
		decision: TrustDecision,
	) -> Result<TrustOutcome> {
		let outcome = self.trust.resolve(chain, decision)?;

		if outcome == TrustOutcome::Unverified {
			self.state.lock().server_status = Some(ResultCode::SslRecoverablePeerUnverified);
		}

		Ok(outcome)
	}

	/// Captures the restorable session state.
	pub fn snapshot(&self) -> SessionSnapshot {
		let state = self.state.lock();

		SessionSnapshot {
			candidate_address: state.candidate_address.clone(),
			explicit_insecure: state.explicit_insecure,
			server_info: state.server_info.clone(),
			server_status: state.server_status,
			auth_status: state.auth_status,
			pending_op: self.ops.pending(),
			credential_check_in_flight: state.verifying,
			poll_in_flight: state.polling,
		}
	}

	/// Restores a snapshot taken by [`snapshot`](Self::snapshot).
	pub fn restore(&self, snapshot: SessionSnapshot) {
		let mut state = self.state.lock();

		state.candidate_address = snapshot.candidate_address;
		state.explicit_insecure = snapshot.explicit_insecure;
		state.server_info = snapshot.server_info;
		state.server_status = snapshot.server_status;
		state.auth_status = snapshot.auth_status;
		state.verifying = snapshot.credential_check_in_flight;
		state.polling = snapshot.poll_in_flight || self.active_poll.lock().is_some();
		self.ops.restore(snapshot.pending_op);
	}
}
#[cfg(all(feature = "reqwest", feature = "tokio"))]
impl Orchestrator<ReqwestHttpClient> {
	/// Creates a new orchestrator with the default reqwest transport and tokio timer.
	pub fn new(
		accounts: Arc<dyn AccountStore>,
		trust_store: Arc<dyn TrustStore>,
		descriptor: SetupDescriptor,
	) -> Self {
		Self::with_http_client(
			accounts,
			trust_store,
			descriptor,
			ReqwestHttpClient::default(),
			Arc::new(TokioSleeper),
		)
	}
}
impl<C> Debug for Orchestrator<C>
where
	C: ?Sized + LoginHttpClient,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Orchestrator")
			.field("descriptor", &self.descriptor)
			.field("server_info", &self.state.lock().server_info)
			.finish()
	}
}
