//! Poll-based out-of-band login flow.
//!
//! The flow runs `Idle → Requested → AwaitingUser → Polling → Completed`, with
//! `Cancelled` reachable from every non-terminal state. The anonymous login request
//! and the resulting [`PollFlow`] are orchestrator concerns
//! ([`Orchestrator::begin_poll_login`]); the flow itself owns the fixed-delay loop:
//! one outstanding poll request at a time, per-tick failures swallowed as "not ready
//! yet", shutdown only on success, cancellation, or session replacement. A poll
//! response that arrives after cancellation is a side-effect-free no-op.

// std
use std::{
	sync::atomic::{AtomicBool, Ordering},
	time::Duration,
};
// self
use crate::{
	_prelude::*,
	address::LoginUrlInfo,
	auth::PasswordSecret,
	error::FlowError,
	flows::{Orchestrator, common},
	http::{HttpRequest, LoginHttpClient},
	obs::{self, FlowKind, FlowOutcome, FlowSpan, PollMetrics},
};

/// Path of the anonymous login request below the base URL.
pub const LOGIN_FLOW_V2_PATH: &str = "index.php/login/v2";
/// Path of the poll endpoint below the base URL.
pub const POLL_PATH: &str = "poll";

/// Boxed future returned by [`Sleeper::sleep`].
pub type SleepFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Timer seam for the fixed-delay poll loop.
///
/// The loop never schedules at a fixed rate: each delay starts after the previous
/// tick finished, so a slow server stretches the period instead of stacking
/// requests.
pub trait Sleeper
where
	Self: 'static + Send + Sync,
{
	/// Resolves after roughly `duration`.
	fn sleep(&self, duration: Duration) -> SleepFuture;
}

/// Tokio-backed [`Sleeper`] used by the default stack.
#[cfg(feature = "tokio")]
#[derive(Clone, Copy, Debug, Default)]
pub struct TokioSleeper;
#[cfg(feature = "tokio")]
impl Sleeper for TokioSleeper {
	fn sleep(&self, duration: Duration) -> SleepFuture {
		Box::pin(tokio::time::sleep(duration))
	}
}

/// States of the poll-based login flow.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PollFlowState {
	/// No session exists yet.
	Idle,
	/// The anonymous login request is in flight.
	Requested,
	/// Browser URL issued; waiting for the user to finish in the browser.
	AwaitingUser,
	/// The fixed-delay poll loop is running.
	Polling,
	/// Credentials were delivered; the session is spent.
	Completed,
	/// The session was cancelled or replaced.
	Cancelled,
}

/// Single-use poll session bound to exactly one base URL.
#[derive(Clone)]
pub struct PollSession {
	token: PasswordSecret,
	base_url: Url,
	poll_endpoint: Url,
	login_url: Url,
}
impl PollSession {
	/// Base URL the session is bound to.
	pub fn base_url(&self) -> &Url {
		&self.base_url
	}

	/// Endpoint polled for completion.
	pub fn poll_endpoint(&self) -> &Url {
		&self.poll_endpoint
	}
}
impl Debug for PollSession {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("PollSession")
			.field("token", &"<redacted>")
			.field("base_url", &self.base_url.as_str())
			.field("poll_endpoint", &self.poll_endpoint.as_str())
			.finish()
	}
}

/// Live poll-login engine for one [`PollSession`].
///
/// Created by [`Orchestrator::begin_poll_login`] in the `AwaitingUser` state. Run it
/// with [`run`](Self::run); drop the future to suspend (the session keeps its token
/// and base URL, so a later `run` resumes polling), call [`cancel`](Self::cancel) to
/// end it for good.
pub struct PollFlow<C>
where
	C: ?Sized + LoginHttpClient,
{
	http: Arc<C>,
	session: PollSession,
	interval: Duration,
	deadline: Option<Duration>,
	sleeper: Arc<dyn Sleeper>,
	metrics: Arc<PollMetrics>,
	state: Mutex<PollFlowState>,
	run_guard: AsyncMutex<()>,
	browser_opened: AtomicBool,
}
impl<C> PollFlow<C>
where
	C: ?Sized + LoginHttpClient,
{
	/// Current flow state.
	pub fn state(&self) -> PollFlowState {
		*self.state.lock()
	}

	/// Session metadata (token stays private).
	pub fn session(&self) -> &PollSession {
		&self.session
	}

	/// Browser URL the user must complete the login in.
	pub fn login_url(&self) -> &Url {
		&self.session.login_url
	}

	/// Returns `true` exactly once; callers gate the external browser launch on it.
	///
	/// Polling is never contingent on the browser actually opening — completion is
	/// detected purely server-side.
	pub fn should_open_browser(&self) -> bool {
		self.browser_opened
			.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
			.is_ok()
	}

	/// Returns `true` while a `run` future holds the loop.
	pub fn is_polling(&self) -> bool {
		self.run_guard.try_lock().is_none()
	}

	/// Returns `true` once credentials were delivered.
	pub fn is_completed(&self) -> bool {
		self.state() == PollFlowState::Completed
	}

	/// Cancels the session from any non-terminal state.
	///
	/// Safe to call repeatedly; a completed session stays completed.
	pub fn cancel(&self) {
		let mut state = self.state.lock();

		if *state != PollFlowState::Completed {
			*state = PollFlowState::Cancelled;
		}
	}

	/// Drives the fixed-delay poll loop until completion, cancellation, or deadline.
	///
	/// The first tick fires immediately; afterwards the loop sleeps for the
	/// configured interval between ticks, so at most one poll request is outstanding
	/// at any time. Every per-tick failure (transport error, non-200, empty body,
	/// malformed JSON, empty field) means "not ready yet" and the loop continues.
	pub async fn run(&self) -> Result<LoginUrlInfo> {
		let Some(_running) = self.run_guard.try_lock() else {
			return Err(FlowError::AlreadyPolling.into());
		};

		match self.state() {
			PollFlowState::Cancelled | PollFlowState::Completed =>
				return Err(FlowError::Cancelled.into()),
			_ => *self.state.lock() = PollFlowState::Polling,
		}

		let mut elapsed = Duration::ZERO;

		loop {
			let completion = self.tick().await;

			// A tick that raced a cancellation must not mutate anything.
			if self.state() == PollFlowState::Cancelled {
				return Err(FlowError::Cancelled.into());
			}
			if let Some(info) = completion {
				*self.state.lock() = PollFlowState::Completed;
				self.metrics.record_completed();

				return Ok(info);
			}

			self.metrics.record_not_ready();

			if let Some(deadline) = self.deadline
				&& elapsed >= deadline
			{
				*self.state.lock() = PollFlowState::Cancelled;

				return Err(FlowError::PollExpired.into());
			}

			self.sleeper.sleep(self.interval).await;

			elapsed += self.interval;

			if self.state() == PollFlowState::Cancelled {
				return Err(FlowError::Cancelled.into());
			}
		}
	}

	async fn tick(&self) -> Option<LoginUrlInfo> {
		self.metrics.record_tick();

		let request = HttpRequest::post_form(
			self.session.poll_endpoint.clone(),
			vec![("token".into(), self.session.token.expose().into())],
		);
		let response = self.http.execute(request).await.ok()?;

		if response.status != 200 || response.body.is_empty() {
			return None;
		}

		let payload: PollCompletionPayload =
			common::parse_json(POLL_PATH, &response.body).ok()?;

		if payload.server.is_empty()
			|| payload.login_name.is_empty()
			|| payload.app_password.is_empty()
		{
			return None;
		}

		Some(LoginUrlInfo {
			server_address: Some(payload.server),
			username: Some(payload.login_name),
			password: Some(PasswordSecret::new(payload.app_password)),
		})
	}
}
impl<C> Debug for PollFlow<C>
where
	C: ?Sized + LoginHttpClient,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("PollFlow")
			.field("session", &self.session)
			.field("state", &self.state())
			.field("interval", &self.interval)
			.finish()
	}
}

#[derive(serde::Deserialize)]
struct LoginRequestPayload {
	login: String,
	poll: PollTokenPayload,
}
#[derive(serde::Deserialize)]
struct PollTokenPayload {
	token: String,
}
#[derive(serde::Deserialize)]
struct PollCompletionPayload {
	server: String,
	#[serde(rename = "loginName")]
	login_name: String,
	#[serde(rename = "appPassword")]
	app_password: String,
}

impl<C> Orchestrator<C>
where
	C: ?Sized + LoginHttpClient,
{
	/// Starts a poll-login session against `base_url`.
	///
	/// Replaces (and cancels) any previous session. On success the returned flow is
	/// in the `AwaitingUser` state with its browser URL ready; a missing or
	/// malformed response is terminal and leaves no half-initialized session behind.
	pub async fn begin_poll_login(&self, base_url: &Url) -> Result<Arc<PollFlow<C>>> {
		const KIND: FlowKind = FlowKind::PollLogin;

		let span = FlowSpan::new(KIND, "begin_poll_login");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span.instrument(self.begin_poll_login_inner(base_url)).await;

		match &result {
			Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Err(_) => obs::record_flow_outcome(KIND, FlowOutcome::Failure),
		}

		result
	}

	async fn begin_poll_login_inner(&self, base_url: &Url) -> Result<Arc<PollFlow<C>>> {
		// Session replacement: at most one active session per orchestrator.
		if let Some(previous) = self.active_poll.lock().take() {
			previous.cancel();
			self.state.lock().polling = false;
		}

		let request_url = common::join_path(base_url, LOGIN_FLOW_V2_PATH)
			.map_err(|source| crate::address::AddressError::InvalidUrl {
				url: base_url.to_string(),
				source,
			})?;
		let response = self.http_client.execute(HttpRequest::post_anonymous(request_url)).await?;

		if response.status != 200 {
			return Err(FlowError::LoginDataUnreadable.into());
		}

		let payload: LoginRequestPayload =
			common::parse_json(LOGIN_FLOW_V2_PATH, &response.body)
				.map_err(|_| FlowError::LoginDataUnreadable)?;

		if payload.login.is_empty() || payload.poll.token.is_empty() {
			return Err(FlowError::LoginDataUnreadable.into());
		}

		let login_url =
			Url::parse(&payload.login).map_err(|_| FlowError::LoginDataUnreadable)?;
		let poll_endpoint = common::join_path(base_url, POLL_PATH)
			.map_err(|_| FlowError::LoginDataUnreadable)?;
		let flow = Arc::new(PollFlow {
			http: self.http_client.clone(),
			session: PollSession {
				token: PasswordSecret::new(payload.poll.token),
				base_url: base_url.clone(),
				poll_endpoint,
				login_url,
			},
			interval: self.descriptor.poll_interval,
			deadline: self.descriptor.poll_deadline,
			sleeper: self.sleeper.clone(),
			metrics: self.poll_metrics.clone(),
			state: Mutex::new(PollFlowState::AwaitingUser),
			run_guard: AsyncMutex::new(()),
			browser_opened: AtomicBool::new(false),
		});

		*self.active_poll.lock() = Some(flow.clone());
		self.state.lock().polling = true;

		Ok(flow)
	}

	/// Runs a poll session to completion on behalf of the orchestrator.
	///
	/// On top of [`PollFlow::run`], this clears the session bookkeeping and discards
	/// results whose session was replaced while the loop ran.
	pub async fn run_poll_login(&self, flow: &Arc<PollFlow<C>>) -> Result<LoginUrlInfo> {
		const KIND: FlowKind = FlowKind::PollLogin;

		let span = FlowSpan::new(KIND, "run_poll_login");
		let result = span.instrument(flow.run()).await;
		let still_current = {
			let mut active = self.active_poll.lock();

			match &*active {
				Some(current) if Arc::ptr_eq(current, flow) => {
					*active = None;

					true
				},
				_ => false,
			}
		};

		if !still_current {
			// A replaced session's completion must not mutate anything.
			return result.and_then(|_| Err(FlowError::Superseded.into()));
		}

		self.state.lock().polling = false;

		result
	}

	/// Cancels the active poll session, if any.
	pub fn cancel_poll_login(&self) {
		if let Some(flow) = self.active_poll.lock().take() {
			flow.cancel();
		}

		self.state.lock().polling = false;
	}

	/// Returns the active poll session, if any.
	pub fn active_poll(&self) -> Option<Arc<PollFlow<C>>> {
		self.active_poll.lock().clone()
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::collections::VecDeque;
	// self
	use super::*;
	use crate::{
		error::{Error, TransportError},
		http::{HttpFuture, HttpResponse},
		setup::SetupDescriptor,
		store::MemoryAccountStore,
		trust::MemoryTrustStore,
	};

	type Hook = Box<dyn Fn() + Send + Sync>;

	#[derive(Default)]
	struct ScriptedClient {
		responses: Mutex<VecDeque<Result<HttpResponse, TransportError>>>,
		on_request: Mutex<Option<Hook>>,
	}
	impl ScriptedClient {
		fn push_json(&self, status: u16, body: &str) {
			self.responses.lock().push_back(Ok(HttpResponse {
				status,
				headers: Vec::new(),
				body: body.as_bytes().to_vec(),
			}));
		}
	}
	impl LoginHttpClient for ScriptedClient {
		fn execute(&self, _: HttpRequest) -> HttpFuture<'_> {
			if let Some(hook) = &*self.on_request.lock() {
				hook();
			}

			let next = self
				.responses
				.lock()
				.pop_front()
				.unwrap_or(Err(TransportError::NoConnection));

			Box::pin(async move {
				// One suspension point per request so concurrent runs interleave.
				tokio::task::yield_now().await;

				next
			})
		}
	}

	struct InstantSleeper;
	impl Sleeper for InstantSleeper {
		fn sleep(&self, _: Duration) -> SleepFuture {
			Box::pin(async {})
		}
	}

	fn orchestrator(client: Arc<ScriptedClient>) -> Orchestrator<ScriptedClient> {
		Orchestrator::with_http_client(
			Arc::new(MemoryAccountStore::default()),
			Arc::new(MemoryTrustStore::default()),
			SetupDescriptor::builder()
				.poll_interval(Duration::from_millis(1))
				.build()
				.expect("Descriptor fixture should build."),
			client,
			Arc::new(InstantSleeper),
		)
	}

	fn base_url() -> Url {
		Url::parse("https://cloud.example.com").expect("Base URL fixture should parse.")
	}

	const LOGIN_V2_BODY: &str = r#"{"login":"https://cloud.example.com/login/v2/flow/abc","poll":{"token":"tok-1"}}"#;
	const READY_BODY: &str = r#"{"server":"https://cloud.example.com","loginName":"alice","appPassword":"abc123"}"#;

	#[tokio::test]
	async fn malformed_login_request_is_terminal_and_leaves_no_session() {
		let client = Arc::new(ScriptedClient::default());

		client.push_json(200, r#"{"login":"https://x"}"#);

		let orchestrator = orchestrator(client);
		let err = orchestrator
			.begin_poll_login(&base_url())
			.await
			.expect_err("Missing poll token should be terminal.");

		assert!(matches!(err, Error::Flow(FlowError::LoginDataUnreadable)));
		assert!(orchestrator.active_poll().is_none());
		assert!(!orchestrator.snapshot().poll_in_flight);
	}

	#[tokio::test]
	async fn completion_drives_the_state_machine_to_completed() {
		let client = Arc::new(ScriptedClient::default());

		client.push_json(200, LOGIN_V2_BODY);
		// Two not-ready shapes, then the real thing.
		client.push_json(200, "");
		client.push_json(404, READY_BODY);
		client.push_json(200, READY_BODY);

		let orchestrator = orchestrator(client);
		let flow = orchestrator
			.begin_poll_login(&base_url())
			.await
			.expect("Login request should succeed.");

		assert_eq!(flow.state(), PollFlowState::AwaitingUser);
		assert_eq!(flow.login_url().as_str(), "https://cloud.example.com/login/v2/flow/abc");
		assert!(flow.should_open_browser(), "First caller opens the browser.");
		assert!(!flow.should_open_browser(), "The browser must open exactly once.");

		let info = orchestrator
			.run_poll_login(&flow)
			.await
			.expect("Polling should complete with credentials.");

		assert_eq!(flow.state(), PollFlowState::Completed);
		assert!(flow.is_completed());
		assert_eq!(info.server_address.as_deref(), Some("https://cloud.example.com"));
		assert_eq!(info.username.as_deref(), Some("alice"));
		assert_eq!(info.password.as_ref().map(|p| p.expose()), Some("abc123"));
		assert_eq!(orchestrator.poll_metrics.ticks(), 3);
		assert_eq!(orchestrator.poll_metrics.not_ready(), 2);
		assert_eq!(orchestrator.poll_metrics.completed(), 1);
		assert!(orchestrator.active_poll().is_none());
	}

	#[tokio::test]
	async fn empty_completion_fields_are_not_ready_yet() {
		let client = Arc::new(ScriptedClient::default());

		client.push_json(200, LOGIN_V2_BODY);
		client.push_json(
			200,
			r#"{"server":"https://cloud.example.com","loginName":"","appPassword":"abc123"}"#,
		);
		client.push_json(200, READY_BODY);

		let orchestrator = orchestrator(client);
		let flow = orchestrator
			.begin_poll_login(&base_url())
			.await
			.expect("Login request should succeed.");
		let info =
			orchestrator.run_poll_login(&flow).await.expect("Polling should eventually complete.");

		assert_eq!(info.username.as_deref(), Some("alice"));
		assert_eq!(orchestrator.poll_metrics.not_ready(), 1);
	}

	#[tokio::test]
	async fn cancelled_flow_refuses_to_run() {
		let client = Arc::new(ScriptedClient::default());

		client.push_json(200, LOGIN_V2_BODY);

		let orchestrator = orchestrator(client);
		let flow = orchestrator
			.begin_poll_login(&base_url())
			.await
			.expect("Login request should succeed.");

		orchestrator.cancel_poll_login();

		assert_eq!(flow.state(), PollFlowState::Cancelled);

		let err = flow.run().await.expect_err("Cancelled sessions must not poll.");

		assert!(matches!(err, Error::Flow(FlowError::Cancelled)));
	}

	#[tokio::test]
	async fn late_poll_response_after_cancel_is_a_no_op() {
		let client = Arc::new(ScriptedClient::default());

		client.push_json(200, LOGIN_V2_BODY);
		client.push_json(200, READY_BODY);

		let orchestrator = orchestrator(client.clone());
		let flow = orchestrator
			.begin_poll_login(&base_url())
			.await
			.expect("Login request should succeed.");

		// Cancel while the poll request is in flight: the ready response that comes
		// back afterwards must not complete the session.
		{
			let flow = flow.clone();

			*client.on_request.lock() = Some(Box::new(move || flow.cancel()));
		}

		let err = flow.run().await.expect_err("Cancelled session must discard late responses.");

		assert!(matches!(err, Error::Flow(FlowError::Cancelled)));
		assert_eq!(flow.state(), PollFlowState::Cancelled);
		assert_eq!(orchestrator.poll_metrics.completed(), 0);
	}

	#[tokio::test]
	async fn double_start_is_guarded() {
		let client = Arc::new(ScriptedClient::default());

		client.push_json(200, LOGIN_V2_BODY);
		client.push_json(200, READY_BODY);

		let orchestrator = orchestrator(client);
		let flow = orchestrator
			.begin_poll_login(&base_url())
			.await
			.expect("Login request should succeed.");
		let (first, second) = tokio::join!(flow.run(), flow.run());

		let completed = [&first, &second]
			.iter()
			.filter(|result| result.is_ok())
			.count();

		assert_eq!(completed, 1, "Exactly one run may own the loop.");
		assert!(
			[first, second].into_iter().any(|result| matches!(
				result,
				Err(Error::Flow(FlowError::AlreadyPolling))
			)),
			"The second run must hit the already-polling guard.",
		);
	}

	#[tokio::test]
	async fn replacement_cancels_the_previous_session() {
		let client = Arc::new(ScriptedClient::default());

		client.push_json(200, LOGIN_V2_BODY);
		client.push_json(200, LOGIN_V2_BODY);

		let orchestrator = orchestrator(client);
		let first = orchestrator
			.begin_poll_login(&base_url())
			.await
			.expect("First login request should succeed.");
		let second = orchestrator
			.begin_poll_login(&base_url())
			.await
			.expect("Second login request should succeed.");

		assert_eq!(first.state(), PollFlowState::Cancelled);
		assert_eq!(second.state(), PollFlowState::AwaitingUser);
		assert!(
			orchestrator
				.active_poll()
				.map(|active| Arc::ptr_eq(&active, &second))
				.unwrap_or(false)
		);
	}

	#[tokio::test]
	async fn poll_deadline_expires_the_session() {
		let client = Arc::new(ScriptedClient::default());

		client.push_json(200, LOGIN_V2_BODY);

		for _ in 0..8 {
			client.push_json(200, "");
		}

		let accounts: Arc<dyn crate::store::AccountStore> =
			Arc::new(MemoryAccountStore::default());
		let orchestrator: Orchestrator<ScriptedClient> = Orchestrator::with_http_client(
			accounts,
			Arc::new(MemoryTrustStore::default()),
			SetupDescriptor::builder()
				.poll_interval(Duration::from_millis(10))
				.poll_deadline(Duration::from_millis(25))
				.build()
				.expect("Descriptor fixture should build."),
			client,
			Arc::new(InstantSleeper),
		);
		let flow = orchestrator
			.begin_poll_login(&base_url())
			.await
			.expect("Login request should succeed.");
		let err = orchestrator
			.run_poll_login(&flow)
			.await
			.expect_err("Deadline must expire the session.");

		assert!(matches!(err, Error::Flow(FlowError::PollExpired)));
		assert_eq!(flow.state(), PollFlowState::Cancelled);
	}
}
