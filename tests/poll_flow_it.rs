#![cfg(all(feature = "reqwest", feature = "tokio"))]

// std
use std::time::Duration;
// crates.io
use httpmock::prelude::*;
// self
use login_broker::{
	_preludet::*,
	error::{Error, FlowError},
	flows::PollFlowState,
	setup::SetupDescriptor,
};

const READY_BODY: &str =
	r#"{"server":"https://cloud.example.com","loginName":"alice","appPassword":"abc123"}"#;

fn fast_descriptor(poll_interval: Duration) -> SetupDescriptor {
	SetupDescriptor::builder()
		.poll_interval(poll_interval)
		.build()
		.expect("Poll descriptor should build.")
}

fn base_url(server: &MockServer) -> Url {
	Url::parse(&server.base_url()).expect("Mock server URL should parse.")
}

async fn mock_login_request(server: &MockServer) -> httpmock::Mock<'_> {
	server
		.mock_async(|when, then| {
			when.method(POST).path("/index.php/login/v2");
			then.status(200).header("content-type", "application/json").body(format!(
				r#"{{"login":"{}/login/flow/web","poll":{{"token":"tok-1"}}}}"#,
				server.base_url()
			));
		})
		.await
}

#[tokio::test]
async fn handshake_polls_until_the_browser_login_completes() {
	let server = MockServer::start_async().await;
	let login = mock_login_request(&server).await;
	let pending = server
		.mock_async(|when, then| {
			when.method(POST).path("/poll");
			then.status(404);
		})
		.await;
	let (orchestrator, _, _) =
		build_reqwest_test_orchestrator(fast_descriptor(Duration::from_millis(50)));
	let flow = orchestrator
		.begin_poll_login(&base_url(&server))
		.await
		.expect("Login request should succeed.");

	login.assert_async().await;

	assert_eq!(flow.state(), PollFlowState::AwaitingUser);
	assert!(flow.should_open_browser());

	let runner = {
		let orchestrator = orchestrator.clone();
		let flow = flow.clone();

		tokio::spawn(async move { orchestrator.run_poll_login(&flow).await })
	};

	// Let a few not-ready ticks pass, then let the "browser" finish the login.
	while pending.hits_async().await < 2 {
		tokio::time::sleep(Duration::from_millis(20)).await;
	}

	pending.delete_async().await;

	let ready = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/poll")
				.form_urlencoded_tuple("token", "tok-1");
			then.status(200).header("content-type", "application/json").body(READY_BODY);
		})
		.await;
	let info = runner
		.await
		.expect("Poll task should not panic.")
		.expect("Polling should deliver the credentials.");

	ready.assert_async().await;

	assert_eq!(info.server_address.as_deref(), Some("https://cloud.example.com"));
	assert_eq!(info.username.as_deref(), Some("alice"));
	assert_eq!(info.password.as_ref().map(|p| p.expose()), Some("abc123"));
	assert_eq!(flow.state(), PollFlowState::Completed);
	assert!(orchestrator.active_poll().is_none());
	assert!(!orchestrator.snapshot().poll_in_flight);
}

#[tokio::test]
async fn cancelling_after_a_tick_fires_no_further_request() {
	let server = MockServer::start_async().await;
	let _login = mock_login_request(&server).await;
	let pending = server
		.mock_async(|when, then| {
			when.method(POST).path("/poll");
			then.status(200).body("");
		})
		.await;
	let (orchestrator, _, _) =
		build_reqwest_test_orchestrator(fast_descriptor(Duration::from_millis(200)));
	let flow = orchestrator
		.begin_poll_login(&base_url(&server))
		.await
		.expect("Login request should succeed.");
	let runner = {
		let orchestrator = orchestrator.clone();
		let flow = flow.clone();

		tokio::spawn(async move { orchestrator.run_poll_login(&flow).await })
	};

	while pending.hits_async().await < 1 {
		tokio::time::sleep(Duration::from_millis(10)).await;
	}

	orchestrator.cancel_poll_login();

	let result = runner.await.expect("Poll task should not panic.");

	assert!(matches!(result, Err(Error::Flow(FlowError::Cancelled))));

	let hits_at_cancel = pending.hits_async().await;

	// No (N+1)-th request may fire after cancellation.
	tokio::time::sleep(Duration::from_millis(600)).await;

	assert_eq!(pending.hits_async().await, hits_at_cancel);
	assert_eq!(flow.state(), PollFlowState::Cancelled);
	assert!(orchestrator.active_poll().is_none());
}

#[tokio::test]
async fn poll_requests_never_overlap() {
	let server = MockServer::start_async().await;
	let _login = mock_login_request(&server).await;
	// Every tick takes longer than the poll interval; sequential ticking means the
	// observed request count stays far below what overlapping timers would produce.
	let pending = server
		.mock_async(|when, then| {
			when.method(POST).path("/poll");
			then.status(200).body("").delay(Duration::from_millis(120));
		})
		.await;
	let (orchestrator, _, _) =
		build_reqwest_test_orchestrator(fast_descriptor(Duration::from_millis(10)));
	let flow = orchestrator
		.begin_poll_login(&base_url(&server))
		.await
		.expect("Login request should succeed.");
	let runner = {
		let orchestrator = orchestrator.clone();
		let flow = flow.clone();

		tokio::spawn(async move { orchestrator.run_poll_login(&flow).await })
	};

	tokio::time::sleep(Duration::from_millis(500)).await;
	orchestrator.cancel_poll_login();

	let _ = runner.await.expect("Poll task should not panic.");
	let hits = pending.hits_async().await;

	assert!(
		hits <= 5,
		"Fixed-delay polling with one outstanding request allows at most ~4 ticks in 500ms \
		 of 120ms responses, saw {hits}.",
	);
}

#[tokio::test]
async fn failed_login_request_leaves_no_session_behind() {
	let server = MockServer::start_async().await;
	let login = server
		.mock_async(|when, then| {
			when.method(POST).path("/index.php/login/v2");
			then.status(500);
		})
		.await;
	let (orchestrator, _, _) =
		build_reqwest_test_orchestrator(fast_descriptor(Duration::from_millis(50)));
	let err = orchestrator
		.begin_poll_login(&base_url(&server))
		.await
		.expect_err("A failed login request should be terminal.");

	login.assert_async().await;

	assert!(matches!(err, Error::Flow(FlowError::LoginDataUnreadable)));
	assert!(orchestrator.active_poll().is_none());
	assert!(!orchestrator.snapshot().poll_in_flight);
}

#[tokio::test]
async fn suspended_sessions_resume_polling_with_the_retained_token() {
	let server = MockServer::start_async().await;
	let _login = mock_login_request(&server).await;
	let pending = server
		.mock_async(|when, then| {
			when.method(POST).path("/poll").form_urlencoded_tuple("token", "tok-1");
			then.status(200).body("");
		})
		.await;
	let (orchestrator, _, _) =
		build_reqwest_test_orchestrator(fast_descriptor(Duration::from_millis(100)));
	let flow = orchestrator
		.begin_poll_login(&base_url(&server))
		.await
		.expect("Login request should succeed.");

	// First run gets suspended (dropped) after a tick.
	{
		let runner = {
			let flow = flow.clone();

			tokio::spawn(async move { flow.run().await })
		};

		while pending.hits_async().await < 1 {
			tokio::time::sleep(Duration::from_millis(10)).await;
		}

		runner.abort();

		let _ = runner.await;
	}

	assert!(!flow.is_polling(), "A suspended run must release the polling guard.");

	pending.delete_async().await;

	let ready = server
		.mock_async(|when, then| {
			when.method(POST).path("/poll").form_urlencoded_tuple("token", "tok-1");
			then.status(200).header("content-type", "application/json").body(READY_BODY);
		})
		.await;
	// Second run restarts with the same token and completes.
	let info = orchestrator
		.run_poll_login(&flow)
		.await
		.expect("Resumed polling should complete.");

	ready.assert_async().await;

	assert_eq!(info.username.as_deref(), Some("alice"));
	assert_eq!(flow.state(), PollFlowState::Completed);
}
