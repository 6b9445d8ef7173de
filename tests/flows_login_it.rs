#![cfg(all(feature = "reqwest", feature = "tokio"))]

// std
use std::sync::atomic::{AtomicUsize, Ordering};
// crates.io
use httpmock::prelude::*;
// self
use login_broker::{
	_preludet::*,
	auth::{AccountIdentity, Credentials, PasswordSecret},
	error::{AuthError, Error},
	setup::SetupDescriptor,
	status::ResultCode,
	store::{AccountStore, ClientPool, RootsChangedNotifier},
};

const STATUS_OK: &str =
	r#"{"installed":true,"maintenance":false,"version":"29.0.1.1","extendedSupport":false}"#;
const USER_BODY: &str =
	r#"{"ocs":{"data":{"id":"alice-id","display-name":"Alice A."}}}"#;

#[derive(Debug, Default)]
struct RecordingNotifier(AtomicUsize);
impl RootsChangedNotifier for RecordingNotifier {
	fn roots_changed(&self) {
		self.0.fetch_add(1, Ordering::Relaxed);
	}
}

#[derive(Debug, Default)]
struct RecordingPool(Mutex<Vec<String>>);
impl ClientPool for RecordingPool {
	fn evict(&self, identity: &AccountIdentity) {
		self.0.lock().push(identity.to_string());
	}
}

async fn mock_healthy_server(server: &MockServer) {
	server
		.mock_async(|when, then| {
			when.method(GET).path("/status.php");
			then.status(200).header("content-type", "application/json").body(STATUS_OK);
		})
		.await;
	server
		.mock_async(|when, then| {
			when.method(GET).path("/ocs/v2.php/cloud/user");
			then.status(200).header("content-type", "application/json").body(USER_BODY);
		})
		.await;
	server
		.mock_async(|when, then| {
			when.path("/remote.php/dav/files/alice-id");
			then.status(207).body("<d:multistatus/>");
		})
		.await;
}

#[tokio::test]
async fn classic_login_materializes_exactly_one_account() {
	let server = MockServer::start_async().await;

	mock_healthy_server(&server).await;

	let descriptor = SetupDescriptor::builder().build().expect("Descriptor should build.");
	let (orchestrator, accounts, _) = build_reqwest_test_orchestrator(descriptor);
	let notifier = Arc::new(RecordingNotifier::default());
	let pool = Arc::new(RecordingPool::default());
	let orchestrator = orchestrator
		.with_roots_notifier(notifier.clone())
		.with_client_pool(pool.clone());

	// Probe, verify, materialize: the classic two-field path.
	let info = orchestrator
		.probe_server(&server.base_url())
		.await
		.expect("Probe should succeed.");
	let verified = orchestrator
		.verify_credentials(&info.base_url, Credentials::new("alice", "app-password"))
		.await
		.expect("Verification should succeed.");
	let record = orchestrator
		.create_account(&verified)
		.await
		.expect("Account creation should succeed.");

	assert_eq!(record.user_id, "alice-id");
	assert_eq!(record.display_name, "Alice A.");
	assert_eq!(record.version.to_string(), "29.0.1.1");
	assert_eq!(notifier.0.load(Ordering::Relaxed), 1, "Roots change fires once per creation.");

	// The first account becomes the default.
	let stored = accounts
		.fetch(&record.identity)
		.await
		.expect("Store fetch should succeed.")
		.expect("Created account should be stored.");

	assert_eq!(stored.secret.expose(), "app-password");
	assert_eq!(
		accounts.default_identity().await.expect("Default lookup should succeed."),
		Some(record.identity.clone())
	);

	// A second attempt with the same identity must fail and leave the original
	// record untouched.
	let err = orchestrator
		.create_account(&verified)
		.await
		.expect_err("Duplicate identities must be rejected.");

	assert!(matches!(err, Error::Auth(AuthError::AccountNotNew { .. })));
	assert_eq!(orchestrator.auth_status(), Some(ResultCode::AccountNotNew));

	let kept = accounts
		.fetch(&record.identity)
		.await
		.expect("Store fetch should succeed.")
		.expect("Original account should survive the duplicate attempt.");

	assert_eq!(kept.secret.expose(), "app-password");
	assert_eq!(notifier.0.load(Ordering::Relaxed), 1, "A failed creation must not notify.");

	// The update path rotates the secret and evicts the cached client.
	let updated = orchestrator
		.update_account(&record.identity, PasswordSecret::new("rotated"))
		.await
		.expect("Account update should succeed.");

	assert_eq!(updated.secret.expose(), "rotated");
	assert_eq!(pool.0.lock().as_slice(), [record.identity.to_string()]);

	let reread = accounts
		.fetch(&record.identity)
		.await
		.expect("Store fetch should succeed.")
		.expect("Updated account should be stored.");

	assert_eq!(reread.secret.expose(), "rotated");
	assert_eq!(reread.user_id, "alice-id", "Rotation must only touch the secret.");
}

#[tokio::test]
async fn updating_a_vanished_account_is_an_auth_error() {
	let descriptor = SetupDescriptor::builder().build().expect("Descriptor should build.");
	let (orchestrator, _, _) = build_reqwest_test_orchestrator(descriptor);
	let identity: AccountIdentity =
		"ghost@cloud.example.com".parse().expect("Identity fixture should parse.");
	let err = orchestrator
		.update_account(&identity, PasswordSecret::new("whatever"))
		.await
		.expect_err("Updating a vanished account must fail.");

	assert!(matches!(err, Error::Auth(AuthError::AccountGone { .. })));
}

#[tokio::test]
async fn session_snapshot_survives_ui_restarts_mid_flow() {
	let server = MockServer::start_async().await;

	mock_healthy_server(&server).await;

	let descriptor = SetupDescriptor::builder().build().expect("Descriptor should build.");
	let (orchestrator, _, _) = build_reqwest_test_orchestrator(descriptor);

	orchestrator.probe_server(&server.base_url()).await.expect("Probe should succeed.");

	let snapshot = orchestrator.snapshot();
	let descriptor = SetupDescriptor::builder().build().expect("Descriptor should build.");
	let (restored, _, _) = build_reqwest_test_orchestrator(descriptor);

	restored.restore(snapshot);

	// The restored orchestrator can verify and materialize without re-probing.
	let info = restored.server_info().expect("Server info should survive the restart.");
	let verified = restored
		.verify_credentials(&info.base_url, Credentials::new("alice", "app-password"))
		.await
		.expect("Verification should succeed after restore.");
	let record =
		restored.create_account(&verified).await.expect("Creation should succeed after restore.");

	assert_eq!(record.version.to_string(), "29.0.1.1");
}

#[tokio::test]
async fn identity_includes_the_explicit_port_of_the_mock_server() {
	let server = MockServer::start_async().await;

	mock_healthy_server(&server).await;

	let descriptor = SetupDescriptor::builder().build().expect("Descriptor should build.");
	let (orchestrator, _, _) = build_reqwest_test_orchestrator(descriptor);
	let info =
		orchestrator.probe_server(&server.base_url()).await.expect("Probe should succeed.");
	let verified = orchestrator
		.verify_credentials(&info.base_url, Credentials::new("alice", "app-password"))
		.await
		.expect("Verification should succeed.");
	let record =
		orchestrator.create_account(&verified).await.expect("Creation should succeed.");

	assert_eq!(
		record.identity.to_string(),
		format!("alice@127.0.0.1:{}", server.port()),
		"Identities carry the non-default port of their base URL.",
	);
}
