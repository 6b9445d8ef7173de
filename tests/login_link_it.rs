#![cfg(all(feature = "reqwest", feature = "tokio"))]

// crates.io
use httpmock::prelude::*;
// self
use login_broker::{
	_preludet::*,
	address,
	error::Error,
	flows::{LoginInput, LoginStrategy},
	setup::SetupDescriptor,
};

const USER_BODY: &str = r#"{"ocs":{"data":{"id":"alice-id","displayname":"Alice A."}}}"#;

#[tokio::test]
async fn deep_link_feeds_the_verifier_without_probing_the_entered_text() {
	let server = MockServer::start_async().await;
	let user_info = server
		.mock_async(|when, then| {
			when.method(GET).path("/ocs/v2.php/cloud/user");
			then.status(200).header("content-type", "application/json").body(USER_BODY);
		})
		.await;
	let _root = server
		.mock_async(|when, then| {
			when.path("/remote.php/dav/files/alice-id");
			then.status(207).body("");
		})
		.await;
	let descriptor = SetupDescriptor::builder()
		.login_scheme("myapp")
		.build()
		.expect("Descriptor should build.");
	let (orchestrator, _, _) = build_reqwest_test_orchestrator(descriptor);
	let encoded_server = server
		.base_url()
		.replace("://", "%3A%2F%2F")
		.replace(':', "%3A");
	let link = format!("myapp://login/user:alice&password:app-password&server:{encoded_server}");
	let strategy = orchestrator
		.select_strategy(&LoginInput::LoginLink(link))
		.expect("Strategy selection should succeed.");
	let LoginStrategy::DirectCredentials(info) = strategy else {
		panic!("Deep links must select the direct-credentials strategy.");
	};
	let address = info.server_address.as_deref().expect("Link should carry the server address.");
	let normalized = address::normalize(address, orchestrator.descriptor.default_scheme)
		.expect("Link address should normalize.");
	let base_url = Url::parse(&normalized).expect("Normalized address should parse.");
	let credentials = orchestrator
		.credentials_from_login_data(&info)
		.expect("Complete link data should yield credentials.");
	let verified = orchestrator
		.verify_credentials(&base_url, credentials)
		.await
		.expect("Verification should succeed for link credentials.");

	user_info.assert_async().await;

	assert_eq!(verified.user_id, "alice-id");
	assert_eq!(verified.display_name, "Alice A.");
}

#[tokio::test]
async fn partial_deep_link_parses_to_the_documented_shape() {
	let descriptor = SetupDescriptor::builder()
		.login_scheme("myapp")
		.build()
		.expect("Descriptor should build.");
	let (orchestrator, _, _) = build_reqwest_test_orchestrator(descriptor);
	let strategy = orchestrator
		.select_strategy(&LoginInput::LoginLink(
			"myapp://login/user:alice&server:https%3A%2F%2Fex.com".into(),
		))
		.expect("Strategy selection should succeed.");
	let LoginStrategy::DirectCredentials(info) = strategy else {
		panic!("Deep links must select the direct-credentials strategy.");
	};

	assert_eq!(info.username.as_deref(), Some("alice"));
	assert_eq!(info.server_address.as_deref(), Some("https://ex.com"));
	assert!(info.password.is_none());
	assert!(
		orchestrator.credentials_from_login_data(&info).is_none(),
		"Links without a password cannot yield a credential pair.",
	);
}

#[tokio::test]
async fn malformed_deep_links_fail_strategy_selection() {
	let descriptor = SetupDescriptor::builder()
		.login_scheme("myapp")
		.build()
		.expect("Descriptor should build.");
	let (orchestrator, _, _) = build_reqwest_test_orchestrator(descriptor);
	let err = orchestrator
		.select_strategy(&LoginInput::LoginLink("myapp://".into()))
		.expect_err("Truncated links must fail parsing.");

	assert!(matches!(err, Error::Address(_)));
}
