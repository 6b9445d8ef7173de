//! Rust's turnkey self-hosted-cloud login broker—normalize server addresses, probe
//! capabilities, drive browser-grant login flows, verify credentials, and
//! materialize accounts in one crate built for production.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod account;
pub mod address;
pub mod auth;
pub mod error;
pub mod flows;
pub mod http;
pub mod obs;
pub mod server;
pub mod setup;
pub mod status;
pub mod store;
pub mod trust;
#[cfg(all(feature = "reqwest", feature = "tokio"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; available whenever the
	//! default reqwest + tokio stack is enabled.

	pub use crate::_prelude::*;

	// self
	use crate::{
		flows::{Orchestrator, TokioSleeper},
		http::ReqwestHttpClient,
		setup::SetupDescriptor,
		store::MemoryAccountStore,
		trust::MemoryTrustStore,
	};

	/// Orchestrator type alias used by reqwest-backed integration tests.
	pub type ReqwestTestOrchestrator = Orchestrator<ReqwestHttpClient>;

	/// Builds a reqwest HTTP client that tolerates the self-signed certificates local
	/// mock servers present during tests.
	pub fn test_reqwest_http_client() -> ReqwestHttpClient {
		let client = ReqwestClient::builder()
			.redirect(reqwest::redirect::Policy::none())
			.danger_accept_invalid_certs(true)
			.build()
			.expect("Failed to build insecure Reqwest client for tests.");

		ReqwestHttpClient::with_client(client)
	}

	/// Constructs an [`Orchestrator`] backed by in-memory stores, the tokio sleeper,
	/// and the reqwest transport used across integration tests.
	pub fn build_reqwest_test_orchestrator(
		descriptor: SetupDescriptor,
	) -> (ReqwestTestOrchestrator, Arc<MemoryAccountStore>, Arc<MemoryTrustStore>) {
		let accounts = Arc::new(MemoryAccountStore::default());
		let trust = Arc::new(MemoryTrustStore::default());
		let orchestrator = Orchestrator::with_http_client(
			accounts.clone(),
			trust.clone(),
			descriptor,
			test_reqwest_http_client(),
			Arc::new(TokioSleeper),
		);

		(orchestrator, accounts, trust)
	}
}

mod _prelude {
	pub use std::{
		collections::HashMap,
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::OffsetDateTime;
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use httpmock as _;
