//! Certificate-trust negotiation for servers that fail standard validation.
//!
//! When any network step reports a recoverable peer-verification failure, the
//! hosting UI presents the offending [`CertificateChain`] and feeds the user's
//! decision into [`TrustNegotiator::resolve`]. Accepting persists the chain to a
//! [`TrustStore`] and retries from the capability-probe step — never from address
//! entry. Rejecting restores the prior state with an unverified-connection status.

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use sha2::{Digest, Sha256};
// self
use crate::{_prelude::*, store::StoreError};

/// A single certificate in DER form.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerCertificate {
	der: Vec<u8>,
}
impl ServerCertificate {
	/// Wraps DER-encoded certificate bytes.
	pub fn from_der(der: impl Into<Vec<u8>>) -> Self {
		Self { der: der.into() }
	}

	/// Raw DER bytes, e.g. for seeding a transport's extra root store.
	pub fn der(&self) -> &[u8] {
		&self.der
	}

	/// SHA-256 fingerprint of the DER bytes, URL-safe base64 encoded.
	pub fn fingerprint(&self) -> String {
		let mut hasher = Sha256::new();

		hasher.update(&self.der);

		URL_SAFE_NO_PAD.encode(hasher.finalize())
	}
}
impl Debug for ServerCertificate {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ServerCertificate").field("fingerprint", &self.fingerprint()).finish()
	}
}

/// Certificate chain presented by a server that failed validation.
///
/// Transports that cannot capture the presented certificates (the default reqwest
/// stack flattens them away) produce an *opaque* chain carrying only the host; such
/// chains can still be rejected meaningfully, but accepting them persists nothing
/// and the transport must be rebuilt with platform-level trust instead.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateChain {
	/// Host that presented the chain.
	pub host: String,
	/// Presented certificates, leaf first; empty for opaque chains.
	pub certificates: Vec<ServerCertificate>,
}
impl CertificateChain {
	/// Builds a chain from captured certificates.
	pub fn new(host: impl Into<String>, certificates: Vec<ServerCertificate>) -> Self {
		Self { host: host.into(), certificates }
	}

	/// Builds a chain for a transport that could not capture certificates.
	pub fn opaque(host: impl Into<String>) -> Self {
		Self { host: host.into(), certificates: Vec::new() }
	}

	/// Returns `true` when the transport could not capture the certificates.
	pub fn is_opaque(&self) -> bool {
		self.certificates.is_empty()
	}
}

/// Persistence contract for user-accepted certificates.
pub trait TrustStore
where
	Self: Send + Sync,
{
	/// Persists an accepted certificate.
	fn persist(&self, certificate: &ServerCertificate) -> Result<(), StoreError>;

	/// Returns `true` when a certificate with this fingerprint was accepted before.
	fn contains(&self, fingerprint: &str) -> bool;

	/// Returns every accepted certificate, e.g. to seed a transport's root store.
	fn trusted_certificates(&self) -> Vec<ServerCertificate>;
}

/// In-process [`TrustStore`] for tests and ephemeral sessions.
#[derive(Clone, Debug, Default)]
pub struct MemoryTrustStore(Arc<RwLock<HashMap<String, ServerCertificate>>>);
impl TrustStore for MemoryTrustStore {
	fn persist(&self, certificate: &ServerCertificate) -> Result<(), StoreError> {
		self.0.write().insert(certificate.fingerprint(), certificate.clone());

		Ok(())
	}

	fn contains(&self, fingerprint: &str) -> bool {
		self.0.read().contains_key(fingerprint)
	}

	fn trusted_certificates(&self) -> Vec<ServerCertificate> {
		self.0.read().values().cloned().collect()
	}
}

/// The user's verdict on a presented chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrustDecision {
	/// Persist the chain and retry the probe.
	Accept,
	/// Keep the chain untrusted.
	Reject,
}

/// Where the flow goes after a trust decision.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrustOutcome {
	/// Chain persisted; re-run the capability probe with the retained address.
	RetryProbe,
	/// Chain rejected; the flow shows an unverified-connection status.
	Unverified,
}

/// Applies trust decisions against a [`TrustStore`].
#[derive(Clone)]
pub struct TrustNegotiator {
	store: Arc<dyn TrustStore>,
}
impl TrustNegotiator {
	/// Creates a negotiator over the given store.
	pub fn new(store: Arc<dyn TrustStore>) -> Self {
		Self { store }
	}

	/// Resolves a presented chain with the user's decision.
	///
	/// Accepting persists every captured certificate; no account is created either
	/// way — the caller decides whether to retry the probe.
	pub fn resolve(
		&self,
		chain: &CertificateChain,
		decision: TrustDecision,
	) -> Result<TrustOutcome, StoreError> {
		match decision {
			TrustDecision::Accept => {
				for certificate in &chain.certificates {
					self.store.persist(certificate)?;
				}

				Ok(TrustOutcome::RetryProbe)
			},
			TrustDecision::Reject => Ok(TrustOutcome::Unverified),
		}
	}

	/// Returns `true` when every certificate of the chain was accepted before.
	pub fn is_trusted(&self, chain: &CertificateChain) -> bool {
		!chain.is_opaque()
			&& chain.certificates.iter().all(|cert| self.store.contains(&cert.fingerprint()))
	}
}
impl Debug for TrustNegotiator {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("TrustNegotiator(..)")
	}
}
