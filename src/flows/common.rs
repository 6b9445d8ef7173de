//! Shared helpers for flow implementations (pending-op correlation, payload parsing).

// self
use crate::{_prelude::*, error::ProtocolError};

/// Redirect-follow limit shared by the probe and the existence check.
pub(crate) const MAX_REDIRECTS: usize = 5;

/// Correlation token for an in-flight probe or verification.
///
/// Only the most recently issued id may deliver its result; anything older is stale
/// and gets discarded, which is what keeps rapid address edits from racing each
/// other.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OpId(u64);
impl OpId {
	/// Raw counter value, exposed for session snapshots.
	pub fn value(self) -> u64 {
		self.0
	}
}

/// Single-writer tracker for the currently pending operation id.
#[derive(Debug, Default)]
pub(crate) struct OpTracker {
	counter: std::sync::atomic::AtomicU64,
	pending: Mutex<Option<u64>>,
}
impl OpTracker {
	/// Issues a fresh id and makes it the only honored one.
	pub(crate) fn issue(&self) -> OpId {
		let id = self.counter.fetch_add(1, std::sync::atomic::Ordering::Relaxed) + 1;

		*self.pending.lock() = Some(id);

		OpId(id)
	}

	/// Claims completion for `op`; returns `false` when a newer id superseded it.
	pub(crate) fn try_complete(&self, op: OpId) -> bool {
		let mut pending = self.pending.lock();

		if *pending == Some(op.0) {
			*pending = None;

			true
		} else {
			false
		}
	}

	/// Drops the pending id so any in-flight result becomes stale.
	pub(crate) fn cancel(&self) {
		*self.pending.lock() = None;
	}

	/// Currently pending id, for session snapshots.
	pub(crate) fn pending(&self) -> Option<u64> {
		*self.pending.lock()
	}

	/// Restores a snapshotted pending id, keeping the counter monotonic.
	pub(crate) fn restore(&self, pending: Option<u64>) {
		if let Some(id) = pending {
			self.counter.fetch_max(id, std::sync::atomic::Ordering::Relaxed);
		}

		*self.pending.lock() = pending;
	}
}

/// Parses a JSON payload with path-aware errors for diagnostics.
pub(crate) fn parse_json<T>(endpoint: &'static str, body: &[u8]) -> Result<T, ProtocolError>
where
	T: serde::de::DeserializeOwned,
{
	let mut deserializer = serde_json::Deserializer::from_slice(body);

	serde_path_to_error::deserialize(&mut deserializer)
		.map_err(|source| ProtocolError::MalformedPayload { endpoint, source })
}

/// Joins a relative path onto a base URL without clobbering existing path segments.
///
/// `Url::join` would treat a base of `https://host/cloud` as a file and replace the
/// last segment; the wire protocol instead appends below whatever base survived
/// normalization.
pub(crate) fn join_path(base: &Url, path: &str) -> Result<Url, url::ParseError> {
	Url::parse(&format!("{}/{path}", base.as_str().trim_end_matches('/')))
}
