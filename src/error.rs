//! Broker-level error types shared across flows, stores, and transports.
//!
//! Every variant maps onto exactly one [`ResultCode`](crate::status::ResultCode) so
//! hosting UIs resolve failures to a fixed icon + short-text pair; see
//! [`Error::code`] and [`Error::describe`].

// self
use crate::{
	_prelude::*,
	account::AccountRecordBuilderError,
	address::AddressError,
	auth::{AccountIdentity, IdentityError},
	server::version::VersionError,
	setup::SetupError,
	status::ResultCode,
	store::StoreError,
	trust::CertificateChain,
};

/// Broker-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical broker error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Address normalization or login-link parsing failure.
	#[error(transparent)]
	Address(#[from] AddressError),
	/// Account identity construction failure.
	#[error(transparent)]
	Identity(#[from] IdentityError),
	/// Setup descriptor validation failure.
	#[error(transparent)]
	Setup(#[from] SetupError),
	/// Transport failure (DNS, TCP, TLS, timeouts).
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Server spoke, but not the protocol the flow expected.
	#[error(transparent)]
	Protocol(#[from] ProtocolError),
	/// Authorization failure.
	#[error(transparent)]
	Auth(#[from] AuthError),
	/// Account-record construction failure.
	#[error(transparent)]
	Record(#[from] AccountRecordBuilderError),
	/// Account-store failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		StoreError,
	),
	/// Flow-control outcome (stale response, cancellation, double start).
	#[error(transparent)]
	Flow(#[from] FlowError),
}
impl Error {
	/// Resolves the error to its slot in the closed result-code taxonomy.
	pub fn code(&self) -> ResultCode {
		match self {
			Self::Address(_) | Self::Identity(_) | Self::Setup(_) => ResultCode::IncorrectAddress,
			Self::Transport(e) => e.code(),
			Self::Protocol(e) => e.code(),
			Self::Auth(e) => e.code(),
			Self::Record(_) | Self::Storage(_) => ResultCode::UnknownError,
			Self::Flow(e) => e.code(),
		}
	}

	/// User-facing description: the fixed badge text, or the wrapped message for
	/// unknown errors.
	pub fn describe(&self) -> String {
		let code = self.code();

		if code == ResultCode::UnknownError {
			format!("Unknown error: {self}")
		} else {
			code.badge().text.to_owned()
		}
	}
}

/// Transport-level failures (network, TLS, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// No network route is available at all.
	#[error("No network connection.")]
	NoConnection,
	/// Connect or read deadline elapsed.
	#[error("Connection timed out.")]
	Timeout,
	/// Host name resolution failed.
	#[error("Host `{host}` could not be resolved.")]
	HostUnresolved {
		/// Host that failed to resolve.
		host: String,
	},
	/// TCP-level connect failure (refused, reset, unreachable).
	#[error("Connection could not be established.")]
	Connect {
		/// Transport-specific connect error.
		#[source]
		source: BoxError,
	},
	/// Certificate validation failed; the user may decide to trust the chain.
	#[error("Server certificate could not be verified.")]
	PeerUnverified {
		/// Offending certificate chain, as far as the transport could capture it.
		chain: CertificateChain,
	},
	/// Any other TLS failure.
	#[error("TLS negotiation failed.")]
	Tls {
		/// Transport-specific TLS error.
		#[source]
		source: BoxError,
	},
	/// Network failure that fits no finer bucket.
	#[error("Network error occurred while calling the server.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// IO failure surfaced during transport.
	#[error("I/O error occurred while calling the server.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}

	fn code(&self) -> ResultCode {
		match self {
			Self::NoConnection => ResultCode::NoNetworkConnection,
			Self::Timeout => ResultCode::Timeout,
			Self::HostUnresolved { .. } => ResultCode::HostNotAvailable,
			Self::Connect { .. } => ResultCode::WrongConnection,
			Self::PeerUnverified { .. } => ResultCode::SslRecoverablePeerUnverified,
			Self::Tls { .. } => ResultCode::SslError,
			Self::Network { .. } | Self::Io(_) => ResultCode::UnknownError,
		}
	}
}

/// Protocol-level failures: the server answered, but not usefully.
#[derive(Debug, ThisError)]
pub enum ProtocolError {
	/// The instance has not finished its setup wizard.
	#[error("Server instance is not configured.")]
	InstanceNotConfigured,
	/// The instance is in maintenance mode.
	#[error("Server is in maintenance mode.")]
	MaintenanceMode,
	/// The server rejected the request because this client's domain is not trusted.
	#[error("Server does not trust this domain.")]
	UntrustedDomain,
	/// The probed resource does not exist on the host.
	#[error("Resource not found at `{url}`.")]
	NotFound {
		/// URL that answered 404.
		url: String,
	},
	/// Server version is below the supported minimum.
	#[error("Server version {found} is not supported.")]
	UnsupportedVersion {
		/// Version the server reported.
		found: crate::server::ServerVersion,
	},
	/// Version string in the status payload could not be parsed.
	#[error("Server reported an unreadable version.")]
	InvalidVersion(#[from] VersionError),
	/// Response body did not match the expected JSON shape.
	#[error("Malformed `{endpoint}` payload.")]
	MalformedPayload {
		/// Endpoint label for diagnostics.
		endpoint: &'static str,
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// The redirect chain exceeded the follow limit.
	#[error("Too many redirects while probing the server.")]
	TooManyRedirects,
	/// Status code no step knows how to handle.
	#[error("Unhandled HTTP status code {status}.")]
	UnhandledHttpCode {
		/// Offending status code.
		status: u16,
	},
}
impl ProtocolError {
	fn code(&self) -> ResultCode {
		match self {
			Self::InstanceNotConfigured => ResultCode::InstanceNotConfigured,
			Self::MaintenanceMode => ResultCode::MaintenanceMode,
			Self::UntrustedDomain => ResultCode::UntrustedDomain,
			Self::NotFound { .. } => ResultCode::NotFound,
			Self::UnsupportedVersion { .. } | Self::InvalidVersion(_) =>
				ResultCode::BadServerVersion,
			Self::MalformedPayload { .. } => ResultCode::UnknownError,
			Self::TooManyRedirects => ResultCode::WrongConnection,
			Self::UnhandledHttpCode { .. } => ResultCode::UnhandledHttpCode,
		}
	}
}

/// Authorization failures.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum AuthError {
	/// Credentials were rejected by the server.
	#[error("Credentials were rejected.")]
	Unauthorized,
	/// An account with the same identity already exists.
	#[error("Account `{identity}` already exists.")]
	AccountNotNew {
		/// Identity that collided.
		identity: AccountIdentity,
	},
	/// The account targeted by an update no longer exists.
	#[error("Account `{identity}` no longer exists.")]
	AccountGone {
		/// Identity that vanished.
		identity: AccountIdentity,
	},
}
impl AuthError {
	fn code(&self) -> ResultCode {
		match self {
			Self::Unauthorized => ResultCode::Unauthorized,
			Self::AccountNotNew { .. } => ResultCode::AccountNotNew,
			Self::AccountGone { .. } => ResultCode::UnknownError,
		}
	}
}

/// Flow-control outcomes that end a step without being server failures.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ThisError)]
pub enum FlowError {
	/// A newer operation replaced this one; the stale result was discarded.
	#[error("Operation superseded by a newer request.")]
	Superseded,
	/// The owning flow was cancelled.
	#[error("Operation cancelled.")]
	Cancelled,
	/// A poll loop is already running for this session.
	#[error("Poll loop already running.")]
	AlreadyPolling,
	/// The configured poll deadline elapsed without completion.
	#[error("Poll deadline elapsed.")]
	PollExpired,
	/// The login-request response was missing its browser URL or token.
	#[error("Could not read login data from the server response.")]
	LoginDataUnreadable,
	/// A step that needs probe results ran before any probe succeeded.
	#[error("No server information available; probe the server first.")]
	MissingServerInfo,
}
impl FlowError {
	fn code(self) -> ResultCode {
		match self {
			Self::PollExpired => ResultCode::Timeout,
			Self::Superseded
			| Self::Cancelled
			| Self::AlreadyPolling
			| Self::LoginDataUnreadable
			| Self::MissingServerInfo => ResultCode::UnknownError,
		}
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn every_error_layer_maps_to_one_code() {
		assert_eq!(
			Error::from(TransportError::Timeout).code(),
			ResultCode::Timeout
		);
		assert_eq!(
			Error::from(ProtocolError::MaintenanceMode).code(),
			ResultCode::MaintenanceMode
		);
		assert_eq!(Error::from(AuthError::Unauthorized).code(), ResultCode::Unauthorized);
		assert_eq!(Error::from(FlowError::PollExpired).code(), ResultCode::Timeout);
		assert_eq!(
			Error::from(AddressError::LoginLinkTooShort).code(),
			ResultCode::IncorrectAddress
		);
	}

	#[test]
	fn unknown_errors_describe_with_the_wrapped_message() {
		let error = Error::from(StoreError::Backend { message: "disk full".into() });

		assert_eq!(error.code(), ResultCode::UnknownError);
		assert!(error.describe().contains("disk full"));

		let error = Error::from(TransportError::Timeout);

		assert_eq!(error.describe(), "The server took too long to respond");
	}
}
