//! Closed result-code taxonomy shared by every login step.
//!
//! Each code carries a fixed [`StatusBadge`] (icon + short text) so hosting UIs can
//! render probe, poll, and verification outcomes without interpreting raw errors.

// self
use crate::_prelude::*;

/// Outcome classification for every remote step of the login state machine.
///
/// The set is closed on purpose: callers match exhaustively and the display mapping
/// in [`badge`](Self::badge) never falls through to a formatted error string.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultCode {
	/// Connection succeeded over plain HTTP against an explicit `http://` address.
	Ok,
	/// Connection succeeded over TLS.
	OkSsl,
	/// Connection succeeded but the server does not offer TLS.
	OkNoSsl,
	/// Connection succeeded only after a permanent redirect onto plain HTTP.
	OkRedirectToNonSecure,

	/// Device has no usable network route.
	NoNetworkConnection,
	/// Connect or read deadline elapsed.
	Timeout,
	/// Host name could not be resolved.
	HostNotAvailable,

	/// The address is syntactically invalid.
	IncorrectAddress,
	/// A connection was attempted but refused or reset.
	WrongConnection,
	/// The probed path exists on the host but the resource does not.
	NotFound,
	/// The server responded but is not set up yet.
	InstanceNotConfigured,

	/// Certificate validation failed in a way the user may explicitly override.
	SslRecoverablePeerUnverified,
	/// Any other TLS failure.
	SslError,

	/// Server version is below the supported minimum.
	BadServerVersion,
	/// Server answered with a status code no step knows how to handle.
	UnhandledHttpCode,
	/// Server is in maintenance mode.
	MaintenanceMode,
	/// Server rejected the request because the domain is not trusted.
	UntrustedDomain,

	/// Credentials were rejected.
	Unauthorized,
	/// The delegated login provider reported an error.
	OauthError,
	/// The user denied access at the delegated login provider.
	OauthAccessDenied,
	/// An account with the same identity already exists.
	AccountNotNew,

	/// Anything else; display text comes from the wrapped error message.
	UnknownError,
}
impl ResultCode {
	/// Returns `true` for the four success variants.
	pub const fn is_success(self) -> bool {
		matches!(self, Self::Ok | Self::OkSsl | Self::OkNoSsl | Self::OkRedirectToNonSecure)
	}

	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Ok => "ok",
			Self::OkSsl => "ok_ssl",
			Self::OkNoSsl => "ok_no_ssl",
			Self::OkRedirectToNonSecure => "ok_redirect_to_non_secure",
			Self::NoNetworkConnection => "no_network_connection",
			Self::Timeout => "timeout",
			Self::HostNotAvailable => "host_not_available",
			Self::IncorrectAddress => "incorrect_address",
			Self::WrongConnection => "wrong_connection",
			Self::NotFound => "not_found",
			Self::InstanceNotConfigured => "instance_not_configured",
			Self::SslRecoverablePeerUnverified => "ssl_recoverable_peer_unverified",
			Self::SslError => "ssl_error",
			Self::BadServerVersion => "bad_server_version",
			Self::UnhandledHttpCode => "unhandled_http_code",
			Self::MaintenanceMode => "maintenance_mode",
			Self::UntrustedDomain => "untrusted_domain",
			Self::Unauthorized => "unauthorized",
			Self::OauthError => "oauth_error",
			Self::OauthAccessDenied => "oauth_access_denied",
			Self::AccountNotNew => "account_not_new",
			Self::UnknownError => "unknown_error",
		}
	}

	/// Returns the fixed icon + short-text pair rendered for this code.
	pub const fn badge(self) -> StatusBadge {
		match self {
			Self::Ok => StatusBadge::new(StatusIcon::Ok, "Connection established"),
			Self::OkSsl => StatusBadge::new(StatusIcon::Lock, "Secure connection established"),
			Self::OkNoSsl =>
				StatusBadge::new(StatusIcon::LockOpen, "Connection established over plain HTTP"),
			Self::OkRedirectToNonSecure => StatusBadge::new(
				StatusIcon::LockOpen,
				"Secure address redirected to an unencrypted route",
			),
			Self::NoNetworkConnection =>
				StatusBadge::new(StatusIcon::NoNetwork, "No network connection"),
			Self::Timeout =>
				StatusBadge::new(StatusIcon::Alert, "The server took too long to respond"),
			Self::HostNotAvailable => StatusBadge::new(StatusIcon::Alert, "Unknown host"),
			Self::IncorrectAddress =>
				StatusBadge::new(StatusIcon::Alert, "Malformed server address"),
			Self::WrongConnection =>
				StatusBadge::new(StatusIcon::Alert, "Could not establish connection"),
			Self::NotFound => StatusBadge::new(StatusIcon::Alert, "Wrong path, server not found"),
			Self::InstanceNotConfigured =>
				StatusBadge::new(StatusIcon::Alert, "Server is not configured yet"),
			Self::SslRecoverablePeerUnverified =>
				StatusBadge::new(StatusIcon::Alert, "Identity of the server could not be verified"),
			Self::SslError => StatusBadge::new(StatusIcon::Alert, "Secure connection failed"),
			Self::BadServerVersion =>
				StatusBadge::new(StatusIcon::Alert, "Server version is not supported"),
			Self::UnhandledHttpCode =>
				StatusBadge::new(StatusIcon::Alert, "Unexpected answer from the server"),
			Self::MaintenanceMode =>
				StatusBadge::new(StatusIcon::Alert, "Server is in maintenance mode"),
			Self::UntrustedDomain =>
				StatusBadge::new(StatusIcon::Alert, "Server does not trust this domain"),
			Self::Unauthorized => StatusBadge::new(StatusIcon::Alert, "Wrong username or password"),
			Self::OauthError => StatusBadge::new(StatusIcon::Alert, "Delegated login failed"),
			Self::OauthAccessDenied =>
				StatusBadge::new(StatusIcon::Alert, "Access denied by the login provider"),
			Self::AccountNotNew =>
				StatusBadge::new(StatusIcon::Alert, "An account for this user already exists"),
			Self::UnknownError => StatusBadge::new(StatusIcon::Alert, "Unknown error"),
		}
	}
}
impl Display for ResultCode {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Icon slot rendered next to a status line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusIcon {
	/// Plain success check mark.
	Ok,
	/// Closed padlock (TLS verified).
	Lock,
	/// Open padlock (plaintext route).
	LockOpen,
	/// Generic warning triangle.
	Alert,
	/// Crossed-out network indicator.
	NoNetwork,
}

/// Fixed (icon, short text) pair for a [`ResultCode`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StatusBadge {
	/// Icon slot.
	pub icon: StatusIcon,
	/// Short, user-facing description.
	pub text: &'static str,
}
impl StatusBadge {
	const fn new(icon: StatusIcon, text: &'static str) -> Self {
		Self { icon, text }
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn success_variants_are_the_only_successes() {
		let successes = [
			ResultCode::Ok,
			ResultCode::OkSsl,
			ResultCode::OkNoSsl,
			ResultCode::OkRedirectToNonSecure,
		];

		for code in successes {
			assert!(code.is_success());
		}

		assert!(!ResultCode::Unauthorized.is_success());
		assert!(!ResultCode::MaintenanceMode.is_success());
	}

	#[test]
	fn badges_pin_icons_to_codes() {
		assert_eq!(ResultCode::OkSsl.badge().icon, StatusIcon::Lock);
		assert_eq!(ResultCode::OkNoSsl.badge().icon, StatusIcon::LockOpen);
		assert_eq!(ResultCode::NoNetworkConnection.badge().icon, StatusIcon::NoNetwork);
		assert_eq!(ResultCode::AccountNotNew.badge().icon, StatusIcon::Alert);
	}

	#[test]
	fn codes_round_trip_through_serde() {
		let payload = serde_json::to_string(&ResultCode::SslRecoverablePeerUnverified)
			.expect("Result code should serialize to JSON.");

		assert_eq!(payload, "\"ssl_recoverable_peer_unverified\"");

		let round_trip: ResultCode =
			serde_json::from_str(&payload).expect("Serialized code should deserialize from JSON.");

		assert_eq!(round_trip, ResultCode::SslRecoverablePeerUnverified);
	}
}
