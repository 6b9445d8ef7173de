//! Credential verification: user-info fetch plus root existence check, as one unit.
//!
//! The two remote calls run sequentially with the same credential pair; a permanent
//! redirect seen by either is carried forward into the verified base URL. The whole
//! verification is correlation-id guarded, so a cancelled or superseded check never
//! delivers results to a stale owner.

// self
use crate::{
	_prelude::*,
	auth::Credentials,
	error::{AuthError, FlowError, ProtocolError},
	flows::{Orchestrator, common},
	http::{HttpRequest, LoginHttpClient},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	server::ServerBranding,
	status::ResultCode,
};

const USER_INFO_PATH: &str = "ocs/v2.php/cloud/user?format=json";
const CAPABILITIES_PATH: &str = "ocs/v2.php/cloud/capabilities?format=json";
const DAV_FILES_PATH: &str = "remote.php/dav/files";
const OCS_API_REQUEST_HEADER: (&str, &str) = ("OCS-APIRequest", "true");

/// Outcome of a successful credential verification.
#[derive(Clone, Debug)]
pub struct VerifiedLogin {
	/// Base URL after any permanent redirect seen during verification.
	pub base_url: Url,
	/// Canonical user id reported by the server.
	pub user_id: String,
	/// Display name reported by the server.
	pub display_name: String,
	/// The credential pair that passed verification.
	pub credentials: Credentials,
}

#[derive(serde::Deserialize)]
struct UserEnvelope {
	ocs: UserOcs,
}
#[derive(serde::Deserialize)]
struct UserOcs {
	data: UserData,
}
#[derive(serde::Deserialize)]
struct UserData {
	id: String,
	#[serde(default, rename = "display-name", alias = "displayname")]
	display_name: Option<String>,
}

impl<C> Orchestrator<C>
where
	C: ?Sized + LoginHttpClient,
{
	/// Verifies a credential pair against a server.
	///
	/// Fetches the user info to validate the credentials and learn the canonical user
	/// id, then performs an existence check on the root resource with the same
	/// credentials. Results are delivered only when this verification is still the
	/// pending operation; see [`cancel_verification`](Self::cancel_verification).
	pub async fn verify_credentials(
		&self,
		base_url: &Url,
		credentials: Credentials,
	) -> Result<VerifiedLogin> {
		const KIND: FlowKind = FlowKind::Verify;

		let span = FlowSpan::new(KIND, "verify_credentials");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let op = self.ops.issue();

		self.state.lock().verifying = true;

		let result = span.instrument(self.verify_inner(base_url, credentials)).await;

		// Liveness check: deliver only while this is still the pending operation.
		if !self.ops.try_complete(op) {
			obs::record_flow_outcome(KIND, FlowOutcome::Failure);

			return Err(FlowError::Superseded.into());
		}

		{
			let mut state = self.state.lock();

			state.verifying = false;
			state.auth_status = Some(match &result {
				Ok(verified) =>
					if verified.base_url.scheme() == "https" {
						ResultCode::OkSsl
					} else {
						ResultCode::Ok
					},
				Err(e) => e.code(),
			});
		}

		match &result {
			Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Err(_) => obs::record_flow_outcome(KIND, FlowOutcome::Failure),
		}

		result
	}

	/// Cancels any in-flight verification; its result will not be delivered.
	pub fn cancel_verification(&self) {
		self.ops.cancel();
		self.state.lock().verifying = false;
	}

	/// Fetches server branding after a successful login, best-effort.
	///
	/// Branding is cosmetic, so every failure collapses to the default value.
	pub async fn fetch_branding(&self, base_url: &Url) -> ServerBranding {
		let Ok(url) = common::join_path(base_url, CAPABILITIES_PATH) else {
			return ServerBranding::default();
		};
		let request = HttpRequest::get(url)
			.with_header(OCS_API_REQUEST_HEADER.0, OCS_API_REQUEST_HEADER.1);

		match self.http_client.execute(request).await {
			Ok(response) if response.status == 200 =>
				ServerBranding::from_capabilities_json(&response.body),
			_ => ServerBranding::default(),
		}
	}

	async fn verify_inner(
		&self,
		base_url: &Url,
		credentials: Credentials,
	) -> Result<VerifiedLogin> {
		let user_url = common::join_path(base_url, USER_INFO_PATH).map_err(|source| {
			crate::address::AddressError::InvalidUrl { url: base_url.to_string(), source }
		})?;
		let request = HttpRequest::get(user_url)
			.with_header(OCS_API_REQUEST_HEADER.0, OCS_API_REQUEST_HEADER.1)
			.with_basic_auth(credentials.clone());
		let response = self.http_client.execute(request).await?;
		let payload: UserEnvelope = match response.status {
			200 => common::parse_json("cloud/user", &response.body)?,
			401 | 403 => return Err(AuthError::Unauthorized.into()),
			503 => return Err(ProtocolError::MaintenanceMode.into()),
			status => return Err(ProtocolError::UnhandledHttpCode { status }.into()),
		};
		let user = payload.ocs.data;
		let base_url = self.check_root_exists(base_url, &user.id, &credentials).await?;

		Ok(VerifiedLogin {
			base_url,
			display_name: user.display_name.unwrap_or_else(|| credentials.login_name.clone()),
			user_id: user.id,
			credentials,
		})
	}

	/// Existence check on the account's root resource, carrying forward any permanent
	/// redirect location.
	async fn check_root_exists(
		&self,
		base_url: &Url,
		user_id: &str,
		credentials: &Credentials,
	) -> Result<Url> {
		let mut verified_base = base_url.clone();
		let mut target =
			common::join_path(base_url, &format!("{DAV_FILES_PATH}/{user_id}")).map_err(
				|source| crate::address::AddressError::InvalidUrl {
					url: base_url.to_string(),
					source,
				},
			)?;

		for _ in 0..common::MAX_REDIRECTS {
			let request = HttpRequest::propfind(target.clone()).with_basic_auth(credentials.clone());
			let response = self.http_client.execute(request).await?;

			if response.is_redirect() {
				let location = response
					.header("location")
					.ok_or(ProtocolError::UnhandledHttpCode { status: response.status })?;
				let next = target.join(location).map_err(|source| {
					crate::address::AddressError::InvalidUrl { url: location.to_owned(), source }
				})?;

				if response.is_permanent_redirect() {
					verified_base = rebase_from_location(&next);
				}

				target = next;

				continue;
			}

			return match response.status {
				_ if response.is_success() => Ok(verified_base),
				401 | 403 => Err(AuthError::Unauthorized.into()),
				404 => Err(ProtocolError::NotFound { url: target.to_string() }.into()),
				status => Err(ProtocolError::UnhandledHttpCode { status }.into()),
			};
		}

		Err(ProtocolError::TooManyRedirects.into())
	}
}

/// Derives a base URL from a WebDAV location by cutting everything from
/// `/remote.php` on.
fn rebase_from_location(location: &Url) -> Url {
	let raw = location.as_str();
	let cut = raw.find("/remote.php").map(|position| &raw[..position]).unwrap_or(raw);

	Url::parse(crate::address::normalize_url_suffix(cut)).unwrap_or_else(|_| location.clone())
}
