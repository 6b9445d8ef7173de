//! Capability probe: reachability, TLS posture, version, and auth method.
//!
//! Every probe is tagged with a fresh correlation id; only the most recently issued
//! id may publish its result into the session state. A user who edits the address
//! while a probe is in flight simply starts a newer probe — the older response is
//! discarded, never merged.

// self
use crate::{
	_prelude::*,
	address::{self, AddressError},
	error::{FlowError, ProtocolError},
	flows::{Orchestrator, common},
	http::{HttpRequest, HttpResponse, LoginHttpClient},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	server::{AuthenticationMethod, ServerInfo, StatusPayload},
};

const STATUS_PATH: &str = "status.php";
const WEBDAV_ROOT_PATH: &str = "remote.php/webdav";

impl<C> Orchestrator<C>
where
	C: ?Sized + LoginHttpClient,
{
	/// Probes a user-supplied address and publishes the result into the session.
	///
	/// The address runs through the full normalization pipeline first. If the server
	/// answered a permanent redirect, the redirect target (WebDAV suffix stripped)
	/// becomes the new candidate base URL carried in the returned [`ServerInfo`].
	/// When a newer probe was issued while this one was in flight, the stale result
	/// is discarded and [`FlowError::Superseded`] is returned instead.
	pub async fn probe_server(&self, address: &str) -> Result<ServerInfo> {
		const KIND: FlowKind = FlowKind::Probe;

		let span = FlowSpan::new(KIND, "probe_server");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span.instrument(self.probe_server_inner(address)).await;

		match &result {
			Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Err(_) => obs::record_flow_outcome(KIND, FlowOutcome::Failure),
		}

		result
	}

	/// Re-runs the probe with the retained candidate address.
	///
	/// This is the re-entry point after an accepted certificate: the user never has
	/// to type the address again.
	pub async fn retry_probe(&self) -> Result<ServerInfo> {
		let address = self
			.state
			.lock()
			.candidate_address
			.clone()
			.ok_or(FlowError::MissingServerInfo)?;

		self.probe_server(&address).await
	}

	async fn probe_server_inner(&self, address: &str) -> Result<ServerInfo> {
		let normalized = address::normalize(address, self.descriptor.default_scheme)?;
		let explicit_insecure = normalized.starts_with("http://");

		{
			let mut state = self.state.lock();

			state.candidate_address = Some(normalized.clone());
			state.explicit_insecure = explicit_insecure;
			state.server_status = None;
		}

		let op = self.ops.issue();
		let probed = self.fetch_server_info(&normalized).await;

		// Last-request-wins: a superseded probe must not touch the session.
		if !self.ops.try_complete(op) {
			return Err(FlowError::Superseded.into());
		}

		let mut state = self.state.lock();

		match probed {
			Ok(info) => {
				state.server_status = Some(info.status(explicit_insecure));
				state.server_info = Some(info.clone());

				Ok(info)
			},
			Err(e) => {
				state.server_status = Some(e.code());
				state.server_info = None;

				Err(e)
			},
		}
	}

	async fn fetch_server_info(&self, normalized: &str) -> Result<ServerInfo> {
		let base_url = Url::parse(normalized).map_err(|source| AddressError::InvalidUrl {
			url: normalized.to_owned(),
			source,
		})?;
		let started_secure = base_url.scheme() == "https";
		let (response, final_base) = self.fetch_status(&base_url).await?;
		let payload = match response.status {
			200 => common::parse_json::<StatusPayload>(STATUS_PATH, &response.body)
				.map_err(|_| ProtocolError::InstanceNotConfigured)?,
			404 => return Err(ProtocolError::NotFound { url: final_base.to_string() }.into()),
			503 => return Err(ProtocolError::MaintenanceMode.into()),
			status => return Err(ProtocolError::UnhandledHttpCode { status }.into()),
		};

		if payload.maintenance {
			return Err(ProtocolError::MaintenanceMode.into());
		}
		if !payload.installed {
			return Err(ProtocolError::InstanceNotConfigured.into());
		}

		let version: crate::server::ServerVersion =
			payload.version.parse().map_err(ProtocolError::InvalidVersion)?;

		if !version.is_supported() {
			return Err(ProtocolError::UnsupportedVersion { found: version }.into());
		}

		let auth_method = self.detect_auth_method(&final_base).await;

		Ok(ServerInfo {
			redirected_from_secure: started_secure && final_base.scheme() == "http",
			base_url: final_base,
			version,
			auth_method,
			has_extended_support: payload.extended_support,
		})
	}

	/// Fetches `status.php`, following redirects manually so permanent relocations
	/// can rebase the candidate base URL.
	async fn fetch_status(&self, base_url: &Url) -> Result<(HttpResponse, Url)> {
		let mut candidate_base = base_url.clone();
		let mut target = common::join_path(base_url, STATUS_PATH).map_err(|source| {
			AddressError::InvalidUrl { url: base_url.to_string(), source }
		})?;

		for _ in 0..common::MAX_REDIRECTS {
			let response = self.http_client.execute(HttpRequest::get(target.clone())).await?;

			if !response.is_redirect() {
				return Ok((response, candidate_base));
			}

			let location = response
				.header("location")
				.ok_or(ProtocolError::UnhandledHttpCode { status: response.status })?;
			let next = target.join(location).map_err(|source| AddressError::InvalidUrl {
				url: location.to_owned(),
				source,
			})?;

			if response.is_permanent_redirect() {
				candidate_base = rebase_from_status_url(&next);
			}

			target = next;
		}

		Err(ProtocolError::TooManyRedirects.into())
	}

	/// Detects the required authentication method from an anonymous WebDAV request.
	///
	/// Detection is best-effort: transport failures here must not fail a probe that
	/// already established reachability and version.
	async fn detect_auth_method(&self, base_url: &Url) -> AuthenticationMethod {
		let Ok(url) = common::join_path(base_url, WEBDAV_ROOT_PATH) else {
			return AuthenticationMethod::Unknown;
		};

		match self.http_client.execute(HttpRequest::propfind(url)).await {
			Ok(response) if response.status == 401 =>
				AuthenticationMethod::from_www_authenticate(response.header("www-authenticate")),
			Ok(response) if response.is_success() => AuthenticationMethod::None,
			_ => AuthenticationMethod::Unknown,
		}
	}
}

/// Derives the new candidate base URL from a redirected `status.php` location.
fn rebase_from_status_url(status_url: &Url) -> Url {
	let raw = status_url.as_str();
	let cut = raw
		.strip_suffix(&format!("/{STATUS_PATH}"))
		.unwrap_or(raw);

	Url::parse(address::normalize_url_suffix(cut)).unwrap_or_else(|_| status_url.clone())
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn rebase_strips_the_status_suffix_and_webdav_paths() {
		let moved = Url::parse("https://moved.example.com/status.php")
			.expect("Status URL fixture should parse.");

		assert_eq!(rebase_from_status_url(&moved).as_str(), "https://moved.example.com/");

		let nested = Url::parse("https://example.com/cloud/status.php")
			.expect("Status URL fixture should parse.");

		assert_eq!(rebase_from_status_url(&nested).as_str(), "https://example.com/cloud");
	}
}
