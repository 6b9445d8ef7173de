//! Transport primitives for the login wire protocol.
//!
//! [`LoginHttpClient`] is the broker's only dependency on an HTTP stack: anonymous
//! POSTs for the login request, form POSTs for poll ticks, GETs for status and
//! capabilities, and PROPFIND for the root existence check all travel through one
//! `execute` seam. Implementations must never follow redirects on their own; the
//! capability prober follows them manually so permanent relocations stay observable.

// std
use std::borrow::Cow;
// self
use crate::{_prelude::*, auth::Credentials, error::TransportError, trust::CertificateChain};

/// Connect deadline applied by the default transport.
pub const DEFAULT_CONNECT_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);
/// Whole-request deadline applied by the default transport.
pub const DEFAULT_READ_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

/// Request methods used by the login flows.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HttpMethod {
	/// Plain GET.
	Get,
	/// POST with an empty or form-encoded body.
	Post,
	/// WebDAV PROPFIND, used for the root existence check.
	Propfind,
}
impl HttpMethod {
	/// Wire name of the method.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Get => "GET",
			Self::Post => "POST",
			Self::Propfind => "PROPFIND",
		}
	}
}

/// Request body shapes used by the login flows.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RequestBody {
	/// No body; POSTs still advertise a form content type.
	Empty,
	/// `application/x-www-form-urlencoded` key/value pairs.
	Form(Vec<(String, String)>),
}

/// A single outbound request.
#[derive(Clone, Debug)]
pub struct HttpRequest {
	/// Request method.
	pub method: HttpMethod,
	/// Absolute request URL.
	pub url: Url,
	/// Additional headers.
	pub headers: Vec<(String, String)>,
	/// Request body.
	pub body: RequestBody,
	/// Optional HTTP Basic credentials.
	pub basic_auth: Option<Credentials>,
}
impl HttpRequest {
	/// Builds an unauthenticated GET.
	pub fn get(url: Url) -> Self {
		Self { method: HttpMethod::Get, url, headers: Vec::new(), body: RequestBody::Empty, basic_auth: None }
	}

	/// Builds an anonymous POST with an empty form body.
	pub fn post_anonymous(url: Url) -> Self {
		Self { method: HttpMethod::Post, url, headers: Vec::new(), body: RequestBody::Empty, basic_auth: None }
	}

	/// Builds an anonymous form POST.
	pub fn post_form(url: Url, fields: Vec<(String, String)>) -> Self {
		Self {
			method: HttpMethod::Post,
			url,
			headers: Vec::new(),
			body: RequestBody::Form(fields),
			basic_auth: None,
		}
	}

	/// Builds a PROPFIND against a WebDAV resource.
	pub fn propfind(url: Url) -> Self {
		Self {
			method: HttpMethod::Propfind,
			url,
			headers: vec![("Depth".into(), "0".into())],
			body: RequestBody::Empty,
			basic_auth: None,
		}
	}

	/// Appends a header.
	pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.headers.push((name.into(), value.into()));

		self
	}

	/// Attaches HTTP Basic credentials.
	pub fn with_basic_auth(mut self, credentials: Credentials) -> Self {
		self.basic_auth = Some(credentials);

		self
	}
}

/// A received response, fully buffered.
#[derive(Clone, Debug)]
pub struct HttpResponse {
	/// HTTP status code.
	pub status: u16,
	/// Response headers in arrival order.
	pub headers: Vec<(String, String)>,
	/// Raw response body.
	pub body: Vec<u8>,
}
impl HttpResponse {
	/// Returns the first header with the given name, case-insensitively.
	pub fn header(&self, name: &str) -> Option<&str> {
		self.headers
			.iter()
			.find(|(key, _)| key.eq_ignore_ascii_case(name))
			.map(|(_, value)| value.as_str())
	}

	/// Returns the body as text, lossily.
	pub fn text(&self) -> Cow<'_, str> {
		String::from_utf8_lossy(&self.body)
	}

	/// Returns `true` for 2xx statuses (207 included, for WebDAV multistatus).
	pub fn is_success(&self) -> bool {
		(200..300).contains(&self.status)
	}

	/// Returns `true` for permanent redirect statuses (301, 308).
	pub fn is_permanent_redirect(&self) -> bool {
		matches!(self.status, 301 | 308)
	}

	/// Returns `true` for any redirect status carrying a `Location` header.
	pub fn is_redirect(&self) -> bool {
		matches!(self.status, 301 | 302 | 303 | 307 | 308)
	}
}

/// Boxed response future returned by [`LoginHttpClient::execute`].
pub type HttpFuture<'a> =
	Pin<Box<dyn Future<Output = Result<HttpResponse, TransportError>> + 'a + Send>>;

/// Abstraction over HTTP transports capable of executing login-protocol requests.
///
/// Implementations must be `Send + Sync + 'static` so one client can be shared across
/// the orchestrator and its background flows, and must surface failures through the
/// [`TransportError`] taxonomy so trust negotiation and status badges keep working
/// with custom stacks.
pub trait LoginHttpClient
where
	Self: 'static + Send + Sync,
{
	/// Executes a single request without following redirects.
	fn execute(&self, request: HttpRequest) -> HttpFuture<'_>;
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
///
/// The wrapped client is built with redirect following disabled and the default
/// connect/read deadlines. Callers providing their own [`ReqwestClient`] must disable
/// redirects as well, otherwise permanent relocations become invisible to the prober.
#[cfg(feature = "reqwest")]
#[derive(Clone)]
pub struct ReqwestHttpClient(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestHttpClient {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}
}
#[cfg(feature = "reqwest")]
impl Default for ReqwestHttpClient {
	fn default() -> Self {
		let client = ReqwestClient::builder()
			.redirect(reqwest::redirect::Policy::none())
			.connect_timeout(DEFAULT_CONNECT_TIMEOUT)
			.timeout(DEFAULT_READ_TIMEOUT)
			.build()
			.unwrap_or_default();

		Self(client)
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestHttpClient {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl LoginHttpClient for ReqwestHttpClient {
	fn execute(&self, request: HttpRequest) -> HttpFuture<'_> {
		let client = self.0.clone();

		Box::pin(async move {
			let method = reqwest::Method::from_bytes(request.method.as_str().as_bytes())
				.map_err(TransportError::network)?;
			let mut builder = client.request(method, request.url.clone());

			for (name, value) in &request.headers {
				builder = builder.header(name, value);
			}
			if let Some(credentials) = &request.basic_auth {
				builder =
					builder.basic_auth(&credentials.login_name, Some(credentials.secret.expose()));
			}

			builder = match &request.body {
				RequestBody::Empty => match request.method {
					// An empty form keeps the content type the poll endpoints expect.
					HttpMethod::Post => builder.form(&Vec::<(String, String)>::new()),
					_ => builder,
				},
				RequestBody::Form(fields) => builder.form(fields),
			};

			let response = match builder.send().await {
				Ok(response) => response,
				Err(e) => return Err(classify_reqwest_error(&request.url, e)),
			};
			let status = response.status().as_u16();
			let headers = response
				.headers()
				.iter()
				.map(|(name, value)| {
					(name.as_str().to_owned(), String::from_utf8_lossy(value.as_bytes()).into_owned())
				})
				.collect();
			let body = response
				.bytes()
				.await
				.map_err(|e| classify_reqwest_error(&request.url, e))?
				.to_vec();

			Ok(HttpResponse { status, headers, body })
		})
	}
}

/// Sorts a reqwest failure into the transport taxonomy.
///
/// reqwest flattens TLS and DNS causes into opaque source chains, so classification
/// inspects the chain's rendered messages. Certificate failures surface as
/// [`TransportError::PeerUnverified`] with an opaque chain; transports that can
/// capture the presented certificates should build richer chains themselves.
#[cfg(feature = "reqwest")]
fn classify_reqwest_error(url: &Url, error: ReqwestError) -> TransportError {
	let host = url.host_str().unwrap_or_default().to_owned();

	if error.is_timeout() {
		return TransportError::Timeout;
	}

	let chain_text = {
		let mut text = error.to_string().to_ascii_lowercase();
		let mut source = StdError::source(&error);

		while let Some(cause) = source {
			text.push('\n');
			text.push_str(&cause.to_string().to_ascii_lowercase());
			source = cause.source();
		}

		text
	};

	if chain_text.contains("certificate") || chain_text.contains("unknownissuer") {
		return TransportError::PeerUnverified { chain: CertificateChain::opaque(host) };
	}
	if chain_text.contains("tls") || chain_text.contains("handshake") {
		return TransportError::Tls { source: Box::new(error) };
	}
	if chain_text.contains("dns") || chain_text.contains("resolve") || chain_text.contains("lookup")
	{
		return TransportError::HostUnresolved { host };
	}
	if error.is_connect() {
		return TransportError::Connect { source: Box::new(error) };
	}

	TransportError::network(error)
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn response_header_lookup_is_case_insensitive() {
		let response = HttpResponse {
			status: 401,
			headers: vec![("WWW-Authenticate".into(), "Basic realm=\"files\"".into())],
			body: Vec::new(),
		};

		assert_eq!(response.header("www-authenticate"), Some("Basic realm=\"files\""));
		assert_eq!(response.header("location"), None);
	}

	#[test]
	fn redirect_predicates_distinguish_permanence() {
		let mut response = HttpResponse { status: 301, headers: Vec::new(), body: Vec::new() };

		assert!(response.is_redirect());
		assert!(response.is_permanent_redirect());

		response.status = 302;

		assert!(response.is_redirect());
		assert!(!response.is_permanent_redirect());

		response.status = 200;

		assert!(!response.is_redirect());
		assert!(response.is_success());
	}

	#[test]
	fn propfind_requests_carry_depth_zero() {
		let request = HttpRequest::propfind(
			Url::parse("https://example.com/remote.php/dav/files/alice")
				.expect("PROPFIND URL fixture should parse."),
		);

		assert_eq!(request.method, HttpMethod::Propfind);
		assert_eq!(request.headers, vec![("Depth".to_owned(), "0".to_owned())]);
	}
}
