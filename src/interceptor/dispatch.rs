// Request dispatch
// Header merging, bearer injection and the single transport call per attempt

use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, Request, Response, Url};
use serde::Serialize;
use std::sync::Arc;

use crate::auth::CredentialHolder;
use crate::error::{FetchError, Result};
use crate::transport::Transport;

/// Caller's description of one logical call.
///
/// Never mutated by the pipeline: every attempt derives a fresh outgoing
/// request from it, so a retry starts from exactly what the caller supplied.
#[derive(Debug, Clone)]
pub struct AuthRequest {
    method: Method,
    url: Url,

    /// Headers carried by a request-like input
    base_headers: HeaderMap,

    /// Headers supplied explicitly for this call; win over `base_headers`
    headers: HeaderMap,

    body: Option<Bytes>,

    /// Bypass credential injection and the refresh/retry pipeline
    skip_auth: bool,
}

impl AuthRequest {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            base_headers: HeaderMap::new(),
            headers: HeaderMap::new(),
            body: None,
            skip_auth: false,
        }
    }

    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: Url) -> Self {
        Self::new(Method::POST, url)
    }

    /// Adopt an already built request: its headers become the defaults that
    /// explicit headers are layered over.
    ///
    /// Only in-memory bodies are accepted since the request may be sent twice.
    pub fn from_request(request: Request) -> Result<Self> {
        let body = match request.body() {
            None => None,
            Some(body) => Some(body.as_bytes().map(Bytes::copy_from_slice).ok_or_else(|| {
                FetchError::InvalidRequest("streaming request bodies cannot be replayed".to_string())
            })?),
        };

        Ok(Self {
            method: request.method().clone(),
            url: request.url().clone(),
            base_headers: request.headers().clone(),
            headers: HeaderMap::new(),
            body,
            skip_auth: false,
        })
    }

    /// Set an explicit header, replacing any earlier value for the same name
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Like [`AuthRequest::header`] but parses name and value
    pub fn try_header(self, name: &str, value: &str) -> Result<Self> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| FetchError::InvalidRequest(format!("header name {:?}: {}", name, e)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| FetchError::InvalidRequest(format!("header {}: {}", name, e)))?;
        Ok(self.header(name, value))
    }

    /// Layer a whole header map over the explicit headers
    pub fn headers(mut self, headers: HeaderMap) -> Self {
        overlay(&mut self.headers, &headers);
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Serialize `value` as the body; sets `Content-Type` unless already given
    pub fn json<T: Serialize + ?Sized>(mut self, value: &T) -> Result<Self> {
        let body = serde_json::to_vec(value)
            .map_err(|e| FetchError::InvalidRequest(format!("JSON body: {}", e)))?;
        if !self.headers.contains_key(CONTENT_TYPE) && !self.base_headers.contains_key(CONTENT_TYPE) {
            self.headers
                .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }
        self.body = Some(body.into());
        Ok(self)
    }

    pub fn skip_auth(mut self, skip: bool) -> Self {
        self.skip_auth = skip;
        self
    }

    pub fn is_skip_auth(&self) -> bool {
        self.skip_auth
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Base headers with explicit headers layered on top (no credential)
    pub fn merged_headers(&self) -> HeaderMap {
        let mut merged = self.base_headers.clone();
        overlay(&mut merged, &self.headers);
        merged
    }

    /// Build the outgoing request for one attempt
    pub(crate) fn to_request(&self, credential: Option<&str>) -> Result<Request> {
        let mut headers = self.merged_headers();

        if let Some(token) = credential.filter(|_| !self.skip_auth) {
            if !headers.contains_key(AUTHORIZATION) {
                headers.insert(AUTHORIZATION, bearer(token)?);
            }
        }

        let mut request = Request::new(self.method.clone(), self.url.clone());
        *request.headers_mut() = headers;
        if let Some(body) = &self.body {
            *request.body_mut() = Some(body.clone().into());
        }
        Ok(request)
    }
}

/// Replace every name present in `overrides`, keeping all of its values.
/// Header names are case-insensitive, so `x-id` overrides `X-Id`.
fn overlay(target: &mut HeaderMap, overrides: &HeaderMap) {
    for name in overrides.keys() {
        target.remove(name);
        for value in overrides.get_all(name) {
            target.append(name.clone(), value.clone());
        }
    }
}

fn bearer(token: &str) -> Result<HeaderValue> {
    let mut value = HeaderValue::from_str(&format!("Bearer {}", token)).map_err(|_| {
        FetchError::InvalidRequest("access token is not a valid header value".to_string())
    })?;
    value.set_sensitive(true);
    Ok(value)
}

/// Sends one attempt of an [`AuthRequest`] through the transport
pub struct Dispatcher {
    transport: Arc<dyn Transport>,
    holder: CredentialHolder,
}

impl Dispatcher {
    pub fn new(transport: Arc<dyn Transport>, holder: CredentialHolder) -> Self {
        Self { transport, holder }
    }

    /// Issue `request` with the credential current at call time.
    /// The response is returned untouched whatever its status.
    pub async fn dispatch(&self, request: &AuthRequest) -> Result<Response> {
        let credential = if request.is_skip_auth() {
            None
        } else {
            self.holder.get().await
        };

        let outgoing = request.to_request(credential.as_deref())?;
        tracing::debug!(
            method = %outgoing.method(),
            url = %outgoing.url(),
            authorized = outgoing.headers().contains_key(AUTHORIZATION),
            "Sending HTTP request"
        );

        let response = self.transport.execute(outgoing).await?;
        tracing::debug!(status = %response.status(), "Received HTTP response");
        Ok(response)
    }
}
