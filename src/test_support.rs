// Scripted transport and redirect recorder shared by unit tests

use bytes::Bytes;
use futures::future::BoxFuture;
use reqwest::header::HeaderMap;
use reqwest::{Method, Request, Response, Url};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::redirect::LoginRedirect;
use crate::transport::Transport;

/// What the transport saw for one call
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
}

impl RecordedRequest {
    pub fn path(&self) -> &str {
        self.url.path()
    }

    pub fn authorization(&self) -> Option<&str> {
        self.headers
            .get(reqwest::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
    }
}

/// Canned transport outcome
pub enum MockReply {
    Status {
        status: u16,
        body: String,
        delay: Option<Duration>,
    },
    Unreachable,
}

impl MockReply {
    pub fn status(status: u16) -> Self {
        MockReply::Status {
            status,
            body: String::new(),
            delay: None,
        }
    }

    pub fn json(status: u16, body: serde_json::Value) -> Self {
        MockReply::Status {
            status,
            body: body.to_string(),
            delay: None,
        }
    }

    pub fn body(status: u16, body: &str) -> Self {
        MockReply::Status {
            status,
            body: body.to_string(),
            delay: None,
        }
    }

    /// Hold the reply back; with a paused clock this resolves only once every
    /// other task is idle.
    pub fn delayed(self, by: Duration) -> Self {
        match self {
            MockReply::Status { status, body, .. } => MockReply::Status {
                status,
                body,
                delay: Some(by),
            },
            other => other,
        }
    }
}

type Handler = dyn Fn(&RecordedRequest) -> MockReply + Send + Sync;

/// Transport answering from a closure and recording every call
pub struct MockTransport {
    handler: Box<Handler>,
    calls: Mutex<Vec<RecordedRequest>>,
}

impl MockTransport {
    pub fn new(handler: impl Fn(&RecordedRequest) -> MockReply + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            handler: Box::new(handler),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<RecordedRequest> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, path: &str) -> Vec<RecordedRequest> {
        self.calls()
            .into_iter()
            .filter(|c| c.path() == path)
            .collect()
    }
}

impl Transport for MockTransport {
    fn execute(&self, request: Request) -> BoxFuture<'_, reqwest::Result<Response>> {
        let recorded = RecordedRequest {
            method: request.method().clone(),
            url: request.url().clone(),
            headers: request.headers().clone(),
            body: request
                .body()
                .and_then(|b| b.as_bytes())
                .map(Bytes::copy_from_slice),
        };
        let reply = (self.handler)(&recorded);
        self.calls.lock().unwrap().push(recorded);

        Box::pin(async move {
            match reply {
                MockReply::Status {
                    status,
                    body,
                    delay,
                } => {
                    if let Some(delay) = delay {
                        tokio::time::sleep(delay).await;
                    }
                    let response = http::Response::builder()
                        .status(status)
                        .header("content-type", "application/json")
                        .body(body)
                        .unwrap();
                    Ok(Response::from(response))
                }
                MockReply::Unreachable => Err(unreachable_error()),
            }
        })
    }
}

/// A genuine `reqwest::Error` without touching the network
pub fn unreachable_error() -> reqwest::Error {
    reqwest::Client::new()
        .get("::not a url::")
        .build()
        .unwrap_err()
}

/// Redirect sink that remembers where it was sent
#[derive(Default)]
pub struct RecordingRedirect {
    visits: Mutex<Vec<String>>,
}

impl RecordingRedirect {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn visits(&self) -> Vec<String> {
        self.visits.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.visits.lock().unwrap().len()
    }
}

impl LoginRedirect for RecordingRedirect {
    fn redirect(&self, path: &str) {
        self.visits.lock().unwrap().push(path.to_string());
    }
}

pub fn base_url() -> Url {
    Url::parse("http://app.test").unwrap()
}
