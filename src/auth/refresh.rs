// Token refresh logic
// At most one refresh request is in flight per coordinator; late arrivals join it

use futures::future::{BoxFuture, FutureExt, Shared};
use reqwest::header::{HeaderValue, ACCEPT};
use reqwest::{Method, Request, Url};
use std::sync::{Arc, Mutex, MutexGuard};

use super::credentials::{redact, CredentialHolder};
use super::types::RefreshResponse;
use crate::error::RefreshError;
use crate::transport::Transport;

/// Default refresh endpoint path
pub const REFRESH_PATH: &str = "/auth/refresh";

type RefreshFuture = Shared<BoxFuture<'static, Result<String, RefreshError>>>;

/// Pending-refresh slot. `epoch` identifies which refresh owns `pending`, so
/// a settling refresh only clears its own entry.
#[derive(Default)]
struct InFlight {
    epoch: u64,
    pending: Option<RefreshFuture>,
}

/// Single-flight credential refresher
pub struct RefreshCoordinator {
    /// Raw transport; refresh calls never pass through credential injection
    transport: Arc<dyn Transport>,

    holder: CredentialHolder,

    refresh_url: Url,

    in_flight: Arc<Mutex<InFlight>>,
}

impl RefreshCoordinator {
    pub fn new(transport: Arc<dyn Transport>, holder: CredentialHolder, refresh_url: Url) -> Self {
        Self {
            transport,
            holder,
            refresh_url,
            in_flight: Arc::new(Mutex::new(InFlight::default())),
        }
    }

    pub fn refresh_url(&self) -> &Url {
        &self.refresh_url
    }

    /// Whether a refresh is currently pending
    pub fn is_refreshing(&self) -> bool {
        lock(&self.in_flight).pending.is_some()
    }

    /// Renew the access token.
    ///
    /// Joins the pending refresh if there is one, otherwise starts a new one.
    /// On success the holder carries the new token; on failure it is cleared.
    pub async fn refresh(&self) -> Result<String, RefreshError> {
        self.join_or_start().await
    }

    fn join_or_start(&self) -> RefreshFuture {
        let mut slot = lock(&self.in_flight);

        if let Some(pending) = slot.pending.as_ref() {
            tracing::debug!(epoch = slot.epoch, "Joining in-flight token refresh");
            return pending.clone();
        }

        slot.epoch += 1;
        let epoch = slot.epoch;

        let transport = self.transport.clone();
        let holder = self.holder.clone();
        let url = self.refresh_url.clone();
        let in_flight = self.in_flight.clone();

        let future = async move {
            tracing::debug!(epoch, url = %url, "Refreshing access token...");

            let outcome = request_token(transport.as_ref(), &url).await;
            match &outcome {
                Ok(token) => {
                    holder.set(Some(token.clone())).await;
                    tracing::info!(epoch, token = %redact(token), "Access token refreshed");
                }
                Err(e) => {
                    holder.clear().await;
                    tracing::error!(epoch, error = %e, "Token refresh failed");
                }
            }

            settle(&in_flight, epoch);
            outcome
        }
        .boxed()
        .shared();

        slot.pending = Some(future.clone());
        future
    }
}

/// Issue one refresh request and extract the new token
async fn request_token(transport: &dyn Transport, url: &Url) -> Result<String, RefreshError> {
    let mut request = Request::new(Method::POST, url.clone());
    request
        .headers_mut()
        .insert(ACCEPT, HeaderValue::from_static("application/json"));

    let response = transport
        .execute(request)
        .await
        .map_err(|e| RefreshError::Transport(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(RefreshError::Status(status.as_u16()));
    }

    let body = response
        .bytes()
        .await
        .map_err(|e| RefreshError::MalformedBody(e.to_string()))?;

    let data: RefreshResponse =
        serde_json::from_slice(&body).map_err(|e| RefreshError::MalformedBody(e.to_string()))?;

    match data.access_token {
        Some(token) if !token.is_empty() => Ok(token),
        _ => Err(RefreshError::MissingToken),
    }
}

fn settle(in_flight: &Mutex<InFlight>, epoch: u64) {
    let mut slot = lock(in_flight);
    if slot.epoch == epoch {
        slot.pending = None;
    }
}

fn lock(in_flight: &Mutex<InFlight>) -> MutexGuard<'_, InFlight> {
    in_flight.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{base_url, MockReply, MockTransport};
    use serde_json::json;
    use std::time::Duration;

    fn coordinator(transport: Arc<MockTransport>, holder: CredentialHolder) -> RefreshCoordinator {
        let url = base_url().join(REFRESH_PATH).unwrap();
        RefreshCoordinator::new(transport, holder, url)
    }

    #[tokio::test]
    async fn test_refresh_success_stores_token() {
        let transport = MockTransport::new(|_| MockReply::json(200, json!({"accessToken": "T2"})));
        let holder = CredentialHolder::with_token("T1");
        let coordinator = coordinator(transport.clone(), holder.clone());

        let token = coordinator.refresh().await.unwrap();
        assert_eq!(token, "T2");
        assert_eq!(holder.get().await.as_deref(), Some("T2"));
        assert!(!coordinator.is_refreshing());
    }

    #[tokio::test]
    async fn test_refresh_request_shape() {
        let transport = MockTransport::new(|_| MockReply::json(200, json!({"accessToken": "T2"})));
        let holder = CredentialHolder::with_token("stale");
        let coordinator = coordinator(transport.clone(), holder);
        assert_eq!(coordinator.refresh_url().as_str(), "http://app.test/auth/refresh");

        coordinator.refresh().await.unwrap();

        let calls = transport.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].method, Method::POST);
        assert_eq!(calls[0].path(), "/auth/refresh");
        assert_eq!(
            calls[0].headers.get(ACCEPT).unwrap(),
            &HeaderValue::from_static("application/json")
        );
        assert!(calls[0].authorization().is_none());
        assert!(calls[0].body.is_none());
    }

    #[tokio::test]
    async fn test_refresh_non_success_clears_holder() {
        let transport = MockTransport::new(|_| MockReply::status(500));
        let holder = CredentialHolder::with_token("T1");
        let coordinator = coordinator(transport, holder.clone());

        let err = coordinator.refresh().await.unwrap_err();
        assert_eq!(err, RefreshError::Status(500));
        assert_eq!(holder.get().await, None);
    }

    #[tokio::test]
    async fn test_refresh_unreachable() {
        let transport = MockTransport::new(|_| MockReply::Unreachable);
        let holder = CredentialHolder::with_token("T1");
        let coordinator = coordinator(transport, holder.clone());

        let err = coordinator.refresh().await.unwrap_err();
        assert!(matches!(err, RefreshError::Transport(_)));
        assert!(err.is_transport());
        assert_eq!(holder.get().await, None);
    }

    #[tokio::test]
    async fn test_refresh_body_failures() {
        let cases = vec![
            (MockReply::body(200, "not json"), false),
            (MockReply::json(200, json!({"accessToken": 7})), false),
            (MockReply::json(200, json!({})), true),
            (MockReply::json(200, json!({"accessToken": ""})), true),
            (MockReply::json(200, json!({"accessToken": null})), true),
        ];

        for (reply, missing) in cases {
            let reply = std::sync::Mutex::new(Some(reply));
            let transport =
                MockTransport::new(move |_| reply.lock().unwrap().take().unwrap());
            let holder = CredentialHolder::with_token("T1");
            let coordinator = coordinator(transport, holder.clone());

            let err = coordinator.refresh().await.unwrap_err();
            if missing {
                assert_eq!(err, RefreshError::MissingToken);
            } else {
                assert!(matches!(err, RefreshError::MalformedBody(_)), "got {:?}", err);
            }
            assert_eq!(holder.get().await, None);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_refreshes_share_one_request() {
        let transport = MockTransport::new(|_| {
            MockReply::json(200, json!({"accessToken": "T2"})).delayed(Duration::from_millis(50))
        });
        let holder = CredentialHolder::new();
        let coordinator = coordinator(transport.clone(), holder.clone());

        let results = futures::future::join_all((0..5).map(|_| coordinator.refresh())).await;

        assert_eq!(transport.calls().len(), 1);
        for result in results {
            assert_eq!(result.unwrap(), "T2");
        }
        assert_eq!(holder.get().await.as_deref(), Some("T2"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_waiters_share_failure() {
        let transport = MockTransport::new(|_| {
            MockReply::status(503).delayed(Duration::from_millis(50))
        });
        let coordinator = coordinator(transport.clone(), CredentialHolder::with_token("T1"));

        let (a, b) = tokio::join!(coordinator.refresh(), coordinator.refresh());

        assert_eq!(transport.calls().len(), 1);
        assert_eq!(a.unwrap_err(), RefreshError::Status(503));
        assert_eq!(b.unwrap_err(), RefreshError::Status(503));
    }

    #[tokio::test]
    async fn test_settled_refresh_allows_new_one() {
        let counter = std::sync::atomic::AtomicUsize::new(0);
        let transport = MockTransport::new(move |_| {
            let n = counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            MockReply::json(200, json!({"accessToken": format!("T{}", n + 2)}))
        });
        let holder = CredentialHolder::new();
        let coordinator = coordinator(transport.clone(), holder.clone());

        assert_eq!(coordinator.refresh().await.unwrap(), "T2");
        assert!(!coordinator.is_refreshing());
        assert_eq!(coordinator.refresh().await.unwrap(), "T3");
        assert_eq!(transport.calls().len(), 2);
        assert_eq!(holder.get().await.as_deref(), Some("T3"));
    }

    #[tokio::test]
    async fn test_failed_refresh_is_not_retried() {
        let transport = MockTransport::new(|_| MockReply::status(401));
        let coordinator = coordinator(transport.clone(), CredentialHolder::new());

        assert!(coordinator.refresh().await.is_err());
        assert_eq!(transport.calls().len(), 1);
        assert!(!coordinator.is_refreshing());
    }
}
