// Transport seam
// The raw request/response primitive every outgoing call goes through

use futures::future::BoxFuture;
use reqwest::{Client, Request, Response};

/// Issues a fully built request and yields the raw response.
///
/// `reqwest::Client` is the production implementation. Tests plug in scripted
/// transports to control ordering and count calls.
pub trait Transport: Send + Sync {
    fn execute(&self, request: Request) -> BoxFuture<'_, reqwest::Result<Response>>;
}

impl Transport for Client {
    fn execute(&self, request: Request) -> BoxFuture<'_, reqwest::Result<Response>> {
        Box::pin(Client::execute(self, request))
    }
}
