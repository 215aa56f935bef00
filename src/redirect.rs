// Login redirect
// Side effect fired when authentication cannot be recovered

/// Default login surface
pub const LOGIN_REDIRECT_PATH: &str = "/login";

/// Sends the user to the login surface.
///
/// The pipeline never waits on or inspects the outcome of a redirect.
pub trait LoginRedirect: Send + Sync {
    fn redirect(&self, path: &str);
}

/// Redirect sink for headless hosts: records the navigation in the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogRedirect;

impl LoginRedirect for LogRedirect {
    fn redirect(&self, path: &str) {
        tracing::warn!(path = %path, "Authentication required, redirecting to login");
    }
}

impl<F> LoginRedirect for F
where
    F: Fn(&str) + Send + Sync,
{
    fn redirect(&self, path: &str) {
        self(path)
    }
}
