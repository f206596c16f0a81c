//! Session targets and the socket endpoint derived from them.
//!
//! A [`SessionTarget`] names one container of one application.  The backend
//! resolves that to a running pod and attaches a shell.  The target travels as
//! query parameters on the `/terminal` WebSocket path:
//!
//! ```text
//! wss://cyclops.example.com/terminal?pod=&container=main&appName=api
//!     &appNamespace=default&projectName=demo&namespace=default
//! ```
//!
//! The scheme follows the origin the user supplied: an `https` origin upgrades
//! to `wss`, plain `http` stays on `ws`.

use std::fmt;

use thiserror::Error;
use url::Url;

/// Path of the terminal socket relative to the origin.
pub const TERMINAL_PATH: &str = "terminal";

/// Identifies the remote container a bridge instance attaches to.
///
/// Immutable for the life of a bridge instance.  Attaching somewhere else means
/// tearing the instance down and building a new one.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionTarget {
    /// Application (module) name.
    pub app_name: String,
    /// Namespace the application is deployed in.
    pub app_namespace: String,
    /// Project the application belongs to.
    pub project_name: String,
    /// Container inside the application's pod.
    pub container_name: String,
    /// Specific pod to attach to.  When absent the `pod` parameter is sent
    /// empty and the backend picks a pod for the application.
    pub pod_name: Option<String>,
}

impl SessionTarget {
    /// Creates a target without a pinned pod.
    pub fn new(
        app_name: impl Into<String>,
        app_namespace: impl Into<String>,
        project_name: impl Into<String>,
        container_name: impl Into<String>,
    ) -> Self {
        Self {
            app_name: app_name.into(),
            app_namespace: app_namespace.into(),
            project_name: project_name.into(),
            container_name: container_name.into(),
            pod_name: None,
        }
    }

    /// Pins the target to a specific pod.
    #[must_use]
    pub fn with_pod(mut self, pod_name: impl Into<String>) -> Self {
        self.pod_name = Some(pod_name.into());
        self
    }

    /// Returns a copy of this target pointing at a different container of the
    /// same application.
    #[must_use]
    pub fn with_container(&self, container_name: impl Into<String>) -> Self {
        Self {
            container_name: container_name.into(),
            ..self.clone()
        }
    }
}

impl fmt::Display for SessionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}:{}",
            self.project_name, self.app_namespace, self.app_name, self.container_name
        )?;
        if let Some(pod) = &self.pod_name {
            write!(f, "@{pod}")?;
        }
        Ok(())
    }
}

/// Errors building an [`Endpoint`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EndpointError {
    /// The origin string is not a URL.
    #[error("invalid origin URL {origin:?}: {reason}")]
    InvalidOrigin { origin: String, reason: String },

    /// The origin uses a scheme that has no WebSocket counterpart.
    #[error("unsupported origin scheme {0:?} (expected http, https, ws or wss)")]
    UnsupportedScheme(String),

    /// The origin has no host component.
    #[error("origin {0:?} has no host")]
    MissingHost(String),
}

/// The fully resolved socket address for one [`SessionTarget`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    url: Url,
}

impl Endpoint {
    /// Builds the terminal endpoint for `target` under `origin`.
    ///
    /// Any path already on the origin is kept as a prefix, so a dashboard
    /// served from `https://host/cyclops/` yields `wss://host/cyclops/terminal`.
    ///
    /// # Errors
    ///
    /// Returns an [`EndpointError`] when the origin cannot be parsed, has no
    /// host, or uses a scheme other than http(s)/ws(s).
    ///
    /// # Example
    ///
    /// ```rust
    /// use podterm_core::{Endpoint, SessionTarget};
    ///
    /// let target = SessionTarget::new("api", "default", "demo", "main");
    /// let ep = Endpoint::for_target("https://cyclops.local", &target).unwrap();
    /// assert!(ep.as_str().starts_with("wss://cyclops.local/terminal?"));
    /// ```
    pub fn for_target(origin: &str, target: &SessionTarget) -> Result<Self, EndpointError> {
        let mut url = Url::parse(origin).map_err(|e| EndpointError::InvalidOrigin {
            origin: origin.to_string(),
            reason: e.to_string(),
        })?;

        if url.host_str().is_none() {
            return Err(EndpointError::MissingHost(origin.to_string()));
        }

        let scheme = match url.scheme() {
            "https" | "wss" => "wss",
            "http" | "ws" => "ws",
            other => return Err(EndpointError::UnsupportedScheme(other.to_string())),
        };
        // All four schemes are "special" in the URL standard, so switching
        // between them cannot fail.
        if url.set_scheme(scheme).is_err() {
            return Err(EndpointError::UnsupportedScheme(url.scheme().to_string()));
        }

        let base = url.path().trim_end_matches('/').to_string();
        url.set_path(&format!("{base}/{TERMINAL_PATH}"));
        url.set_fragment(None);
        url.set_query(None);

        url.query_pairs_mut()
            .append_pair("pod", target.pod_name.as_deref().unwrap_or(""))
            .append_pair("container", &target.container_name)
            .append_pair("appName", &target.app_name)
            .append_pair("appNamespace", &target.app_namespace)
            .append_pair("projectName", &target.project_name)
            .append_pair("namespace", &target.app_namespace);

        Ok(Self { url })
    }

    /// The endpoint as a URL.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// The endpoint as a string, ready for a WebSocket client.
    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }

    /// Whether the connection will use TLS.
    pub fn is_secure(&self) -> bool {
        self.url.scheme() == "wss"
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.url.as_str())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn demo_target() -> SessionTarget {
        SessionTarget::new("api", "default", "demo", "main")
    }

    #[test]
    fn test_http_origin_uses_plain_ws() {
        // Arrange / Act
        let ep = Endpoint::for_target("http://127.0.0.1:8080", &demo_target()).unwrap();

        // Assert
        assert_eq!(
            ep.as_str(),
            "ws://127.0.0.1:8080/terminal?pod=&container=main&appName=api\
             &appNamespace=default&projectName=demo&namespace=default"
        );
        assert!(!ep.is_secure());
    }

    #[test]
    fn test_https_origin_upgrades_to_wss() {
        let ep = Endpoint::for_target("https://cyclops.example.com", &demo_target()).unwrap();
        assert_eq!(ep.url().scheme(), "wss");
        assert!(ep.is_secure());
    }

    #[test]
    fn test_ws_origin_is_accepted_as_is() {
        let ep = Endpoint::for_target("wss://cyclops.example.com", &demo_target()).unwrap();
        assert_eq!(ep.url().scheme(), "wss");
    }

    #[test]
    fn test_base_path_is_preserved() {
        let ep = Endpoint::for_target("https://host/cyclops/", &demo_target()).unwrap();
        assert_eq!(ep.url().path(), "/cyclops/terminal");
    }

    #[test]
    fn test_origin_query_and_fragment_are_dropped() {
        let ep = Endpoint::for_target("http://host/?tab=pods#top", &demo_target()).unwrap();
        assert!(ep.url().fragment().is_none());
        assert!(!ep.as_str().contains("tab=pods"));
    }

    #[test]
    fn test_pinned_pod_is_sent() {
        let target = demo_target().with_pod("api-7d9f-abcde");
        let ep = Endpoint::for_target("http://host", &target).unwrap();
        let pod = ep
            .url()
            .query_pairs()
            .find(|(k, _)| k == "pod")
            .map(|(_, v)| v.into_owned());
        assert_eq!(pod.as_deref(), Some("api-7d9f-abcde"));
    }

    #[test]
    fn test_namespace_param_mirrors_app_namespace() {
        let target = SessionTarget::new("api", "team-a", "demo", "main");
        let ep = Endpoint::for_target("http://host", &target).unwrap();
        let ns = ep
            .url()
            .query_pairs()
            .find(|(k, _)| k == "namespace")
            .map(|(_, v)| v.into_owned());
        assert_eq!(ns.as_deref(), Some("team-a"));
    }

    #[test]
    fn test_query_values_are_percent_encoded() {
        let target = SessionTarget::new("my app", "default", "a&b", "main");
        let ep = Endpoint::for_target("http://host", &target).unwrap();
        assert!(ep.as_str().contains("appName=my+app"));
        assert!(ep.as_str().contains("projectName=a%26b"));
    }

    #[test]
    fn test_unsupported_scheme_is_rejected() {
        let err = Endpoint::for_target("ftp://host", &demo_target()).unwrap_err();
        assert_eq!(err, EndpointError::UnsupportedScheme("ftp".to_string()));
    }

    #[test]
    fn test_garbage_origin_is_rejected() {
        let err = Endpoint::for_target("not a url", &demo_target()).unwrap_err();
        assert!(matches!(err, EndpointError::InvalidOrigin { .. }));
    }

    #[test]
    fn test_with_container_keeps_other_fields() {
        let target = demo_target().with_pod("p1");
        let other = target.with_container("sidecar");
        assert_eq!(other.container_name, "sidecar");
        assert_eq!(other.app_name, "api");
        assert_eq!(other.pod_name.as_deref(), Some("p1"));
    }

    #[test]
    fn test_target_display() {
        assert_eq!(demo_target().to_string(), "demo/default/api:main");
        assert_eq!(
            demo_target().with_pod("p1").to_string(),
            "demo/default/api:main@p1"
        );
    }
}
