//! Server configuration.

use std::time::Duration;

/// Tunables for the gateway.
///
/// ```rust
/// use std::time::Duration;
/// use rollcall::ServerConfig;
///
/// let config = ServerConfig {
///     idle_timeout: Some(Duration::from_secs(300)),
///     ..ServerConfig::default()
/// };
/// assert_eq!(config.token_param, "token");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Query parameter carrying the bearer token.
    pub token_param: String,
    /// Closes a connection that has sent nothing for this long. `None`
    /// keeps silent connections open.
    pub idle_timeout: Option<Duration>,
    /// Only upgrade requests on this path. `None` accepts any path.
    pub ws_path: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            token_param: "token".to_string(),
            idle_timeout: None,
            ws_path: None,
        }
    }
}
