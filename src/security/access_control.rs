//! Ownership gate.
//!
//! A request is only served when its Host is one of the configured
//! homeservers. Everything else gets `M_UNKNOWN_TOKEN` before any handler runs.

use crate::config::GatewayConfig;

/// Returns true if `host` (already stripped of its port) is served here.
pub fn is_server_ours(host: &str, config: &GatewayConfig) -> bool {
    config.homeservers.iter().any(|hs| hs.name == host)
}
