//! Server configuration.

use wssb_settings::ServerSettings;

/// Operational configuration for the WSSB server.
///
/// The bind address and port come from the `server.json` table; the rest are
/// compiled-in operational knobs the table does not expose.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Host to bind.
    pub host: String,
    /// Port to bind (`0` for auto-assign, used by tests).
    pub port: u16,
    /// Per-connection outbound channel capacity.
    pub send_queue: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: 8765,
            send_queue: 256,
        }
    }
}

impl ServerConfig {
    /// Build a config from the loaded server settings table.
    #[must_use]
    pub fn from_settings(settings: &ServerSettings) -> Self {
        Self {
            host: settings.server_address.clone(),
            port: settings.server_port,
            ..Self::default()
        }
    }
}
