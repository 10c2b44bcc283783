//! Protocol code constants.
//!
//! Every response packet carries one of these codes so clients can react
//! without parsing human-readable messages. Request codes (`auth`, `reload`,
//! `stop`, ...) are plain lowercase strings and live in the router's command
//! table, not here.

/// Current server version (sourced from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Successful authentication.
pub const AUTH_SUCCESS: &str = "WSSB_AUTH_SUCCESS";
/// The requested user name does not exist on the server.
pub const AUTH_USER_NOT_FOUND: &str = "WSSB_AUTH_USER_NOT_FOUND";
/// The auth request's `user_name` field is missing or not a string.
pub const AUTH_INVALID_SYNTAX: &str = "WSSB_AUTH_INVALID_SYNTAX";
/// A plugin vetoed the authentication attempt.
pub const AUTH_FAILED: &str = "WSSB_AUTH_FAILED";
/// The connection already carries an authenticated identity.
pub const ALREADY_AUTHENTICATED: &str = "WSSB_ALREADY_AUTHENTICATED";
/// Authenticated but missing the permission an admin command requires.
pub const ACCESS_DENIED: &str = "WSSB_ACCESS_DENIED";
/// No core entry or plugin route claims the request code.
pub const REQUEST_CODE_NOT_FOUND: &str = "WSSB_REQUEST_CODE_NOT_FOUND";
/// A non-`auth` request arrived before authentication.
pub const USER_NOT_AUTHENTICATED: &str = "WSSB_USER_NOT_AUTHENTICATED";
/// The frame body was not valid JSON or not an object/array of objects.
pub const BAD_PACKET: &str = "WSSB_BAD_PACKET";
/// Sent to a socket just before the server force-closes it.
pub const KICKED: &str = "WSSB_KICKED";
/// Server settings table reloaded.
pub const RELOAD_CFG_OK: &str = "WSSB_RELOAD_CFG_OK";
/// The server settings table could not be re-read.
pub const RELOAD_CFG_FAILED: &str = "WSSB_RELOAD_CFG_FAILED";
/// Groups and users tables reloaded into the registry.
pub const RELOAD_USERS_OK: &str = "WSSB_RELOAD_USERS_OK";
/// The groups or users table could not be re-read.
pub const RELOAD_USERS_FAILED: &str = "WSSB_RELOAD_USERS_FAILED";
/// Every plugin ran its reload lifecycle hook.
pub const RELOAD_PLUGINS_OK: &str = "WSSB_RELOAD_PLUGINS_OK";
/// One or more plugins kept their previous configuration.
pub const RELOAD_PLUGINS_FAILED: &str = "WSSB_RELOAD_PLUGINS_FAILED";
/// Full reload (settings, users, plugins) completed.
pub const RELOAD_OK: &str = "WSSB_RELOAD_OK";
/// One or more steps of a full reload failed.
pub const RELOAD_FAILED: &str = "WSSB_RELOAD_FAILED";
/// Shutdown accepted; the server is stopping.
pub const STOPPING: &str = "WSSB_STOPPING";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_semver() {
        let parts: Vec<&str> = VERSION.split('.').collect();
        assert_eq!(parts.len(), 3, "VERSION must be semver (MAJOR.MINOR.PATCH)");
        for part in parts {
            let _: u32 = part.parse().expect("each semver segment must be a number");
        }
    }

    #[test]
    fn codes_share_the_wssb_prefix() {
        for code in [
            AUTH_SUCCESS,
            AUTH_USER_NOT_FOUND,
            AUTH_INVALID_SYNTAX,
            AUTH_FAILED,
            ALREADY_AUTHENTICATED,
            ACCESS_DENIED,
            REQUEST_CODE_NOT_FOUND,
            USER_NOT_AUTHENTICATED,
            BAD_PACKET,
            KICKED,
            RELOAD_CFG_OK,
            RELOAD_CFG_FAILED,
            RELOAD_USERS_OK,
            RELOAD_USERS_FAILED,
            RELOAD_PLUGINS_OK,
            RELOAD_PLUGINS_FAILED,
            RELOAD_OK,
            RELOAD_FAILED,
            STOPPING,
        ] {
            assert!(code.starts_with("WSSB_"), "{code} missing prefix");
        }
    }
}
