//! # wssb-plugins
//!
//! The plugin interface and the plugins that ship with the server.
//!
//! A plugin contributes up to three things:
//!
//! - **routes**: request codes it answers, dispatched after the core
//!   command table declines; every plugin claiming a code gets to respond
//! - **event handlers**: hooks into the lifecycle events of `wssb-events`
//! - **a private config table**: `plugins/<name>.json` under the server's
//!   config directory
//!
//! Plugins are registered explicitly at assembly time through
//! [`PluginHost::register`]; there is no runtime discovery.
//!
//! Bundled plugins: [`sessions`] (session continuity across reconnects),
//! [`passwords`] (password-gated authentication for selected groups), and
//! [`foo`] (a worked example of the plugin format).

#![deny(unsafe_code)]

pub mod foo;
pub mod host;
pub mod passwords;
pub mod plugin;
pub mod sessions;

pub use foo::FooPlugin;
pub use host::PluginHost;
pub use passwords::PasswordsPlugin;
pub use plugin::{Plugin, RouteHandler};
pub use sessions::SessionsPlugin;
