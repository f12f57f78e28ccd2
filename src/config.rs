//! Default settings
//!
//! There is no configuration file; every value here can be overridden on
//! the command line.

/// Port the server listens on by default
pub const DEFAULT_SERVER_PORT: u16 = 6666;

/// Port ad-hoc clients connect to by default
pub const DEFAULT_CLIENT_PORT: u16 = 161;

/// Interface the server binds by default (all interfaces)
pub const DEFAULT_BIND_HOST: &str = "0.0.0.0";

/// Host clients connect to by default
pub const DEFAULT_CONNECT_HOST: &str = "localhost";

/// Username used when none is given
pub const DEFAULT_USERNAME: &str = "Client";

/// Log filter used when `RUST_LOG` is unset
pub const DEFAULT_LOG_FILTER: &str = "text_relay=info";

/// Console command that sends the exit signal and quits
pub const QUIT_COMMAND: &str = "/quit";
