pub mod alert;
pub mod config;
pub mod fetcher;
pub mod logging;
pub mod monitor;
pub mod notifier;
pub mod state;
pub mod ticker;
pub mod types;

/// QuadrigaCX public REST API base URL (no auth required)
pub const QUADRIGA_API_BASE: &str = "https://api.quadrigacx.com/v2";

/// QuadrigaCX website base URL, used for links in alert emails
pub const QUADRIGA_WEB_BASE: &str = "https://www.quadrigacx.com";

/// SMTP relay used to deliver alerts. Only Gmail senders are supported.
pub const SMTP_HOST: &str = "smtp.gmail.com";
pub const SMTP_PORT: u16 = 587;

/// Domain every sender address must belong to.
pub const SENDER_DOMAIN: &str = "@gmail.com";
