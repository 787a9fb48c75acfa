//! Recipient resolution and notification dispatch for conference events.
//!
//! - [`recipients`] — deduplicated recipient set of an event.
//! - [`loader`] — concurrent user lookups.
//! - [`message`] — per-recipient templates with fallbacks.
//! - [`dispatch`] — concurrent best-effort sending.
//! - [`transport`] — SMTP / log mail transports.
//! - [`notifier`] — [`Notifier`] facade tying the above together.
//! - [`reminder`] — day-before reminders.

pub mod dispatch;
pub mod loader;
pub mod message;
pub mod notifier;
pub mod recipients;
pub mod reminder;
pub mod transport;

pub use dispatch::{Delivery, DeliveryError, DispatchReport, Dispatcher, settle_all};
pub use message::{OutboundEmail, build_message};
pub use notifier::{NotificationJob, Notifier};
pub use recipients::{RecipientSet, resolve_recipients};
pub use transport::{LogTransport, MailMessage, MailTransport, SmtpTransport, TransportError};
