//! Per-recipient message templates.
//!
//! [`build_message`] is pure and never fails: every interpolated field has a
//! fallback string used when the value is missing or could not be parsed.

use confernet_common::time::format_date;
use confernet_common::types::{Event, EventRole, NotificationCause, User};

/// Greeting name when the user has none.
pub const NAME_FALLBACK: &str = "there";
/// Event name when the event has none.
pub const EVENT_NAME_FALLBACK: &str = "Untitled event";
/// Dates and venue in lifecycle and reminder messages.
pub const TBD: &str = "TBD";
/// Venue in role-assignment messages.
pub const VENUE_ROLE_FALLBACK: &str = "To Be Announced";
/// Contact address in role-assignment messages.
pub const CONTACT_FALLBACK: &str = "N/A";

const SIGNATURE: &str = "— ConferNet Team";

/// A message addressed to one resolved user.
///
/// `to` is `None` when the user has no email address; the dispatcher skips it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundEmail {
    pub user_id: String,
    pub to: Option<String>,
    pub subject: String,
    pub body: String,
}

/// Build the message for one user, one event and one cause.
pub fn build_message(user: &User, event: &Event, cause: NotificationCause) -> OutboundEmail {
    let name = user.name.as_deref().unwrap_or(NAME_FALLBACK);
    let event_name = event.name.as_deref().unwrap_or(EVENT_NAME_FALLBACK);

    let (subject, body) = match cause {
        NotificationCause::Created | NotificationCause::Updated | NotificationCause::Cancelled => {
            lifecycle(name, event_name, event, cause)
        }
        NotificationCause::AddedAs(role) => role_assignment(name, event_name, event, role),
        NotificationCause::Reminder => reminder(name, event_name, event),
    };

    OutboundEmail {
        user_id: user.id.clone(),
        to: user.email.clone(),
        subject,
        body,
    }
}

fn lifecycle(
    name: &str,
    event_name: &str,
    event: &Event,
    cause: NotificationCause,
) -> (String, String) {
    let subject = format!("📣 Event \"{}\" has been {}", event_name, cause);
    let body = format!(
        "Hi {name},\n\n\
         The event \"{event_name}\" you are part of has been {cause}.\n\n\
         📅 Starts: {start}\n\
         🏁 Ends: {end}\n\
         📍 Venue: {venue}\n\n\
         Please check the app for more details.\n\n\
         {SIGNATURE}",
        start = format_date(event.start_date.as_ref(), TBD),
        end = format_date(event.end_date.as_ref(), TBD),
        venue = event.venue.as_deref().unwrap_or(TBD),
    );
    (subject, body)
}

fn role_assignment(
    name: &str,
    event_name: &str,
    event: &Event,
    role: EventRole,
) -> (String, String) {
    let role = role.label();
    let subject = format!("🎤 You've been added as a {} for \"{}\"", role, event_name);
    let body = format!(
        "Hi {name},\n\n\
         You've been added as a {role} for the event \"{event_name}\" scheduled from {start} to {end}.\n\n\
         📍 Venue: {venue}\n\
         📧 Contact: {contact}\n\n\
         Log in to manage your sessions or upload materials.\n\n\
         {SIGNATURE}",
        start = format_date(event.start_date.as_ref(), TBD),
        end = format_date(event.end_date.as_ref(), TBD),
        venue = event.venue.as_deref().unwrap_or(VENUE_ROLE_FALLBACK),
        contact = event.contact_email.as_deref().unwrap_or(CONTACT_FALLBACK),
    );
    (subject, body)
}

fn reminder(name: &str, event_name: &str, event: &Event) -> (String, String) {
    let subject = format!("📢 Reminder: \"{}\" is happening tomorrow", event_name);
    let body = format!(
        "Hi {name},\n\n\
         This is a friendly reminder that the event \"{event_name}\" is happening tomorrow.\n\n\
         🗓 Date: {start}\n\
         📍 Venue: {venue}\n\n\
         Please be prepared and check the app for more info.\n\n\
         {SIGNATURE}",
        start = format_date(event.start_date.as_ref(), TBD),
        venue = event.venue.as_deref().unwrap_or(TBD),
    );
    (subject, body)
}
