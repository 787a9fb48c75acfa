//! Day-before event reminders.
//!
//! Finds every event starting tomorrow (UTC calendar day) and sends a
//! reminder to its speakers, moderators and attendees. Events are processed
//! one after another; a failure on one event is logged and the run moves on.

use chrono::{DateTime, Days, Utc};
use serde_json::json;

use confernet_common::error::StoreError;
use confernet_common::time::to_storage;
use confernet_common::types::{Event, NotificationCause, collections};
use confernet_store::{Direction, DocumentStore, FilterOp, Query};

use crate::notifier::Notifier;

/// Totals of one reminder run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReminderSummary {
    pub events: usize,
    pub sent: usize,
    pub failed: usize,
}

/// First and last second of the calendar day after `now`.
pub fn tomorrow_bounds(now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let tomorrow = now
        .date_naive()
        .checked_add_days(Days::new(1))
        .unwrap_or_else(|| now.date_naive());
    let start = tomorrow
        .and_hms_opt(0, 0, 0)
        .map(|start| start.and_utc())
        .unwrap_or(now);
    let end = tomorrow
        .and_hms_opt(23, 59, 59)
        .map(|end| end.and_utc())
        .unwrap_or(start);
    (start, end)
}

/// Send reminders for every event starting the day after `now`.
///
/// Only the initial event query can fail; per-event problems are logged.
pub async fn send_tomorrow_reminders(
    store: &dyn DocumentStore,
    notifier: &Notifier,
    now: DateTime<Utc>,
) -> Result<ReminderSummary, StoreError> {
    let (start, end) = tomorrow_bounds(now);
    let query = Query::new()
        .filter("startDate", FilterOp::Gte, json!(to_storage(&start)))
        .filter("startDate", FilterOp::Lte, json!(to_storage(&end)))
        .order_by("startDate", Direction::Ascending);

    let docs = store.query(collections::EVENTS, &query).await?;
    if docs.is_empty() {
        tracing::info!(day = %start.date_naive(), "No events happening tomorrow");
        return Ok(ReminderSummary::default());
    }

    let mut summary = ReminderSummary::default();
    for doc in docs {
        let event = match Event::from_document(&doc.key, doc.data) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(event_id = %doc.key, error = %e, "Skipping undecodable event");
                continue;
            }
        };

        match notifier
            .notify_event_users(&event, NotificationCause::Reminder)
            .await
        {
            Ok(report) => {
                summary.events += 1;
                summary.sent += report.sent();
                summary.failed += report.failed();
                tracing::info!(
                    event_id = %event.id,
                    sent = report.sent(),
                    "Reminders sent for event"
                );
            }
            Err(e) => {
                tracing::error!(event_id = %event.id, error = %e, "Failed to send reminders");
            }
        }
    }

    Ok(summary)
}
