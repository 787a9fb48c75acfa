//! Notification facade used by the HTTP layer and the reminder job.
//!
//! A dispatch batch has two phases:
//!
//! 1. [`Notifier::prepare`] resolves the recipient set into a
//!    [`NotificationJob`]. For cancellations this must happen before the
//!    attendee sub-collection is deleted.
//! 2. [`Notifier::dispatch`] loads the users, builds one message each and
//!    sends them concurrently. It runs only after the triggering write has
//!    been committed and never fails.

use std::sync::Arc;

use confernet_common::error::StoreError;
use confernet_common::types::{Event, EventRole, NotificationCause};
use confernet_store::DocumentStore;

use crate::dispatch::{DispatchReport, Dispatcher};
use crate::loader::load_existing;
use crate::message::build_message;
use crate::recipients::{RecipientSet, resolve_recipients};
use crate::transport::MailTransport;

/// One (event, cause) batch with its resolved recipients. Never persisted.
#[derive(Debug, Clone)]
pub struct NotificationJob {
    event: Event,
    cause: NotificationCause,
    recipients: RecipientSet,
}

impl NotificationJob {
    pub fn new(event: Event, cause: NotificationCause, recipients: RecipientSet) -> Self {
        Self {
            event,
            cause,
            recipients,
        }
    }

    pub fn event(&self) -> &Event {
        &self.event
    }

    pub fn cause(&self) -> NotificationCause {
        self.cause
    }

    pub fn recipients(&self) -> &RecipientSet {
        &self.recipients
    }
}

/// Resolves recipients and dispatches notification batches.
#[derive(Clone)]
pub struct Notifier {
    store: Arc<dyn DocumentStore>,
    dispatcher: Dispatcher,
}

impl Notifier {
    pub fn new(store: Arc<dyn DocumentStore>, transport: Arc<dyn MailTransport>) -> Self {
        Self {
            store,
            dispatcher: Dispatcher::new(transport),
        }
    }

    /// Resolve the recipients of `event` into a job for `cause`.
    pub async fn prepare(
        &self,
        event: &Event,
        cause: NotificationCause,
    ) -> Result<NotificationJob, StoreError> {
        let recipients = resolve_recipients(
            self.store.as_ref(),
            &event.id,
            &event.keynote_speakers,
            &event.moderators,
        )
        .await?;
        Ok(NotificationJob::new(event.clone(), cause, recipients))
    }

    /// Load, build and send every message of `job`.
    ///
    /// An empty recipient set performs no lookups and no sends.
    pub async fn dispatch(&self, job: NotificationJob) -> DispatchReport {
        if job.recipients.is_empty() {
            tracing::debug!(
                event_id = %job.event.id,
                cause = %job.cause,
                "No recipients, nothing to dispatch"
            );
            return DispatchReport::default();
        }

        let users = load_existing(self.store.as_ref(), &job.recipients).await;
        let messages = users
            .iter()
            .map(|user| build_message(user, &job.event, job.cause))
            .collect();

        let report = self.dispatcher.dispatch(messages).await;
        tracing::info!(
            event_id = %job.event.id,
            cause = %job.cause,
            recipients = job.recipients.len(),
            sent = report.sent(),
            failed = report.failed(),
            "Event notification dispatched"
        );
        report
    }

    /// Notify every speaker, moderator and attendee of `event`.
    pub async fn notify_event_users(
        &self,
        event: &Event,
        cause: NotificationCause,
    ) -> Result<DispatchReport, StoreError> {
        let job = self.prepare(event, cause).await?;
        Ok(self.dispatch(job).await)
    }

    /// Tell newly assigned speakers or moderators about their role on `event`.
    pub async fn notify_role_assignment(
        &self,
        user_ids: &[String],
        role: EventRole,
        event: &Event,
    ) -> DispatchReport {
        let recipients: RecipientSet = user_ids.iter().map(String::as_str).collect();
        let job = NotificationJob::new(event.clone(), NotificationCause::AddedAs(role), recipients);
        self.dispatch(job).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::LogTransport;
    use confernet_common::types::{RelationEntry, collections};
    use confernet_store::MemoryStore;
    use serde_json::json;

    #[tokio::test]
    async fn test_prepare_resolves_recipients() {
        let store = Arc::new(MemoryStore::new());
        store
            .set(&collections::attendees("e1"), "u3", json!({ "userId": "u3" }))
            .await
            .unwrap();
        let notifier = Notifier::new(store.clone(), Arc::new(LogTransport));

        let event = Event {
            id: "e1".to_string(),
            keynote_speakers: vec![RelationEntry::from("u1")],
            moderators: vec![RelationEntry::from("u1")],
            ..Default::default()
        };
        let job = notifier
            .prepare(&event, NotificationCause::Updated)
            .await
            .unwrap();

        assert_eq!(job.recipients().len(), 2);
        assert_eq!(job.cause(), NotificationCause::Updated);
        assert_eq!(job.event().id, "e1");
    }

    #[tokio::test]
    async fn test_role_assignment_with_no_ids_is_a_no_op() {
        let store = Arc::new(MemoryStore::new());
        let notifier = Notifier::new(store.clone(), Arc::new(LogTransport));

        let report = notifier
            .notify_role_assignment(
                &["".to_string()],
                EventRole::Moderator,
                &Event::default(),
            )
            .await;

        assert_eq!(report.total(), 0);
        assert_eq!(store.reads(), 0);
    }
}
