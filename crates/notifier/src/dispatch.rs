//! Concurrent best-effort delivery of a message batch.
//!
//! Every send of a batch is started at once and joined with [`settle_all`];
//! one failed send never stops the others and never fails the batch.
//! Failures are logged and recorded in the returned [`DispatchReport`].

use std::future::Future;
use std::sync::Arc;

use futures::future::join_all;

use crate::message::OutboundEmail;
use crate::transport::{MailMessage, MailTransport, TransportError};

/// Drive every future to completion concurrently and collect each outcome.
///
/// Unlike a try-join, a failure does not short-circuit: the result has one
/// entry per input, in input order, whether it succeeded or failed.
pub async fn settle_all<I, F, T, E>(futures: I) -> Vec<Result<T, E>>
where
    I: IntoIterator<Item = F>,
    F: Future<Output = Result<T, E>>,
{
    join_all(futures).await
}

/// Why a single message was not delivered.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    /// The recipient has no email address on file.
    #[error("recipient has no email address")]
    MissingAddress,

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Outcome of one message of a batch.
#[derive(Debug)]
pub struct Delivery {
    pub user_id: String,
    pub result: Result<(), DeliveryError>,
}

/// Per-message outcomes of one dispatch batch.
#[derive(Debug, Default)]
pub struct DispatchReport {
    pub deliveries: Vec<Delivery>,
}

impl DispatchReport {
    /// Number of messages accepted by the transport.
    pub fn sent(&self) -> usize {
        self.deliveries.iter().filter(|d| d.result.is_ok()).count()
    }

    /// Number of messages skipped for lack of an address.
    pub fn skipped(&self) -> usize {
        self.deliveries
            .iter()
            .filter(|d| matches!(d.result, Err(DeliveryError::MissingAddress)))
            .count()
    }

    /// Number of messages the transport failed to deliver.
    pub fn failed(&self) -> usize {
        self.deliveries
            .iter()
            .filter(|d| matches!(d.result, Err(DeliveryError::Transport(_))))
            .count()
    }

    /// Total number of messages attempted or skipped.
    pub fn total(&self) -> usize {
        self.deliveries.len()
    }
}

/// Sends message batches through a [`MailTransport`].
#[derive(Clone)]
pub struct Dispatcher {
    transport: Arc<dyn MailTransport>,
}

impl Dispatcher {
    pub fn new(transport: Arc<dyn MailTransport>) -> Self {
        Self { transport }
    }

    /// Send every message concurrently. Never fails; see the report for outcomes.
    pub async fn dispatch(&self, messages: Vec<OutboundEmail>) -> DispatchReport {
        if messages.is_empty() {
            return DispatchReport::default();
        }

        let results = settle_all(messages.iter().map(|m| self.send_one(m))).await;

        let deliveries: Vec<Delivery> = messages
            .into_iter()
            .zip(results)
            .map(|(message, result)| {
                match &result {
                    Ok(()) => {}
                    Err(DeliveryError::MissingAddress) => {
                        tracing::warn!(
                            user_id = %message.user_id,
                            "Skipping notification for user without email"
                        );
                    }
                    Err(e) => {
                        tracing::warn!(
                            user_id = %message.user_id,
                            error = %e,
                            "Notification delivery failed"
                        );
                    }
                }
                Delivery {
                    user_id: message.user_id,
                    result,
                }
            })
            .collect();

        let report = DispatchReport { deliveries };
        tracing::info!(
            total = report.total(),
            sent = report.sent(),
            skipped = report.skipped(),
            failed = report.failed(),
            "Dispatch batch settled"
        );
        report
    }

    async fn send_one(&self, message: &OutboundEmail) -> Result<(), DeliveryError> {
        let to = message
            .to
            .as_deref()
            .map(str::trim)
            .filter(|to| !to.is_empty())
            .ok_or(DeliveryError::MissingAddress)?;

        let mail = MailMessage {
            to: to.to_string(),
            subject: message.subject.clone(),
            text: message.body.clone(),
        };
        self.transport.send(&mail).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Records every attempt; fails for addresses in `fail_for`.
    #[derive(Default)]
    struct ScriptedTransport {
        attempts: Mutex<Vec<String>>,
        fail_for: Vec<String>,
    }

    #[async_trait]
    impl MailTransport for ScriptedTransport {
        async fn send(&self, message: &MailMessage) -> Result<(), TransportError> {
            self.attempts.lock().unwrap().push(message.to.clone());
            if self.fail_for.contains(&message.to) {
                return Err(TransportError::Unavailable("connection refused".to_string()));
            }
            Ok(())
        }
    }

    fn email(user_id: &str, to: Option<&str>) -> OutboundEmail {
        OutboundEmail {
            user_id: user_id.to_string(),
            to: to.map(str::to_string),
            subject: "s".to_string(),
            body: "b".to_string(),
        }
    }

    #[tokio::test]
    async fn test_settle_all_keeps_every_outcome() {
        let futures = (0..4).map(|i| async move {
            if i % 2 == 0 { Ok(i) } else { Err(format!("odd {}", i)) }
        });
        let results = settle_all(futures).await;
        assert_eq!(results.len(), 4);
        assert_eq!(results[0], Ok(0));
        assert_eq!(results[1], Err("odd 1".to_string()));
        assert_eq!(results[3], Err("odd 3".to_string()));
    }

    #[tokio::test]
    async fn test_one_failure_does_not_stop_the_batch() {
        let transport = Arc::new(ScriptedTransport {
            fail_for: vec!["b@example.com".to_string()],
            ..Default::default()
        });
        let dispatcher = Dispatcher::new(transport.clone());

        let report = dispatcher
            .dispatch(vec![
                email("a", Some("a@example.com")),
                email("b", Some("b@example.com")),
                email("c", Some("c@example.com")),
            ])
            .await;

        let mut attempts = transport.attempts.lock().unwrap().clone();
        attempts.sort();
        assert_eq!(
            attempts,
            vec!["a@example.com", "b@example.com", "c@example.com"]
        );
        assert_eq!(report.sent(), 2);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.deliveries[1].user_id, "b");
        assert!(report.deliveries[1].result.is_err());
    }

    #[tokio::test]
    async fn test_missing_address_is_skipped() {
        let transport = Arc::new(ScriptedTransport::default());
        let dispatcher = Dispatcher::new(transport.clone());

        let report = dispatcher
            .dispatch(vec![email("a", None), email("b", Some("  ")), email("c", Some("c@example.com"))])
            .await;

        assert_eq!(report.skipped(), 2);
        assert_eq!(report.sent(), 1);
        assert_eq!(*transport.attempts.lock().unwrap(), vec!["c@example.com"]);
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let transport = Arc::new(ScriptedTransport::default());
        let report = Dispatcher::new(transport.clone()).dispatch(Vec::new()).await;
        assert_eq!(report.total(), 0);
        assert!(transport.attempts.lock().unwrap().is_empty());
    }
}
