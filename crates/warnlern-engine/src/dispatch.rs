//! Ausgangswarteschlange für Empfehlungen mit `send_alert = true`.
//!
//! Der Kanal ist unbegrenzt; ein geschlossener Empfänger wird geloggt und
//! beeinflusst den Engine-Zustand nicht.

use tokio::sync::mpsc;
use warnlern_core::Recommendation;

pub type DispatchReceiver = mpsc::UnboundedReceiver<Recommendation>;

#[derive(Debug, Clone, Default)]
pub struct Dispatcher {
    tx: Option<mpsc::UnboundedSender<Recommendation>>,
}

impl Dispatcher {
    #[must_use]
    pub fn channel() -> (Self, DispatchReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    /// Verwirft alles.
    #[must_use]
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    pub fn publish(&self, recommendation: &Recommendation) {
        let Some(tx) = &self.tx else {
            return;
        };
        if tx.send(recommendation.clone()).is_err() {
            tracing::debug!(
                user_id = %recommendation.user_id,
                "dispatch receiver closed; recommendation dropped"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::OffsetDateTime;

    fn recommendation() -> Recommendation {
        Recommendation {
            send_alert: true,
            priority: None,
            commodity_focus: None,
            confidence: 0.0,
            action_id: 1,
            user_id: "u".into(),
            timestamp: OffsetDateTime::UNIX_EPOCH,
            tracking_id: Some("t".into()),
            explored: false,
        }
    }

    #[test]
    fn published_recommendations_arrive_in_order() {
        let (dispatcher, mut rx) = Dispatcher::channel();
        dispatcher.publish(&recommendation());
        let mut second = recommendation();
        second.action_id = 2;
        dispatcher.publish(&second);
        assert_eq!(rx.try_recv().map(|r| r.action_id), Ok(1));
        assert_eq!(rx.try_recv().map(|r| r.action_id), Ok(2));
    }

    #[test]
    fn closed_receiver_is_harmless() {
        let (dispatcher, rx) = Dispatcher::channel();
        drop(rx);
        dispatcher.publish(&recommendation());
        Dispatcher::disabled().publish(&recommendation());
    }
}
