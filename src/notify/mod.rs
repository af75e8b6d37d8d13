// =============================================================================
// Regime Change Notifications
// =============================================================================
//
// The rule: alert only when there *was* a previous regime and it differs from
// the current one. The first classification after startup never alerts.
//
// Delivery is fire-and-forget. A failed send is reported to the caller, which
// logs it and carries on; nothing is retried.
// =============================================================================

pub mod telegram;

use anyhow::Result;
use async_trait::async_trait;

use crate::regime::Regime;

pub use telegram::TelegramNotifier;

/// Outbound message channel.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send(&self, message: &str) -> Result<()>;
}

/// Alert text for a regime transition, or `None` when nothing should be sent.
pub fn transition_message(previous: Option<Regime>, current: Regime) -> Option<String> {
    match previous {
        Some(prev) if prev != current => Some(format!("🚨 REGIME CHANGE: {prev} → {current}")),
        _ => None,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use parking_lot::Mutex;

    /// Sink that records messages and optionally fails every send.
    #[derive(Default)]
    pub(crate) struct RecordingSink {
        pub sent: Mutex<Vec<String>>,
        pub fail: bool,
    }

    #[async_trait]
    impl NotificationSink for RecordingSink {
        async fn send(&self, message: &str) -> Result<()> {
            self.sent.lock().push(message.to_string());
            if self.fail {
                anyhow::bail!("sink unreachable");
            }
            Ok(())
        }
    }

    #[test]
    fn transition_names_both_regimes() {
        let msg = transition_message(Some(Regime::Sideways), Regime::StrongBull).unwrap();
        assert!(msg.contains("SIDEWAYS"));
        assert!(msg.contains("STRONG_BULL"));
        assert!(msg.find("SIDEWAYS") < msg.find("STRONG_BULL"));
    }

    #[test]
    fn no_message_without_previous() {
        assert!(transition_message(None, Regime::StrongBull).is_none());
    }

    #[test]
    fn no_message_when_unchanged() {
        for regime in Regime::ALL {
            assert!(transition_message(Some(regime), regime).is_none());
        }
    }

    #[test]
    fn every_distinct_pair_alerts() {
        for prev in Regime::ALL {
            for cur in Regime::ALL {
                assert_eq!(transition_message(Some(prev), cur).is_some(), prev != cur);
            }
        }
    }
}
