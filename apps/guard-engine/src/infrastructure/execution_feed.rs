//! Channel-backed execution feed.
//!
//! The execution collaborator holds a sender per account; each chart cycle
//! drains its account's receiver without blocking.

use std::collections::HashMap;

use parking_lot::Mutex;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::application::ports::{ExecutionFeedPort, LedgerUpdate};
use crate::domain::shared::AccountId;

type Channel = (UnboundedSender<LedgerUpdate>, UnboundedReceiver<LedgerUpdate>);

/// Execution feed fed through per-account mpsc channels.
#[derive(Debug, Default)]
pub struct ChannelExecutionFeed {
    channels: Mutex<HashMap<AccountId, Channel>>,
}

impl ChannelExecutionFeed {
    /// Create an empty feed.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sender for an account's confirmed updates.
    #[must_use]
    pub fn sender(&self, account_id: &AccountId) -> UnboundedSender<LedgerUpdate> {
        self.channels
            .lock()
            .entry(account_id.clone())
            .or_insert_with(mpsc::unbounded_channel)
            .0
            .clone()
    }
}

impl ExecutionFeedPort for ChannelExecutionFeed {
    fn drain(&self, account_id: &AccountId) -> Vec<LedgerUpdate> {
        let mut channels = self.channels.lock();
        let Some((_, receiver)) = channels.get_mut(account_id) else {
            return Vec::new();
        };
        let mut updates = Vec::new();
        while let Ok(update) = receiver.try_recv() {
            updates.push(update);
        }
        updates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::shared::Money;

    #[test]
    fn drains_in_order_per_account() {
        let feed = ChannelExecutionFeed::new();
        let a = AccountId::new("a");
        let b = AccountId::new("b");

        let tx = feed.sender(&a);
        tx.send(LedgerUpdate::pnl(Money::dollars(100))).unwrap();
        tx.send(LedgerUpdate::fill(Money::dollars(-50), 1)).unwrap();

        assert!(feed.drain(&b).is_empty());
        let updates = feed.drain(&a);
        assert_eq!(updates.len(), 2);
        assert_eq!(updates[0].pnl_delta, Money::dollars(100));
        assert_eq!(updates[1].contracts_delta, 1);
        assert!(feed.drain(&a).is_empty());
    }

    #[test]
    fn senders_share_one_channel() {
        let feed = ChannelExecutionFeed::new();
        let a = AccountId::new("a");
        feed.sender(&a).send(LedgerUpdate::pnl(Money::dollars(1))).unwrap();
        feed.sender(&a).send(LedgerUpdate::pnl(Money::dollars(2))).unwrap();
        assert_eq!(feed.drain(&a).len(), 2);
    }
}
