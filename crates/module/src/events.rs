//! Append-only event log.

use parking_lot::RwLock;
use tracing::debug;

use auction_types::{AuctionEvent, SequencedEvent};

/// Ordered record of everything the engine has announced.
#[derive(Debug, Default)]
pub struct EventLog {
    events: RwLock<Vec<SequencedEvent>>,
}

impl EventLog {
    /// Append an event and return its sequence number.
    pub fn emit(&self, event: AuctionEvent, timestamp: u64) -> u64 {
        let mut events = self.events.write();
        let sequence = events.len() as u64;
        debug!(sequence, auction_id = event.auction_id(), ?event, "Event emitted");
        events.push(SequencedEvent {
            sequence,
            timestamp,
            event,
        });
        sequence
    }

    /// Events with `sequence >= from`.
    pub fn since(&self, from: u64) -> Vec<SequencedEvent> {
        let events = self.events.read();
        let start = usize::try_from(from).unwrap_or(usize::MAX).min(events.len());
        events[start..].to_vec()
    }

    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_and_since() {
        let log = EventLog::default();
        assert!(log.is_empty());

        let first = log.emit(
            AuctionEvent::BidPlaced {
                auction_id: 0,
                bidder: [2u8; 32],
            },
            100,
        );
        let second = log.emit(
            AuctionEvent::AuctionEnded {
                auction_id: 0,
                bid_count: 1,
            },
            200,
        );
        assert_eq!((first, second), (0, 1));
        assert_eq!(log.len(), 2);

        let tail = log.since(1);
        assert_eq!(tail.len(), 1);
        assert_eq!(tail[0].timestamp, 200);
        assert!(log.since(10).is_empty());
        assert_eq!(log.since(0).len(), 2);
    }
}
