//! Best-effort broadcast to sets of monitor sockets.

use std::collections::HashSet;

use super::peer::PeerSink;

/// Result of one broadcast.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub evicted: usize,
}

/// Send `text` to every open peer in `peers`, then drop the ones that were not open.
///
/// Dead peers are collected during iteration and removed afterwards.
pub fn broadcast(peers: &mut HashSet<PeerSink>, text: &str) -> BroadcastReport {
    let mut report = BroadcastReport::default();
    let mut dead = Vec::new();

    for peer in peers.iter() {
        if peer.send_text(text) {
            report.delivered += 1;
        } else {
            dead.push(peer.clone());
        }
    }

    for peer in &dead {
        peers.remove(peer);
    }
    report.evicted = dead.len();
    report
}

/// Every connected monitor socket, whether or not it listens to a call.
#[derive(Debug, Default)]
pub struct MonitorHub {
    monitors: HashSet<PeerSink>,
}

impl MonitorHub {
    pub fn attach(&mut self, monitor: PeerSink) -> bool {
        self.monitors.insert(monitor)
    }

    pub fn detach(&mut self, monitor: &PeerSink) -> bool {
        self.monitors.remove(monitor)
    }

    pub fn len(&self) -> usize {
        self.monitors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.monitors.is_empty()
    }

    pub fn broadcast(&mut self, text: &str) -> BroadcastReport {
        broadcast(&mut self.monitors, text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::peer::OutboundFrame;

    #[test]
    fn test_broadcast_evicts_closed_listener() {
        let (a, mut rx_a) = PeerSink::channel();
        let (b, mut rx_b) = PeerSink::channel();
        let (c, _rx_c) = PeerSink::channel();
        c.close();

        let mut listeners: HashSet<PeerSink> = [a, b, c.clone()].into_iter().collect();
        let report = broadcast(&mut listeners, "frame");

        assert_eq!(report, BroadcastReport { delivered: 2, evicted: 1 });
        assert_eq!(listeners.len(), 2);
        assert!(!listeners.contains(&c));
        assert_eq!(rx_a.try_recv().unwrap(), OutboundFrame::Text("frame".into()));
        assert_eq!(rx_b.try_recv().unwrap(), OutboundFrame::Text("frame".into()));
    }

    #[test]
    fn test_broadcast_to_empty_set() {
        let mut listeners = HashSet::new();
        assert_eq!(broadcast(&mut listeners, "x"), BroadcastReport::default());
    }

    #[test]
    fn test_hub_drops_disconnected_monitor() {
        let mut hub = MonitorHub::default();
        let (live, _rx) = PeerSink::channel();
        let (gone, gone_rx) = PeerSink::channel();
        assert!(hub.attach(live.clone()));
        assert!(!hub.attach(live));
        hub.attach(gone);
        drop(gone_rx);

        assert_eq!(hub.broadcast("hello").evicted, 1);
        assert_eq!(hub.len(), 1);
    }
}
