use std::sync::{
    atomic::{AtomicBool, Ordering},
    Mutex,
};

use log::{info, warn};
use tokio::sync::broadcast;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReachabilityEvent {
    BecameReachable,
    BecameUnreachable,
}

/// Turns raw path updates into transitions.
///
/// The state starts unknown, so the first "up" counts as an edge and anything
/// left in the queue from a previous run is flushed at startup.
#[derive(Debug, Default)]
pub struct EdgeDetector {
    last: Option<bool>,
}

impl EdgeDetector {
    pub fn observe(&mut self, online: bool) -> Option<ReachabilityEvent> {
        match (self.last.replace(online), online) {
            (Some(previous), current) if previous == current => None,
            (_, true) => Some(ReachabilityEvent::BecameReachable),
            (Some(true), false) => Some(ReachabilityEvent::BecameUnreachable),
            (_, false) => None,
        }
    }
}

pub struct ReachabilityMonitor {
    detector: Mutex<EdgeDetector>,
    reachable: AtomicBool,
    events: broadcast::Sender<ReachabilityEvent>,
}

impl Default for ReachabilityMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl ReachabilityMonitor {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            detector: Mutex::new(EdgeDetector::default()),
            reachable: AtomicBool::new(false),
            events,
        }
    }

    /// Feeds one path update. Publishes and returns the transition, if any.
    pub fn report(&self, online: bool) -> Option<ReachabilityEvent> {
        // Flag and published events follow the detector's order.
        let mut detector = self
            .detector
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let event = detector.observe(online);
        self.reachable.store(online, Ordering::SeqCst);

        if let Some(event) = event {
            match event {
                ReachabilityEvent::BecameReachable => info!("Remote store reachable"),
                ReachabilityEvent::BecameUnreachable => warn!("Remote store unreachable"),
            }
            // No subscribers is fine; the state is still tracked.
            let _ = self.events.send(event);
        }
        drop(detector);
        event
    }

    pub fn is_reachable(&self) -> bool {
        self.reachable.load(Ordering::SeqCst)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ReachabilityEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_down_to_up_reports_reachable() {
        let mut detector = EdgeDetector::default();
        let events: Vec<_> = [false, false, true, true, false, true]
            .into_iter()
            .filter_map(|online| detector.observe(online))
            .collect();

        assert_eq!(
            events,
            vec![
                ReachabilityEvent::BecameReachable,
                ReachabilityEvent::BecameUnreachable,
                ReachabilityEvent::BecameReachable,
            ]
        );
    }

    #[test]
    fn first_up_is_an_edge() {
        let mut detector = EdgeDetector::default();
        assert_eq!(detector.observe(true), Some(ReachabilityEvent::BecameReachable));
        assert_eq!(detector.observe(true), None);
    }

    #[tokio::test]
    async fn subscribers_receive_coalesced_edges() {
        let monitor = ReachabilityMonitor::new();
        let mut rx = monitor.subscribe();

        for online in [false, false, true, true, false, true] {
            monitor.report(online);
        }
        assert!(monitor.is_reachable());

        let mut reachable = 0;
        while let Ok(event) = rx.try_recv() {
            if event == ReachabilityEvent::BecameReachable {
                reachable += 1;
            }
        }
        assert_eq!(reachable, 2);
    }

    #[test]
    fn concurrent_reports_leave_flag_matching_last_observation() {
        let monitor = std::sync::Arc::new(ReachabilityMonitor::new());
        let reporters: Vec<_> = (0..4)
            .map(|i| {
                let monitor = monitor.clone();
                std::thread::spawn(move || {
                    for n in 0..500 {
                        monitor.report((n + i) % 2 == 0);
                    }
                })
            })
            .collect();
        for reporter in reporters {
            reporter.join().unwrap();
        }

        let last = monitor.detector.lock().unwrap().last;
        assert_eq!(last, Some(monitor.is_reachable()));
    }
}
