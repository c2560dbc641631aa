//! Cadence bookkeeping for the refresh triggers.
//!
//! Each trigger fires at most one fetch at a time. A firing bumps the
//! trigger's generation and remembers it as the in-flight token; only a
//! completion carrying that token is applied. Fetches that outlive the
//! timeout are abandoned, which makes their eventual completion stale. A
//! refresh requested during a fetch fires as soon as that fetch settles.
use std::time::{Duration, Instant};

use log::{debug, warn};

use crate::types::TriggerKind;

/// Identifies one fetch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Ticket {
    pub kind: TriggerKind,
    pub generation: u64,
}

#[derive(Debug)]
struct Trigger {
    kind: TriggerKind,
    period: Duration,
    next_due: Instant,
    generation: u64,
    in_flight: Option<(u64, Instant)>,
    // 抓取进行中收到的刷新请求
    refresh_pending: bool,
}

#[derive(Debug)]
pub struct Scheduler {
    triggers: Vec<Trigger>,
    fetch_timeout: Duration,
    torn_down: bool,
}

impl Scheduler {
    /// All triggers are due immediately.
    pub fn new(periods: &[(TriggerKind, Duration)], fetch_timeout: Duration, now: Instant) -> Self {
        let triggers = periods
            .iter()
            .map(|&(kind, period)| Trigger {
                kind,
                period,
                next_due: now,
                generation: 0,
                in_flight: None,
                refresh_pending: false,
            })
            .collect();
        Self { triggers, fetch_timeout, torn_down: false }
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    fn trigger_mut(&mut self, kind: TriggerKind) -> Option<&mut Trigger> {
        self.triggers.iter_mut().find(|t| t.kind == kind)
    }

    /// Fires every trigger that is due and idle.
    pub fn due(&mut self, now: Instant) -> Vec<Ticket> {
        if self.torn_down {
            return Vec::new();
        }
        let fetch_timeout = self.fetch_timeout;
        let mut tickets = Vec::new();
        for trigger in &mut self.triggers {
            if let Some((generation, started)) = trigger.in_flight {
                if now.duration_since(started) >= fetch_timeout {
                    warn!(
                        "{} fetch #{generation} timed out after {:?}, abandoning",
                        trigger.kind.label(),
                        fetch_timeout
                    );
                    trigger.in_flight = None;
                    if trigger.refresh_pending {
                        trigger.next_due = now;
                    }
                }
            }
            if now < trigger.next_due {
                continue;
            }
            trigger.next_due = now + trigger.period;
            if trigger.in_flight.is_some() {
                debug!("{} tick skipped, previous fetch still running", trigger.kind.label());
                continue;
            }
            trigger.generation += 1;
            trigger.in_flight = Some((trigger.generation, now));
            trigger.refresh_pending = false;
            tickets.push(Ticket { kind: trigger.kind, generation: trigger.generation });
        }
        tickets
    }

    /// Makes `kind` due right away. While a fetch is in flight the request is
    /// held and fires once that fetch completes or is abandoned.
    pub fn request(&mut self, kind: TriggerKind, now: Instant) {
        if let Some(trigger) = self.trigger_mut(kind) {
            if trigger.in_flight.is_some() {
                trigger.refresh_pending = true;
            } else {
                trigger.next_due = now;
            }
        }
    }

    /// Whether the result of `ticket` should be applied.
    pub fn complete(&mut self, ticket: Ticket) -> bool {
        if self.torn_down {
            return false;
        }
        let Some(trigger) = self.trigger_mut(ticket.kind) else {
            return false;
        };
        match trigger.in_flight {
            Some((generation, started)) if generation == ticket.generation => {
                trigger.in_flight = None;
                if trigger.refresh_pending {
                    // 已经过去的时刻, 下一次 due 立即触发
                    trigger.next_due = started;
                }
                true
            }
            _ => false,
        }
    }

    /// Earliest instant at which `due` has something to do.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.triggers
            .iter()
            .flat_map(|t| {
                let expiry = t.in_flight.map(|(_, started)| started + self.fetch_timeout);
                [Some(t.next_due), expiry]
            })
            .flatten()
            .min()
    }

    pub fn teardown(&mut self) {
        self.torn_down = true;
        for trigger in &mut self.triggers {
            trigger.in_flight = None;
            trigger.refresh_pending = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scheduler(now: Instant) -> Scheduler {
        Scheduler::new(
            &[
                (TriggerKind::Stream, Duration::from_millis(1000)),
                (TriggerKind::Attention, Duration::from_millis(500)),
            ],
            Duration::from_secs(5),
            now,
        )
    }

    #[test]
    fn everything_fires_on_start_then_follows_cadence() {
        let t0 = Instant::now();
        let mut s = scheduler(t0);
        let first = s.due(t0);
        assert_eq!(first.len(), 2);
        assert!(first.iter().all(|t| t.generation == 1));
        for ticket in first {
            assert!(s.complete(ticket));
        }
        assert!(s.due(t0 + Duration::from_millis(100)).is_empty());
        let tick = s.due(t0 + Duration::from_millis(500));
        assert_eq!(tick, vec![Ticket { kind: TriggerKind::Attention, generation: 2 }]);
    }

    #[test]
    fn in_flight_guard_prevents_overlap() {
        let t0 = Instant::now();
        let mut s = scheduler(t0);
        let first = s.due(t0);
        assert!(s.due(t0 + Duration::from_millis(1500)).is_empty());
        for ticket in first {
            assert!(s.complete(ticket));
        }
        assert_eq!(s.due(t0 + Duration::from_millis(2600)).len(), 2);
    }

    #[test]
    fn stale_and_duplicate_completions_are_rejected() {
        let t0 = Instant::now();
        let mut s = scheduler(t0);
        let ticket = s.due(t0)[0];
        assert!(!s.complete(Ticket { generation: ticket.generation + 1, ..ticket }));
        assert!(s.complete(ticket));
        assert!(!s.complete(ticket));
    }

    #[test]
    fn timed_out_fetch_is_abandoned() {
        let t0 = Instant::now();
        let mut s = Scheduler::new(
            &[(TriggerKind::Meditation, Duration::from_millis(100))],
            Duration::from_millis(300),
            t0,
        );
        let old = s.due(t0)[0];
        let fresh = s.due(t0 + Duration::from_millis(300));
        assert_eq!(fresh, vec![Ticket { kind: TriggerKind::Meditation, generation: 2 }]);
        assert!(!s.complete(old));
        assert!(s.complete(fresh[0]));
    }

    #[test]
    fn teardown_stops_firing_and_applying() {
        let t0 = Instant::now();
        let mut s = scheduler(t0);
        let tickets = s.due(t0);
        s.teardown();
        assert!(s.is_torn_down());
        assert!(tickets.into_iter().all(|t| !s.complete(t)));
        assert!(s.due(t0 + Duration::from_secs(10)).is_empty());
    }

    #[test]
    fn request_makes_trigger_due_now() {
        let t0 = Instant::now();
        let mut s = scheduler(t0);
        for ticket in s.due(t0) {
            s.complete(ticket);
        }
        let t1 = t0 + Duration::from_millis(10);
        s.request(TriggerKind::Stream, t1);
        assert_eq!(s.next_deadline(), Some(t1));
        assert_eq!(s.due(t1).len(), 1);
    }

    #[test]
    fn refresh_during_fetch_fires_after_completion() {
        let t0 = Instant::now();
        let mut s = Scheduler::new(
            &[(TriggerKind::Attention, Duration::from_secs(60))],
            Duration::from_secs(5),
            t0,
        );
        let first = s.due(t0)[0];
        let t1 = t0 + Duration::from_millis(10);
        s.request(TriggerKind::Attention, t1);
        assert!(s.due(t1).is_empty());
        assert!(s.complete(first));
        let t2 = t0 + Duration::from_millis(20);
        assert!(s.next_deadline().is_some_and(|d| d <= t2));
        assert_eq!(s.due(t2), vec![Ticket { kind: TriggerKind::Attention, generation: 2 }]);
        // 已消费, 不会再次触发
        assert!(s.complete(Ticket { kind: TriggerKind::Attention, generation: 2 }));
        assert!(s.due(t0 + Duration::from_secs(1)).is_empty());
    }

    #[test]
    fn refresh_during_fetch_fires_after_timeout() {
        let t0 = Instant::now();
        let mut s = Scheduler::new(
            &[(TriggerKind::Meditation, Duration::from_secs(60))],
            Duration::from_millis(300),
            t0,
        );
        let old = s.due(t0)[0];
        s.request(TriggerKind::Meditation, t0 + Duration::from_millis(10));
        let fresh = s.due(t0 + Duration::from_millis(300));
        assert_eq!(fresh, vec![Ticket { kind: TriggerKind::Meditation, generation: 2 }]);
        assert!(!s.complete(old));
    }
}
