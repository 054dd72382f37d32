//! Timers that post into the event queue.
//!
//! A timer is a tokio task owned by a [`Timer`] value. Cancelling or dropping
//! the value aborts the task. Because a firing may already sit in the queue
//! when the timer is cancelled, every posted event carries the timer's
//! [`TimerToken`]; owners compare it against their live timer and ignore
//! stale firings.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::trace;

use crate::ble::central::PeripheralHandle;
use crate::event::{Event, EventSender};

static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

/// Identity of one armed timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerToken(u64);

impl TimerToken {
    fn next() -> Self {
        Self(NEXT_TOKEN.fetch_add(1, Ordering::Relaxed))
    }
}

/// An armed timer. Aborted on drop.
#[derive(Debug)]
pub(crate) struct Timer {
    token: TimerToken,
    handle: JoinHandle<()>,
}

impl Timer {
    /// Post `make(token)` once after `delay`.
    pub(crate) fn once<P, F>(delay: Duration, events: &EventSender<P>, make: F) -> Self
    where
        P: PeripheralHandle,
        F: FnOnce(TimerToken) -> Event<P> + Send + 'static,
    {
        let token = TimerToken::next();
        let events = events.clone();

        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            trace!("One-shot timer {:?} fired", token);
            let _ = events.send(make(token));
        });

        Self { token, handle }
    }

    /// Post `make(token)` every `period`, first after one full period.
    pub(crate) fn repeating<P, F>(period: Duration, events: &EventSender<P>, make: F) -> Self
    where
        P: PeripheralHandle,
        F: Fn(TimerToken) -> Event<P> + Send + 'static,
    {
        let token = TimerToken::next();
        let events = events.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                trace!("Repeating timer {:?} ticked", token);
                if events.send(make(token)).is_err() {
                    break;
                }
            }
        });

        Self { token, handle }
    }

    /// Token carried by this timer's events.
    pub(crate) fn token(&self) -> TimerToken {
        self.token
    }

    /// Check whether an event token belongs to this timer.
    pub(crate) fn owns(&self, token: TimerToken) -> bool {
        self.token == token
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ble::fake::FakePeripheral;
    use crate::event::event_channel;

    fn drain(rx: &mut crate::event::EventReceiver<FakePeripheral>) -> Vec<TimerToken> {
        let mut tokens = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let Event::Rescan { token } = event {
                tokens.push(token);
            }
        }
        tokens
    }

    #[tokio::test(start_paused = true)]
    async fn test_once_fires_after_delay() {
        let (tx, mut rx) = event_channel::<FakePeripheral>();
        let timer = Timer::once(Duration::from_secs(5), &tx, |token| Event::Rescan { token });

        tokio::time::sleep(Duration::from_millis(4900)).await;
        assert!(drain(&mut rx).is_empty());

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(drain(&mut rx), vec![timer.token()]);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels() {
        let (tx, mut rx) = event_channel::<FakePeripheral>();
        let timer = Timer::once(Duration::from_secs(1), &tx, |token| Event::Rescan { token });
        drop(timer);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeating_ticks() {
        let (tx, mut rx) = event_channel::<FakePeripheral>();
        let timer = Timer::repeating(Duration::from_secs(3), &tx, |token| Event::Rescan { token });

        tokio::time::sleep(Duration::from_millis(9500)).await;
        let tokens = drain(&mut rx);
        assert_eq!(tokens.len(), 3);
        assert!(tokens.iter().all(|t| timer.owns(*t)));
    }

    #[test]
    fn test_tokens_are_unique() {
        assert_ne!(TimerToken::next(), TimerToken::next());
    }
}
