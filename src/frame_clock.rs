//! Frame timing: presentation-time prediction and the per-frame tick signal.

use std::num::NonZeroU64;
use std::time::Duration;

use async_channel::{Receiver, Sender, TrySendError};

use crate::animation::Clock;
use crate::utils::{duration_to_nanos, get_monotonic_time};

/// Predicts when the next frame will be presented.
#[derive(Debug)]
pub struct FrameClock {
    last_presentation_time: Option<Duration>,
    refresh_interval_ns: Option<NonZeroU64>,
    vrr: bool,
}

impl FrameClock {
    pub fn new(refresh_interval: Option<Duration>, vrr: bool) -> Self {
        let refresh_interval_ns =
            refresh_interval.and_then(|interval| NonZeroU64::new(duration_to_nanos(interval)));

        Self {
            last_presentation_time: None,
            refresh_interval_ns,
            vrr,
        }
    }

    pub fn refresh_interval(&self) -> Option<Duration> {
        self.refresh_interval_ns
            .map(|r| Duration::from_nanos(r.get()))
    }

    pub fn set_vrr(&mut self, vrr: bool) {
        if self.vrr == vrr {
            return;
        }

        self.vrr = vrr;
        self.last_presentation_time = None;
    }

    pub fn vrr(&self) -> bool {
        self.vrr
    }

    pub fn presented(&mut self, presentation_time: Duration) {
        if presentation_time.is_zero() {
            // Not interested in these.
            return;
        }

        self.last_presentation_time = Some(presentation_time);
    }

    pub fn next_presentation_time(&self) -> Duration {
        self.next_presentation_time_after(get_monotonic_time())
    }

    fn next_presentation_time_after(&self, mut now: Duration) -> Duration {
        let Some(refresh_interval_ns) = self.refresh_interval_ns else {
            return now;
        };
        let Some(last_presentation_time) = self.last_presentation_time else {
            return now;
        };

        let refresh_interval_ns = refresh_interval_ns.get();
        let refresh_interval = Duration::from_nanos(refresh_interval_ns);

        if now <= last_presentation_time {
            // The last frame was presented ahead of the clock.
            let orig_now = now;
            now += refresh_interval;

            if now < last_presentation_time {
                error!(
                    now = ?orig_now,
                    ?last_presentation_time,
                    "got a presentation time more than one frame ahead, {:?} until presentation",
                    last_presentation_time - now,
                );
                now = last_presentation_time + refresh_interval;
            }
        }

        let since_last_ns = duration_to_nanos(now - last_presentation_time);
        let to_next_ns = (since_last_ns / refresh_interval_ns + 1) * refresh_interval_ns;

        // VRR presents as soon as possible once a frame was missed.
        if self.vrr && to_next_ns > refresh_interval_ns {
            now
        } else {
            last_presentation_time + Duration::from_nanos(to_next_ns)
        }
    }
}

/// Broadcasts frame ticks to every [`FrameTicks`] subscribed to it.
///
/// Each tick moves the shared [`Clock`] to the frame time first, so everything computed for the
/// frame sees the same time.
#[derive(Debug)]
pub struct FrameTicker {
    clock: Clock,
    subscribers: Vec<Sender<Duration>>,
}

/// One subscriber's view of the frame ticks.
#[derive(Debug)]
pub struct FrameTicks {
    receiver: Receiver<Duration>,
}

impl FrameTicker {
    pub fn new(clock: Clock) -> Self {
        Self {
            clock,
            subscribers: Vec::new(),
        }
    }

    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    pub fn subscribe(&mut self) -> FrameTicks {
        // One slot: ticks a subscriber has not consumed yet are coalesced.
        let (sender, receiver) = async_channel::bounded(1);
        self.subscribers.push(sender);
        FrameTicks { receiver }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    pub fn tick(&mut self, frame_time: Duration) {
        let _span = tracy_client::span!("FrameTicker::tick");

        self.clock.set_unadjusted(frame_time);
        self.subscribers
            .retain(|sender| match sender.try_send(frame_time) {
                Ok(()) | Err(TrySendError::Full(_)) => true,
                Err(TrySendError::Closed(_)) => false,
            });
    }
}

impl FrameTicks {
    /// Waits for the next frame.
    ///
    /// Returns `None` once the [`FrameTicker`] is gone.
    pub async fn next_frame(&self) -> Option<Duration> {
        let mut frame_time = self.receiver.recv().await.ok()?;
        while let Ok(later) = self.receiver.try_recv() {
            frame_time = later;
        }
        Some(frame_time)
    }
}

#[cfg(test)]
mod tests {
    use futures_util::FutureExt;

    use super::*;

    const REFRESH: Duration = Duration::from_millis(16);

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    #[test]
    fn presentation_without_history() {
        let clock = FrameClock::new(Some(REFRESH), false);
        assert_eq!(clock.next_presentation_time_after(ms(100)), ms(100));

        let unpaced = FrameClock::new(None, false);
        assert_eq!(unpaced.refresh_interval(), None);
        assert_eq!(unpaced.next_presentation_time_after(ms(5)), ms(5));
    }

    #[test]
    fn presentation_rounds_to_refresh() {
        let mut clock = FrameClock::new(Some(REFRESH), false);
        clock.presented(ms(100));
        assert_eq!(clock.next_presentation_time_after(ms(105)), ms(116));
        assert_eq!(clock.next_presentation_time_after(ms(120)), ms(132));
        // Presented slightly ahead of the clock.
        assert_eq!(clock.next_presentation_time_after(ms(99)), ms(116));
    }

    #[test]
    fn vrr_presents_immediately_after_missed_frame() {
        let mut clock = FrameClock::new(Some(REFRESH), true);
        clock.presented(ms(100));
        assert_eq!(clock.next_presentation_time_after(ms(105)), ms(116));
        assert_eq!(clock.next_presentation_time_after(ms(120)), ms(120));

        clock.set_vrr(false);
        assert!(!clock.vrr());
        assert_eq!(clock.next_presentation_time_after(ms(120)), ms(120));
    }

    #[test]
    fn ticks_move_clock_and_coalesce() {
        let clock = Clock::with_time(Duration::ZERO);
        let mut ticker = FrameTicker::new(clock.clone());
        let ticks = ticker.subscribe();

        assert_eq!(ticks.next_frame().now_or_never(), None);

        ticker.tick(ms(16));
        ticker.tick(ms(32));
        assert_eq!(ticker.clock(), &clock);
        assert_eq!(ticker.clock().now(), ms(32));
        assert_eq!(ticks.next_frame().now_or_never(), Some(Some(ms(16))));
        assert_eq!(ticks.next_frame().now_or_never(), None);

        drop(ticker);
        assert_eq!(ticks.next_frame().now_or_never(), Some(None));
    }

    #[test]
    fn dropped_subscribers_are_forgotten() {
        let mut ticker = FrameTicker::new(Clock::with_time(Duration::ZERO));
        let first = ticker.subscribe();
        let _second = ticker.subscribe();
        assert_eq!(ticker.subscriber_count(), 2);

        drop(first);
        ticker.tick(ms(16));
        assert_eq!(ticker.subscriber_count(), 1);
    }
}
