//! Downstream relay loop - peripheral-role publishing cadence.
//!
//! Every period, if a sink is attached, snapshot the reading cache, encode
//! one [`RelayPacket`] and hand it to the sink transport's "set value +
//! notify" primitive. Nothing is queued: a packet the sink misses is
//! superseded by the next period's fresher one.

use embassy_sync::blocking_mutex::raw::RawMutex;

use crate::context::RelayContext;
use crate::error::SinkError;
use crate::packet::{PacketLayout, RelayPacket};
use crate::reading::Reading;
use crate::schedule::Cadence;

/// Peripheral-role "set value + notify subscribers" primitive.
///
/// Must return promptly; the relay loop never waits on sink backpressure.
pub trait SinkNotifier {
    fn publish(&mut self, data: &[u8]) -> Result<(), SinkError>;
}

/// What one relay period did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TickOutcome {
    /// No sink attached - nothing built, nothing sent.
    Idle,
    /// Fresh snapshot published.
    Sent,
    /// Cache was busy; previous snapshot published instead.
    Stale,
    /// The sink transport rejected the packet.
    Failed(SinkError),
}

pub struct RelayLoop<'a, M: RawMutex, S: SinkNotifier> {
    ctx: &'a RelayContext<M>,
    sink: S,
    layout: PacketLayout,
    last: Reading,
}

impl<'a, M: RawMutex, S: SinkNotifier> RelayLoop<'a, M, S> {
    pub fn new(ctx: &'a RelayContext<M>, sink: S, layout: PacketLayout) -> Self {
        Self {
            ctx,
            sink,
            layout,
            last: Reading::default(),
        }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// One relay period.
    pub fn tick(&mut self) -> TickOutcome {
        if !self.ctx.sink_attached() {
            return TickOutcome::Idle;
        }

        let stale = match self.ctx.cache.try_snapshot() {
            Some(reading) => {
                self.last = reading;
                false
            }
            None => {
                trace!("relay: cache busy, reusing previous snapshot");
                true
            }
        };

        let packet = RelayPacket::from_reading(self.layout, &self.last);
        match self.sink.publish(packet.as_bytes()) {
            Ok(()) => {
                debug!("relay: sent {:?}", packet.as_bytes());
                if stale {
                    TickOutcome::Stale
                } else {
                    TickOutcome::Sent
                }
            }
            Err(e) => {
                warn!("relay: publish failed: {:?}", e);
                TickOutcome::Failed(e)
            }
        }
    }

    pub async fn run(&mut self, cadence: &mut impl Cadence) -> ! {
        loop {
            cadence.wait().await;
            self.tick();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reading::Field;
    use crate::schedule::Ticks;
    use embassy_futures::block_on;
    use embassy_futures::select::select;
    use embassy_sync::blocking_mutex::raw::NoopRawMutex;
    use std::vec::Vec;

    #[derive(Default)]
    struct MockSink {
        sent: Vec<Vec<u8>>,
        fail: bool,
    }

    impl SinkNotifier for MockSink {
        fn publish(&mut self, data: &[u8]) -> Result<(), SinkError> {
            if self.fail {
                return Err(SinkError::NotifyFailed);
            }
            self.sent.push(data.to_vec());
            Ok(())
        }
    }

    #[test]
    fn detached_ticks_never_touch_the_transport() {
        let ctx: RelayContext<NoopRawMutex> = RelayContext::new();
        let mut relay = RelayLoop::new(&ctx, MockSink::default(), PacketLayout::Pair);

        for _ in 0..20 {
            assert_eq!(relay.tick(), TickOutcome::Idle);
        }
        assert!(relay.sink().sent.is_empty());
    }

    #[test]
    fn attached_ticks_send_exactly_one_packet_each() {
        let ctx: RelayContext<NoopRawMutex> = RelayContext::new();
        ctx.set_sink_attached(true);
        let mut relay = RelayLoop::new(&ctx, MockSink::default(), PacketLayout::Pair);

        for n in 1..=5 {
            assert_eq!(relay.tick(), TickOutcome::Sent);
            assert_eq!(relay.sink().sent.len(), n);
        }
    }

    #[test]
    fn packet_reflects_cache_at_tick_time() {
        let ctx: RelayContext<NoopRawMutex> = RelayContext::new();
        ctx.set_sink_attached(true);
        let mut relay = RelayLoop::new(&ctx, MockSink::default(), PacketLayout::Triple);

        block_on(ctx.cache.update(Field::Primary, 72));
        block_on(ctx.cache.update(Field::Secondary, 10));
        block_on(ctx.cache.update(Field::Tertiary, 1));
        relay.tick();

        block_on(ctx.cache.update(Field::Primary, 80));
        relay.tick();

        assert_eq!(relay.sink().sent, [[72u8, 10, 1].to_vec(), [80u8, 10, 1].to_vec()]);
    }

    #[test]
    fn busy_cache_falls_back_to_previous_snapshot() {
        let ctx: RelayContext<NoopRawMutex> = RelayContext::new();
        ctx.set_sink_attached(true);
        let mut relay = RelayLoop::new(&ctx, MockSink::default(), PacketLayout::Pair);

        block_on(ctx.cache.update(Field::Primary, 72));
        assert_eq!(relay.tick(), TickOutcome::Sent);

        let guard = ctx.cache.hold();
        assert_eq!(relay.tick(), TickOutcome::Stale);
        drop(guard);

        assert_eq!(relay.sink().sent, [[72u8, 0].to_vec(), [72u8, 0].to_vec()]);
    }

    #[test]
    fn busy_cache_before_first_snapshot_sends_defaults() {
        let ctx: RelayContext<NoopRawMutex> = RelayContext::new();
        ctx.set_sink_attached(true);
        let mut relay = RelayLoop::new(&ctx, MockSink::default(), PacketLayout::Single);

        let _guard = ctx.cache.hold();
        assert_eq!(relay.tick(), TickOutcome::Stale);
        assert_eq!(relay.sink().sent, [[0u8].to_vec()]);
    }

    #[test]
    fn publish_failure_is_not_retried() {
        let ctx: RelayContext<NoopRawMutex> = RelayContext::new();
        ctx.set_sink_attached(true);
        let sink = MockSink {
            fail: true,
            ..Default::default()
        };
        let mut relay = RelayLoop::new(&ctx, sink, PacketLayout::Pair);

        assert_eq!(
            relay.tick(),
            TickOutcome::Failed(SinkError::NotifyFailed)
        );
        assert!(relay.sink().sent.is_empty());
    }

    #[test]
    fn detach_stops_publishing() {
        let ctx: RelayContext<NoopRawMutex> = RelayContext::new();
        ctx.set_sink_attached(true);
        let mut relay = RelayLoop::new(&ctx, MockSink::default(), PacketLayout::Pair);

        relay.tick();
        ctx.set_sink_attached(false);
        relay.tick();
        relay.tick();
        assert_eq!(relay.sink().sent.len(), 1);
    }

    #[test]
    fn run_publishes_once_per_period() {
        let ctx: RelayContext<NoopRawMutex> = RelayContext::new();
        ctx.set_sink_attached(true);
        let mut relay = RelayLoop::new(&ctx, MockSink::default(), PacketLayout::Pair);
        let mut ticks = Ticks(7);

        block_on(select(relay.run(&mut ticks), core::future::ready(())));
        assert_eq!(relay.sink().sent.len(), 7);
    }
}
