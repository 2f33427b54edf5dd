//! Process-wide relay state, owned in one place.
//!
//! The firmware builds exactly one [`RelayContext`] in a `StaticCell` and
//! hands `&'static` references to every task. Tests build one on the stack.
//!
//! Ownership of each part:
//! - `cache` - written by the upstream link and the command path.
//! - link status - written only by [`UpstreamLink`](crate::link::UpstreamLink).
//! - attachment - written only by [`ConnectionEvents`](crate::events::ConnectionEvents).
//! - `source_events` - transport produces, upstream link consumes.
//! - `control` - command path produces, upstream link consumes.

use core::sync::atomic::{AtomicBool, Ordering};

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::channel::Channel;
use embassy_sync::signal::Signal;

use crate::config::SOURCE_EVENT_DEPTH;
use crate::link::{ControlWrite, LinkState, LinkStatus, SourceEvent};
use crate::reading::ReadingCache;

pub struct RelayContext<M: RawMutex> {
    pub cache: ReadingCache<M>,
    /// Transport -> link manager. Bounded; producers `try_send` and drop on full.
    pub source_events: Channel<M, SourceEvent, SOURCE_EVENT_DEPTH>,
    /// Command path -> link manager. Holds at most one pending write.
    pub control: Signal<M, ControlWrite>,
    link: LinkStatus,
    attached: AtomicBool,
}

impl<M: RawMutex> RelayContext<M> {
    pub const fn new() -> Self {
        Self {
            cache: ReadingCache::new(),
            source_events: Channel::new(),
            control: Signal::new(),
            link: LinkStatus::new(),
            attached: AtomicBool::new(false),
        }
    }

    pub fn link_state(&self) -> LinkState {
        self.link.get()
    }

    pub(crate) fn set_link_state(&self, state: LinkState) {
        self.link.set(state);
    }

    pub fn sink_attached(&self) -> bool {
        self.attached.load(Ordering::Acquire)
    }

    pub(crate) fn set_sink_attached(&self, attached: bool) {
        self.attached.store(attached, Ordering::Release);
    }
}

impl<M: RawMutex> Default for RelayContext<M> {
    fn default() -> Self {
        Self::new()
    }
}
