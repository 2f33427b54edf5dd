//! Periodic task cadence.
//!
//! Both long-running loops (upstream retry, downstream publish) are written
//! against [`Cadence`] instead of sleeping directly, so tests can step them
//! without a clock.

/// One period of a periodic loop.
#[allow(async_fn_in_trait)]
pub trait Cadence {
    /// Resolve when the next period starts.
    async fn wait(&mut self);
}

#[cfg(feature = "embedded")]
impl Cadence for embassy_time::Ticker {
    async fn wait(&mut self) {
        self.next().await
    }
}

/// Cadence with a fixed number of periods, then silence. Lets a test run
/// a `-> !` loop for exactly that many periods.
#[cfg(test)]
pub(crate) struct Ticks(pub usize);

#[cfg(test)]
impl Cadence for Ticks {
    async fn wait(&mut self) {
        if self.0 == 0 {
            core::future::pending::<()>().await;
        }
        self.0 -= 1;
    }
}
