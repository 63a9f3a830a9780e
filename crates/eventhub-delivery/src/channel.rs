//! Delivery channel trait.

use std::fmt::Debug;
use std::ops::AddAssign;

use async_trait::async_trait;

use eventhub_core::result::AppResult;
use eventhub_entity::event::EventSnapshot;

/// Outcome of one `notify` call, counted per member.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Members the message was handed to.
    pub delivered: usize,
    /// Members without an address on this channel.
    pub skipped: usize,
    /// Members whose send failed.
    pub failed: usize,
}

impl DeliveryReport {
    /// Members accounted for in this report.
    pub fn total(&self) -> usize {
        self.delivered + self.skipped + self.failed
    }
}

impl AddAssign for DeliveryReport {
    fn add_assign(&mut self, rhs: Self) {
        self.delivered += rhs.delivered;
        self.skipped += rhs.skipped;
        self.failed += rhs.failed;
    }
}

/// A push channel that can reach event members.
///
/// Implementations must not abort on a single unreachable member. An `Err`
/// means the channel as a whole could not be used for this call.
#[async_trait]
pub trait DeliveryChannel: Send + Sync + Debug + 'static {
    /// Short identifier used in logs.
    fn name(&self) -> &str;

    /// Deliver `message` to every member in `snapshot`.
    async fn notify(&self, snapshot: &EventSnapshot, message: &str) -> AppResult<DeliveryReport>;
}
