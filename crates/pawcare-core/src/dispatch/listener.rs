//! Level-up notification sink.

use tokio::sync::mpsc;

use crate::progression::LevelUp;

/// Receives level crossings produced by XP-bearing calls.
///
/// Called synchronously after the new XP has been stored; implementations
/// should hand the event off rather than block.
pub trait LevelUpListener: Send + Sync {
    fn on_level_up(&self, event: LevelUp);
}

/// Drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLevelUpListener;

impl LevelUpListener for NoopLevelUpListener {
    fn on_level_up(&self, _event: LevelUp) {}
}

impl<F> LevelUpListener for F
where
    F: Fn(LevelUp) + Send + Sync,
{
    fn on_level_up(&self, event: LevelUp) {
        self(event)
    }
}

/// Forwards events to an unbounded channel, e.g. for a UI task to show the
/// level-up modal.
#[derive(Debug, Clone)]
pub struct ChannelLevelUpListener {
    tx: mpsc::UnboundedSender<LevelUp>,
}

impl ChannelLevelUpListener {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<LevelUp>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl LevelUpListener for ChannelLevelUpListener {
    fn on_level_up(&self, event: LevelUp) {
        if self.tx.send(event).is_err() {
            tracing::debug!(?event, "level-up receiver gone, event dropped");
        }
    }
}
