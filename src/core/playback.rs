use crate::error::Result;

/// Something a channel's underlying media reports back to the mixer.
#[derive(Clone, Debug, PartialEq)]
pub enum ChannelEvent {
    /// Media decoded; duration in seconds is known.
    Ready { duration: f64 },
    /// Play head moved.
    Position(f64),
    /// Reached the end of the media.
    Finished,
    /// Media could not be fetched or decoded.
    LoadFailed(String),
    /// User clicked or dragged this channel's timeline.
    Interaction(f64),
}

/// One channel's media resource. Owned exclusively by the mixer.
pub trait PlaybackHandle {
    fn play(&mut self) -> Result<()>;
    fn pause(&mut self);
    fn set_time(&mut self, secs: f64);
    fn set_muted(&mut self, muted: bool);
    fn position(&self) -> f64;
    fn duration(&self) -> Option<f64>;

    /// Stop and free the resource. Called exactly once, when the session
    /// holding the handle is torn down.
    fn release(&mut self);

    /// Pull-style backends move their play head here and report what
    /// happened; push-style backends deliver events to the mixer directly.
    fn advance(&mut self, _dt: f64) -> Option<ChannelEvent> {
        None
    }
}

/// Builds a handle for a stem URL.
pub trait PlaybackFactory {
    fn create(&mut self, name: &str, url: &str) -> Result<Box<dyn PlaybackHandle>>;
}
