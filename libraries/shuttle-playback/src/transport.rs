//! Bridge to the host's transport-control surface
//!
//! Lock-screen widgets, notification controls and media keys are host
//! objects. The playback core only needs two things from them: a place to
//! publish the "active" flag, and a stream of [`TransportCommand`]s coming
//! back, which the host forwards through
//! [`crate::PlaybackHandle::transport`].

use serde::{Deserialize, Serialize};

/// Host-provided transport surface
pub trait TransportControls: Send {
    /// Show or hide the surface
    ///
    /// Active while playing, inactive when paused or idle.
    fn set_active(&mut self, active: bool);
}

/// Surface for hosts without transport controls
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTransport;

impl TransportControls for NoTransport {
    fn set_active(&mut self, _active: bool) {}
}

/// Command issued by the transport surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransportCommand {
    Play,
    Pause,
    TogglePlayback,
    SkipNext,
    SkipPrevious,
    /// Seek to a position in milliseconds; negative values are clamped to 0
    Seek(i64),
}
