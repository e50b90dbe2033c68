/// Track state enumeration for object tracking lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrackState {
    /// Newly created track, not yet confirmed
    #[default]
    Tentative,
    /// Confirmed and matched in the latest frame
    Confirmed,
    /// Confirmed but missing detections, still reported until it ages out
    Lost,
    /// Aged out, about to be dropped from the track set
    Removed,
}
