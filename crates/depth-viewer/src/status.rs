//! Per-frame HUD status derivation.

use artrack::{TrackingFailureReason, TrackingState};

pub const SEARCHING_MESSAGE: &str = "Move the device around slowly...";
pub const SURFACES_FOUND_MESSAGE: &str = "Tap a surface to place an object.";
pub const DEPTH_UNSUPPORTED_MESSAGE: &str = "[Depth is not supported on this device]";

/// What the session is doing right now, from the user's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    /// Camera is tracking but no surface has been detected yet.
    Searching,
    /// At least one surface is available for placement.
    SurfacesFound,
    /// Tracking is paused; carries the reason.
    TrackingLost(TrackingFailureReason),
}

impl SessionStatus {
    pub fn derive(
        tracking: TrackingState,
        failure: TrackingFailureReason,
        has_tracking_plane: bool,
    ) -> Self {
        match tracking {
            TrackingState::Tracking if has_tracking_plane => Self::SurfacesFound,
            TrackingState::Tracking => Self::Searching,
            _ => Self::TrackingLost(failure),
        }
    }

    /// HUD line for this status. Devices without depth support get a
    /// standing suffix so the degraded rendering path is not mistaken for a
    /// bug.
    pub fn message(self, depth_supported: bool) -> String {
        let mut line = match self {
            Self::Searching => SEARCHING_MESSAGE.to_owned(),
            Self::SurfacesFound => SURFACES_FOUND_MESSAGE.to_owned(),
            Self::TrackingLost(reason) => reason.message().to_owned(),
        };
        if !depth_supported {
            line.push('\n');
            line.push_str(DEPTH_UNSUPPORTED_MESSAGE);
        }
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracking_without_planes_is_searching() {
        let status =
            SessionStatus::derive(TrackingState::Tracking, TrackingFailureReason::None, false);
        assert_eq!(status, SessionStatus::Searching);
        assert_eq!(status.message(true), SEARCHING_MESSAGE);
    }

    #[test]
    fn tracking_with_planes_invites_placement() {
        let status =
            SessionStatus::derive(TrackingState::Tracking, TrackingFailureReason::None, true);
        assert_eq!(status, SessionStatus::SurfacesFound);
    }

    #[test]
    fn paused_tracking_reports_the_failure_reason() {
        let status = SessionStatus::derive(
            TrackingState::Paused,
            TrackingFailureReason::ExcessiveMotion,
            true,
        );
        assert_eq!(
            status,
            SessionStatus::TrackingLost(TrackingFailureReason::ExcessiveMotion)
        );
        assert_eq!(
            status.message(true),
            TrackingFailureReason::ExcessiveMotion.message()
        );
    }

    #[test]
    fn missing_depth_support_appends_the_suffix() {
        let status =
            SessionStatus::derive(TrackingState::Tracking, TrackingFailureReason::None, true);
        let line = status.message(false);
        assert!(line.starts_with(SURFACES_FOUND_MESSAGE));
        assert!(line.ends_with(DEPTH_UNSUPPORTED_MESSAGE));
    }
}
