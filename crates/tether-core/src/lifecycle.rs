use crate::envelope::RawMessage;

/// Application lifecycle state mirrored from the host OS.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AppLifecycleState {
    Active,
    Inactive,
    Background,
}

impl AppLifecycleState {
    /// Inactive and Background both count as "not in the foreground".
    pub fn is_away(self) -> bool {
        matches!(self, Self::Inactive | Self::Background)
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "active" => Some(Self::Active),
            "inactive" => Some(Self::Inactive),
            "background" => Some(Self::Background),
            _ => None,
        }
    }
}

/// Events raised by the camera UI the host shows while the capture
/// pipeline is open.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CameraEvent {
    /// Shutter pressed.
    CaptureRequested,
    /// Preview accepted.
    Confirmed,
    /// Camera dismissed without sending.
    Cancelled,
}

/// Events that originate in the host rather than the content surface.
#[derive(Clone, Debug, PartialEq)]
pub enum NativeEvent {
    Connectivity { mobile_data_on: bool },
    LocationStatus { location_on: bool },
    Lifecycle(AppLifecycleState),
    SurfaceLoaded,
    BackPressed,
    Camera(CameraEvent),
}

/// Everything that enters the bridge from outside.
#[derive(Clone, Debug, PartialEq)]
pub enum HostInput {
    Surface(RawMessage),
    Native(NativeEvent),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn away_states() {
        assert!(!AppLifecycleState::Active.is_away());
        assert!(AppLifecycleState::Inactive.is_away());
        assert!(AppLifecycleState::Background.is_away());
    }

    #[test]
    fn parse_states() {
        assert_eq!(AppLifecycleState::parse("Active"), Some(AppLifecycleState::Active));
        assert_eq!(
            AppLifecycleState::parse(" background "),
            Some(AppLifecycleState::Background)
        );
        assert_eq!(AppLifecycleState::parse("asleep"), None);
    }
}
