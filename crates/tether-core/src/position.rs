use std::fmt;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::protocol::LatLng;

/// One location sample reported by the host.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Fix {
    pub latitude: f64,
    pub longitude: f64,
    /// Accuracy radius in meters, when the host reports one.
    pub accuracy: Option<f64>,
}

impl Fix {
    pub fn new(latitude: f64, longitude: f64, accuracy: Option<f64>) -> Self {
        Self {
            latitude,
            longitude,
            accuracy,
        }
    }

    pub fn lat_lng(&self) -> LatLng {
        LatLng {
            lat: self.latitude,
            lng: self.longitude,
        }
    }
}

/// Sampling policy for a periodic watch.
#[derive(Clone, Debug, PartialEq)]
pub struct WatchPolicy {
    pub high_accuracy: bool,
    /// Minimum displacement in meters between two reported fixes.
    pub distance_filter: f64,
    pub interval: Duration,
    pub fastest_interval: Duration,
    /// Maximum age of a cached fix the host may return. Zero disables caching.
    pub maximum_age: Duration,
}

impl Default for WatchPolicy {
    fn default() -> Self {
        Self {
            high_accuracy: true,
            distance_filter: 10.0,
            interval: Duration::from_secs(10),
            fastest_interval: Duration::from_secs(6),
            maximum_age: Duration::ZERO,
        }
    }
}

/// Options for a one-shot fix.
#[derive(Clone, Debug, PartialEq)]
pub struct FixRequest {
    pub high_accuracy: bool,
    pub timeout: Duration,
    pub maximum_age: Duration,
}

impl Default for FixRequest {
    fn default() -> Self {
        Self {
            high_accuracy: true,
            timeout: Duration::from_secs(5),
            maximum_age: Duration::ZERO,
        }
    }
}

/// Host-side identifier of a registered watch.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub struct WatchId(pub u64);

impl fmt::Display for WatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "watch_{}", self.0)
    }
}

/// A live subscription returned by the host: its id plus the stream of
/// fixes. Errors from the periodic watch are not reported; the host simply
/// stops sending.
#[derive(Debug)]
pub struct PositionWatch {
    pub id: WatchId,
    pub fixes: mpsc::Receiver<Fix>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_matches_sampling_contract() {
        let p = WatchPolicy::default();
        assert!(p.high_accuracy);
        assert_eq!(p.distance_filter, 10.0);
        assert_eq!(p.interval, Duration::from_secs(10));
        assert_eq!(p.fastest_interval, Duration::from_secs(6));
        assert_eq!(p.maximum_age, Duration::ZERO);
    }

    #[test]
    fn default_fix_request_has_five_second_timeout() {
        let r = FixRequest::default();
        assert_eq!(r.timeout, Duration::from_secs(5));
        assert_eq!(r.maximum_age, Duration::ZERO);
    }

    #[test]
    fn fix_to_lat_lng() {
        let f = Fix::new(1.25, -2.5, Some(4.0));
        assert_eq!(f.lat_lng(), LatLng { lat: 1.25, lng: -2.5 });
    }

    #[test]
    fn watch_id_display() {
        assert_eq!(WatchId(7).to_string(), "watch_7");
    }
}
