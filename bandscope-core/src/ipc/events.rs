//! Change notifications broadcast by `SpectrumAnalyzer`.
//!
//! All notifications travel on one `tokio::sync::broadcast` channel as
//! `AnalyzerEvent`, so subscribers see them in the order they were produced.
//!
//! | Variant | `type` tag | Sent from |
//! |---------|------------|-----------|
//! | `Spectrum` | `"spectrum"` | capture worker tick, `stop()` |
//! | `Volume` | `"volume"` | `set_volume()` |
//! | `Muted` | `"muted"` | `set_muted()` |
//! | `Availability` | `"availability"` | `set_source()` |
//! | `Status` | `"status"` | lifecycle transitions |

use serde::{Deserialize, Serialize};

/// Every notification the analyzer emits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AnalyzerEvent {
    Spectrum(SpectrumEvent),
    Volume(VolumeEvent),
    Muted(MuteEvent),
    Availability(AvailabilityEvent),
    Status(CaptureStatusEvent),
}

// ---------------------------------------------------------------------------
// Spectrum
// ---------------------------------------------------------------------------

/// A freshly published band vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpectrumEvent {
    /// Sequence number of the published snapshot.
    pub seq: u64,
    /// Smoothed band magnitudes in [0.0, 1.0].
    pub bands: Vec<f32>,
}

impl SpectrumEvent {
    /// True when every band is exactly zero (the post-stop reset).
    pub fn is_silent(&self) -> bool {
        self.bands.iter().all(|&b| b == 0.0)
    }
}

// ---------------------------------------------------------------------------
// Controls
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeEvent {
    /// Nominal volume in [0.0, 1.0] (unaffected by mute).
    pub volume: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MuteEvent {
    pub muted: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityEvent {
    pub available: bool,
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureStatusEvent {
    pub status: CaptureStatus,
    /// Optional human-readable detail (e.g. error message).
    pub detail: Option<String>,
}

/// Current capture lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureStatus {
    /// Analyzer created, `start()` not yet called.
    Idle,
    /// Stream open, tick running.
    Capturing,
    /// Capture stopped; may be restarted.
    Stopped,
    /// Last `start()` failed; may be retried.
    Error,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spectrum_event_serializes_with_type_tag() {
        let event = AnalyzerEvent::Spectrum(SpectrumEvent {
            seq: 7,
            bands: vec![0.0, 0.5, 1.0],
        });

        let json = serde_json::to_value(&event).expect("serialize spectrum event");
        assert_eq!(json["type"], "spectrum");
        assert_eq!(json["seq"], 7);
        assert_eq!(json["bands"][1], 0.5);

        let round_trip: AnalyzerEvent =
            serde_json::from_value(json).expect("deserialize spectrum event");
        assert_eq!(round_trip, event);
    }

    #[test]
    fn status_event_serializes_with_lowercase_status() {
        let event = AnalyzerEvent::Status(CaptureStatusEvent {
            status: CaptureStatus::Capturing,
            detail: Some("default input".into()),
        });

        let json = serde_json::to_value(&event).expect("serialize status event");
        assert_eq!(json["type"], "status");
        assert_eq!(json["status"], "capturing");
        assert_eq!(json["detail"], "default input");
    }

    #[test]
    fn control_events_use_documented_fields() {
        let muted = serde_json::to_value(AnalyzerEvent::Muted(MuteEvent { muted: true }))
            .expect("serialize mute event");
        assert_eq!(muted["type"], "muted");
        assert_eq!(muted["muted"], true);

        let avail = serde_json::to_value(AnalyzerEvent::Availability(AvailabilityEvent {
            available: false,
        }))
        .expect("serialize availability event");
        assert_eq!(avail["type"], "availability");
        assert_eq!(avail["available"], false);
    }

    #[test]
    fn status_rejects_non_lowercase_values() {
        let err = serde_json::from_str::<CaptureStatus>(r#""Capturing""#);
        assert!(err.is_err(), "expected invalid casing to fail");
    }

    #[test]
    fn silent_spectrum_detection() {
        let zero = SpectrumEvent {
            seq: 1,
            bands: vec![0.0; 8],
        };
        assert!(zero.is_silent());
        let live = SpectrumEvent {
            seq: 2,
            bands: vec![0.0, 0.1],
        };
        assert!(!live.is_silent());
    }
}
