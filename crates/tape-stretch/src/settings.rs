//! Tempo stretcher configuration.

/// Sample rate assumed until one is configured.
pub const DEFAULT_SAMPLE_RATE: u32 = 44100;

/// Overlap between consecutive sequences, in milliseconds.
pub const DEFAULT_OVERLAP_MS: f64 = 8.0;

/// Sequence or seek window length meaning "derive from tempo".
pub const AUTO_MS: f64 = 0.0;

/// Time constants for the WSOLA tempo stretcher.
///
/// `sequence_ms` and `seek_window_ms` of zero (or below) select the automatic
/// setting, which follows the tempo. A zero `sample_rate` or non-positive
/// `overlap_ms` leaves the stretcher's previous value in place.
///
/// ```
/// use tape_stretch::StretchSettings;
///
/// let settings = StretchSettings::new()
///     .sample_rate(48000)
///     .sequence_ms(40.0)
///     .quick_seek(false);
/// assert_eq!(settings.sample_rate, 48000);
/// assert!(!settings.is_auto_sequence());
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
#[cfg_attr(feature = "serialization", serde(default))]
pub struct StretchSettings {
    /// Sample rate of the processed stream in Hz
    pub sample_rate: u32,

    /// Length of one processing sequence (0 = auto)
    pub sequence_ms: f64,

    /// Width of the window searched for the best overlap position (0 = auto)
    pub seek_window_ms: f64,

    /// Crossfade length between sequences
    pub overlap_ms: f64,

    /// Use the hierarchical search instead of scanning every offset
    pub quick_seek: bool,
}

impl StretchSettings {
    pub fn new() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            sequence_ms: AUTO_MS,
            seek_window_ms: AUTO_MS,
            overlap_ms: DEFAULT_OVERLAP_MS,
            quick_seek: true,
        }
    }

    pub fn sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    pub fn sequence_ms(mut self, ms: f64) -> Self {
        self.sequence_ms = ms;
        self
    }

    pub fn seek_window_ms(mut self, ms: f64) -> Self {
        self.seek_window_ms = ms;
        self
    }

    pub fn overlap_ms(mut self, ms: f64) -> Self {
        self.overlap_ms = ms;
        self
    }

    pub fn quick_seek(mut self, enable: bool) -> Self {
        self.quick_seek = enable;
        self
    }

    /// Whether the sequence length follows the tempo.
    pub fn is_auto_sequence(&self) -> bool {
        !(self.sequence_ms > 0.0)
    }

    /// Whether the seek window length follows the tempo.
    pub fn is_auto_seek_window(&self) -> bool {
        !(self.seek_window_ms > 0.0)
    }
}

impl Default for StretchSettings {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_default() {
        let settings = StretchSettings::default();
        assert_eq!(settings.sample_rate, 44100);
        assert_eq!(settings.overlap_ms, 8.0);
        assert!(settings.quick_seek);
        assert!(settings.is_auto_sequence());
        assert!(settings.is_auto_seek_window());
    }

    #[test]
    fn test_settings_builder() {
        let settings = StretchSettings::new()
            .sample_rate(22050)
            .sequence_ms(82.0)
            .seek_window_ms(28.0)
            .overlap_ms(12.0)
            .quick_seek(false);

        assert_eq!(settings.sample_rate, 22050);
        assert!(!settings.is_auto_sequence());
        assert!(!settings.is_auto_seek_window());
        assert_eq!(settings.overlap_ms, 12.0);
        assert!(!settings.quick_seek);
    }

    #[test]
    fn test_negative_and_nan_mean_auto() {
        let settings = StretchSettings::new()
            .sequence_ms(-5.0)
            .seek_window_ms(f64::NAN);
        assert!(settings.is_auto_sequence());
        assert!(settings.is_auto_seek_window());
    }

    #[cfg(feature = "serialization")]
    #[test]
    fn test_settings_serde() {
        let settings = StretchSettings::new().sample_rate(48000).sequence_ms(60.0);
        let json = serde_json::to_string(&settings).unwrap();
        let back: StretchSettings = serde_json::from_str(&json).unwrap();
        assert_eq!(back, settings);

        let partial: StretchSettings = serde_json::from_str(r#"{"quick_seek":false}"#).unwrap();
        assert_eq!(partial, StretchSettings::new().quick_seek(false));
    }
}
