use lavalink_rs::model::player::{
    ChannelMix, Equalizer, Filters, Karaoke, LowPass, Rotation, Timescale, TremoloVibrato,
};
use serde_json::{Map, Value};
use std::{cmp::Ordering, fmt, str::FromStr};
use thiserror::Error;

/// Lavalink band center frequencies (15 bands, 25 Hz .. 16 kHz)
const BAND_FREQUENCIES: [f64; 15] = [
    25.0, 40.0, 63.0, 100.0, 160.0, 250.0, 400.0, 630.0, 1000.0, 1600.0, 2500.0, 4000.0, 6300.0,
    10000.0, 16000.0,
];

/// Frequencies the dB presets below were tuned on
const PRESET_FREQUENCIES: [f64; 10] = [
    32.0,    // Sub-bass
    64.0,    // Bass
    125.0,   // Low-mid
    250.0,   // Mid
    500.0,   // Upper-mid
    1000.0,  // Presence
    2000.0,  // Brilliance
    4000.0,  // High
    8000.0,  // Very high
    16000.0, // Air
];

const BASS_BOOST: [f64; 10] = [6.0, 5.0, 4.0, 2.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0];
const POP: [f64; 10] = [-1.0, 2.0, 4.0, 5.0, 3.0, 0.0, -1.0, -1.0, 0.0, 0.0];
const ROCK: [f64; 10] = [5.0, 4.0, 3.0, 1.0, -1.0, -1.0, 0.0, 2.0, 3.0, 4.0];
const JAZZ: [f64; 10] = [0.0, 1.0, 2.0, 3.0, 2.0, 1.0, 0.0, 1.0, 2.0, 3.0];
const CLASSICAL: [f64; 10] = [0.0, 0.0, 0.0, 0.0, 0.0, 0.0, -2.0, -2.0, -2.0, -3.0];
const ELECTRONIC: [f64; 10] = [5.0, 4.0, 1.0, 0.0, -2.0, 2.0, 1.0, 0.0, 3.0, 4.0];
const VOCAL: [f64; 10] = [-2.0, -1.0, 0.0, 2.0, 4.0, 3.0, 2.0, 1.0, 0.0, -1.0];

const ECHO_PLUGIN: &str = "lavalink-filter-plugin";

/// Named filters that scripts can enable, toggle and remove.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKind {
    Nightcore,
    Vaporwave,
    Karaoke,
    Tremolo,
    Vibrato,
    Rotating,
    LowPass,
    AudioOutput,
    Echo,
    BassBoost,
    Pop,
    Rock,
    Jazz,
    Classical,
    Electronic,
    Vocal,
}

impl FilterKind {
    pub const ALL: [FilterKind; 16] = [
        FilterKind::Nightcore,
        FilterKind::Vaporwave,
        FilterKind::Karaoke,
        FilterKind::Tremolo,
        FilterKind::Vibrato,
        FilterKind::Rotating,
        FilterKind::LowPass,
        FilterKind::AudioOutput,
        FilterKind::Echo,
        FilterKind::BassBoost,
        FilterKind::Pop,
        FilterKind::Rock,
        FilterKind::Jazz,
        FilterKind::Classical,
        FilterKind::Electronic,
        FilterKind::Vocal,
    ];

    pub fn name(self) -> &'static str {
        match self {
            FilterKind::Nightcore => "nightcore",
            FilterKind::Vaporwave => "vaporwave",
            FilterKind::Karaoke => "karaoke",
            FilterKind::Tremolo => "tremolo",
            FilterKind::Vibrato => "vibrato",
            FilterKind::Rotating => "rotating",
            FilterKind::LowPass => "lowpass",
            FilterKind::AudioOutput => "audiooutput",
            FilterKind::Echo => "echo",
            FilterKind::BassBoost => "bassboost",
            FilterKind::Pop => "pop",
            FilterKind::Rock => "rock",
            FilterKind::Jazz => "jazz",
            FilterKind::Classical => "classical",
            FilterKind::Electronic => "electronic",
            FilterKind::Vocal => "vocal",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "8d" | "rotation" => Some(FilterKind::Rotating),
            "bass" => Some(FilterKind::BassBoost),
            other => Self::ALL.into_iter().find(|kind| kind.name() == other),
        }
    }

    /// Comma separated list for error messages.
    pub fn valid_names() -> String {
        Self::ALL.map(FilterKind::name).join(", ")
    }

    fn preset(self) -> Option<&'static [f64; 10]> {
        match self {
            FilterKind::BassBoost => Some(&BASS_BOOST),
            FilterKind::Pop => Some(&POP),
            FilterKind::Rock => Some(&ROCK),
            FilterKind::Jazz => Some(&JAZZ),
            FilterKind::Classical => Some(&CLASSICAL),
            FilterKind::Electronic => Some(&ELECTRONIC),
            FilterKind::Vocal => Some(&VOCAL),
            _ => None,
        }
    }
}

impl fmt::Display for FilterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Error, PartialEq)]
#[error("unknown filter `{0}`")]
pub struct UnknownFilter(pub String);

/// `name[:param[:param...]]`, e.g. `tremolo:4:0.8` or `audiooutput:left`.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterRequest {
    pub kind: FilterKind,
    pub params: Vec<String>,
}

impl FilterRequest {
    fn number(&self, index: usize, default: f64) -> f64 {
        self.params
            .get(index)
            .and_then(|p| p.trim().parse::<f64>().ok())
            .unwrap_or(default)
    }

    fn word(&self, index: usize, default: &'static str) -> String {
        self.params
            .get(index)
            .map(|p| p.trim().to_lowercase())
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| default.to_string())
    }
}

impl FromStr for FilterRequest {
    type Err = UnknownFilter;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let mut parts = raw.split(':');
        let name = parts.next().unwrap_or_default();
        let kind = FilterKind::from_name(name).ok_or_else(|| UnknownFilter(name.trim().to_string()))?;

        Ok(Self {
            kind,
            params: parts.map(str::to_string).collect(),
        })
    }
}

/// Script-level operations on the node's filter object. Sending it replaces every filter
/// at once.
pub trait FilterChain {
    fn is_empty(&self) -> bool;

    fn enable(&mut self, request: &FilterRequest);

    fn disable(&mut self, kind: FilterKind);

    fn is_enabled(&self, kind: FilterKind) -> bool;

    /// Flips one filter and returns whether it is now enabled.
    fn toggle(&mut self, request: &FilterRequest) -> bool {
        if self.is_enabled(request.kind) {
            self.disable(request.kind);
            false
        } else {
            self.enable(request);
            true
        }
    }

    /// JSON of a single top level key (`timescale`, `equalizer`, ...), or of everything.
    fn to_json(&self, key: Option<&str>) -> Value;
}

impl FilterChain for Filters {
    fn is_empty(&self) -> bool {
        *self == Filters::default()
    }

    fn enable(&mut self, request: &FilterRequest) {
        match request.kind {
            FilterKind::Nightcore => {
                self.timescale = Some(Timescale {
                    speed: Some(request.number(0, 1.2)),
                    pitch: Some(request.number(1, 1.2)),
                    rate: Some(request.number(2, 1.0)),
                })
            }
            FilterKind::Vaporwave => {
                self.timescale = Some(Timescale {
                    speed: Some(request.number(0, 0.85)),
                    pitch: Some(request.number(1, 0.8)),
                    rate: Some(request.number(2, 1.0)),
                })
            }
            FilterKind::Karaoke => {
                self.karaoke = Some(Karaoke {
                    level: Some(request.number(0, 1.0)),
                    mono_level: Some(request.number(1, 1.0)),
                    filter_band: Some(request.number(2, 220.0)),
                    filter_width: Some(request.number(3, 100.0)),
                })
            }
            FilterKind::Tremolo => {
                self.tremolo = Some(TremoloVibrato {
                    frequency: Some(request.number(0, 4.0)),
                    depth: Some(request.number(1, 0.8)),
                })
            }
            FilterKind::Vibrato => {
                self.vibrato = Some(TremoloVibrato {
                    frequency: Some(request.number(0, 10.0)),
                    depth: Some(request.number(1, 0.9)),
                })
            }
            FilterKind::Rotating => {
                self.rotation = Some(Rotation {
                    rotation_hz: Some(request.number(0, 0.2)),
                })
            }
            FilterKind::LowPass => {
                self.low_pass = Some(LowPass {
                    smoothing: Some(request.number(0, 20.0)),
                })
            }
            FilterKind::AudioOutput => {
                self.channel_mix = Some(channel_mix(&request.word(0, "mono")));
            }
            FilterKind::Echo => {
                let echo = serde_json::json!({
                    "echo": {
                        "delay": request.number(0, 1.0),
                        "decay": request.number(1, 0.5),
                    }
                });
                let mut plugins = match self.plugin_filters.take() {
                    Some(Value::Object(map)) => map,
                    _ => Map::new(),
                };
                plugins.insert(ECHO_PLUGIN.to_string(), echo);
                self.plugin_filters = Some(Value::Object(plugins));
            }
            preset => {
                if let Some(gains) = preset.preset() {
                    self.equalizer = Some(preset_bands(gains));
                }
            }
        }
    }

    fn disable(&mut self, kind: FilterKind) {
        match kind {
            FilterKind::Nightcore | FilterKind::Vaporwave => self.timescale = None,
            FilterKind::Karaoke => self.karaoke = None,
            FilterKind::Tremolo => self.tremolo = None,
            FilterKind::Vibrato => self.vibrato = None,
            FilterKind::Rotating => self.rotation = None,
            FilterKind::LowPass => self.low_pass = None,
            FilterKind::AudioOutput => self.channel_mix = None,
            FilterKind::Echo => {
                if let Some(Value::Object(mut plugins)) = self.plugin_filters.take() {
                    plugins.remove(ECHO_PLUGIN);
                    if !plugins.is_empty() {
                        self.plugin_filters = Some(Value::Object(plugins));
                    }
                }
            }
            _ => self.equalizer = None,
        }
    }

    fn is_enabled(&self, kind: FilterKind) -> bool {
        let timescale = |check: fn(f64, f64) -> bool| {
            self.timescale
                .as_ref()
                .is_some_and(|t| check(t.speed.unwrap_or(1.0), t.pitch.unwrap_or(1.0)))
        };

        match kind {
            FilterKind::Nightcore => timescale(|speed, pitch| speed >= 1.0 && pitch >= 1.0),
            FilterKind::Vaporwave => timescale(|speed, _| speed < 1.0),
            FilterKind::Karaoke => self.karaoke.is_some(),
            FilterKind::Tremolo => self.tremolo.is_some(),
            FilterKind::Vibrato => self.vibrato.is_some(),
            FilterKind::Rotating => self.rotation.is_some(),
            FilterKind::LowPass => self.low_pass.is_some(),
            FilterKind::AudioOutput => self.channel_mix.is_some(),
            FilterKind::Echo => self
                .plugin_filters
                .as_ref()
                .and_then(Value::as_object)
                .is_some_and(|plugins| plugins.contains_key(ECHO_PLUGIN)),
            preset => match (preset.preset(), self.equalizer.as_ref()) {
                (Some(gains), Some(bands)) => *bands == preset_bands(gains),
                _ => false,
            },
        }
    }

    fn to_json(&self, key: Option<&str>) -> Value {
        let all = serde_json::to_value(self).unwrap_or_default();
        match key {
            None => all,
            Some(key) => all
                .as_object()
                .and_then(|map| {
                    map.iter()
                        .find(|(name, _)| name.eq_ignore_ascii_case(key))
                        .map(|(_, value)| value.clone())
                })
                .unwrap_or(Value::Null),
        }
    }
}

fn channel_mix(mode: &str) -> ChannelMix {
    let (ll, lr, rl, rr) = match mode {
        "left" => (1.0, 0.0, 1.0, 0.0),
        "right" => (0.0, 1.0, 0.0, 1.0),
        "stereo" => (1.0, 0.0, 0.0, 1.0),
        _ => (0.5, 0.5, 0.5, 0.5),
    };
    ChannelMix {
        left_to_left: Some(ll),
        left_to_right: Some(lr),
        right_to_left: Some(rl),
        right_to_right: Some(rr),
    }
}

/// Node gain is a multiplier offset in [-0.25, 1.0]; 0.25 doubles the band.
fn db_to_gain(db: f64) -> f64 {
    (db / 24.0).clamp(-0.25, 1.0)
}

/// Spreads a 10 band dB preset over the node's 15 bands, nearest frequency on a log scale.
fn preset_bands(gains_db: &[f64; 10]) -> Vec<Equalizer> {
    BAND_FREQUENCIES
        .iter()
        .enumerate()
        .map(|(band, freq)| {
            let nearest = PRESET_FREQUENCIES
                .iter()
                .enumerate()
                .min_by(|(_, a), (_, b)| {
                    let da = (a.ln() - freq.ln()).abs();
                    let db = (b.ln() - freq.ln()).abs();
                    da.partial_cmp(&db).unwrap_or(Ordering::Equal)
                })
                .map(|(index, _)| index)
                .unwrap_or(0);

            Equalizer {
                band: band as u8,
                gain: db_to_gain(gains_db[nearest]),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_filter_requests_carry_params() {
        let request: FilterRequest = "tremolo:6:0.4".parse().unwrap();
        assert_eq!(request.kind, FilterKind::Tremolo);
        assert_eq!(request.number(0, 4.0), 6.0);
        assert_eq!(request.number(2, 0.1), 0.1);

        let err = "robot:1".parse::<FilterRequest>().unwrap_err();
        assert_eq!(err, UnknownFilter("robot".to_string()));
    }

    #[test]
    fn test_filter_aliases() {
        assert_eq!(FilterKind::from_name("8D"), Some(FilterKind::Rotating));
        assert_eq!(FilterKind::from_name(" LowPass "), Some(FilterKind::LowPass));
        assert_eq!(FilterKind::from_name("robot"), None);
        assert!(FilterKind::valid_names().starts_with("nightcore, vaporwave"));
    }

    #[test]
    fn test_toggle_round_trip() {
        let mut filters = Filters::default();
        let tremolo: FilterRequest = "tremolo:5:0.5".parse().unwrap();

        assert!(filters.toggle(&tremolo));
        assert_eq!(
            filters.tremolo,
            Some(TremoloVibrato { frequency: Some(5.0), depth: Some(0.5) })
        );

        assert!(!filters.toggle(&tremolo));
        assert!(filters.is_empty());
    }

    #[test]
    fn test_equalizer_preset_detection() {
        let mut filters = Filters::default();
        filters.enable(&"bassboost".parse().unwrap());

        assert!(filters.is_enabled(FilterKind::BassBoost));
        assert!(!filters.is_enabled(FilterKind::Rock));

        let bands = filters.equalizer.as_ref().unwrap();
        assert_eq!(bands.len(), 15);
        assert_eq!(bands[0].gain, 0.25);
        assert_eq!(bands[14].gain, 0.0);
    }

    #[test]
    fn test_echo_lives_in_plugin_filters() {
        let mut filters = Filters::default();
        filters.enable(&"echo".parse().unwrap());
        assert!(filters.is_enabled(FilterKind::Echo));
        assert_eq!(filters.to_json(Some("pluginFilters"))[ECHO_PLUGIN]["echo"]["decay"], 0.5);

        filters.disable(FilterKind::Echo);
        assert_eq!(filters.plugin_filters, None);
    }

    #[test]
    fn test_to_json_single_key() {
        let mut filters = Filters::default();
        filters.enable(&"audiooutput:left".parse().unwrap());

        let mix = filters.to_json(Some("channelmix"));
        assert_eq!(mix["leftToLeft"], serde_json::json!(1.0));
        assert_eq!(filters.to_json(Some("karaoke")), Value::Null);
    }
}
