//! Player configuration loaded from `pulsar.toml`
//!
//! Every section and field is optional; anything missing takes its default.

use anyhow::{bail, Context, Result};
use pulsar_core::types::time::from_f64;
use pulsar_core::{EchoSpec, ExpandParams};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// File looked up in the working directory when no path is given
pub const DEFAULT_CONFIG_FILE: &str = "pulsar.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    pub transport: TransportSection,
    pub midi: MidiSection,
    pub expand: ExpandSection,
    pub echo: EchoSection,
    pub import: ImportSection,
    pub log: LogSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportSection {
    pub bpm: f64,
    pub beats_per_bar: u32,
    /// Fixed seed for every random draw; unseeded when absent
    pub seed: Option<u64>,
}

impl Default for TransportSection {
    fn default() -> Self {
        Self {
            bpm: 120.0,
            beats_per_bar: 4,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MidiSection {
    /// Port to connect at startup (substring match)
    pub port: Option<String>,
    /// 1-16 sends every route to one channel; absent maps route n to channel n+1
    pub channel: Option<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpandSection {
    /// Pattern length in bars
    pub span: f64,
    pub pitch_offset: i32,
    pub velocity: u8,
    pub sustain: f64,
    pub pan: f64,
    pub route: usize,
    pub velocity_jitter: f64,
    pub pan_jitter: f64,
}

impl Default for ExpandSection {
    fn default() -> Self {
        Self {
            span: 1.0,
            pitch_offset: 0,
            velocity: 100,
            sustain: 1.0,
            pan: 0.0,
            route: 0,
            velocity_jitter: 0.0,
            pan_jitter: 0.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EchoSection {
    pub repeat_count: usize,
    pub loop_length: f64,
    pub note_length: f64,
    pub syncopate_chance: f64,
    pub play_probability: f64,
    pub secondary_route: usize,
    pub suppress_first: bool,
    pub quantize: bool,
    pub pan: f64,
}

impl Default for EchoSection {
    fn default() -> Self {
        let spec = EchoSpec::default();
        Self {
            repeat_count: spec.repeat_count,
            loop_length: spec.loop_length,
            note_length: spec.note_length,
            syncopate_chance: spec.syncopate_chance,
            play_probability: spec.play_probability,
            secondary_route: spec.secondary_output_route,
            suppress_first: spec.suppress_first,
            quantize: spec.quantize,
            pan: spec.pan,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportSection {
    /// Tracks to import; empty imports all of them
    pub tracks: Vec<usize>,
    /// Build one canvas per non-empty track after importing
    pub create_canvas: bool,
    /// Replay the import as soon as it is loaded
    pub play_on_load: bool,
}

impl Default for ImportSection {
    fn default() -> Self {
        Self {
            tracks: Vec::new(),
            create_canvas: true,
            play_on_load: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSection {
    /// `error`, `warn`, `info`, `debug`, `trace` or `off`
    pub level: String,
}

impl Default for LogSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl PlayerConfig {
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text).context("invalid configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the REPL commands would refuse as well
    pub fn validate(&self) -> Result<()> {
        let bpm = self.transport.bpm;
        if !(1.0..=400.0).contains(&bpm) {
            bail!("[transport] bpm must be between 1 and 400, got {}", bpm);
        }
        if self.transport.beats_per_bar == 0 {
            bail!("[transport] beats_per_bar must be at least 1");
        }
        if let Some(ch) = self.midi.channel {
            if !(1..=16).contains(&ch) {
                bail!("[midi] channel must be 1-16, got {}", ch);
            }
        }
        let loop_length = self.echo.loop_length;
        if !(loop_length.is_finite() && loop_length >= 0.0) {
            bail!("[echo] loop_length must be zero or positive, got {}", loop_length);
        }
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::from_toml(&text).with_context(|| format!("in {}", path.display()))
    }

    /// Load an explicit path, or `pulsar.toml` if present, or fall back to defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    Self::load(default_path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Expansion parameters from the `[expand]` section, not yet validated
    pub fn expand_params(&self) -> ExpandParams {
        let e = &self.expand;
        ExpandParams::default()
            .with_span(from_f64(e.span))
            .with_pitch_offset(e.pitch_offset)
            .with_velocity(e.velocity)
            .with_sustain(e.sustain)
            .with_pan(e.pan)
            .with_route(e.route)
            .with_jitter(e.velocity_jitter, e.pan_jitter)
    }

    pub fn echo_spec(&self) -> EchoSpec {
        let e = &self.echo;
        EchoSpec::new(e.repeat_count, e.loop_length)
            .with_note_length(e.note_length)
            .with_probabilities(e.play_probability, e.syncopate_chance)
            .with_secondary_route(e.secondary_route)
            .suppress_first(e.suppress_first)
            .quantized(e.quantize)
            .with_pan(e.pan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulsar_core::types::time::time;

    #[test]
    fn test_empty_file_gives_defaults() {
        let config = PlayerConfig::from_toml("").unwrap();
        assert_eq!(config.transport.bpm, 120.0);
        assert_eq!(config.transport.beats_per_bar, 4);
        assert!(config.midi.port.is_none());
        assert!(config.import.create_canvas);
        assert_eq!(config.log.level, "info");
        assert_eq!(config.echo_spec(), EchoSpec::default());
    }

    #[test]
    fn test_partial_sections() {
        let config = PlayerConfig::from_toml(
            r#"
            [transport]
            bpm = 96.0
            seed = 7

            [expand]
            span = 0.5
            velocity_jitter = 0.2

            [import]
            tracks = [1, 3]
            "#,
        )
        .unwrap();

        assert_eq!(config.transport.bpm, 96.0);
        assert_eq!(config.transport.beats_per_bar, 4);
        assert_eq!(config.transport.seed, Some(7));
        assert_eq!(config.import.tracks, vec![1, 3]);
        assert!(!config.import.play_on_load);

        let params = config.expand_params();
        assert_eq!(params.span, time(1, 2));
        assert_eq!(params.velocity_jitter, 0.2);
        assert_eq!(params.base_velocity, 100);
    }

    #[test]
    fn test_echo_section() {
        let config = PlayerConfig::from_toml(
            r#"
            [echo]
            repeat_count = 8
            loop_length = 0.25
            suppress_first = true
            play_probability = 2.0
            "#,
        )
        .unwrap();

        let spec = config.echo_spec();
        assert_eq!(spec.repeat_count, 8);
        assert_eq!(spec.loop_length, 0.25);
        assert!(spec.suppress_first);
        // Probabilities are clamped on the way in
        assert_eq!(spec.play_probability, 1.0);
    }

    #[test]
    fn test_out_of_range_values_are_rejected() {
        assert!(PlayerConfig::from_toml("[echo]\nloop_length = -0.25").is_err());
        assert!(PlayerConfig::from_toml("[transport]\nbpm = 0.0").is_err());
        assert!(PlayerConfig::from_toml("[transport]\nbpm = 401.0").is_err());
        assert!(PlayerConfig::from_toml("[transport]\nbeats_per_bar = 0").is_err());
        assert!(PlayerConfig::from_toml("[midi]\nchannel = 17").is_err());
        assert!(PlayerConfig::from_toml("[transport]\nbpm = 400.0").is_ok());
    }

    #[test]
    fn test_bad_types_are_rejected() {
        assert!(PlayerConfig::from_toml("[transport]\nbpm = \"fast\"").is_err());
    }

    #[test]
    fn test_missing_explicit_path_is_an_error() {
        let missing = Path::new("/definitely/not/here/pulsar.toml");
        assert!(PlayerConfig::load_or_default(Some(missing)).is_err());
    }
}
