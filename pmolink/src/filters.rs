//! Filtres audio appliqués par le nœud
//!
//! Chaque filtre valide ses arguments à la construction et produit un
//! payload `{"<nom>": {...}}`. Plusieurs filtres sont fusionnés en une
//! seule opération `filters` par [`ControlMessage::filters`].

use crate::error::{LinkError, Result};
use crate::protocol::ControlMessage;
use serde_json::{json, Map, Value};

/// Nombre de bandes de l'égaliseur Lavalink
pub const EQUALIZER_BANDS: usize = 15;

/// Filtre audio
pub trait Filter: Send + Sync {
    /// Clé du filtre dans l'opération `filters`
    fn name(&self) -> &'static str;

    /// Valeur associée à la clé
    fn settings(&self) -> Value;

    /// Payload complet `{name: settings}`
    fn payload(&self) -> Value {
        let mut map = Map::new();
        map.insert(self.name().to_string(), self.settings());
        Value::Object(map)
    }
}

impl ControlMessage {
    /// Fusionne des filtres en une opération `filters`
    ///
    /// Un filtre présent deux fois garde la dernière valeur.
    pub fn filters(guild_id: u64, filters: &[&dyn Filter]) -> Self {
        let payload = filters
            .iter()
            .map(|f| (f.name().to_string(), f.settings()))
            .collect();
        ControlMessage::Filters { guild_id, payload }
    }
}

fn check_range(what: &str, value: f64, min: f64, max: f64) -> Result<()> {
    if (min..=max).contains(&value) {
        Ok(())
    } else if max == f64::MAX {
        Err(LinkError::invalid_filter(format!(
            "{} must be finite and at least {}, got {}",
            what, min, value
        )))
    } else {
        Err(LinkError::invalid_filter(format!(
            "{} must be between {} and {}, got {}",
            what, min, max, value
        )))
    }
}

/// Valeur finie, au moins `min`
fn check_at_least(what: &str, value: f64, min: f64) -> Result<()> {
    check_range(what, value, min, f64::MAX)
}

fn check_finite(what: &str, value: f64) -> Result<()> {
    check_range(what, value, f64::MIN, f64::MAX)
}

/// Égaliseur 15 bandes
#[derive(Debug, Clone, PartialEq)]
pub struct Equalizer {
    name: String,
    gains: [f64; EQUALIZER_BANDS],
}

impl Equalizer {
    /// Construit un égaliseur ; les bandes non citées restent à 0
    ///
    /// # Errors
    ///
    /// * `LinkError::InvalidFilterArgument` - bande hors de 0..15 ou gain non fini
    pub fn build(levels: &[(usize, f64)], name: &str) -> Result<Self> {
        let mut gains = [0.0; EQUALIZER_BANDS];
        for &(band, gain) in levels {
            if band >= EQUALIZER_BANDS {
                return Err(LinkError::invalid_filter(format!(
                    "equalizer band must be between 0 and {}, got {}",
                    EQUALIZER_BANDS - 1,
                    band
                )));
            }
            check_finite("equalizer gain", gain)?;
            gains[band] = gain;
        }
        Ok(Self {
            name: name.to_string(),
            gains,
        })
    }

    fn preset(name: &str, gains: [f64; EQUALIZER_BANDS]) -> Self {
        Self {
            name: name.to_string(),
            gains,
        }
    }

    /// Toutes les bandes à 0
    pub fn flat() -> Self {
        Self::preset("Flat", [0.0; EQUALIZER_BANDS])
    }

    /// Basses percutantes, médiums-aigus clairs
    pub fn boost() -> Self {
        Self::preset(
            "Boost",
            [
                -0.075, 0.125, 0.125, 0.1, 0.1, 0.05, 0.075, 0.0, 0.0, 0.0, 0.0, 0.0, 0.125, 0.15,
                0.05,
            ],
        )
    }

    pub fn metal() -> Self {
        Self::preset(
            "Metal",
            [
                0.0, 0.1, 0.1, 0.15, 0.13, 0.1, 0.0, 0.125, 0.175, 0.175, 0.125, 0.125, 0.1, 0.075,
                0.0,
            ],
        )
    }

    /// Piano et voix féminines ; coupe aussi les basses
    pub fn piano() -> Self {
        Self::preset(
            "Piano",
            [
                -0.25, -0.25, -0.125, 0.0, 0.25, 0.25, 0.0, -0.25, -0.25, 0.0, 0.0, 0.5, 0.25,
                -0.025, 0.0,
            ],
        )
    }

    pub fn display_name(&self) -> &str {
        &self.name
    }

    pub fn gains(&self) -> &[f64; EQUALIZER_BANDS] {
        &self.gains
    }
}

impl Filter for Equalizer {
    fn name(&self) -> &'static str {
        "equalizer"
    }

    fn settings(&self) -> Value {
        Value::Array(
            self.gains
                .iter()
                .enumerate()
                .map(|(band, gain)| json!({"band": band, "gain": gain}))
                .collect(),
        )
    }
}

/// Vitesse, hauteur et débit de lecture
#[derive(Debug, Clone, PartialEq)]
pub struct Timescale {
    speed: f64,
    pitch: f64,
    rate: f64,
}

impl Timescale {
    pub fn new(speed: f64, pitch: f64, rate: f64) -> Result<Self> {
        check_at_least("timescale speed", speed, 0.0)?;
        check_at_least("timescale pitch", pitch, 0.0)?;
        check_at_least("timescale rate", rate, 0.0)?;
        Ok(Self { speed, pitch, rate })
    }
}

impl Default for Timescale {
    fn default() -> Self {
        Self {
            speed: 1.0,
            pitch: 1.0,
            rate: 1.0,
        }
    }
}

impl Filter for Timescale {
    fn name(&self) -> &'static str {
        "timescale"
    }

    fn settings(&self) -> Value {
        json!({"speed": self.speed, "pitch": self.pitch, "rate": self.rate})
    }
}

/// Atténuation de la voix
#[derive(Debug, Clone, PartialEq)]
pub struct Karaoke {
    pub level: f64,
    pub mono_level: f64,
    pub filter_band: f64,
    pub filter_width: f64,
}

impl Default for Karaoke {
    fn default() -> Self {
        Self {
            level: 1.0,
            mono_level: 1.0,
            filter_band: 220.0,
            filter_width: 100.0,
        }
    }
}

impl Filter for Karaoke {
    fn name(&self) -> &'static str {
        "karaoke"
    }

    fn settings(&self) -> Value {
        json!({
            "level": self.level,
            "monoLevel": self.mono_level,
            "filterBand": self.filter_band,
            "filterWidth": self.filter_width,
        })
    }
}

/// Oscillation du volume
#[derive(Debug, Clone, PartialEq)]
pub struct Tremolo {
    frequency: f64,
    depth: f64,
}

impl Tremolo {
    pub fn new(frequency: f64, depth: f64) -> Result<Self> {
        check_at_least("tremolo frequency", frequency, 0.0)?;
        check_range("tremolo depth", depth, 0.0, 1.0)?;
        Ok(Self { frequency, depth })
    }
}

impl Default for Tremolo {
    fn default() -> Self {
        Self {
            frequency: 2.0,
            depth: 0.5,
        }
    }
}

impl Filter for Tremolo {
    fn name(&self) -> &'static str {
        "tremolo"
    }

    fn settings(&self) -> Value {
        json!({"frequency": self.frequency, "depth": self.depth})
    }
}

/// Oscillation de la hauteur
#[derive(Debug, Clone, PartialEq)]
pub struct Vibrato {
    frequency: f64,
    depth: f64,
}

impl Vibrato {
    pub fn new(frequency: f64, depth: f64) -> Result<Self> {
        check_range("vibrato frequency", frequency, 0.0, 14.0)?;
        check_range("vibrato depth", depth, 0.0, 1.0)?;
        Ok(Self { frequency, depth })
    }
}

impl Default for Vibrato {
    fn default() -> Self {
        Self {
            frequency: 2.0,
            depth: 0.5,
        }
    }
}

impl Filter for Vibrato {
    fn name(&self) -> &'static str {
        "vibrato"
    }

    fn settings(&self) -> Value {
        json!({"frequency": self.frequency, "depth": self.depth})
    }
}

/// Panoramique rotatif
#[derive(Debug, Clone, PartialEq)]
pub struct Rotation {
    pub rotation_hz: f64,
}

impl Default for Rotation {
    fn default() -> Self {
        Self { rotation_hz: 0.2 }
    }
}

impl Filter for Rotation {
    fn name(&self) -> &'static str {
        "rotation"
    }

    fn settings(&self) -> Value {
        json!({"rotationHz": self.rotation_hz})
    }
}

/// Mélange manuel des canaux gauche et droit
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelMix {
    left_to_left: f64,
    left_to_right: f64,
    right_to_left: f64,
    right_to_right: f64,
}

impl ChannelMix {
    pub fn new(
        left_to_left: f64,
        left_to_right: f64,
        right_to_left: f64,
        right_to_right: f64,
    ) -> Result<Self> {
        check_range("left_to_left", left_to_left, 0.0, 1.0)?;
        check_range("left_to_right", left_to_right, 0.0, 1.0)?;
        check_range("right_to_left", right_to_left, 0.0, 1.0)?;
        check_range("right_to_right", right_to_right, 0.0, 1.0)?;
        Ok(Self {
            left_to_left,
            left_to_right,
            right_to_left,
            right_to_right,
        })
    }

    /// Les deux canaux mélangés à parts égales
    pub fn mono() -> Self {
        Self {
            left_to_left: 0.5,
            left_to_right: 0.5,
            right_to_left: 0.5,
            right_to_right: 0.5,
        }
    }
}

impl Default for ChannelMix {
    fn default() -> Self {
        Self {
            left_to_left: 1.0,
            left_to_right: 0.0,
            right_to_left: 0.0,
            right_to_right: 1.0,
        }
    }
}

impl Filter for ChannelMix {
    fn name(&self) -> &'static str {
        "channelMix"
    }

    fn settings(&self) -> Value {
        json!({
            "leftToLeft": self.left_to_left,
            "leftToRight": self.left_to_right,
            "rightToLeft": self.right_to_left,
            "rightToRight": self.right_to_right,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Distortion {
    pub sin_offset: f64,
    pub sin_scale: f64,
    pub cos_offset: f64,
    pub cos_scale: f64,
    pub tan_offset: f64,
    pub tan_scale: f64,
    pub offset: f64,
    pub scale: f64,
}

impl Default for Distortion {
    fn default() -> Self {
        Self {
            sin_offset: 0.0,
            sin_scale: 1.0,
            cos_offset: 0.0,
            cos_scale: 1.0,
            tan_offset: 0.0,
            tan_scale: 1.0,
            offset: 0.0,
            scale: 1.0,
        }
    }
}

impl Filter for Distortion {
    fn name(&self) -> &'static str {
        "distortion"
    }

    fn settings(&self) -> Value {
        json!({
            "sinOffset": self.sin_offset,
            "sinScale": self.sin_scale,
            "cosOffset": self.cos_offset,
            "cosScale": self.cos_scale,
            "tanOffset": self.tan_offset,
            "tanScale": self.tan_scale,
            "offset": self.offset,
            "scale": self.scale,
        })
    }
}

/// Passe-bas : plus `smoothing` est grand, plus les aigus sont coupés
#[derive(Debug, Clone, PartialEq)]
pub struct LowPass {
    pub smoothing: f64,
}

impl Default for LowPass {
    fn default() -> Self {
        Self { smoothing: 20.0 }
    }
}

impl Filter for LowPass {
    fn name(&self) -> &'static str {
        "lowPass"
    }

    fn settings(&self) -> Value {
        json!({"smoothing": self.smoothing})
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flat_equalizer() {
        let payload = Equalizer::flat().payload();
        let bands = payload["equalizer"].as_array().unwrap();
        assert_eq!(bands.len(), EQUALIZER_BANDS);
        for (i, band) in bands.iter().enumerate() {
            assert_eq!(band["band"], i);
            assert_eq!(band["gain"], 0.0);
        }
    }

    #[test]
    fn test_piano_has_fifteen_bands() {
        let piano = Equalizer::piano();
        assert_eq!(piano.gains().len(), EQUALIZER_BANDS);
        assert_eq!(piano.gains()[14], 0.0);
        assert_eq!(piano.display_name(), "Piano");
    }

    #[test]
    fn test_custom_equalizer() {
        let eq = Equalizer::build(&[(0, 0.25), (3, -0.1)], "Custom").unwrap();
        assert_eq!(eq.gains()[0], 0.25);
        assert_eq!(eq.gains()[3], -0.1);
        assert_eq!(eq.gains()[1], 0.0);

        assert!(Equalizer::build(&[(15, 0.1)], "Bad").is_err());
        assert!(Equalizer::build(&[(1, f64::NAN)], "Bad").is_err());
    }

    #[test]
    fn test_timescale() {
        let payload = Timescale::new(1.0, 1.0, 1.0).unwrap().payload();
        assert_eq!(
            payload,
            json!({"timescale": {"speed": 1.0, "pitch": 1.0, "rate": 1.0}})
        );
        assert!(matches!(
            Timescale::new(-1.0, 1.0, 1.0),
            Err(LinkError::InvalidFilterArgument(_))
        ));
        for (speed, pitch, rate) in [(f64::INFINITY, 1.0, 1.0), (1.0, f64::NAN, 1.0)] {
            assert!(matches!(
                Timescale::new(speed, pitch, rate),
                Err(LinkError::InvalidFilterArgument(_))
            ));
        }
        assert!(matches!(
            Tremolo::new(f64::INFINITY, 0.5),
            Err(LinkError::InvalidFilterArgument(_))
        ));
    }

    #[test]
    fn test_tremolo_and_vibrato_ranges() {
        assert!(matches!(
            Tremolo::new(2.0, 1.5),
            Err(LinkError::InvalidFilterArgument(_))
        ));
        assert!(Tremolo::new(10.0, 1.0).is_ok());
        assert!(matches!(
            Vibrato::new(15.0, 0.5),
            Err(LinkError::InvalidFilterArgument(_))
        ));
        assert!(Vibrato::new(14.0, 0.0).is_ok());
    }

    #[test]
    fn test_channel_mix_range() {
        assert!(ChannelMix::new(1.0, 0.0, 0.0, 1.0).is_ok());
        assert!(ChannelMix::new(1.5, 0.0, 0.0, 1.0).is_err());
        assert!(ChannelMix::new(1.0, -0.1, 0.0, 1.0).is_err());
        assert_eq!(ChannelMix::default().payload()["channelMix"]["leftToLeft"], 1.0);
    }

    #[test]
    fn test_payload_keys() {
        assert!(Karaoke::default().payload()["karaoke"]["filterBand"].is_number());
        assert_eq!(Rotation::default().payload()["rotation"]["rotationHz"], 0.2);
        assert_eq!(Distortion::default().payload()["distortion"]["scale"], 1.0);
        assert_eq!(LowPass::default().payload()["lowPass"]["smoothing"], 20.0);
    }

    #[test]
    fn test_filters_message_merges_payloads() {
        let timescale = Timescale::new(1.2, 1.0, 1.0).unwrap();
        let rotation = Rotation::default();
        let filters: [&dyn Filter; 2] = [&timescale, &rotation];
        let message = ControlMessage::filters(42, &filters);

        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(value["op"], "filters");
        assert_eq!(value["guildId"], "42");
        assert_eq!(value["timescale"]["speed"], 1.2);
        assert_eq!(value["rotation"]["rotationHz"], 0.2);
    }
}
