use crate::hue::models::LightUpdate;
use beatlight_core::AnalysisResult;

/// Maximum bridge brightness
const MAX_BRIGHTNESS: f64 = 254.0;

/// Trait for light effects that map audio features to light updates.
/// `lights` are light ids as listed in the light map.
pub trait LightEffect: Send + Sync {
    fn update(&mut self, analysis: &AnalysisResult, beat: bool, lights: &[String])
        -> Vec<LightUpdate>;
}

/// Flashes every light on a beat and lets it fade out between beats.
/// Each beat moves the hue forward so consecutive flashes differ in color.
pub struct BeatPulseEffect {
    /// Brightness multiplier applied per frame without a beat
    pub decay: f64,
    /// Hue advance per beat, in [0, 1)
    pub hue_step: f64,
    level: f64,
    base_hue: f64,
    last_sent: Option<i32>,
}

impl BeatPulseEffect {
    /// Smallest brightness change worth sending while fading
    const MIN_STEP: i32 = 16;

    pub fn new(decay: f64, hue_step: f64) -> Self {
        Self {
            decay: decay.clamp(0.0, 1.0),
            hue_step,
            level: 0.0,
            base_hue: 0.0,
            last_sent: None,
        }
    }

    fn hue_for(&self, index: usize, count: usize) -> f64 {
        // Spread lights over a third of the color wheel
        let offset = index as f64 / count.max(1) as f64 / 3.0;
        (self.base_hue + offset).fract()
    }
}

impl Default for BeatPulseEffect {
    fn default() -> Self {
        Self::new(0.85, 0.13)
    }
}

impl LightEffect for BeatPulseEffect {
    fn update(
        &mut self,
        _analysis: &AnalysisResult,
        beat: bool,
        lights: &[String],
    ) -> Vec<LightUpdate> {
        if beat {
            self.level = 1.0;
            self.base_hue = (self.base_hue + self.hue_step).fract();
            self.last_sent = Some(MAX_BRIGHTNESS as i32);
            return lights
                .iter()
                .enumerate()
                .map(|(i, id)| {
                    LightUpdate::new(id.as_str())
                        .with_brightness(MAX_BRIGHTNESS as i32)
                        .with_hue(self.hue_for(i, lights.len()))
                        .with_saturation(1.0)
                        .with_transition_time(0)
                })
                .collect();
        }

        self.level *= self.decay;
        let brightness = (self.level * MAX_BRIGHTNESS).round() as i32;
        let changed = match self.last_sent {
            Some(last) => {
                (last - brightness).abs() >= Self::MIN_STEP || (brightness == 0 && last != 0)
            }
            None => false,
        };
        if !changed {
            return Vec::new();
        }

        self.last_sent = Some(brightness);
        lights
            .iter()
            .map(|id| {
                LightUpdate::new(id.as_str())
                    .with_brightness(brightness)
                    .with_transition_time(1)
            })
            .collect()
    }
}

/// Continuous effect: energy drives brightness, dominant frequency drives hue
/// (log scale from 20 Hz to 20 kHz).
pub struct EnergyEffect {
    /// Energy that maps to full brightness
    pub full_scale_energy: f64,
}

impl EnergyEffect {
    const MIN_FREQ: f64 = 20.0;
    const MAX_FREQ: f64 = 20_000.0;

    pub fn new(full_scale_energy: f64) -> Self {
        Self { full_scale_energy }
    }

    fn hue_for_frequency(frequency: f64) -> f64 {
        if frequency.is_nan() || frequency <= Self::MIN_FREQ {
            return 0.0;
        }
        let span = (Self::MAX_FREQ / Self::MIN_FREQ).ln();
        ((frequency / Self::MIN_FREQ).ln() / span).clamp(0.0, 1.0)
    }
}

impl Default for EnergyEffect {
    fn default() -> Self {
        Self::new(0.5)
    }
}

impl LightEffect for EnergyEffect {
    fn update(
        &mut self,
        analysis: &AnalysisResult,
        _beat: bool,
        lights: &[String],
    ) -> Vec<LightUpdate> {
        let scale = if self.full_scale_energy > 0.0 {
            (analysis.energy / self.full_scale_energy).clamp(0.0, 1.0)
        } else {
            0.0
        };
        let brightness = (scale * MAX_BRIGHTNESS).round() as i32;
        let hue = Self::hue_for_frequency(analysis.frequency);

        lights
            .iter()
            .map(|id| {
                LightUpdate::new(id.as_str())
                    .with_brightness(brightness)
                    .with_hue(hue)
                    .with_saturation(1.0)
                    .with_transition_time(1)
            })
            .collect()
    }
}
