//! Force feedback effects
//!
//! An effect is a time-varying signed magnitude plus a direction. Magnitude evaluation runs on
//! time quantized to the effect's sample period, shapes the sustain level with an optional
//! envelope, and scales the result by the effect gain.

use std::sync::atomic::{AtomicU32, Ordering};

use super::{
    DirectionVector, EffectError, EffectTimeMs, EffectValue, MagnitudeVector, EFFECT_ANGLE_FULL_TURN,
    EFFECT_ANGLE_MAX, EFFECT_MAGNITUDE_MAX, EFFECT_MAGNITUDE_MIN, EFFECT_MODIFIER_MAX,
};
use crate::controller::types::Axis;

/// Duration of an effect that never ends on its own.
pub const EFFECT_TIME_INFINITE: EffectTimeMs = EffectTimeMs::MAX;

/// Effect ids are unique across every device.
static NEXT_EFFECT_ID: AtomicU32 = AtomicU32::new(1);

/// Attack and fade shaping of the sustain level
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Envelope {
    pub attack_time: EffectTimeMs,
    pub attack_level: EffectValue,
    pub fade_time: EffectTimeMs,
    pub fade_level: EffectValue,
}

impl Envelope {
    /// Whether the attack and fade both fit inside an effect lasting `duration`.
    fn fits_within(&self, duration: EffectTimeMs) -> bool {
        duration == EFFECT_TIME_INFINITE || self.attack_time as u64 + self.fade_time as u64 <= duration as u64
    }
}

/// Periodic effect waveform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Waveform {
    Sine,
    Square,
    Triangle,
    SawtoothUp,
    SawtoothDown,
}

impl Waveform {
    /// Waveform value in -1.0..=1.0 at a phase in hundredths of a degree.
    ///
    /// Every waveform starts at 0 or its positive edge at phase 0 and has period 36000.
    pub fn amplitude(self, phase: EffectValue) -> EffectValue {
        let quarter = EFFECT_ANGLE_FULL_TURN / 4.0;
        let half = EFFECT_ANGLE_FULL_TURN / 2.0;
        match self {
            Waveform::Sine => (phase / 100.0).to_radians().sin(),
            Waveform::Square => {
                if phase < half {
                    1.0
                } else {
                    -1.0
                }
            }
            Waveform::Triangle => {
                if phase < quarter {
                    phase / quarter
                } else if phase < 3.0 * quarter {
                    2.0 - phase / quarter
                } else {
                    phase / quarter - 4.0
                }
            }
            Waveform::SawtoothUp => sawtooth_up(phase, half),
            Waveform::SawtoothDown => -sawtooth_up(phase, half),
        }
    }
}

fn sawtooth_up(phase: EffectValue, half: EffectValue) -> EffectValue {
    if phase < half {
        phase / half
    } else {
        phase / half - 2.0
    }
}

impl std::fmt::Display for Waveform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Waveform::Sine => write!(f, "Sine"),
            Waveform::Square => write!(f, "Square"),
            Waveform::Triangle => write!(f, "Triangle"),
            Waveform::SawtoothUp => write!(f, "SawtoothUp"),
            Waveform::SawtoothDown => write!(f, "SawtoothDown"),
        }
    }
}

/// Type-specific effect parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EffectKind {
    Constant {
        magnitude: EffectValue,
    },
    Periodic {
        waveform: Waveform,
        amplitude: EffectValue,
        offset: EffectValue,
        /// Phase offset in hundredths of a degree
        phase: EffectValue,
        /// Period in milliseconds
        period: EffectTimeMs,
    },
}

impl EffectKind {
    pub fn validate(&self) -> Result<(), EffectError> {
        match *self {
            EffectKind::Constant { magnitude } => {
                if !(EFFECT_MAGNITUDE_MIN..=EFFECT_MAGNITUDE_MAX).contains(&magnitude) {
                    return Err(EffectError::Magnitude(magnitude));
                }
            }
            EffectKind::Periodic {
                amplitude,
                offset,
                phase,
                period,
                ..
            } => {
                if !(0.0..=EFFECT_MAGNITUDE_MAX).contains(&amplitude) {
                    return Err(EffectError::Amplitude(amplitude));
                }
                if !(EFFECT_MAGNITUDE_MIN..=EFFECT_MAGNITUDE_MAX).contains(&offset) {
                    return Err(EffectError::Offset(offset));
                }
                if !(0.0..=EFFECT_ANGLE_MAX).contains(&phase) {
                    return Err(EffectError::Phase(phase));
                }
                if period < 1 {
                    return Err(EffectError::Period);
                }
            }
        }
        Ok(())
    }
}

/// One force feedback effect
#[derive(Debug, Clone, PartialEq)]
pub struct Effect {
    id: u32,
    kind: EffectKind,
    /// Unset until the application provides one; an effect without a duration outputs nothing
    duration: Option<EffectTimeMs>,
    sample_period: EffectTimeMs,
    gain: u32,
    envelope: Option<Envelope>,
    direction: DirectionVector,
    axes: Vec<Axis>,
}

impl Effect {
    /// Create an effect with a fresh id, no duration, full gain and no associated axes.
    pub fn new(kind: EffectKind) -> Result<Self, EffectError> {
        kind.validate()?;
        Ok(Self {
            id: NEXT_EFFECT_ID.fetch_add(1, Ordering::Relaxed),
            kind,
            duration: None,
            sample_period: 1,
            gain: EFFECT_MODIFIER_MAX,
            envelope: None,
            direction: DirectionVector::default(),
            axes: Vec::new(),
        })
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn kind(&self) -> &EffectKind {
        &self.kind
    }

    pub fn duration(&self) -> Option<EffectTimeMs> {
        self.duration
    }

    pub fn gain(&self) -> u32 {
        self.gain
    }

    pub fn envelope(&self) -> Option<&Envelope> {
        self.envelope.as_ref()
    }

    pub fn direction(&self) -> &DirectionVector {
        &self.direction
    }

    pub fn axes(&self) -> &[Axis] {
        &self.axes
    }

    pub fn set_kind(&mut self, kind: EffectKind) -> Result<(), EffectError> {
        kind.validate()?;
        self.kind = kind;
        Ok(())
    }

    /// Rejects a duration too short to hold the attack and fade of the stored envelope.
    pub fn set_duration(&mut self, duration: EffectTimeMs) -> Result<(), EffectError> {
        if let Some(envelope) = &self.envelope {
            if !envelope.fits_within(duration) {
                return Err(EffectError::EnvelopeTiming);
            }
        }
        self.duration = Some(duration);
        Ok(())
    }

    /// Evaluation granularity in milliseconds. 0 means every millisecond.
    pub fn set_sample_period(&mut self, sample_period: EffectTimeMs) {
        self.sample_period = sample_period.max(1);
    }

    pub fn set_gain(&mut self, gain: u32) -> Result<(), EffectError> {
        if gain > EFFECT_MODIFIER_MAX {
            return Err(EffectError::Gain(gain));
        }
        self.gain = gain;
        Ok(())
    }

    pub fn set_envelope(&mut self, envelope: Option<Envelope>) -> Result<(), EffectError> {
        if let Some(envelope) = &envelope {
            for level in [envelope.attack_level, envelope.fade_level] {
                if !(0.0..=EFFECT_MAGNITUDE_MAX).contains(&level) {
                    return Err(EffectError::EnvelopeLevel(level));
                }
            }
            if let Some(duration) = self.duration {
                if !envelope.fits_within(duration) {
                    return Err(EffectError::EnvelopeTiming);
                }
            }
        }
        self.envelope = envelope;
        Ok(())
    }

    pub fn set_direction(&mut self, direction: DirectionVector) {
        self.direction = direction;
    }

    /// Associate the virtual axes the direction components map onto, in component order.
    pub fn set_axes(&mut self, axes: Vec<Axis>) -> Result<(), EffectError> {
        if axes.is_empty() {
            return Err(EffectError::NoAxes);
        }
        self.axes = axes;
        Ok(())
    }

    /// Whether every parameter needed to play the effect is present and consistent.
    pub fn check_ready(&self) -> Result<(), EffectError> {
        if self.axes.is_empty() {
            return Err(EffectError::NoAxes);
        }
        if self.direction.num_axes() != self.axes.len() {
            return Err(EffectError::AxisCountMismatch {
                direction: self.direction.num_axes(),
                axes: self.axes.len(),
            });
        }
        if self.duration.is_none() {
            return Err(EffectError::NoDuration);
        }
        Ok(())
    }

    /// Whether `time` is at or past the end of the effect.
    pub fn is_finished_at(&self, time: EffectTimeMs) -> bool {
        time >= self.duration.unwrap_or(0)
    }

    /// Signed magnitude at `time` milliseconds after the effect started.
    pub fn compute_magnitude(&self, time: EffectTimeMs) -> EffectValue {
        if self.is_finished_at(time) {
            return 0.0;
        }

        let raw_time = time - (time % self.sample_period);
        self.compute_raw_magnitude(raw_time) * (self.gain as EffectValue / EFFECT_MODIFIER_MAX as EffectValue)
    }

    /// Magnitude at `time` split across the associated virtual axes.
    pub fn compute_magnitude_components(&self, time: EffectTimeMs) -> MagnitudeVector {
        let mut components = MagnitudeVector::default();
        let magnitude = self.compute_magnitude(time);
        if magnitude == 0.0 {
            return components;
        }

        let projected = self.direction.magnitude_components(magnitude);
        for (axis, value) in self.axes.iter().zip(projected) {
            components[axis.index()] += value;
        }
        components
    }

    fn compute_raw_magnitude(&self, raw_time: EffectTimeMs) -> EffectValue {
        match self.kind {
            EffectKind::Constant { magnitude } => {
                if magnitude >= 0.0 {
                    self.apply_envelope(raw_time, magnitude)
                } else {
                    -self.apply_envelope(raw_time, -magnitude)
                }
            }
            EffectKind::Periodic {
                waveform,
                amplitude,
                offset,
                phase,
                period,
            } => {
                let amplitude = self.apply_envelope(raw_time, amplitude);
                let raw = amplitude * waveform.amplitude(compute_phase(raw_time, period, phase)) + offset;
                raw.clamp(EFFECT_MAGNITUDE_MIN, EFFECT_MAGNITUDE_MAX)
            }
        }
    }

    fn apply_envelope(&self, raw_time: EffectTimeMs, sustain_level: EffectValue) -> EffectValue {
        let Some(envelope) = &self.envelope else {
            return sustain_level;
        };
        let duration = self.duration.unwrap_or(0);

        if raw_time < envelope.attack_time {
            let slope = (sustain_level - envelope.attack_level) / envelope.attack_time as EffectValue;
            envelope.attack_level + slope * raw_time as EffectValue
        } else if raw_time > duration.saturating_sub(envelope.fade_time) && envelope.fade_time > 0 {
            let fade_start = duration.saturating_sub(envelope.fade_time);
            let slope = (envelope.fade_level - sustain_level) / envelope.fade_time as EffectValue;
            sustain_level + slope * (raw_time - fade_start) as EffectValue
        } else {
            sustain_level
        }
    }
}

/// Phase at `raw_time`, in hundredths of a degree, wrapped into 0..36000.
fn compute_phase(raw_time: EffectTimeMs, period: EffectTimeMs, phase_offset: EffectValue) -> EffectValue {
    let periods = raw_time as f64 / period as f64;
    let mut phase = ((periods - periods.floor()) * EFFECT_ANGLE_FULL_TURN as f64 + phase_offset as f64).round();
    if phase >= EFFECT_ANGLE_FULL_TURN as f64 {
        phase -= EFFECT_ANGLE_FULL_TURN as f64;
    }
    phase as EffectValue
}
