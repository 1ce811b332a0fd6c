//! Force feedback
//!
//! Effect parameters, direction vectors, per-controller effect storage and the hub that ties
//! virtual controllers to the physical actuators they drive.

pub mod device;
pub mod direction;
pub mod effect;
pub mod hub;

pub use device::Device;
pub use direction::{CoordinateSystem, DirectionVector};
pub use effect::{Effect, EffectKind, Envelope, Waveform};
pub use hub::ForceFeedbackHub;

use thiserror::Error;

use crate::controller::types::Axis;

/// Numeric type for magnitudes, angles and coordinates
pub type EffectValue = f32;

/// Milliseconds since an effect started playing
pub type EffectTimeMs = u32;

/// Smallest effect magnitude.
pub const EFFECT_MAGNITUDE_MIN: EffectValue = -10000.0;

/// Largest effect magnitude.
pub const EFFECT_MAGNITUDE_MAX: EffectValue = 10000.0;

/// Smallest angle, in hundredths of a degree.
pub const EFFECT_ANGLE_MIN: EffectValue = 0.0;

/// Largest angle, in hundredths of a degree.
pub const EFFECT_ANGLE_MAX: EffectValue = 35999.0;

/// Angle of one full turn, in hundredths of a degree.
pub const EFFECT_ANGLE_FULL_TURN: EffectValue = 36000.0;

/// Smallest gain or level modifier.
pub const EFFECT_MODIFIER_MIN: u32 = 0;

/// Largest gain or level modifier, meaning "unmodified".
pub const EFFECT_MODIFIER_MAX: u32 = 10000;

/// Most axes a direction vector may span.
pub const EFFECT_DIRECTION_AXES_MAX: usize = 3;

/// Magnitude contributed to each virtual axis, in axis index order
pub type MagnitudeVector = [EffectValue; Axis::COUNT];

/// Effect parameter validation failures
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EffectError {
    #[error("magnitude {0} is outside -10000..=10000")]
    Magnitude(EffectValue),
    #[error("amplitude {0} is outside 0..=10000")]
    Amplitude(EffectValue),
    #[error("offset {0} is outside -10000..=10000")]
    Offset(EffectValue),
    #[error("phase {0} is outside 0..=35999")]
    Phase(EffectValue),
    #[error("period must be at least 1 ms")]
    Period,
    #[error("gain {0} is outside 0..=10000")]
    Gain(u32),
    #[error("envelope level {0} is outside 0..=10000")]
    EnvelopeLevel(EffectValue),
    #[error("envelope attack and fade times exceed the effect duration")]
    EnvelopeTiming,
    #[error("effect has no associated axes")]
    NoAxes,
    #[error("effect has no duration")]
    NoDuration,
    #[error("effect direction spans {direction} axes but {axes} axes are associated")]
    AxisCountMismatch { direction: usize, axes: usize },
    #[error("effect {0} is not stored on this device")]
    UnknownEffect(u32),
}

/// Direction vector validation failures
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DirectionError {
    #[error("direction needs 1 to 3 components, got {0}")]
    ComponentCount(usize),
    #[error("cartesian direction must have at least one non-zero component")]
    ZeroVector,
    #[error("angle {0} is outside 0..=35999")]
    AngleRange(EffectValue),
    #[error("{system} coordinates need {expected} angles for {axes} axes, got {actual}")]
    AngleCount {
        system: CoordinateSystem,
        axes: usize,
        expected: usize,
        actual: usize,
    },
    #[error("{0} coordinates are not defined for a single axis")]
    Unsupported(CoordinateSystem),
}
