//! Controller math: analog shaping, digital thresholds and the per-axis property pipeline
//!
//! Physical-side transforms operate on native XInput values (`i16` sticks, `u8` triggers) with
//! deadzone and saturation expressed as percentages. The virtual-side pipeline operates on
//! DirectInput-style properties where deadzone and saturation are expressed in units of
//! 1/10000 of an axis' travel.

use serde::{Deserialize, Serialize};

use super::types::{ANALOG_VALUE_MAX, ANALOG_VALUE_MIN, ANALOG_VALUE_NEUTRAL, TRIGGER_VALUE_MAX};

/// Stick displacement (either direction) beyond which a stick counts as a pressed button.
pub const ANALOG_PRESSED_THRESHOLD: i32 = 16384;

/// Trigger threshold at or above which a trigger counts as a pressed button.
///
/// Matches the XInput trigger threshold constant.
pub const TRIGGER_PRESSED_THRESHOLD: i32 = 30;

/// Smallest allowed axis deadzone property value.
pub const AXIS_DEADZONE_MIN: u32 = 0;

/// Largest allowed axis deadzone property value (entire travel).
pub const AXIS_DEADZONE_MAX: u32 = 10000;

/// Default axis deadzone property value.
pub const AXIS_DEADZONE_DEFAULT: u32 = AXIS_DEADZONE_MIN;

/// Smallest allowed axis saturation property value.
pub const AXIS_SATURATION_MIN: u32 = 0;

/// Largest allowed axis saturation property value (entire travel).
pub const AXIS_SATURATION_MAX: u32 = 10000;

/// Default axis saturation property value.
pub const AXIS_SATURATION_DEFAULT: u32 = AXIS_SATURATION_MAX;

/// Apply a deadzone and saturation, both in percent, to a raw stick reading.
///
/// # Arguments
/// * `value` - Raw stick value (-32768 to 32767)
/// * `deadzone_percent` - Portion of each half-travel collapsed to neutral
/// * `saturation_percent` - Portion of each half-travel beyond which the output is pinned
///
/// # Returns
/// Reshaped stick value. A deadzone of 0 and saturation of 100 is the identity.
pub fn apply_raw_analog_transform(value: i16, deadzone_percent: u32, saturation_percent: u32) -> i16 {
    if deadzone_percent == 0 && saturation_percent >= 100 {
        return value;
    }

    let scaled = scale_magnitude(
        (value as i32).unsigned_abs() as i64,
        ANALOG_VALUE_MAX as i64,
        deadzone_percent,
        saturation_percent,
    );

    if value < 0 {
        (-scaled).max(ANALOG_VALUE_MIN as i64) as i16
    } else {
        scaled.min(ANALOG_VALUE_MAX as i64) as i16
    }
}

/// Apply a deadzone and saturation, both in percent, to a raw trigger reading.
///
/// # Arguments
/// * `value` - Raw trigger value (0 to 255)
/// * `deadzone_percent` - Portion of the travel collapsed to zero
/// * `saturation_percent` - Portion of the travel beyond which the output is pinned
pub fn apply_raw_trigger_transform(value: u8, deadzone_percent: u32, saturation_percent: u32) -> u8 {
    if deadzone_percent == 0 && saturation_percent >= 100 {
        return value;
    }

    scale_magnitude(
        value as i64,
        TRIGGER_VALUE_MAX as i64,
        deadzone_percent,
        saturation_percent,
    )
    .min(TRIGGER_VALUE_MAX as i64) as u8
}

/// Rescale a magnitude so that `[deadzone, saturation]` spans `[0, full_scale]`.
///
/// Results beyond `full_scale` are returned unclamped so callers can clamp to their own type.
fn scale_magnitude(magnitude: i64, full_scale: i64, deadzone_percent: u32, saturation_percent: u32) -> i64 {
    let deadzone = full_scale * deadzone_percent.min(100) as i64 / 100;
    let saturation = full_scale * saturation_percent.min(100) as i64 / 100;

    if magnitude <= deadzone {
        return 0;
    }
    if saturation <= deadzone {
        return full_scale + 1;
    }

    let scaled = (magnitude - deadzone) as f64 * full_scale as f64 / (saturation - deadzone) as f64;
    scaled.round() as i64
}

/// Whether a stick is pushed far enough in the positive direction to count as pressed.
pub fn is_analog_pressed_positive(value: i16) -> bool {
    value as i32 >= ANALOG_PRESSED_THRESHOLD
}

/// Whether a stick is pushed far enough in the negative direction to count as pressed.
pub fn is_analog_pressed_negative(value: i16) -> bool {
    value as i32 <= -ANALOG_PRESSED_THRESHOLD
}

/// Whether a stick is pushed far enough in either direction to count as pressed.
pub fn is_analog_pressed(value: i16) -> bool {
    is_analog_pressed_positive(value) || is_analog_pressed_negative(value)
}

/// Whether a trigger is pulled far enough to count as pressed.
pub fn is_trigger_pressed(value: u8) -> bool {
    value as i32 >= TRIGGER_PRESSED_THRESHOLD
}

/// DirectInput-style properties of one virtual axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AxisProperties {
    /// Deadzone in units of 1/10000 of a half-travel
    pub deadzone: u32,
    /// Saturation in units of 1/10000 of a half-travel
    pub saturation: u32,
    pub range_min: i32,
    pub range_max: i32,
    pub transforms_enabled: bool,
}

impl Default for AxisProperties {
    fn default() -> Self {
        Self {
            deadzone: AXIS_DEADZONE_DEFAULT,
            saturation: AXIS_SATURATION_DEFAULT,
            range_min: ANALOG_VALUE_MIN,
            range_max: ANALOG_VALUE_MAX,
            transforms_enabled: true,
        }
    }
}

impl AxisProperties {
    /// Midpoint of the configured output range.
    pub fn range_neutral(&self) -> i32 {
        ((self.range_min as i64 + self.range_max as i64) / 2) as i32
    }

    /// Run a raw axis value through the deadzone, saturation and range pipeline.
    ///
    /// The native input range is split into five regions by four cutoff points. Below negative
    /// saturation the output is `range_min`; from negative saturation to negative deadzone it
    /// rises linearly to the range midpoint; between the deadzone cutoffs (inclusive) it stays at
    /// the midpoint; from positive deadzone to positive saturation it rises linearly to
    /// `range_max`; beyond positive saturation it is `range_max`.
    ///
    /// # Arguments
    /// * `raw_value` - Axis value in the native analog range
    ///
    /// # Returns
    /// Transformed value, or `raw_value` unchanged when transforms are disabled
    pub fn apply(&self, raw_value: i32) -> i32 {
        if !self.transforms_enabled {
            return raw_value;
        }

        let value = raw_value as i64;
        let range_min = self.range_min as i64;
        let range_max = self.range_max as i64;
        let range_neutral = self.range_neutral() as i64;

        let saturation_negative = cutoff(ANALOG_VALUE_MIN, self.saturation, AXIS_SATURATION_MAX);
        let deadzone_negative = cutoff(ANALOG_VALUE_MIN, self.deadzone, AXIS_DEADZONE_MAX);
        let deadzone_positive = cutoff(ANALOG_VALUE_MAX, self.deadzone, AXIS_DEADZONE_MAX);
        let saturation_positive = cutoff(ANALOG_VALUE_MAX, self.saturation, AXIS_SATURATION_MAX);

        let output = if value < saturation_negative {
            range_min
        } else if value < deadzone_negative {
            range_min
                + interpolate(
                    value - saturation_negative,
                    range_neutral - range_min,
                    deadzone_negative - saturation_negative,
                )
        } else if value <= deadzone_positive {
            range_neutral
        } else if value <= saturation_positive {
            range_neutral
                + interpolate(
                    value - deadzone_positive,
                    range_max - range_neutral,
                    saturation_positive - deadzone_positive,
                )
        } else {
            range_max
        };

        output as i32
    }
}

/// Cutoff point between neutral and `extreme`, placed at `amount / max` of the way.
fn cutoff(extreme: i32, amount: u32, max: u32) -> i64 {
    let fraction = amount.min(max) as f64 / max as f64;
    ANALOG_VALUE_NEUTRAL as i64 + ((extreme - ANALOG_VALUE_NEUTRAL) as f64 * fraction) as i64
}

/// `position / span` of the way through `output_span`, rounded.
fn interpolate(position: i64, output_span: i64, span: i64) -> i64 {
    (position as f64 * output_span as f64 / span as f64).round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sufficiently_equal<T: Into<i64>>(a: T, b: T) -> bool {
        (a.into() - b.into()).abs() <= 1
    }

    #[test]
    fn test_analog_transform_nominal() {
        for value in [-32768i16, -100, 0, 100, 32767] {
            assert_eq!(apply_raw_analog_transform(value, 0, 100), value);
        }
    }

    fn check_analog_cases(cases: &[(i32, i32)], deadzone: u32, saturation: u32) {
        for &(input, expected) in cases {
            let actual = apply_raw_analog_transform(input as i16, deadzone, saturation);
            assert!(
                sufficiently_equal(actual as i32, expected),
                "{} -> {} (expected {})",
                input,
                actual,
                expected
            );
        }
    }

    #[test]
    fn test_analog_transform_with_deadzone() {
        check_analog_cases(
            &[
                (-32768, -32768),
                (32767, 32767),
                (16383, 0),
                (-16383, 0),
                (16383 + 16384 / 4, 32768 / 4),
                (-(16383 + 16384 / 4), -(32768 / 4)),
                (16383 + 16384 / 2, 32768 / 2),
                (-(16383 + 16384 / 2), -(32768 / 2)),
                (16383 + 16384 * 3 / 4, 32768 * 3 / 4),
                (-(16383 + 16384 * 3 / 4), -(32768 * 3 / 4)),
            ],
            50,
            100,
        );
    }

    #[test]
    fn test_analog_transform_with_saturation() {
        check_analog_cases(
            &[
                (-32768, -32768),
                (32767, 32767),
                (16383, 32767),
                (-16383, -32767),
                (16384 / 4, 32768 / 4),
                (-(16384 / 4), -(32768 / 4)),
                (16384 / 2, 32768 / 2),
                (-(16384 / 2), -(32768 / 2)),
                (16384 * 3 / 4, 32768 * 3 / 4),
                (-(16384 * 3 / 4), -(32768 * 3 / 4)),
            ],
            0,
            50,
        );
    }

    #[test]
    fn test_analog_transform_with_deadzone_and_saturation() {
        check_analog_cases(
            &[
                (-32768, -32768),
                (32767, 32767),
                (16383, 16384),
                (-16383, -16384),
                (8191 + 16384 / 4, 32768 / 4),
                (-(8191 + 16384 / 4), -(32768 / 4)),
                (8191 + 16384 * 3 / 4, 32768 * 3 / 4),
                (-(8191 + 16384 * 3 / 4), -(32768 * 3 / 4)),
            ],
            25,
            75,
        );
    }

    #[test]
    fn test_trigger_transform() {
        for value in [0u8, 31, 63, 127, 159, 191, 223, 255] {
            assert_eq!(apply_raw_trigger_transform(value, 0, 100), value);
        }

        let deadzone_cases: [(u8, u8); 5] = [(0, 0), (255, 255), (63, 0), (191, 127), (223, 191)];
        for (input, expected) in deadzone_cases {
            assert!(sufficiently_equal(apply_raw_trigger_transform(input, 50, 100), expected));
        }

        let saturation_cases: [(u8, u8); 5] = [(0, 0), (255, 255), (31, 63), (63, 127), (127, 255)];
        for (input, expected) in saturation_cases {
            assert!(sufficiently_equal(apply_raw_trigger_transform(input, 0, 50), expected));
        }

        let combined_cases: [(u8, u8); 5] = [(31, 0), (63, 0), (127, 127), (191, 255), (223, 255)];
        for (input, expected) in combined_cases {
            assert!(sufficiently_equal(apply_raw_trigger_transform(input, 25, 75), expected));
        }
    }

    #[test]
    fn test_pressed_thresholds() {
        assert!(!is_analog_pressed_positive(-32768));
        assert!(!is_analog_pressed_positive(0));
        assert!(is_analog_pressed_positive(32767));

        assert!(is_analog_pressed_negative(-32768));
        assert!(!is_analog_pressed_negative(0));
        assert!(!is_analog_pressed_negative(32767));

        assert!(is_analog_pressed(-32768));
        assert!(!is_analog_pressed(0));
        assert!(is_analog_pressed(32767));

        assert!(!is_trigger_pressed(0));
        assert!(is_trigger_pressed(255));
    }

    #[test]
    fn test_axis_properties_default_is_identity() {
        let properties = AxisProperties::default();
        for value in [ANALOG_VALUE_MIN, -12345, -1, 0, 1, 12345, ANALOG_VALUE_MAX] {
            assert_eq!(properties.apply(value), value);
        }
    }

    #[test]
    fn test_axis_properties_deadzone_region() {
        let properties = AxisProperties {
            deadzone: 5000,
            ..Default::default()
        };

        // Negative cutoff is exactly half of the negative travel
        assert_eq!(properties.apply(-16384), 0);
        assert_eq!(properties.apply(16383), 0);
        assert!(properties.apply(-16385) < 0);
        assert!(properties.apply(-20000) < properties.apply(-16385));
        assert_eq!(properties.apply(ANALOG_VALUE_MIN), ANALOG_VALUE_MIN);
        assert_eq!(properties.apply(ANALOG_VALUE_MAX), ANALOG_VALUE_MAX);
    }

    #[test]
    fn test_axis_properties_asymmetric_range() {
        let properties = AxisProperties {
            range_min: 0,
            range_max: 1000,
            saturation: 5000,
            ..Default::default()
        };

        assert_eq!(properties.range_neutral(), 500);
        assert_eq!(properties.apply(0), 500);
        assert_eq!(properties.apply(-16384), 0);
        assert_eq!(properties.apply(-30000), 0);
        assert_eq!(properties.apply(16383), 1000);
        assert_eq!(properties.apply(8192), 750);
    }

    #[test]
    fn test_axis_properties_saturation_below_deadzone() {
        let properties = AxisProperties {
            deadzone: 8000,
            saturation: 2000,
            ..Default::default()
        };

        assert_eq!(properties.apply(0), 0);
        assert_eq!(properties.apply(20000), 0);
        assert_eq!(properties.apply(30000), ANALOG_VALUE_MAX);
        assert_eq!(properties.apply(-30000), ANALOG_VALUE_MIN);
    }

    #[test]
    fn test_axis_properties_disabled_passes_through() {
        let properties = AxisProperties {
            deadzone: 9000,
            range_min: -10,
            range_max: 10,
            transforms_enabled: false,
            ..Default::default()
        };

        assert_eq!(properties.apply(1234), 1234);
        assert_eq!(properties.apply(ANALOG_VALUE_MIN), ANALOG_VALUE_MIN);
    }

    fn valid_properties() -> impl Strategy<Value = AxisProperties> {
        (
            AXIS_DEADZONE_MIN..=AXIS_DEADZONE_MAX,
            AXIS_SATURATION_MIN..=AXIS_SATURATION_MAX,
            i32::MIN..i32::MAX,
            1i64..=(u32::MAX as i64),
        )
            .prop_map(|(deadzone, saturation, range_min, span)| AxisProperties {
                deadzone,
                saturation,
                range_min,
                range_max: (range_min as i64 + span).min(i32::MAX as i64) as i32,
                transforms_enabled: true,
            })
            .prop_filter("range must be non-empty", |p| p.range_min < p.range_max)
    }

    proptest! {
        #[test]
        fn prop_axis_transform_is_monotonic(
            properties in valid_properties(),
            a in ANALOG_VALUE_MIN..=ANALOG_VALUE_MAX,
            b in ANALOG_VALUE_MIN..=ANALOG_VALUE_MAX,
        ) {
            let (low, high) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(properties.apply(low) <= properties.apply(high));
        }

        #[test]
        fn prop_axis_transform_stays_in_range(
            properties in valid_properties(),
            value in ANALOG_VALUE_MIN..=ANALOG_VALUE_MAX,
        ) {
            let output = properties.apply(value);
            prop_assert!(output >= properties.range_min && output <= properties.range_max);
        }

        #[test]
        fn prop_axis_transform_nominal_is_identity(value in ANALOG_VALUE_MIN..=ANALOG_VALUE_MAX) {
            prop_assert_eq!(AxisProperties::default().apply(value), value);
        }
    }
}
