//! Controller type definitions
//!
//! Physical (XInput-shaped) and virtual (DirectInput-shaped) controller elements and snapshots.

use serde::{Deserialize, Serialize};
use std::ops::{Index, IndexMut};

/// Minimum value of a native analog axis reading.
pub const ANALOG_VALUE_MIN: i32 = -32768;

/// Maximum value of a native analog axis reading.
pub const ANALOG_VALUE_MAX: i32 = 32767;

/// Neutral (centered) analog axis reading.
pub const ANALOG_VALUE_NEUTRAL: i32 = 0;

/// Minimum trigger reading.
pub const TRIGGER_VALUE_MIN: i32 = 0;

/// Maximum trigger reading.
pub const TRIGGER_VALUE_MAX: i32 = 255;

/// Trigger reading that splits the trigger travel into two halves.
pub const TRIGGER_VALUE_MID: i32 = 128;

/// Number of virtual buttons a virtual controller can expose.
pub const VIRTUAL_BUTTON_COUNT: usize = 16;

/// Number of distinct keyboard scan codes that a keyboard mapper may target.
pub const KEYBOARD_KEY_COUNT: u32 = 256;

/// XInput button bit flags
///
/// Values follow the XInput API `wButtons` layout.
pub mod button_flags {
    pub const DPAD_UP: u16 = 0x0001;
    pub const DPAD_DOWN: u16 = 0x0002;
    pub const DPAD_LEFT: u16 = 0x0004;
    pub const DPAD_RIGHT: u16 = 0x0008;
    pub const START: u16 = 0x0010;
    pub const BACK: u16 = 0x0020;
    pub const LEFT_THUMB: u16 = 0x0040;
    pub const RIGHT_THUMB: u16 = 0x0080;
    pub const LEFT_SHOULDER: u16 = 0x0100;
    pub const RIGHT_SHOULDER: u16 = 0x0200;
    pub const A: u16 = 0x1000;
    pub const B: u16 = 0x2000;
    pub const X: u16 = 0x4000;
    pub const Y: u16 = 0x8000;
}

/// Virtual controller axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Axis {
    X,
    Y,
    Z,
    RotX,
    RotY,
    RotZ,
}

impl Axis {
    /// Number of virtual axes.
    pub const COUNT: usize = 6;

    /// All axes in index order.
    pub const ALL: [Axis; Axis::COUNT] =
        [Axis::X, Axis::Y, Axis::Z, Axis::RotX, Axis::RotY, Axis::RotZ];

    /// Position of this axis in per-axis arrays.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Axis for a per-axis array position.
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }
}

impl std::fmt::Display for Axis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Axis::X => write!(f, "X"),
            Axis::Y => write!(f, "Y"),
            Axis::Z => write!(f, "Z"),
            Axis::RotX => write!(f, "RotX"),
            Axis::RotY => write!(f, "RotY"),
            Axis::RotZ => write!(f, "RotZ"),
        }
    }
}

/// Portion of an axis' travel that a mapper drives or reads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AxisDirection {
    /// Entire axis, both halves
    #[default]
    Both,
    /// Positive half only
    Positive,
    /// Negative half only
    Negative,
}

impl std::fmt::Display for AxisDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AxisDirection::Both => write!(f, "bidir"),
            AxisDirection::Positive => write!(f, "+"),
            AxisDirection::Negative => write!(f, "-"),
        }
    }
}

/// Virtual controller button, stored zero-based
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Button(u8);

impl Button {
    /// Create a button from its zero-based index.
    pub fn new(index: usize) -> Option<Self> {
        if index < VIRTUAL_BUTTON_COUNT {
            Some(Self(index as u8))
        } else {
            None
        }
    }

    /// Create a button from the 1-based number users see.
    pub fn from_number(number: u32) -> Option<Self> {
        number
            .checked_sub(1)
            .and_then(|index| Self::new(index as usize))
    }

    /// Zero-based index.
    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// One-based number.
    pub fn number(self) -> u32 {
        self.0 as u32 + 1
    }
}

impl std::fmt::Display for Button {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Button {}", self.number())
    }
}

/// One of the four POV components
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PovDirection {
    Up,
    Down,
    Left,
    Right,
}

impl PovDirection {
    pub const ALL: [PovDirection; 4] = [
        PovDirection::Up,
        PovDirection::Down,
        PovDirection::Left,
        PovDirection::Right,
    ];

    fn index(self) -> usize {
        self as usize
    }
}

impl std::fmt::Display for PovDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PovDirection::Up => write!(f, "Up"),
            PovDirection::Down => write!(f, "Down"),
            PovDirection::Left => write!(f, "Left"),
            PovDirection::Right => write!(f, "Right"),
        }
    }
}

/// POV hat state as four independently pressed components
///
/// Opposing components cancel, leaving one of eight compass directions or centered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct PovState {
    components: [bool; 4],
}

impl PovState {
    /// Centered POV.
    pub const CENTERED: PovState = PovState { components: [false; 4] };

    /// Build a POV state from a list of pressed components.
    pub fn from_pressed(pressed: &[PovDirection]) -> Self {
        let mut state = Self::default();
        for direction in pressed {
            state.press(*direction);
        }
        state
    }

    pub fn press(&mut self, direction: PovDirection) {
        self.components[direction.index()] = true;
    }

    pub fn is_pressed(&self, direction: PovDirection) -> bool {
        self.components[direction.index()]
    }

    /// Angle in hundredths of a degree clockwise from north, or `None` when centered.
    pub fn angle(&self) -> Option<u32> {
        let vertical = match (self.is_pressed(PovDirection::Up), self.is_pressed(PovDirection::Down)) {
            (true, false) => 1,
            (false, true) => -1,
            _ => 0,
        };
        let horizontal = match (
            self.is_pressed(PovDirection::Right),
            self.is_pressed(PovDirection::Left),
        ) {
            (true, false) => 1,
            (false, true) => -1,
            _ => 0,
        };

        match (vertical, horizontal) {
            (1, 0) => Some(0),
            (1, 1) => Some(4500),
            (0, 1) => Some(9000),
            (-1, 1) => Some(13500),
            (-1, 0) => Some(18000),
            (-1, -1) => Some(22500),
            (0, -1) => Some(27000),
            (1, -1) => Some(31500),
            _ => None,
        }
    }

    /// Whether the components collapse to the centered position.
    pub fn is_centered(&self) -> bool {
        self.angle().is_none()
    }
}

impl std::fmt::Display for PovState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.angle() {
            Some(angle) => write!(f, "{}.{:02}", angle / 100, angle % 100),
            None => write!(f, "centered"),
        }
    }
}

/// Identifies one element of a virtual controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementIdentifier {
    Axis(Axis),
    Button(Button),
    Pov,
}

impl std::fmt::Display for ElementIdentifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ElementIdentifier::Axis(axis) => write!(f, "Axis {}", axis),
            ElementIdentifier::Button(button) => write!(f, "{}", button),
            ElementIdentifier::Pov => write!(f, "POV"),
        }
    }
}

/// Virtual controller snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VirtualState {
    pub axes: [i32; Axis::COUNT],
    pub buttons: [bool; VIRTUAL_BUTTON_COUNT],
    pub pov: PovState,
}

impl VirtualState {
    /// Neutral state: centered axes, released buttons, centered POV.
    pub fn neutral() -> Self {
        Self::default()
    }

    pub fn axis(&self, axis: Axis) -> i32 {
        self.axes[axis.index()]
    }

    pub fn button(&self, button: Button) -> bool {
        self.buttons[button.index()]
    }

    /// Clamp every axis to the native analog range.
    pub(crate) fn clamp_axes(&mut self) {
        for value in self.axes.iter_mut() {
            *value = (*value).clamp(ANALOG_VALUE_MIN, ANALOG_VALUE_MAX);
        }
    }
}

impl Index<Axis> for VirtualState {
    type Output = i32;

    fn index(&self, axis: Axis) -> &i32 {
        &self.axes[axis.index()]
    }
}

impl IndexMut<Axis> for VirtualState {
    fn index_mut(&mut self, axis: Axis) -> &mut i32 {
        &mut self.axes[axis.index()]
    }
}

impl Index<Button> for VirtualState {
    type Output = bool;

    fn index(&self, button: Button) -> &bool {
        &self.buttons[button.index()]
    }
}

impl IndexMut<Button> for VirtualState {
    fn index_mut(&mut self, button: Button) -> &mut bool {
        &mut self.buttons[button.index()]
    }
}

/// Connectivity reported by the physical device poll
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PhysicalDeviceStatus {
    Ok,
    #[default]
    NotConnected,
    Error,
}

/// Physical analog stick axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PhysicalStick {
    LeftX,
    LeftY,
    RightX,
    RightY,
}

/// Physical trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PhysicalTrigger {
    LT,
    RT,
}

/// Physical digital button, backed by its XInput bit flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PhysicalButton {
    DpadUp,
    DpadDown,
    DpadLeft,
    DpadRight,
    Start,
    Back,
    LS,
    RS,
    LB,
    RB,
    A,
    B,
    X,
    Y,
}

impl PhysicalButton {
    /// XInput `wButtons` mask for this button.
    pub fn mask(self) -> u16 {
        match self {
            PhysicalButton::DpadUp => button_flags::DPAD_UP,
            PhysicalButton::DpadDown => button_flags::DPAD_DOWN,
            PhysicalButton::DpadLeft => button_flags::DPAD_LEFT,
            PhysicalButton::DpadRight => button_flags::DPAD_RIGHT,
            PhysicalButton::Start => button_flags::START,
            PhysicalButton::Back => button_flags::BACK,
            PhysicalButton::LS => button_flags::LEFT_THUMB,
            PhysicalButton::RS => button_flags::RIGHT_THUMB,
            PhysicalButton::LB => button_flags::LEFT_SHOULDER,
            PhysicalButton::RB => button_flags::RIGHT_SHOULDER,
            PhysicalButton::A => button_flags::A,
            PhysicalButton::B => button_flags::B,
            PhysicalButton::X => button_flags::X,
            PhysicalButton::Y => button_flags::Y,
        }
    }
}

/// Snapshot of a physical controller, produced at poll time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PhysicalState {
    pub status: PhysicalDeviceStatus,
    /// XInput `wButtons` bit set
    pub buttons: u16,
    /// Left X, left Y, right X, right Y
    pub sticks: [i16; 4],
    /// Left trigger, right trigger
    pub triggers: [u8; 2],
}

impl PhysicalState {
    /// Connected controller at rest.
    pub fn connected() -> Self {
        Self {
            status: PhysicalDeviceStatus::Ok,
            ..Default::default()
        }
    }

    pub fn with_button(mut self, button: PhysicalButton) -> Self {
        self.buttons |= button.mask();
        self
    }

    pub fn with_stick(mut self, stick: PhysicalStick, value: i16) -> Self {
        self.sticks[stick as usize] = value;
        self
    }

    pub fn with_trigger(mut self, trigger: PhysicalTrigger, value: u8) -> Self {
        self.triggers[trigger as usize] = value;
        self
    }

    pub fn button(&self, button: PhysicalButton) -> bool {
        self.buttons & button.mask() != 0
    }

    pub fn stick(&self, stick: PhysicalStick) -> i16 {
        self.sticks[stick as usize]
    }

    pub fn trigger(&self, trigger: PhysicalTrigger) -> u8 {
        self.triggers[trigger as usize]
    }
}

/// Simulated mouse axis targeted by a mouse axis mapper
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MouseAxis {
    X,
    Y,
    WheelHorizontal,
    WheelVertical,
}

impl std::fmt::Display for MouseAxis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MouseAxis::X => write!(f, "X"),
            MouseAxis::Y => write!(f, "Y"),
            MouseAxis::WheelHorizontal => write!(f, "WheelHorizontal"),
            MouseAxis::WheelVertical => write!(f, "WheelVertical"),
        }
    }
}

/// Simulated mouse button targeted by a mouse button mapper
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MouseButton {
    Left,
    Middle,
    Right,
    X1,
    X2,
}

impl std::fmt::Display for MouseButton {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MouseButton::Left => write!(f, "Left"),
            MouseButton::Middle => write!(f, "Middle"),
            MouseButton::Right => write!(f, "Right"),
            MouseButton::X1 => write!(f, "X1"),
            MouseButton::X2 => write!(f, "X2"),
        }
    }
}

/// Capabilities a virtual controller advertises, derived from its mapper
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Capabilities {
    /// Axes present, in index order
    pub axes: [bool; Axis::COUNT],
    /// Axes that may carry force feedback
    pub force_feedback_axes: [bool; Axis::COUNT],
    pub num_buttons: usize,
    pub has_pov: bool,
}

impl Capabilities {
    pub fn has_axis(&self, axis: Axis) -> bool {
        self.axes[axis.index()]
    }

    pub fn num_axes(&self) -> usize {
        self.axes.iter().filter(|present| **present).count()
    }

    pub fn axis_supports_force_feedback(&self, axis: Axis) -> bool {
        self.force_feedback_axes[axis.index()]
    }

    pub fn supports_force_feedback(&self) -> bool {
        self.force_feedback_axes.iter().any(|present| *present)
    }

    /// Present axes in index order.
    pub fn axis_list(&self) -> Vec<Axis> {
        Axis::ALL
            .iter()
            .copied()
            .filter(|axis| self.has_axis(*axis))
            .collect()
    }
}
