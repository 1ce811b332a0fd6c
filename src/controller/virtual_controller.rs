//! Virtual controller
//!
//! Presents a mapper's output through DirectInput-style axis properties, an optional buffer of
//! state-change events and an optional change notification. Snapshots, properties, the event
//! buffer and force feedback registration all sit behind a single lock.

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, trace};

use super::element_mapper::ExternalInputSink;
use super::event_buffer::{EventData, StateChangeEvent, StateChangeEventBuffer};
use super::mapper::Mapper;
use super::math::{AxisProperties, AXIS_DEADZONE_MAX, AXIS_SATURATION_MAX};
use super::types::{
    Axis, Button, Capabilities, ElementIdentifier, PhysicalState, VirtualState, VIRTUAL_BUTTON_COUNT,
};
use crate::force_feedback::hub::{ForceFeedbackRegistrar, SharedDevice};

/// Smallest force feedback gain.
pub const FORCE_FEEDBACK_GAIN_MIN: u32 = 0;

/// Largest force feedback gain, meaning "unmodified".
pub const FORCE_FEEDBACK_GAIN_MAX: u32 = 10000;

pub const FORCE_FEEDBACK_GAIN_DEFAULT: u32 = FORCE_FEEDBACK_GAIN_MAX;

static CLOCK_ORIGIN: Lazy<Instant> = Lazy::new(Instant::now);

static NEXT_CONTROLLER_ID: AtomicU64 = AtomicU64::new(1);

/// Milliseconds on the process-wide monotonic clock used for event and effect timestamps.
pub fn timestamp_ms() -> u32 {
    CLOCK_ORIGIN.elapsed().as_millis() as u32
}

/// Rejected property value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PropertyError {
    #[error("deadzone {0} is outside 0..={max}", max = AXIS_DEADZONE_MAX)]
    Deadzone(u32),
    #[error("saturation {0} is outside 0..={max}", max = AXIS_SATURATION_MAX)]
    Saturation(u32),
    #[error("range minimum {min} must be less than range maximum {max}")]
    Range { min: i32, max: i32 },
    #[error("force feedback gain {0} is outside 0..={max}", max = FORCE_FEEDBACK_GAIN_MAX)]
    Gain(u32),
}

/// Receives a signal whenever a refresh changes the controller's state
///
/// Called with the controller lock held; implementations must not call back into the
/// controller.
pub trait StateChangeNotifier: Send {
    fn notify(&self);
}

impl<F> StateChangeNotifier for F
where
    F: Fn() + Send,
{
    fn notify(&self) {
        self()
    }
}

impl StateChangeNotifier for crossbeam::channel::Sender<()> {
    /// A full bounded channel already holds a pending signal, so a failed send is not an error.
    fn notify(&self) {
        let _ = self.try_send(());
    }
}

/// Result of reading the event buffer
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BufferedEvents {
    /// Oldest first
    pub events: Vec<StateChangeEvent>,
    /// Whether events were lost before this read
    pub overflowed: bool,
}

struct ControllerState {
    raw: VirtualState,
    processed: VirtualState,
    properties: [AxisProperties; Axis::COUNT],
    force_feedback_gain: u32,
    events: StateChangeEventBuffer,
    filtered_out: HashSet<ElementIdentifier>,
    notifier: Option<Box<dyn StateChangeNotifier>>,
    force_feedback: Option<SharedDevice>,
}

impl ControllerState {
    fn reapply(&mut self, capabilities: &Capabilities) {
        self.processed = apply_axis_properties(capabilities, &self.properties, self.raw);
    }

    fn append_event(&mut self, data: EventData, timestamp: u32) {
        if !self.filtered_out.contains(&data.element()) {
            self.events.append_event(data, timestamp);
        }
    }
}

/// DirectInput-facing view of one physical controller
pub struct VirtualController {
    id: u64,
    player: u8,
    mapper: Arc<Mapper>,
    registrar: Option<Arc<dyn ForceFeedbackRegistrar>>,
    state: Mutex<ControllerState>,
}

impl VirtualController {
    /// Create a controller for physical controller `player`, in the neutral state.
    pub fn new(player: u8, mapper: Arc<Mapper>) -> Self {
        let id = NEXT_CONTROLLER_ID.fetch_add(1, Ordering::Relaxed);
        let properties = [AxisProperties::default(); Axis::COUNT];
        let raw = VirtualState::neutral();
        let processed = apply_axis_properties(mapper.capabilities(), &properties, raw);

        debug!("Virtual controller {} for player {} uses mapper '{}'", id, player + 1, mapper.name());

        Self {
            id,
            player,
            mapper,
            registrar: None,
            state: Mutex::new(ControllerState {
                raw,
                processed,
                properties,
                force_feedback_gain: FORCE_FEEDBACK_GAIN_DEFAULT,
                events: StateChangeEventBuffer::new(),
                filtered_out: HashSet::new(),
                notifier: None,
                force_feedback: None,
            }),
        }
    }

    /// Allow this controller to register for force feedback through `registrar`.
    pub fn with_force_feedback(mut self, registrar: Arc<dyn ForceFeedbackRegistrar>) -> Self {
        self.registrar = Some(registrar);
        self
    }

    /// Process-unique identifier.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn player(&self) -> u8 {
        self.player
    }

    pub fn mapper(&self) -> &Arc<Mapper> {
        &self.mapper
    }

    pub fn capabilities(&self) -> &Capabilities {
        self.mapper.capabilities()
    }

    /// Latest state with axis properties applied.
    pub fn state(&self) -> VirtualState {
        self.state.lock().processed
    }

    /// Apply this controller's axis properties to `state`.
    ///
    /// Only axes the mapper reports are transformed; the rest pass through.
    pub fn apply_properties(&self, state: VirtualState) -> VirtualState {
        let guard = self.state.lock();
        apply_axis_properties(self.mapper.capabilities(), &guard.properties, state)
    }

    /// Map a physical snapshot and make it the current state.
    ///
    /// Returns whether the processed state changed.
    pub fn refresh_state(&self, physical: &PhysicalState) -> bool {
        let mapped = self.mapper.map_state_physical_to_virtual(physical, self.player as u32);
        self.refresh_virtual_state(mapped)
    }

    /// Same as [`refresh_state`](Self::refresh_state), forwarding keyboard and mouse output.
    pub fn refresh_state_with_sink(&self, physical: &PhysicalState, sink: &mut dyn ExternalInputSink) -> bool {
        let mapped = self
            .mapper
            .map_state_physical_to_virtual_with_sink(physical, self.player as u32, sink);
        self.refresh_virtual_state(mapped)
    }

    /// Make an already-mapped state the current raw state.
    ///
    /// Every element whose processed value changed produces one buffered event, unless the
    /// element is filtered out. The notifier fires once if anything changed.
    ///
    /// # Returns
    /// Whether the processed state changed
    pub fn refresh_virtual_state(&self, raw: VirtualState) -> bool {
        let mut state = self.state.lock();
        state.raw = raw;

        let processed = apply_axis_properties(self.mapper.capabilities(), &state.properties, raw);
        let previous = state.processed;
        if processed == previous {
            return false;
        }
        state.processed = processed;

        let timestamp = timestamp_ms();
        for axis in Axis::ALL {
            if processed[axis] != previous[axis] {
                state.append_event(EventData::Axis { axis, value: processed[axis] }, timestamp);
            }
        }
        for button in (0..VIRTUAL_BUTTON_COUNT).filter_map(Button::new) {
            if processed[button] != previous[button] {
                state.append_event(EventData::Button { button, pressed: processed[button] }, timestamp);
            }
        }
        if processed.pov != previous.pov {
            state.append_event(EventData::Pov { direction: processed.pov }, timestamp);
        }

        trace!("Virtual controller {} state changed", self.id);
        if let Some(notifier) = &state.notifier {
            notifier.notify();
        }
        true
    }

    // -----------------------------------------------------------------------------------------
    // Axis properties
    // -----------------------------------------------------------------------------------------

    pub fn axis_properties(&self, axis: Axis) -> AxisProperties {
        self.state.lock().properties[axis.index()]
    }

    pub fn axis_deadzone(&self, axis: Axis) -> u32 {
        self.axis_properties(axis).deadzone
    }

    pub fn axis_saturation(&self, axis: Axis) -> u32 {
        self.axis_properties(axis).saturation
    }

    pub fn axis_range(&self, axis: Axis) -> (i32, i32) {
        let properties = self.axis_properties(axis);
        (properties.range_min, properties.range_max)
    }

    pub fn axis_transforms_enabled(&self, axis: Axis) -> bool {
        self.axis_properties(axis).transforms_enabled
    }

    pub fn set_axis_deadzone(&self, axis: Axis, deadzone: u32) -> Result<(), PropertyError> {
        check_deadzone(deadzone)?;
        self.update_properties(Some(axis), |p| p.deadzone = deadzone);
        debug!("Controller {}: axis {} deadzone set to {}", self.id, axis, deadzone);
        Ok(())
    }

    pub fn set_all_axis_deadzone(&self, deadzone: u32) -> Result<(), PropertyError> {
        check_deadzone(deadzone)?;
        self.update_properties(None, |p| p.deadzone = deadzone);
        debug!("Controller {}: all axes deadzone set to {}", self.id, deadzone);
        Ok(())
    }

    pub fn set_axis_saturation(&self, axis: Axis, saturation: u32) -> Result<(), PropertyError> {
        check_saturation(saturation)?;
        self.update_properties(Some(axis), |p| p.saturation = saturation);
        debug!("Controller {}: axis {} saturation set to {}", self.id, axis, saturation);
        Ok(())
    }

    pub fn set_all_axis_saturation(&self, saturation: u32) -> Result<(), PropertyError> {
        check_saturation(saturation)?;
        self.update_properties(None, |p| p.saturation = saturation);
        debug!("Controller {}: all axes saturation set to {}", self.id, saturation);
        Ok(())
    }

    pub fn set_axis_range(&self, axis: Axis, min: i32, max: i32) -> Result<(), PropertyError> {
        check_range(min, max)?;
        self.update_properties(Some(axis), |p| {
            p.range_min = min;
            p.range_max = max;
        });
        debug!("Controller {}: axis {} range set to [{}, {}]", self.id, axis, min, max);
        Ok(())
    }

    pub fn set_all_axis_range(&self, min: i32, max: i32) -> Result<(), PropertyError> {
        check_range(min, max)?;
        self.update_properties(None, |p| {
            p.range_min = min;
            p.range_max = max;
        });
        debug!("Controller {}: all axes range set to [{}, {}]", self.id, min, max);
        Ok(())
    }

    pub fn set_axis_transforms_enabled(&self, axis: Axis, enabled: bool) {
        self.update_properties(Some(axis), |p| p.transforms_enabled = enabled);
    }

    pub fn set_all_axis_transforms_enabled(&self, enabled: bool) {
        self.update_properties(None, |p| p.transforms_enabled = enabled);
    }

    pub fn force_feedback_gain(&self) -> u32 {
        self.state.lock().force_feedback_gain
    }

    pub fn set_force_feedback_gain(&self, gain: u32) -> Result<(), PropertyError> {
        if gain > FORCE_FEEDBACK_GAIN_MAX {
            return Err(PropertyError::Gain(gain));
        }
        self.state.lock().force_feedback_gain = gain;
        debug!("Controller {}: force feedback gain set to {}", self.id, gain);
        Ok(())
    }

    /// Update one axis, or every axis for `None`, then re-process the latest raw state.
    fn update_properties(&self, axis: Option<Axis>, update: impl Fn(&mut AxisProperties)) {
        let mut state = self.state.lock();
        match axis {
            Some(axis) => update(&mut state.properties[axis.index()]),
            None => state.properties.iter_mut().for_each(update),
        }
        state.reapply(self.mapper.capabilities());
    }

    // -----------------------------------------------------------------------------------------
    // Buffered events
    // -----------------------------------------------------------------------------------------

    /// Event buffer capacity, 0 when buffering is disabled.
    pub fn event_buffer_capacity(&self) -> usize {
        self.state.lock().events.capacity()
    }

    pub fn set_event_buffer_capacity(&self, capacity: usize) {
        self.state.lock().events.set_capacity(capacity);
    }

    pub fn event_buffer_count(&self) -> usize {
        self.state.lock().events.count()
    }

    /// Buffered event at `index`, oldest first.
    pub fn event_buffer_event(&self, index: usize) -> Option<StateChangeEvent> {
        self.state.lock().events.get(index).copied()
    }

    pub fn is_event_buffer_overflowed(&self) -> bool {
        self.state.lock().events.is_overflowed()
    }

    pub fn pop_event_buffer_oldest_events(&self, count: usize) {
        self.state.lock().events.pop_oldest_events(count);
    }

    /// Read up to `max` of the oldest events, removing them unless `peek` is set.
    ///
    /// The overflow flag is captured before anything is removed.
    pub fn buffered_events(&self, max: usize, peek: bool) -> BufferedEvents {
        let mut state = self.state.lock();
        let overflowed = state.events.is_overflowed();
        let events: Vec<StateChangeEvent> = state.events.iter().take(max).copied().collect();
        if !peek {
            state.events.pop_oldest_events(events.len());
        }
        BufferedEvents { events, overflowed }
    }

    /// Resume buffering events for `element`.
    pub fn event_filter_add_element(&self, element: ElementIdentifier) {
        self.state.lock().filtered_out.remove(&element);
    }

    /// Stop buffering events for `element`. State snapshots still include it.
    pub fn event_filter_remove_element(&self, element: ElementIdentifier) {
        self.state.lock().filtered_out.insert(element);
    }

    pub fn is_element_in_event_filter(&self, element: ElementIdentifier) -> bool {
        !self.state.lock().filtered_out.contains(&element)
    }

    // -----------------------------------------------------------------------------------------
    // Notification
    // -----------------------------------------------------------------------------------------

    pub fn set_state_change_notifier(&self, notifier: impl StateChangeNotifier + 'static) {
        self.state.lock().notifier = Some(Box::new(notifier));
    }

    pub fn clear_state_change_notifier(&self) {
        self.state.lock().notifier = None;
    }

    // -----------------------------------------------------------------------------------------
    // Force feedback
    // -----------------------------------------------------------------------------------------

    /// Register with the physical controller's force feedback device.
    ///
    /// Succeeds repeatedly once registered. Fails when no registrar was supplied or the
    /// registrar rejects the player.
    pub fn force_feedback_register(&self) -> bool {
        let Some(registrar) = &self.registrar else {
            return false;
        };

        let mut state = self.state.lock();
        if state.force_feedback.is_some() {
            return true;
        }
        match registrar.register(self.player, self.id) {
            Some(device) => {
                state.force_feedback = Some(device);
                true
            }
            None => false,
        }
    }

    pub fn force_feedback_unregister(&self) {
        let Some(registrar) = &self.registrar else {
            return;
        };

        let mut state = self.state.lock();
        if state.force_feedback.take().is_some() {
            registrar.unregister(self.player, self.id);
        }
    }

    pub fn is_force_feedback_registered(&self) -> bool {
        self.state.lock().force_feedback.is_some()
    }

    /// Device effects should be sent to, while registered.
    pub fn force_feedback_device(&self) -> Option<SharedDevice> {
        self.state.lock().force_feedback.clone()
    }
}

impl Drop for VirtualController {
    fn drop(&mut self) {
        self.force_feedback_unregister();
    }
}

impl std::fmt::Debug for VirtualController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VirtualController")
            .field("id", &self.id)
            .field("player", &self.player)
            .field("mapper", &self.mapper.name())
            .finish_non_exhaustive()
    }
}

fn check_deadzone(deadzone: u32) -> Result<(), PropertyError> {
    if deadzone > AXIS_DEADZONE_MAX {
        return Err(PropertyError::Deadzone(deadzone));
    }
    Ok(())
}

fn check_saturation(saturation: u32) -> Result<(), PropertyError> {
    if saturation > AXIS_SATURATION_MAX {
        return Err(PropertyError::Saturation(saturation));
    }
    Ok(())
}

fn check_range(min: i32, max: i32) -> Result<(), PropertyError> {
    if min >= max {
        return Err(PropertyError::Range { min, max });
    }
    Ok(())
}

fn apply_axis_properties(
    capabilities: &Capabilities,
    properties: &[AxisProperties; Axis::COUNT],
    mut state: VirtualState,
) -> VirtualState {
    for axis in Axis::ALL {
        if capabilities.has_axis(axis) {
            state[axis] = properties[axis.index()].apply(state[axis]);
        }
    }
    state
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::element_mapper::ElementMapper;
    use crate::controller::mapper::{ElementMap, ElementSlot, ForceFeedbackActuatorMap};
    use crate::controller::types::{
        AxisDirection, PhysicalButton, PhysicalDeviceStatus, PhysicalStick, PovDirection,
        ANALOG_VALUE_MAX, ANALOG_VALUE_MIN,
    };
    use crate::force_feedback::ForceFeedbackHub;
    use std::sync::atomic::AtomicUsize;

    const TEST_AXIS: Axis = Axis::X;

    fn axis(axis: Axis) -> ElementMapper {
        ElementMapper::Axis {
            axis,
            direction: AxisDirection::Both,
        }
    }

    fn button(number: u32) -> ElementMapper {
        ElementMapper::Button(Button::from_number(number).unwrap())
    }

    fn single_axis_mapper() -> Arc<Mapper> {
        let elements = ElementMap::new().with(ElementSlot::StickLeftX, axis(TEST_AXIS));
        Arc::new(Mapper::new("SingleAxis", elements, ForceFeedbackActuatorMap::default()))
    }

    fn test_mapper() -> Arc<Mapper> {
        let elements = ElementMap::new()
            .with(ElementSlot::StickLeftX, axis(Axis::X))
            .with(ElementSlot::StickLeftY, axis(Axis::Y))
            .with(ElementSlot::StickRightX, axis(Axis::RotX))
            .with(ElementSlot::StickRightY, axis(Axis::RotY))
            .with(ElementSlot::DpadUp, ElementMapper::Pov(PovDirection::Up))
            .with(ElementSlot::DpadDown, ElementMapper::Pov(PovDirection::Down))
            .with(ElementSlot::DpadLeft, ElementMapper::Pov(PovDirection::Left))
            .with(ElementSlot::DpadRight, ElementMapper::Pov(PovDirection::Right))
            .with(ElementSlot::ButtonA, button(1))
            .with(ElementSlot::ButtonB, button(2))
            .with(ElementSlot::ButtonX, button(3))
            .with(ElementSlot::ButtonY, button(4));
        Arc::new(Mapper::new("Test", elements, ForceFeedbackActuatorMap::default()))
    }

    fn pressed(buttons: &[PhysicalButton]) -> PhysicalState {
        buttons
            .iter()
            .fold(PhysicalState::connected(), |state, button| state.with_button(*button))
    }

    fn replay_events(controller: &VirtualController) -> VirtualState {
        let mut state = VirtualState::neutral();
        for event in controller.buffered_events(usize::MAX, true).events {
            match event.data {
                EventData::Axis { axis, value } => state[axis] = value,
                EventData::Button { button, pressed } => state[button] = pressed,
                EventData::Pov { direction } => state.pov = direction,
            }
        }
        state
    }

    fn percent(pct: u32) -> u32 {
        pct * 100
    }

    fn raw_cutoff(extreme: i32, amount: u32, max: u32) -> i32 {
        (extreme as f64 * (amount as f64 / max as f64)) as i32
    }

    /// Walk the native input range and check all five output regions plus monotonicity.
    fn check_axis_properties(range_min: i32, range_max: i32, deadzone: u32, saturation: u32) {
        let controller = VirtualController::new(0, single_axis_mapper());
        controller.set_axis_deadzone(TEST_AXIS, deadzone).unwrap();
        controller.set_axis_range(TEST_AXIS, range_min, range_max).unwrap();
        controller.set_axis_saturation(TEST_AXIS, saturation).unwrap();
        assert_eq!(controller.axis_deadzone(TEST_AXIS), deadzone);
        assert_eq!(controller.axis_range(TEST_AXIS), (range_min, range_max));
        assert_eq!(controller.axis_saturation(TEST_AXIS), saturation);

        let range_neutral = ((range_min as i64 + range_max as i64) / 2) as f64;
        let (range_min_f, range_max_f) = (range_min as f64, range_max as f64);
        let saturation_negative = raw_cutoff(ANALOG_VALUE_MIN, saturation, AXIS_SATURATION_MAX);
        let deadzone_negative = raw_cutoff(ANALOG_VALUE_MIN, deadzone, AXIS_DEADZONE_MAX);
        let deadzone_positive = raw_cutoff(ANALOG_VALUE_MAX, deadzone, AXIS_DEADZONE_MAX);
        let saturation_positive = raw_cutoff(ANALOG_VALUE_MAX, saturation, AXIS_SATURATION_MAX);

        let mut inputs: Vec<i32> = (ANALOG_VALUE_MIN..=ANALOG_VALUE_MAX).step_by(17).collect();
        for cutoff in [saturation_negative, deadzone_negative, deadzone_positive, saturation_positive] {
            inputs.extend([cutoff - 1, cutoff, cutoff + 1]);
        }
        inputs.push(ANALOG_VALUE_MAX);
        inputs.retain(|v| (ANALOG_VALUE_MIN..=ANALOG_VALUE_MAX).contains(v));
        inputs.sort_unstable();
        inputs.dedup();

        let mut last_output = range_min as i64;
        for input in inputs {
            let mut state = VirtualState::neutral();
            state[TEST_AXIS] = input;
            let actual = controller.apply_properties(state)[TEST_AXIS];

            let expected = if input < saturation_negative {
                range_min_f
            } else if input < deadzone_negative {
                let step = (range_neutral - range_min_f) / (deadzone_negative - saturation_negative) as f64;
                range_min_f + (input - saturation_negative) as f64 * step
            } else if input <= deadzone_positive {
                range_neutral
            } else if input <= saturation_positive {
                let step = (range_max_f - range_neutral) / (saturation_positive - deadzone_positive) as f64;
                range_neutral + (input - deadzone_positive) as f64 * step
            } else {
                range_max_f
            };

            assert!(
                (actual as f64 - expected).abs() <= 1.0,
                "input {} gave {}, expected {} (range [{}, {}], deadzone {}, saturation {})",
                input, actual, expected, range_min, range_max, deadzone, saturation
            );
            assert!(actual as i64 >= last_output, "not monotonic at input {}", input);
            last_output = actual as i64;
        }
    }

    #[test]
    fn test_capabilities_come_from_mapper() {
        for mapper in [single_axis_mapper(), test_mapper()] {
            let controller = VirtualController::new(0, Arc::clone(&mapper));
            assert_eq!(controller.capabilities(), mapper.capabilities());
        }
    }

    #[test]
    fn test_initial_state_is_neutral() {
        let controller = VirtualController::new(0, test_mapper());
        assert_eq!(controller.state(), VirtualState::neutral());

        controller.set_all_axis_range(0, 1000).unwrap();
        let state = controller.state();
        assert_eq!(state[Axis::X], 500);
        assert_eq!(state[Axis::RotY], 500);
        // Axes the mapper does not report are left alone
        assert_eq!(state[Axis::Z], 0);
    }

    #[test]
    fn test_refresh_nominal() {
        let controller = VirtualController::new(0, test_mapper());
        let cases = [
            (PhysicalButton::A, 1),
            (PhysicalButton::B, 2),
            (PhysicalButton::X, 3),
            (PhysicalButton::Y, 4),
        ];

        for (physical_button, number) in cases {
            assert!(controller.refresh_state(&pressed(&[physical_button])));
            let mut expected = VirtualState::neutral();
            expected[Button::from_number(number).unwrap()] = true;
            assert_eq!(controller.state(), expected);
        }
    }

    #[test]
    fn test_refresh_same_state_reports_no_change() {
        let controller = VirtualController::new(0, test_mapper());
        controller.set_event_buffer_capacity(64);
        let physical = pressed(&[PhysicalButton::A, PhysicalButton::X]);

        assert!(controller.refresh_state(&physical));
        let count = controller.event_buffer_count();
        for _ in 0..5 {
            assert!(!controller.refresh_state(&physical));
        }
        assert_eq!(controller.event_buffer_count(), count);
    }

    #[test]
    fn test_physical_error_means_neutral() {
        let controller = VirtualController::new(0, test_mapper());
        for status in [PhysicalDeviceStatus::Error, PhysicalDeviceStatus::NotConnected] {
            let mut physical = pressed(&[PhysicalButton::A, PhysicalButton::Y])
                .with_stick(PhysicalStick::LeftX, 12345);
            controller.refresh_state(&physical);
            assert_ne!(controller.state(), VirtualState::neutral());

            physical.status = status;
            controller.refresh_state(&physical);
            assert_eq!(controller.state(), VirtualState::neutral());
        }
    }

    #[test]
    fn test_axis_properties_nominal() {
        check_axis_properties(ANALOG_VALUE_MIN, ANALOG_VALUE_MAX, 0, AXIS_SATURATION_MAX);
    }

    #[test]
    fn test_axis_properties_deadzone_sweep() {
        for pct in (0..=100).step_by(25) {
            check_axis_properties(ANALOG_VALUE_MIN, ANALOG_VALUE_MAX, percent(pct), AXIS_SATURATION_MAX);
        }
    }

    #[test]
    fn test_axis_properties_saturation_sweep() {
        for pct in (0..=100).step_by(25) {
            check_axis_properties(ANALOG_VALUE_MIN, ANALOG_VALUE_MAX, 0, percent(pct));
        }
    }

    #[test]
    fn test_axis_properties_deadzone_and_saturation() {
        for (deadzone, saturation) in [(10, 90), (25, 75), (40, 50), (50, 100)] {
            check_axis_properties(ANALOG_VALUE_MIN, ANALOG_VALUE_MAX, percent(deadzone), percent(saturation));
        }
    }

    #[test]
    fn test_axis_properties_ranges() {
        let ranges = [
            (-1_000_000, 1_000_000),
            (1_000, 1_000_000),
            (-1_000_000, -1_000),
            (-100, 100),
            (0, 50),
            (-50, -10),
        ];
        for (min, max) in ranges {
            check_axis_properties(min, max, 0, AXIS_SATURATION_MAX);
            check_axis_properties(min, max, percent(20), percent(80));
        }
    }

    #[test]
    fn test_axis_transforms_disabled() {
        let controller = VirtualController::new(0, single_axis_mapper());
        controller.set_axis_transforms_enabled(TEST_AXIS, false);
        assert!(!controller.axis_transforms_enabled(TEST_AXIS));

        controller.set_axis_deadzone(TEST_AXIS, percent(50)).unwrap();
        controller.set_axis_range(TEST_AXIS, -100, 100).unwrap();
        controller.set_axis_saturation(TEST_AXIS, percent(75)).unwrap();

        for input in [ANALOG_VALUE_MIN, -1000, 0, 1000, ANALOG_VALUE_MAX] {
            let mut state = VirtualState::neutral();
            state[TEST_AXIS] = input;
            assert_eq!(controller.apply_properties(state)[TEST_AXIS], input);
        }
    }

    #[test]
    fn test_set_deadzone_and_saturation_validation() {
        let controller = VirtualController::new(0, test_mapper());

        controller.set_axis_deadzone(Axis::RotX, 1234).unwrap();
        assert_eq!(controller.axis_deadzone(Axis::RotX), 1234);
        assert_eq!(controller.axis_deadzone(Axis::X), 0);

        assert_eq!(
            controller.set_axis_deadzone(Axis::RotX, AXIS_DEADZONE_MAX + 1),
            Err(PropertyError::Deadzone(AXIS_DEADZONE_MAX + 1))
        );
        assert_eq!(controller.axis_deadzone(Axis::RotX), 1234);
        assert!(controller.set_all_axis_deadzone(AXIS_DEADZONE_MAX + 1).is_err());
        assert_eq!(controller.axis_deadzone(Axis::X), 0);

        controller.set_all_axis_saturation(5000).unwrap();
        for axis in Axis::ALL {
            assert_eq!(controller.axis_saturation(axis), 5000);
        }
        assert_eq!(
            controller.set_axis_saturation(Axis::Y, AXIS_SATURATION_MAX + 1),
            Err(PropertyError::Saturation(AXIS_SATURATION_MAX + 1))
        );
        assert_eq!(controller.axis_saturation(Axis::Y), 5000);
    }

    #[test]
    fn test_set_range_validation() {
        let controller = VirtualController::new(0, test_mapper());

        controller.set_axis_range(Axis::Y, -500, 500).unwrap();
        assert_eq!(controller.axis_range(Axis::Y), (-500, 500));

        for (min, max) in [(100, 100), (100, -100)] {
            assert_eq!(controller.set_axis_range(Axis::Y, min, max), Err(PropertyError::Range { min, max }));
            assert_eq!(controller.set_all_axis_range(min, max), Err(PropertyError::Range { min, max }));
        }
        assert_eq!(controller.axis_range(Axis::Y), (-500, 500));
        assert_eq!(controller.axis_range(Axis::X), (ANALOG_VALUE_MIN, ANALOG_VALUE_MAX));

        controller.set_all_axis_range(0, 10).unwrap();
        assert_eq!(controller.axis_range(Axis::Y), (0, 10));
    }

    #[test]
    fn test_set_force_feedback_gain() {
        let controller = VirtualController::new(0, test_mapper());
        assert_eq!(controller.force_feedback_gain(), FORCE_FEEDBACK_GAIN_DEFAULT);

        controller.set_force_feedback_gain(2500).unwrap();
        assert_eq!(controller.force_feedback_gain(), 2500);
        assert_eq!(
            controller.set_force_feedback_gain(FORCE_FEEDBACK_GAIN_MAX + 1),
            Err(PropertyError::Gain(FORCE_FEEDBACK_GAIN_MAX + 1))
        );
        assert_eq!(controller.force_feedback_gain(), 2500);
    }

    #[test]
    fn test_property_change_applies_to_existing_state() {
        let controller = VirtualController::new(0, test_mapper());
        controller.refresh_state(&PhysicalState::connected());

        controller.set_all_axis_range(0, 32768).unwrap();
        let before = controller.state();
        for axis in [Axis::X, Axis::Y, Axis::RotX, Axis::RotY] {
            assert_eq!(before[axis], 16384);
        }
        assert_eq!(before[Axis::Z], 0);
        assert_eq!(before[Axis::RotZ], 0);

        controller.set_all_axis_range(500, 1000).unwrap();
        let after = controller.state();
        for axis in [Axis::X, Axis::Y, Axis::RotX, Axis::RotY] {
            assert_eq!(after[axis], 750);
        }
        assert_eq!(after[Axis::Z], 0);
    }

    #[test]
    fn test_property_change_emits_no_events() {
        let controller = VirtualController::new(0, test_mapper());
        controller.set_event_buffer_capacity(64);
        controller.refresh_state(&PhysicalState::connected().with_stick(PhysicalStick::LeftX, 20000));
        let count = controller.event_buffer_count();

        controller.set_all_axis_deadzone(percent(80)).unwrap();
        assert_eq!(controller.state()[Axis::X], 0);
        assert_eq!(controller.event_buffer_count(), count);
    }

    #[test]
    fn test_axis_event_suppressed_when_output_unchanged() {
        let controller = VirtualController::new(0, single_axis_mapper());
        controller.set_event_buffer_capacity(64);
        controller.set_axis_deadzone(TEST_AXIS, percent(50)).unwrap();

        // Raw value moves but stays inside the deadzone
        assert!(!controller.refresh_state(&PhysicalState::connected().with_stick(PhysicalStick::LeftX, 1000)));
        assert!(!controller.refresh_state(&PhysicalState::connected().with_stick(PhysicalStick::LeftX, -3000)));
        assert_eq!(controller.event_buffer_count(), 0);

        assert!(controller.refresh_state(&PhysicalState::connected().with_stick(PhysicalStick::LeftX, 30000)));
        assert_eq!(controller.event_buffer_count(), 1);
    }

    #[test]
    fn test_event_buffer_default_disabled() {
        let controller = VirtualController::new(0, test_mapper());
        assert_eq!(controller.event_buffer_capacity(), 0);

        controller.refresh_state(&pressed(&[PhysicalButton::A]));
        assert_eq!(controller.event_buffer_count(), 0);

        controller.set_event_buffer_capacity(64);
        assert_eq!(controller.event_buffer_capacity(), 64);
    }

    #[test]
    fn test_event_buffer_neutral_updates() {
        let controller = VirtualController::new(0, test_mapper());
        controller.set_event_buffer_capacity(64);
        for _ in 0..3 {
            controller.refresh_state(&PhysicalState::connected());
        }
        assert_eq!(controller.event_buffer_count(), 0);
    }

    #[test]
    fn test_event_buffer_multiple_updates() {
        let states = [
            pressed(&[PhysicalButton::A])
                .with_stick(PhysicalStick::LeftX, 1111)
                .with_stick(PhysicalStick::RightX, 2222),
            pressed(&[PhysicalButton::A])
                .with_stick(PhysicalStick::LeftX, 3333)
                .with_stick(PhysicalStick::RightX, 4444),
            pressed(&[PhysicalButton::A, PhysicalButton::Y, PhysicalButton::DpadUp])
                .with_stick(PhysicalStick::LeftX, -5555)
                .with_stick(PhysicalStick::RightX, -6666),
            pressed(&[PhysicalButton::DpadLeft]),
        ];

        for count in 1..=states.len() {
            let controller = VirtualController::new(0, test_mapper());
            controller.set_event_buffer_capacity(64);

            let mut last_count = controller.event_buffer_count();
            for physical in &states[..count] {
                controller.refresh_state(physical);
                assert!(controller.event_buffer_count() > last_count);
                last_count = controller.event_buffer_count();
            }

            let snapshot = controller.state();
            assert_eq!(replay_events(&controller), snapshot);
        }

        let controller = VirtualController::new(0, test_mapper());
        controller.set_event_buffer_capacity(64);
        controller.refresh_state(&states[2]);
        let state = controller.state();
        assert_eq!(state[Axis::X], -5555);
        assert_eq!(state[Axis::RotX], -6666);
        assert_eq!(state.pov.angle(), Some(0));
    }

    #[test]
    fn test_event_buffer_with_filter() {
        let states = [
            pressed(&[PhysicalButton::A])
                .with_stick(PhysicalStick::LeftX, 1111)
                .with_stick(PhysicalStick::LeftY, 2222),
            pressed(&[PhysicalButton::A])
                .with_stick(PhysicalStick::LeftX, 3333)
                .with_stick(PhysicalStick::LeftY, 4444),
            pressed(&[PhysicalButton::A, PhysicalButton::Y, PhysicalButton::DpadUp])
                .with_stick(PhysicalStick::LeftX, -5555)
                .with_stick(PhysicalStick::LeftY, -6666),
            pressed(&[PhysicalButton::DpadLeft]),
        ];

        let controller = VirtualController::new(0, test_mapper());
        controller.set_event_buffer_capacity(64);
        controller.event_filter_remove_element(ElementIdentifier::Axis(Axis::X));
        controller.event_filter_remove_element(ElementIdentifier::Axis(Axis::Y));
        assert!(!controller.is_element_in_event_filter(ElementIdentifier::Axis(Axis::X)));
        assert!(controller.is_element_in_event_filter(ElementIdentifier::Pov));

        let mut last_count = 0;
        for physical in &states {
            // Every state changes the snapshot even when only filtered axes moved
            assert!(controller.refresh_state(physical));
            assert!(controller.event_buffer_count() >= last_count);
            last_count = controller.event_buffer_count();
        }

        let replayed = replay_events(&controller);
        assert_eq!(replayed[Axis::X], 0);
        assert_eq!(replayed[Axis::Y], 0);
        assert_eq!(replayed.buttons, controller.state().buttons);
        assert_eq!(replayed.pov, controller.state().pov);

        controller.event_filter_add_element(ElementIdentifier::Axis(Axis::X));
        assert!(controller.is_element_in_event_filter(ElementIdentifier::Axis(Axis::X)));
    }

    #[test]
    fn test_buffered_events_peek_and_consume() {
        let controller = VirtualController::new(0, test_mapper());
        controller.set_event_buffer_capacity(3);

        controller.refresh_state(&pressed(&[PhysicalButton::A]));
        controller.refresh_state(&pressed(&[PhysicalButton::A, PhysicalButton::B]));
        controller.refresh_state(&pressed(&[PhysicalButton::A, PhysicalButton::B, PhysicalButton::X]));
        assert_eq!(controller.event_buffer_count(), 2);
        assert!(controller.is_event_buffer_overflowed());

        let peeked = controller.buffered_events(10, true);
        assert_eq!(peeked.events.len(), 2);
        assert!(peeked.overflowed);
        assert_eq!(controller.event_buffer_count(), 2);
        assert!(peeked.events[0].sequence < peeked.events[1].sequence);

        let taken = controller.buffered_events(1, false);
        assert_eq!(taken.events, peeked.events[..1].to_vec());
        assert!(taken.overflowed);
        assert_eq!(controller.event_buffer_count(), 1);
        assert!(!controller.is_event_buffer_overflowed());
        assert_eq!(controller.event_buffer_event(0), Some(peeked.events[1]));

        controller.pop_event_buffer_oldest_events(1);
        assert_eq!(controller.event_buffer_count(), 0);
        assert_eq!(controller.event_buffer_event(0), None);
    }

    #[test]
    fn test_notification_on_every_change() {
        let controller = VirtualController::new(2, test_mapper());
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        controller.set_state_change_notifier(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let states = [
            pressed(&[PhysicalButton::A]),
            pressed(&[PhysicalButton::A, PhysicalButton::B]),
            pressed(&[PhysicalButton::A, PhysicalButton::B, PhysicalButton::DpadLeft]),
            pressed(&[PhysicalButton::B, PhysicalButton::DpadLeft]),
            pressed(&[PhysicalButton::B]),
            PhysicalState::connected(),
        ];
        for (i, physical) in states.iter().enumerate() {
            controller.refresh_state(physical);
            assert_eq!(count.load(Ordering::SeqCst), i + 1);
        }

        controller.clear_state_change_notifier();
        controller.refresh_state(&states[0]);
        assert_eq!(count.load(Ordering::SeqCst), states.len());
    }

    #[test]
    fn test_notification_skips_ineffective_changes() {
        let controller = VirtualController::new(3, test_mapper());
        let (sender, receiver) = crossbeam::channel::bounded(1);
        controller.set_state_change_notifier(sender);

        // Shoulder buttons are unmapped, so every other state changes nothing virtual
        let states = [
            pressed(&[PhysicalButton::A]),
            pressed(&[PhysicalButton::A, PhysicalButton::LB]),
            pressed(&[PhysicalButton::A, PhysicalButton::LB, PhysicalButton::DpadUp]),
            pressed(&[PhysicalButton::A, PhysicalButton::LB, PhysicalButton::DpadUp, PhysicalButton::RB]),
            pressed(&[PhysicalButton::A, PhysicalButton::LB, PhysicalButton::RB]),
            pressed(&[PhysicalButton::A, PhysicalButton::LB]),
            pressed(&[PhysicalButton::LB]),
            PhysicalState::connected().with_button(PhysicalButton::LB).with_button(PhysicalButton::RB),
        ];
        for pair in states.chunks(2) {
            controller.refresh_state(&pair[0]);
            assert!(receiver.try_recv().is_ok());

            controller.refresh_state(&pair[1]);
            assert!(receiver.try_recv().is_err());
        }
    }

    #[test]
    fn test_force_feedback_requires_registrar() {
        let controller = VirtualController::new(1, test_mapper());
        assert!(!controller.force_feedback_register());
        assert!(!controller.is_force_feedback_registered());
        assert!(controller.force_feedback_device().is_none());
    }

    #[test]
    fn test_force_feedback_register_and_unregister() {
        let hub = Arc::new(ForceFeedbackHub::new());
        let controller = VirtualController::new(1, test_mapper()).with_force_feedback(hub.clone());

        assert!(!controller.is_force_feedback_registered());
        assert!(!hub.is_registered(1, controller.id()));

        assert!(controller.force_feedback_register());
        let device = controller.force_feedback_device().unwrap();
        assert!(Arc::ptr_eq(&device, &hub.device(1).unwrap()));
        assert!(hub.is_registered(1, controller.id()));

        controller.force_feedback_unregister();
        assert!(!controller.is_force_feedback_registered());
        assert!(controller.force_feedback_device().is_none());
        assert!(!hub.is_registered(1, controller.id()));
    }

    #[test]
    fn test_force_feedback_multiple_and_idempotent() {
        let hub = Arc::new(ForceFeedbackHub::new());
        let first = VirtualController::new(1, test_mapper()).with_force_feedback(hub.clone());
        let second = VirtualController::new(1, test_mapper()).with_force_feedback(hub.clone());

        for _ in 0..100 {
            assert!(first.force_feedback_register());
        }
        assert!(second.force_feedback_register());
        assert!(first.is_force_feedback_registered());
        assert!(second.is_force_feedback_registered());
        assert_eq!(hub.registration_count(1), 2);
    }

    #[test]
    fn test_force_feedback_unregisters_on_drop() {
        let hub = Arc::new(ForceFeedbackHub::new());
        let controller = VirtualController::new(1, test_mapper()).with_force_feedback(hub.clone());
        let id = controller.id();

        assert!(controller.force_feedback_register());
        assert!(hub.is_registered(1, id));

        drop(controller);
        assert!(!hub.is_registered(1, id));
    }
}
