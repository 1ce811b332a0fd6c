//! XInput backend
//!
//! Polls controllers and drives their rumble motors through the XInput DLL. Impulse trigger
//! output has no XInput counterpart and is dropped.

use rusty_xinput::{XInputHandle, XInputUsageError};
use tracing::{debug, trace};

use super::{validate_player, ActuatorSink, PhysicalError, StateSource};
use crate::controller::mapper::PhysicalActuatorComponents;
use crate::controller::types::{PhysicalDeviceStatus, PhysicalState};

/// Loaded XInput library
pub struct XInputBackend {
    handle: XInputHandle,
}

impl XInputBackend {
    /// Load the system XInput DLL.
    pub fn load() -> Result<Self, PhysicalError> {
        let handle = XInputHandle::load_default()
            .map_err(|e| PhysicalError::Backend(format!("failed to load XInput: {:?}", e)))?;
        debug!("XInput library loaded");
        Ok(Self { handle })
    }
}

impl StateSource for XInputBackend {
    fn read_state(&self, player: u8) -> PhysicalState {
        match self.handle.get_state(player as u32) {
            Ok(state) => PhysicalState {
                status: PhysicalDeviceStatus::Ok,
                buttons: state.raw.Gamepad.wButtons,
                sticks: [
                    state.raw.Gamepad.sThumbLX,
                    state.raw.Gamepad.sThumbLY,
                    state.raw.Gamepad.sThumbRX,
                    state.raw.Gamepad.sThumbRY,
                ],
                triggers: [state.left_trigger(), state.right_trigger()],
            },
            Err(XInputUsageError::DeviceNotConnected) => PhysicalState {
                status: PhysicalDeviceStatus::NotConnected,
                ..Default::default()
            },
            Err(e) => {
                trace!("XInput read for player {} failed: {:?}", player, e);
                PhysicalState {
                    status: PhysicalDeviceStatus::Error,
                    ..Default::default()
                }
            }
        }
    }
}

impl ActuatorSink for XInputBackend {
    fn write_actuators(
        &mut self,
        player: u8,
        components: PhysicalActuatorComponents,
    ) -> Result<(), PhysicalError> {
        let player = validate_player(player)?;
        self.handle
            .set_state(player as u32, components.left_motor, components.right_motor)
            .map_err(|e| match e {
                XInputUsageError::DeviceNotConnected => PhysicalError::NotConnected(player),
                other => PhysicalError::Backend(format!("{:?}", other)),
            })
    }
}
