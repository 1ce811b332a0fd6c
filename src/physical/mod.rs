//! Physical controller I/O seams
//!
//! The core never talks to hardware directly. State comes in through a [`StateSource`] and force
//! feedback output leaves through an [`ActuatorSink`]; the XInput backend implements both on
//! Windows.

#[cfg(windows)]
pub mod xinput;

use thiserror::Error;

use crate::controller::mapper::PhysicalActuatorComponents;
use crate::controller::types::PhysicalState;

/// Number of physical controllers XInput can address.
pub const PHYSICAL_CONTROLLER_COUNT: u8 = 4;

/// Physical controller I/O failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PhysicalError {
    #[error("player index {0} is outside 0..{max}", max = PHYSICAL_CONTROLLER_COUNT)]
    InvalidPlayer(u8),
    #[error("physical controller {0} is not connected")]
    NotConnected(u8),
    #[error("physical controller backend error: {0}")]
    Backend(String),
}

/// Produces physical controller snapshots
pub trait StateSource {
    /// Current state of controller `player`.
    ///
    /// Read failures are reported through [`PhysicalState::status`], never as an error, so that
    /// callers always have a snapshot to map.
    fn read_state(&self, player: u8) -> PhysicalState;
}

/// Consumes physical force feedback output
pub trait ActuatorSink {
    /// Push motor values to controller `player`.
    fn write_actuators(
        &mut self,
        player: u8,
        components: PhysicalActuatorComponents,
    ) -> Result<(), PhysicalError>;
}

/// Check that `player` addresses a physical controller.
pub fn validate_player(player: u8) -> Result<u8, PhysicalError> {
    if player < PHYSICAL_CONTROLLER_COUNT {
        Ok(player)
    } else {
        Err(PhysicalError::InvalidPlayer(player))
    }
}
