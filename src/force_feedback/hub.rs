//! Force feedback hub
//!
//! Owns one effect [`Device`] per physical controller and tracks which virtual controllers are
//! registered to send effects to it. Several virtual controllers may share one physical
//! controller, and therefore one device.

use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, trace};

use super::{Device, EffectTimeMs};
use crate::controller::mapper::{Mapper, PhysicalActuatorComponents};
use crate::physical::{validate_player, ActuatorSink, PhysicalError};

/// Shared handle to a physical controller's effect device
pub type SharedDevice = Arc<Mutex<Device>>;

/// Registration service used by virtual controllers
pub trait ForceFeedbackRegistrar: Send + Sync {
    /// Register `controller` with physical controller `player`.
    ///
    /// Registering an already-registered controller succeeds and returns the same device.
    /// Returns `None` if `player` addresses no physical controller.
    fn register(&self, player: u8, controller: u64) -> Option<SharedDevice>;

    /// Remove a registration. Unknown registrations are ignored.
    fn unregister(&self, player: u8, controller: u64);

    fn is_registered(&self, player: u8, controller: u64) -> bool;
}

/// In-process [`ForceFeedbackRegistrar`] that also evaluates and pushes actuator output
#[derive(Debug, Default)]
pub struct ForceFeedbackHub {
    devices: DashMap<u8, SharedDevice>,
    registrations: DashMap<u8, HashSet<u64>>,
    last_output: DashMap<u8, PhysicalActuatorComponents>,
}

impl ForceFeedbackHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Device for `player`, if one was created by a registration.
    pub fn device(&self, player: u8) -> Option<SharedDevice> {
        self.devices.get(&player).map(|device| Arc::clone(device.value()))
    }

    /// Number of virtual controllers registered with `player`.
    pub fn registration_count(&self, player: u8) -> usize {
        self.registrations.get(&player).map(|set| set.len()).unwrap_or(0)
    }

    /// Evaluate playing effects for `player` and push the result to `sink`.
    ///
    /// Output is only written when it differs from the last value pushed for that player. With
    /// no registered virtual controllers the output is idle.
    ///
    /// # Arguments
    /// * `player` - Physical controller index
    /// * `mapper` - Mapper whose actuator map translates axis magnitudes to motors
    /// * `timestamp` - Current time in milliseconds on the clock used to start effects
    /// * `gain` - Device-wide gain, 0..=10000
    /// * `sink` - Destination for the physical output
    ///
    /// # Returns
    /// The actuator values for this tick
    pub fn drive(
        &self,
        player: u8,
        mapper: &Mapper,
        timestamp: EffectTimeMs,
        gain: u32,
        sink: &mut dyn ActuatorSink,
    ) -> Result<PhysicalActuatorComponents, PhysicalError> {
        let player = validate_player(player)?;

        let components = match self.device(player) {
            Some(device) if self.registration_count(player) > 0 => {
                let magnitudes = device.lock().compute_magnitudes(timestamp);
                mapper.map_force_feedback_virtual_to_physical(&magnitudes, gain)
            }
            _ => PhysicalActuatorComponents::default(),
        };

        let changed = self
            .last_output
            .get(&player)
            .map(|last| *last != components)
            .unwrap_or(!components.is_idle());
        if changed {
            trace!("Force feedback output for player {}: {:?}", player, components);
            sink.write_actuators(player, components)?;
            self.last_output.insert(player, components);
        }

        Ok(components)
    }
}

impl ForceFeedbackRegistrar for ForceFeedbackHub {
    fn register(&self, player: u8, controller: u64) -> Option<SharedDevice> {
        let player = validate_player(player).ok()?;

        let device = Arc::clone(
            self.devices
                .entry(player)
                .or_insert_with(|| Arc::new(Mutex::new(Device::new())))
                .value(),
        );
        if self.registrations.entry(player).or_default().insert(controller) {
            info!("Virtual controller {} registered for force feedback on player {}", controller, player + 1);
        }
        Some(device)
    }

    fn unregister(&self, player: u8, controller: u64) {
        let now_empty = match self.registrations.get_mut(&player) {
            Some(mut set) => set.remove(&controller) && set.is_empty(),
            None => false,
        };
        if !now_empty {
            return;
        }

        debug!("Last force feedback registration on player {} removed, stopping effects", player + 1);
        if let Some(device) = self.device(player) {
            device.lock().stop_all_effects();
        }
    }

    fn is_registered(&self, player: u8, controller: u64) -> bool {
        self.registrations
            .get(&player)
            .map(|set| set.contains(&controller))
            .unwrap_or(false)
    }
}
