//! Virtual controller core
//!
//! Element mappers turn single physical inputs into virtual contributions, a [`Mapper`] combines
//! one mapper per physical slot, and a [`VirtualController`] applies per-axis properties and
//! records state changes for its reader.

pub mod element_mapper;
pub mod event_buffer;
pub mod mapper;
pub mod math;
pub mod registry;
pub mod types;
pub mod virtual_controller;

pub use element_mapper::{ElementMapper, ExternalInputSink, NullSink};
pub use event_buffer::{EventData, StateChangeEvent, StateChangeEventBuffer};
pub use mapper::{
    ElementMap, ElementSlot, ForceFeedbackActuator, ForceFeedbackActuatorMap, Mapper, PhysicalActuator,
    PhysicalActuatorComponents,
};
pub use math::AxisProperties;
pub use registry::{MapperBlueprint, MapperRegistry, RegistryError};
pub use types::{
    Axis, AxisDirection, Button, Capabilities, ElementIdentifier, PhysicalState, PovDirection, VirtualState,
};
pub use virtual_controller::{PropertyError, StateChangeNotifier, VirtualController};
