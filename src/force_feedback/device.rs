//! Per-controller force feedback effect storage and playback

use std::collections::BTreeMap;

use tracing::{debug, trace};

use super::{Effect, EffectError, EffectTimeMs, MagnitudeVector, EFFECT_MAGNITUDE_MAX, EFFECT_MAGNITUDE_MIN};

/// Playback bookkeeping for one started effect
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Playback {
    started_at: EffectTimeMs,
}

/// Effects stored for one physical controller
///
/// Timestamps are milliseconds on any monotonic clock shared by the caller; effect time is the
/// difference between the evaluation timestamp and the start timestamp.
#[derive(Debug, Default)]
pub struct Device {
    effects: BTreeMap<u32, Effect>,
    playing: BTreeMap<u32, Playback>,
}

impl Device {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an effect, replacing any stored effect with the same id.
    ///
    /// A playing effect keeps playing with its new parameters.
    pub fn add_or_update_effect(&mut self, effect: Effect) {
        debug!("Storing force feedback effect {}", effect.id());
        self.effects.insert(effect.id(), effect);
    }

    /// Remove an effect, stopping it first. Returns whether it was stored.
    pub fn remove_effect(&mut self, id: u32) -> bool {
        self.playing.remove(&id);
        self.effects.remove(&id).is_some()
    }

    pub fn effect(&self, id: u32) -> Option<&Effect> {
        self.effects.get(&id)
    }

    pub fn effect_count(&self) -> usize {
        self.effects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    /// Start a stored effect from the beginning.
    pub fn start_effect(&mut self, id: u32, timestamp: EffectTimeMs) -> Result<(), EffectError> {
        let effect = self.effects.get(&id).ok_or(EffectError::UnknownEffect(id))?;
        effect.check_ready()?;

        debug!("Starting force feedback effect {} at {}", id, timestamp);
        self.playing.insert(id, Playback { started_at: timestamp });
        Ok(())
    }

    /// Stop an effect. Returns whether it was playing.
    pub fn stop_effect(&mut self, id: u32) -> bool {
        self.playing.remove(&id).is_some()
    }

    pub fn stop_all_effects(&mut self) {
        self.playing.clear();
    }

    pub fn is_effect_playing(&self, id: u32) -> bool {
        self.playing.contains_key(&id)
    }

    pub fn playing_count(&self) -> usize {
        self.playing.len()
    }

    /// Sum of every playing effect's per-axis magnitude at `timestamp`.
    ///
    /// Effects that have run their full duration stop playing. Each component is clamped to the
    /// magnitude range.
    pub fn compute_magnitudes(&mut self, timestamp: EffectTimeMs) -> MagnitudeVector {
        let mut total = MagnitudeVector::default();
        let mut finished = Vec::new();

        for (id, playback) in &self.playing {
            let Some(effect) = self.effects.get(id) else {
                finished.push(*id);
                continue;
            };

            let time = timestamp.wrapping_sub(playback.started_at);
            if effect.is_finished_at(time) {
                finished.push(*id);
                continue;
            }

            let components = effect.compute_magnitude_components(time);
            for (sum, value) in total.iter_mut().zip(components) {
                *sum += value;
            }
        }

        for id in finished {
            trace!("Force feedback effect {} finished", id);
            self.playing.remove(&id);
        }

        for value in total.iter_mut() {
            *value = value.clamp(EFFECT_MAGNITUDE_MIN, EFFECT_MAGNITUDE_MAX);
        }
        total
    }
}
