//! Roof orientations bound to MPPT channels, with balanced-string correction.

use indexmap::IndexMap;
use pv_model::{Inverter, MpptChannel, Orientation, PvModule};
use serde::Serialize;
use tracing::{debug, info};

use crate::compatibility::{CompatibilityResolver, MpptCapacity};
use crate::config::AllocationConfig;
use crate::error::AllocationError;

/// Emitted when a requested module count was rounded down to balance the
/// parallel strings of an MPPT input.
///
/// `strings_per_mppt` is the number of parallel strings the input takes for
/// this module, after the current limit. `modules_per_string` never exceeds
/// the voltage limit; while the orientation is unbound the fallback ceiling
/// applies and the wiring it describes is indicative only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BalancingCorrection {
    pub orientation_name: String,
    pub requested: u32,
    pub corrected: u32,
    pub modules_per_string: u32,
    pub strings_per_mppt: u32,
}

/// Emitted when a requested module count exceeded the available capacity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CapacityClamp {
    pub orientation_name: String,
    pub requested: u32,
    pub ceiling: u32,
}

/// Result of a module-count change.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CountUpdate {
    pub orientation: Orientation,
    pub clamp: Option<CapacityClamp>,
    pub correction: Option<BalancingCorrection>,
}

impl CountUpdate {
    pub fn corrected(&self) -> u32 {
        self.orientation.module_count
    }
}

/// Owns the orientation list for one module/inverter selection.
#[derive(Debug, Clone)]
pub struct OrientationAllocator {
    module: PvModule,
    capacity: MpptCapacity,
    units: u32,
    mppt_count: u32,
    fallback_max_modules: u32,
    orientations: IndexMap<String, Orientation>,
    bindings: IndexMap<MpptChannel, String>,
}

impl OrientationAllocator {
    /// Resolves the MPPT capacity once for `quantity` units of `inverter`.
    pub fn new(
        resolver: &CompatibilityResolver,
        module: &PvModule,
        inverter: &Inverter,
        quantity: u32,
        config: &AllocationConfig,
    ) -> Result<Self, AllocationError> {
        let capacity = resolver.capacity(module, inverter)?;
        Ok(Self {
            module: module.clone(),
            capacity,
            units: quantity,
            mppt_count: inverter.mppt_count,
            fallback_max_modules: config.fallback_max_modules,
            orientations: IndexMap::new(),
            bindings: IndexMap::new(),
        })
    }

    pub fn capacity(&self) -> &MpptCapacity {
        &self.capacity
    }

    pub fn module(&self) -> &PvModule {
        &self.module
    }

    /// Sum of the MPPT capacity of every selected unit.
    pub fn aggregate_capacity(&self) -> u32 {
        self.units * self.mppt_count * self.capacity.max_modules_per_mppt
    }

    pub fn total_modules(&self) -> u32 {
        self.orientations.values().map(|o| o.module_count).sum()
    }

    pub fn peak_power_kwp(&self) -> f64 {
        f64::from(self.total_modules()) * self.module.power_w / 1000.0
    }

    /// True when the array exceeds the combined DC rating of the units.
    pub fn exceeds_dc_rating(&self) -> bool {
        self.capacity
            .max_modules_by_dc_power
            .is_some_and(|per_unit| self.total_modules() > per_unit * self.units)
    }

    pub fn orientation(&self, name: &str) -> Option<&Orientation> {
        self.orientations.get(name)
    }

    pub fn orientations(&self) -> impl Iterator<Item = &Orientation> {
        self.orientations.values()
    }

    pub fn to_vec(&self) -> Vec<Orientation> {
        self.orientations.values().cloned().collect()
    }

    /// Every channel of every selected unit, in unit/index order.
    pub fn channels(&self) -> Vec<MpptChannel> {
        (1..=self.units)
            .flat_map(|unit| (1..=self.mppt_count).map(move |index| MpptChannel::new(unit, index)))
            .collect()
    }

    pub fn free_channels(&self) -> Vec<MpptChannel> {
        self.channels()
            .into_iter()
            .filter(|c| !self.bindings.contains_key(c))
            .collect()
    }

    pub fn channel_owner(&self, channel: MpptChannel) -> Option<&str> {
        self.bindings.get(&channel).map(String::as_str)
    }

    pub fn add_orientation(
        &mut self,
        name: &str,
        azimuth_deg: f64,
        tilt_deg: f64,
    ) -> Result<&Orientation, AllocationError> {
        if self.orientations.contains_key(name) {
            return Err(AllocationError::DuplicateOrientation {
                name: name.to_string(),
            });
        }
        let orientation = Orientation::new(name, azimuth_deg, tilt_deg);
        debug!(
            orientation = name,
            azimuth = orientation.azimuth_deg,
            tilt = orientation.tilt_deg,
            "orientation added"
        );
        let entry = self.orientations.entry(name.to_string());
        Ok(&*entry.or_insert(orientation))
    }

    /// Removes an orientation and frees its channel. The last one stays.
    pub fn remove_orientation(&mut self, name: &str) -> Result<Orientation, AllocationError> {
        if !self.orientations.contains_key(name) {
            return Err(unknown(name));
        }
        if self.orientations.len() == 1 {
            return Err(AllocationError::CannotRemoveLastOrientation {
                name: name.to_string(),
            });
        }
        let removed = self
            .orientations
            .shift_remove(name)
            .ok_or_else(|| unknown(name))?;
        if let Some(channel) = removed.channel {
            self.bindings.shift_remove(&channel);
        }
        if removed.module_count > 0 {
            self.clear_generation();
        }
        info!(orientation = name, "orientation removed");
        Ok(removed)
    }

    /// Binds `name` to `channel`.
    ///
    /// Binding the same orientation to the same channel again is a no-op. A
    /// move releases the previous channel and re-applies the count limits of
    /// the new one; the resulting update is returned when the count changed.
    pub fn assign_channel(
        &mut self,
        name: &str,
        channel: MpptChannel,
    ) -> Result<Option<CountUpdate>, AllocationError> {
        let current = self.orientations.get(name).ok_or_else(|| unknown(name))?;
        if !self.channel_exists(channel) {
            return Err(AllocationError::UnknownChannel { channel });
        }
        if let Some(owner) = self.bindings.get(&channel) {
            if owner == name {
                return Ok(None);
            }
            return Err(AllocationError::ChannelAlreadyInUse {
                channel,
                owner: owner.clone(),
            });
        }

        let previous = current.channel;
        let count = current.module_count;
        if let Some(previous) = previous {
            self.bindings.shift_remove(&previous);
        }
        self.bindings.insert(channel, name.to_string());
        if let Some(orientation) = self.orientations.get_mut(name) {
            orientation.channel = Some(channel);
        }
        info!(orientation = name, %channel, "channel assigned");

        let update = self.set_module_count(name, count)?;
        Ok((update.corrected() != count).then_some(update))
    }

    /// Unbinds the orientation; returns the channel it held.
    pub fn release_channel(&mut self, name: &str) -> Result<Option<MpptChannel>, AllocationError> {
        let orientation = self.orientations.get_mut(name).ok_or_else(|| unknown(name))?;
        let released = orientation.channel.take();
        if let Some(channel) = released {
            self.bindings.shift_remove(&channel);
            debug!(orientation = name, %channel, "channel released");
        }
        Ok(released)
    }

    /// Sets the module count of `name`, returning the corrected value.
    ///
    /// The request is clamped to the channel ceiling (or the fallback ceiling
    /// when unbound) and to what the other orientations leave of the aggregate
    /// capacity, then rounded down to a multiple of the parallel strings the
    /// input accepts. Any change of the total invalidates the generation
    /// shares of every orientation.
    pub fn set_module_count(
        &mut self,
        name: &str,
        requested: u32,
    ) -> Result<CountUpdate, AllocationError> {
        let orientation = self.orientations.get(name).ok_or_else(|| unknown(name))?;
        let channel_ceiling = match orientation.channel {
            Some(_) => self.capacity.max_modules_per_mppt,
            None => self.fallback_max_modules,
        };
        let others = self.total_modules() - orientation.module_count;
        let remaining = self.aggregate_capacity().saturating_sub(others);
        let ceiling = channel_ceiling.min(remaining);

        let clamped = requested.min(ceiling);
        let clamp = (clamped != requested).then(|| CapacityClamp {
            orientation_name: name.to_string(),
            requested,
            ceiling,
        });

        let strings = self.capacity.parallel_strings.max(1);
        let balanced = clamped - clamped % strings;
        let correction = (balanced != clamped).then(|| BalancingCorrection {
            orientation_name: name.to_string(),
            requested,
            corrected: balanced,
            modules_per_string: (balanced / strings).min(self.capacity.modules_per_string),
            strings_per_mppt: strings,
        });

        if let Some(clamp) = &clamp {
            debug!(orientation = name, requested, ceiling = clamp.ceiling, "module count clamped");
        }
        if let Some(correction) = &correction {
            debug!(
                orientation = name,
                requested,
                corrected = correction.corrected,
                parallel_strings = strings,
                "module count balanced"
            );
        }

        let orientation = self
            .orientations
            .get_mut(name)
            .ok_or_else(|| unknown(name))?;
        if orientation.module_count != balanced {
            orientation.module_count = balanced;
            self.clear_generation();
        }
        let orientation = self.orientations.get(name).ok_or_else(|| unknown(name))?;
        Ok(CountUpdate {
            orientation: orientation.clone(),
            clamp,
            correction,
        })
    }

    /// Drops area and generation from every orientation.
    fn clear_generation(&mut self) {
        for orientation in self.orientations.values_mut() {
            orientation.clear_generation();
        }
    }

    /// Stores aggregated area/generation back into the matching orientations.
    pub fn apply_generation(&mut self, distributed: &[Orientation]) {
        for updated in distributed {
            if let Some(orientation) = self.orientations.get_mut(&updated.name) {
                if orientation.module_count == updated.module_count {
                    orientation.area_m2 = updated.area_m2;
                    orientation.annual_generation_kwh = updated.annual_generation_kwh;
                }
            }
        }
    }

    fn channel_exists(&self, channel: MpptChannel) -> bool {
        (1..=self.units).contains(&channel.inverter_unit)
            && (1..=self.mppt_count).contains(&channel.mppt_index)
    }
}

fn unknown(name: &str) -> AllocationError {
    AllocationError::UnknownOrientation {
        name: name.to_string(),
    }
}
