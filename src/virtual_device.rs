//! Virtual device: multiplexes a larger logical name space onto one
//! physical device whose register layout can be reconfigured ("maps") at
//! runtime.

use crate::check;
use crate::codec::{effective_flags, set_field};
use crate::context::DeviceContext;
use crate::error::RegError;
use crate::field::{lookup, Map};
use crate::flags::Flags;
use crate::sink::report_error;

/// `load_fn(id) -> Result<()>`: reconfigures the physical device to map
/// `id`, the 0-based index into the candidate map list.
pub type LoadFn = Box<dyn FnMut(usize) -> Result<(), RegError>>;

/// Composite that remembers a value per virtual field name across
/// reconfigurations of an embedded physical [`DeviceContext`], and
/// automatically loads a map that can hold a requested value.
pub struct VirtualDevice {
    base: DeviceContext,
    fields: &'static [&'static str],
    values: Vec<u64>,
    maps: &'static [Map],
    active_map: Option<usize>,
    load_fn: LoadFn,
}

impl VirtualDevice {
    /// Builds a virtual device over `base` (which should have no map
    /// installed yet — `verify` and the first `adjust` install one
    /// lazily), a virtual name space `fields`, and the candidate physical
    /// `maps` in declaration order.
    pub fn new(
        base: DeviceContext,
        fields: &'static [&'static str],
        maps: &'static [Map],
        load_fn: LoadFn,
    ) -> Self {
        Self {
            values: vec![0; fields.len()],
            base,
            fields,
            maps,
            active_map: None,
            load_fn,
        }
    }

    /// Read-only view of the embedded physical device.
    pub fn base(&self) -> &DeviceContext {
        &self.base
    }

    /// The currently active candidate map, if one has been loaded yet.
    pub fn active_map(&self) -> Option<Map> {
        self.active_map.map(|id| self.maps[id])
    }

    /// Certifies every candidate map and confirms every non-underscore
    /// virtual field name appears in at least one of them. Leaves no map
    /// active on success, forcing the first `adjust` to install one.
    pub fn verify(&mut self) -> Result<(), RegError> {
        if self.maps.is_empty() {
            let err = RegError::EmptyMapList;
            return Err(report_error!("VirtualDevice::verify", err));
        }
        if self.fields.is_empty() {
            let err = RegError::EmptyFieldList;
            return Err(report_error!("VirtualDevice::verify", err));
        }

        for &map in self.maps {
            self.base.set_map(Some(map));
            check::check(&mut self.base, map)
                .map_err(|e| report_error!("VirtualDevice::verify", e))?;
        }

        for &name in self.fields.iter().filter(|n| !n.starts_with('_')) {
            if !self.maps.iter().any(|&m| lookup(m, name).is_some()) {
                let err = RegError::UnknownField {
                    name: name.to_string(),
                };
                return Err(report_error!("VirtualDevice::verify", err));
            }
        }

        self.base.set_map(None);
        self.active_map = None;
        Ok(())
    }

    fn index_of(&self, name: &str) -> Result<usize, RegError> {
        self.fields
            .iter()
            .position(|&n| n == name)
            .ok_or_else(|| RegError::UnknownField {
                name: name.to_string(),
            })
    }

    /// Returns the virtual value for `name`, or `0` on failure. Never
    /// consults hardware: `VOLATILE` has no effect on virtual fields.
    pub fn obtain(&self, name: &str) -> u64 {
        self.try_obtain(name).unwrap_or_else(|e| {
            report_error!("VirtualDevice::obtain", e);
            0
        })
    }

    /// `Result`-returning form of [`Self::obtain`].
    pub fn try_obtain(&self, name: &str) -> Result<u64, RegError> {
        self.index_of(name).map(|i| self.values[i])
    }

    /// Updates the virtual value for `name` and, unless `name` is purely
    /// virtual (starts with `_`), materializes it onto the physical
    /// device — lazily activating map 0 on first use, switching to
    /// another candidate map if the current one can't hold `value`, and
    /// re-materializing prior values into a newly activated map.
    pub fn adjust(&mut self, name: &str, value: u64) -> Result<(), RegError> {
        let idx = self.index_of(name)?;
        self.base.acquire()?;
        let result = self.adjust_locked(idx, name, value);
        self.base.release()?;
        result.map_err(|e| report_error!("VirtualDevice::adjust", e))
    }

    fn adjust_locked(&mut self, idx: usize, name: &str, value: u64) -> Result<(), RegError> {
        self.values[idx] = value;
        if name.starts_with('_') {
            return Ok(());
        }

        if self.active_map.is_none() {
            (self.load_fn)(0).map_err(|_| RegError::LoadFailure { id: 0 })?;
            self.base.set_map(Some(self.maps[0]));
            self.active_map = Some(0);
        }

        let active_map = self.maps[self.active_map.expect("just installed above")];
        if let Some(field) = lookup(active_map, name) {
            if crate::bits::fits(value, field.width) {
                let eff = effective_flags(self.base.flags(), field);
                return set_field(&mut self.base, field, value, eff);
            }
        }

        let target_id = self
            .maps
            .iter()
            .enumerate()
            .find_map(|(id, &m)| lookup(m, name).filter(|f| crate::bits::fits(value, f.width)).map(|_| id))
            .ok_or_else(|| RegError::NoMapFitsValue {
                name: name.to_string(),
            })?;

        (self.load_fn)(target_id).map_err(|_| RegError::LoadFailure { id: target_id })?;
        self.base.set_map(Some(self.maps[target_id]));
        self.active_map = Some(target_id);
        self.reset_pass(target_id, name)?;

        let field = lookup(self.maps[target_id], name).expect("map selected because it contains name");
        let eff = effective_flags(self.base.flags(), field);
        set_field(&mut self.base, field, value, eff)
    }

    /// Zeroes the physical buffer (the load callback is assumed to have
    /// reset the device) and re-materializes prior virtual values into
    /// the newly active map, skipping the triggering field, `NORESET`
    /// fields, padding, and values that no longer fit.
    fn reset_pass(&mut self, map_id: usize, triggering: &str) -> Result<(), RegError> {
        self.base.zero_buffer();
        let map = self.maps[map_id];
        let device_flags = self.base.flags();

        for field in map.iter() {
            if field.name == triggering || field.is_reserved() {
                continue;
            }
            let eff = effective_flags(device_flags, field);
            if eff.contains(Flags::NORESET) {
                continue;
            }
            let Some(slot) = self.fields.iter().position(|&n| n == field.name) else {
                continue;
            };
            let value = self.values[slot];
            if !crate::bits::fits(value, field.width) {
                continue;
            }
            set_field(&mut self.base, field, value, eff)?;
        }
        Ok(())
    }
}
