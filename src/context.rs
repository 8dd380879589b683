//! Device context: the mutable container around a register buffer, its
//! active map, the transport closures, and the lock.

use crate::error::RegError;
use crate::field::{lookup, FieldDesc, Map};
use crate::flags::Flags;
use crate::lock::{Lock, NullLock};
use crate::sink::report_error;

/// `read_fn(reg) -> u32`.
pub type ReadFn = Box<dyn FnMut(usize) -> Result<u32, RegError>>;
/// `write_fn(reg, val) -> Result<()>`.
pub type WriteFn = Box<dyn FnMut(usize, u32) -> Result<(), RegError>>;

/// The mutable container around a device's register state: register
/// width/count, the software image of the hardware, the active map, the
/// transport, the lock, and the re-entrance guard.
pub struct DeviceContext {
    reg_width: u32,
    reg_num: usize,
    field_map: Option<Map>,
    data: Vec<u32>,
    read_fn: Option<ReadFn>,
    write_fn: Option<WriteFn>,
    flags: Flags,
    lock: Box<dyn Lock>,
    lock_count: u8,
}

impl DeviceContext {
    /// Creates a device context with `reg_num` registers of `reg_width`
    /// bits each, all initialized to zero, no transport, no lock, and no
    /// active map.
    ///
    /// `reg_width` must lie in `[1, 32]`; a caller passing a wider value
    /// gets it silently clamped to 32, matching [`crate::bits::mask`]'s
    /// treatment of out-of-range widths as "does not fit" rather than a
    /// panic.
    pub fn new(reg_width: u32, reg_num: usize) -> Self {
        let reg_width = reg_width.clamp(1, 32);
        Self {
            reg_width,
            reg_num,
            field_map: None,
            data: vec![0; reg_num],
            read_fn: None,
            write_fn: None,
            flags: Flags::empty(),
            lock: Box::new(NullLock),
            lock_count: 0,
        }
    }

    /// Installs the transport closures. Both or neither — see
    /// [`RegError::MismatchedTransportCallbacks`].
    pub fn with_transport(mut self, read_fn: ReadFn, write_fn: WriteFn) -> Self {
        self.read_fn = Some(read_fn);
        self.write_fn = Some(write_fn);
        self
    }

    /// Installs a lock implementation in place of the default [`NullLock`].
    pub fn with_lock(mut self, lock: impl Lock + 'static) -> Self {
        self.lock = Box::new(lock);
        self
    }

    /// Sets the device-level flags, OR-ed into every field's effective
    /// flags.
    pub fn with_flags(mut self, flags: Flags) -> Self {
        self.flags = flags;
        self
    }

    /// Installs the active map.
    pub fn with_map(mut self, map: Map) -> Self {
        self.field_map = Some(map);
        self
    }

    /// Register width in bits.
    pub fn reg_width(&self) -> u32 {
        self.reg_width
    }

    /// Number of registers.
    pub fn reg_num(&self) -> usize {
        self.reg_num
    }

    /// Device-level flags.
    pub fn flags(&self) -> Flags {
        self.flags
    }

    /// Replaces the device-level flags, returning the previous value.
    /// Used by [`crate::check::check`] to force `NOCOMM` for the duration
    /// of a certification pass and restore the caller's flags afterwards.
    pub fn set_flags(&mut self, flags: Flags) -> Flags {
        std::mem::replace(&mut self.flags, flags)
    }

    /// The currently active map, if any.
    pub fn map(&self) -> Option<Map> {
        self.field_map
    }

    /// Installs a new active map, returning the previous one. Used by the
    /// virtual device when switching maps.
    pub fn set_map(&mut self, map: Option<Map>) -> Option<Map> {
        std::mem::replace(&mut self.field_map, map)
    }

    /// Read-only view of the software register buffer.
    pub fn data(&self) -> &[u32] {
        &self.data
    }

    /// Zeroes the software buffer directly, without transport I/O or
    /// locking. Used by [`crate::check::check`], which already holds the
    /// lock for the whole certification pass.
    pub(crate) fn zero_buffer(&mut self) {
        self.data.iter_mut().for_each(|d| *d = 0);
    }

    /// Whether the read and write transport callbacks are either both
    /// installed or both absent.
    pub(crate) fn has_symmetric_transport(&self) -> bool {
        self.read_fn.is_some() == self.write_fn.is_some()
    }

    fn reg_mask(&self) -> u64 {
        crate::bits::mask(0, self.reg_width, self.reg_width)
    }

    // ---- locking ----

    pub(crate) fn acquire(&mut self) -> Result<(), RegError> {
        if self.lock_count != 0 {
            let err = RegError::AlreadyLocked;
            return Err(report_error!("DeviceContext::acquire", err));
        }
        self.lock.lock().map_err(|_| {
            let err = RegError::LockFailure;
            report_error!("DeviceContext::acquire", err)
        })?;
        self.lock_count = 1;
        Ok(())
    }

    pub(crate) fn release(&mut self) -> Result<(), RegError> {
        if self.lock_count != 1 {
            let err = RegError::NotLocked;
            return Err(report_error!("DeviceContext::release", err));
        }
        self.lock.unlock().map_err(|_| {
            let err = RegError::UnlockFailure;
            report_error!("DeviceContext::release", err)
        })?;
        self.lock_count = 0;
        Ok(())
    }

    // ---- raw register I/O ----

    /// Fetches register `reg`, storing the result in the software buffer.
    /// Bypasses the transport (buffer-only) when device flags include
    /// `NOCOMM`. Returns `0` on failure, reporting the error to the
    /// current sink; use [`Self::try_read`] for the `Result`-returning
    /// form.
    pub fn read(&mut self, reg: usize) -> u32 {
        self.try_read(reg).unwrap_or_else(|e| {
            report_error!("DeviceContext::read", e);
            0
        })
    }

    /// `Result`-returning form of [`Self::read`].
    pub fn try_read(&mut self, reg: usize) -> Result<u32, RegError> {
        if reg >= self.reg_num {
            return Err(RegError::RegisterOutOfRange {
                reg,
                reg_num: self.reg_num,
            });
        }
        if !self.flags.contains(Flags::NOCOMM) {
            let read_fn = self
                .read_fn
                .as_mut()
                .ok_or(RegError::MissingCallback { which: "read_fn" })?;
            let value = read_fn(reg).map_err(|_| RegError::TransportRead { reg })?;
            if (value as u64) & !self.reg_mask() != 0 {
                return Err(RegError::RegisterValueOverflow { reg });
            }
            self.data[reg] = value;
        }
        Ok(self.data[reg])
    }

    /// Writes `val` to register `reg`, updating the software buffer on
    /// success. Bypasses the transport when `NOCOMM` is set.
    pub fn write(&mut self, reg: usize, val: u32) -> Result<(), RegError> {
        if reg >= self.reg_num {
            let err = RegError::RegisterOutOfRange {
                reg,
                reg_num: self.reg_num,
            };
            return Err(report_error!("DeviceContext::write", err));
        }
        if (val as u64) & !self.reg_mask() != 0 {
            let err = RegError::RegisterValueOverflow { reg };
            return Err(report_error!("DeviceContext::write", err));
        }
        if !self.flags.contains(Flags::NOCOMM) {
            let write_fn = self.write_fn.as_mut().ok_or_else(|| {
                report_error!(
                    "DeviceContext::write",
                    RegError::MissingCallback { which: "write_fn" }
                )
            })?;
            write_fn(reg, val).map_err(|_| {
                report_error!("DeviceContext::write", RegError::TransportWrite { reg })
            })?;
        }
        self.data[reg] = val;
        Ok(())
    }

    /// Replaces the whole software buffer, or zeroes it if `src` is
    /// absent. Never touches the transport. Holds the lock for the
    /// duration.
    pub fn bulk(&mut self, src: Option<&[u32]>) -> Result<(), RegError> {
        self.acquire()?;
        let result = (|| {
            match src {
                None => self.data.iter_mut().for_each(|d| *d = 0),
                Some(src) => {
                    if src.len() != self.reg_num {
                        return Err(RegError::RegisterOutOfRange {
                            reg: src.len(),
                            reg_num: self.reg_num,
                        });
                    }
                    self.data.copy_from_slice(src);
                }
            }
            Ok(())
        })();
        self.release()?;
        if let Err(e) = &result {
            report_error!("DeviceContext::bulk", e.clone());
        }
        result
    }

    // ---- named field access ----

    fn field(&self, name: &str) -> Result<&FieldDesc, RegError> {
        let map = self.field_map.ok_or(RegError::MissingMap)?;
        lookup(map, name)
            .filter(|f| !f.is_reserved())
            .ok_or_else(|| RegError::FieldNotFound {
                name: name.to_string(),
            })
    }

    /// Width in bits of the named field, or `0xFF` if it is not present
    /// in the active map.
    pub fn fwidth(&self, name: &str) -> u32 {
        self.field(name).map(|f| f.width).unwrap_or(0xFF)
    }

    /// Reads the named field. Returns `0` on failure, reporting the error
    /// to the current sink; use [`Self::try_get`] for the
    /// `Result`-returning form.
    pub fn get(&mut self, name: &str) -> u64 {
        self.try_get(name).unwrap_or_else(|e| {
            report_error!("DeviceContext::get", e);
            0
        })
    }

    /// `Result`-returning form of [`Self::get`].
    pub fn try_get(&mut self, name: &str) -> Result<u64, RegError> {
        let field = *self.field(name)?;
        let effective = crate::codec::effective_flags(self.flags, &field);
        self.acquire()?;
        let result = crate::codec::get_field(self, &field, effective);
        self.release()?;
        result.map_err(|e| report_error!("DeviceContext::get", e))
    }

    /// Writes `value` into the named field.
    pub fn set(&mut self, name: &str, value: u64) -> Result<(), RegError> {
        let field = *self.field(name)?;
        let effective = crate::codec::effective_flags(self.flags, &field);
        self.acquire()?;
        let result = crate::codec::set_field(self, &field, value, effective);
        self.release()?;
        result.map_err(|e| report_error!("DeviceContext::set", e))
    }
}
