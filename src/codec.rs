//! Field codec: splitting a 64-bit value across one or more registers and
//! recombining it, honoring ascending/descending layout and write order.

use crate::bits::{cdiv, fits, mask};
use crate::context::DeviceContext;
use crate::error::RegError;
use crate::field::FieldDesc;
use crate::flags::Flags;
use crate::sink::report_error;

/// The portion of a field living in a single register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Chunk {
    /// Register index this chunk lives in.
    reg: usize,
    /// Bit offset of the chunk within that register.
    reg_offs: u32,
    /// Width of the chunk in bits.
    len: u32,
    /// Bit offset of the chunk within the 64-bit field value.
    value_offs: u32,
}

/// Effective flags for a field operation: `device.flags | field.flags`,
/// computed fresh at the start of every operation — never cached or
/// mutated.
pub fn effective_flags(device_flags: Flags, field: &FieldDesc) -> Flags {
    device_flags | field.flags
}

/// Number of registers `field` spans given a register width of
/// `reg_width` bits.
pub(crate) fn chunk_count(field: &FieldDesc, reg_width: u32) -> u32 {
    cdiv(field.offs + field.width, reg_width)
}

/// Computes the chunk geometry for `field` given a register width of
/// `reg_width` bits, in ascending chunk-index order (index 0 = LSB chunk).
///
/// Returns [`RegError::SpanExceedsDevice`] if `DESCEND` would require a
/// negative register index, so the codec never panics when called
/// without a prior [`crate::check::check`].
fn chunks(field: &FieldDesc, reg_width: u32) -> Result<Vec<Chunk>, RegError> {
    let n = chunk_count(field, reg_width) as usize;
    let len0 = reg_width.min(field.offs + field.width) - field.offs;

    let mut out = Vec::with_capacity(n);
    for i in 0..n {
        let (reg_offs, len, value_offs) = if i == 0 {
            (field.offs, len0, 0)
        } else {
            let consumed = len0 + (i as u32 - 1) * reg_width;
            (0, reg_width.min(field.width - consumed), consumed)
        };

        let reg = if field.flags.contains(Flags::DESCEND) {
            field
                .reg
                .checked_sub(i)
                .ok_or(RegError::SpanExceedsDevice { name: field.name })?
        } else {
            field.reg + i
        };

        out.push(Chunk {
            reg,
            reg_offs,
            len,
            value_offs,
        });
    }
    Ok(out)
}

/// Order in which chunks are visited for a `set`.
fn write_order(chunks: &mut [Chunk], field: &FieldDesc) {
    if field.flags.contains(Flags::MSR_FIRST) {
        chunks.reverse();
    }
}

/// Reads `field`'s current value out of `ctx`, re-fetching from hardware
/// first for each touched register when the effective flags include
/// `VOLATILE` (and not `NOCOMM`).
pub fn get_field(
    ctx: &mut DeviceContext,
    field: &FieldDesc,
    effective: Flags,
) -> Result<u64, RegError> {
    let reg_width = ctx.reg_width();
    let chunks = chunks(field, reg_width)?;

    let volatile = effective.contains(Flags::VOLATILE) && !effective.contains(Flags::NOCOMM);

    let mut value: u64 = 0;
    for chunk in &chunks {
        let reg_value = if volatile {
            ctx.try_read(chunk.reg)?
        } else if chunk.reg < ctx.reg_num() {
            ctx.data()[chunk.reg]
        } else {
            return Err(RegError::RegisterOutOfRange {
                reg: chunk.reg,
                reg_num: ctx.reg_num(),
            });
        };
        let reg_mask = mask(chunk.reg_offs, chunk.len, reg_width);
        let bits = (reg_value as u64 & reg_mask) >> chunk.reg_offs;
        value |= bits << chunk.value_offs;
    }
    Ok(value)
}

/// Writes `value` into `field`, in the order given by `MSR_FIRST`. Stops
/// at the first transport failure; chunks already written remain on the
/// wire and in the software buffer — a partial multi-chunk write is never
/// rolled back.
pub fn set_field(
    ctx: &mut DeviceContext,
    field: &FieldDesc,
    value: u64,
    _effective: Flags,
) -> Result<(), RegError> {
    if !fits(value, field.width) {
        let err = RegError::ValueDoesNotFit {
            name: field.name,
            width: field.width,
        };
        return Err(report_error!("set_field", err));
    }

    let reg_width = ctx.reg_width();
    let mut chunks = chunks(field, reg_width)?;
    write_order(&mut chunks, field);

    for chunk in &chunks {
        if chunk.reg >= ctx.reg_num() {
            let err = RegError::RegisterOutOfRange {
                reg: chunk.reg,
                reg_num: ctx.reg_num(),
            };
            return Err(report_error!("set_field", err));
        }
        let reg_mask = mask(chunk.reg_offs, chunk.len, reg_width);
        let bits = ((value >> chunk.value_offs) << chunk.reg_offs) & reg_mask;
        let current = ctx.data()[chunk.reg] as u64;
        let new_value = ((current & !reg_mask) | bits) as u32;

        ctx.write(chunk.reg, new_value)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::FieldDesc;

    fn memory_device(reg_width: u32, reg_num: usize) -> (DeviceContext, std::rc::Rc<std::cell::RefCell<Vec<(usize, u32)>>>) {
        use std::cell::RefCell;
        use std::rc::Rc;

        let writes = Rc::new(RefCell::new(Vec::new()));
        let backing = Rc::new(RefCell::new(vec![0u32; reg_num]));

        let read_backing = backing.clone();
        let write_backing = backing.clone();
        let write_log = writes.clone();

        let read_fn: crate::context::ReadFn = Box::new(move |reg| Ok(read_backing.borrow()[reg]));
        let write_fn: crate::context::WriteFn = Box::new(move |reg, val| {
            write_backing.borrow_mut()[reg] = val;
            write_log.borrow_mut().push((reg, val));
            Ok(())
        });

        (
            DeviceContext::new(reg_width, reg_num).with_transport(read_fn, write_fn),
            writes,
        )
    }

    #[test]
    fn scenario_1_single_register_field() {
        let (mut ctx, writes) = memory_device(32, 1);
        let foo = FieldDesc::new("FOO", 0, 0, 8);
        let eff = effective_flags(ctx.flags(), &foo);
        set_field(&mut ctx, &foo, 0xAB, eff).unwrap();
        assert_eq!(ctx.data()[0], 0x0000_00AB);
        assert_eq!(writes.borrow().as_slice(), &[(0, 0xAB)]);
        assert_eq!(get_field(&mut ctx, &foo, eff).unwrap(), 0xAB);
    }

    #[test]
    fn scenario_2_full_register_field() {
        let (mut ctx, _writes) = memory_device(32, 2);
        let wide = FieldDesc::new("WIDE", 1, 0, 32);
        let eff = effective_flags(ctx.flags(), &wide);
        set_field(&mut ctx, &wide, 0xDEAD_BEEF, eff).unwrap();
        assert_eq!(ctx.data()[1], 0xDEAD_BEEF);
        assert_eq!(get_field(&mut ctx, &wide, eff).unwrap(), 0xDEAD_BEEF);
    }

    #[test]
    fn scenario_3_field_spans_two_registers_ascending() {
        let (mut ctx, _writes) = memory_device(32, 4);
        let across = FieldDesc::new("ACROSS", 2, 28, 8);
        let eff = effective_flags(ctx.flags(), &across);
        set_field(&mut ctx, &across, 0xFF, eff).unwrap();
        assert_eq!(ctx.data()[2] >> 28, 0xF);
        assert_eq!(ctx.data()[3] & 0xF, 0xF);
        assert_eq!(get_field(&mut ctx, &across, eff).unwrap(), 0xFF);
    }

    #[test]
    fn scenario_4_descend_and_msr_first() {
        let (mut ctx, writes) = memory_device(16, 44);
        let pll_num = FieldDesc::new("PLL_NUM", 43, 0, 32)
            .with_flags(Flags::DESCEND | Flags::MSR_FIRST);
        let eff = effective_flags(ctx.flags(), &pll_num);
        set_field(&mut ctx, &pll_num, 0x1234_5678, eff).unwrap();
        assert_eq!(ctx.data()[42], 0x1234);
        assert_eq!(ctx.data()[43], 0x5678);
        assert_eq!(writes.borrow().as_slice(), &[(42, 0x1234), (43, 0x5678)]);
        assert_eq!(get_field(&mut ctx, &pll_num, eff).unwrap(), 0x1234_5678);
    }

    #[test]
    fn scenario_5_ascend_and_descend_share_lsb_register() {
        let (mut ctx, _writes) = memory_device(6, 4);
        let up = FieldDesc::new("FIELD_UP", 0, 0, 9);
        let dn = FieldDesc::new("FIELD_DN", 3, 0, 9).with_flags(Flags::DESCEND);

        for (u, d) in [(0u64, 0u64), (1, 1), (511, 511), (0x1AB, 0x0CD)] {
            let eff_up = effective_flags(ctx.flags(), &up);
            let eff_dn = effective_flags(ctx.flags(), &dn);
            set_field(&mut ctx, &up, u, eff_up).unwrap();
            set_field(&mut ctx, &dn, d, eff_dn).unwrap();

            assert_eq!(ctx.data()[0] as u64, u & 0x3F);
            assert_eq!(ctx.data()[1] as u64, u >> 6);
            assert_eq!(ctx.data()[2] as u64, d >> 6);
            assert_eq!(ctx.data()[3] as u64, d & 0x3F);
            assert_eq!(get_field(&mut ctx, &up, eff_up).unwrap(), u);
            assert_eq!(get_field(&mut ctx, &dn, eff_dn).unwrap(), d);
        }
    }

    #[test]
    fn msr_first_reverses_write_order_independent_of_descend() {
        let (mut ctx, writes) = memory_device(8, 4);
        let field = FieldDesc::new("X", 0, 0, 24).with_flags(Flags::MSR_FIRST);
        let eff = effective_flags(ctx.flags(), &field);
        set_field(&mut ctx, &field, 0x01_0203, eff).unwrap();
        assert_eq!(writes.borrow().as_slice(), &[(2, 0x01), (1, 0x02), (0, 0x03)]);
    }

    fn counting_memory_device(
        reg_width: u32,
        reg_num: usize,
    ) -> (
        DeviceContext,
        std::rc::Rc<std::cell::RefCell<Vec<u32>>>,
        std::rc::Rc<std::cell::RefCell<u32>>,
    ) {
        use std::cell::RefCell;
        use std::rc::Rc;

        let backing = Rc::new(RefCell::new(vec![0u32; reg_num]));
        let reads = Rc::new(RefCell::new(0u32));

        let read_backing = backing.clone();
        let read_count = reads.clone();
        let write_backing = backing.clone();

        let read_fn: crate::context::ReadFn = Box::new(move |reg| {
            *read_count.borrow_mut() += 1;
            Ok(read_backing.borrow()[reg])
        });
        let write_fn: crate::context::WriteFn = Box::new(move |reg, val| {
            write_backing.borrow_mut()[reg] = val;
            Ok(())
        });

        (
            DeviceContext::new(reg_width, reg_num).with_transport(read_fn, write_fn),
            backing,
            reads,
        )
    }

    #[test]
    fn volatile_rereads_every_touched_register() {
        let (mut ctx, backing, reads) = counting_memory_device(8, 2);
        let field = FieldDesc::new("V", 0, 4, 12).with_flags(Flags::VOLATILE);
        let eff = effective_flags(ctx.flags(), &field);
        set_field(&mut ctx, &field, 0xAB, eff).unwrap();
        assert_eq!(*reads.borrow(), 0);

        // Mutate the backing store out-of-band, bypassing `ctx`'s own
        // buffer, so a stale read (no re-fetch) would return the old value.
        backing.borrow_mut()[0] = 0xF0;
        backing.borrow_mut()[1] = 0x0A;

        let value = get_field(&mut ctx, &field, eff).unwrap();
        assert_eq!(*reads.borrow(), 2);
        assert_eq!(value, 0xAF);
    }

    #[test]
    fn non_volatile_get_issues_no_reads() {
        let (mut ctx, backing, reads) = counting_memory_device(8, 2);
        let field = FieldDesc::new("V", 0, 4, 12);
        let eff = effective_flags(ctx.flags(), &field);
        set_field(&mut ctx, &field, 0xAB, eff).unwrap();

        backing.borrow_mut()[0] = 0xF0;
        backing.borrow_mut()[1] = 0x0A;

        let value = get_field(&mut ctx, &field, eff).unwrap();
        assert_eq!(*reads.borrow(), 0);
        assert_eq!(value, 0xAB);
    }

    #[test]
    fn volatile_with_nocomm_issues_no_reads() {
        let (mut ctx, backing, reads) = counting_memory_device(8, 2);
        ctx.set_flags(Flags::NOCOMM);
        let field = FieldDesc::new("V", 0, 4, 12).with_flags(Flags::VOLATILE);
        let eff = effective_flags(ctx.flags(), &field);
        set_field(&mut ctx, &field, 0xAB, eff).unwrap();

        backing.borrow_mut()[0] = 0xF0;
        backing.borrow_mut()[1] = 0x0A;

        let value = get_field(&mut ctx, &field, eff).unwrap();
        assert_eq!(*reads.borrow(), 0);
        assert_eq!(value, 0xAB);
    }

    #[test]
    fn value_too_wide_is_rejected_and_buffer_unchanged() {
        let (mut ctx, _writes) = memory_device(32, 1);
        let field = FieldDesc::new("F", 0, 0, 4);
        let eff = effective_flags(ctx.flags(), &field);
        set_field(&mut ctx, &field, 0, eff).unwrap();
        ctx.write(0, 0).unwrap();
        let before = ctx.data()[0];
        assert!(set_field(&mut ctx, &field, 0x10, eff).is_err());
        assert_eq!(ctx.data()[0], before);
    }
}
