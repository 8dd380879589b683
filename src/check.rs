//! Consistency checker: certifies a map by driving it through itself.

use crate::bits::mask;
use crate::codec::{chunk_count, effective_flags, get_field, set_field};
use crate::context::DeviceContext;
use crate::error::RegError;
use crate::field::{FieldDesc, Map};
use crate::flags::Flags;
use crate::sink::report_error;

/// Certifies `map` against `ctx`: no zero- or over-wide fields, no span
/// overrunning the device, no duplicate names, no bit overlaps, and no
/// partially covered registers.
///
/// Forces `NOCOMM` for the duration so no transport I/O occurs, holds the
/// lock across the whole pass, and restores the device's prior flags and
/// buffer contents before returning — `check` never leaves an observable
/// trace on the hardware image.
pub fn check(ctx: &mut DeviceContext, map: Map) -> Result<(), RegError> {
    ctx.acquire()?;

    if !ctx.has_symmetric_transport() {
        ctx.release()?;
        let err = RegError::MismatchedTransportCallbacks;
        return Err(report_error!("check", err));
    }

    let previous_flags = ctx.set_flags(ctx.flags() | Flags::NOCOMM);

    let result = run_phases(ctx, map);

    ctx.zero_buffer();
    ctx.set_flags(previous_flags);
    ctx.release()?;

    result.map_err(|e| report_error!("check", e))
}

fn run_phases(ctx: &mut DeviceContext, map: Map) -> Result<(), RegError> {
    ctx.zero_buffer();
    check_widths_and_names(ctx, map)?;

    ctx.zero_buffer();
    check_overlap(ctx, map)?;

    ctx.zero_buffer();
    check_coverage(ctx, map)?;

    Ok(())
}

fn check_widths_and_names(ctx: &DeviceContext, map: Map) -> Result<(), RegError> {
    let reg_width = ctx.reg_width();
    let reg_num = ctx.reg_num();
    let mut seen: Vec<&str> = Vec::new();

    for field in physical_fields(map) {
        if field.name.is_empty() {
            return Err(RegError::EmptyName);
        }
        if field.width == 0 {
            return Err(RegError::ZeroWidthField { name: field.name });
        }
        if field.width > 64 {
            return Err(RegError::FieldTooWide {
                name: field.name,
                width: field.width,
            });
        }
        if field.reg >= reg_num {
            return Err(RegError::SpanExceedsDevice { name: field.name });
        }

        let n = chunk_count(field, reg_width) as usize;
        let overruns = if field.flags.contains(Flags::DESCEND) {
            field.reg + 1 < n
        } else {
            field.reg + n > reg_num
        };
        if overruns {
            return Err(RegError::SpanExceedsDevice { name: field.name });
        }

        if seen.contains(&field.name) {
            return Err(RegError::DuplicateName { name: field.name });
        }
        seen.push(field.name);
    }
    Ok(())
}

/// Drives every field (including padding) to all-ones and back to zero
/// in isolation, proving it shares no bit with any other field.
fn check_overlap(ctx: &mut DeviceContext, map: Map) -> Result<(), RegError> {
    let fields: Vec<&FieldDesc> = map.iter().collect();

    for (i, field) in fields.iter().enumerate() {
        let eff = effective_flags(ctx.flags(), field);
        let all_ones = mask(0, field.width, 64);

        set_field(ctx, field, all_ones, eff)?;
        for other in fields.iter().enumerate().filter_map(|(j, f)| (j != i).then_some(f)) {
            let eff_other = effective_flags(ctx.flags(), other);
            set_field(ctx, other, 0, eff_other)?;
        }

        let readback = get_field(ctx, field, eff)?;
        if readback != all_ones {
            return Err(RegError::Overlap { name: field.name });
        }

        set_field(ctx, field, 0, eff)?;
        for other in &fields {
            let eff_other = effective_flags(ctx.flags(), other);
            if get_field(ctx, other, eff_other)? != 0 {
                return Err(RegError::Overlap { name: other.name });
            }
        }
    }
    Ok(())
}

/// Drives every field (including padding) to all-ones simultaneously,
/// then verifies every register ended up either untouched or fully
/// saturated.
fn check_coverage(ctx: &mut DeviceContext, map: Map) -> Result<(), RegError> {
    for field in map.iter() {
        let eff = effective_flags(ctx.flags(), field);
        let all_ones = mask(0, field.width, 64);
        set_field(ctx, field, all_ones, eff)?;
    }

    let reg_width = ctx.reg_width();
    let full = mask(0, reg_width, reg_width) as u32;
    for (reg, &value) in ctx.data().iter().enumerate() {
        if value != 0 && value != full {
            return Err(RegError::PartialRegisterCoverage { reg });
        }
    }
    Ok(())
}

fn physical_fields(map: Map) -> impl Iterator<Item = &FieldDesc> {
    map.iter().filter(|f| !f.is_reserved())
}
