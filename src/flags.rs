//! Field and device flags.
//!
//! Bit values are fixed for wire/config stability — do not renumber.

use bitflags::bitflags;

bitflags! {
    /// Flags attached to a field descriptor or a device context.
    ///
    /// Effective flags for any field operation are `device.flags | field.flags`
    /// (see [`crate::codec::effective_flags`]).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Flags: u32 {
        /// Reserved.
        const READONLY  = 1 << 0;
        /// Reserved.
        const WRITEONLY = 1 << 1;
        /// Re-read the underlying registers on every field get.
        const VOLATILE  = 1 << 2;
        /// Suppress transport I/O; buffer only. Overrides `VOLATILE`.
        const NOCOMM    = 1 << 3;
        /// Reserved.
        const ALIAS     = 1 << 4;
        /// LSBs live in the highest-indexed register of the span.
        const DESCEND   = 1 << 5;
        /// Write the most-significant chunk first.
        const MSR_FIRST = 1 << 6;
        /// Exempt this field from the virtual device's reset pass.
        const NORESET   = 1 << 7;
    }
}
