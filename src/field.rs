//! Field descriptors and map lookup.

use crate::flags::Flags;

/// An immutable, table-provided description of one named bitfield.
///
/// `name` is unique within a map except for names beginning with `_`,
/// which are reserved/padding and may repeat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDesc {
    /// Field name. Non-empty. Names starting with `_` are reserved.
    pub name: &'static str,
    /// Index of the register holding the field's LSB chunk.
    pub reg: usize,
    /// Bit offset of the LSB within that register (`0 <= offs < reg_width`).
    pub offs: u32,
    /// Total field width in bits (`1 <= width <= 64`).
    pub width: u32,
    /// Flags drawn from [`Flags`].
    pub flags: Flags,
}

impl FieldDesc {
    /// Shorthand constructor for the common ascending, non-volatile case.
    pub const fn new(name: &'static str, reg: usize, offs: u32, width: u32) -> Self {
        Self {
            name,
            reg,
            offs,
            width,
            flags: Flags::empty(),
        }
    }

    /// Returns a copy of this descriptor with additional flags set.
    pub const fn with_flags(mut self, flags: Flags) -> Self {
        self.flags = Flags::from_bits_truncate(self.flags.bits() | flags.bits());
        self
    }

    /// Whether this is a reserved/padding slot (name starts with `_`).
    pub fn is_reserved(&self) -> bool {
        self.name.starts_with('_')
    }
}

/// An ordered set of field descriptors describing one physical register
/// layout.
pub type Map = &'static [FieldDesc];

/// Finds the first field in `map` named `name`: a linear, first-match-wins
/// scan.
pub fn lookup<'a>(map: Map, name: &str) -> Option<&'a FieldDesc> {
    map.iter().find(|f| f.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAP: Map = &[
        FieldDesc::new("FOO", 0, 0, 8),
        FieldDesc::new("_pad", 0, 8, 8),
        FieldDesc::new("_pad", 0, 16, 8),
        FieldDesc::new("BAR", 1, 0, 32),
    ];

    #[test]
    fn lookup_finds_first_match() {
        let f = lookup(MAP, "FOO").unwrap();
        assert_eq!(f.reg, 0);
        assert_eq!(f.width, 8);
    }

    #[test]
    fn lookup_misses_return_none() {
        assert!(lookup(MAP, "QUUX").is_none());
    }

    #[test]
    fn reserved_names_may_repeat() {
        let pads: Vec<_> = MAP.iter().filter(|f| f.is_reserved()).collect();
        assert_eq!(pads.len(), 2);
    }
}
