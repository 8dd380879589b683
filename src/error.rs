//! Error taxonomy.
//!
//! One `snafu`-derived enum covering every fallible operation, grouped
//! into Argument / Map / Runtime / Virtual kinds with a
//! `#[snafu(display(...))]` per variant.

use snafu::Snafu;

/// The single error type returned by every fallible operation in this crate.
#[allow(missing_docs)]
#[derive(Debug, Snafu, PartialEq, Eq, Clone)]
#[snafu(visibility(pub(crate)))]
pub enum RegError {
    // --- Argument ---
    #[snafu(display("device context has no field map installed"))]
    MissingMap,

    #[snafu(display("missing {which} callback"))]
    MissingCallback { which: &'static str },

    #[snafu(display("field name must not be empty"))]
    EmptyName,

    #[snafu(display("register {reg} is out of range (device has {reg_num} registers)"))]
    RegisterOutOfRange { reg: usize, reg_num: usize },

    #[snafu(display("field {name:?} not found in the active map"))]
    FieldNotFound { name: String },

    // --- Map ---
    #[snafu(display("field {name:?} has zero width"))]
    ZeroWidthField { name: &'static str },

    #[snafu(display("field {name:?} width {width} exceeds 64 bits"))]
    FieldTooWide { name: &'static str, width: u32 },

    #[snafu(display("field {name:?} spans past the end of the device"))]
    SpanExceedsDevice { name: &'static str },

    #[snafu(display("duplicate field name {name:?}"))]
    DuplicateName { name: &'static str },

    #[snafu(display("field {name:?} overlaps another field"))]
    Overlap { name: &'static str },

    #[snafu(display("register {reg} is only partially covered by the map"))]
    PartialRegisterCoverage { reg: usize },

    #[snafu(display("read_fn and write_fn must both be present or both absent"))]
    MismatchedTransportCallbacks,

    // --- Runtime ---
    #[snafu(display("transport read of register {reg} failed"))]
    TransportRead { reg: usize },

    #[snafu(display("transport write of register {reg} failed"))]
    TransportWrite { reg: usize },

    #[snafu(display("register {reg} read back a value wider than the register"))]
    RegisterValueOverflow { reg: usize },

    #[snafu(display("lock acquisition failed"))]
    LockFailure,

    #[snafu(display("lock release failed"))]
    UnlockFailure,

    #[snafu(display("lock is already held (re-entrant call)"))]
    AlreadyLocked,

    #[snafu(display("lock was not held at release time"))]
    NotLocked,

    #[snafu(display("value does not fit field {name:?} (width {width})"))]
    ValueDoesNotFit { name: &'static str, width: u32 },

    // --- Virtual ---
    #[snafu(display("field {name:?} is not present in any candidate map"))]
    UnknownField { name: String },

    #[snafu(display("no candidate map has room for field {name:?} with this value"))]
    NoMapFitsValue { name: String },

    #[snafu(display("load_fn failed for map {id}"))]
    LoadFailure { id: usize },

    #[snafu(display("virtual device has an empty map list"))]
    EmptyMapList,

    #[snafu(display("virtual device has an empty field list"))]
    EmptyFieldList,
}

impl RegError {
    /// A short machine-readable tag for this error's kind, used by the
    /// error sink (see [`crate::sink`]) alongside the `Display` message.
    pub fn kind(&self) -> &'static str {
        use RegError::*;
        match self {
            MissingMap
            | MissingCallback { .. }
            | EmptyName
            | RegisterOutOfRange { .. }
            | FieldNotFound { .. } => "argument",
            ZeroWidthField { .. }
            | FieldTooWide { .. }
            | SpanExceedsDevice { .. }
            | DuplicateName { .. }
            | Overlap { .. }
            | PartialRegisterCoverage { .. }
            | MismatchedTransportCallbacks => "map",
            TransportRead { .. }
            | TransportWrite { .. }
            | RegisterValueOverflow { .. }
            | LockFailure
            | UnlockFailure
            | AlreadyLocked
            | NotLocked
            | ValueDoesNotFit { .. } => "runtime",
            UnknownField { .. }
            | NoMapFitsValue { .. }
            | LoadFailure { .. }
            | EmptyMapList
            | EmptyFieldList => "virtual",
        }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = core::result::Result<T, RegError>;
