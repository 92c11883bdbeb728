/// Identifies a logical processor core in the system, as used in OS affinity masks.
///
/// Values are not guaranteed to be contiguous, though they often are. Distinct physical
/// cores always carry distinct logical core IDs.
pub type CoreId = u32;
