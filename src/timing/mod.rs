//! Cycle-accurate timing of the detect/parse hot path, built only under the `timing` feature
//! (spec §2 component 6; Design Notes §9: zero-cost when disabled).

#[macro_use]
pub(crate) mod macros;
#[cfg(feature = "timing")]
pub(crate) mod timer;
