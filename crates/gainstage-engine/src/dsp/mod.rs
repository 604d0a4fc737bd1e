//! The processing units and their shared lifecycle contract.
//!
//! Everything reachable from `Unit::execute` is allocation-free and
//! lock-free. Construction and `reset` may allocate.

/// Mono linear gain.
pub mod gain;
/// Low frequency oscillator driving the tremolo.
pub mod lfo;
/// One gain shared by a left/right pair.
pub mod stereo_gain;
/// LFO amplitude modulation with makeup gain.
pub mod tremolo;
/// `Unit` trait, port descriptors and settings.
pub mod unit;

pub use gain::GainUnit;
pub use lfo::{Lfo, LfoSettings, LfoShape};
pub use stereo_gain::StereoGainUnit;
pub use tremolo::TremoloUnit;
pub use unit::{ControlInput, PortInfo, PortKind, Unit, UnitDescriptor, UnitSettings};
