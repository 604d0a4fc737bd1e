use std::fmt;
use std::str::FromStr;

use crate::dsp::gain::GAIN_DESCRIPTOR;
use crate::dsp::stereo_gain::STEREO_GAIN_DESCRIPTOR;
use crate::dsp::tremolo::TREMOLO_DESCRIPTOR;
use crate::dsp::{GainUnit, StereoGainUnit, TremoloUnit, Unit, UnitDescriptor, UnitSettings};
use crate::error::UnitError;

/// Every unit this crate can build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitKind {
    Gain,
    StereoGain,
    Tremolo,
}

impl UnitKind {
    pub const ALL: [UnitKind; 3] = [UnitKind::Gain, UnitKind::StereoGain, UnitKind::Tremolo];

    pub fn descriptor(self) -> &'static UnitDescriptor {
        match self {
            UnitKind::Gain => &GAIN_DESCRIPTOR,
            UnitKind::StereoGain => &STEREO_GAIN_DESCRIPTOR,
            UnitKind::Tremolo => &TREMOLO_DESCRIPTOR,
        }
    }

    /// Short name used in patches.
    pub fn alias(self) -> &'static str {
        match self {
            UnitKind::Gain => "gain",
            UnitKind::StereoGain => "stereo_gain",
            UnitKind::Tremolo => "tremolo",
        }
    }

    /// Channels one instance consumes.
    pub fn channels(self) -> usize {
        self.descriptor().num_audio_inputs()
    }

    /// Lookup by alias or class name, ignoring case.
    pub fn lookup(name: &str) -> Result<Self, UnitError> {
        Self::ALL
            .into_iter()
            .find(|k| {
                k.alias().eq_ignore_ascii_case(name)
                    || k.descriptor().class_name.eq_ignore_ascii_case(name)
            })
            .ok_or_else(|| UnitError::UnknownUnit(name.to_string()))
    }

    pub fn create(self, settings: &UnitSettings) -> Box<dyn Unit> {
        match self {
            UnitKind::Gain => Box::new(GainUnit::new(settings)),
            UnitKind::StereoGain => Box::new(StereoGainUnit::new(settings)),
            UnitKind::Tremolo => Box::new(TremoloUnit::new(settings)),
        }
    }
}

impl FromStr for UnitKind {
    type Err = UnitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::lookup(s)
    }
}

impl fmt::Display for UnitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.alias())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::PortKind;

    #[test]
    fn lookup_by_alias_and_class_name() {
        assert_eq!(UnitKind::lookup("tremolo").unwrap(), UnitKind::Tremolo);
        assert_eq!(UnitKind::lookup("DemoGain").unwrap(), UnitKind::Gain);
        assert_eq!("STEREOGAIN".parse::<UnitKind>().unwrap(), UnitKind::StereoGain);
        assert_eq!(
            UnitKind::lookup("chorus"),
            Err(UnitError::UnknownUnit("chorus".into()))
        );
    }

    #[test]
    fn channel_counts() {
        assert_eq!(UnitKind::Gain.channels(), 1);
        assert_eq!(UnitKind::StereoGain.channels(), 2);
        assert_eq!(UnitKind::Tremolo.channels(), 1);
    }

    #[test]
    fn created_unit_reports_its_descriptor() {
        for kind in UnitKind::ALL {
            let unit = kind.create(&UnitSettings::default());
            assert!(std::ptr::eq(unit.descriptor(), kind.descriptor()));
        }
    }

    #[test]
    fn every_float_input_defaults_to_unity() {
        for kind in UnitKind::ALL {
            let d = kind.descriptor();
            for port in d.controls() {
                assert_eq!(port.default, Some(1.0), "{}::{}", d.class_name, port.name);
            }
            for port in d.audio_inputs().chain(d.outputs) {
                assert_eq!(port.kind, PortKind::Audio);
                assert_eq!(port.default, None);
            }
        }
    }

    #[test]
    fn bound_controls_start_at_descriptor_defaults() {
        for kind in UnitKind::ALL {
            let unit = kind.create(&UnitSettings::default());
            for port in kind.descriptor().controls() {
                assert_eq!(Some(unit.control(port.key).unwrap()), port.default);
            }
        }
    }
}
