use super::gain::apply_gain;
use super::unit::{
    audio_input, ControlInput, OutputBlock, PortInfo, Unit, UnitDescriptor, UnitSettings,
};
use crate::error::UnitError;

pub static STEREO_GAIN_DESCRIPTOR: UnitDescriptor = UnitDescriptor {
    class_name: "StereoGain",
    display_name: "Stereo Gain",
    description: "Applies one gain to a left/right pair.",
    category: "Gain",
    version: (1, 0),
    inputs: &[
        PortInfo::audio("in_l", "In Audio L", "The left audio input."),
        PortInfo::audio("in_r", "In Audio R", "The right audio input."),
        PortInfo::float("gain", "Gain Level", "How much gain to apply. Linear.", 1.0),
    ],
    outputs: &[
        PortInfo::audio("out_l", "Out Audio L", "Left output with gain applied."),
        PortInfo::audio("out_r", "Out Audio R", "Right output with gain applied."),
    ],
};

/// One linear gain applied to two independent channels.
///
/// Left and right must be the same length. Debug builds assert on a
/// mismatch; release builds process the shorter length on both sides.
pub struct StereoGainUnit {
    gain: ControlInput,
    left: OutputBlock,
    right: OutputBlock,
}

impl StereoGainUnit {
    pub fn new(settings: &UnitSettings) -> Self {
        let mut unit = Self {
            gain: ControlInput::new(1.0),
            left: OutputBlock::default(),
            right: OutputBlock::default(),
        };
        unit.reset(settings);
        unit
    }

    pub fn with_gain(mut self, gain: f32) -> Self {
        self.gain.set(gain);
        self
    }

    pub fn set_gain(&mut self, gain: f32) {
        self.gain.set(gain);
    }

    pub fn current_gain(&self) -> f32 {
        self.gain.cached()
    }

    pub fn left(&self) -> &[f32] {
        self.left.as_slice()
    }

    pub fn right(&self) -> &[f32] {
        self.right.as_slice()
    }
}

impl Unit for StereoGainUnit {
    fn descriptor(&self) -> &'static UnitDescriptor {
        &STEREO_GAIN_DESCRIPTOR
    }

    fn reset(&mut self, settings: &UnitSettings) {
        self.left.reset(settings.block_size);
        self.right.reset(settings.block_size);
    }

    fn set_control(&mut self, port: &str, value: f32) -> Result<(), UnitError> {
        STEREO_GAIN_DESCRIPTOR.control_index(port)?;
        self.gain.set(value);
        Ok(())
    }

    fn control(&self, port: &str) -> Result<f32, UnitError> {
        STEREO_GAIN_DESCRIPTOR.control_index(port)?;
        Ok(self.gain.value())
    }

    fn execute(&mut self, inputs: &[&[f32]]) {
        self.gain.refresh();
        let gain = self.gain.cached();

        let in_l = audio_input(inputs, 0);
        let in_r = audio_input(inputs, 1);
        debug_assert_eq!(in_l.len(), in_r.len(), "left/right block length mismatch");
        let frames = in_l.len().min(in_r.len());

        apply_gain(&in_l[..frames], gain, self.left.frames_mut(frames));
        apply_gain(&in_r[..frames], gain, self.right.frames_mut(frames));
    }

    fn output(&self, port: usize) -> &[f32] {
        match port {
            0 => self.left.as_slice(),
            1 => self.right.as_slice(),
            _ => {
                debug_assert!(false, "StereoGain has no output {port}");
                &[]
            }
        }
    }
}
