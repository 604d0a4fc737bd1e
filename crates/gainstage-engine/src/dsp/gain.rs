use super::unit::{
    audio_input, ControlInput, OutputBlock, PortInfo, Unit, UnitDescriptor, UnitSettings,
};
use crate::error::UnitError;

pub static GAIN_DESCRIPTOR: UnitDescriptor = UnitDescriptor {
    class_name: "DemoGain",
    display_name: "Demo Gain",
    description: "Applies gain to input audio.",
    category: "Gain",
    version: (1, 0),
    inputs: &[
        PortInfo::audio("in", "In Audio", "The audio input."),
        PortInfo::float("gain", "Gain Level", "How much gain to apply. Linear.", 1.0),
    ],
    outputs: &[PortInfo::audio("out", "Out Audio", "Output audio with gain applied.")],
};

/// `out[i] = input[i] * gain`, over the shorter of the two slices.
#[inline]
pub fn apply_gain(input: &[f32], gain: f32, out: &mut [f32]) {
    for (o, &x) in out.iter_mut().zip(input) {
        *o = x * gain;
    }
}

/// Linear gain on a mono block. No clipping: 0 silences, negative values invert.
pub struct GainUnit {
    gain: ControlInput,
    out: OutputBlock,
}

impl GainUnit {
    pub fn new(settings: &UnitSettings) -> Self {
        let mut unit = Self {
            gain: ControlInput::new(1.0),
            out: OutputBlock::default(),
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

    /// Gain used by the last block.
    pub fn current_gain(&self) -> f32 {
        self.gain.cached()
    }
}

impl Unit for GainUnit {
    fn descriptor(&self) -> &'static UnitDescriptor {
        &GAIN_DESCRIPTOR
    }

    fn reset(&mut self, settings: &UnitSettings) {
        // The cached gain survives resets.
        self.out.reset(settings.block_size);
    }

    fn set_control(&mut self, port: &str, value: f32) -> Result<(), UnitError> {
        GAIN_DESCRIPTOR.control_index(port)?;
        self.gain.set(value);
        Ok(())
    }

    fn control(&self, port: &str) -> Result<f32, UnitError> {
        GAIN_DESCRIPTOR.control_index(port)?;
        Ok(self.gain.value())
    }

    fn execute(&mut self, inputs: &[&[f32]]) {
        self.gain.refresh();
        let input = audio_input(inputs, 0);
        let out = self.out.frames_mut(input.len());
        apply_gain(input, self.gain.cached(), out);
    }

    fn output(&self, port: usize) -> &[f32] {
        debug_assert_eq!(port, 0, "DemoGain has a single output");
        self.out.as_slice()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(block_size: usize) -> UnitSettings {
        UnitSettings::new(48_000.0, block_size)
    }

    #[test]
    fn doubles_each_sample() {
        let mut unit = GainUnit::new(&settings(3)).with_gain(2.0);
        unit.execute(&[&[1.0, -1.0, 0.5]]);
        assert_eq!(unit.output(0), &[2.0, -2.0, 1.0]);
    }

    #[test]
    fn default_gain_is_unity() {
        let mut unit = GainUnit::new(&settings(4));
        let input = [0.1, -0.2, 0.3, -0.4];
        unit.execute(&[&input]);
        assert_eq!(unit.output(0), &input);
        assert_eq!(unit.control("Gain Level").unwrap(), 1.0);
    }

    #[test]
    fn zero_silences_and_negative_inverts() {
        let mut unit = GainUnit::new(&settings(2));
        unit.set_control("gain", 0.0).unwrap();
        unit.execute(&[&[0.7, -0.3]]);
        assert!(unit.output(0).iter().all(|&s| s == 0.0));

        unit.set_control("gain", -1.0).unwrap();
        unit.execute(&[&[0.7, -0.3]]);
        assert_eq!(unit.output(0), &[-0.7, 0.3]);
    }

    #[test]
    fn no_clipping_above_full_scale() {
        let mut unit = GainUnit::new(&settings(1)).with_gain(4.0);
        unit.execute(&[&[0.5]]);
        assert_eq!(unit.output(0), &[2.0]);
    }

    #[test]
    fn new_gain_applies_on_next_block() {
        let mut unit = GainUnit::new(&settings(1));
        unit.execute(&[&[1.0]]);
        unit.set_gain(0.25);
        assert_eq!(unit.current_gain(), 1.0);
        unit.execute(&[&[1.0]]);
        assert_eq!(unit.output(0), &[0.25]);
        assert_eq!(unit.current_gain(), 0.25);
    }

    #[test]
    fn reset_zeroes_output_but_keeps_gain() {
        let mut unit = GainUnit::new(&settings(2)).with_gain(3.0);
        unit.execute(&[&[1.0, 1.0]]);
        unit.reset(&settings(2));
        assert_eq!(unit.output(0), &[0.0; 2]);
        assert_eq!(unit.current_gain(), 3.0);
        unit.execute(&[&[1.0, 1.0]]);
        assert_eq!(unit.output(0), &[3.0, 3.0]);
    }

    #[test]
    fn empty_block() {
        let mut unit = GainUnit::new(&settings(0)).with_gain(2.0);
        unit.execute(&[&[]]);
        assert!(unit.output(0).is_empty());
    }

    #[test]
    fn unknown_port_is_rejected() {
        let mut unit = GainUnit::new(&settings(1));
        assert_eq!(
            unit.set_control("rate", 1.0),
            Err(UnitError::UnknownPort { unit: "DemoGain", port: "rate".into() })
        );
    }
}
