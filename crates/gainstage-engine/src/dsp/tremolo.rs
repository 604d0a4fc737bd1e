use super::lfo::{Lfo, LfoSettings, LfoShape};
use super::unit::{
    audio_input, ControlInput, OutputBlock, PortInfo, Unit, UnitDescriptor, UnitSettings,
};
use crate::error::UnitError;

pub static TREMOLO_DESCRIPTOR: UnitDescriptor = UnitDescriptor {
    class_name: "Tremolo",
    display_name: "Tremolo",
    description: "Applies tremolo effect to input audio.",
    category: "Modulation",
    version: (1, 0),
    inputs: &[
        PortInfo::audio("in", "In Audio", "The audio input."),
        PortInfo::float("rate", "Rate", "Tremolo rate, in Hz.", 1.0),
        PortInfo::float("depth", "Depth", "Tremolo depth.", 1.0),
        PortInfo::float("makeup", "MakeupGain", "Makeup gain.", 1.0),
    ],
    outputs: &[PortInfo::audio("out", "Out Audio", "Output audio with tremolo applied.")],
};

const RATE: usize = 0;
const DEPTH: usize = 1;
const MAKEUP: usize = 2;

/// Amplitude modulation by a low frequency oscillator.
///
/// Per sample: step the oscillator, then
/// `out = in * (1 + osc * depth) * makeup`. Rate and depth changes keep the
/// oscillator phase; only `reset` rewinds it. Values are not clamped, so a
/// depth above 1 pushes the multiplier negative on the oscillator's troughs.
pub struct TremoloUnit {
    rate: ControlInput,
    depth: ControlInput,
    makeup: ControlInput,
    shape: LfoShape,
    lfo: Lfo,
    sample_rate: f32,
    out: OutputBlock,
}

impl TremoloUnit {
    pub fn new(settings: &UnitSettings) -> Self {
        let mut unit = Self {
            rate: ControlInput::new(1.0),
            depth: ControlInput::new(1.0),
            makeup: ControlInput::new(1.0),
            shape: LfoShape::Sine,
            lfo: Lfo::new(),
            sample_rate: settings.sample_rate,
            out: OutputBlock::default(),
        };
        unit.reset(settings);
        unit
    }

    pub fn with_rate(mut self, hz: f32) -> Self {
        self.rate.set(hz);
        self
    }

    pub fn with_depth(mut self, depth: f32) -> Self {
        self.depth.set(depth);
        self
    }

    pub fn with_makeup_gain(mut self, gain: f32) -> Self {
        self.makeup.set(gain);
        self
    }

    /// Replace the sine modulator with another waveform. Phase is kept.
    pub fn with_shape(mut self, shape: LfoShape) -> Self {
        self.shape = shape;
        self.rebuild_lfo();
        self
    }

    pub fn set_rate(&mut self, hz: f32) {
        self.rate.set(hz);
    }

    pub fn set_depth(&mut self, depth: f32) {
        self.depth.set(depth);
    }

    pub fn set_makeup_gain(&mut self, gain: f32) {
        self.makeup.set(gain);
    }

    pub fn lfo(&self) -> &Lfo {
        &self.lfo
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    fn input(&self, index: usize) -> &ControlInput {
        match index {
            RATE => &self.rate,
            DEPTH => &self.depth,
            _ => &self.makeup,
        }
    }

    fn input_mut(&mut self, index: usize) -> &mut ControlInput {
        match index {
            RATE => &mut self.rate,
            DEPTH => &mut self.depth,
            _ => &mut self.makeup,
        }
    }

    fn rebuild_lfo(&mut self) {
        self.lfo.use_settings(LfoSettings {
            shape: self.shape,
            frequency: self.rate.cached(),
            depth: self.depth.cached(),
            initial_phase: 0.0,
        });
    }
}

impl Unit for TremoloUnit {
    fn descriptor(&self) -> &'static UnitDescriptor {
        &TREMOLO_DESCRIPTOR
    }

    fn reset(&mut self, settings: &UnitSettings) {
        self.sample_rate = settings.sample_rate;
        self.rate.refresh();
        self.depth.refresh();
        self.lfo.prepare(self.sample_rate);
        self.rebuild_lfo();
        self.out.reset(settings.block_size);
    }

    fn set_control(&mut self, port: &str, value: f32) -> Result<(), UnitError> {
        let index = TREMOLO_DESCRIPTOR.control_index(port)?;
        self.input_mut(index).set(value);
        Ok(())
    }

    fn control(&self, port: &str) -> Result<f32, UnitError> {
        let index = TREMOLO_DESCRIPTOR.control_index(port)?;
        Ok(self.input(index).value())
    }

    fn execute(&mut self, inputs: &[&[f32]]) {
        let depth_changed = self.depth.refresh();
        let rate_changed = self.rate.refresh();
        if depth_changed || rate_changed {
            self.rebuild_lfo();
        }
        self.makeup.refresh();

        let depth = self.depth.cached();
        let makeup = self.makeup.cached();
        let input = audio_input(inputs, 0);
        let out = self.out.frames_mut(input.len());

        for (o, &x) in out.iter_mut().zip(input) {
            self.lfo.advance(1);
            let multiplier = 1.0 + self.lfo.value() * depth;
            *o = x * multiplier * makeup;
        }
    }

    fn output(&self, port: usize) -> &[f32] {
        debug_assert_eq!(port, 0, "Tremolo has a single output");
        self.out.as_slice()
    }
}
