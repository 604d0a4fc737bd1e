//! Low frequency oscillator used as a modulation source.

/*
Phase model
===========

The oscillator keeps a normalized phase in [0, 1). Each call to `advance`
adds `frequency / sample_rate` per frame and wraps. `value` reads the
waveform at the current phase without moving it, so a caller that wants
"step then read" calls `advance(1)` followed by `value()`.

Two ways to change the oscillator, and they must not be confused:

  use_settings    New frequency/depth/shape. Phase is kept, so the waveform
                  continues from where it was. Changing the rate mid-stream
                  does not click.

  prepare         New sample rate. Phase goes back to `initial_phase`.
                  Only for graph (re)initialization.

At 0 Hz the phase never moves and the output is constant. So does a
non-finite frequency; the phase holds and picks up again once the
frequency is finite.
*/

use std::f32::consts::TAU;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LfoShape {
    #[default]
    Sine,
    /// Starts at 0, peaks at phase 0.25, troughs at 0.75.
    Triangle,
    /// +1 for the first half of the cycle, -1 for the second.
    Square,
    /// Rising ramp from -1 to +1.
    Saw,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LfoSettings {
    pub shape: LfoShape,
    /// Hz. Negative values run the phase backwards.
    pub frequency: f32,
    /// Stored for the consumer; `Lfo::value` is always full scale.
    pub depth: f32,
    /// Phase `prepare` and `retrigger` jump to, in cycles.
    pub initial_phase: f32,
}

impl Default for LfoSettings {
    fn default() -> Self {
        Self {
            shape: LfoShape::Sine,
            frequency: 1.0,
            depth: 1.0,
            initial_phase: 0.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Lfo {
    settings: LfoSettings,
    sample_rate: f32,
    phase: f32,
    increment: f32,
}

impl Default for Lfo {
    fn default() -> Self {
        Self::new()
    }
}

impl Lfo {
    /// An unprepared oscillator: phase 0 and no sample rate, so it does not move.
    pub fn new() -> Self {
        Self {
            settings: LfoSettings::default(),
            sample_rate: 0.0,
            phase: 0.0,
            increment: 0.0,
        }
    }

    pub fn prepare(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        self.phase = wrap(self.settings.initial_phase);
        self.update_increment();
    }

    /// Swap in new settings without touching the phase.
    pub fn use_settings(&mut self, settings: LfoSettings) {
        self.settings = settings;
        self.update_increment();
    }

    pub fn retrigger(&mut self) {
        self.phase = wrap(self.settings.initial_phase);
    }

    #[inline]
    pub fn advance(&mut self, frames: u32) {
        for _ in 0..frames {
            self.phase = wrap(self.phase + self.increment);
        }
    }

    /// Waveform at the current phase, in [-1, 1].
    #[inline]
    pub fn value(&self) -> f32 {
        shape_at(self.settings.shape, self.phase)
    }

    pub fn phase(&self) -> f32 {
        self.phase
    }

    pub fn settings(&self) -> &LfoSettings {
        &self.settings
    }

    pub fn frequency(&self) -> f32 {
        self.settings.frequency
    }

    pub fn depth(&self) -> f32 {
        self.settings.depth
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    fn update_increment(&mut self) {
        let increment = if self.sample_rate > 0.0 {
            self.settings.frequency / self.sample_rate
        } else {
            0.0
        };
        // A non-finite step would leave the phase NaN for good.
        self.increment = if increment.is_finite() { increment } else { 0.0 };
    }
}

#[inline]
fn wrap(phase: f32) -> f32 {
    if !phase.is_finite() {
        return 0.0;
    }
    let wrapped = phase - phase.floor();
    // `x - floor(x)` rounds up to 1.0 for tiny negative x.
    if wrapped >= 1.0 {
        0.0
    } else {
        wrapped
    }
}

#[inline]
fn shape_at(shape: LfoShape, phase: f32) -> f32 {
    match shape {
        LfoShape::Sine => (TAU * phase).sin(),
        LfoShape::Triangle => {
            if phase < 0.25 {
                4.0 * phase
            } else if phase < 0.75 {
                2.0 - 4.0 * phase
            } else {
                4.0 * phase - 4.0
            }
        }
        LfoShape::Square => {
            if phase < 0.5 {
                1.0
            } else {
                -1.0
            }
        }
        LfoShape::Saw => 2.0 * phase - 1.0,
    }
}
