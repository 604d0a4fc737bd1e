use std::f32::consts::TAU;

use gainstage_patch::PatchSpec;
use log::info;

use crate::dsp::UnitSettings;
use crate::error::UnitError;
use crate::graph::{Chain, ControlBus};

/// Runs a `Chain` over interleaved buffers of any length by splitting them
/// into `block_size` frame chunks. Shared by the live engine and offline rendering.
pub struct BlockProcessor {
    chain: Chain,
    bus: ControlBus,
    planar: Vec<Vec<f32>>,
}

impl BlockProcessor {
    pub fn new(chain: Chain, bus: ControlBus) -> Self {
        let planar = vec![vec![0.0; chain.settings().block_size]; chain.channels()];
        Self { chain, bus, planar }
    }

    pub fn chain(&self) -> &Chain {
        &self.chain
    }

    pub fn channels(&self) -> usize {
        self.chain.channels()
    }

    /// Process interleaved samples in place. Trailing samples that do not
    /// form a whole frame are left untouched.
    pub fn process_interleaved(&mut self, data: &mut [f32]) {
        self.bus.drain_into(&mut self.chain);

        let channels = self.chain.channels();
        let block_size = self.chain.settings().block_size;
        if channels == 0 || block_size == 0 {
            return;
        }

        for chunk in data.chunks_mut(block_size * channels) {
            let frames = chunk.len() / channels;
            for (f, frame) in chunk.chunks_exact(channels).enumerate() {
                for (c, &s) in frame.iter().enumerate() {
                    self.planar[c][f] = s;
                }
            }
            self.chain.process(&mut self.planar, frames);
            for (f, frame) in chunk.chunks_exact_mut(channels).enumerate() {
                for (c, s) in frame.iter_mut().enumerate() {
                    *s = self.planar[c][f];
                }
            }
        }
    }
}

/// Level of one rendered block, across all channels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlockStats {
    pub peak: f32,
    pub rms: f32,
}

impl BlockStats {
    pub fn measure(samples: &[f32]) -> Self {
        if samples.is_empty() {
            return Self { peak: 0.0, rms: 0.0 };
        }
        let peak = samples.iter().fold(0.0f32, |m, s| m.max(s.abs()));
        let sum_sq: f32 = samples.iter().map(|s| s * s).sum();
        Self { peak, rms: (sum_sq / samples.len() as f32).sqrt() }
    }
}

#[derive(Debug, Clone)]
pub struct RenderConfig {
    pub settings: UnitSettings,
    pub channels: usize,
    pub blocks: usize,
    /// Frequency of the full-scale sine fed into the chain.
    pub tone_hz: f32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            settings: UnitSettings::default(),
            channels: 2,
            blocks: 16,
            tone_hz: 440.0,
        }
    }
}

/// Fill an interleaved buffer with the same sine on every channel, continuing
/// from frame `start`.
pub fn test_tone(out: &mut [f32], channels: usize, start: usize, tone_hz: f32, sample_rate: f32) {
    if channels == 0 || sample_rate <= 0.0 {
        out.fill(0.0);
        return;
    }
    for (f, frame) in out.chunks_mut(channels).enumerate() {
        let t = (start + f) as f32 / sample_rate;
        frame.fill((TAU * tone_hz * t).sin());
    }
}

/// Run `patch` over a test tone without any audio device.
pub fn render_offline(patch: &PatchSpec, cfg: &RenderConfig) -> Result<Vec<BlockStats>, UnitError> {
    let chain = Chain::from_patch(patch, cfg.settings, cfg.channels)?;
    info!(
        "offline render: `{patch}` at {} Hz, {} ch, {} x {} frames",
        cfg.settings.sample_rate, cfg.channels, cfg.blocks, cfg.settings.block_size
    );

    let mut processor = BlockProcessor::new(chain, ControlBus::new());
    let block_samples = cfg.settings.block_size * cfg.channels;
    let mut buffer = vec![0.0; block_samples];
    let mut stats = Vec::with_capacity(cfg.blocks);

    for block in 0..cfg.blocks {
        test_tone(
            &mut buffer,
            cfg.channels,
            block * cfg.settings.block_size,
            cfg.tone_hz,
            cfg.settings.sample_rate,
        );
        processor.process_interleaved(&mut buffer);
        stats.push(BlockStats::measure(&buffer));
    }
    Ok(stats)
}
