pub mod devices;
pub mod dsp;
pub mod error;
pub mod graph;
pub mod registry;
pub mod render;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use gainstage_patch::{Assignment, PatchSpec};
use log::{error, info, warn};
use rtrb::{Consumer, Producer, RingBuffer};

use devices::pick_device;
use dsp::UnitSettings;
use graph::{resolve, Chain, ControlBus};
use registry::UnitKind;
use render::BlockProcessor;

pub use error::UnitError;

/// Block size used when the backend does not report a fixed buffer size.
const DEFAULT_BLOCK_SIZE: usize = 512;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub input_name: Option<String>,       // match by substring (case-insensitive)
    pub output_name: Option<String>,
    pub input_index: Option<usize>,       // explicit index from device list
    pub output_index: Option<usize>,
    pub sample_rate: Option<u32>,         // e.g., 48000
    pub block_size: Option<u32>,          // frames per buffer (if backend supports)
    pub patch: PatchSpec,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            input_name: None,
            output_name: None,
            input_index: None,
            output_index: None,
            sample_rate: None,
            block_size: None,
            patch: PatchSpec::default(),
        }
    }
}

/// Live host: input device -> chain -> output device.
pub struct Engine {
    input_stream: Option<cpal::Stream>,
    output_stream: Option<cpal::Stream>,
    cfg: EngineConfig,
    bus: ControlBus,
    kinds: Vec<UnitKind>,
    /// Processed blocks the input callback could not queue.
    dropped: Arc<AtomicUsize>,
}

impl Engine {
    pub fn new(cfg: EngineConfig) -> Self {
        Self {
            input_stream: None,
            output_stream: None,
            cfg,
            bus: ControlBus::new(),
            kinds: Vec::new(),
            dropped: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn is_running(&self) -> bool {
        self.output_stream.is_some()
    }

    /// Blocks dropped because the output side fell behind, since the last start.
    pub fn dropped_blocks(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Start the configured patch on input -> output.
    pub fn start(&mut self) -> Result<()> {
        let host = cpal::default_host();

        let cfg = &self.cfg;
        let in_dev = pick_device(&host, true, cfg.input_name.as_deref(), cfg.input_index)?
            .context("No input device matched (and no default available)")?;
        let out_dev = pick_device(&host, false, cfg.output_name.as_deref(), cfg.output_index)?
            .context("No output device matched (and no default available)")?;

        let in_cfg_any  = in_dev.default_input_config().context("No default input config")?;
        let out_cfg_any = out_dev.default_output_config().context("No default output config")?;

        let mut in_cfg  = in_cfg_any.config();
        let mut out_cfg = out_cfg_any.config();

        if let Some(sr) = self.cfg.sample_rate {
            in_cfg.sample_rate  = cpal::SampleRate(sr);
            out_cfg.sample_rate = cpal::SampleRate(sr);
        }
        if let Some(bs) = self.cfg.block_size {
            out_cfg.buffer_size = cpal::BufferSize::Fixed(bs);
            in_cfg.buffer_size  = cpal::BufferSize::Fixed(bs);
        }

        // Input runs with the output's layout so samples pass straight through.
        in_cfg.channels    = out_cfg.channels;
        in_cfg.sample_rate = out_cfg.sample_rate;

        let channels = out_cfg.channels as usize;
        let block_size = match out_cfg.buffer_size {
            cpal::BufferSize::Fixed(n) => n as usize,
            _ => DEFAULT_BLOCK_SIZE,
        };
        let settings = UnitSettings::new(out_cfg.sample_rate.0 as f32, block_size);

        let chain = Chain::from_patch(&self.cfg.patch, settings, channels)
            .context("Failed to build the processing chain")?;
        self.kinds = chain.kinds();
        info!(
            "running `{}` on {} ch @ {} Hz, block {}",
            self.cfg.patch, channels, settings.sample_rate, block_size
        );

        // Room for 8 blocks between the two callbacks.
        let cap = (block_size * channels * 8).max(1024);
        let (ring_tx, ring_rx) = RingBuffer::<f32>::new(cap);

        let processor = BlockProcessor::new(chain, self.bus.clone());
        let scratch = Vec::<f32>::with_capacity(cap);
        self.dropped.store(0, Ordering::Relaxed);
        let dropped = &self.dropped;

        /* --------- INPUT (format-specific) --------- */
        let input_stream = match in_cfg_any.sample_format() {
            cpal::SampleFormat::F32 => in_dev.build_input_stream::<f32, _, _>(
                &in_cfg,
                input_callback(processor, scratch, ring_tx, dropped.clone(), |s: f32| s),
                |err| error!("input stream error: {err}"),
                None,
            )?,
            cpal::SampleFormat::I16 => in_dev.build_input_stream::<i16, _, _>(
                &in_cfg,
                input_callback(processor, scratch, ring_tx, dropped.clone(), |s: i16| {
                    s as f32 / 32768.0
                }),
                |err| error!("input stream error: {err}"),
                None,
            )?,
            cpal::SampleFormat::U16 => in_dev.build_input_stream::<u16, _, _>(
                &in_cfg,
                input_callback(processor, scratch, ring_tx, dropped.clone(), |s: u16| {
                    ((s as f32 / 65535.0) * 2.0) - 1.0
                }),
                |err| error!("input stream error: {err}"),
                None,
            )?,
            other => return Err(anyhow!("Unsupported input format: {other:?}")),
        };

        /* --------- OUTPUT (format-specific) -------- */
        let output_stream = match out_cfg_any.sample_format() {
            cpal::SampleFormat::F32 => out_dev.build_output_stream::<f32, _, _>(
                &out_cfg,
                output_callback(ring_rx, cap, 0.0, |v: f32| v),
                |err| error!("output stream error: {err}"),
                None,
            )?,
            cpal::SampleFormat::I16 => out_dev.build_output_stream::<i16, _, _>(
                &out_cfg,
                output_callback(ring_rx, cap, 0, |v: f32| (v.clamp(-1.0, 1.0) * 32767.0) as i16),
                |err| error!("output stream error: {err}"),
                None,
            )?,
            cpal::SampleFormat::U16 => out_dev.build_output_stream::<u16, _, _>(
                &out_cfg,
                output_callback(ring_rx, cap, 32768, |v: f32| {
                    (((v.clamp(-1.0, 1.0) + 1.0) * 0.5) * 65535.0) as u16
                }),
                |err| error!("output stream error: {err}"),
                None,
            )?,
            other => return Err(anyhow!("Unsupported output format: {other:?}")),
        };

        input_stream.play().context("Failed to play input stream")?;
        output_stream.play().context("Failed to play output stream")?;

        self.input_stream  = Some(input_stream);
        self.output_stream = Some(output_stream);
        Ok(())
    }

    /// Queue a live control change for the running chain.
    pub fn set(&self, assignment: &Assignment) -> Result<(), UnitError> {
        let changes = resolve(&self.kinds, assignment)?;
        self.bus.send_all(changes);
        Ok(())
    }

    pub fn stop(&mut self) {
        if self.is_running() {
            info!("stopping streams");
            let dropped = self.dropped_blocks();
            if dropped > 0 {
                warn!("{dropped} processed block(s) dropped, output could not keep up");
            }
        }
        self.input_stream  = None;
        self.output_stream = None;
    }
}

/// Convert -> process -> push. Allocation-free once `scratch` has grown to the
/// callback size, which `with_capacity` covers for every block up to the ring size.
fn input_callback<T: Copy + 'static>(
    mut processor: BlockProcessor,
    mut scratch: Vec<f32>,
    mut ring: Producer<f32>,
    dropped: Arc<AtomicUsize>,
    convert: impl Fn(T) -> f32 + Send + 'static,
) -> impl FnMut(&[T], &cpal::InputCallbackInfo) + Send + 'static {
    move |data: &[T], _| {
        scratch.clear();
        scratch.extend(data.iter().map(|&s| convert(s)));
        processor.process_interleaved(&mut scratch);
        queue_block(&mut ring, &scratch, &dropped);
    }
}

/// Pop -> convert. Writes `silence` when not enough processed audio is queued.
fn output_callback<T: Copy + Send + 'static>(
    mut ring: Consumer<f32>,
    cap: usize,
    silence: T,
    convert: impl Fn(f32) -> T + Send + 'static,
) -> impl FnMut(&mut [T], &cpal::OutputCallbackInfo) + Send + 'static {
    let mut tmp = vec![0.0f32; cap];
    move |out: &mut [T], _| {
        if out.len() > tmp.len() {
            out.fill(silence);
            return;
        }
        let tmp = &mut tmp[..out.len()];
        if pop_into(&mut ring, tmp) {
            for (o, &v) in out.iter_mut().zip(tmp.iter()) {
                *o = convert(v);
            }
        } else {
            out.fill(silence);
        }
    }
}

/// Push a processed block, or count it as dropped when the ring is full.
/// Never logs; `Engine::stop` reports the count.
fn queue_block(ring: &mut Producer<f32>, data: &[f32], dropped: &AtomicUsize) {
    if !push_slice(ring, data) {
        dropped.fetch_add(1, Ordering::Relaxed);
    }
}

/// Push the whole slice or nothing.
fn push_slice(ring: &mut Producer<f32>, data: &[f32]) -> bool {
    let Ok(mut chunk) = ring.write_chunk(data.len()) else {
        return false;
    };
    let (first, second) = chunk.as_mut_slices();
    let (head, tail) = data.split_at(first.len());
    first.copy_from_slice(head);
    second.copy_from_slice(tail);
    chunk.commit_all();
    true
}

/// Fill `out` completely or leave the ring untouched.
fn pop_into(ring: &mut Consumer<f32>, out: &mut [f32]) -> bool {
    let Ok(chunk) = ring.read_chunk(out.len()) else {
        return false;
    };
    let (first, second) = chunk.as_slices();
    out[..first.len()].copy_from_slice(first);
    out[first.len()..].copy_from_slice(second);
    chunk.commit_all();
    true
}
