use crate::error::UnitError;

/// Settings a host hands to a unit at construction and on every reset.
/// Both values stay fixed until the next reset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnitSettings {
    pub sample_rate: f32,
    /// Frames per block; output blocks are allocated with this capacity.
    pub block_size: usize,
}

impl Default for UnitSettings {
    fn default() -> Self {
        Self { sample_rate: 48_000.0, block_size: 512 }
    }
}

impl UnitSettings {
    pub fn new(sample_rate: f32, block_size: usize) -> Self {
        Self { sample_rate, block_size }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortKind {
    /// One block of samples.
    Audio,
    /// Block-constant scalar.
    Float,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PortInfo {
    /// Short identifier used by patches and the CLI (`gain`, `rate`, ...).
    pub key: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub kind: PortKind,
    pub default: Option<f32>,
}

impl PortInfo {
    pub const fn audio(key: &'static str, name: &'static str, description: &'static str) -> Self {
        Self { key, name, description, kind: PortKind::Audio, default: None }
    }

    pub const fn float(
        key: &'static str,
        name: &'static str,
        description: &'static str,
        default: f32,
    ) -> Self {
        Self { key, name, description, kind: PortKind::Float, default: Some(default) }
    }

    /// Matches the key exactly, or the display name ignoring case, spaces and underscores.
    pub fn matches(&self, query: &str) -> bool {
        if self.key == query {
            return true;
        }
        let wanted = query.chars().filter(|c| *c != ' ' && *c != '_');
        let name = self.name.chars().filter(|c| *c != ' ' && *c != '_');
        wanted
            .map(|c| c.to_ascii_lowercase())
            .eq(name.map(|c| c.to_ascii_lowercase()))
    }
}

/// Static metadata a host uses to wire a unit into its graph.
#[derive(Debug)]
pub struct UnitDescriptor {
    pub class_name: &'static str,
    pub display_name: &'static str,
    pub description: &'static str,
    pub category: &'static str,
    pub version: (u32, u32),
    pub inputs: &'static [PortInfo],
    pub outputs: &'static [PortInfo],
}

impl UnitDescriptor {
    pub fn audio_inputs(&self) -> impl Iterator<Item = &PortInfo> {
        self.inputs.iter().filter(|p| p.kind == PortKind::Audio)
    }

    pub fn controls(&self) -> impl Iterator<Item = &PortInfo> {
        self.inputs.iter().filter(|p| p.kind == PortKind::Float)
    }

    pub fn num_audio_inputs(&self) -> usize {
        self.audio_inputs().count()
    }

    pub fn num_audio_outputs(&self) -> usize {
        self.outputs.iter().filter(|p| p.kind == PortKind::Audio).count()
    }

    /// Position of a scalar input among the unit's scalar inputs.
    pub fn control_index(&self, query: &str) -> Result<usize, UnitError> {
        self.controls()
            .position(|p| p.matches(query))
            .ok_or_else(|| UnitError::UnknownPort {
                unit: self.class_name,
                port: query.to_string(),
            })
    }
}

/// A scalar input bound by the host plus the value the unit last acted on.
///
/// The host writes `value` whenever it likes; the unit compares it against
/// `cached` once at the top of each block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlInput {
    value: f32,
    cached: f32,
}

impl ControlInput {
    pub fn new(default: f32) -> Self {
        Self { value: default, cached: default }
    }

    pub fn set(&mut self, value: f32) {
        self.value = value;
    }

    pub fn value(&self) -> f32 {
        self.value
    }

    pub fn cached(&self) -> f32 {
        self.cached
    }

    /// Latch the bound value into the cache. Returns true if it differed.
    pub fn refresh(&mut self) -> bool {
        // NaN never compares equal, so a NaN input counts as changed every block.
        if self.value != self.cached {
            self.cached = self.value;
            true
        } else {
            false
        }
    }
}

/// Lifecycle contract between a unit and its host.
///
/// - `reset` runs at graph build/rebuild time and may allocate.
/// - `execute` runs on the audio thread and must not allocate, lock or block.
/// - `inputs[i]` is the i-th audio input port in descriptor order. Outputs
///   are owned by the unit and read back with `output`.
pub trait Unit: Send {
    fn descriptor(&self) -> &'static UnitDescriptor;

    fn reset(&mut self, settings: &UnitSettings);

    /// Bind a scalar input. The new value is picked up by the next `execute`.
    fn set_control(&mut self, port: &str, value: f32) -> Result<(), UnitError>;

    /// Currently bound value of a scalar input.
    fn control(&self, port: &str) -> Result<f32, UnitError>;

    fn execute(&mut self, inputs: &[&[f32]]);

    /// Output block `port` as produced by the last `execute`.
    fn output(&self, port: usize) -> &[f32];
}

/// Fixed-capacity output block. Capacity is set at reset; `execute` only
/// changes the visible length.
#[derive(Debug, Clone, Default)]
pub(crate) struct OutputBlock {
    data: Vec<f32>,
    frames: usize,
}

impl OutputBlock {
    /// Reallocate to `block_size` if needed and zero the whole block. The
    /// zeroed block stays visible until the next `frames_mut`.
    pub(crate) fn reset(&mut self, block_size: usize) {
        if self.data.len() != block_size {
            self.data = vec![0.0; block_size];
        } else {
            self.data.fill(0.0);
        }
        self.frames = block_size;
    }

    pub(crate) fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Mutable view of the first `frames` samples; sets the visible length.
    ///
    /// Release builds clamp an oversized request to the capacity, so the unit
    /// produces only `capacity()` samples. `Chain::process` silences the rest.
    pub(crate) fn frames_mut(&mut self, frames: usize) -> &mut [f32] {
        debug_assert!(
            frames <= self.capacity(),
            "block of {frames} frames exceeds allocated block size {}",
            self.capacity()
        );
        let frames = frames.min(self.capacity());
        self.frames = frames;
        &mut self.data[..frames]
    }

    pub(crate) fn as_slice(&self) -> &[f32] {
        &self.data[..self.frames]
    }
}

/// Audio input `index`, or an empty block when the host did not supply one.
pub(crate) fn audio_input<'a>(inputs: &[&'a [f32]], index: usize) -> &'a [f32] {
    debug_assert!(index < inputs.len(), "audio input {index} not bound");
    inputs.get(index).copied().unwrap_or(&[])
}
