use std::sync::Arc;

use gainstage_patch::{Assignment, PatchSpec};
use log::debug;
use parking_lot::Mutex;

use crate::dsp::{Unit, UnitSettings};
use crate::error::UnitError;
use crate::registry::UnitKind;

/// Widest unit in the registry (stereo gain).
const MAX_UNIT_CHANNELS: usize = 2;

/// One position in the chain. Mono units get one instance per channel,
/// stereo units one instance per consecutive channel pair.
struct Stage {
    kind: UnitKind,
    instances: Vec<Box<dyn Unit>>,
}

/// A serial chain of units over deinterleaved channels. Owns the units.
pub struct Chain {
    stages: Vec<Stage>,
    channels: usize,
    settings: UnitSettings,
}

impl Chain {
    pub fn new(settings: UnitSettings, channels: usize) -> Self {
        Self { stages: Vec::new(), channels, settings }
    }

    /// Build every stage of `patch` and bind its controls.
    pub fn from_patch(
        patch: &PatchSpec,
        settings: UnitSettings,
        channels: usize,
    ) -> Result<Self, UnitError> {
        let mut chain = Self::new(settings, channels);
        for spec in &patch.stages {
            let kind = UnitKind::lookup(&spec.unit)?;
            let stage = chain.push(kind)?;
            for control in &spec.controls {
                chain.set_control(stage, &control.key, control.value)?;
            }
        }
        Ok(chain)
    }

    /// Append a unit, returning its stage index.
    pub fn push(&mut self, kind: UnitKind) -> Result<usize, UnitError> {
        let needed = kind.channels();
        debug_assert!(needed <= MAX_UNIT_CHANNELS);
        debug_assert_eq!(kind.descriptor().num_audio_outputs(), needed);
        if self.channels == 0 || self.channels % needed != 0 {
            return Err(UnitError::ChannelLayout {
                unit: kind.descriptor().class_name,
                needed,
                channels: self.channels,
            });
        }

        let instances = (0..self.channels / needed)
            .map(|_| kind.create(&self.settings))
            .collect();
        self.stages.push(Stage { kind, instances });
        debug!("chain stage {} = {kind} x{}", self.stages.len() - 1, self.channels / needed);
        Ok(self.stages.len() - 1)
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn settings(&self) -> &UnitSettings {
        &self.settings
    }

    pub fn kinds(&self) -> Vec<UnitKind> {
        self.stages.iter().map(|s| s.kind).collect()
    }

    /// Re-initialize every unit, e.g. after a sample rate or block size change.
    pub fn reset(&mut self, settings: &UnitSettings) {
        self.settings = *settings;
        for unit in self.stages.iter_mut().flat_map(|s| s.instances.iter_mut()) {
            unit.reset(settings);
        }
    }

    /// Bind a scalar input on every instance of one stage.
    pub fn set_control(&mut self, stage: usize, port: &str, value: f32) -> Result<(), UnitError> {
        let stage = self.stages.get_mut(stage).ok_or(UnitError::NoSuchStage(stage))?;
        for unit in stage.instances.iter_mut() {
            unit.set_control(port, value)?;
        }
        Ok(())
    }

    /// Bound value of a scalar input. All instances of a stage share it.
    pub fn control(&self, stage: usize, port: &str) -> Result<f32, UnitError> {
        self.stages
            .get(stage)
            .and_then(|s| s.instances.first())
            .ok_or(UnitError::NoSuchStage(stage))?
            .control(port)
    }

    /// Apply a live edit. Without a stage index it goes to every stage that has the port.
    pub fn apply(&mut self, assignment: &Assignment) -> Result<(), UnitError> {
        for change in resolve(&self.kinds(), assignment)? {
            self.set_control(change.stage, change.port, change.value)?;
        }
        Ok(())
    }

    /// Run one block through every stage, in place.
    ///
    /// `channels[c][..frames]` is channel `c`'s input on entry and its output on return.
    /// Frames a unit did not produce (a block longer than `block_size` in
    /// release builds) come back as silence rather than dry input.
    pub fn process(&mut self, channels: &mut [Vec<f32>], frames: usize) {
        debug_assert_eq!(channels.len(), self.channels, "channel count changed under the chain");

        for stage in self.stages.iter_mut() {
            let needed = stage.kind.channels();
            for (group, unit) in stage.instances.iter_mut().enumerate() {
                let base = group * needed;
                if base + needed > channels.len() {
                    break;
                }

                let mut inputs: [&[f32]; MAX_UNIT_CHANNELS] = [&[]; MAX_UNIT_CHANNELS];
                for (c, input) in inputs.iter_mut().enumerate().take(needed) {
                    let ch = &channels[base + c];
                    *input = &ch[..frames.min(ch.len())];
                }
                unit.execute(&inputs[..needed]);

                for c in 0..needed {
                    let out = unit.output(c);
                    let ch = &mut channels[base + c];
                    let end = frames.min(ch.len());
                    let n = out.len().min(end);
                    ch[..n].copy_from_slice(&out[..n]);
                    ch[n..end].fill(0.0);
                }
            }
        }
    }
}

/// A control change resolved to a stage index and a static port key, so it
/// can cross to the audio thread without owning any heap memory.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlChange {
    pub stage: usize,
    pub port: &'static str,
    pub value: f32,
}

/// Resolve a live edit against the stage kinds of a chain.
pub fn resolve(
    kinds: &[UnitKind],
    assignment: &Assignment,
) -> Result<Vec<ControlChange>, UnitError> {
    let port_on = |stage: usize| -> Result<&'static str, UnitError> {
        let kind = kinds.get(stage).ok_or(UnitError::NoSuchStage(stage))?;
        let d = kind.descriptor();
        let index = d.control_index(&assignment.key)?;
        Ok(d.controls().nth(index).map(|p| p.key).unwrap_or_default())
    };

    match assignment.stage {
        Some(stage) => Ok(vec![ControlChange {
            stage,
            port: port_on(stage)?,
            value: assignment.value,
        }]),
        None => {
            let changes: Vec<_> = (0..kinds.len())
                .filter_map(|stage| port_on(stage).ok().map(|port| (stage, port)))
                .map(|(stage, port)| ControlChange { stage, port, value: assignment.value })
                .collect();
            if changes.is_empty() {
                return Err(UnitError::UnmatchedControl(assignment.key.clone()));
            }
            Ok(changes)
        }
    }
}

/// Hands control changes from a control thread to the audio thread.
///
/// The audio side only ever calls `try_lock`; if the control thread happens
/// to hold the lock, the changes land one block later.
#[derive(Clone, Default)]
pub struct ControlBus {
    pending: Arc<Mutex<Vec<ControlChange>>>,
}

impl ControlBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn send(&self, change: ControlChange) {
        self.pending.lock().push(change);
    }

    pub fn send_all(&self, changes: impl IntoIterator<Item = ControlChange>) {
        self.pending.lock().extend(changes);
    }

    /// Apply whatever is pending. Returns the number of changes applied.
    pub fn drain_into(&self, chain: &mut Chain) -> usize {
        let Some(mut pending) = self.pending.try_lock() else {
            return 0;
        };
        let mut applied = 0;
        for change in pending.drain(..) {
            if chain.set_control(change.stage, change.port, change.value).is_ok() {
                applied += 1;
            }
        }
        applied
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gainstage_patch::parse_patch;

    fn settings(block_size: usize) -> UnitSettings {
        UnitSettings::new(48_000.0, block_size)
    }

    #[test]
    fn mono_units_run_per_channel() {
        let patch = parse_patch("gain gain=2").unwrap();
        let mut chain = Chain::from_patch(&patch, settings(2), 2).unwrap();
        let mut channels = vec![vec![1.0, 0.5], vec![-1.0, 0.25]];
        chain.process(&mut channels, 2);
        assert_eq!(channels, vec![vec![2.0, 1.0], vec![-2.0, 0.5]]);
    }

    #[test]
    fn stages_run_in_order() {
        let patch = parse_patch("gain gain=0.5 | stereo_gain gain=-4").unwrap();
        let mut chain = Chain::from_patch(&patch, settings(1), 2).unwrap();
        let mut channels = vec![vec![1.0], vec![0.5]];
        chain.process(&mut channels, 1);
        assert_eq!(channels, vec![vec![-2.0], vec![-1.0]]);
    }

    #[test]
    fn stereo_unit_rejects_odd_channel_count() {
        let mut chain = Chain::new(settings(4), 1);
        assert_eq!(
            chain.push(UnitKind::StereoGain),
            Err(UnitError::ChannelLayout { unit: "StereoGain", needed: 2, channels: 1 })
        );
        assert!(chain.is_empty());
    }

    #[test]
    fn unknown_unit_and_port_fail_the_build() {
        let bad_unit = parse_patch("flanger").unwrap();
        assert!(matches!(
            Chain::from_patch(&bad_unit, settings(4), 1),
            Err(UnitError::UnknownUnit(_))
        ));
        let bad_port = parse_patch("gain rate=2").unwrap();
        assert!(matches!(
            Chain::from_patch(&bad_port, settings(4), 1),
            Err(UnitError::UnknownPort { .. })
        ));
    }

    #[test]
    fn unstaged_assignment_reaches_every_matching_stage() {
        let patch = parse_patch("gain | tremolo | gain").unwrap();
        let mut chain = Chain::from_patch(&patch, settings(4), 1).unwrap();
        chain.apply(&Assignment { stage: None, key: "gain".into(), value: 0.3 }).unwrap();
        assert_eq!(chain.control(0, "gain").unwrap(), 0.3);
        assert_eq!(chain.control(2, "gain").unwrap(), 0.3);
        assert_eq!(chain.control(1, "makeup").unwrap(), 1.0);

        assert_eq!(
            chain.apply(&Assignment { stage: None, key: "feedback".into(), value: 1.0 }),
            Err(UnitError::UnmatchedControl("feedback".into()))
        );
    }

    #[test]
    fn staged_assignment_hits_one_stage() {
        let patch = parse_patch("gain | gain").unwrap();
        let mut chain = Chain::from_patch(&patch, settings(4), 1).unwrap();
        chain.apply(&Assignment { stage: Some(1), key: "Gain Level".into(), value: 0.1 }).unwrap();
        assert_eq!(chain.control(0, "gain").unwrap(), 1.0);
        assert_eq!(chain.control(1, "gain").unwrap(), 0.1);
        assert!(matches!(
            chain.apply(&Assignment { stage: Some(5), key: "gain".into(), value: 0.1 }),
            Err(UnitError::NoSuchStage(5))
        ));
    }

    #[test]
    fn resolve_uses_static_port_keys() {
        let kinds = [UnitKind::Tremolo];
        let changes = resolve(
            &kinds,
            &Assignment { stage: None, key: "MakeupGain".into(), value: 2.0 },
        )
        .unwrap();
        assert_eq!(changes, vec![ControlChange { stage: 0, port: "makeup", value: 2.0 }]);
    }

    #[test]
    fn control_bus_delivers_to_chain() {
        let patch = parse_patch("tremolo").unwrap();
        let mut chain = Chain::from_patch(&patch, settings(4), 2).unwrap();
        let bus = ControlBus::new();
        bus.send(ControlChange { stage: 0, port: "rate", value: 5.0 });
        bus.send_all([ControlChange { stage: 0, port: "depth", value: 0.5 }]);

        assert_eq!(bus.drain_into(&mut chain), 2);
        assert_eq!(chain.control(0, "rate").unwrap(), 5.0);
        assert_eq!(chain.control(0, "depth").unwrap(), 0.5);
        assert_eq!(bus.drain_into(&mut chain), 0);
    }

    #[test]
    fn control_bus_skips_when_locked() {
        let mut chain = Chain::from_patch(&parse_patch("gain").unwrap(), settings(4), 1).unwrap();
        let bus = ControlBus::new();
        bus.send(ControlChange { stage: 0, port: "gain", value: 0.0 });

        let guard = bus.pending.lock();
        assert_eq!(bus.drain_into(&mut chain), 0);
        drop(guard);
        assert_eq!(bus.drain_into(&mut chain), 1);
    }

    #[test]
    #[cfg(not(debug_assertions))]
    fn frames_past_block_size_are_silenced() {
        let patch = parse_patch("gain gain=2").unwrap();
        let mut chain = Chain::from_patch(&patch, settings(2), 1).unwrap();
        let mut channels = vec![vec![1.0; 4]];
        chain.process(&mut channels, 4);
        assert_eq!(channels, vec![vec![2.0, 2.0, 0.0, 0.0]]);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "exceeds allocated block size")]
    fn frames_past_block_size_assert_in_debug() {
        let mut chain = Chain::from_patch(&parse_patch("gain").unwrap(), settings(2), 1).unwrap();
        let mut channels = vec![vec![1.0; 4]];
        chain.process(&mut channels, 4);
    }

    #[test]
    fn reset_rewinds_every_instance() {
        let patch = parse_patch("tremolo rate=1000").unwrap();
        let mut chain = Chain::from_patch(&patch, settings(8), 1).unwrap();
        let mut first = vec![vec![1.0; 8]];
        chain.process(&mut first, 8);

        chain.reset(&settings(8));
        let mut second = vec![vec![1.0; 8]];
        chain.process(&mut second, 8);

        let mut fresh = Chain::from_patch(&patch, settings(8), 1).unwrap();
        let mut expected = vec![vec![1.0; 8]];
        fresh.process(&mut expected, 8);
        assert_eq!(second, expected);
    }
}
