//! Parser for one-line patch descriptions.
//!
//! A patch is a serial list of stages separated by `|`. Each stage names a
//! unit and optionally sets some of its scalar inputs:
//!
//! ```text
//! gain gain=0.5 | tremolo rate=4 depth=0.6 makeup=1.2
//! ```
//!
//! Unit names and control keys are not validated here; the engine resolves
//! them against its unit registry.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum PatchError {
    #[error("patch is empty")]
    Empty,
    #[error("empty stage at column {column}")]
    EmptyStage { column: usize },
    #[error("expected `key=value` at column {column}, found `{token}`")]
    ExpectedAssignment { token: String, column: usize },
    #[error("`{key}` has no value (column {column})")]
    MissingValue { key: String, column: usize },
    #[error("`{value}` is not a number (column {column})")]
    BadNumber { value: String, column: usize },
    #[error("`{key}` is set twice in stage `{unit}` (column {column})")]
    DuplicateKey {
        unit: String,
        key: String,
        column: usize,
    },
    #[error("`{index}` is not a stage index (column {column})")]
    BadStageIndex { index: String, column: usize },
}

/// One `key=value` pair.
#[derive(Debug, Clone, PartialEq)]
pub struct Control {
    pub key: String,
    pub value: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StageSpec {
    pub unit: String,
    pub controls: Vec<Control>,
}

impl StageSpec {
    pub fn new(unit: impl Into<String>) -> Self {
        Self { unit: unit.into(), controls: Vec::new() }
    }

    pub fn with(mut self, key: impl Into<String>, value: f32) -> Self {
        self.controls.push(Control { key: key.into(), value });
        self
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PatchSpec {
    pub stages: Vec<StageSpec>,
}

impl PatchSpec {
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

/// A control change aimed at one stage, or at every stage with that key.
///
/// Written as `rate=5` or `1.rate=5` (stage indices are 0-based).
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub stage: Option<usize>,
    pub key: String,
    pub value: f32,
}

/// Parse a full patch line.
pub fn parse_patch(src: &str) -> Result<PatchSpec, PatchError> {
    if src.trim().is_empty() {
        return Err(PatchError::Empty);
    }

    let mut stages = Vec::new();
    let mut offset = 0usize;
    for part in src.split('|') {
        stages.push(parse_stage(part, offset)?);
        offset += part.len() + 1;
    }
    Ok(PatchSpec { stages })
}

/// Parse a single live edit such as `depth=0.3` or `0.depth=0.3`.
pub fn parse_assignment(src: &str) -> Result<Assignment, PatchError> {
    let trimmed = src.trim();
    if trimmed.is_empty() {
        return Err(PatchError::Empty);
    }
    let column = src.len() - src.trim_start().len() + 1;
    let control = parse_control(trimmed, column)?;

    match control.key.split_once('.') {
        Some((index, key)) => {
            let stage = index.parse::<usize>().map_err(|_| PatchError::BadStageIndex {
                index: index.to_string(),
                column,
            })?;
            Ok(Assignment { stage: Some(stage), key: key.to_string(), value: control.value })
        }
        None => Ok(Assignment { stage: None, key: control.key, value: control.value }),
    }
}

fn parse_stage(part: &str, offset: usize) -> Result<StageSpec, PatchError> {
    let mut tokens = tokens(part, offset);
    let Some((unit, _)) = tokens.next() else {
        return Err(PatchError::EmptyStage { column: offset + 1 });
    };

    let mut stage = StageSpec::new(unit);
    for (token, column) in tokens {
        let control = parse_control(token, column)?;
        if stage.controls.iter().any(|c| c.key == control.key) {
            return Err(PatchError::DuplicateKey {
                unit: stage.unit,
                key: control.key,
                column,
            });
        }
        stage.controls.push(control);
    }
    Ok(stage)
}

fn parse_control(token: &str, column: usize) -> Result<Control, PatchError> {
    let Some((key, value)) = token.split_once('=') else {
        return Err(PatchError::ExpectedAssignment { token: token.to_string(), column });
    };
    if key.is_empty() {
        return Err(PatchError::ExpectedAssignment { token: token.to_string(), column });
    }
    if value.is_empty() {
        return Err(PatchError::MissingValue { key: key.to_string(), column });
    }
    let value = value.parse::<f32>().map_err(|_| PatchError::BadNumber {
        value: value.to_string(),
        column: column + key.len() + 1,
    })?;
    Ok(Control { key: key.to_string(), value })
}

/// Whitespace-separated tokens with their 1-based column in the full line.
fn tokens(part: &str, offset: usize) -> impl Iterator<Item = (&str, usize)> {
    part.split_whitespace().map(move |tok| {
        let start = tok.as_ptr() as usize - part.as_ptr() as usize;
        (tok, offset + start + 1)
    })
}

impl FromStr for PatchSpec {
    type Err = PatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_patch(s)
    }
}

impl fmt::Display for StageSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.unit)?;
        for c in &self.controls {
            write!(f, " {}={}", c.key, c.value)?;
        }
        Ok(())
    }
}

impl fmt::Display for PatchSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, stage) in self.stages.iter().enumerate() {
            if i > 0 {
                f.write_str(" | ")?;
            }
            write!(f, "{stage}")?;
        }
        Ok(())
    }
}
