use thiserror::Error;

/// Host-side wiring errors. Never produced on the audio thread.
#[derive(Debug, Error, PartialEq)]
pub enum UnitError {
    #[error("unit `{unit}` has no port `{port}`")]
    UnknownPort { unit: &'static str, port: String },
    #[error("unknown unit `{0}`")]
    UnknownUnit(String),
    #[error("unit `{unit}` needs {needed} channel(s), chain has {channels}")]
    ChannelLayout {
        unit: &'static str,
        needed: usize,
        channels: usize,
    },
    #[error("chain has no stage {0}")]
    NoSuchStage(usize),
    #[error("no stage has a control named `{0}`")]
    UnmatchedControl(String),
}
