use thiserror::Error;

/// Failures while turning a data segment into renderable geometry.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GeometryError {
    #[error("sample rate must be finite and greater than zero, got {0}")]
    InvalidSampleRate(f64),
    #[error("display window [{start}, {end}] has no width")]
    DegenerateWindow { start: f64, end: f64 },
    #[error("render-space bounds [{min}, {max}] have no width")]
    DegenerateBounds { min: f64, max: f64 },
    #[error("geometry worker panicked: {0}")]
    WorkerPanicked(String),
    #[error("geometry pool is shut down")]
    PoolClosed,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HotKeyError {
    #[error("hotkey binding is empty")]
    Empty,
    #[error("unknown key {0:?}")]
    UnknownKey(String),
    #[error("binding {0:?} has modifiers but no key")]
    MissingKey(String),
}
