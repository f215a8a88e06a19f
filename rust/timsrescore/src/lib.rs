pub mod confidence;
pub mod errors;
pub mod io;
pub mod ml;
pub mod models;

pub use confidence::{
    Confidence,
    ConfidenceAssigner,
    ConfidenceLevel,
    LevelConfidence,
};
pub use ml::{
    BrewParams,
    LinearSvmConfig,
    TargetDecoy,
    brew,
    rescore,
    rescore_default,
    rescore_one,
};
pub use models::{
    PsmDataset,
    PsmTable,
};
