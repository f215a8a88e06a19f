mod feature_matrix;
pub(crate) mod psm_dataset;
mod training_set;

pub use feature_matrix::FeatureMatrix;
pub use psm_dataset::{
    ColumnSchema,
    PsmDataset,
    PsmTable,
    RowView,
};
pub use training_set::TrainingSet;
