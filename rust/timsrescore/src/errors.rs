use std::path::PathBuf;

/// Problems found while resolving the columns of a PSM table.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaError {
    MissingColumns {
        missing: Vec<&'static str>,
    },
    NoFeatureColumns {
        first: usize,
        peptide: usize,
    },
    RaggedRow {
        row: usize,
        expected: usize,
        found: usize,
    },
    InvalidLabel {
        row: usize,
        value: String,
    },
    NonNumericFeature {
        row: usize,
        column: String,
        value: String,
    },
}

impl std::fmt::Display for SchemaError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SchemaError::MissingColumns { missing } => write!(
                f,
                "Required columns are missing: {:?} (column names are case insensitive)",
                missing
            ),
            SchemaError::NoFeatureColumns { first, peptide } => write!(
                f,
                "No feature columns found between column {} and the peptide column ({})",
                first, peptide
            ),
            SchemaError::RaggedRow {
                row,
                expected,
                found,
            } => write!(
                f,
                "Row {} has {} fields, expected {} (one per column)",
                row, found, expected
            ),
            SchemaError::InvalidLabel { row, value } => write!(
                f,
                "Row {} has label '{}', expected 1 (target) or 0/-1 (decoy)",
                row, value
            ),
            SchemaError::NonNumericFeature { row, column, value } => write!(
                f,
                "Row {} has a non-numeric value '{}' in feature column '{}'",
                row, value, column
            ),
        }
    }
}

impl std::error::Error for SchemaError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QValueError {
    NoTargets,
    LengthMismatch { scores: usize, labels: usize },
}

impl std::fmt::Display for QValueError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QValueError::NoTargets => write!(f, "Cannot estimate q-values without any target PSMs"),
            QValueError::LengthMismatch { scores, labels } => write!(
                f,
                "Got {} scores but {} labels, they must be the same length",
                scores, labels
            ),
        }
    }
}

impl std::error::Error for QValueError {}

#[derive(Debug, Clone, PartialEq)]
pub enum DirectionError {
    UnknownFeature { name: String },
    NoViableDirection { fdr: f64 },
    QValue(QValueError),
}

impl std::fmt::Display for DirectionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DirectionError::UnknownFeature { name } => {
                write!(f, "Feature '{}' is not one of the feature columns", name)
            }
            DirectionError::NoViableDirection { fdr } => write!(
                f,
                "Cannot establish an initial direction: no feature finds any target PSM at q <= {}",
                fdr
            ),
            DirectionError::QValue(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for DirectionError {}

impl From<QValueError> for DirectionError {
    fn from(x: QValueError) -> Self {
        Self::QValue(x)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClassifierError {
    TooFewExamples { examples: usize, features: usize },
    SingleClass { positives: usize, negatives: usize },
    NonFiniteInput { row: usize },
    ShapeMismatch { expected: usize, found: usize },
    IllConditioned,
    NotFitted,
}

impl std::fmt::Display for ClassifierError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClassifierError::TooFewExamples { examples, features } => write!(
                f,
                "Cannot fit {} features with only {} examples",
                features, examples
            ),
            ClassifierError::SingleClass {
                positives,
                negatives,
            } => write!(
                f,
                "Both classes are needed to fit, got {} positives and {} negatives",
                positives, negatives
            ),
            ClassifierError::NonFiniteInput { row } => {
                write!(f, "Row {} contains a NaN or infinite feature value", row)
            }
            ClassifierError::ShapeMismatch { expected, found } => write!(
                f,
                "Expected {} feature columns, found {}",
                expected, found
            ),
            ClassifierError::IllConditioned => {
                write!(f, "The training problem is numerically ill-conditioned")
            }
            ClassifierError::NotFitted => write!(f, "The classifier has not been fit yet"),
        }
    }
}

impl std::error::Error for ClassifierError {}

#[derive(Debug, Clone, PartialEq)]
pub enum TrainError {
    InvalidIterations,
    NotFitted,
    Direction(DirectionError),
    Classifier(ClassifierError),
    QValue(QValueError),
}

impl std::fmt::Display for TrainError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrainError::InvalidIterations => write!(f, "max_iter must be at least 1"),
            TrainError::NotFitted => write!(f, "The model has not been trained yet"),
            TrainError::Direction(e) => write!(f, "{}", e),
            TrainError::Classifier(e) => write!(f, "Classifier error: {}", e),
            TrainError::QValue(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for TrainError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TrainError::Direction(e) => Some(e),
            TrainError::Classifier(e) => Some(e),
            TrainError::QValue(e) => Some(e),
            _ => None,
        }
    }
}

impl From<DirectionError> for TrainError {
    fn from(x: DirectionError) -> Self {
        Self::Direction(x)
    }
}

impl From<ClassifierError> for TrainError {
    fn from(x: ClassifierError) -> Self {
        Self::Classifier(x)
    }
}

impl From<QValueError> for TrainError {
    fn from(x: QValueError) -> Self {
        Self::QValue(x)
    }
}

/// Why the held-out scores of a fold could not be calibrated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DegenerateReason {
    Empty,
    NoTargets,
    NoDecoys,
    NoPassingTargets,
    NoSeparation,
}

impl std::fmt::Display for DegenerateReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DegenerateReason::Empty => write!(f, "the fold has no PSMs"),
            DegenerateReason::NoTargets => write!(f, "the fold has no target PSMs"),
            DegenerateReason::NoDecoys => write!(f, "the fold has no decoy PSMs"),
            DegenerateReason::NoPassingTargets => {
                write!(f, "no target PSM passes the test FDR")
            }
            DegenerateReason::NoSeparation => write!(
                f,
                "the score at the test FDR is not above the median decoy score"
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConfidenceError {
    LengthMismatch { scores: usize, rows: usize },
    QValue(QValueError),
}

impl std::fmt::Display for ConfidenceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfidenceError::LengthMismatch { scores, rows } => write!(
                f,
                "Got {} scores for a dataset of {} PSMs",
                scores, rows
            ),
            ConfidenceError::QValue(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for ConfidenceError {}

impl From<QValueError> for ConfidenceError {
    fn from(x: QValueError) -> Self {
        Self::QValue(x)
    }
}

#[derive(Debug)]
pub enum BrewError {
    NoDatasets,
    InvalidParameter {
        name: &'static str,
        value: String,
    },
    FeatureMismatch {
        dataset: usize,
    },
    /// No dataset has rows outside this fold to train on.
    EmptyTrainingSet {
        fold: usize,
    },
    FoldTraining {
        fold: usize,
        source: TrainError,
    },
    FoldScoring {
        dataset: usize,
        fold: usize,
        source: TrainError,
    },
    DegenerateFold {
        dataset: usize,
        fold: usize,
        reason: DegenerateReason,
    },
    ThreadPool(String),
    Confidence {
        dataset: usize,
        source: ConfidenceError,
    },
}

impl std::fmt::Display for BrewError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BrewError::NoDatasets => write!(f, "At least one PSM dataset is required"),
            BrewError::InvalidParameter { name, value } => {
                write!(f, "Invalid value for {}: {}", name, value)
            }
            BrewError::FeatureMismatch { dataset } => write!(
                f,
                "Dataset {} does not have the same feature columns as dataset 0",
                dataset
            ),
            BrewError::EmptyTrainingSet { fold } => write!(
                f,
                "Fold {} has no PSMs left to train on, every dataset fits in a single fold",
                fold + 1
            ),
            BrewError::FoldTraining { fold, source } => {
                write!(f, "Training failed for fold {}: {}", fold + 1, source)
            }
            BrewError::FoldScoring {
                dataset,
                fold,
                source,
            } => write!(
                f,
                "Scoring dataset {} with the model of fold {} failed: {}",
                dataset,
                fold + 1,
                source
            ),
            BrewError::DegenerateFold {
                dataset,
                fold,
                reason,
            } => write!(
                f,
                "Fold {} of dataset {} cannot be calibrated: {}",
                fold + 1,
                dataset,
                reason
            ),
            BrewError::ThreadPool(msg) => write!(f, "Unable to build the worker pool: {}", msg),
            BrewError::Confidence { dataset, source } => write!(
                f,
                "Assigning confidence to dataset {} failed: {}",
                dataset, source
            ),
        }
    }
}

impl std::error::Error for BrewError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BrewError::FoldTraining { source, .. } => Some(source),
            BrewError::FoldScoring { source, .. } => Some(source),
            BrewError::Confidence { source, .. } => Some(source),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub enum TableIoError {
    Io {
        source: std::io::Error,
        path: PathBuf,
    },
    Csv {
        source: csv::Error,
        path: PathBuf,
    },
    EmptyFile {
        path: PathBuf,
    },
    HeaderMismatch {
        path: PathBuf,
    },
    NoFiles,
}

impl std::fmt::Display for TableIoError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TableIoError::Io { source, path } => {
                write!(f, "Error accessing {}: {}", path.display(), source)
            }
            TableIoError::Csv { source, path } => {
                write!(f, "Error parsing {}: {}", path.display(), source)
            }
            TableIoError::EmptyFile { path } => {
                write!(f, "File {} has no header line", path.display())
            }
            TableIoError::HeaderMismatch { path } => write!(
                f,
                "File {} does not have the same columns as the first file",
                path.display()
            ),
            TableIoError::NoFiles => write!(f, "No input files were provided"),
        }
    }
}

impl std::error::Error for TableIoError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TableIoError::Io { source, .. } => Some(source),
            TableIoError::Csv { source, .. } => Some(source),
            _ => None,
        }
    }
}
