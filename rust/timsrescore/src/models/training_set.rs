use super::feature_matrix::FeatureMatrix;
use super::psm_dataset::RowView;
use crate::ml::TargetDecoy;

/// Owned training table: features and target/decoy labels.
///
/// Unlike [`RowView`] this owns its rows, so it can be moved into a worker
/// thread together with the model that trains on it.
#[derive(Debug, Clone, Default)]
pub struct TrainingSet {
    feature_names: Vec<String>,
    features: FeatureMatrix,
    labels: Vec<TargetDecoy>,
}

impl TrainingSet {
    pub fn new(feature_names: Vec<String>) -> Self {
        let ncols = feature_names.len();
        Self {
            feature_names,
            features: FeatureMatrix::with_columns(ncols),
            labels: Vec::new(),
        }
    }

    /// # Panics
    ///
    /// If the names, matrix columns and labels disagree in size.
    pub fn from_parts(
        feature_names: Vec<String>,
        features: FeatureMatrix,
        labels: Vec<TargetDecoy>,
    ) -> Self {
        assert_eq!(feature_names.len(), features.ncols());
        assert_eq!(features.nrows(), labels.len());
        Self {
            feature_names,
            features,
            labels,
        }
    }

    /// Appends the rows of a view.
    ///
    /// # Panics
    ///
    /// If the view's dataset has different feature columns.
    pub fn extend_from_view(&mut self, view: &RowView<'_>) {
        let dataset = view.dataset();
        assert_eq!(dataset.feature_names(), self.feature_names.as_slice());
        self.features
            .extend_from_rows(dataset.features(), view.rows());
        self.labels
            .extend(view.rows().iter().map(|&r| dataset.labels()[r]));
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn features(&self) -> &FeatureMatrix {
        &self.features
    }

    pub fn labels(&self) -> &[TargetDecoy] {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn num_features(&self) -> usize {
        self.feature_names.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::psm_dataset::PsmDataset;
    use crate::models::psm_dataset::tests::table;

    #[test]
    fn test_concatenates_views() {
        let cols = ["Label", "ScanNr", "Score", "Peptide", "Proteins"];
        let a = PsmDataset::try_new(table(
            &cols,
            &[&["1", "1", "1.0", "A", "p"], &["-1", "2", "2.0", "B", "p"]],
        ))
        .unwrap();
        let b = PsmDataset::try_new(table(&cols, &[&["1", "1", "7.0", "C", "p"]])).unwrap();

        let mut train = TrainingSet::new(a.feature_names().to_vec());
        let rows_a = vec![1];
        let rows_b = vec![0];
        train.extend_from_view(&a.view(&rows_a));
        train.extend_from_view(&b.view(&rows_b));

        assert_eq!(train.len(), 2);
        assert_eq!(train.features().column(0), vec![2.0, 7.0]);
        assert_eq!(train.labels(), &[TargetDecoy::Decoy, TargetDecoy::Target]);
    }
}
