use super::feature_matrix::FeatureMatrix;
use crate::errors::SchemaError;
use crate::ml::TargetDecoy;
use std::ops::Range;
use tracing::debug;

pub const LABEL_COLUMN: &str = "label";
pub const SPECTRUM_COLUMN: &str = "scannr";
pub const PEPTIDE_COLUMN: &str = "peptide";
pub const PROTEINS_COLUMN: &str = "proteins";
const SPEC_ID_COLUMN: &str = "specid";
const EXP_MASS_COLUMN: &str = "expmass";
// Crux writes ExpMass and CalcMass right after ScanNr, they are not features.
const CALC_MASS_COLUMN: &str = "calcmass";

const REQUIRED_COLUMNS: [&str; 4] = [
    LABEL_COLUMN,
    SPECTRUM_COLUMN,
    PEPTIDE_COLUMN,
    PROTEINS_COLUMN,
];

/// A fully materialized table of PSMs, as handed over by a file reader.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PsmTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl PsmTable {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }
}

/// Column positions resolved once from the header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSchema {
    pub label: usize,
    pub spectrum: usize,
    pub peptide: usize,
    pub proteins: usize,
    pub spec_id: Option<usize>,
    pub exp_mass: Option<usize>,
    pub features: Range<usize>,
}

impl ColumnSchema {
    /// Matches the required columns case-insensitively.
    ///
    /// Features are the columns after `scannr` (or after `calcmass`, when
    /// present) and before `peptide`.
    pub fn resolve(columns: &[String]) -> Result<Self, SchemaError> {
        let lowered: Vec<String> = columns.iter().map(|c| c.trim().to_lowercase()).collect();
        let find = |name: &str| lowered.iter().position(|c| c == name);

        let (Some(label), Some(spectrum), Some(peptide), Some(proteins)) = (
            find(LABEL_COLUMN),
            find(SPECTRUM_COLUMN),
            find(PEPTIDE_COLUMN),
            find(PROTEINS_COLUMN),
        ) else {
            let missing = REQUIRED_COLUMNS
                .iter()
                .copied()
                .filter(|name| find(name).is_none())
                .collect();
            return Err(SchemaError::MissingColumns { missing });
        };

        let first = match find(CALC_MASS_COLUMN) {
            Some(calc) if calc > spectrum => calc + 1,
            _ => spectrum + 1,
        };
        if first >= peptide {
            return Err(SchemaError::NoFeatureColumns { first, peptide });
        }

        Ok(Self {
            label,
            spectrum,
            peptide,
            proteins,
            spec_id: find(SPEC_ID_COLUMN),
            exp_mass: find(EXP_MASS_COLUMN),
            features: first..peptide,
        })
    }

    pub fn num_features(&self) -> usize {
        self.features.len()
    }
}

/// An ordered, validated collection of PSMs.
///
/// Built once from a [`PsmTable`], never mutated afterwards. Folds and
/// training sets refer to it through row indices.
#[derive(Debug, Clone)]
pub struct PsmDataset {
    columns: Vec<String>,
    schema: ColumnSchema,
    labels: Vec<TargetDecoy>,
    spec_ids: Vec<String>,
    spectrum_keys: Vec<String>,
    peptides: Vec<String>,
    proteins: Vec<String>,
    features: FeatureMatrix,
}

impl PsmDataset {
    pub fn try_new(table: PsmTable) -> Result<Self, SchemaError> {
        let schema = ColumnSchema::resolve(&table.columns)?;
        let PsmTable { mut columns, rows } = table;

        for (idx, name) in [
            (schema.label, LABEL_COLUMN),
            (schema.spectrum, SPECTRUM_COLUMN),
            (schema.peptide, PEPTIDE_COLUMN),
            (schema.proteins, PROTEINS_COLUMN),
        ] {
            columns[idx] = name.to_string();
        }

        let ncols = columns.len();
        let mut labels = Vec::with_capacity(rows.len());
        let mut spec_ids = Vec::with_capacity(rows.len());
        let mut spectrum_keys = Vec::with_capacity(rows.len());
        let mut peptides = Vec::with_capacity(rows.len());
        let mut proteins = Vec::with_capacity(rows.len());
        let mut features = FeatureMatrix::with_capacity(schema.num_features(), rows.len());
        let mut feature_buffer = Vec::with_capacity(schema.num_features());

        for (row_idx, row) in rows.into_iter().enumerate() {
            if row.len() != ncols {
                return Err(SchemaError::RaggedRow {
                    row: row_idx,
                    expected: ncols,
                    found: row.len(),
                });
            }

            let label = TargetDecoy::from_label(&row[schema.label]).ok_or_else(|| {
                SchemaError::InvalidLabel {
                    row: row_idx,
                    value: row[schema.label].clone(),
                }
            })?;

            feature_buffer.clear();
            for col in schema.features.clone() {
                let value = row[col].trim().parse::<f64>().map_err(|_| {
                    SchemaError::NonNumericFeature {
                        row: row_idx,
                        column: columns[col].clone(),
                        value: row[col].clone(),
                    }
                })?;
                feature_buffer.push(value);
            }
            features.push_row(&feature_buffer);

            let spectrum_key = match schema.exp_mass {
                Some(mass) => format!("{}_{}", row[schema.spectrum].trim(), row[mass].trim()),
                None => row[schema.spectrum].trim().to_string(),
            };
            let spec_id = match schema.spec_id {
                Some(col) => row[col].clone(),
                None => spectrum_key.clone(),
            };

            labels.push(label);
            spec_ids.push(spec_id);
            spectrum_keys.push(spectrum_key);
            peptides.push(row[schema.peptide].clone());
            proteins.push(row[schema.proteins].clone());
        }

        debug!(
            "Built PSM dataset with {} rows and {} features",
            labels.len(),
            features.ncols()
        );

        Ok(Self {
            columns,
            schema,
            labels,
            spec_ids,
            spectrum_keys,
            peptides,
            proteins,
            features,
        })
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn schema(&self) -> &ColumnSchema {
        &self.schema
    }

    pub fn feature_names(&self) -> &[String] {
        &self.columns[self.schema.features.clone()]
    }

    pub fn features(&self) -> &FeatureMatrix {
        &self.features
    }

    pub fn labels(&self) -> &[TargetDecoy] {
        &self.labels
    }

    pub fn spec_ids(&self) -> &[String] {
        &self.spec_ids
    }

    /// Identifies the spectrum a PSM comes from, rows sharing a key are
    /// matches to the same spectrum.
    pub fn spectrum_keys(&self) -> &[String] {
        &self.spectrum_keys
    }

    pub fn peptides(&self) -> &[String] {
        &self.peptides
    }

    pub fn proteins(&self) -> &[String] {
        &self.proteins
    }

    pub fn view<'a>(&'a self, rows: &'a [usize]) -> RowView<'a> {
        RowView {
            dataset: self,
            rows,
        }
    }
}

/// A subset of the rows of a dataset, without copying it.
#[derive(Debug, Clone, Copy)]
pub struct RowView<'a> {
    dataset: &'a PsmDataset,
    rows: &'a [usize],
}

impl<'a> RowView<'a> {
    pub fn dataset(&self) -> &'a PsmDataset {
        self.dataset
    }

    pub fn rows(&self) -> &'a [usize] {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn labels(&self) -> Vec<TargetDecoy> {
        self.rows.iter().map(|&r| self.dataset.labels[r]).collect()
    }

    pub fn to_matrix(&self) -> FeatureMatrix {
        self.dataset.features.select_rows(self.rows)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn table(columns: &[&str], rows: &[&[&str]]) -> PsmTable {
        PsmTable {
            columns: columns.iter().map(|x| x.to_string()).collect(),
            rows: rows
                .iter()
                .map(|r| r.iter().map(|x| x.to_string()).collect())
                .collect(),
        }
    }

    #[test]
    fn test_schema_is_case_insensitive() {
        let t = table(
            &["SpecId", "Label", "ScanNr", "Score", "DeltaCn", "Peptide", "Proteins"],
            &[
                &["a", "1", "10", "3.5", "0.2", "K.PEPTIDE.R", "prot1"],
                &["b", "-1", "11", "1.5", "0.1", "K.EDITPEP.R", "decoy_prot1"],
            ],
        );
        let ds = PsmDataset::try_new(t).unwrap();
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.feature_names(), &["Score".to_string(), "DeltaCn".to_string()]);
        assert_eq!(ds.columns()[1], "label");
        assert_eq!(ds.columns()[2], "scannr");
        assert_eq!(ds.labels(), &[TargetDecoy::Target, TargetDecoy::Decoy]);
        assert_eq!(ds.features().row(1), &[1.5, 0.1]);
        assert_eq!(ds.spec_ids(), &["a".to_string(), "b".to_string()]);
        assert_eq!(ds.spectrum_keys(), &["10".to_string(), "11".to_string()]);
    }

    #[test]
    fn test_calcmass_is_skipped() {
        let t = table(
            &["SpecId", "Label", "ScanNr", "ExpMass", "CalcMass", "Score", "Peptide", "Proteins"],
            &[&["a", "1", "10", "1000.5", "1000.4", "3.5", "PEPTIDE", "p"]],
        );
        let ds = PsmDataset::try_new(t).unwrap();
        assert_eq!(ds.feature_names(), &["Score".to_string()]);
        assert_eq!(ds.spectrum_keys()[0], "10_1000.5");
    }

    #[test]
    fn test_missing_proteins_fails() {
        let t = table(
            &["Label", "ScanNr", "Score", "Peptide"],
            &[&["1", "10", "3.5", "PEPTIDE"]],
        );
        let err = PsmDataset::try_new(t).unwrap_err();
        assert_eq!(
            err,
            SchemaError::MissingColumns {
                missing: vec![PROTEINS_COLUMN]
            }
        );
    }

    #[test]
    fn test_no_feature_columns() {
        let t = table(&["Label", "ScanNr", "Peptide", "Proteins"], &[]);
        assert!(matches!(
            PsmDataset::try_new(t),
            Err(SchemaError::NoFeatureColumns { .. })
        ));
    }

    #[test]
    fn test_bad_rows() {
        let cols = ["Label", "ScanNr", "Score", "Peptide", "Proteins"];
        let bad_label = table(&cols, &[&["2", "1", "1.0", "PEP", "p"]]);
        assert!(matches!(
            PsmDataset::try_new(bad_label),
            Err(SchemaError::InvalidLabel { row: 0, .. })
        ));

        let bad_feature = table(&cols, &[&["1", "1", "1.0", "PEP", "p"], &["1", "2", "x", "PEP", "p"]]);
        assert!(matches!(
            PsmDataset::try_new(bad_feature),
            Err(SchemaError::NonNumericFeature { row: 1, .. })
        ));

        let ragged = table(&cols, &[&["1", "1", "1.0", "PEP"]]);
        assert!(matches!(
            PsmDataset::try_new(ragged),
            Err(SchemaError::RaggedRow { row: 0, expected: 5, found: 4 })
        ));
    }

    #[test]
    fn test_row_view() {
        let cols = ["Label", "ScanNr", "Score", "Peptide", "Proteins"];
        let t = table(
            &cols,
            &[
                &["1", "1", "1.0", "A", "p"],
                &["-1", "2", "2.0", "B", "p"],
                &["1", "3", "3.0", "C", "p"],
            ],
        );
        let ds = PsmDataset::try_new(t).unwrap();
        let rows = vec![2, 1];
        let view = ds.view(&rows);
        assert_eq!(view.len(), 2);
        assert_eq!(view.labels(), vec![TargetDecoy::Target, TargetDecoy::Decoy]);
        assert_eq!(view.to_matrix().column(0), vec![3.0, 2.0]);
    }
}
