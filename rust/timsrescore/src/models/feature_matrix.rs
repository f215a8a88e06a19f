/// Dense, row-major matrix of PSM features.
///
/// Rows are PSMs and columns are features, row `i` lives in
/// `values[i * ncols..(i + 1) * ncols]`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureMatrix {
    values: Vec<f64>,
    nrows: usize,
    ncols: usize,
}

impl FeatureMatrix {
    pub fn with_columns(ncols: usize) -> Self {
        Self {
            values: Vec::new(),
            nrows: 0,
            ncols,
        }
    }

    pub fn with_capacity(ncols: usize, nrows: usize) -> Self {
        Self {
            values: Vec::with_capacity(ncols * nrows),
            nrows: 0,
            ncols,
        }
    }

    /// Builds a matrix from row slices, all of which must have `ncols` elements.
    pub fn from_rows<'a>(ncols: usize, rows: impl IntoIterator<Item = &'a [f64]>) -> Self {
        let mut out = Self::with_columns(ncols);
        for row in rows {
            out.push_row(row);
        }
        out
    }

    pub fn push_row(&mut self, row: &[f64]) {
        assert_eq!(
            row.len(),
            self.ncols,
            "Row has {} values but the matrix has {} columns",
            row.len(),
            self.ncols
        );
        self.values.extend_from_slice(row);
        self.nrows += 1;
    }

    pub fn nrows(&self) -> usize {
        self.nrows
    }

    pub fn ncols(&self) -> usize {
        self.ncols
    }

    pub fn is_empty(&self) -> bool {
        self.nrows == 0
    }

    pub fn row(&self, idx: usize) -> &[f64] {
        &self.values[idx * self.ncols..(idx + 1) * self.ncols]
    }

    pub fn rows(&self) -> impl ExactSizeIterator<Item = &[f64]> + '_ {
        // `chunks_exact(0)` panics, a matrix without columns has no row data.
        (0..self.nrows).map(move |i| self.row(i))
    }

    pub fn column(&self, col: usize) -> Vec<f64> {
        assert!(col < self.ncols);
        self.rows().map(|r| r[col]).collect()
    }

    /// Copies the selected rows, in the order given, into a new matrix.
    pub fn select_rows(&self, rows: &[usize]) -> Self {
        let mut out = Self::with_capacity(self.ncols, rows.len());
        out.extend_from_rows(self, rows);
        out
    }

    /// Appends the selected rows of `source`.
    pub fn extend_from_rows(&mut self, source: &FeatureMatrix, rows: &[usize]) {
        assert_eq!(source.ncols, self.ncols);
        self.values.reserve(rows.len() * self.ncols);
        for &r in rows {
            self.values.extend_from_slice(source.row(r));
        }
        self.nrows += rows.len();
    }
}
