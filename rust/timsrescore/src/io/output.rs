use crate::confidence::{
    Confidence,
    LevelTable,
};
use crate::errors::TableIoError;
use serde::Serialize;
use std::path::{
    Path,
    PathBuf,
};
use tracing::info;

#[derive(Serialize)]
struct OutputRow<'a> {
    #[serde(rename = "SpecId")]
    spec_id: &'a str,
    #[serde(rename = "Label")]
    label: i8,
    #[serde(rename = "Score")]
    score: f64,
    #[serde(rename = "q-value")]
    qvalue: f64,
    #[serde(rename = "Peptide")]
    peptide: &'a str,
    #[serde(rename = "Proteins")]
    proteins: &'a str,
}

/// `<dir>/<stem>.<level>.tsv`
pub fn level_path(dir: &Path, stem: &str, table: &LevelTable) -> PathBuf {
    dir.join(format!("{}.{}.tsv", stem, table.level.name()))
}

/// Writes one level as a tab separated file, best entry first.
pub fn write_level(path: &Path, table: &LevelTable) -> Result<(), TableIoError> {
    let csv_err = |source: csv::Error| TableIoError::Csv {
        source,
        path: path.to_path_buf(),
    };
    // Protein lists are tab-joined already, quoting them would change them.
    let mut wtr = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .quote_style(csv::QuoteStyle::Never)
        .from_path(path)
        .map_err(csv_err)?;

    for row in table.rows.iter() {
        wtr.serialize(OutputRow {
            spec_id: &row.spec_id,
            label: row.label.as_label(),
            score: row.score,
            qvalue: row.qvalue,
            peptide: &row.peptide,
            proteins: &row.proteins,
        })
        .map_err(csv_err)?;
    }
    wtr.flush().map_err(|source| TableIoError::Io {
        source,
        path: path.to_path_buf(),
    })?;
    Ok(())
}

/// Writes every level of `confidence` next to each other, returns the paths
/// written.
pub fn write_confidence(
    confidence: &Confidence,
    dir: &Path,
    stem: &str,
) -> Result<Vec<PathBuf>, TableIoError> {
    let mut out = Vec::with_capacity(confidence.levels.len());
    for table in confidence.levels.iter() {
        let path = level_path(dir, stem, table);
        info!("Writing {} {} to {}", table.len(), table.level.name(), path.display());
        write_level(&path, table)?;
        out.push(path);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::confidence::{
        ConfidenceLevel,
        ScoredRow,
    };
    use crate::ml::TargetDecoy;

    #[test]
    fn test_write_confidence() {
        let dir = tempfile::tempdir().unwrap();
        let table = LevelTable {
            level: ConfidenceLevel::Psm,
            rows: vec![
                ScoredRow {
                    row: 0,
                    spec_id: "a".into(),
                    label: TargetDecoy::Target,
                    score: 1.5,
                    qvalue: 0.0,
                    peptide: "K.PEPTIDE.R".into(),
                    proteins: "p1\tp2".into(),
                },
                ScoredRow {
                    row: 1,
                    spec_id: "b".into(),
                    label: TargetDecoy::Decoy,
                    score: -1.0,
                    qvalue: 1.0,
                    peptide: "K.EDITPEP.R".into(),
                    proteins: "decoy_p1".into(),
                },
            ],
        };
        let confidence = Confidence {
            scores: vec![1.5, -1.0],
            levels: vec![table],
        };

        let written = write_confidence(&confidence, dir.path(), "run").unwrap();
        assert_eq!(written, vec![dir.path().join("run.psms.tsv")]);
        let content = std::fs::read_to_string(&written[0]).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "SpecId\tLabel\tScore\tq-value\tPeptide\tProteins");
        assert_eq!(lines[1], "a\t1\t1.5\t0.0\tK.PEPTIDE.R\tp1\tp2");
        assert_eq!(lines[2], "b\t-1\t-1.0\t1.0\tK.EDITPEP.R\tdecoy_p1");
    }
}
