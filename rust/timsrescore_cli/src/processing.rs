use super::config::{
    AnalysisConfig,
    InputConfig,
    OutputConfig,
};
use crate::errors::CliError;
use std::path::Path;
use std::time::Instant;
use tabled::Tabled;
use timsrescore::{
    ConfidenceLevel,
    PsmDataset,
    io,
    rescore,
};
use tracing::info;

#[derive(Debug, Tabled)]
pub struct RunSummary {
    #[tabled(rename = "Collection")]
    pub name: String,
    #[tabled(rename = "PSMs")]
    pub psms: usize,
    #[tabled(rename = "Passing PSMs")]
    pub passing_psms: usize,
    #[tabled(rename = "Passing peptides")]
    pub passing_peptides: usize,
}

/// `run.pin.gz` and `run.pin` both become `run`.
pub fn file_stem(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|x| x.to_string_lossy().to_string())
        .unwrap_or_default();
    let name = name.strip_suffix(".gz").unwrap_or(&name);
    name.strip_suffix(".pin").unwrap_or(name).to_string()
}

/// One named collection per file, or a single one when merging.
pub fn load_datasets(input: &InputConfig) -> Result<Vec<(String, PsmDataset)>, CliError> {
    let st = Instant::now();
    let out = if input.merge {
        let table = io::read_pins(&input.pin_files)?;
        vec![("merged".to_string(), PsmDataset::try_new(table)?)]
    } else {
        input
            .pin_files
            .iter()
            .map(|path| -> Result<(String, PsmDataset), CliError> {
                let table = io::read_pin(path)?;
                Ok((file_stem(path), PsmDataset::try_new(table)?))
            })
            .collect::<Result<Vec<_>, CliError>>()?
    };
    info!(
        "Loaded {} collections of PSMs in {:?}",
        out.len(),
        st.elapsed()
    );
    Ok(out)
}

pub fn process_pins(
    input: &InputConfig,
    analysis: &AnalysisConfig,
    output: &OutputConfig,
) -> Result<Vec<RunSummary>, CliError> {
    let named = load_datasets(input)?;
    let (names, datasets): (Vec<String>, Vec<PsmDataset>) = named.into_iter().unzip();

    let start = Instant::now();
    let results = rescore(&datasets, &analysis.svm, &analysis.brew, &analysis.confidence)?;
    info!("Rescoring took {:?}", start.elapsed());

    let eval_fdr = analysis.confidence.eval_fdr;
    let mut summary = Vec::with_capacity(results.len());
    for ((name, dataset), confidence) in names.iter().zip(datasets.iter()).zip(results.iter()) {
        io::write_confidence(confidence, &output.directory, name)?;
        let passing = |level: ConfidenceLevel| {
            confidence
                .level(level)
                .map(|x| x.passing(eval_fdr))
                .unwrap_or(0)
        };
        summary.push(RunSummary {
            name: name.clone(),
            psms: dataset.len(),
            passing_psms: passing(ConfidenceLevel::Psm),
            passing_peptides: passing(ConfidenceLevel::Peptide),
        });
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_file_stem() {
        assert_eq!(file_stem(Path::new("/data/run1.pin")), "run1");
        assert_eq!(file_stem(Path::new("run1.pin.gz")), "run1");
        assert_eq!(file_stem(Path::new("run1.tsv")), "run1.tsv");
    }

    #[test]
    fn test_process_pins() {
        let dir = tempfile::tempdir().unwrap();
        let mut content = String::from("SpecId\tLabel\tScanNr\tScore\tPeptide\tProteins\n");
        for i in 0..60 {
            let target = i % 2 == 0;
            let score = if target { 10.0 + i as f64 } else { i as f64 / 10.0 };
            content.push_str(&format!(
                "psm{}\t{}\t{}\t{}\tPEP{}K\tprot\n",
                i,
                if target { 1 } else { -1 },
                i,
                score,
                i
            ));
        }
        let pin = dir.path().join("sample.pin");
        std::fs::write(&pin, content).unwrap();

        let input = InputConfig {
            pin_files: vec![pin],
            merge: false,
        };
        let output = OutputConfig {
            directory: PathBuf::from(dir.path()),
        };
        let summary = process_pins(&input, &AnalysisConfig::default(), &output).unwrap();
        assert_eq!(summary.len(), 1);
        assert_eq!(summary[0].name, "sample");
        assert_eq!(summary[0].psms, 60);
        assert_eq!(summary[0].passing_psms, 30);
        assert!(dir.path().join("sample.psms.tsv").exists());
        assert!(dir.path().join("sample.peptides.tsv").exists());
    }
}
