use serde::{
    Deserialize,
    Serialize,
};
use std::path::{
    Path,
    PathBuf,
};
use timsrescore::{
    BrewParams,
    LevelConfidence,
    LinearSvmConfig,
};

use crate::cli::Cli;
use crate::errors;

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub input: InputConfig,
    pub analysis: AnalysisConfig,
    pub output: Option<OutputConfig>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct InputConfig {
    pub pin_files: Vec<PathBuf>,
    /// Read every file into one collection instead of one per file.
    pub merge: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AnalysisConfig {
    pub brew: BrewParams,
    pub svm: LinearSvmConfig,
    pub confidence: LevelConfidence,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct OutputConfig {
    pub directory: PathBuf,
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self, errors::CliError> {
        let conf = std::fs::File::open(path).map_err(|e| errors::CliError::Io {
            source: e.to_string(),
            path: Some(path.to_string_lossy().to_string()),
        })?;
        serde_json::from_reader(std::io::BufReader::new(conf))
            .map_err(|e| errors::CliError::ParseError { msg: e.to_string() })
    }

    /// Command line values take precedence over the config file.
    pub fn with_cli_args(mut self, args: Cli) -> Result<Self, errors::CliError> {
        if !args.pin_files.is_empty() {
            self.input.pin_files = args.pin_files;
        }
        if args.merge {
            self.input.merge = true;
        }
        if let Some(output_dir) = args.output_dir {
            self.output = Some(OutputConfig {
                directory: output_dir,
            });
        }

        let brew = &mut self.analysis.brew;
        if let Some(folds) = args.folds {
            brew.folds = folds;
        }
        if let Some(max_workers) = args.max_workers {
            brew.max_workers = max_workers;
        }
        if let Some(train_fdr) = args.train_fdr {
            brew.train_fdr = train_fdr;
        }
        if let Some(test_fdr) = args.test_fdr {
            brew.test_fdr = test_fdr;
            self.analysis.confidence.eval_fdr = test_fdr;
        }
        if let Some(max_iter) = args.max_iter {
            brew.max_iter = max_iter;
        }
        if args.direction.is_some() {
            brew.direction = args.direction;
        }
        if let Some(seed) = args.seed {
            brew.seed = seed;
        }

        if self.input.pin_files.is_empty() {
            return Err(errors::CliError::Config {
                source: "No input provided, please provide PIN files in either the config file or as arguments".to_string(),
            });
        }
        if self.output.is_none() {
            return Err(errors::CliError::Config {
                source: "No output directory provided, please provide one in either the config file or with the --output-dir flag".to_string(),
            });
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config() {
        let config: Config = serde_json::from_str(
            r#"{
                "input": {"pin_files": ["a.pin"]},
                "analysis": {"brew": {"folds": 5, "direction": "score"}}
            }"#,
        )
        .unwrap();
        assert_eq!(config.input.pin_files, vec![PathBuf::from("a.pin")]);
        assert!(!config.input.merge);
        assert_eq!(config.analysis.brew.folds, 5);
        assert_eq!(config.analysis.brew.direction.as_deref(), Some("score"));
        assert_eq!(config.analysis.brew.train_fdr, BrewParams::default().train_fdr);
        assert_eq!(config.analysis.svm, LinearSvmConfig::default());
        assert!(config.output.is_none());
    }

    #[test]
    fn test_cli_overrides_config() {
        let config = Config {
            input: InputConfig {
                pin_files: vec!["from_config.pin".into()],
                merge: false,
            },
            ..Default::default()
        };
        let args = Cli {
            pin_files: vec!["a.pin".into(), "b.pin".into()],
            output_dir: Some("out".into()),
            merge: true,
            max_workers: Some(4),
            test_fdr: Some(0.05),
            ..Default::default()
        };
        let config = config.with_cli_args(args).unwrap();
        assert_eq!(config.input.pin_files.len(), 2);
        assert!(config.input.merge);
        assert_eq!(config.analysis.brew.max_workers, 4);
        assert_eq!(config.analysis.brew.test_fdr, 0.05);
        assert_eq!(config.analysis.confidence.eval_fdr, 0.05);
        assert_eq!(config.analysis.brew.folds, 3);
        assert_eq!(config.output.unwrap().directory, PathBuf::from("out"));
    }

    #[test]
    fn test_missing_input_or_output() {
        let no_input = Config::default().with_cli_args(Cli {
            output_dir: Some("out".into()),
            ..Default::default()
        });
        assert!(matches!(no_input, Err(errors::CliError::Config { .. })));

        let no_output = Config::default().with_cli_args(Cli {
            pin_files: vec!["a.pin".into()],
            ..Default::default()
        });
        assert!(matches!(no_output, Err(errors::CliError::Config { .. })));
    }
}
