use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Default)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// PIN files to rescore (will over-write the config file)
    pub pin_files: Vec<PathBuf>,

    /// Path to the JSON configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Path to the output directory
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Treat all PIN files as a single collection of PSMs
    #[arg(short, long)]
    pub merge: bool,

    /// Number of cross-validation folds
    #[arg(long)]
    pub folds: Option<usize>,

    /// Maximum number of folds trained at the same time
    #[arg(short = 'w', long)]
    pub max_workers: Option<usize>,

    /// FDR threshold for positive examples during training
    #[arg(long)]
    pub train_fdr: Option<f64>,

    /// FDR threshold used to calibrate and evaluate the learned scores
    #[arg(long)]
    pub test_fdr: Option<f64>,

    /// Maximum number of training iterations per fold
    #[arg(long)]
    pub max_iter: Option<usize>,

    /// Feature used as the initial direction, instead of the best one
    #[arg(short, long)]
    pub direction: Option<String>,

    /// Seed for fold assignment
    #[arg(long)]
    pub seed: Option<u64>,
}
