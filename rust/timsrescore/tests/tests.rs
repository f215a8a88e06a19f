use std::collections::HashSet;
use timsrescore::errors::{
    BrewError,
    SchemaError,
};
use timsrescore::ml::folds::{
    Folds,
    shuffle_rng,
};
use timsrescore::ml::{
    ClassifierBuilder,
    TrainingState,
};
use timsrescore::{
    BrewParams,
    ConfidenceLevel,
    LevelConfidence,
    LinearSvmConfig,
    PsmDataset,
    PsmTable,
    TargetDecoy,
    brew,
    io,
    rescore,
    rescore_one,
};

const COLUMNS: [&str; 8] = [
    "SpecId", "Label", "ScanNr", "Flat", "Good", "Anti", "Peptide", "Proteins",
];

/// Targets have `Good` in [10, 20), decoys in [0, 5). `Anti` is its negation
/// and `Flat` is constant, so only `Good` points the right way.
fn separated_table(n_targets: usize, n_decoys: usize) -> PsmTable {
    let mut table = PsmTable::new(COLUMNS.iter().map(|x| x.to_string()).collect());
    let n = n_targets + n_decoys;
    for i in 0..n {
        let target = i < n_targets;
        let good = if target {
            10.0 + 10.0 * i as f64 / n_targets as f64
        } else {
            5.0 * (i - n_targets) as f64 / n_decoys as f64
        };
        table.rows.push(vec![
            format!("psm_{}", i),
            if target { "1".into() } else { "-1".into() },
            i.to_string(),
            "1".into(),
            good.to_string(),
            (-good).to_string(),
            format!("K.PEP{}TIDE.R", i),
            if target { "prot".into() } else { "decoy_prot".into() },
        ]);
    }
    table
}

fn separated(n_targets: usize, n_decoys: usize) -> PsmDataset {
    PsmDataset::try_new(separated_table(n_targets, n_decoys)).unwrap()
}

#[test]
fn test_perfect_separation_finds_every_target() {
    let dataset = separated(100, 100);
    let params = BrewParams {
        train_fdr: 0.01,
        max_iter: 1,
        folds: 2,
        ..Default::default()
    };
    let template = LinearSvmConfig::default();

    let out = brew(std::slice::from_ref(&dataset), &template, &params).unwrap();
    assert_eq!(out.models.len(), 2);
    for model in out.models.iter() {
        let report = model.report().unwrap();
        assert_eq!(report.initial_feature, "Good");
        assert_eq!(report.state, TrainingState::Exhausted);
        assert_eq!(report.iterations(), 1);
    }

    let confidence = rescore_one(&dataset, &template, &params, &LevelConfidence::default()).unwrap();
    let psms = confidence.level(ConfidenceLevel::Psm).unwrap();
    assert_eq!(psms.len(), 200);
    for row in psms.rows.iter() {
        if row.label == TargetDecoy::Target {
            assert_eq!(row.qvalue, 0.0, "target {} has q = {}", row.spec_id, row.qvalue);
        }
    }
    assert_eq!(psms.passing(0.01), 100);
}

#[test]
fn test_missing_proteins_is_a_schema_error() {
    let mut table = separated_table(10, 10);
    table.columns.pop();
    for row in table.rows.iter_mut() {
        row.pop();
    }
    assert_eq!(
        PsmDataset::try_new(table).unwrap_err(),
        SchemaError::MissingColumns {
            missing: vec!["proteins"]
        }
    );
}

#[test]
fn test_two_datasets_give_aligned_results() {
    let datasets = vec![separated(25, 25), separated(15, 15)];
    let params = BrewParams {
        max_iter: 3,
        ..Default::default()
    };
    let results = rescore(
        &datasets,
        &LinearSvmConfig::default(),
        &params,
        &LevelConfidence::default(),
    )
    .unwrap();

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].scores.len(), 50);
    assert_eq!(results[1].scores.len(), 30);
    let psm_rows: Vec<usize> = results
        .iter()
        .map(|x| x.level(ConfidenceLevel::Psm).unwrap().len())
        .collect();
    assert_eq!(psm_rows, vec![50, 30]);

    // Separable data: after calibration every target sits at or above 0 and
    // every decoy below it, row by row in input order.
    for (dataset, result) in datasets.iter().zip(results.iter()) {
        for (row, (score, label)) in result.scores.iter().zip(dataset.labels()).enumerate() {
            match label {
                TargetDecoy::Target => assert!(*score >= 0.0, "target row {} scored {}", row, score),
                TargetDecoy::Decoy => assert!(*score < 0.0, "decoy row {} scored {}", row, score),
            }
        }
    }
}

#[test]
fn test_every_row_scored_exactly_once() {
    let datasets = vec![separated(40, 40), separated(30, 20), separated(12, 12)];
    let params = BrewParams::default();
    let out = brew(&datasets, &LinearSvmConfig::default(), &params).unwrap();

    for (i, (dataset, scores)) in datasets.iter().zip(out.scores.iter()).enumerate() {
        assert_eq!(scores.len(), dataset.len());
        // Unscored rows would still be NaN.
        assert!(scores.iter().all(|x| x.is_finite()));

        // Same split as the one brew made.
        let folds = Folds::split(dataset, params.folds, &mut shuffle_rng(params.seed, i));
        let mut seen = HashSet::new();
        for test in folds.test_sets() {
            for &row in test {
                assert!(seen.insert(row));
            }
        }
        assert_eq!(seen.len(), dataset.len());
    }
}

#[test]
fn test_worker_count_does_not_change_results() {
    let datasets = vec![separated(60, 60), separated(30, 30)];
    let template = LinearSvmConfig::default();
    let assigner = LevelConfidence::default();
    let run = |max_workers| {
        let params = BrewParams {
            max_workers,
            ..Default::default()
        };
        rescore(&datasets, &template, &params, &assigner).unwrap()
    };
    let sequential = run(1);
    let parallel = run(3);
    assert_eq!(sequential, parallel);
}

#[test]
fn test_feature_mismatch_between_datasets() {
    let mut other = separated_table(10, 10);
    other.columns[4] = "Better".into();
    let datasets = vec![separated(10, 10), PsmDataset::try_new(other).unwrap()];
    assert!(matches!(
        brew(&datasets, &LinearSvmConfig::default(), &BrewParams::default()),
        Err(BrewError::FeatureMismatch { dataset: 1 })
    ));
}

#[test]
fn test_classifier_builder_is_reusable() {
    let template = LinearSvmConfig::default();
    let a = template.build(1);
    let b = template.build(2);
    assert_eq!(a.config(), b.config());
}

#[test]
fn test_pin_to_results() {
    let dir = tempfile::tempdir().unwrap();
    let pin = dir.path().join("run.pin");

    let table = separated_table(40, 40);
    let mut content = table.columns.join("\t");
    content.push('\n');
    for row in table.rows.iter() {
        content.push_str(&row.join("\t"));
        content.push('\n');
    }
    std::fs::write(&pin, content).unwrap();

    let dataset = PsmDataset::try_new(io::read_pin(&pin).unwrap()).unwrap();
    assert_eq!(dataset.len(), 80);
    assert_eq!(dataset.feature_names(), &["Flat", "Good", "Anti"]);

    let confidence = rescore_one(
        &dataset,
        &LinearSvmConfig::default(),
        &BrewParams::default(),
        &LevelConfidence::default(),
    )
    .unwrap();
    let written = io::write_confidence(&confidence, dir.path(), "run").unwrap();
    assert_eq!(written.len(), 2);

    let psms = std::fs::read_to_string(dir.path().join("run.psms.tsv")).unwrap();
    // Header plus one line per PSM.
    assert_eq!(psms.lines().count(), 81);
    let peptides = std::fs::read_to_string(dir.path().join("run.peptides.tsv")).unwrap();
    assert_eq!(peptides.lines().count(), 81);
}
