use crate::errors::TableIoError;
use crate::models::PsmTable;
use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{
    BufReader,
    Read,
};
use std::path::Path;
use tracing::{
    debug,
    info,
};

/// Percolator allows a second header-like row with the default weights.
const DEFAULT_DIRECTION_ROW: &str = "defaultdirection";

fn open(path: &Path) -> Result<Box<dyn Read>, TableIoError> {
    let file = File::open(path).map_err(|source| TableIoError::Io {
        source,
        path: path.to_path_buf(),
    })?;
    let reader: Box<dyn Read> = if path.extension().is_some_and(|ext| ext == "gz") {
        Box::new(MultiGzDecoder::new(BufReader::new(file)))
    } else {
        Box::new(BufReader::new(file))
    };
    Ok(reader)
}

/// Reads a Percolator input (PIN) file, optionally gzipped.
///
/// The file is tab separated with a header line. Rows may have more fields
/// than the header: the extra fields belong to the last column (the protein
/// list) and are kept tab-joined.
pub fn read_pin<T: AsRef<Path>>(path: T) -> Result<PsmTable, TableIoError> {
    let path = path.as_ref();
    info!("Reading PSMs from {}", path.display());
    let csv_err = |source: csv::Error| TableIoError::Csv {
        source,
        path: path.to_path_buf(),
    };

    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .quoting(false)
        .from_reader(open(path)?);

    let mut records = rdr.records();
    let header = match records.next() {
        Some(record) => record.map_err(csv_err)?,
        None => {
            return Err(TableIoError::EmptyFile {
                path: path.to_path_buf(),
            });
        }
    };
    let columns: Vec<String> = header.iter().map(|x| x.trim().to_string()).collect();
    let width = columns.len();

    let mut table = PsmTable::new(columns);
    for record in records {
        let record = record.map_err(csv_err)?;
        if record
            .get(0)
            .is_some_and(|x| x.trim().eq_ignore_ascii_case(DEFAULT_DIRECTION_ROW))
        {
            debug!("Skipping the DefaultDirection row of {}", path.display());
            continue;
        }

        let mut row: Vec<String> = record.iter().take(width).map(|x| x.to_string()).collect();
        if record.len() > width {
            let tail: Vec<&str> = record.iter().skip(width - 1).collect();
            if let Some(last) = row.last_mut() {
                *last = tail.join("\t");
            }
        }
        table.rows.push(row);
    }

    debug!("Read {} rows from {}", table.rows.len(), path.display());
    Ok(table)
}

/// Reads several PIN files into one table. All files must share the same
/// header (compared case-insensitively).
pub fn read_pins<T: AsRef<Path>>(paths: &[T]) -> Result<PsmTable, TableIoError> {
    let (first, rest) = paths.split_first().ok_or(TableIoError::NoFiles)?;
    let mut table = read_pin(first)?;
    let lowered = |cols: &[String]| -> Vec<String> { cols.iter().map(|c| c.to_lowercase()).collect() };
    let expected = lowered(&table.columns);

    for path in rest {
        let other = read_pin(path)?;
        if lowered(&other.columns) != expected {
            return Err(TableIoError::HeaderMismatch {
                path: path.as_ref().to_path_buf(),
            });
        }
        table.rows.extend(other.rows);
    }
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::Write;

    const PIN: &str = "SpecId\tLabel\tScanNr\tScore\tPeptide\tProteins\n\
DefaultDirection\t-\t-\t1\t\t\n\
a\t1\t1\t2.5\tK.PEPTIDE.R\tprot1\tprot2\n\
b\t-1\t2\t0.5\tK.EDITPEP.R\tdecoy_prot1\n";

    #[test]
    fn test_read_pin() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.pin");
        std::fs::write(&path, PIN).unwrap();

        let table = read_pin(&path).unwrap();
        assert_eq!(
            table.columns,
            vec!["SpecId", "Label", "ScanNr", "Score", "Peptide", "Proteins"]
        );
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0][5], "prot1\tprot2");
        assert_eq!(table.rows[1][5], "decoy_prot1");
        assert_eq!(table.rows[1].len(), 6);
    }

    #[test]
    fn test_read_gzipped_pin() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.pin.gz");
        let mut encoder = GzEncoder::new(File::create(&path).unwrap(), Compression::default());
        encoder.write_all(PIN.as_bytes()).unwrap();
        encoder.finish().unwrap();

        let table = read_pin(&path).unwrap();
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0][0], "a");
    }

    #[test]
    fn test_read_several_pins() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.pin");
        let b = dir.path().join("b.pin");
        let c = dir.path().join("c.pin");
        std::fs::write(&a, PIN).unwrap();
        std::fs::write(&b, PIN.to_lowercase()).unwrap();
        std::fs::write(&c, "SpecId\tLabel\n").unwrap();

        let table = read_pins(&[&a, &b]).unwrap();
        assert_eq!(table.rows.len(), 4);

        assert!(matches!(
            read_pins(&[&a, &c]),
            Err(TableIoError::HeaderMismatch { .. })
        ));
        let none: [&Path; 0] = [];
        assert!(matches!(read_pins(&none), Err(TableIoError::NoFiles)));
    }

    #[test]
    fn test_empty_and_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let empty = dir.path().join("empty.pin");
        std::fs::write(&empty, "").unwrap();
        assert!(matches!(
            read_pin(&empty),
            Err(TableIoError::EmptyFile { .. })
        ));
        assert!(matches!(
            read_pin(dir.path().join("nope.pin")),
            Err(TableIoError::Io { .. })
        ));
    }
}
