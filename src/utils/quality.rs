//! Parsing and filtering of CheckM2 quality reports.
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::config::defs::{PipelineError, REPORT_COMPLETENESS_COL, REPORT_CONTAMINATION_COL, REPORT_NAME_COL};
use crate::utils::file::label_for_path;


#[derive(Debug, Clone, PartialEq)]
pub struct QualityRecord {
    pub genome: String,
    pub completeness: f64,
    pub contamination: f64,
}

impl QualityRecord {
    pub fn passes(&self, min_completeness: f64, max_contamination: f64) -> bool {
        self.completeness >= min_completeness && self.contamination <= max_contamination
    }
}

// Column positions found in the header line.
struct ReportColumns {
    name: usize,
    completeness: usize,
    contamination: usize,
}

impl ReportColumns {
    fn from_header(header: &str) -> Result<Self, PipelineError> {
        let fields: Vec<&str> = header.split('\t').map(str::trim).collect();
        let find = |col: &str| {
            fields
                .iter()
                .position(|f| *f == col)
                .ok_or_else(|| PipelineError::ReportParse(format!("missing column '{}'", col)))
        };
        Ok(ReportColumns {
            name: find(REPORT_NAME_COL)?,
            completeness: find(REPORT_COMPLETENESS_COL)?,
            contamination: find(REPORT_CONTAMINATION_COL)?,
        })
    }

    fn parse(&self, line: &str, line_number: usize) -> Result<QualityRecord, PipelineError> {
        let fields: Vec<&str> = line.split('\t').collect();
        let field = |idx: usize| {
            fields
                .get(idx)
                .map(|f| f.trim())
                .ok_or_else(|| PipelineError::ReportParse(format!("line {}: too few columns", line_number)))
        };
        let number = |idx: usize| -> Result<f64, PipelineError> {
            let raw = field(idx)?;
            raw.parse::<f64>()
                .map_err(|_| PipelineError::ReportParse(format!("line {}: '{}' is not a number", line_number, raw)))
        };

        Ok(QualityRecord {
            genome: field(self.name)?.to_string(),
            completeness: number(self.completeness)?,
            contamination: number(self.contamination)?,
        })
    }
}


/// Reads a tab-separated quality report.
///
/// # Arguments
///
/// * `path` - Report with a header line containing at least
///   Name, Completeness and Contamination columns.
///
/// # Returns
/// One QualityRecord per data line, in file order.
///
pub async fn read_quality_report(path: &Path) -> Result<Vec<QualityRecord>, PipelineError> {
    let file = File::open(path)
        .await
        .map_err(|e| PipelineError::InputUnreadable(format!("{}: {}", path.display(), e)))?;
    let mut lines = BufReader::new(file).lines();
    let io_err = |e: std::io::Error| PipelineError::IOError(format!("{}: {}", path.display(), e));

    let header = lines
        .next_line()
        .await
        .map_err(io_err)?
        .ok_or_else(|| PipelineError::ReportParse(format!("{} is empty", path.display())))?;
    let columns = ReportColumns::from_header(&header)?;

    let mut records = Vec::new();
    let mut line_number = 1;
    while let Some(line) = lines.next_line().await.map_err(io_err)? {
        line_number += 1;
        if line.trim().is_empty() {
            continue;
        }
        records.push(columns.parse(&line, line_number)?);
    }
    debug!("Loaded {} rows from {}", records.len(), path.display());
    Ok(records)
}

/// Keeps the genome files whose report row passes the thresholds.
/// Rows are matched to files by label (file name without FASTA extensions).
/// Genomes missing from the report are dropped with a warning.
pub fn select_passing(
    report: &[QualityRecord],
    genomes: &[PathBuf],
    min_completeness: f64,
    max_contamination: f64,
) -> Vec<PathBuf> {
    let by_name: HashMap<&str, &QualityRecord> = report.iter().map(|r| (r.genome.as_str(), r)).collect();

    let mut passing = Vec::new();
    for genome in genomes {
        let label = label_for_path(genome);
        match by_name.get(label.as_str()) {
            Some(record) if record.passes(min_completeness, max_contamination) => passing.push(genome.clone()),
            Some(record) => debug!(
                "Rejected {}: completeness {:.2}, contamination {:.2}",
                label, record.completeness, record.contamination
            ),
            None => warn!("No quality report entry for {}; skipping", label),
        }
    }
    info!(
        "{} of {} genomes pass completeness >= {} and contamination <= {}",
        passing.len(), genomes.len(), min_completeness, max_contamination
    );
    passing
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const REPORT: &str = "Name\tCompleteness\tContamination\tCompleteness_Model_Used\n\
bin.1\t98.5\t0.4\tNeural Network\n\
bin.2\t45.0\t1.0\tNeural Network\n\
bin.3\t91.0\t12.5\tGradient Boost\n";

    fn write_report(text: &str) -> NamedTempFile {
        let mut tmp = NamedTempFile::new().unwrap();
        tmp.write_all(text.as_bytes()).unwrap();
        tmp.flush().unwrap();
        tmp
    }

    #[tokio::test]
    async fn test_read_quality_report() {
        let tmp = write_report(REPORT);
        let records = read_quality_report(tmp.path()).await.unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].genome, "bin.1");
        assert_eq!(records[0].completeness, 98.5);
        assert_eq!(records[2].contamination, 12.5);
    }

    #[tokio::test]
    async fn test_columns_found_by_name() {
        let tmp = write_report("Contamination\tName\tCompleteness\n2.0\tg7\t77.0\n");
        let records = read_quality_report(tmp.path()).await.unwrap();
        assert_eq!(records, vec![QualityRecord { genome: "g7".to_string(), completeness: 77.0, contamination: 2.0 }]);
    }

    #[tokio::test]
    async fn test_missing_column() {
        let tmp = write_report("Name\tCompleteness\nbin.1\t90\n");
        let err = read_quality_report(tmp.path()).await.unwrap_err();
        assert!(matches!(err, PipelineError::ReportParse(msg) if msg.contains("Contamination")));
    }

    #[tokio::test]
    async fn test_bad_number() {
        let tmp = write_report("Name\tCompleteness\tContamination\nbin.1\tNA\t1.0\n");
        assert!(matches!(read_quality_report(tmp.path()).await, Err(PipelineError::ReportParse(_))));
    }

    #[test]
    fn test_select_passing() {
        let report = vec![
            QualityRecord { genome: "bin.1".to_string(), completeness: 98.5, contamination: 0.4 },
            QualityRecord { genome: "bin.2".to_string(), completeness: 45.0, contamination: 1.0 },
            QualityRecord { genome: "bin.3".to_string(), completeness: 91.0, contamination: 12.5 },
        ];
        let genomes = vec![
            PathBuf::from("new/bin.1.fa"),
            PathBuf::from("new/bin.2.fa"),
            PathBuf::from("new/bin.3.fa.gz"),
            PathBuf::from("new/bin.4.fa"),
        ];
        let passing = select_passing(&report, &genomes, 50.0, 10.0);
        assert_eq!(passing, vec![PathBuf::from("new/bin.1.fa")]);
    }
}
