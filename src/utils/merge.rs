use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use fxhash::FxHashSet;
use log::{debug, info, warn};
use crate::config::defs::{MergeConfig, PipelineError, HEADER_MARKER};
use crate::utils::fasta::RecordReader;
use crate::utils::file::{label_for_path, open_input};
use crate::utils::split::{EmittedUnit, Splitter};


/// Writes emitted units as FASTA, wrapping sequence at a fixed width.
pub struct FastaAppender<W: Write> {
    writer: BufWriter<W>,
    line_width: usize,
}

impl FastaAppender<File> {
    /// Opens an existing file for appending. The file is never created or
    /// truncated here; see `utils::file::reset_output`.
    pub fn open(path: &Path, line_width: usize) -> Result<Self, PipelineError> {
        let file = OpenOptions::new()
            .append(true)
            .open(path)
            .map_err(|e| PipelineError::OutputNotWritable(format!("{}: {}", path.display(), e)))?;
        FastaAppender::new(file, line_width)
    }
}

impl<W: Write> FastaAppender<W> {
    pub fn new(sink: W, line_width: usize) -> Result<Self, PipelineError> {
        if line_width == 0 {
            return Err(PipelineError::InvalidConfig("line width must be positive".to_string()));
        }
        Ok(FastaAppender {
            writer: BufWriter::new(sink),
            line_width,
        })
    }

    /// Header line, then the residues in `line_width` lines. No residues
    /// means a header-only record.
    pub fn write_unit(&mut self, unit: &EmittedUnit) -> io::Result<()> {
        self.writer.write_all(&[HEADER_MARKER])?;
        unit.write_id(&mut self.writer)?;
        self.writer.write_all(b"\n")?;

        for line in unit.residues().chunks(self.line_width) {
            self.writer.write_all(line)?;
            self.writer.write_all(b"\n")?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }

    pub fn into_inner(self) -> io::Result<W> {
        self.writer.into_inner().map_err(|e| e.into_error())
    }
}


#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileStats {
    pub label: String,
    pub records: u64,
    pub split_records: u64,
    pub units: u64,
    pub chunks: u64,
    pub residues: u64,
    pub skipped_lines: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeStats {
    pub files: u64,
    pub records: u64,
    pub split_records: u64,
    pub units: u64,
    pub chunks: u64,
    pub residues: u64,
}

impl MergeStats {
    fn absorb(&mut self, file: &FileStats) {
        self.files += 1;
        self.records += file.records;
        self.split_records += file.split_records;
        self.units += file.units;
        self.chunks += file.chunks;
        self.residues += file.residues;
    }
}


/// Streams FASTA inputs into one merged output.
///
/// Every record is renamed `<label>|<id>`, split into `_part<n>` pieces when
/// longer than the configured threshold and re-wrapped. Inputs are processed
/// one after another in the order they are given; there is a single writer.
pub struct MergeEngine<W: Write> {
    config: MergeConfig,
    splitter: Splitter,
    appender: FastaAppender<W>,
    seen_ids: Option<FxHashSet<Vec<u8>>>,
    seen_labels: FxHashSet<String>,
    stats: MergeStats,
}

impl MergeEngine<File> {
    pub fn open(path: &Path, config: MergeConfig) -> Result<Self, PipelineError> {
        let appender = FastaAppender::open(path, config.line_width)?;
        MergeEngine::with_appender(appender, config)
    }
}

impl<W: Write> MergeEngine<W> {
    pub fn new(sink: W, config: MergeConfig) -> Result<Self, PipelineError> {
        let appender = FastaAppender::new(sink, config.line_width)?;
        MergeEngine::with_appender(appender, config)
    }

    fn with_appender(appender: FastaAppender<W>, config: MergeConfig) -> Result<Self, PipelineError> {
        let splitter = Splitter::new(config.threshold)?;
        let seen_ids = config.check_unique_ids.then(FxHashSet::default);
        Ok(MergeEngine {
            config,
            splitter,
            appender,
            seen_ids,
            seen_labels: FxHashSet::default(),
            stats: MergeStats::default(),
        })
    }

    pub fn config(&self) -> &MergeConfig {
        &self.config
    }

    pub fn stats(&self) -> &MergeStats {
        &self.stats
    }

    /// Appends one FASTA file, labelled by its base name.
    pub fn append_file(&mut self, path: &Path) -> Result<FileStats, PipelineError> {
        let label = label_for_path(path);
        let reader = open_input(path)?;
        self.append_labeled(reader, &label)
    }

    /// Appends files in the given order.
    pub fn append_files<P: AsRef<Path>>(&mut self, paths: &[P]) -> Result<MergeStats, PipelineError> {
        for path in paths {
            self.append_file(path.as_ref())?;
        }
        Ok(self.stats.clone())
    }

    /// Appends every record read from `reader` under the provenance `label`.
    ///
    /// # Arguments
    ///
    /// * `reader` - FASTA text, plain.
    /// * `label` - Prefix for every output identifier, used verbatim.
    ///
    /// # Returns
    /// FileStats for this input.
    ///
    pub fn append_labeled<R: Read>(&mut self, reader: R, label: &str) -> Result<FileStats, PipelineError> {
        if !self.seen_labels.insert(label.to_string()) {
            // Files such as g1.fa and g1.fna both label as g1.
            if self.seen_ids.is_some() {
                return Err(PipelineError::DuplicateLabel(label.to_string()));
            }
            warn!("Label '{}' used for more than one input; output identifiers may collide", label);
        }

        let records = RecordReader::new(reader, label, self.config.orphan_policy)?;
        let mut file_stats = FileStats {
            label: label.to_string(),
            skipped_lines: records.skipped_lines(),
            ..Default::default()
        };
        let write_err = |e: io::Error| PipelineError::IOError(format!("writing {}: {}", label, e));

        for result in records {
            let record = result?;
            let parts = self.splitter.parts_for(record.len());
            if parts > 1 {
                debug!(
                    "Splitting {}|{} ({} residues) into {} parts",
                    label, record.id_lossy(), record.len(), parts
                );
                file_stats.split_records += 1;
            }

            for unit in self.splitter.split(&record) {
                if let Some(seen) = self.seen_ids.as_mut() {
                    let id = unit.output_id();
                    if seen.contains(&id) {
                        return Err(PipelineError::DuplicateIdentifier(
                            String::from_utf8_lossy(&id).into_owned(),
                        ));
                    }
                    seen.insert(id);
                }
                self.appender.write_unit(&unit).map_err(write_err)?;
                file_stats.units += 1;
                if let EmittedUnit::Chunk(_) = unit {
                    file_stats.chunks += 1;
                }
            }

            file_stats.records += 1;
            file_stats.residues += record.len() as u64;
        }

        self.appender.flush().map_err(write_err)?;
        self.stats.absorb(&file_stats);
        info!(
            "Appended {}: {} records ({} split), {} sequences written, {} residues",
            label, file_stats.records, file_stats.split_records, file_stats.units, file_stats.residues
        );
        Ok(file_stats)
    }

    /// Flushes the sink and returns the totals.
    pub fn finish(mut self) -> Result<MergeStats, PipelineError> {
        self.appender.flush().map_err(|e| PipelineError::IOError(e.to_string()))?;
        Ok(self.stats)
    }

    /// Flushes and hands back the underlying sink.
    pub fn into_inner(self) -> Result<W, PipelineError> {
        self.appender.into_inner().map_err(|e| PipelineError::IOError(e.to_string()))
    }
}


/// Appends `inputs`, in order, to the existing file at `output`.
///
/// # Arguments
///
/// * `output` - Merged FASTA; must already exist.
/// * `inputs` - FASTA files, plain or gzipped.
/// * `config` - Split threshold, line width and input policies.
///
/// # Returns
/// MergeStats for this call.
///
pub fn append_fasta_files(output: &Path, inputs: &[PathBuf], config: &MergeConfig) -> Result<MergeStats, PipelineError> {
    let mut engine = MergeEngine::open(output, config.clone())?;
    engine.append_files(inputs)?;
    let stats = engine.finish()?;
    info!(
        "Merged {} files into {}: {} records, {} sequences",
        stats.files, output.display(), stats.records, stats.units
    );
    Ok(stats)
}
