use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};
use flate2::read::MultiGzDecoder;
use crate::config::defs::{PipelineError, FASTA_EXTS, GZIP_EXT};


/// Enum to hold either an uncompressed or gzipped file reader
pub enum FileReader {
    Uncompressed(BufReader<File>),
    Gzipped(MultiGzDecoder<File>),
}

impl Read for FileReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            FileReader::Uncompressed(r) => r.read(buf),
            FileReader::Gzipped(r) => r.read(buf),
        }
    }
}

/// Checks the first two bytes for the gzip magic number.
/// Files shorter than two bytes are treated as uncompressed.
pub fn is_gzipped(path: &Path) -> io::Result<bool> {
    let mut file = File::open(path)?;
    let mut buffer = [0u8; 2];
    match file.read_exact(&mut buffer) {
        Ok(()) => Ok(buffer == [0x1F, 0x8B]),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(e),
    }
}

/// Opens a plain or gzip-compressed file for reading.
///
/// # Arguments
///
/// * `path` - Valid path to a file.
///
/// # Returns
/// FileReader, or InputUnreadable if the file cannot be opened.
///
pub fn open_input(path: &Path) -> Result<FileReader, PipelineError> {
    let unreadable = |e: io::Error| PipelineError::InputUnreadable(format!("{}: {}", path.display(), e));
    let gz = is_gzipped(path).map_err(unreadable)?;
    let file = File::open(path).map_err(unreadable)?;
    Ok(if gz {
        FileReader::Gzipped(MultiGzDecoder::new(file))
    } else {
        FileReader::Uncompressed(BufReader::new(file))
    })
}


/// Strips the trailing gzip and FASTA extensions off a path.
///
/// # Arguments
///
/// * `path` - Any path.
///
/// # Returns
/// Tuple: (path without recognised extensions, removed extensions in file order).
///
pub fn extension_remover(path: &Path) -> (PathBuf, Vec<String>) {
    let mut stem = path.to_path_buf();
    let mut extensions = Vec::new();

    while let Some(ext) = stem.extension().and_then(|e| e.to_str()).map(str::to_string) {
        let known = ext.eq_ignore_ascii_case(GZIP_EXT)
            || FASTA_EXTS.iter().any(|&e| e.eq_ignore_ascii_case(&ext));
        if !known {
            break;
        }
        stem.set_extension("");
        extensions.push(ext);
    }

    extensions.reverse();
    (stem, extensions)
}

/// Provenance label for an input file: its base name without FASTA/gzip extensions.
/// `genomes/g1.fa` gives `g1`, `bin.3.fna.gz` gives `bin.3`.
pub fn label_for_path(path: &Path) -> String {
    let (stem, _) = extension_remover(path);
    stem.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

/// True when the path carries a FASTA extension, optionally followed by `.gz`.
pub fn is_fasta_path(path: &Path) -> bool {
    let (_, extensions) = extension_remover(path);
    extensions
        .iter()
        .any(|ext| FASTA_EXTS.iter().any(|&e| e.eq_ignore_ascii_case(ext)))
}

/// Lists the FASTA files directly inside `dir`, sorted by file name so that
/// merge order never depends on directory iteration order.
pub fn list_fasta_files(dir: &Path) -> Result<Vec<PathBuf>, PipelineError> {
    let entries = fs::read_dir(dir)
        .map_err(|e| PipelineError::InputUnreadable(format!("{}: {}", dir.display(), e)))?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| PipelineError::IOError(e.to_string()))?.path();
        if path.is_file() && is_fasta_path(&path) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Creates `path` empty, truncating anything from a previous run.
/// Merges only ever append, so a run starts here.
pub fn reset_output(path: &Path) -> Result<(), PipelineError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .map_err(|e| PipelineError::OutputNotWritable(format!("{}: {}", parent.display(), e)))?;
    }
    File::create(path)
        .map_err(|e| PipelineError::OutputNotWritable(format!("{}: {}", path.display(), e)))?;
    Ok(())
}

/// Resolves a user-supplied path against the working directory.
pub fn resolve_path(path: &str, cwd: &Path) -> PathBuf {
    let path = PathBuf::from(path);
    if path.is_absolute() {
        path
    } else {
        cwd.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use tempfile::tempdir;

    #[test]
    fn test_label_for_path() {
        assert_eq!(label_for_path(Path::new("g1.fa")), "g1");
        assert_eq!(label_for_path(Path::new("/data/new/bin.3.fna.gz")), "bin.3");
        assert_eq!(label_for_path(Path::new("genome")), "genome");
        assert_eq!(label_for_path(Path::new("sample.v2.FASTA")), "sample.v2");
    }

    #[test]
    fn test_extension_remover() {
        let (stem, exts) = extension_remover(Path::new("a/b.fna.gz"));
        assert_eq!(stem, PathBuf::from("a/b"));
        assert_eq!(exts, vec!["fna".to_string(), "gz".to_string()]);

        let (stem, exts) = extension_remover(Path::new("report.tsv"));
        assert_eq!(stem, PathBuf::from("report.tsv"));
        assert!(exts.is_empty());
    }

    #[test]
    fn test_list_fasta_files_sorted() -> io::Result<()> {
        let dir = tempdir()?;
        for name in ["b.fa", "a.fna.gz", "notes.txt", "c.fasta"] {
            File::create(dir.path().join(name))?;
        }
        let files = list_fasta_files(dir.path()).unwrap();
        let names: Vec<String> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.fna.gz", "b.fa", "c.fasta"]);
        Ok(())
    }

    #[test]
    fn test_open_input_gzipped() -> io::Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("g.fa.gz");
        let mut encoder = GzEncoder::new(File::create(&path)?, Compression::default());
        encoder.write_all(b">c1\nACGT\n")?;
        encoder.finish()?;

        let mut reader = open_input(&path).unwrap();
        assert!(matches!(reader, FileReader::Gzipped(_)));
        let mut text = String::new();
        reader.read_to_string(&mut text)?;
        assert_eq!(text, ">c1\nACGT\n");
        Ok(())
    }

    #[test]
    fn test_open_input_missing() {
        let result = open_input(Path::new("/definitely/not/here.fa"));
        assert!(matches!(result, Err(PipelineError::InputUnreadable(_))));
    }

    #[test]
    fn test_reset_output_truncates() -> io::Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("out").join("merged.fa");
        reset_output(&path).unwrap();
        fs::write(&path, b">old\nA\n")?;
        reset_output(&path).unwrap();
        assert_eq!(fs::metadata(&path)?.len(), 0);
        Ok(())
    }
}
