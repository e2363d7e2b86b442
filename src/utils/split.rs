use std::io::{self, Write};
use std::slice::Chunks;
use crate::config::defs::{PipelineError, PART_SUFFIX, PROVENANCE_SEPARATOR};
use crate::utils::fasta::Record;


/// A contiguous piece of an oversized record. `part_index` starts at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk<'a> {
    pub record: &'a Record,
    pub part_index: usize,
    pub residues: &'a [u8],
}

/// What the writer receives: a record kept whole, or one of its chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmittedUnit<'a> {
    Whole(&'a Record),
    Chunk(Chunk<'a>),
}

impl<'a> EmittedUnit<'a> {
    pub fn record(&self) -> &'a Record {
        match self {
            EmittedUnit::Whole(record) => record,
            EmittedUnit::Chunk(chunk) => chunk.record,
        }
    }

    pub fn residues(&self) -> &'a [u8] {
        match self {
            EmittedUnit::Whole(record) => &record.sequence,
            EmittedUnit::Chunk(chunk) => chunk.residues,
        }
    }

    /// `<source>|<id>` for whole records, `<source>|<id>_part<n>` for chunks.
    /// The header bytes are copied as read, so the result need not be UTF-8.
    pub fn output_id(&self) -> Vec<u8> {
        let record = self.record();
        let mut id = Vec::with_capacity(record.source_file.len() + record.original_id.len() + 16);
        id.extend_from_slice(record.source_file.as_bytes());
        id.push(PROVENANCE_SEPARATOR);
        id.extend_from_slice(&record.original_id);
        if let EmittedUnit::Chunk(chunk) = self {
            id.extend_from_slice(PART_SUFFIX.as_bytes());
            id.extend_from_slice(chunk.part_index.to_string().as_bytes());
        }
        id
    }

    /// Streams the identifier without building an intermediate buffer.
    pub fn write_id<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        let record = self.record();
        writer.write_all(record.source_file.as_bytes())?;
        writer.write_all(&[PROVENANCE_SEPARATOR])?;
        writer.write_all(&record.original_id)?;
        if let EmittedUnit::Chunk(chunk) = self {
            write!(writer, "{}{}", PART_SUFFIX, chunk.part_index)?;
        }
        Ok(())
    }
}


/// Tiles records into pieces no longer than `maxlen`.
#[derive(Debug, Clone, Copy)]
pub struct Splitter {
    maxlen: usize,
}

impl Splitter {
    pub fn new(maxlen: usize) -> Result<Self, PipelineError> {
        if maxlen == 0 {
            return Err(PipelineError::InvalidConfig("split threshold must be positive".to_string()));
        }
        Ok(Splitter { maxlen })
    }

    pub fn maxlen(&self) -> usize {
        self.maxlen
    }

    /// Number of units a sequence of `len` residues turns into.
    pub fn parts_for(&self, len: usize) -> usize {
        if len <= self.maxlen {
            1
        } else {
            len.div_ceil(self.maxlen)
        }
    }

    /// Records up to `maxlen` residues (empty ones included) come back whole.
    /// Longer ones are cut left to right into `maxlen`-sized chunks, the last
    /// holding the remainder. Nothing overlaps and nothing is dropped.
    pub fn split<'a>(&self, record: &'a Record) -> Units<'a> {
        if record.len() <= self.maxlen {
            Units::Whole(Some(record))
        } else {
            Units::Chunks {
                record,
                chunks: record.sequence.chunks(self.maxlen),
                next_index: 1,
            }
        }
    }
}

/// Iterator returned by [`Splitter::split`].
pub enum Units<'a> {
    Whole(Option<&'a Record>),
    Chunks {
        record: &'a Record,
        chunks: Chunks<'a, u8>,
        next_index: usize,
    },
}

impl<'a> Iterator for Units<'a> {
    type Item = EmittedUnit<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            Units::Whole(record) => record.take().map(EmittedUnit::Whole),
            Units::Chunks { record, chunks, next_index } => {
                let residues = chunks.next()?;
                let part_index = *next_index;
                *next_index += 1;
                Some(EmittedUnit::Chunk(Chunk { record: *record, part_index, residues }))
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = match self {
            Units::Whole(record) => usize::from(record.is_some()),
            Units::Chunks { chunks, .. } => chunks.len(),
        };
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Units<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn record(id: &str, len: usize) -> Record {
        let sequence = (0..len).map(|i| b"ACGT"[i % 4]).collect();
        Record { original_id: id.as_bytes().to_vec(), sequence, source_file: Arc::from("g1") }
    }

    #[test]
    fn test_zero_threshold_rejected() {
        assert!(matches!(Splitter::new(0), Err(PipelineError::InvalidConfig(_))));
    }

    #[test]
    fn test_short_record_passes_through() {
        let splitter = Splitter::new(10).unwrap();
        for len in [0, 1, 10] {
            let rec = record("ctg1", len);
            let units: Vec<EmittedUnit> = splitter.split(&rec).collect();
            assert_eq!(units.len(), 1);
            assert_eq!(units[0], EmittedUnit::Whole(&rec));
            assert_eq!(units[0].output_id(), b"g1|ctg1");
            assert_eq!(units[0].residues().len(), len);
        }
    }

    #[test]
    fn test_oversized_record_tiles_exactly() {
        let splitter = Splitter::new(10).unwrap();
        let rec = record("ctg1", 25);
        let units: Vec<EmittedUnit> = splitter.split(&rec).collect();

        let lengths: Vec<usize> = units.iter().map(|u| u.residues().len()).collect();
        assert_eq!(lengths, vec![10, 10, 5]);

        let ids: Vec<Vec<u8>> = units.iter().map(|u| u.output_id()).collect();
        assert_eq!(
            ids,
            vec![b"g1|ctg1_part1".to_vec(), b"g1|ctg1_part2".to_vec(), b"g1|ctg1_part3".to_vec()]
        );

        let rejoined: Vec<u8> = units.iter().flat_map(|u| u.residues().iter().copied()).collect();
        assert_eq!(rejoined, rec.sequence);
    }

    #[test]
    fn test_evenly_divisible_last_chunk_is_full() {
        let splitter = Splitter::new(7).unwrap();
        let rec = record("c", 21);
        let units: Vec<EmittedUnit> = splitter.split(&rec).collect();
        assert_eq!(units.len(), 3);
        assert!(units.iter().all(|u| u.residues().len() == 7));
        assert_eq!(splitter.parts_for(21), 3);
    }

    #[test]
    fn test_chunk_invariants_across_lengths() {
        for maxlen in 1..=9 {
            let splitter = Splitter::new(maxlen).unwrap();
            for len in 0..=40 {
                let rec = record("r", len);
                let units: Vec<EmittedUnit> = splitter.split(&rec).collect();
                assert_eq!(units.len(), splitter.parts_for(len));

                let total: usize = units.iter().map(|u| u.residues().len()).sum();
                assert_eq!(total, len);

                if len > maxlen {
                    let (last, rest) = units.split_last().unwrap();
                    assert!(rest.iter().all(|u| u.residues().len() == maxlen));
                    assert!((1..=maxlen).contains(&last.residues().len()));
                    for (i, unit) in units.iter().enumerate() {
                        match unit {
                            EmittedUnit::Chunk(chunk) => assert_eq!(chunk.part_index, i + 1),
                            EmittedUnit::Whole(_) => panic!("expected chunk"),
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn test_write_id_matches_output_id() {
        let splitter = Splitter::new(3).unwrap();
        let rec = record("contig 7", 5);
        for unit in splitter.split(&rec) {
            let mut buf = Vec::new();
            unit.write_id(&mut buf).unwrap();
            assert_eq!(buf, unit.output_id());
        }
    }

    #[test]
    fn test_non_utf8_header_bytes_preserved() {
        let splitter = Splitter::new(2).unwrap();
        let rec = Record { original_id: b"x\xff".to_vec(), sequence: b"ACG".to_vec(), source_file: Arc::from("g") };
        let ids: Vec<Vec<u8>> = splitter.split(&rec).map(|u| u.output_id()).collect();
        assert_eq!(ids, vec![b"g|x\xff_part1".to_vec(), b"g|x\xff_part2".to_vec()]);
    }

    #[test]
    fn test_size_hint() {
        let splitter = Splitter::new(4).unwrap();
        let rec = record("r", 9);
        let mut units = splitter.split(&rec);
        assert_eq!(units.len(), 3);
        units.next();
        assert_eq!(units.len(), 2);
    }
}
