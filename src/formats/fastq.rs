//! FASTQ adapter
//!
//! Concatemers are read from FASTQ records whose header comment holds
//! SAM-style `TAG:TYPE:VALUE` fields, the way basecallers emit them:
//!
//! ```text
//! @read1	RG:Z:run1	MM:Z:C+m?,0;	ML:B:C,200
//! ```
//!
//! Monomers are written back the same way, with `MI` and `Xc` appended.

use crate::core::digest::{Concatemer, Monomer, TagOptions};
use crate::core::io::{open_reader, ByteLineIterator};
use crate::core::tags::SamTag;
use crate::core::{PoreCError, Result};
use log::debug;
use memchr::memchr2;
use std::io::{BufRead, Write};
use std::path::Path;

/// Phred score offset used in FASTQ text
pub const PHRED_OFFSET: u8 = 33;

/// Streaming FASTQ reader yielding [`Concatemer`]s
pub struct FastqReader<R: BufRead> {
    lines: ByteLineIterator<R>,
    options: TagOptions,
    failed: bool,
}

impl FastqReader<Box<dyn BufRead>> {
    /// Open a plain, gzip or bzip2 FASTQ file
    pub fn from_path(path: &Path, options: TagOptions) -> Result<Self> {
        Ok(Self::new(open_reader(path)?, options))
    }
}

impl<R: BufRead> FastqReader<R> {
    pub fn new(reader: R, options: TagOptions) -> Self {
        Self {
            lines: ByteLineIterator::new(reader),
            options,
            failed: false,
        }
    }

    fn invalid(&self, message: impl Into<String>) -> PoreCError {
        PoreCError::InvalidFastq {
            line: self.lines.line_number(),
            message: message.into(),
        }
    }

    fn required_line(&mut self, what: &str) -> Result<Vec<u8>> {
        match self.lines.next_line() {
            Some(Ok(line)) => Ok(line.to_vec()),
            Some(Err(e)) => Err(e.into()),
            None => Err(self.invalid(format!("truncated record, missing {}", what))),
        }
    }

    fn read_record(&mut self) -> Option<Result<Concatemer>> {
        let header = loop {
            match self.lines.next_line()? {
                Ok(line) if line.is_empty() => continue,
                Ok(line) => break line.to_vec(),
                Err(e) => return Some(Err(e.into())),
            }
        };
        Some(self.parse_record(header))
    }

    fn parse_record(&mut self, header: Vec<u8>) -> Result<Concatemer> {
        if header.first() != Some(&b'@') {
            return Err(self.invalid("header does not start with '@'"));
        }
        let header = std::str::from_utf8(&header[1..])
            .map_err(|_| self.invalid("header is not valid UTF-8"))?;
        let (id, comment) = match memchr2(b' ', b'\t', header.as_bytes()) {
            Some(pos) => (&header[..pos], &header[pos + 1..]),
            None => (header, ""),
        };
        if id.is_empty() {
            return Err(self.invalid("empty read id"));
        }
        let mut tags = Vec::new();
        for field in comment.split(|c| c == '\t' || c == ' ').filter(|f| !f.is_empty()) {
            match SamTag::parse(field) {
                Ok(tag) => tags.push(tag),
                Err(_) => debug!("{}: ignoring comment field {:?}", id, field),
            }
        }
        let id = id.to_string();

        let sequence = self.required_line("sequence")?;
        let plus = self.required_line("separator")?;
        if plus.first() != Some(&b'+') {
            return Err(self.invalid("separator line does not start with '+'"));
        }
        let quality = self.required_line("quality")?;
        if quality.len() != sequence.len() {
            return Err(self.invalid(format!(
                "{} quality values for {} bases",
                quality.len(),
                sequence.len()
            )));
        }
        let quality = quality
            .iter()
            .map(|&q| q.checked_sub(PHRED_OFFSET))
            .collect::<Option<Vec<u8>>>()
            .ok_or_else(|| self.invalid("quality character below '!'"))?;

        Concatemer::from_parts(id, sequence, Some(quality), tags, &self.options)
    }
}

impl<R: BufRead> Iterator for FastqReader<R> {
    type Item = Result<Concatemer>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let item = self.read_record()?;
        self.failed = matches!(&item, Err(e) if !e.is_record_anomaly());
        Some(item)
    }
}

/// FASTQ writer for [`Monomer`]s
pub struct FastqWriter<W: Write> {
    writer: W,
    records: usize,
}

impl<W: Write> FastqWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer, records: 0 }
    }

    /// Write one record; tags go into the tab-separated header comment
    ///
    /// A monomer without qualities gets `!` (Q0) for every base.
    pub fn write_monomer(&mut self, monomer: &Monomer) -> Result<()> {
        let w = &mut self.writer;
        write!(w, "@{}", monomer.read_id)?;
        for tag in monomer.output_tags()? {
            write!(w, "\t{}", tag)?;
        }
        w.write_all(b"\n")?;
        w.write_all(&monomer.sequence)?;
        w.write_all(b"\n+\n")?;
        match &monomer.quality {
            Some(quality) => {
                let text: Vec<u8> = quality
                    .iter()
                    .map(|&q| q.saturating_add(PHRED_OFFSET))
                    .collect();
                w.write_all(&text)?;
            }
            None => w.write_all(&vec![PHRED_OFFSET; monomer.len()])?,
        }
        w.write_all(b"\n")?;
        self.records += 1;
        Ok(())
    }

    pub fn records_written(&self) -> usize {
        self.records
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}
