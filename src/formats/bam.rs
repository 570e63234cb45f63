//! BAM/SAM/CRAM adapter
//!
//! Reads unaligned concatemers and aligned monomers, writes unaligned
//! monomer records, and writes aligned monomers back out tagged with
//! their classification. Uses rust-htslib for the file formats.

use crate::core::assembler::{AlignmentRecord, ConcatemerAlignGroup};
use crate::core::digest::{
    Concatemer, CoordinateRecord, Monomer, TagOptions, COORDINATE_TAG, MOLECULE_TAG,
};
use crate::core::flags::FLAG_UNMAPPED;
use crate::core::tags::{ArrayValue, SamTag, TagValue};
use crate::core::{PoreCError, Result};
use rust_htslib::bam::header::HeaderRecord;
use rust_htslib::bam::record::Aux;
use rust_htslib::bam::{self, Header, HeaderView, Read, Record};
use std::path::{Path, PathBuf};

/// Alignment category written by [`AnnotatedBamWriter`]
pub const CATEGORY_TAG: &str = "Xa";
/// Alignment strand written by [`AnnotatedBamWriter`]
pub const STRAND_TAG: &str = "Xs";

impl From<rust_htslib::errors::Error> for PoreCError {
    fn from(e: rust_htslib::errors::Error) -> Self {
        PoreCError::Bam(e.to_string())
    }
}

/// Whether `path` names a BAM, SAM or CRAM file
pub fn is_alignment_path(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("bam") | Some("sam") | Some("cram")
    )
}

/// Convert an aux field to a [`TagValue`]
pub fn aux_to_value(aux: Aux<'_>) -> TagValue {
    match aux {
        Aux::Char(c) => TagValue::Char(c),
        Aux::I8(v) => TagValue::Int(v as i64),
        Aux::U8(v) => TagValue::Int(v as i64),
        Aux::I16(v) => TagValue::Int(v as i64),
        Aux::U16(v) => TagValue::Int(v as i64),
        Aux::I32(v) => TagValue::Int(v as i64),
        Aux::U32(v) => TagValue::Int(v as i64),
        Aux::Float(v) => TagValue::Float(v),
        Aux::Double(v) => TagValue::Float(v as f32),
        Aux::String(s) => TagValue::String(s.to_string()),
        Aux::HexByteArray(s) => TagValue::Hex(s.to_string()),
        Aux::ArrayI8(a) => TagValue::Array(ArrayValue::Int8(a.iter().collect())),
        Aux::ArrayU8(a) => TagValue::Array(ArrayValue::UInt8(a.iter().collect())),
        Aux::ArrayI16(a) => TagValue::Array(ArrayValue::Int16(a.iter().collect())),
        Aux::ArrayU16(a) => TagValue::Array(ArrayValue::UInt16(a.iter().collect())),
        Aux::ArrayI32(a) => TagValue::Array(ArrayValue::Int32(a.iter().collect())),
        Aux::ArrayU32(a) => TagValue::Array(ArrayValue::UInt32(a.iter().collect())),
        Aux::ArrayFloat(a) => TagValue::Array(ArrayValue::Float(a.iter().collect())),
    }
}

fn push_tag(record: &mut Record, tag: &SamTag) -> Result<()> {
    let aux = match &tag.value {
        TagValue::Char(c) => Aux::Char(*c),
        TagValue::Int(v) => match *v {
            v if i32::try_from(v).is_ok() => Aux::I32(v as i32),
            v if u32::try_from(v).is_ok() => Aux::U32(v as u32),
            _ => return Err(PoreCError::InvalidTag(tag.to_string())),
        },
        TagValue::Float(v) => Aux::Float(*v),
        TagValue::String(s) => Aux::String(s),
        TagValue::Hex(s) => Aux::HexByteArray(s),
        TagValue::Array(ArrayValue::Int8(v)) => Aux::ArrayI8(v.into()),
        TagValue::Array(ArrayValue::UInt8(v)) => Aux::ArrayU8(v.into()),
        TagValue::Array(ArrayValue::Int16(v)) => Aux::ArrayI16(v.into()),
        TagValue::Array(ArrayValue::UInt16(v)) => Aux::ArrayU16(v.into()),
        TagValue::Array(ArrayValue::Int32(v)) => Aux::ArrayI32(v.into()),
        TagValue::Array(ArrayValue::UInt32(v)) => Aux::ArrayU32(v.into()),
        TagValue::Array(ArrayValue::Float(v)) => Aux::ArrayFloat(v.into()),
    };
    record.push_aux(tag.name.as_bytes(), aux)?;
    Ok(())
}

fn read_name(record: &Record) -> String {
    String::from_utf8_lossy(record.qname()).into_owned()
}

/// Header for monomer output
///
/// At most one BAM/SAM/CRAM among `source_files` may contribute its
/// header; with none, a minimal `@HD VN:1.6 SO:unknown` header is used.
pub fn alignment_header(source_files: &[PathBuf]) -> Result<Header> {
    let sources: Vec<PathBuf> = source_files
        .iter()
        .filter(|p| is_alignment_path(p))
        .cloned()
        .collect();
    let mut header = match sources.as_slice() {
        [] => {
            let mut header = Header::new();
            let mut hd = HeaderRecord::new(b"HD");
            hd.push_tag(b"VN", "1.6");
            hd.push_tag(b"SO", "unknown");
            header.push_record(&hd);
            header
        }
        [source] => {
            let reader = bam::Reader::from_path(source)?;
            Header::from_template(reader.header())
        }
        _ => return Err(PoreCError::TooManySourceHeaders(sources)),
    };
    push_program(&mut header, "porec-digest");
    Ok(header)
}

fn push_program(header: &mut Header, id: &str) {
    let mut pg = HeaderRecord::new(b"PG");
    pg.push_tag(b"ID", id);
    pg.push_tag(b"PN", "porec");
    pg.push_tag(b"VN", env!("CARGO_PKG_VERSION"));
    header.push_record(&pg);
}

/// Reference names and lengths from a header
pub fn reference_sizes(header: &HeaderView) -> Vec<(String, u64)> {
    (0..header.target_count())
        .map(|tid| {
            (
                String::from_utf8_lossy(header.tid2name(tid)).into_owned(),
                header.target_len(tid).unwrap_or(0),
            )
        })
        .collect()
}

/// Unaligned BAM reader yielding [`Concatemer`]s
pub struct UnalignedBamReader {
    reader: bam::Reader,
    record: Record,
    options: TagOptions,
    failed: bool,
}

impl UnalignedBamReader {
    pub fn from_path(path: &Path, options: TagOptions) -> Result<Self> {
        Ok(Self {
            reader: bam::Reader::from_path(path)?,
            record: Record::new(),
            options,
            failed: false,
        })
    }

    fn convert(&self) -> Result<Concatemer> {
        let record = &self.record;
        let id = read_name(record);
        let qual = record.qual();
        // 0xff marks a missing quality string
        let quality = match qual.first() {
            None | Some(0xff) => None,
            Some(_) => Some(qual.to_vec()),
        };
        let mut tags = Vec::new();
        for aux in record.aux_iter() {
            let (name, value) = aux?;
            tags.push(SamTag::new(
                String::from_utf8_lossy(name).into_owned(),
                aux_to_value(value),
            ));
        }
        Concatemer::from_parts(id, record.seq().as_bytes(), quality, tags, &self.options)
    }
}

impl Iterator for UnalignedBamReader {
    type Item = Result<Concatemer>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let item = match self.reader.read(&mut self.record)? {
            Ok(()) => self.convert(),
            Err(e) => Err(e.into()),
        };
        self.failed = matches!(&item, Err(e) if !e.is_record_anomaly());
        Some(item)
    }
}

/// Writer for unaligned monomer records
pub struct MonomerBamWriter {
    writer: bam::Writer,
    records: usize,
}

impl MonomerBamWriter {
    /// Output format follows the extension: `.sam`, `.cram` or BAM
    pub fn from_path(path: &Path, header: &Header) -> Result<Self> {
        let format = match path.extension().and_then(|e| e.to_str()) {
            Some("sam") => bam::Format::Sam,
            Some("cram") => bam::Format::Cram,
            _ => bam::Format::Bam,
        };
        Ok(Self {
            writer: bam::Writer::from_path(path, header, format)?,
            records: 0,
        })
    }

    pub fn set_threads(&mut self, threads: usize) -> Result<()> {
        self.writer.set_threads(threads)?;
        Ok(())
    }

    pub fn write_monomer(&mut self, monomer: &Monomer) -> Result<()> {
        let qual = monomer
            .quality
            .clone()
            .unwrap_or_else(|| vec![0xff; monomer.len()]);
        let mut record = Record::new();
        record.set(monomer.read_id.as_bytes(), None, &monomer.sequence, &qual);
        record.set_flags(FLAG_UNMAPPED);
        record.set_tid(-1);
        record.set_pos(-1);
        record.set_mtid(-1);
        record.set_mpos(-1);
        for tag in monomer.output_tags()? {
            push_tag(&mut record, &tag)?;
        }
        self.writer.write(&record)?;
        self.records += 1;
        Ok(())
    }

    pub fn records_written(&self) -> usize {
        self.records
    }
}

/// Convert an aligned monomer record
///
/// `Xc` must be present and valid. Without `MI`, the concatemer id is
/// the read name minus its trailing `:start:end`.
pub fn alignment_record(record: &Record, header: &HeaderView) -> Result<AlignmentRecord> {
    let name = read_name(record);
    let ints = match record.aux(COORDINATE_TAG.as_bytes()) {
        Ok(aux) => aux_to_value(aux)
            .as_ints()
            .ok_or_else(|| PoreCError::coordinate(&name, "Xc is not an integer array"))?,
        Err(_) => return Err(PoreCError::coordinate(&name, "missing Xc tag")),
    };
    let coords = CoordinateRecord::from_ints(&name, &ints)?;
    let concatemer_id = match record.aux(MOLECULE_TAG.as_bytes()) {
        Ok(Aux::String(id)) => id.to_string(),
        _ => name.rsplitn(3, ':').nth(2).unwrap_or(name.as_str()).to_string(),
    };
    let mut alignment =
        AlignmentRecord::new(name, concatemer_id, coords, record.flags()).with_mapq(record.mapq());
    if !record.is_unmapped() && record.tid() >= 0 {
        let chrom = String::from_utf8_lossy(header.tid2name(record.tid() as u32)).into_owned();
        let start = record.pos().max(0) as u64;
        let end = record.cigar().end_pos().max(0) as u64;
        alignment = alignment.with_reference(chrom, start, Some(end));
    }
    Ok(alignment)
}

/// Aligned monomer reader yielding [`AlignmentRecord`]s
pub struct AlignmentReader {
    reader: bam::Reader,
    header: HeaderView,
    record: Record,
    failed: bool,
}

impl AlignmentReader {
    pub fn from_path(path: &Path) -> Result<Self> {
        let reader = bam::Reader::from_path(path)?;
        let header = reader.header().clone();
        Ok(Self {
            reader,
            header,
            record: Record::new(),
            failed: false,
        })
    }

    pub fn set_threads(&mut self, threads: usize) -> Result<()> {
        self.reader.set_threads(threads)?;
        Ok(())
    }

    pub fn header(&self) -> &HeaderView {
        &self.header
    }
}

impl Iterator for AlignmentReader {
    type Item = Result<AlignmentRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let item = match self.reader.read(&mut self.record)? {
            Ok(()) => alignment_record(&self.record, &self.header),
            Err(e) => Err(e.into()),
        };
        self.failed = item.is_err();
        Some(item)
    }
}
/// Writes the source alignments of each concatemer group in concatemer
/// order, tagged with their category (`Xa`) and strand (`Xs`)
///
/// A second reader follows the same input, so groups must arrive in
/// input order and hold every record of their stretch of the file. That
/// is what contiguous grouping produces. Memory is one group's records.
pub struct AnnotatedBamWriter {
    source: bam::Reader,
    writer: bam::Writer,
    pending: Vec<Record>,
    records: usize,
}

impl AnnotatedBamWriter {
    pub fn from_paths(source: &Path, output: &Path) -> Result<Self> {
        let source = bam::Reader::from_path(source)?;
        let mut header = Header::from_template(source.header());
        push_program(&mut header, "porec-parse-bam");
        let writer = bam::Writer::from_path(output, &header, bam::Format::Bam)?;
        Ok(Self {
            source,
            writer,
            pending: Vec::new(),
            records: 0,
        })
    }

    pub fn set_threads(&mut self, threads: usize) -> Result<()> {
        self.source.set_threads(threads)?;
        self.writer.set_threads(threads)?;
        Ok(())
    }

    pub fn write_group(&mut self, group: &ConcatemerAlignGroup) -> Result<()> {
        self.pending.clear();
        for _ in 0..group.len() {
            let mut record = Record::new();
            match self.source.read(&mut record) {
                Some(Ok(())) => self.pending.push(record),
                Some(Err(e)) => return Err(e.into()),
                None => {
                    return Err(PoreCError::Bam(format!(
                        "input ended inside concatemer {}",
                        group.concatemer_id
                    )))
                }
            }
        }
        for alignment in &group.records {
            let idx = self
                .pending
                .iter()
                .position(|r| same_alignment(r, alignment))
                .ok_or_else(|| {
                    PoreCError::Bam(format!(
                        "{} is not in the input stretch for concatemer {}",
                        alignment.read_name, group.concatemer_id
                    ))
                })?;
            let mut record = self.pending.swap_remove(idx);
            for name in [CATEGORY_TAG, STRAND_TAG] {
                // replaced if the input already carries it
                let _ = record.remove_aux(name.as_bytes());
            }
            let category = alignment.category().as_str().to_string();
            push_tag(&mut record, &SamTag::new(CATEGORY_TAG, TagValue::String(category)))?;
            let strand = alignment.strand().to_char() as u8;
            push_tag(&mut record, &SamTag::new(STRAND_TAG, TagValue::Char(strand)))?;
            self.writer.write(&record)?;
            self.records += 1;
        }
        Ok(())
    }

    pub fn records_written(&self) -> usize {
        self.records
    }
}

fn same_alignment(record: &Record, alignment: &AlignmentRecord) -> bool {
    record.qname() == alignment.read_name.as_bytes()
        && record.flags() == alignment.flag
        && (alignment.reference_name.is_none()
            || record.pos() == alignment.reference_start as i64)
}
