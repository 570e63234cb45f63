//! Tab-separated contact outputs
//!
//! [`PairsWriter`] writes contacts in the 4DN pairs layout (1-based
//! positions) with two extra columns. [`ChromunityWriter`] writes the
//! merged per-concatemer segments used for chromunity analysis.

use crate::core::contacts::{ContactPair, Segment};
use crate::core::Result;
use std::io::Write;

pub const PAIRS_COLUMNS: [&str; 9] = [
    "readID", "chrom1", "pos1", "chrom2", "pos2", "strand1", "strand2", "direct", "distance",
];

pub const CHROMUNITY_COLUMNS: [&str; 9] = [
    "concatemer_id",
    "read_name",
    "chrom",
    "start",
    "end",
    "strand",
    "mapq",
    "num_monomers",
    "sub_read_index",
];

/// Writer for `.pairs` contact records
pub struct PairsWriter<W: Write> {
    writer: W,
    records: usize,
}

impl<W: Write> PairsWriter<W> {
    /// Write the header; `chrom_sizes` become `#chromsize:` lines
    pub fn new(mut writer: W, chrom_sizes: &[(String, u64)]) -> Result<Self> {
        writeln!(writer, "## pairs format v1.0")?;
        writeln!(writer, "#shape: upper triangle")?;
        for (name, len) in chrom_sizes {
            writeln!(writer, "#chromsize: {} {}", name, len)?;
        }
        writeln!(writer, "#columns: {}", PAIRS_COLUMNS.join(" "))?;
        Ok(Self { writer, records: 0 })
    }

    pub fn write_contact(&mut self, contact: &ContactPair) -> Result<()> {
        let (l, r) = (&contact.left, &contact.right);
        let distance = contact
            .distance
            .map_or_else(|| ".".to_string(), |d| d.to_string());
        writeln!(
            self.writer,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
            contact.concatemer_id,
            l.reference_name,
            l.start + 1,
            r.reference_name,
            r.start + 1,
            l.strand,
            r.strand,
            if contact.is_direct { "direct" } else { "indirect" },
            distance
        )?;
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
}

/// Writer for merged chromunity segments, 0-based half-open
pub struct ChromunityWriter<W: Write> {
    writer: W,
    records: usize,
}

impl<W: Write> ChromunityWriter<W> {
    pub fn new(mut writer: W) -> Result<Self> {
        writeln!(writer, "#{}", CHROMUNITY_COLUMNS.join("\t"))?;
        Ok(Self { writer, records: 0 })
    }

    pub fn write_segments(&mut self, concatemer_id: &str, segments: &[Segment]) -> Result<()> {
        for s in segments {
            writeln!(
                self.writer,
                "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
                concatemer_id,
                s.read_name,
                s.reference_name,
                s.start,
                s.end,
                s.strand,
                s.mapq,
                s.num_monomers,
                s.sub_read_index
            )?;
            self.records += 1;
        }
        Ok(())
    }

    pub fn records_written(&self) -> usize {
        self.records
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::flags::Strand;

    fn segment(idx: usize, chrom: &str, start: u64, strand: Strand) -> Segment {
        Segment {
            read_name: format!("c:{}", idx),
            sub_read_index: idx,
            reference_name: chrom.to_string(),
            strand,
            start,
            end: start + 100,
            mapq: 60,
            num_monomers: 1,
        }
    }

    #[test]
    fn test_pairs_output() {
        let contact = ContactPair {
            concatemer_id: "c".to_string(),
            left: segment(0, "chr1", 99, Strand::Plus),
            right: segment(1, "chr2", 0, Strand::Minus),
            is_direct: true,
            is_cis: false,
            distance: None,
        };
        let mut buf = Vec::new();
        {
            let mut writer = PairsWriter::new(&mut buf, &[("chr1".to_string(), 1000)]).unwrap();
            writer.write_contact(&contact).unwrap();
            assert_eq!(writer.records_written(), 1);
        }
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "## pairs format v1.0");
        assert_eq!(lines[2], "#chromsize: chr1 1000");
        assert!(lines[3].starts_with("#columns: readID chrom1"));
        assert_eq!(lines[4], "c\tchr1\t100\tchr2\t1\t+\t-\tdirect\t.");
    }

    #[test]
    fn test_chromunity_output() {
        let mut buf = Vec::new();
        {
            let mut writer = ChromunityWriter::new(&mut buf).unwrap();
            writer
                .write_segments("c", &[segment(0, "chr1", 10, Strand::Plus)])
                .unwrap();
        }
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(
            text.lines().nth(1),
            Some("c\tc:0\tchr1\t10\t110\t+\t60\t1\t0")
        );
    }
}
