//! Property-based tests for FASTQ monomer output
//!
//! Monomers written to (optionally gzipped) FASTQ and read back keep
//! their sequence, qualities and tags.

use porec::core::io::create_writer;
use porec::core::tags::SamTag;
use porec::core::{
    digest, find_files, Concatemer, CoordinateRecord, EnzymeCutter, TagOptions, COORDINATE_TAG,
    MOLECULE_TAG,
};
use porec::formats::{FastqReader, FastqWriter};
use proptest::prelude::*;
use std::io::Write;
use tempfile::tempdir;

fn arb_read() -> impl Strategy<Value = (Vec<u8>, Vec<u8>)> {
    prop::collection::vec(
        prop_oneof![
            5 => prop::sample::select(vec!["A", "C", "G", "T"]),
            1 => Just("GATC"),
        ],
        1..80,
    )
    .prop_flat_map(|parts| {
        let seq = parts.concat().into_bytes();
        let len = seq.len();
        (Just(seq), prop::collection::vec(0u8..60, len))
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    #[test]
    fn prop_fastq_monomer_roundtrip((seq, quals) in arb_read(), gz in any::<bool>()) {
        let dir = tempdir().unwrap();
        let path = dir.path().join(if gz { "out.fastq.gz" } else { "out.fastq" });

        let n_c = seq.iter().filter(|&&b| b == b'C').count();
        let tags = vec![
            SamTag::parse("RG:Z:run1").unwrap(),
            SamTag::parse(&format!("MM:Z:C+m?{};", ",0".repeat(n_c))).unwrap(),
            SamTag::parse(&format!("ML:B:C{}", ",7".repeat(n_c))).unwrap(),
        ];
        let concatemer = Concatemer::from_parts(
            "read1",
            seq.clone(),
            Some(quals.clone()),
            tags,
            &TagOptions::default(),
        )
        .unwrap();
        let monomers = digest(&concatemer, &EnzymeCutter::from_name("DpnII").unwrap());
        {
            let mut writer = FastqWriter::new(create_writer(&path).unwrap());
            for m in &monomers {
                writer.write_monomer(m).unwrap();
            }
            writer.flush().unwrap();
        }

        let reread: Vec<Concatemer> = FastqReader::from_path(&path, TagOptions::default())
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        prop_assert_eq!(reread.len(), monomers.len());
        let mut calls = 0;
        for (m, r) in monomers.iter().zip(&reread) {
            prop_assert_eq!(&r.id, &m.read_id);
            prop_assert_eq!(&r.sequence, &m.sequence);
            prop_assert_eq!(&r.quality, &m.quality);
            prop_assert_eq!(&r.mod_calls, &m.mod_calls);
            calls += r.mod_calls.as_ref().map_or(0, |c| c.num_calls());

            let mi = r.tags.iter().find(|t| t.name == MOLECULE_TAG).unwrap();
            prop_assert_eq!(mi.value.as_str(), Some("read1"));
            let xc = r.tags.iter().find(|t| t.name == COORDINATE_TAG).unwrap();
            let coords = CoordinateRecord::from_ints(&r.id, &xc.value.as_ints().unwrap()).unwrap();
            prop_assert_eq!(coords, m.coords);
        }
        prop_assert_eq!(calls, n_c);
    }
}

#[test]
fn test_remove_tags_on_read() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("reads.fastq");
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(file, "@r1\tmv:B:c,5,1,0,1\tRG:Z:x\nACGT\n+\nIIII").unwrap();
    drop(file);

    let options = TagOptions {
        remove_tags: vec!["mv".to_string()],
        ..Default::default()
    };
    let reads: Vec<Concatemer> = FastqReader::from_path(&path, options)
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(reads[0].tags.len(), 1);
    assert_eq!(reads[0].tags[0].name, "RG");
}

#[test]
fn test_find_fastq_inputs() {
    let dir = tempdir().unwrap();
    std::fs::create_dir(dir.path().join("pass")).unwrap();
    for name in ["b.fastq", "a.fastq", "pass/c.fastq", "notes.txt"] {
        std::fs::write(dir.path().join(name), "").unwrap();
    }
    let found = find_files(dir.path(), "*.fastq", true).unwrap();
    let names: Vec<String> = found
        .iter()
        .map(|p| p.strip_prefix(dir.path()).unwrap().display().to_string())
        .collect();
    assert_eq!(names, vec!["a.fastq", "b.fastq", "pass/c.fastq"]);
}

#[test]
fn test_bad_modified_base_tags_skip_only_that_read() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("reads.fastq");
    let mut file = std::fs::File::create(&path).unwrap();
    // MM skips past the last C of the first read
    writeln!(file, "@bad\tMM:Z:C+m?,5;\tML:B:C,200\nACGTCATG\n+\nIIIIIIII").unwrap();
    writeln!(file, "@good\nAACATGTT\n+\nIIIIIIII").unwrap();
    drop(file);

    let digester = porec::core::DigestOptions::default().digester().unwrap();
    let reader = FastqReader::from_path(&path, TagOptions::default()).unwrap();
    let mut stream = digester.stream(reader, 0);
    let ids: Vec<String> = stream
        .by_ref()
        .map(|m| m.unwrap().read_id)
        .collect();
    assert_eq!(ids, vec!["good:0:6", "good:6:8"]);
    assert_eq!(stream.stats().skipped_invalid, 1);
    assert_eq!(stream.stats().concatemers, 2);
}
