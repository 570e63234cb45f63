//! porec CLI entry point
//!
//! `digest` splits concatemers into monomers; `parse-bam` turns aligned
//! monomers into contacts.

use anyhow::{bail, Context};
use clap::{ArgAction, Parser, Subcommand};
use log::info;
use porec::core::{find_files, Concatemer, DigestOptions, Monomer, TagOptions};
use porec::formats::{FastqReader, FastqWriter};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;

#[derive(Parser)]
#[command(name = "porec")]
#[command(about = "Pore-C concatemer digestion and contact calling")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Digest concatemers into monomers at restriction sites
    Digest {
        /// Input FASTQ/BAM file, or a directory to search
        input: PathBuf,
        /// Restriction enzyme name (e.g. NlaIII, DpnII)
        enzyme: String,
        /// Output file; .bam/.sam/.cram writes unaligned BAM, anything else FASTQ
        output: PathBuf,
        /// File name pattern used when INPUT is a directory
        #[arg(long, default_value = "*.fastq")]
        glob: String,
        /// Only search the top level of INPUT
        #[arg(long = "no-recursive", action = ArgAction::SetFalse)]
        recursive: bool,
        /// Stop after this many concatemers (0 = all)
        #[arg(long, default_value = "0")]
        max_reads: usize,
        /// Tags to drop before digestion
        #[arg(long, value_delimiter = ',', default_value = "mv")]
        remove_tags: Vec<String>,
        /// Array tags aligned with the read sequence, sliced per monomer
        #[arg(long = "per-base-tag")]
        per_base_tags: Vec<String>,
        /// Number of threads for BAM compression
        #[arg(short = 't', long, default_value = "1")]
        threads: usize,
    },
    /// Derive contacts from a name-sorted monomer alignment file
    #[cfg(feature = "bam")]
    ParseBam {
        /// Monomer alignments, grouped by concatemer
        bam: PathBuf,
        /// Prefix for output file names
        output_prefix: PathBuf,
        /// Overwrite existing outputs
        #[arg(long)]
        force: bool,
        /// Write <prefix>.ns.bam, the input alignments tagged with category and strand
        #[arg(long)]
        monomers: bool,
        /// Write <prefix>.pairs.tsv
        #[arg(long)]
        pairs: bool,
        /// Write <prefix>.chromunity.tsv
        #[arg(long)]
        chromunity: bool,
        /// Write <prefix>.summary.json
        #[arg(long)]
        summary: bool,
        /// Only emit contacts between adjacent mapped monomers
        #[arg(long)]
        direct_only: bool,
        /// Merge same-strand segments closer than this (0 = off)
        #[arg(long, default_value = "0")]
        chromunity_merge_distance: u64,
        /// Minimum cis distance for the pairs output
        #[arg(long)]
        paired_end_minimum_distance: Option<u64>,
        /// Maximum cis distance for the pairs output
        #[arg(long)]
        paired_end_maximum_distance: Option<u64>,
        /// Buffer the whole input instead of requiring grouped records
        #[arg(long, conflicts_with_all = ["check_sorted", "monomers"])]
        buffered: bool,
        /// Fail if a concatemer's records are not adjacent (memory grows with read count)
        #[arg(long)]
        check_sorted: bool,
        /// Number of threads for BAM decompression
        #[arg(short = 't', long, default_value = "1")]
        threads: usize,
    },
}

type ConcatemerSource = Box<dyn Iterator<Item = porec::Result<Concatemer>>>;

fn open_concatemers(path: &Path, tags: TagOptions) -> porec::Result<ConcatemerSource> {
    info!("Reading concatemers from {:?}", path);
    #[cfg(feature = "bam")]
    if porec::formats::is_alignment_path(path) {
        return Ok(Box::new(porec::formats::UnalignedBamReader::from_path(path, tags)?));
    }
    Ok(Box::new(FastqReader::from_path(path, tags)?))
}

/// Concatemers from each file in turn, opened lazily
fn concatemer_source(files: Vec<PathBuf>, tags: TagOptions) -> ConcatemerSource {
    Box::new(files.into_iter().flat_map(move |path| {
        match open_concatemers(&path, tags.clone()) {
            Ok(source) => source,
            Err(e) => Box::new(std::iter::once(Err(e))) as ConcatemerSource,
        }
    }))
}

enum MonomerSink {
    Fastq(FastqWriter<Box<dyn Write>>),
    #[cfg(feature = "bam")]
    Bam(porec::formats::MonomerBamWriter),
}

impl MonomerSink {
    fn write(&mut self, monomer: &Monomer) -> porec::Result<()> {
        match self {
            MonomerSink::Fastq(w) => w.write_monomer(monomer),
            #[cfg(feature = "bam")]
            MonomerSink::Bam(w) => w.write_monomer(monomer),
        }
    }

    fn finish(self) -> porec::Result<()> {
        match self {
            MonomerSink::Fastq(mut w) => w.flush(),
            #[cfg(feature = "bam")]
            MonomerSink::Bam(_) => Ok(()),
        }
    }
}

#[allow(unused_variables)]
fn open_sink(output: &Path, files: &[PathBuf], threads: usize) -> anyhow::Result<MonomerSink> {
    #[cfg(feature = "bam")]
    {
        // At most one source header may be carried over, whatever the output
        let header = porec::formats::alignment_header(files)?;
        if porec::formats::is_alignment_path(output) {
            let mut writer = porec::formats::MonomerBamWriter::from_path(output, &header)?;
            writer.set_threads(threads)?;
            return Ok(MonomerSink::Bam(writer));
        }
    }
    let writer = porec::core::create_writer(output)
        .with_context(|| format!("Failed to create {:?}", output))?;
    Ok(MonomerSink::Fastq(FastqWriter::new(writer)))
}

#[allow(clippy::too_many_arguments)]
fn run_digest(
    input: PathBuf,
    enzyme: String,
    output: PathBuf,
    glob: String,
    recursive: bool,
    max_reads: usize,
    remove_tags: Vec<String>,
    per_base_tags: Vec<String>,
    threads: usize,
) -> anyhow::Result<()> {
    let start = Instant::now();
    let options = DigestOptions {
        enzyme,
        tags: TagOptions {
            remove_tags,
            per_base_tags,
        },
        max_reads,
    };
    let digester = options.digester()?;

    let files = find_files(&input, &glob, recursive)
        .with_context(|| format!("Failed to search {:?}", input))?;
    if files.is_empty() {
        bail!("No input files matching {:?} under {:?}", glob, input);
    }
    eprintln!("Digesting {} file(s) with {} -> {:?}", files.len(), options.enzyme, output);

    let mut sink = open_sink(&output, &files, threads)?;
    let mut stream = digester.stream(concatemer_source(files, options.tags.clone()), max_reads);
    for monomer in stream.by_ref() {
        sink.write(&monomer?)?;
    }
    sink.finish()?;
    let stats = stream.stats();

    eprintln!("\n=== Digest Statistics ===");
    eprintln!("Concatemers:     {}", stats.concatemers);
    eprintln!("Monomers:        {}", stats.monomers);
    eprintln!("Bases:           {}", stats.bases);
    eprintln!("Skipped empty:   {}", stats.skipped_empty);
    eprintln!("Skipped invalid: {}", stats.skipped_invalid);
    eprintln!("Time elapsed:    {:.2}s", start.elapsed().as_secs_f64());
    Ok(())
}

#[cfg(feature = "bam")]
fn output_path(prefix: &Path, suffix: &str, force: bool) -> anyhow::Result<PathBuf> {
    let path = PathBuf::from(format!("{}.{}", prefix.display(), suffix));
    if path.exists() && !force {
        bail!("Output {:?} exists, use --force to overwrite", path);
    }
    Ok(path)
}

#[cfg(feature = "bam")]
#[allow(clippy::too_many_arguments)]
fn run_parse_bam(
    bam: PathBuf,
    output_prefix: PathBuf,
    force: bool,
    monomers: bool,
    pairs: bool,
    chromunity: bool,
    summary: bool,
    options: porec::core::AnnotateOptions,
    grouping: porec::core::Grouping,
    threads: usize,
) -> anyhow::Result<()> {
    use log::warn;
    use porec::core::{ConcatemerAssembler, ContactAnnotator, SummaryAggregator};
    use porec::formats::bam::reference_sizes;
    use porec::formats::{AlignmentReader, AnnotatedBamWriter, ChromunityWriter, PairsWriter};

    let start = Instant::now();
    let annotator = ContactAnnotator::new(options)?;
    if !(monomers || pairs || chromunity || summary) {
        bail!(
            "Nothing to do, select at least one of --monomers, --pairs, --chromunity, --summary"
        );
    }
    if monomers && grouping == porec::core::Grouping::Buffered {
        bail!("--monomers needs grouped input and cannot be used with --buffered");
    }
    let monomers_path = monomers
        .then(|| output_path(&output_prefix, "ns.bam", force))
        .transpose()?;
    let pairs_path = pairs
        .then(|| output_path(&output_prefix, "pairs.tsv", force))
        .transpose()?;
    let chromunity_path = chromunity
        .then(|| output_path(&output_prefix, "chromunity.tsv", force))
        .transpose()?;
    let summary_path = summary
        .then(|| output_path(&output_prefix, "summary.json", force))
        .transpose()?;

    let mut reader = AlignmentReader::from_path(&bam)
        .with_context(|| format!("Failed to open {:?}", bam))?;
    reader.set_threads(threads)?;
    let chrom_sizes = reference_sizes(reader.header());

    let mut monomers_writer = match &monomers_path {
        Some(path) => {
            let mut writer = AnnotatedBamWriter::from_paths(&bam, path)?;
            writer.set_threads(threads)?;
            Some(writer)
        }
        None => None,
    };
    let mut pairs_writer = match &pairs_path {
        Some(path) => Some(PairsWriter::new(porec::core::create_writer(path)?, &chrom_sizes)?),
        None => None,
    };
    let mut chromunity_writer = match &chromunity_path {
        Some(path) => Some(ChromunityWriter::new(porec::core::create_writer(path)?)?),
        None => None,
    };

    eprintln!("Parsing alignments: {:?}", bam);
    let mut aggregator = SummaryAggregator::new();
    for group in ConcatemerAssembler::new(reader, grouping) {
        let group = group?;
        if let Some(writer) = monomers_writer.as_mut() {
            writer.write_group(&group)?;
        }
        if group.is_anomalous() {
            warn!(
                "Skipping {}: no primary or unmapped alignment",
                group.concatemer_id
            );
            aggregator.add_anomaly();
            continue;
        }
        let contacts = annotator.annotate(&group);
        aggregator.add_group(&group, &contacts);
        if let Some(writer) = pairs_writer.as_mut() {
            for contact in annotator.paired_end_view(&contacts) {
                writer.write_contact(contact)?;
            }
        }
        if let Some(writer) = chromunity_writer.as_mut() {
            writer.write_segments(&group.concatemer_id, &annotator.segments(&group))?;
        }
    }
    if let Some(writer) = pairs_writer.as_mut() {
        writer.flush()?;
    }
    if let Some(writer) = chromunity_writer.as_mut() {
        writer.flush()?;
    }

    let result = aggregator.finish();
    if let Some(path) = &summary_path {
        let mut writer = porec::core::create_writer(path)?;
        result.write_json(&mut writer)?;
        writer.flush()?;
    }

    eprintln!("\n=== Contact Statistics ===");
    eprintln!("Concatemers:     {}", result.concatemers);
    eprintln!("Alignments:      {}", result.alignments);
    eprintln!("Multiplex:       {}", result.topology.multiplex);
    eprintln!("Contacts:        {}", result.contacts.total);
    eprintln!("Direct:          {}", result.contacts.direct);
    eprintln!("Cis:             {}", result.contacts.cis);
    eprintln!("Anomalous:       {}", result.anomalous_groups);
    if let Some(writer) = &monomers_writer {
        eprintln!("Annotated BAM:   {} records", writer.records_written());
    }
    eprintln!("Time elapsed:    {:.2}s", start.elapsed().as_secs_f64());
    Ok(())
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Digest {
            input,
            enzyme,
            output,
            glob,
            recursive,
            max_reads,
            remove_tags,
            per_base_tags,
            threads,
        } => run_digest(
            input,
            enzyme,
            output,
            glob,
            recursive,
            max_reads,
            remove_tags,
            per_base_tags,
            threads,
        ),
        #[cfg(feature = "bam")]
        Commands::ParseBam {
            bam,
            output_prefix,
            force,
            monomers,
            pairs,
            chromunity,
            summary,
            direct_only,
            chromunity_merge_distance,
            paired_end_minimum_distance,
            paired_end_maximum_distance,
            buffered,
            check_sorted,
            threads,
        } => {
            let options = porec::core::AnnotateOptions {
                merge_distance: chromunity_merge_distance,
                direct_only,
                paired_end_min_distance: paired_end_minimum_distance,
                paired_end_max_distance: paired_end_maximum_distance,
            };
            let grouping = if buffered {
                porec::core::Grouping::Buffered
            } else if check_sorted {
                porec::core::Grouping::Checked
            } else {
                porec::core::Grouping::Contiguous
            };
            run_parse_bam(
                bam,
                output_prefix,
                force,
                monomers,
                pairs,
                chromunity,
                summary,
                options,
                grouping,
                threads,
            )
        }
    }
}
