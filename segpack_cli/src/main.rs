mod logging;

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Deserialize;
use tracing::info;
use xxhash_rust::xxh3::xxh3_128;

use segpack_codecs::{
    detect_container, DeflateCodec, JsonContainer, Lz4Codec, PassThroughCodec, Segp1Container,
    ZstdCodec,
};
use segpack_core::format::is_segp1;
use segpack_core::{
    export_segmentation, import_segmentation, ContainerIo, PayloadCodec, Reader,
    SegmentationDataset, SliceDescriptor, SparseSegmentList, ToolState,
};

// ── CLI definition ─────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "segpack",
    about = "Pack annotation masks into bit-packed segmentation containers and back",
    version
)]
struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true, env = "SEGPACK_LOG_JSON")]
    log_json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encode an annotation export into a segmentation container
    Encode {
        /// Annotation JSON with `slices`, `segments`, and `tool_state`
        input: PathBuf,
        /// Destination container
        output: PathBuf,
        /// Container format: segp1 | json
        #[arg(short, long, default_value = "segp1", env = "SEGPACK_FORMAT")]
        format: String,
        /// Payload codec for segp1: passthrough | deflate | zstd | lz4
        #[arg(short, long, default_value = "zstd", env = "SEGPACK_CODEC")]
        codec: String,
        /// Zstd compression level (1-22, only used with --codec zstd)
        #[arg(long, default_value_t = 3, env = "SEGPACK_ZSTD_LEVEL")]
        zstd_level: i32,
        /// Do not store a payload checksum
        #[arg(long)]
        no_checksum: bool,
        /// Series instance UID; derived from the input bytes when omitted
        #[arg(long)]
        series_uid: Option<String>,
    },
    /// Decode a segmentation container back into tool-state JSON
    Decode {
        /// Source container (SEGP1 or JSON, detected automatically)
        input: PathBuf,
        /// Destination JSON ("-" writes to stdout)
        output: PathBuf,
        /// JSON array of slice ids in volume order; defaults to the slices
        /// recorded in the container
        #[arg(short, long)]
        slices: Option<PathBuf>,
    },
    /// Print container header, dimensions, and segment catalog
    Inspect {
        /// Container to inspect
        file: PathBuf,
        /// Print per-segment details
        #[arg(long)]
        segments: bool,
    },
}

/// Annotation export read by `encode`.
#[derive(Deserialize)]
struct Annotation {
    slices: Vec<SliceDescriptor>,
    segments: SparseSegmentList,
    #[serde(default)]
    tool_state: ToolState,
    #[serde(default)]
    series_instance_uid: Option<String>,
}

// ── Helpers ────────────────────────────────────────────────────────────────

fn codec_from_name(name: &str, zstd_level: i32) -> anyhow::Result<Arc<dyn PayloadCodec>> {
    match name {
        "passthrough" | "pass" | "none" => Ok(Arc::new(PassThroughCodec)),
        "deflate" | "d" => Ok(Arc::new(DeflateCodec::default())),
        "zstd" | "z" => Ok(Arc::new(ZstdCodec::new(zstd_level))),
        "lz4" | "l" => Ok(Arc::new(Lz4Codec)),
        other => anyhow::bail!(
            "unknown codec '{}'. Valid options: passthrough, deflate, zstd, lz4",
            other
        ),
    }
}

fn container_for_format(
    format: &str,
    codec: Arc<dyn PayloadCodec>,
    checksum: bool,
) -> anyhow::Result<Box<dyn ContainerIo>> {
    match format {
        "segp1" | "segp" | "bin" => {
            let container = Segp1Container::new(codec);
            Ok(Box::new(if checksum {
                container
            } else {
                container.without_checksum()
            }))
        }
        "json" => Ok(Box::new(JsonContainer::pretty())),
        other => anyhow::bail!("unknown format '{}'. Valid options: segp1, json", other),
    }
}

/// `2.25.<decimal>` UID, the UUID-derived root, from a 128-bit input hash.
fn derived_uid(bytes: &[u8]) -> String {
    format!("2.25.{}", xxh3_128(bytes))
}

fn human_bytes(n: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut v = n as f64;
    let mut unit = 0;
    while v >= 1024.0 && unit < UNITS.len() - 1 {
        v /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", n)
    } else {
        format!("{:.2} {}", v, UNITS[unit])
    }
}

fn load_container(path: &Path) -> anyhow::Result<(Vec<u8>, SegmentationDataset)> {
    let bytes = fs::read(path).with_context(|| format!("reading container {:?}", path))?;
    let container = detect_container(&bytes).with_context(|| format!("opening {:?}", path))?;
    let dataset = container
        .load(&bytes)
        .with_context(|| format!("reading {} container {:?}", container.name(), path))?;
    Ok((bytes, dataset))
}

// ── Subcommand implementations ─────────────────────────────────────────────

#[allow(clippy::too_many_arguments)]
fn run_encode(
    input: PathBuf,
    output: PathBuf,
    format: &str,
    codec_name: &str,
    zstd_level: i32,
    checksum: bool,
    series_uid: Option<String>,
) -> anyhow::Result<()> {
    let codec = codec_from_name(codec_name, zstd_level)?;
    let codec_display = codec.name();
    let container = container_for_format(format, codec, checksum)?;

    let raw = fs::read(&input).with_context(|| format!("reading annotation {:?}", input))?;
    let annotation: Annotation = serde_json::from_slice(&raw)
        .with_context(|| format!("parsing annotation {:?}", input))?;
    let uid = series_uid
        .or(annotation.series_instance_uid)
        .unwrap_or_else(|| derived_uid(&raw));

    let t0 = Instant::now();
    let dataset = export_segmentation(
        &annotation.slices,
        &annotation.segments,
        &annotation.tool_state,
        uid,
    )
    .context("encoding segmentation")?;
    let bytes = container
        .serialize_dataset(&dataset)
        .with_context(|| format!("serializing {} container", container.name()))?;
    let elapsed = t0.elapsed();

    fs::write(&output, &bytes).with_context(|| format!("writing output file {:?}", output))?;
    info!(
        output = %output.display(),
        format = container.name(),
        bytes = bytes.len(),
        "container written"
    );

    eprintln!("  format      : {}", container.name());
    if container.name() == "segp1" {
        eprintln!("  codec       : {}", codec_display);
    }
    eprintln!("  series uid  : {}", dataset.series_instance_uid);
    eprintln!(
        "  dims        : {} x {} x {} slices",
        dataset.columns,
        dataset.rows,
        annotation.slices.len()
    );
    eprintln!("  segments    : {}", dataset.segment_count());
    eprintln!("  frames      : {}", dataset.number_of_frames);
    eprintln!("  packed bits : {}", human_bytes(dataset.pixel_data.len() as u64));
    eprintln!("  container   : {}", human_bytes(bytes.len() as u64));
    eprintln!("  elapsed     : {:.3}s", elapsed.as_secs_f64());
    Ok(())
}

fn run_decode(input: PathBuf, output: PathBuf, slices: Option<PathBuf>) -> anyhow::Result<()> {
    let (_, dataset) = load_container(&input)?;

    let slice_ids: Vec<String> = match slices {
        Some(path) => {
            let text = fs::read(&path).with_context(|| format!("reading slice ids {:?}", path))?;
            serde_json::from_slice(&text)
                .with_context(|| format!("parsing slice ids {:?} (expected a JSON array of strings)", path))?
        }
        None => dataset.slice_ids(),
    };
    if slice_ids.is_empty() {
        anyhow::bail!(
            "{:?} records no slice ids; pass them in volume order with --slices",
            input
        );
    }

    let t0 = Instant::now();
    let imported = import_segmentation(&slice_ids, dataset).context("decoding segmentation")?;
    let elapsed = t0.elapsed();

    let json = serde_json::to_vec_pretty(&imported)?;
    let is_stdout = output.to_str() == Some("-");
    if is_stdout {
        let mut out = io::stdout().lock();
        out.write_all(&json)?;
        out.write_all(b"\n")?;
    } else {
        fs::write(&output, &json).with_context(|| format!("writing output file {:?}", output))?;
    }
    info!(slices = slice_ids.len(), segments = imported.segments.len(), "tool state written");

    eprintln!("  series uid  : {}", imported.series_instance_uid);
    eprintln!("  slices      : {}", slice_ids.len());
    eprintln!("  segments    : {}", imported.segments.len());
    eprintln!("  elapsed     : {:.3}s", elapsed.as_secs_f64());
    Ok(())
}

fn run_inspect(file: PathBuf, show_segments: bool) -> anyhow::Result<()> {
    let (bytes, dataset) = load_container(&file)?;

    println!("=== Segmentation container: {:?} ===", file);
    println!();
    if is_segp1(&bytes) {
        let reader = Reader::new(&bytes)?;
        let header = &reader.header;
        println!("  format         : SEGP1 v{}", header.version);
        println!("  payload codec  : id={}", header.payload_codec);
        println!("  packed payload : {}", human_bytes(header.raw_payload_len));
        println!("  stored payload : {}", human_bytes(header.payload_len));
        println!("  ratio          : {:.2}x", reader.ratio());
        println!("  flags          : 0x{:08x}", header.flags);
    } else {
        println!("  format         : JSON");
    }
    println!("  file on disk   : {}", human_bytes(bytes.len() as u64));
    println!("  series uid     : {}", dataset.series_instance_uid);
    println!("  rows x columns : {} x {}", dataset.rows, dataset.columns);
    println!("  frames         : {}", dataset.number_of_frames);
    println!("  segments       : {}", dataset.segment_count());
    println!("  slices         : {}", dataset.referenced_slices.len());

    if show_segments {
        println!();
        println!("  {:>6}  {:>6}  {:<14}  {}", "number", "id", "algorithm", "label");
        println!("  {}", "-".repeat(48));
        for record in dataset.segment_sequence.records() {
            let id = record
                .segment_id
                .map_or_else(|| "-".to_string(), |id| id.to_string());
            println!(
                "  {:>6}  {:>6}  {:<14}  {}",
                record.segment_number,
                id,
                format!("{:?}", record.descriptor.algorithm_type),
                record.descriptor.label
            );
        }
    }

    Ok(())
}

// ── Entry point ────────────────────────────────────────────────────────────

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::setup_logging(cli.log_json);
    match cli.command {
        Commands::Encode {
            input,
            output,
            format,
            codec,
            zstd_level,
            no_checksum,
            series_uid,
        } => run_encode(
            input,
            output,
            &format,
            &codec,
            zstd_level,
            !no_checksum,
            series_uid,
        ),
        Commands::Decode {
            input,
            output,
            slices,
        } => run_decode(input, output, slices),
        Commands::Inspect { file, segments } => run_inspect(file, segments),
    }
}
