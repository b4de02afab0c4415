// Copyright 2024 Karpeles Lab Inc.
// zstd stream compression command-line tool

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use zstream::{StreamOptions, ZstdStream, DEFAULT_COMPRESSION_LEVEL, FILE_EXTENSION};

/// Magic of the first zstd skippable frame variant
const SKIPPABLE_MAGIC: u32 = 0x184D_2A50;
const SKIPPABLE_HEADER: usize = 8;

#[derive(Parser)]
#[command(name = "zsc")]
#[command(about = "zstd stream compression tool", long_about = None)]
#[command(version)]
struct Args {
    /// Input files to compress
    #[arg(required = true)]
    files: Vec<String>,

    /// Write output to stdout (use with single file or -)
    #[arg(short = 'c', long)]
    stdout: bool,

    /// Output file (use with single input file)
    #[arg(short = 'o', long)]
    output: Option<PathBuf>,

    /// Compression level (negative levels are faster)
    #[arg(short = 'l', long, default_value_t = DEFAULT_COMPRESSION_LEVEL, allow_negative_numbers = true)]
    level: i32,

    /// Append a content checksum to the frame
    #[arg(long)]
    checksum: bool,

    /// Flush the frame every N input bytes (e.g., 64K, 1M)
    #[arg(long)]
    flush_every: Option<String>,

    /// Pad size to a multiple of this value with a skippable frame (e.g., 500, 64K)
    #[arg(long, default_value = "1")]
    pad: String,

    /// Do not overwrite existing files
    #[arg(long)]
    safe: bool,

    /// Delete source files after successful compression
    #[arg(long)]
    rm: bool,

    /// Quiet mode - don't print progress
    #[arg(short = 'q', long)]
    quiet: bool,

    /// Log stream events to stderr (filter with RUST_LOG)
    #[arg(short = 'v', long)]
    verbose: bool,

    /// Verify written files by decompressing them
    #[arg(long)]
    verify: bool,

    /// Run benchmark n times (no output will be written)
    #[arg(long)]
    bench: Option<usize>,
}

/// Settings shared by every input
struct Plan {
    options: StreamOptions,
    flush_every: Option<usize>,
    pad_size: usize,
}

fn main() -> Result<()> {
    let args = Args::parse();

    if args.verbose {
        init_logging();
    }

    // Validate arguments
    if args.files.len() > 1 && args.output.is_some() {
        anyhow::bail!("Cannot use -o with multiple input files");
    }

    if args.files.len() > 1 && args.stdout {
        anyhow::bail!("Cannot use -c with multiple input files");
    }

    let max_level = zstream::max_compression_level();
    if args.level > max_level {
        anyhow::bail!("Level {} is above the maximum of {}", args.level, max_level);
    }

    let plan = Plan {
        options: StreamOptions::default()
            .level(args.level)
            .checksum(args.checksum),
        flush_every: args
            .flush_every
            .as_deref()
            .map(parse_size)
            .transpose()
            .context("Invalid flush interval")?
            .filter(|&n| n > 0),
        pad_size: parse_size(&args.pad).context("Invalid pad size")?,
    };

    // Handle benchmark mode
    if let Some(bench_count) = args.bench {
        return run_benchmark(&args, &plan, bench_count);
    }

    // Handle stdin/stdout case
    if args.files.len() == 1 && args.files[0] == "-" {
        return compress_stdio(&plan);
    }

    // Compress each file
    for file in &args.files {
        compress_file(file, &args, &plan)?;
    }

    Ok(())
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("zstream=debug")),
        )
        .init();
}

fn run_benchmark(args: &Args, plan: &Plan, iterations: usize) -> Result<()> {
    use std::time::Instant;

    for file_path in &args.files {
        if file_path == "-" {
            anyhow::bail!("Cannot benchmark stdin");
        }

        let input = PathBuf::from(file_path);
        if !input.exists() {
            anyhow::bail!("File not found: {}", file_path);
        }

        // Read file into memory
        let mut file_data = Vec::new();
        File::open(&input)
            .with_context(|| format!("Failed to open file: {}", input.display()))?
            .read_to_end(&mut file_data)?;

        let file_size = file_data.len();
        println!(
            "Benchmarking {} ({} bytes, level {}, {} iterations):",
            input.display(),
            file_size,
            args.level,
            iterations
        );

        let start = Instant::now();
        let mut compressed_size = 0;
        for _ in 0..iterations {
            let mut output = Vec::new();
            compress_stream(&mut &file_data[..], &mut output, plan, None)?;
            compressed_size = output.len();
        }
        let elapsed = start.elapsed();

        let avg_time = elapsed.as_secs_f64() / iterations.max(1) as f64;
        let throughput = file_size as f64 / avg_time / 1024.0 / 1024.0;

        println!(
            "  Average: {:.3}s per iteration ({:.2} MB/s, {:.2}%)",
            avg_time,
            throughput,
            compressed_size as f64 * 100.0 / file_size.max(1) as f64
        );
    }

    Ok(())
}

fn compress_stdio(plan: &Plan) -> Result<()> {
    let stdin = io::stdin();
    let mut reader = stdin.lock();
    let stdout = io::stdout();
    let mut writer = stdout.lock();

    compress_stream(&mut reader, &mut writer, plan, None)?;
    Ok(())
}

fn output_path(input: &Path, args: &Args) -> PathBuf {
    if let Some(ref out) = args.output {
        out.clone()
    } else if args.stdout {
        PathBuf::from("-")
    } else {
        let mut name = input.as_os_str().to_owned();
        name.push(".");
        name.push(FILE_EXTENSION);
        PathBuf::from(name)
    }
}

fn compress_file(input_path: &str, args: &Args, plan: &Plan) -> Result<()> {
    let input = PathBuf::from(input_path);

    if !input.exists() {
        anyhow::bail!("File not found: {}", input_path);
    }

    if !input.is_file() {
        anyhow::bail!("Not a file: {}", input_path);
    }

    let output = output_path(&input, args);

    // Check if output exists in safe mode
    if args.safe && output != Path::new("-") && output.exists() {
        anyhow::bail!("Output file already exists: {}", output.display());
    }

    // Get file size for progress bar
    let file_size = fs::metadata(&input)?.len();

    let pb = if !args.quiet && !args.stdout {
        let pb = ProgressBar::new(file_size);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec})")?
                .progress_chars("#>-"),
        );
        Some(pb)
    } else {
        None
    };

    let mut input_file = File::open(&input)
        .with_context(|| format!("Failed to open input file: {}", input.display()))?;

    let summary = if output == Path::new("-") {
        let stdout = io::stdout();
        let mut stdout_lock = stdout.lock();
        compress_stream(&mut input_file, &mut stdout_lock, plan, pb.as_ref())?
    } else {
        let mut output_file = File::create(&output)
            .with_context(|| format!("Failed to create output file: {}", output.display()))?;
        let summary = compress_stream(&mut input_file, &mut output_file, plan, pb.as_ref())?;
        output_file.sync_all()?;
        summary
    };

    if let Some(pb) = pb {
        pb.finish_with_message("Done");
    }

    // Print compression stats
    if !args.quiet && !args.stdout && summary.read > 0 {
        let ratio = (summary.written as f64 / summary.read as f64) * 100.0;
        println!(
            "{} -> {} ({:.2}%)",
            input.display(),
            output.display(),
            ratio
        );
    }

    // Verify compressed file if requested
    if args.verify && output != Path::new("-") {
        verify_compressed_file(&output, &summary)?;
        if !args.quiet {
            println!("Verified: {}", output.display());
        }
    }

    // Remove source file if requested
    if args.rm && output != Path::new("-") {
        fs::remove_file(&input)
            .with_context(|| format!("Failed to remove source file: {}", input.display()))?;
    }

    Ok(())
}

/// What one compression run saw and produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Summary {
    read: u64,
    written: u64,
    crc: u32,
}

/// Counts bytes on their way to the real output
struct Counted<W> {
    inner: W,
    count: u64,
}

impl<W: Write> Write for Counted<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.count += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

fn compress_stream<R: Read, W: Write>(
    input: &mut R,
    output: &mut W,
    plan: &Plan,
    pb: Option<&ProgressBar>,
) -> Result<Summary> {
    let mut buffer = vec![0u8; 128 * 1024];
    let mut hasher = crc32fast::Hasher::new();
    let mut read = 0u64;
    let mut since_flush = 0usize;

    let mut counted = Counted {
        inner: output,
        count: 0,
    };
    let options = plan.options.leave_open(true);
    let mut encoder = ZstdStream::encoder_with_options(&mut counted, options)?;

    loop {
        let n = input.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        encoder.write_all(&buffer[..n])?;
        hasher.update(&buffer[..n]);
        read += n as u64;

        if let Some(every) = plan.flush_every {
            since_flush += n;
            if since_flush >= every {
                encoder.flush()?;
                since_flush = 0;
            }
        }
        if let Some(pb) = pb {
            pb.inc(n as u64);
        }
    }
    encoder.close().context("Failed to finish the compressed frame")?;
    drop(encoder);

    let padding_needed = calc_padding(counted.count, plan.pad_size);
    if padding_needed > 0 {
        write_padding(&mut counted, padding_needed)?;
    }
    counted.flush()?;
    tracing::debug!(read, written = counted.count, "compressed stream");

    Ok(Summary {
        read,
        written: counted.count,
        crc: hasher.finalize(),
    })
}

/// Bytes of skippable frame needed to bring `written` to a multiple of
/// `want_multiple`; never less than a skippable frame header
fn calc_padding(written: u64, want_multiple: usize) -> usize {
    if want_multiple <= 1 {
        return 0;
    }
    let want = want_multiple as u64;
    let leftover = written % want;
    if leftover == 0 {
        return 0;
    }
    let mut needed = (want - leftover) as usize;
    while needed < SKIPPABLE_HEADER {
        needed += want_multiple;
    }
    needed
}

fn write_padding<W: Write>(output: &mut W, padding_needed: usize) -> Result<()> {
    if padding_needed < SKIPPABLE_HEADER {
        anyhow::bail!("padding size too small");
    }

    let data_len = u32::try_from(padding_needed - SKIPPABLE_HEADER).context("padding too large")?;
    output.write_all(&SKIPPABLE_MAGIC.to_le_bytes())?;
    output.write_all(&data_len.to_le_bytes())?;
    io::copy(&mut io::repeat(0).take(data_len as u64), output)?;

    Ok(())
}

/// Decompress `compressed` and compare length and CRC-32 with what was read
fn verify_compressed_file(compressed: &Path, expected: &Summary) -> Result<()> {
    let compressed_file = File::open(compressed).with_context(|| {
        format!(
            "Failed to open compressed file for verification: {}",
            compressed.display()
        )
    })?;

    let mut decoder = ZstdStream::decoder(io::BufReader::new(compressed_file))?;
    let mut hasher = crc32fast::Hasher::new();
    let mut total = 0u64;
    let mut buffer = vec![0u8; 128 * 1024];
    loop {
        let n = decoder.read(&mut buffer).with_context(|| {
            format!(
                "Failed to decompress file for verification: {}",
                compressed.display()
            )
        })?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
        total += n as u64;
    }

    let crc = hasher.finalize();
    if total != expected.read || crc != expected.crc {
        anyhow::bail!(
            "Verification failed: decompressed data does not match original (original: {} bytes, crc {:08x}; decompressed: {} bytes, crc {:08x})",
            expected.read,
            expected.crc,
            total,
            crc
        );
    }

    Ok(())
}

fn parse_size(s: &str) -> Result<usize> {
    let s = s.trim().to_uppercase();

    if let Some(num) = s.strip_suffix('K') {
        Ok(num.parse::<usize>()? * 1024)
    } else if let Some(num) = s.strip_suffix('M') {
        Ok(num.parse::<usize>()? * 1024 * 1024)
    } else if let Some(num) = s.strip_suffix('G') {
        Ok(num.parse::<usize>()? * 1024 * 1024 * 1024)
    } else {
        s.parse::<usize>().context("Invalid size format")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan(pad_size: usize, flush_every: Option<usize>) -> Plan {
        Plan {
            options: StreamOptions::default(),
            flush_every,
            pad_size,
        }
    }

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("500").unwrap(), 500);
        assert_eq!(parse_size("64k").unwrap(), 64 * 1024);
        assert_eq!(parse_size(" 4M ").unwrap(), 4 * 1024 * 1024);
        assert!(parse_size("lots").is_err());
    }

    #[test]
    fn test_calc_padding() {
        assert_eq!(calc_padding(100, 1), 0);
        assert_eq!(calc_padding(512, 256), 0);
        assert_eq!(calc_padding(500, 512), 12);
        // Too little room for a skippable header rolls over to the next multiple
        assert_eq!(calc_padding(510, 512), 514);
    }

    #[test]
    fn test_padded_output_still_decodes() {
        let data = b"padded with a skippable frame ".repeat(100);
        let mut output = Vec::new();
        let summary = compress_stream(&mut &data[..], &mut output, &plan(4096, None), None).unwrap();

        assert_eq!(output.len() % 4096, 0);
        assert_eq!(summary.written, output.len() as u64);
        assert_eq!(zstream::decode_all(&output).unwrap(), data);
    }

    #[test]
    fn test_flush_every_keeps_content() {
        let data: Vec<u8> = (0..300_000u32).map(|i| (i % 251) as u8).collect();
        let mut output = Vec::new();
        let summary =
            compress_stream(&mut &data[..], &mut output, &plan(1, Some(1000)), None).unwrap();

        assert_eq!(summary.read, data.len() as u64);
        assert_eq!(summary.crc, crc32fast::hash(&data));
        assert_eq!(zstream::decode_all(&output).unwrap(), data);
    }

    #[test]
    fn test_verify_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.zst");
        let data = b"verify me ".repeat(1000);

        let mut file = File::create(&path).unwrap();
        let summary = compress_stream(&mut &data[..], &mut file, &plan(1, None), None).unwrap();
        drop(file);
        verify_compressed_file(&path, &summary).unwrap();

        let wrong = Summary {
            crc: summary.crc ^ 1,
            ..summary
        };
        assert!(verify_compressed_file(&path, &wrong).is_err());
    }
}
