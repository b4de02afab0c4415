// Copyright 2024 Karpeles Lab Inc.
// zstd stream decompression command-line tool

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs::{self, File};
use std::io::{self, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use zstream::{ZstdStream, FILE_EXTENSION};

#[derive(Parser)]
#[command(name = "zsd")]
#[command(about = "zstd stream decompression tool", long_about = None)]
#[command(version)]
struct Args {
    /// Input files to decompress
    #[arg(required = true)]
    files: Vec<String>,

    /// Write output to stdout (use with single file or -)
    #[arg(short = 'c', long)]
    stdout: bool,

    /// Output file (use with single input file)
    #[arg(short = 'o', long)]
    output: Option<PathBuf>,

    /// Do not overwrite existing files
    #[arg(long)]
    safe: bool,

    /// Delete source files after successful decompression
    #[arg(long)]
    rm: bool,

    /// Quiet mode - don't print progress
    #[arg(short = 'q', long)]
    quiet: bool,

    /// Log stream events to stderr (filter with RUST_LOG)
    #[arg(short = 'v', long)]
    verbose: bool,

    /// Verify files only, don't write output
    #[arg(long)]
    verify: bool,

    /// Run benchmark n times (no output will be written)
    #[arg(long)]
    bench: Option<usize>,
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

    // Handle benchmark mode
    if let Some(bench_count) = args.bench {
        return run_benchmark(&args, bench_count);
    }

    // Handle stdin/stdout case
    if args.files.len() == 1 && args.files[0] == "-" {
        return decompress_stdio(&args);
    }

    // Decompress each file
    for file in &args.files {
        decompress_file(file, &args)?;
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

fn run_benchmark(args: &Args, iterations: usize) -> Result<()> {
    use std::time::Instant;

    for file_path in &args.files {
        if file_path == "-" {
            anyhow::bail!("Cannot benchmark stdin");
        }

        let input = PathBuf::from(file_path);
        if !input.exists() {
            anyhow::bail!("File not found: {}", file_path);
        }

        // Read compressed file into memory
        let mut file_data = Vec::new();
        File::open(&input)
            .with_context(|| format!("Failed to open file: {}", input.display()))?
            .read_to_end(&mut file_data)?;

        println!(
            "Benchmarking {} ({} bytes compressed, {} iterations):",
            input.display(),
            file_data.len(),
            iterations
        );

        let start = Instant::now();
        let mut decompressed_size = 0;
        for _ in 0..iterations {
            decompressed_size = decompress_stream(&file_data[..], &mut io::sink(), None)?.written;
        }
        let elapsed = start.elapsed();

        let avg_time = elapsed.as_secs_f64() / iterations.max(1) as f64;
        let throughput = decompressed_size as f64 / avg_time / 1024.0 / 1024.0;

        println!(
            "  Average: {:.3}s per iteration ({:.2} MB/s decompressed)",
            avg_time, throughput
        );
    }

    Ok(())
}

fn decompress_stdio(args: &Args) -> Result<()> {
    let stdin = io::stdin();
    let reader = stdin.lock();

    if args.verify {
        // Verify mode: just read and discard
        let outcome = decompress_stream(reader, &mut io::sink(), None)?;
        if !args.quiet {
            eprintln!(
                "Verification successful ({} bytes, crc32 {:08x})",
                outcome.written, outcome.crc
            );
        }
        return Ok(());
    }

    let stdout = io::stdout();
    let mut writer = stdout.lock();
    decompress_stream(reader, &mut writer, None)?;

    Ok(())
}

/// Output name for `input`: the path without its `.zst` extension
fn strip_extension(input: &Path) -> Option<PathBuf> {
    let ext = input.extension()?;
    if ext != FILE_EXTENSION {
        return None;
    }
    Some(input.with_extension(""))
}

fn decompress_file(input_path: &str, args: &Args) -> Result<()> {
    let input = PathBuf::from(input_path);

    if !input.exists() {
        anyhow::bail!("File not found: {}", input_path);
    }

    if !input.is_file() {
        anyhow::bail!("Not a file: {}", input_path);
    }

    // Determine output path
    let output = if args.verify {
        PathBuf::from("-") // Don't write anything in verify mode
    } else if let Some(ref out) = args.output {
        out.clone()
    } else if args.stdout {
        PathBuf::from("-")
    } else {
        strip_extension(&input).with_context(|| {
            format!(
                "Input file must have .{} extension: {}",
                FILE_EXTENSION,
                input.display()
            )
        })?
    };

    // Check if output exists in safe mode
    if args.safe && !args.verify && output != Path::new("-") && output.exists() {
        anyhow::bail!("Output file already exists: {}", output.display());
    }

    // Get file size for progress bar
    let file_size = fs::metadata(&input)?.len();

    let pb = if !args.quiet && !args.stdout && !args.verify {
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

    let input_file = File::open(&input)
        .with_context(|| format!("Failed to open input file: {}", input.display()))?;
    let source = BufReader::new(input_file);

    let outcome = if args.verify {
        let outcome = decompress_stream(source, &mut io::sink(), None)
            .with_context(|| format!("Verification failed: {}", input.display()))?;
        if !args.quiet {
            println!(
                "Verification successful: {} ({} bytes, crc32 {:08x})",
                input.display(),
                outcome.written,
                outcome.crc
            );
        }
        outcome
    } else if output == Path::new("-") {
        let stdout = io::stdout();
        let mut stdout_lock = stdout.lock();
        decompress_stream(source, &mut stdout_lock, pb.as_ref())?
    } else {
        let mut output_file = File::create(&output)
            .with_context(|| format!("Failed to create output file: {}", output.display()))?;
        let outcome = decompress_stream(source, &mut output_file, pb.as_ref())
            .with_context(|| format!("Decompression failed: {}", input.display()))?;
        output_file.sync_all()?;
        outcome
    };

    if let Some(pb) = pb {
        pb.finish_with_message("Done");
    }

    // Print decompression stats
    if !args.quiet && !args.stdout && !args.verify && outcome.written > 0 {
        let ratio = (file_size as f64 / outcome.written as f64) * 100.0;
        println!(
            "{} -> {} (compressed to {:.2}%)",
            input.display(),
            output.display(),
            ratio
        );
    }

    // Remove source file if requested
    if args.rm && output != Path::new("-") && !args.verify {
        fs::remove_file(&input)
            .with_context(|| format!("Failed to remove source file: {}", input.display()))?;
    }

    Ok(())
}

/// Size and CRC-32 of the decompressed content
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Outcome {
    written: u64,
    crc: u32,
}

/// Decompress every frame from `source` into `output`. The progress bar
/// tracks compressed bytes consumed.
fn decompress_stream<R: Read, W: Write>(
    source: R,
    output: &mut W,
    pb: Option<&ProgressBar>,
) -> Result<Outcome> {
    let source: Box<dyn Read + '_> = match pb {
        Some(pb) => Box::new(pb.wrap_read(source)),
        None => Box::new(source),
    };
    let mut decoder = ZstdStream::decoder(source)?;
    let mut hasher = crc32fast::Hasher::new();
    let mut written = 0u64;
    let mut buffer = vec![0u8; 128 * 1024];

    loop {
        let n = decoder.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        output.write_all(&buffer[..n])?;
        hasher.update(&buffer[..n]);
        written += n as u64;
    }
    decoder.close()?;
    output.flush()?;
    tracing::debug!(written, "decompressed stream");

    Ok(Outcome {
        written,
        crc: hasher.finalize(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_extension() {
        assert_eq!(
            strip_extension(Path::new("dir/data.txt.zst")),
            Some(PathBuf::from("dir/data.txt"))
        );
        assert_eq!(strip_extension(Path::new("data.gz")), None);
        assert_eq!(strip_extension(Path::new("data")), None);
    }

    #[test]
    fn test_decompress_stream_reports_content() {
        let data = b"decompressed by the tool ".repeat(500);
        let compressed = zstream::encode_all(&data, 3).unwrap();

        let mut output = Vec::new();
        let outcome = decompress_stream(&compressed[..], &mut output, None).unwrap();
        assert_eq!(output, data);
        assert_eq!(
            outcome,
            Outcome {
                written: data.len() as u64,
                crc: crc32fast::hash(&data),
            }
        );
    }

    #[test]
    fn test_decompress_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let compressed_path = dir.path().join("notes.txt.zst");
        let data = b"written by zsc, read by zsd\n".repeat(300);
        fs::write(&compressed_path, zstream::encode_all(&data, 5).unwrap()).unwrap();

        let args = Args {
            files: vec![compressed_path.to_string_lossy().into_owned()],
            stdout: false,
            output: None,
            safe: true,
            rm: true,
            quiet: true,
            verbose: false,
            verify: false,
            bench: None,
        };
        decompress_file(&args.files[0], &args).unwrap();

        assert_eq!(fs::read(dir.path().join("notes.txt")).unwrap(), data);
        assert!(!compressed_path.exists());

        // Safe mode refuses to overwrite
        fs::write(&compressed_path, zstream::encode_all(&data, 5).unwrap()).unwrap();
        assert!(decompress_file(&args.files[0], &args).is_err());
    }

    #[test]
    fn test_truncated_file_fails() {
        let data = b"this frame gets cut off ".repeat(400);
        let compressed = zstream::encode_all(&data, 3).unwrap();
        let cut = &compressed[..compressed.len() / 2];

        let mut output = Vec::new();
        assert!(decompress_stream(cut, &mut output, None).is_err());
    }
}
