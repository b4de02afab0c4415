// Copyright 2024 Karpeles Lab Inc.
// Example demonstrating stream compression/decompression

use std::io::{Read, Write};
use zstream::{StreamOptions, ZstdStream};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("zstd Stream Adapter Demo (libzstd {})\n", zstream::version());

    let original_data = b"The stream adapter compresses whatever is written to it and \
                          decompresses whatever is read from it, one chunk at a time.";

    println!("Original data:");
    println!("  Size: {} bytes", original_data.len());
    println!("  Content: {:?}\n", std::str::from_utf8(original_data)?);

    // Compress into a Vec
    let mut encoder = ZstdStream::encoder(Vec::new(), 3)?;
    encoder.write_all(original_data)?;
    let compressed = encoder.finish()?;

    println!("Compressed:");
    println!("  Size: {} bytes", compressed.len());
    println!(
        "  Ratio: {:.2}%\n",
        (compressed.len() as f64 / original_data.len() as f64) * 100.0
    );

    println!("Magic bytes: {:02x?}", &compressed[..4]);
    println!("(28 b5 2f fd = zstd frame magic)\n");

    // Decompress
    let mut decoder = ZstdStream::decoder(&compressed[..])?;
    let mut decompressed = Vec::new();
    decoder.read_to_end(&mut decompressed)?;

    println!("Decompressed:");
    println!("  Size: {} bytes", decompressed.len());
    println!("  Match: {}\n", decompressed == original_data);

    // Incremental reading
    println!("--- Incremental Reading Test ---");
    let mut decoder = ZstdStream::decoder(&compressed[..])?;
    let mut buffer = [0u8; 20];
    let mut total_read = 0;

    loop {
        let n = decoder.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        total_read += n;
        println!("Read {} bytes: {:?}", n, std::str::from_utf8(&buffer[..n])?);
    }

    println!("\nTotal read: {} bytes", total_read);

    // Flush points and frames appended to one sink
    println!("\n--- Flush and Multiple Frames Test ---");
    let mut sink = Vec::new();
    for frame in 0..3 {
        let options = StreamOptions::default().leave_open(true).level(frame + 1);
        let mut encoder = ZstdStream::encoder_with_options(&mut sink, options)?;
        for i in 0..5 {
            encoder.write_all(format!("Frame {} chunk {} ", frame, i).as_bytes())?;
            encoder.flush()?;
        }
        encoder.close()?;
    }

    let mut decoder = ZstdStream::decoder(&sink[..])?;
    let mut decompressed = Vec::new();
    decoder.read_to_end(&mut decompressed)?;

    println!("Three frames: {} bytes", sink.len());
    println!("Decompressed: {:?}", std::str::from_utf8(&decompressed)?);

    Ok(())
}
