//! Decode a `.lzma` file (or a raw LZMA2 chunk sequence) to disk.
//!
//! Usage:
//!   cargo run --release --example unpack -- input.lzma output.bin
//!   cargo run --release --example unpack -- --lzma2 input.bin output.bin

use lzma_stream::{lzma2_decompress, lzma_decompress};
use std::fs::File;
use std::io::{BufReader, BufWriter};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();
    let (lzma2, input_path, output_path) = match args.as_slice() {
        [_, flag, input, output] if flag == "--lzma2" => (true, input, output),
        [_, input, output] => (false, input, output),
        _ => {
            eprintln!("Usage: unpack [--lzma2] <input> <output>");
            eprintln!("  unpack ./data.lzma ./data.bin");
            std::process::exit(1);
        }
    };

    let input = BufReader::new(File::open(input_path)?);
    let mut output = BufWriter::new(File::create(output_path)?);

    let written = if lzma2 {
        lzma2_decompress(input, &mut output, 0)?
    } else {
        lzma_decompress(input, &mut output)?
    };
    println!("Decoded {written} bytes to {output_path}");

    Ok(())
}
