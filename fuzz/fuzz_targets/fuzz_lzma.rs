#![no_main]
use libfuzzer_sys::fuzz_target;
use lzma_stream::LzmaReader;
use std::io::Read;

fuzz_target!(|data: &[u8]| {
    if data.len() < 13 {
        return;
    }

    // Skip dictionary sizes over 64MB to avoid OOM; the header field is
    // little-endian at offset 1.
    let dict_size = u32::from_le_bytes([data[1], data[2], data[3], data[4]]);
    if dict_size > 64 * 1024 * 1024 {
        return;
    }

    let mut reader = match LzmaReader::new(data) {
        Ok(reader) => reader,
        Err(_) => return,
    };

    // Cap output to 16MB: fuzzed headers can declare huge unpacked sizes.
    let mut buf = vec![0u8; 64 * 1024];
    let mut produced = 0u64;
    loop {
        match reader.read(&mut buf) {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                produced += n as u64;
                if produced > 16 * 1024 * 1024 {
                    break;
                }
            }
        }
    }
});
