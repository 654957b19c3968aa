#![no_main]
use libfuzzer_sys::fuzz_target;
use lzma_stream::LzmaReader;
use std::io::Read;

// Headerless streams: first byte becomes the properties byte, the rest is
// the compressed payload, decoded marker-terminated.
fuzz_target!(|data: &[u8]| {
    if data.is_empty() {
        return;
    }

    let props = data[0];
    let payload = &data[1..];
    let mut reader = match LzmaReader::with_properties(payload, props, 1024 * 1024, None) {
        Ok(reader) => reader,
        Err(_) => return,
    };

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
