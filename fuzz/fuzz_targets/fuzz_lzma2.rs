#![no_main]
use libfuzzer_sys::fuzz_target;
use lzma_stream::Lzma2Reader;
use std::io::Read;

fuzz_target!(|data: &[u8]| {
    let mut reader = match Lzma2Reader::new(data, 1024 * 1024) {
        Ok(reader) => reader,
        Err(_) => return,
    };

    // Cap output to 16MB to prevent timeouts on degenerate chunk chains.
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
