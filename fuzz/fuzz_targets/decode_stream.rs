#![no_main]

use libfuzzer_sys::fuzz_target;
use marc_combine::{decode, CombineConfig, CombiningReader, MarcError};

fuzz_target!(|data: &[u8]| {
    // The decoder must never panic or read past the buffer
    let _ = decode(data, 0);

    let config = CombineConfig::default().with_resync_scan_limit(4096);
    let Ok(reader) = CombiningReader::from_reader(data, &config) else {
        return;
    };

    let mut fatal = 0;
    let mut documents = 0;
    for item in reader {
        match item {
            Ok(document) => {
                assert!(!document.is_empty());
                documents += 1;
            },
            Err(MarcError::Decode(error)) => assert!(error.offset() < data.len() as u64),
            Err(error) => {
                assert!(error.is_fatal());
                fatal += 1;
            },
        }
    }
    assert!(fatal <= 1);
    assert!(documents <= data.len() / 24);
});
