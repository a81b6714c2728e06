#![no_main]

use btcaddr_kdf::{HmacSha256, Pbkdf2Stream};
use libfuzzer_sys::fuzz_target;
use std::io::SeekFrom;

fuzz_target!(|data: &[u8]| {
    // First 16 bytes pick the key and salt split; the rest is a script of
    // seek/read operations. Seeks and reads must never panic, and a failed
    // seek must leave the cursor where it was.
    if data.len() < 16 {
        return;
    }
    let (head, script) = data.split_at(16);
    let (key, salt) = head.split_at((head[0] % 16) as usize);

    let Ok(mut stream) = Pbkdf2Stream::new(HmacSha256, key, salt, 1) else {
        return;
    };

    for op in script.chunks_exact(9) {
        let offset = i64::from_le_bytes([op[1], op[2], op[3], op[4], op[5], op[6], op[7], op[8]]);
        let target = match op[0] % 4 {
            0 => SeekFrom::Start(offset as u64),
            1 => SeekFrom::Current(offset),
            2 => SeekFrom::End(offset),
            _ => {
                let mut buf = vec![0u8; (op[1] as usize) + 1];
                let before = stream.position();
                if let Ok(read) = stream.read(&mut buf) {
                    assert!(read <= buf.len());
                    assert_eq!(stream.position(), before + read as u64);
                }
                continue;
            }
        };

        let before = stream.position();
        if stream.seek(target).is_err() {
            assert_eq!(stream.position(), before);
        }
    }
});
