//! Concurrent reader test for atomic overlay writes.
//!
//! Tests CAN use `.unwrap()` and `.expect()`.

use std::collections::HashSet;
use std::fs;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use ndnstream_session::write_atomic;

const ROUNDS: usize = 200;

fn document(round: usize) -> String {
    // Sizes vary so a torn read would show up as a mismatched length.
    let body = "x".repeat(64 + (round * 37) % 512);
    format!("publishing /ndn/round/{round}\n{body}\nend {round}\n")
}

#[test]
fn test_readers_only_see_complete_documents() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("overlay.txt");
    write_atomic(&path, document(0).as_bytes()).unwrap();

    let valid: Arc<HashSet<String>> = Arc::new((0..ROUNDS).map(document).collect());
    let done = Arc::new(AtomicBool::new(false));

    let reader = {
        let path = path.clone();
        let valid = Arc::clone(&valid);
        let done = Arc::clone(&done);
        thread::spawn(move || {
            let mut observed = 0usize;
            loop {
                let finished = done.load(Ordering::Acquire);
                let text = fs::read_to_string(&path).unwrap();
                assert!(valid.contains(&text), "torn read: {} bytes", text.len());
                observed += 1;
                if finished {
                    return observed;
                }
            }
        })
    };

    for round in 1..ROUNDS {
        write_atomic(&path, document(round).as_bytes()).unwrap();
    }
    done.store(true, Ordering::Release);

    let observed = reader.join().unwrap();
    assert!(observed > 0);
    assert_eq!(fs::read_to_string(&path).unwrap(), document(ROUNDS - 1));
}
