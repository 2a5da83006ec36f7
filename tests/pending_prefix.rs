//! Bytes queued on the link before a receive starts

use ferry_core::{CancellationSource, ReceiveOptions, ReceiveReport, ReceiveSession};
use ferry_integration_tests::{CountTrigger, CountingLink, Gate, pattern};
use ferry_link::Link;
use ferry_link::memory::MemoryLink;
use std::thread;
use std::time::Duration;
use tempfile::TempDir;

const STALE: &[u8] = b"left over from a previous session";

fn receive_after_stale(keep: bool, fresh: &[u8]) -> (ReceiveReport, Gate, Vec<u8>) {
    let dir = TempDir::new().unwrap();
    let (mut send_end, receive_end) = MemoryLink::pair(Duration::from_millis(20));
    send_end.write_chunk(STALE).unwrap();

    let (receive_end, read) = CountingLink::new(receive_end);
    let (mut gate, listening) = Gate::new(keep);
    let payload = fresh.to_vec();
    let sender = thread::spawn(move || {
        listening.recv().unwrap();
        send_end.write_chunk(&payload).unwrap();
        send_end
    });

    let mut session =
        ReceiveSession::new(receive_end, dir.path().join("capture.dat"), ReceiveOptions::default())
            .unwrap();
    let target = (STALE.len() + fresh.len()) as u64;
    let report = session
        .run(
            CancellationSource::new(CountTrigger::new(read, target))
                .with_interval(Duration::from_millis(5)),
            &mut gate,
        )
        .unwrap();
    drop(sender.join().unwrap());

    let saved = std::fs::read(&report.path).unwrap();
    (report, gate, saved)
}

#[test]
fn test_declined_prefix_excluded_from_file_and_count() {
    let fresh = pattern(5000);
    let (report, gate, saved) = receive_after_stale(false, &fresh);

    assert_eq!(gate.offered, vec![STALE.len()]);
    assert_eq!(report.kept_pending, 0);
    assert_eq!(report.bytes, fresh.len() as u64);
    assert_eq!(saved, fresh);
    assert!(gate.updates.iter().all(|u| u.total_bytes <= fresh.len() as u64));
}

#[test]
fn test_kept_prefix_leads_the_file() {
    let fresh = pattern(5000);
    let (report, gate, saved) = receive_after_stale(true, &fresh);

    assert_eq!(gate.offered, vec![STALE.len()]);
    assert_eq!(report.kept_pending, STALE.len() as u64);
    assert_eq!(report.bytes, (STALE.len() + fresh.len()) as u64);
    assert_eq!(&saved[..STALE.len()], STALE);
    assert_eq!(&saved[STALE.len()..], fresh.as_slice());
}
