//! Integration tests for giztoy-conduit.
//!
//! Run with `RUST_LOG=giztoy_conduit=trace` to see the flow-control events.

use std::io::SeekFrom;
use std::sync::Once;
use std::thread;
use std::time::Duration;

use giztoy_conduit::{Conduit, ConduitConfig, ConduitError};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

async fn read_all(conduit: &Conduit, chunk: usize) -> Vec<u8> {
    let mut out = Vec::new();
    let mut buf = vec![0u8; chunk];
    loop {
        let n = conduit.read(&mut buf).await.unwrap();
        if n == 0 {
            return out;
        }
        out.extend_from_slice(&buf[..n]);
    }
}

// ============================================================================
// Ordering
// ============================================================================

#[tokio::test]
async fn test_order_preserved_across_writes() {
    init_tracing();
    let conduit = Conduit::with_thresholds(32, 64).unwrap();
    let writer = conduit.clone();

    let writes: Vec<Vec<u8>> = (0..200u32)
        .map(|i| (0..(i % 17 + 1)).map(|j| (i * 31 + j) as u8).collect())
        .collect();
    let expected: Vec<u8> = writes.concat();

    let producer = tokio::spawn(async move {
        for w in &writes {
            writer.write(w).await.unwrap();
        }
        writer.complete_writing().unwrap();
    });

    let out = read_all(&conduit, 13).await;
    producer.await.unwrap();
    assert_eq!(out, expected);
}

#[tokio::test]
async fn test_partial_reads_lose_nothing() {
    let conduit = Conduit::new();
    conduit.write(b"0123456789").await.unwrap();

    let mut first = [0u8; 3];
    assert_eq!(conduit.read(&mut first).await.unwrap(), 3);
    let mut rest = [0u8; 32];
    let n = conduit.read(&mut rest).await.unwrap();

    let mut joined = first.to_vec();
    joined.extend_from_slice(&rest[..n]);
    assert_eq!(joined, b"0123456789");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_producer_consumer_on_threads() {
    init_tracing();
    let conduit = Conduit::with_thresholds(256, 1024).unwrap();
    let writer = conduit.clone();

    let producer = thread::spawn(move || {
        for i in 0..1000u32 {
            writer.write_blocking(&i.to_le_bytes()).unwrap();
        }
        writer.complete_writing().unwrap();
    });

    let out = read_all(&conduit, 100).await;
    producer.join().unwrap();

    assert_eq!(out.len(), 4000);
    for (i, word) in out.chunks(4).enumerate() {
        assert_eq!(u32::from_le_bytes([word[0], word[1], word[2], word[3]]), i as u32);
    }
}

// ============================================================================
// End-of-data
// ============================================================================

#[tokio::test]
async fn test_end_of_data_does_not_suspend() {
    let conduit = Conduit::new();
    conduit.write(b"abc").await.unwrap();
    conduit.complete_writing().unwrap();

    let mut buf = [0u8; 8];
    assert_eq!(conduit.read(&mut buf).await.unwrap(), 3);
    for _ in 0..3 {
        let n = timeout(Duration::from_secs(1), conduit.read(&mut buf))
            .await
            .expect("end-of-data read suspended")
            .unwrap();
        assert_eq!(n, 0);
    }
}

#[tokio::test]
async fn test_reader_woken_by_completion() {
    let conduit = Conduit::new();
    let reader = conduit.clone();
    let pending = tokio::spawn(async move {
        let mut buf = [0u8; 8];
        reader.read(&mut buf).await
    });

    tokio::time::sleep(Duration::from_millis(10)).await;
    conduit.complete_writing().unwrap();
    assert_eq!(pending.await.unwrap(), Ok(0));
}

// ============================================================================
// Backpressure
// ============================================================================

#[tokio::test]
async fn test_backpressure_worked_example() {
    init_tracing();
    let conduit = Conduit::with_config(ConduitConfig::new(50, 100)).unwrap();

    timeout(Duration::from_secs(1), conduit.write(&[1u8; 100]))
        .await
        .expect("write reaching the pause threshold must complete")
        .unwrap();

    let writer = conduit.clone();
    let mut held = tokio::spawn(async move { writer.write(&[2]).await });

    assert!(timeout(Duration::from_millis(50), &mut held).await.is_err());
    assert_eq!(conduit.len(), 101);

    let mut buf = [0u8; 60];
    assert_eq!(conduit.read(&mut buf).await.unwrap(), 60);
    assert_eq!(conduit.len(), 41);

    timeout(Duration::from_secs(1), held)
        .await
        .expect("held write not released")
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn test_oversized_write_held_until_resume() {
    let conduit = Conduit::with_thresholds(50, 100).unwrap();
    let writer = conduit.clone();
    let mut held = tokio::spawn(async move { writer.write(&[3u8; 150]).await });

    assert!(timeout(Duration::from_millis(50), &mut held).await.is_err());
    assert_eq!(conduit.len(), 150);

    let mut buf = [0u8; 100];
    assert_eq!(conduit.read(&mut buf).await.unwrap(), 100);
    timeout(Duration::from_secs(1), held)
        .await
        .expect("held write not released")
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn test_zero_length_write_never_suspends() {
    let conduit = Conduit::with_thresholds(0, 1).unwrap();
    conduit.write(&[1]).await.unwrap();

    timeout(Duration::from_secs(1), conduit.write(&[]))
        .await
        .expect("empty write suspended")
        .unwrap();
    assert_eq!(conduit.len(), 1);
}

#[test]
fn test_inverted_thresholds_fail_fast() {
    let err = Conduit::with_thresholds(101, 100).unwrap_err();
    assert!(matches!(err, ConduitError::InvalidArgument(_)));
}

// ============================================================================
// Termination
// ============================================================================

#[tokio::test]
async fn test_dispose_releases_suspended_reader() {
    let conduit = Conduit::new();
    let reader = conduit.clone();
    let pending = tokio::spawn(async move {
        let mut buf = [0u8; 8];
        reader.read(&mut buf).await
    });

    tokio::time::sleep(Duration::from_millis(10)).await;
    conduit.dispose();

    let res = timeout(Duration::from_secs(1), pending)
        .await
        .expect("reader hung past disposal")
        .unwrap();
    assert_eq!(res, Err(ConduitError::Disposed));
}

#[tokio::test]
async fn test_dispose_releases_held_writer() {
    let conduit = Conduit::with_thresholds(0, 4).unwrap();
    conduit.write(&[0; 4]).await.unwrap();

    let writer = conduit.clone();
    let held = tokio::spawn(async move { writer.write(&[1]).await });
    tokio::time::sleep(Duration::from_millis(10)).await;
    conduit.dispose();

    let res = timeout(Duration::from_secs(1), held).await.unwrap().unwrap();
    assert_eq!(res, Err(ConduitError::Disposed));
}

#[tokio::test]
async fn test_termination_is_idempotent() {
    let conduit = Conduit::new();
    conduit.write(b"keep").await.unwrap();
    conduit.complete_writing().unwrap();
    conduit.complete_writing().unwrap();
    assert_eq!(conduit.len(), 4);
    assert!(conduit.can_read());

    let mut buf = [0u8; 8];
    assert_eq!(conduit.read(&mut buf).await.unwrap(), 4);

    conduit.dispose();
    conduit.dispose();
    assert!(!conduit.can_read());
    assert!(!conduit.can_write());
    assert_eq!(conduit.read(&mut buf).await, Err(ConduitError::Disposed));
}

#[tokio::test]
async fn test_unsupported_operations_any_order() {
    let conduit = Conduit::new();
    for _ in 0..2 {
        assert_eq!(conduit.position(), Err(ConduitError::Unsupported("position")));
        assert_eq!(conduit.seek(SeekFrom::Start(1)), Err(ConduitError::Unsupported("seek")));
        assert_eq!(conduit.stream_len(), Err(ConduitError::Unsupported("length")));
    }

    conduit.write(b"x").await.unwrap();
    assert_eq!(conduit.stream_len(), Err(ConduitError::Unsupported("length")));

    conduit.dispose();
    for _ in 0..2 {
        assert_eq!(conduit.stream_len(), Err(ConduitError::Disposed));
        assert_eq!(conduit.set_position(0), Err(ConduitError::Disposed));
        assert_eq!(conduit.seek(SeekFrom::Start(1)), Err(ConduitError::Disposed));
    }
}

// ============================================================================
// Cancellation
// ============================================================================

#[tokio::test]
async fn test_cancellation_distinct_from_disposal() {
    let conduit = Conduit::new();
    let token = CancellationToken::new();

    let reader = conduit.clone();
    let reader_token = token.clone();
    let pending = tokio::spawn(async move {
        let mut buf = [0u8; 8];
        reader.read_with_cancel(&mut buf, &reader_token).await
    });

    tokio::time::sleep(Duration::from_millis(10)).await;
    token.cancel();
    assert_eq!(pending.await.unwrap(), Err(ConduitError::Cancelled));

    // The conduit remains usable after a cancelled read.
    conduit.write(b"ok").await.unwrap();
    let mut buf = [0u8; 8];
    assert_eq!(conduit.read(&mut buf).await.unwrap(), 2);
}
