/*!
 * Tests for the request gate under concurrent callers
 */

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use subtrans::translation::concurrency::{MAX_IN_FLIGHT_REQUESTS, RequestGate};

#[tokio::test]
async fn test_requestGate_withConcurrentCallers_shouldSpaceCallStarts() {
    let gate = Arc::new(RequestGate::new(2, Duration::from_millis(40)));
    let started = Arc::new(parking_lot::Mutex::new(Vec::new()));

    let tasks: Vec<_> = (0..4)
        .map(|_| {
            let gate = gate.clone();
            let started = started.clone();
            tokio::spawn(async move {
                gate.run(async {
                    started.lock().push(Instant::now());
                })
                .await
            })
        })
        .collect();

    for task in tasks {
        task.await.unwrap();
    }

    let mut started = started.lock().clone();
    started.sort();
    assert_eq!(started.len(), 4);
    assert!(started[3] - started[0] >= Duration::from_millis(115));
}

#[tokio::test(start_paused = true)]
async fn test_requestGate_withManyCallers_shouldNeverExceedCeiling() {
    let gate = Arc::new(RequestGate::new(8, Duration::ZERO));
    let current = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let tasks: Vec<_> = (0..10)
        .map(|_| {
            let gate = gate.clone();
            let current = current.clone();
            let peak = peak.clone();
            tokio::spawn(async move {
                gate.run(async {
                    let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    current.fetch_sub(1, Ordering::SeqCst);
                })
                .await
            })
        })
        .collect();

    for task in tasks {
        task.await.unwrap();
    }

    assert_eq!(peak.load(Ordering::SeqCst), MAX_IN_FLIGHT_REQUESTS);
    assert_eq!(gate.in_flight(), 0);
}
