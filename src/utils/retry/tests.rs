use super::*;
use std::io;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::time::Instant;

fn refused() -> io::Error {
    io::Error::new(io::ErrorKind::ConnectionRefused, "connection refused")
}

#[test]
fn test_default_policy() {
    let policy = RetryPolicy::default();
    assert_eq!(policy.max_retries, 5);
    assert_eq!(policy.delay, Duration::from_millis(4000));
    assert_eq!(policy.max_wait(), Duration::from_secs(20));
}

#[test]
fn test_backoff_is_constant_and_bounded() {
    let policy = RetryPolicy::new(3, Duration::from_millis(250));
    let delays: Vec<Duration> = policy.backoff().build().collect();
    assert_eq!(delays, vec![Duration::from_millis(250); 3]);
}

#[test]
fn test_is_connection_refused() {
    assert!(is_connection_refused(&refused()));
    assert!(!is_connection_refused(&io::Error::new(
        io::ErrorKind::PermissionDenied,
        "denied"
    )));
}

#[tokio::test(start_paused = true)]
async fn test_exhausts_after_initial_plus_max_retries() {
    let attempts = Arc::new(AtomicU32::new(0));
    let policy = RetryPolicy::new(2, Duration::from_millis(4000));
    let started = Instant::now();

    let counter = attempts.clone();
    let mut connector = Connector::new(policy);
    let result: Result<(), _> = connector
        .connect(
            "amqp://localhost",
            || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err(refused()) }
            },
            is_connection_refused,
        )
        .await;

    assert_eq!(attempts.load(Ordering::SeqCst), 3);
    // Two waits of the configured delay
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_millis(8000), "waited {:?}", elapsed);
    assert!(elapsed < Duration::from_millis(12000), "waited {:?}", elapsed);
    assert_eq!(connector.state(), ConnectState::Failed { attempts: 3 });

    match result {
        Err(ConnectError::Exhausted {
            attempts,
            retries,
            waited,
            ..
        }) => {
            assert_eq!(attempts, 3);
            assert_eq!(retries, 2);
            assert_eq!(waited, Duration::from_millis(8000));
        }
        other => panic!("expected exhausted, got {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn test_zero_retries_makes_single_attempt() {
    let attempts = Arc::new(AtomicU32::new(0));
    let counter = attempts.clone();

    let result: Result<(), _> = connect_with_retry(
        "amqp://localhost",
        RetryPolicy::new(0, Duration::from_secs(1)),
        || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Err(refused()) }
        },
        is_connection_refused,
    )
    .await;

    assert_eq!(attempts.load(Ordering::SeqCst), 1);
    assert!(result.unwrap_err().is_exhausted());
}

#[tokio::test(start_paused = true)]
async fn test_succeeds_after_refusals() {
    let attempts = Arc::new(AtomicU32::new(0));
    let counter = attempts.clone();
    let mut connector = Connector::new(RetryPolicy::new(5, Duration::from_millis(100)));

    let result = connector
        .connect(
            "amqp://localhost",
            || {
                let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    if n < 3 {
                        Err(refused())
                    } else {
                        Ok("channel")
                    }
                }
            },
            is_connection_refused,
        )
        .await;

    assert_eq!(result.unwrap(), "channel");
    assert_eq!(connector.state(), ConnectState::Connected { attempts: 3 });
}

#[tokio::test(start_paused = true)]
async fn test_counter_restarts_on_each_connect() {
    let mut connector = Connector::new(RetryPolicy::new(1, Duration::from_millis(100)));

    let first: Result<(), _> = connector
        .connect("a", || async { Err(refused()) }, is_connection_refused)
        .await;
    assert!(first.unwrap_err().is_exhausted());

    let second = connector
        .connect("a", || async { Ok::<_, io::Error>(()) }, is_connection_refused)
        .await;
    assert!(second.is_ok());
    assert_eq!(connector.state(), ConnectState::Connected { attempts: 1 });
}

#[tokio::test(start_paused = true)]
async fn test_non_retryable_error_fails_immediately() {
    let attempts = Arc::new(AtomicU32::new(0));
    let counter = attempts.clone();
    let started = Instant::now();

    let result: Result<(), _> = connect_with_retry(
        "amqp://localhost",
        RetryPolicy::default(),
        || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Err(io::Error::new(io::ErrorKind::InvalidData, "bad handshake")) }
        },
        is_connection_refused,
    )
    .await;

    assert_eq!(attempts.load(Ordering::SeqCst), 1);
    assert_eq!(started.elapsed(), Duration::ZERO);
    let err = result.unwrap_err();
    assert!(!err.is_exhausted());
    assert_eq!(err.into_source().kind(), io::ErrorKind::InvalidData);
}

#[test]
fn test_exhausted_display() {
    let err: ConnectError<io::Error> = ConnectError::Exhausted {
        attempts: 6,
        retries: 5,
        waited: Duration::from_secs(20),
        source: refused(),
    };
    assert_eq!(
        err.to_string(),
        "Failed to connect after 5 retries and 20000 ms: connection refused"
    );
}
