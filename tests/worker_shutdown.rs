//! Worker lifecycle tests: drain, watchdog escalation, racing stops, faults.

use std::sync::atomic::Ordering;

use acs_nbi::lifecycle::{StartupError, StopReason, WorkerOutcome, WorkerProcessState};

mod common;
use common::{wait_for_state, worker_with_stores, FakeStore};

#[tokio::test]
async fn stop_trigger_drains_and_exits_gracefully() {
    let store = FakeStore::new("db");
    let worker = worker_with_stores(vec![store.clone()]);
    let run = tokio::spawn({
        let worker = worker.clone();
        async move { worker.run().await }
    });

    wait_for_state(&worker, WorkerProcessState::Running).await;
    worker.request_stop(StopReason::Signal);

    let outcome = run.await.unwrap().unwrap();
    assert_eq!(outcome, WorkerOutcome::Graceful);
    assert_eq!(*worker.state().borrow(), WorkerProcessState::ExitingGracefully);
    assert_eq!(store.connects.load(Ordering::SeqCst), 1);
    assert_eq!(store.disconnects.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn hanging_disconnect_escalates_to_forceful_exit() {
    let store = FakeStore::hanging("cache");
    let worker = worker_with_stores(vec![store]);
    let run = tokio::spawn({
        let worker = worker.clone();
        async move { worker.run().await }
    });

    wait_for_state(&worker, WorkerProcessState::Running).await;
    worker.request_stop(StopReason::Signal);

    let outcome = run.await.unwrap().unwrap();
    assert_eq!(outcome, WorkerOutcome::Forceful);
    assert_eq!(*worker.state().borrow(), WorkerProcessState::ExitingForcefully);
}

#[tokio::test]
async fn racing_stop_triggers_collapse_into_one_shutdown() {
    let store = FakeStore::new("db");
    let worker = worker_with_stores(vec![store.clone()]);
    let run = tokio::spawn({
        let worker = worker.clone();
        async move { worker.run().await }
    });

    wait_for_state(&worker, WorkerProcessState::Running).await;
    // Two termination signals in quick succession.
    worker.request_stop(StopReason::Signal);
    worker.request_stop(StopReason::Signal);

    let outcome = run.await.unwrap().unwrap();
    assert_eq!(outcome, WorkerOutcome::Graceful);
    assert_eq!(store.disconnects.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn fault_while_running_drains_then_exits() {
    let store = FakeStore::new("db");
    let worker = worker_with_stores(vec![store.clone()]);
    let run = tokio::spawn({
        let worker = worker.clone();
        async move { worker.run().await }
    });

    wait_for_state(&worker, WorkerProcessState::Running).await;
    worker.fault_reporter().report("handler panicked");
    // A second fault during the drain changes nothing.
    worker.fault_reporter().report("handler panicked again");

    let outcome = run.await.unwrap().unwrap();
    assert_eq!(outcome, WorkerOutcome::Graceful);
    assert_eq!(*worker.state().borrow(), WorkerProcessState::ExitingGracefully);
    assert_eq!(store.disconnects.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn stop_during_startup_settles_then_exits() {
    let store = FakeStore::slow("db");
    let worker = worker_with_stores(vec![store.clone()]);
    let run = tokio::spawn({
        let worker = worker.clone();
        async move { worker.run().await }
    });

    // Stop before startup has settled.
    worker.request_stop(StopReason::Signal);

    let outcome = run.await.unwrap().unwrap();
    assert_eq!(outcome, WorkerOutcome::Graceful);
    assert_eq!(*worker.state().borrow(), WorkerProcessState::ExitingGracefully);
    assert_eq!(store.disconnects.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn startup_failure_is_fatal() {
    let worker = worker_with_stores(vec![FakeStore::failing("db")]);
    let err = worker.run().await.unwrap_err();
    assert!(matches!(err, StartupError::Store(_)));
}
