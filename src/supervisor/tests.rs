#![cfg(unix)]

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use super::*;
use crate::bus::{EventBus, EventType};

fn sh(name: &str, script: &str) -> ProcessSpec {
    let command = vec!["sh".to_string(), "-c".to_string(), script.to_string()];
    ProcessSpec::from_command(name, &command, std::env::temp_dir())
}

fn sleeper(name: &str) -> ProcessSpec {
    let command = vec!["sleep".to_string(), "30".to_string()];
    ProcessSpec::from_command(name, &command, std::env::temp_dir())
}

fn restarts(max: u32) -> RestartPolicy {
    RestartPolicy {
        enabled: true,
        delay: Duration::from_millis(10),
        max_restarts: max,
    }
}

async fn eventually(cond: impl Fn() -> bool) -> bool {
    for _ in 0..200 {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    cond()
}

fn collector() -> (LineHandler, Arc<Mutex<Vec<String>>>) {
    let lines = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&lines);
    let handler: LineHandler = Arc::new(move |line: &str| sink.lock().push(line.to_string()));
    (handler, lines)
}

#[tokio::test]
async fn test_restart_budget_then_failed() {
    let supervisor = ProcessSupervisor::new(None);
    let process = supervisor
        .register(sh("flaky", "exit 1").with_restart(restarts(2)).quiet(true))
        .unwrap();

    process.start().unwrap();
    assert_eq!(process.wait().await, ProcessStatus::Failed);

    let stats = process.stats();
    assert_eq!(stats.restart_count, 2);
    assert_eq!(stats.last_error.as_deref(), Some("exited with code 1"));
    assert_eq!(process.failure(), Some(Failure::Exit(Some(1))));
}

#[tokio::test]
async fn test_no_restart_policy_fails_immediately() {
    let supervisor = ProcessSupervisor::new(None);
    let process = supervisor.register(sh("once", "exit 2").quiet(true)).unwrap();

    process.start().unwrap();
    assert_eq!(process.wait().await, ProcessStatus::Failed);
    assert_eq!(process.stats().restart_count, 0);
}

#[tokio::test]
async fn test_clean_exit_is_stopped() {
    let supervisor = ProcessSupervisor::new(None);
    supervisor.register(sh("ok", "exit 0").quiet(true)).unwrap();

    assert!(supervisor.run_to_completion("ok").await.is_ok());
    assert_eq!(supervisor.get("ok").unwrap().status(), ProcessStatus::Stopped);
}

#[tokio::test]
async fn test_stop_kills_long_running_child() {
    let supervisor = ProcessSupervisor::new(None);
    let process = supervisor.register(sleeper("watcher").quiet(true)).unwrap();

    supervisor.start("watcher").unwrap();
    assert!(eventually(|| process.is_running()).await);
    assert!(process.stats().pid.is_some());

    // Starting again while running is rejected
    assert!(matches!(
        process.start(),
        Err(ProcessError::InvalidState { .. })
    ));

    let stopped = tokio::time::timeout(Duration::from_secs(5), supervisor.stop("watcher")).await;
    assert!(stopped.is_ok());
    assert_eq!(process.status(), ProcessStatus::Stopped);
    assert!(process.stats().uptime.is_none());
}

#[tokio::test]
async fn test_stop_all_reaps_everything() {
    let supervisor = ProcessSupervisor::new(None);
    let a = supervisor.register(sleeper("a").quiet(true)).unwrap();
    let b = supervisor.register(sleeper("b").quiet(true)).unwrap();
    a.start().unwrap();
    b.start().unwrap();
    assert!(eventually(|| a.is_running() && b.is_running()).await);

    supervisor.stop_all().await;
    assert_eq!(a.status(), ProcessStatus::Stopped);
    assert_eq!(b.status(), ProcessStatus::Stopped);
}

#[tokio::test]
async fn test_restart_resets_failure() {
    let supervisor = ProcessSupervisor::new(None);
    let process = supervisor.register(sh("flaky", "exit 1").quiet(true)).unwrap();
    process.start().unwrap();
    assert_eq!(process.wait().await, ProcessStatus::Failed);

    // Failed is not Stopped: a plain start is rejected
    assert!(process.start().is_err());
    supervisor.restart("flaky").await.unwrap();
    assert_eq!(process.wait().await, ProcessStatus::Failed);
}

#[tokio::test]
async fn test_output_lines_reach_handlers() {
    let supervisor = ProcessSupervisor::new(None);
    let (out, out_lines) = collector();
    let (err, err_lines) = collector();
    supervisor
        .register_with(
            sh("talker", "echo one; echo two; echo oops >&2"),
            Some(out),
            Some(err),
        )
        .unwrap();

    supervisor.run_to_completion("talker").await.unwrap();
    assert_eq!(*out_lines.lock(), vec!["one", "two"]);
    assert_eq!(*err_lines.lock(), vec!["oops"]);
}

#[tokio::test]
async fn test_non_utf8_output_is_decoded_lossily() {
    let supervisor = ProcessSupervisor::new(None);
    let (out, out_lines) = collector();
    // Enough output after the bad line to fill the pipe if nobody reads it
    let script = "printf 'ok\\n\\377\\376\\n'; sleep 0.2; \
                  i=0; while [ $i -lt 20000 ]; do echo line; i=$((i+1)); done";
    supervisor
        .register_with(sh("binary", script), Some(out), None)
        .unwrap();

    supervisor.run_to_completion("binary").await.unwrap();
    assert_eq!(supervisor.get("binary").unwrap().status(), ProcessStatus::Stopped);

    let lines = out_lines.lock();
    assert_eq!(lines[0], "ok");
    assert_eq!(lines[1], "\u{FFFD}\u{FFFD}");
    assert!(lines.len() > 2);
}

#[tokio::test]
async fn test_stop_does_not_wait_for_inherited_pipes() {
    let supervisor = ProcessSupervisor::new(None);
    // The background sleep keeps stdout and stderr open after `sh` exits
    let process = supervisor
        .register(sh("forker", "sleep 5 & exit 1").quiet(true))
        .unwrap();
    process.start().unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    let stopped = tokio::time::timeout(Duration::from_secs(2), process.stop()).await;
    assert!(stopped.is_ok());
    assert_eq!(process.status(), ProcessStatus::Stopped);
}

#[tokio::test]
async fn test_run_to_completion_detaches_from_lingering_output() {
    let supervisor = ProcessSupervisor::new(None);
    supervisor
        .register(sh("spawner", "sleep 5 & exit 0").quiet(true))
        .unwrap();

    let finished =
        tokio::time::timeout(Duration::from_secs(3), supervisor.run_to_completion("spawner")).await;
    assert!(matches!(finished, Ok(Ok(()))));
}

#[tokio::test]
async fn test_launch_failure() {
    let supervisor = ProcessSupervisor::new(None);
    let command = vec!["jml-definitely-missing-binary".to_string()];
    supervisor
        .register(ProcessSpec::from_command("missing", &command, std::env::temp_dir()))
        .unwrap();

    let err = supervisor.run_to_completion("missing").await.unwrap_err();
    assert!(matches!(err, ProcessError::Launch { .. }));
}

#[tokio::test]
async fn test_run_to_completion_reports_exhausted_restarts() {
    let supervisor = ProcessSupervisor::new(None);
    supervisor
        .register(sh("post", "exit 4").with_restart(restarts(1)).quiet(true))
        .unwrap();

    let err = supervisor.run_to_completion("post").await.unwrap_err();
    match err {
        ProcessError::RestartsExhausted { restarts, last, .. } => {
            assert_eq!(restarts, 1);
            assert_eq!(last, "exited with code 4");
        }
        other => panic!("unexpected error: {other}"),
    }

    // A second run starts with a fresh budget
    assert!(supervisor.run_to_completion("post").await.is_err());
    assert_eq!(supervisor.get("post").unwrap().stats().restart_count, 1);
}

#[tokio::test]
async fn test_registry_errors() {
    let supervisor = ProcessSupervisor::new(None);
    supervisor.register(sh("x", "true")).unwrap();

    assert!(matches!(
        supervisor.register(sh("x", "true")),
        Err(ProcessError::AlreadyRegistered(_))
    ));
    assert!(matches!(supervisor.start("nope"), Err(ProcessError::Unknown(_))));
    let names: Vec<_> = supervisor.stats().into_iter().map(|s| s.name).collect();
    assert_eq!(names, vec!["x"]);
    assert_eq!(supervisor.stats()[0].status, ProcessStatus::Stopped);
}

#[tokio::test]
async fn test_lifecycle_events_published() {
    let bus = Arc::new(EventBus::new(64));
    let seen = Arc::new(Mutex::new(Vec::new()));
    for kind in [
        EventType::ProcessStarted,
        EventType::ProcessRestarting,
        EventType::ProcessFailed,
    ] {
        let seen = Arc::clone(&seen);
        bus.subscribe(kind, move |event| seen.lock().push(event.kind));
    }
    bus.start();

    let supervisor = ProcessSupervisor::new(Some(Arc::clone(&bus)));
    supervisor
        .register(sh("flaky", "exit 1").with_restart(restarts(1)).quiet(true))
        .unwrap();
    let _ = supervisor.run_to_completion("flaky").await;

    assert!(eventually(|| seen.lock().len() == 4).await);
    let seen = seen.lock().clone();
    assert_eq!(seen.iter().filter(|k| **k == EventType::ProcessStarted).count(), 2);
    assert_eq!(seen.iter().filter(|k| **k == EventType::ProcessRestarting).count(), 1);
    assert_eq!(seen.last(), Some(&EventType::ProcessFailed));

    bus.stop().await;
}
