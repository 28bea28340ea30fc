//! End-to-end launch orchestration and history recording.

use std::sync::Arc;

use launcher::io::history_store::HistoryStore;
use launcher::launch::{LaunchRequest, run_launch};
use launcher::supervisor::Supervisor;
use launcher::test_support::{CollectingSink, StaticResolver, TestArea};

fn sh_supervisor() -> Supervisor {
    Supervisor::new(
        Arc::new(StaticResolver::failing()),
        vec!["/bin/sh".to_string()],
    )
}

#[test]
fn successful_launch_records_one_history_entry() {
    let area = TestArea::new().expect("area");
    let script = area.write_script("model.sh", "printf 'working'\n");
    let config = area.write_config(
        "model_config.yml",
        "folder: /data/imagery\nmodel_path: null\n",
    );
    let history = HistoryStore::new(area.history_path());
    let supervisor = sh_supervisor();
    let sink = Arc::new(CollectingSink::new());

    let request = LaunchRequest {
        script: script.clone(),
        config: Some(config),
        environment: None,
    };
    let outcome = run_launch(&request, &supervisor, sink.clone(), &history).expect("launch");

    assert!(outcome.success);
    assert!(sink.output().contains("working"));

    let entries = history.load_all().expect("load");
    assert_eq!(entries.len(), 1);
    let entry = &entries[0];
    assert!(entry.success);
    assert_eq!(entry.script, "model.sh");
    assert_eq!(entry.environment, None);
    assert_eq!(entry.config_file.as_deref(), Some("model_config.yml"));
    assert_eq!(
        entry.config_values.get("folder"),
        Some(&Some("/data/imagery".to_string()))
    );
    assert_eq!(entry.config_values.get("model_path"), Some(&None));
    assert!(entry.command.contains("model.sh"));
    assert!(entry.command.contains("--config"));
    assert_eq!(entry.timestamp.len(), "2025-01-01 00:00:00".len());
}

#[test]
fn failed_launch_is_recorded_as_failure() {
    let area = TestArea::new().expect("area");
    let script = area.write_script("broken.sh", "echo nope >&2\nexit 2\n");
    let history = HistoryStore::new(area.history_path());
    let supervisor = sh_supervisor();

    let request = LaunchRequest {
        script,
        config: None,
        environment: None,
    };
    let outcome = run_launch(
        &request,
        &supervisor,
        Arc::new(CollectingSink::new()),
        &history,
    )
    .expect("launch");

    assert!(!outcome.success);
    let entries = history.load_all().expect("load");
    assert_eq!(entries.len(), 1);
    assert!(!entries[0].success);
    assert_eq!(entries[0].config_file, None);
}

#[test]
fn environment_name_is_recorded_with_the_run() {
    let area = TestArea::new().expect("area");
    let script = area.write_script("model.sh", "exit 0\n");
    let history = HistoryStore::new(area.history_path());
    let supervisor = Supervisor::new(
        Arc::new(StaticResolver::with_prefix(vec!["/bin/sh".to_string()])),
        vec!["/bin/sh".to_string()],
    );

    let request = LaunchRequest {
        script,
        config: None,
        environment: Some("modeling".to_string()),
    };
    run_launch(
        &request,
        &supervisor,
        Arc::new(CollectingSink::new()),
        &history,
    )
    .expect("launch");

    let entries = history.load_all().expect("load");
    assert_eq!(entries[0].environment.as_deref(), Some("modeling"));
}

#[test]
fn unreadable_config_records_empty_values() {
    let area = TestArea::new().expect("area");
    let script = area.write_script("model.sh", "exit 0\n");
    let history = HistoryStore::new(area.history_path());
    let supervisor = sh_supervisor();

    let request = LaunchRequest {
        script,
        config: Some(area.path().join("missing_config.yml")),
        environment: None,
    };
    let outcome = run_launch(
        &request,
        &supervisor,
        Arc::new(CollectingSink::new()),
        &history,
    )
    .expect("launch");

    assert!(outcome.success);
    let entries = history.load_all().expect("load");
    assert!(entries[0].config_values.is_empty());
}

#[test]
fn history_write_failure_does_not_fail_the_run() {
    let area = TestArea::new().expect("area");
    let script = area.write_script("model.sh", "printf 'fine'\n");
    // Put the history file under a path whose parent is a regular file so
    // every write attempt fails.
    let occupied = area.write_config("occupied", "");
    let history = HistoryStore::new(occupied.join("run_history.json"));
    let supervisor = sh_supervisor();

    let request = LaunchRequest {
        script,
        config: None,
        environment: None,
    };
    let outcome = run_launch(
        &request,
        &supervisor,
        Arc::new(CollectingSink::new()),
        &history,
    )
    .expect("launch must survive a history write failure");

    assert!(outcome.success);
}
