mod support;

use std::env;
use std::fs;
use std::path::PathBuf;

use support::{init_logging, step};
use tweak::prelude::*;

fn temp_file(name: &str, contents: &str) -> PathBuf {
    let path = env::temp_dir().join(format!(
        "tweak-{}-{}.yaml",
        name,
        std::process::id()
    ));
    fs::write(&path, contents).expect("writable temp dir");
    path
}

#[test]
fn loads_and_reloads_from_a_file() {
    init_logging();
    let path = temp_file(
        "reload",
        r#"
aim:
  type: hold
  key: rmb
  convergence: 4
"#,
    );

    let clock = ManualClock::new(0);
    let sink = MemorySink::new(50.0, 1.0);
    let mut hub = OverrideHub::new(sink, clock.clone());
    hub.load_path(&path).unwrap();

    hub.key_down("rmb");
    step(&mut hub, &clock, 16);
    assert_eq!(hub.sink().convergence, 4.0);

    fs::write(
        &path,
        r#"
aim:
  type: hold
  key: rmb
  convergence: 8
"#,
    )
    .unwrap();
    hub.reload().unwrap();

    assert_eq!(hub.sink().convergence, 1.0);
    assert!(!hub.is_active("aim"));
    assert!(hub.global_save().is_empty());

    hub.key_down("rmb");
    step(&mut hub, &clock, 16);
    assert_eq!(hub.sink().convergence, 8.0);

    let _ = fs::remove_file(&path);
}

#[test]
fn reload_settles_in_flight_transitions() {
    init_logging();
    let clock = ManualClock::new(0);
    let sink = MemorySink::new(50.0, 1.0);
    let mut hub = OverrideHub::new(sink, clock.clone());
    hub.load_str(
        r#"
pulse:
  type: activate
  key: p
  separation: 10
  transition: 1000
"#,
    )
    .unwrap();

    hub.key_down("p");
    step(&mut hub, &clock, 500);
    assert_eq!(hub.sink().separation, 30.0);

    hub.reload_str("{}").unwrap();
    assert_eq!(hub.sink().separation, 10.0);
    assert!(hub.transitions().is_idle());

    step(&mut hub, &clock, 500);
    assert_eq!(hub.sink().separation, 10.0);
}

#[test]
fn missing_file_is_an_error() {
    init_logging();
    let mut hub = OverrideHub::new(MemorySink::default(), ManualClock::new(0));
    let result = hub.load_path("/nonexistent/tweak/overrides.yaml");
    assert!(matches!(result, Err(ConfigError::Io(_))));
    assert!(hub.overrides().is_empty());
}

#[test]
fn reload_without_a_file_is_a_noop() {
    init_logging();
    let mut hub = OverrideHub::new(MemorySink::default(), ManualClock::new(0));
    hub.load_str("a:\n  type: toggle\n  key: a\n  separation: 1\n")
        .unwrap();
    assert!(hub.reload().is_ok());
    assert_eq!(hub.overrides().len(), 1);
}

#[test]
fn variables_are_reset_to_their_declared_values_on_reload() {
    init_logging();
    let yaml = "variables:\n  mode: 2\n";
    let mut hub = OverrideHub::new(MemorySink::default(), ManualClock::new(0));
    hub.load_str(yaml).unwrap();

    let mode = hub.variables().resolve("", "$mode").unwrap();
    hub.variables_mut().set(mode, 7.0);
    hub.reload_str(yaml).unwrap();

    assert_eq!(hub.variables().get(mode), 2.0);
}
