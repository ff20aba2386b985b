use std::env;
use std::sync::Once;

use tweak::prelude::*;

static INIT: Once = Once::new();

/// Test logs stay quiet unless `TWEAK_TEST_LOGS` is set.
pub fn init_logging() {
    INIT.call_once(|| {
        let level = if logs_enabled() {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Warn
        };
        let _ = env_logger::builder()
            .is_test(true)
            .filter_level(level)
            .try_init();
    });
}

fn logs_enabled() -> bool {
    matches!(
        env::var("TWEAK_TEST_LOGS")
            .unwrap_or_default()
            .to_ascii_lowercase()
            .as_str(),
        "1" | "true" | "yes" | "on"
    )
}

pub type TestHub = OverrideHub<MemorySink, ManualClock>;

/// A hub over a fresh sink (separation 50, convergence 1) with `yaml`
/// loaded, plus a handle to its clock.
pub fn hub(yaml: &str) -> (TestHub, ManualClock) {
    hub_with(yaml, CommandLists::default())
}

pub fn hub_with(yaml: &str, commands: CommandLists) -> (TestHub, ManualClock) {
    init_logging();
    let clock = ManualClock::new(0);
    let mut hub = OverrideHub::new(MemorySink::new(50.0, 1.0), clock.clone())
        .with_command_lists(commands);
    hub.load_str(yaml).expect("valid override yaml");
    (hub, clock)
}

/// Advances the clock by `ms` and runs one frame.
pub fn step(hub: &mut TestHub, clock: &ManualClock, ms: u64) {
    clock.advance(ms);
    hub.frame();
}

pub fn approx(a: f32, b: f32) -> bool {
    (a - b).abs() < 1e-3
}
