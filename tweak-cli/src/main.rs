use std::error::Error;
use std::path::PathBuf;

use clap::Parser;
use log::{info, warn};
use tweak::core::logging::init_logger_with_filter;
use tweak::prelude::*;

mod script;

use script::{Action, Script};

#[derive(Debug, Parser, Clone)]
#[command(name = "tweak")]
#[command(about = "Replays scripted input against an override file")]
struct Cli {
    /// Override definitions (yaml).
    #[arg(long)]
    config: PathBuf,

    /// Input events (yaml). Without one the frames run with no input.
    #[arg(long)]
    script: Option<PathBuf>,

    #[arg(long, default_value_t = 60)]
    fps: u64,

    /// Defaults to one past the last scripted frame.
    #[arg(long)]
    frames: Option<u64>,

    /// Initial separation reported by the sink.
    #[arg(long, default_value_t = 50.0)]
    separation: f32,

    /// Initial convergence reported by the sink.
    #[arg(long, default_value_t = 1.0)]
    convergence: f32,

    /// Log filter, `RUST_LOG` syntax. `RUST_LOG` itself takes precedence.
    #[arg(long, default_value = "tweak=info")]
    log: String,
}

type Hub = OverrideHub<MemorySink, ManualClock>;

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_logger_with_filter(&cli.log);

    if cli.fps == 0 {
        return Err("--fps must be greater than zero".into());
    }

    let script = match &cli.script {
        Some(path) => Script::load(path)?,
        None => Script::default(),
    };

    let clock = ManualClock::new(0);
    let sink = MemorySink::new(cli.separation, cli.convergence);
    let mut hub = OverrideHub::new(sink, clock.clone());
    hub.load_path(&cli.config)?;

    let frames = cli
        .frames
        .unwrap_or_else(|| script.last_frame().map_or(1, |last| last + 1));
    info!("Running {} frames at {} fps", frames, cli.fps);

    for frame in 0..frames {
        clock.set(frame * 1000 / cli.fps);

        for action in script.actions_for(frame) {
            apply(&mut hub, &action)?;
        }

        hub.frame();
        println!("{}", report(&hub, frame));
    }

    Ok(())
}

fn apply(hub: &mut Hub, action: &Action) -> Result<(), Box<dyn Error>> {
    match action {
        Action::Down(binding) => hub.key_down(binding),
        Action::Up(binding) => hub.key_up(binding),
        Action::Back(cycle) => hub.cycle_back(cycle),
        Action::Trigger(preset, source) => {
            if !hub.trigger_preset(preset, *source) {
                warn!("Script triggers unknown preset {}", preset);
            }
        }
        Action::Exclude(preset) => {
            if !hub.exclude_preset(preset) {
                warn!("Script excludes unknown preset {}", preset);
            }
        }
        Action::Reload => hub.reload()?,
    }
    Ok(())
}

fn report(hub: &Hub, frame: u64) -> String {
    let sink = hub.sink();
    let mut line = format!(
        "{:>5} {:>7}ms  separation={:.3} convergence={:.3}",
        frame,
        hub.clock().now_ms(),
        sink.separation,
        sink.convergence
    );

    for (_, variable) in hub.variables().iter() {
        line.push_str(&format!(" ${}={:.3}", variable.name, variable.value));
    }

    for (index, row) in sink.published().iter().enumerate() {
        line.push_str(&format!(
            " c{}=[{:.3}, {:.3}, {:.3}, {:.3}]",
            index, row[0], row[1], row[2], row[3]
        ));
    }

    line
}
