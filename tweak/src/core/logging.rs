use env_logger::{Builder, Env};
use std::io::Write;
use termcolor::{Color, ColorSpec, WriteColor};

pub use log::{debug, error, info, trace, warn};

/// Installs the colored terminal logger. `RUST_LOG` overrides the default
/// `tweak=info` filter. Safe to call more than once.
pub fn init_logger() {
    let builder =
        Builder::from_env(Env::default().default_filter_or("tweak=info"));
    init_with(builder);
}

/// Same as [`init_logger`] but starting from a caller-supplied filter, e.g.
/// `"tweak=debug,tweak_cli=info"`.
pub fn init_logger_with_filter(filter: &str) {
    let builder = Builder::from_env(Env::default().default_filter_or(filter));
    init_with(builder);
}

fn init_with(mut builder: Builder) {
    builder.format(|_buf, record| {
        let writer =
            termcolor::BufferWriter::stdout(termcolor::ColorChoice::Auto);
        let mut buffer = writer.buffer();
        let mut spec = ColorSpec::new();

        spec.set_fg(Some(match record.level() {
            log::Level::Trace => Color::Cyan,
            log::Level::Debug => Color::Blue,
            log::Level::Info => Color::Green,
            log::Level::Warn => Color::Yellow,
            log::Level::Error => Color::Red,
        }));

        buffer.set_color(&spec)?;
        let module_path = record.module_path().unwrap_or("<unknown>");
        write!(buffer, "[{}][{}]", record.level(), module_path)?;
        buffer.reset()?;
        writeln!(buffer, " {}", record.args())?;
        writer.print(&buffer)?;
        Ok(())
    });

    let _ = builder.try_init();
}
