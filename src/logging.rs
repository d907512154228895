//! Tracing setup for the accelerator and its drive workers
//!
//! Every drive runs its worker on a thread named after the drive
//! ("drive-0", "drive-1", ...). The formatter tags each line with that
//! thread name next to the host, so interleaved output from the drive
//! bank stays attributable without span machinery. No ANSI colors are
//! emitted; the output is safe to redirect to files.

use std::fmt;
use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::EnvFilter;

/// Event formatter for the drive-bank layout
///
/// Line format: `<time> <LEVEL> [<thread>@<host>] <target>: <message>`
pub struct WorkerFormatter {
    host: String,
}

impl Default for WorkerFormatter {
    fn default() -> Self {
        let host = gethostname::gethostname().to_string_lossy().into_owned();
        Self { host }
    }
}

impl<S, N> FormatEvent<S, N> for WorkerFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let meta = event.metadata();
        let now: chrono::DateTime<chrono::Utc> = std::time::SystemTime::now().into();

        write!(writer, "{} {:<5} ", now.format("%H:%M:%S%.6f"), meta.level())?;

        // Drive workers run on threads named after their drive id; API
        // callers show up under whatever thread the bridge gave them
        let thread = std::thread::current();
        write!(
            writer,
            "[{}@{}] ",
            thread.name().unwrap_or("?"),
            self.host
        )?;

        write!(writer, "{}: ", meta.target())?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// Initialize process-wide tracing
///
/// `RUST_LOG` takes precedence when set; otherwise `level` becomes the
/// filter. Calling this more than once is harmless, later calls leave
/// the first subscriber in place.
pub fn init(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let _ = tracing_subscriber::fmt()
        .event_format(WorkerFormatter::default())
        .with_env_filter(filter)
        .try_init();

    tracing::info!("Logging initialized (filter={})", level);
}
