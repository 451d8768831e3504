use std::fmt;

use tracing::{Event, Level, Subscriber};
use tracing_subscriber::{
    fmt::{
        FmtContext,
        format::{FormatEvent, FormatFields, Writer},
    },
    registry::LookupSpan,
};

#[derive(Clone, Copy)]
struct Palette {
    reset: &'static str,
    dim: &'static str,
    bold: &'static str,
}

const ANSI: Palette = Palette {
    reset: "\x1b[0m",
    dim: "\x1b[2m",
    bold: "\x1b[1m",
};

const PLAIN: Palette = Palette {
    reset: "",
    dim: "",
    bold: "",
};

fn level_colour(level: &Level) -> &'static str {
    match *level {
        Level::ERROR => "\x1b[31m",
        Level::WARN => "\x1b[33m",
        Level::INFO => "\x1b[32m",
        Level::DEBUG => "\x1b[36m",
        Level::TRACE => "\x1b[90m",
    }
}

/// One line per event:
/// `HH:MM:SS.mmm LEVEL [thread] module:line | span > span | message`.
pub struct VoiceFormatter {
    palette: Palette,
    ansi: bool,
}

impl VoiceFormatter {
    pub fn new(ansi: bool) -> Self {
        Self {
            palette: if ansi { ANSI } else { PLAIN },
            ansi,
        }
    }
}

fn write_timestamp(writer: &mut Writer<'_>) -> fmt::Result {
    let description =
        time::macros::format_description!("[hour]:[minute]:[second].[subsecond digits:3]");
    let now = time::OffsetDateTime::now_local().unwrap_or_else(|_| time::OffsetDateTime::now_utc());
    match now.format(&description) {
        Ok(stamp) => write!(writer, "{stamp}"),
        Err(_) => write!(writer, "--:--:--.---"),
    }
}

impl<S, N> FormatEvent<S, N> for VoiceFormatter
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
        let Palette { reset, dim, bold } = self.palette;
        let meta = event.metadata();

        write!(writer, "{dim}")?;
        write_timestamp(&mut writer)?;
        write!(writer, "{reset} ")?;

        let colour = if self.ansi { level_colour(meta.level()) } else { "" };
        write!(writer, "{colour}{bold}{:>5}{reset} ", meta.level().as_str())?;

        let thread = std::thread::current();
        match thread.name() {
            Some(name) => write!(writer, "[{name}] ")?,
            None => write!(writer, "[{:?}] ", thread.id())?,
        }

        let module = meta.module_path().unwrap_or_else(|| meta.target());
        match meta.line() {
            Some(line) => write!(writer, "{dim}{module}:{line}{reset} | ")?,
            None => write!(writer, "{dim}{module}{reset} | ")?,
        }

        if let Some(scope) = ctx.event_scope() {
            let mut wrote_span = false;
            for span in scope.from_root() {
                if wrote_span {
                    write!(writer, " > ")?;
                }
                write!(writer, "{bold}{}{reset}", span.name())?;
                wrote_span = true;
            }
            if wrote_span {
                write!(writer, " | ")?;
            }
        }

        ctx.format_fields(writer.by_ref(), event)?;
        writeln!(writer, "{reset}")
    }
}
