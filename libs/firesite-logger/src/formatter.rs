use nu_ansi_term::{AnsiGenericString, Color};
use std::fmt::Result;
use tracing::{Event, Level, Metadata, Subscriber};
use tracing_log::NormalizeEvent;
use tracing_subscriber::{
    fmt::{
        format::{Format, Full, Writer},
        time::FormatTime,
        FmtContext, FormatEvent, FormatFields, FormattedFields,
    },
    registry::LookupSpan,
};

const COLORFUL_ENV: &str = "FIRESITE_COLORFUL_LOGS";

pub struct LogTime;

impl LogTime {
    fn now() -> String {
        if cfg!(debug_assertions) {
            chrono::Local::now().format("%m-%d %H:%M:%S").to_string()
        } else {
            chrono::Utc::now().to_rfc3339()
        }
    }
}

impl FormatTime for LogTime {
    fn format_time(&self, w: &mut Writer<'_>) -> Result {
        write!(w, "[{}]", Self::now())
    }
}

/// Coloured `[time][LEVEL][target]` lines in debug builds or when
/// `FIRESITE_COLORFUL_LOGS` is set, the stock full format otherwise.
pub struct FiresiteFormatter {
    pub(super) fallback: Format<Full, LogTime>,
}

impl FiresiteFormatter {
    fn paint_level(level: &Level) -> AnsiGenericString<'static, str> {
        match *level {
            Level::ERROR => Color::Red.paint("ERROR"),
            Level::WARN => Color::Yellow.paint(" WARN"),
            Level::INFO => Color::Green.paint(" INFO"),
            Level::DEBUG => Color::Blue.paint("DEBUG"),
            Level::TRACE => Color::Purple.paint("TRACE"),
        }
    }

    fn prefix(meta: &Metadata<'_>) -> String {
        format!(
            "[{}][{}][{}] ",
            Color::DarkGray.paint(LogTime::now()),
            Self::paint_level(meta.level()),
            Color::LightCyan.paint(meta.target())
        )
    }

    fn colorful() -> bool {
        cfg!(debug_assertions) || std::env::var(COLORFUL_ENV).is_ok()
    }
}

impl<S, N> FormatEvent<S, N> for FiresiteFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(&self, ctx: &FmtContext<'_, S, N>, mut writer: Writer<'_>, event: &Event<'_>) -> Result {
        if !Self::colorful() {
            return self.fallback.format_event(ctx, writer, event);
        }

        let normalized = event.normalized_metadata();
        let meta = normalized.as_ref().unwrap_or_else(|| event.metadata());

        write!(&mut writer, "{}", Self::prefix(meta))?;

        if let Some(scope) = ctx.event_scope() {
            for span in scope.from_root() {
                write!(writer, "{}", span.name())?;

                let ext = span.extensions();
                if let Some(fields) = ext.get::<FormattedFields<N>>() {
                    if !fields.is_empty() {
                        write!(writer, "{{{fields}}}")?;
                    }
                }
                write!(writer, ": ")?;
            }
        }

        ctx.field_format().format_fields(writer.by_ref(), event)?;

        writeln!(writer)
    }
}
