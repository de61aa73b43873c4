//! Human-readable console rendering of events.
//!
//! Each event becomes one or two lines:
//!
//! ```text
//! 14:03:27.512 INFO  login:user:7 (1) welcome
//!                                   web-1.4242 |auth.rs@88 method:sso
//! ```
//!
//! The second line is indented to sit under the name column and carries the
//! origin, code location and any remaining fields. It is omitted when blank.

use std::{
    fmt::Write as _,
    io::{self, Write},
};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::event::Event;

const LINE2_INDENT: usize = 34;

/// Render `event` in the two-line console format without a trailing newline.
pub fn format_console(event: &Event) -> String {
    let mut out = format!(
        "{:<12} {:<5} {}:{} ({}) {}",
        format_tstamp(event.tstamp),
        event.level,
        event.name,
        event.target,
        event.value,
        event.message.as_deref().unwrap_or_default(),
    );

    let code = event
        .code
        .as_ref()
        .map(|code| code.short())
        .unwrap_or_default();
    let line2 = format!(
        "{}.{} {} {}",
        event.origin.host,
        event.origin.pid,
        code,
        format_other(event)
    );
    if !line2.trim().is_empty() {
        out.push('\n');
        out.extend(std::iter::repeat_n(' ', LINE2_INDENT));
        out.push_str(line2.trim_end());
    }
    out
}

fn format_tstamp(tstamp: f64) -> String {
    let micros = (tstamp * 1e6).floor() as i64;
    let secs = micros.div_euclid(1_000_000);
    let nanos = (micros.rem_euclid(1_000_000) * 1_000) as u32;
    match DateTime::<Utc>::from_timestamp(secs, nanos) {
        Some(at) => at.format("%H:%M:%S%.3f").to_string(),
        None => format!("{tstamp:.3}"),
    }
}

// Fields sorted by key, then labels and duration when present.
fn format_other(event: &Event) -> String {
    let mut other = String::new();
    for (key, value) in &event.fields {
        let _ = write!(other, "{key}:{value} ");
    }
    if !event.labels.is_empty() {
        let _ = write!(other, "labels:{} ", event.labels.join(","));
    }
    if event.duration != 0.0 {
        let _ = write!(other, "duration:{} ", event.duration);
    }
    other.truncate(other.trim_end().len());
    other
}

/// Synchronous console writer shared between threads.
///
/// Writes take a lock so lines from concurrent callers never interleave.
pub struct ConsoleSink {
    writer: Mutex<Box<dyn Write + Send>>,
}

impl ConsoleSink {
    pub fn new(writer: impl Write + Send + 'static) -> Self {
        Self {
            writer: Mutex::new(Box::new(writer)),
        }
    }

    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }

    pub fn stderr() -> Self {
        Self::new(io::stderr())
    }

    /// Format and write one event followed by a newline.
    pub fn write_event(&self, event: &Event) -> io::Result<()> {
        let mut line = format_console(event);
        line.push('\n');
        let mut writer = self.writer.lock();
        writer.write_all(line.as_bytes())?;
        writer.flush()
    }
}

impl std::fmt::Debug for ConsoleSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsoleSink").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        event::{CodeLocation, Origin},
        level::EventLevel,
        test_utils::{BrokenWriter, SharedBuf},
    };
    use rstest::{fixture, rstest};

    #[fixture]
    fn event() -> Event {
        let mut event = Event::new("login", "user:7")
            .with_level(EventLevel::Info)
            .with_value(1.0)
            .with_message("welcome")
            .with_field("method", "sso")
            .with_field("attempt", 2)
            // 2021-01-01T14:03:27.512Z
            .with_tstamp(1_609_509_807.512_4)
            .with_code(CodeLocation {
                file: "/srv/app/auth.rs".into(),
                line: 88,
                function: Some("login".into()),
            });
        event.origin = Origin {
            host: "web-1".into(),
            pid: 4242,
            client: String::new(),
            datactr: String::new(),
            cluster: String::new(),
            deploy: "PROD".into(),
        };
        event
    }

    #[rstest]
    fn formats_two_lines(event: Event) {
        let text = format_console(&event);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "14:03:27.512 INFO  login:user:7 (1) welcome");
        assert_eq!(
            lines[1],
            format!(
                "{}web-1.4242 login|auth.rs@88 attempt:2 method:sso",
                " ".repeat(LINE2_INDENT)
            )
        );
    }

    #[rstest]
    fn missing_message_and_code_leave_columns_blank(mut event: Event) {
        event.message = None;
        event.code = None;
        event.fields.clear();
        let text = format_console(&event);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "14:03:27.512 INFO  login:user:7 (1) ");
        assert_eq!(lines[1].trim(), "web-1.4242");
    }

    #[rstest]
    fn labels_and_duration_are_listed(mut event: Event) {
        event.fields.clear();
        let event = event.with_label("a").with_label("b").with_duration(0.25);
        let text = format_console(&event);
        assert!(text.ends_with("labels:a,b duration:0.25"));
    }

    #[rstest]
    fn sink_appends_newline(event: Event) {
        let buf = SharedBuf::default();
        let sink = ConsoleSink::new(buf.clone());
        sink.write_event(&event).expect("write");
        sink.write_event(&event).expect("write");
        assert_eq!(buf.lines().len(), 4);
        assert!(buf.contents().ends_with('\n'));
    }

    #[rstest]
    fn sink_reports_write_errors(event: Event) {
        let sink = ConsoleSink::new(BrokenWriter);
        assert!(sink.write_event(&event).is_err());
    }
}
