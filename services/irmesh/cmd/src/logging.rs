//! Console log format for the node binary.
//!
//! `[timestamp] [component] [level] message key=value ...`

use std::fmt::{self, Write as _};
use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::{format::Writer, FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;

const COLOR_RESET: &str = "\x1b[0m";
const COLOR_CYAN: &str = "\x1b[36m";
const COLOR_GREEN: &str = "\x1b[32m";
const COLOR_BRIGHT_YELLOW: &str = "\x1b[93m";
const COLOR_BRIGHT_RED: &str = "\x1b[91m";
const COLOR_BRIGHT_GRAY: &str = "\x1b[90m";

const COMPONENT_WIDTH: usize = 18;
const LOG_LEVEL_WIDTH: usize = 9;

/// Log a message tagged with a component column
#[macro_export]
macro_rules! component_info {
    ($component:expr, $($arg:tt)*) => {
        tracing::info!(component = $component, $($arg)*)
    };
}

/// Warn with a component column
#[macro_export]
macro_rules! component_warn {
    ($component:expr, $($arg:tt)*) => {
        tracing::warn!(component = $component, $($arg)*)
    };
}

/// Debug with a component column
#[macro_export]
macro_rules! component_debug {
    ($component:expr, $($arg:tt)*) => {
        tracing::debug!(component = $component, $($arg)*)
    };
}

/// Error with a component column
#[macro_export]
macro_rules! component_error {
    ($component:expr, $($arg:tt)*) => {
        tracing::error!(component = $component, $($arg)*)
    };
}

/// Event formatter for irmesh nodes
pub struct IrMeshLogFormatter {
    node_name: String,
    color_enabled: bool,
}

impl IrMeshLogFormatter {
    pub fn new(node_name: String) -> Self {
        Self {
            node_name,
            color_enabled: is_terminal(),
        }
    }

    /// Component column: explicit `component` field, else the event target's
    /// crate (`irmesh_session::service` -> `session`), else the node name
    fn format_component(&self, component: Option<&str>, target: &str) -> String {
        let name = match component {
            Some(comp) => format!("irmesh-{}", comp),
            None => match target.split("::").next() {
                Some(krate) if krate.starts_with("irmesh_") => {
                    format!("irmesh-{}", &krate["irmesh_".len()..])
                }
                _ => self.node_name.clone(),
            },
        };

        if name.chars().count() > COMPONENT_WIDTH {
            let cut: String = name.chars().take(COMPONENT_WIDTH - 1).collect();
            format!("{}…", cut)
        } else {
            format!("{:<width$}", name, width = COMPONENT_WIDTH)
        }
    }

    fn format_log_level(&self, level: &tracing::Level) -> String {
        let level_str = match *level {
            tracing::Level::ERROR => "✗ ERROR",
            tracing::Level::WARN => "⚠ WARN",
            tracing::Level::INFO => "ℹ INFO",
            tracing::Level::DEBUG => "◦ DEBUG",
            tracing::Level::TRACE => "◦ TRACE",
        };
        format!("{:<width$}", level_str, width = LOG_LEVEL_WIDTH)
    }

    fn color_for_level(&self, level: &tracing::Level) -> &'static str {
        if !self.color_enabled {
            return "";
        }

        match *level {
            tracing::Level::ERROR => COLOR_BRIGHT_RED,
            tracing::Level::WARN => COLOR_BRIGHT_YELLOW,
            tracing::Level::INFO => COLOR_GREEN,
            tracing::Level::DEBUG | tracing::Level::TRACE => COLOR_BRIGHT_GRAY,
        }
    }
}

impl<S, N> FormatEvent<S, N> for IrMeshLogFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
        let metadata = event.metadata();
        let level = metadata.level();

        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        let component = self.format_component(visitor.component.as_deref(), metadata.target());
        let formatted_level = self.format_log_level(level);

        let color = self.color_for_level(level);
        let (reset, cyan, gray) = if self.color_enabled {
            (COLOR_RESET, COLOR_CYAN, COLOR_BRIGHT_GRAY)
        } else {
            ("", "", "")
        };

        write!(
            writer,
            "{}[{}] [{}] [{}{}{}] {}",
            cyan, timestamp, component, color, formatted_level, reset, visitor.message
        )?;
        if !visitor.fields.is_empty() {
            write!(writer, " {}{}{}", gray, visitor.fields, reset)?;
        }
        writeln!(writer)
    }
}

/// Collects the message, the component and the remaining structured fields
#[derive(Default)]
struct FieldVisitor {
    message: String,
    component: Option<String>,
    fields: String,
}

impl FieldVisitor {
    fn push_field(&mut self, name: &str, value: fmt::Arguments<'_>) {
        if !self.fields.is_empty() {
            self.fields.push(' ');
        }
        let _ = write!(self.fields, "{}={}", name, value);
    }
}

impl tracing::field::Visit for FieldVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn fmt::Debug) {
        match field.name() {
            "message" => self.message = format!("{:?}", value),
            "component" => {
                let comp = format!("{:?}", value);
                self.component = Some(comp.trim_matches('"').to_string());
            }
            name => self.push_field(name, format_args!("{:?}", value)),
        }
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        match field.name() {
            "message" => self.message = value.to_string(),
            "component" => self.component = Some(value.to_string()),
            name => self.push_field(name, format_args!("{}", value)),
        }
    }
}

/// Colour only when a terminal is attached
fn is_terminal() -> bool {
    match std::env::var("TERM") {
        Ok(term) => term != "dumb",
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn formatter() -> IrMeshLogFormatter {
        IrMeshLogFormatter {
            node_name: "ir-mesh".to_string(),
            color_enabled: false,
        }
    }

    #[test]
    fn test_component_column() {
        let f = formatter();
        assert_eq!(f.format_component(Some("relay"), "x").trim_end(), "irmesh-relay");
        assert_eq!(
            f.format_component(None, "irmesh_session::service").trim_end(),
            "irmesh-session"
        );
        assert_eq!(f.format_component(None, "tokio::net").trim_end(), "ir-mesh");
        assert_eq!(f.format_component(None, "x").chars().count(), COMPONENT_WIDTH);
    }

    #[test]
    fn test_long_component_truncated() {
        let f = formatter();
        let col = f.format_component(Some("a-very-long-component-name"), "x");
        assert_eq!(col.chars().count(), COMPONENT_WIDTH);
        assert!(col.ends_with('…'));
    }

    #[test]
    fn test_level_column() {
        let f = formatter();
        assert_eq!(f.format_log_level(&tracing::Level::WARN), "⚠ WARN   ");
        assert_eq!(f.color_for_level(&tracing::Level::ERROR), "");
    }
}
