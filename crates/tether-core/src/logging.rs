//! Logging and debugging facilities for Tether.
//!
//! This module provides:
//! - Integration with the `tracing` crate for structured logging
//! - Debug visualization of objects, their extensions and connections
//! - Performance tracing hooks for profiling
//!
//! # Tracing Integration
//!
//! Tether uses the `tracing` crate for instrumentation. Nothing is printed
//! unless the application installs a subscriber:
//!
//! ```ignore
//! fn main() {
//!     tracing_subscriber::fmt()
//!         .with_env_filter("tether_core::signal=trace")
//!         .init();
//! }
//! ```
//!
//! Connect and disconnect are logged at `debug`, refused operations at
//! `warn`, and per-dispatch detail at `trace`.
//!
//! # Debug Visualization
//!
//! Use [`ObjectDebug`] to dump an object:
//!
//! ```
//! use tether_core::{Object, SignalExtension};
//! use tether_core::logging::ObjectDebug;
//!
//! let object = Object::create("button");
//! object.add_extension(SignalExtension::new("clicked")).unwrap();
//!
//! let output = ObjectDebug::new().format(&object);
//! assert!(output.contains("clicked"));
//! ```

use std::fmt;

use crate::extension::Extension;
use crate::object::Object;

/// Span names used throughout Tether for tracing.
pub mod span_names {
    /// Signal dispatch span.
    pub const DISPATCH: &str = "tether::dispatch";
    /// Performance measurement span.
    pub const PERF: &str = "tether::perf";
}

/// Target names for log filtering.
///
/// Use these with `tracing` directives to filter logs by subsystem.
pub mod targets {
    /// Core framework target.
    pub const CORE: &str = "tether_core";
    /// Signal dispatch target.
    pub const SIGNAL: &str = "tether_core::signal";
    /// Connection lifecycle target.
    pub const CONNECTION: &str = "tether_core::connection";
    /// Guarded container target.
    pub const CONTAINER: &str = "tether_core::container";
    /// Object model target.
    pub const OBJECT: &str = "tether_core::object";
}

/// Style options for object visualization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TreeStyle {
    /// ASCII characters for tree branches.
    Ascii,
    /// Unicode box-drawing characters.
    #[default]
    Unicode,
    /// Compact single-line representation.
    Compact,
}

/// Configuration for [`ObjectDebug`] output.
#[derive(Debug, Clone)]
pub struct FormatOptions {
    /// The style of tree visualization.
    pub style: TreeStyle,
    /// Whether to show extension type names.
    pub show_types: bool,
    /// Whether to list each connection under its extension.
    pub show_connections: bool,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            style: TreeStyle::default(),
            show_types: true,
            show_connections: false,
        }
    }
}

impl FormatOptions {
    /// Create options for detailed debugging output.
    pub fn detailed() -> Self {
        Self {
            show_connections: true,
            ..Default::default()
        }
    }

    /// Create options for minimal output.
    pub fn minimal() -> Self {
        Self {
            show_types: false,
            show_connections: false,
            ..Default::default()
        }
    }
}

/// Debug utility for visualizing an object and its extensions.
#[derive(Debug, Clone, Default)]
pub struct ObjectDebug {
    options: FormatOptions,
}

impl ObjectDebug {
    /// Create a visualizer with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a visualizer with custom options.
    pub fn with_options(options: FormatOptions) -> Self {
        Self { options }
    }

    /// Render `object`.
    pub fn format(&self, object: &Object) -> String {
        Rendered {
            debug: self,
            object,
        }
        .to_string()
    }

    fn branch(&self, is_last: bool) -> (&'static str, &'static str) {
        match (self.options.style, is_last) {
            (TreeStyle::Ascii, false) => ("+-- ", "|   "),
            (TreeStyle::Ascii, true) => ("`-- ", "    "),
            (TreeStyle::Unicode, false) => ("\u{251c}\u{2500}\u{2500} ", "\u{2502}   "),
            (TreeStyle::Unicode, true) => ("\u{2514}\u{2500}\u{2500} ", "    "),
            (TreeStyle::Compact, _) => ("", ""),
        }
    }

    fn write_extension(
        &self,
        f: &mut fmt::Formatter<'_>,
        extension: &dyn Extension,
        is_last: bool,
    ) -> fmt::Result {
        let base = extension.base();
        let connections = base.connections().view();

        if self.options.style == TreeStyle::Compact {
            write!(f, " {}", extension.name())?;
            if self.options.show_types {
                write!(f, ":{}", extension.type_name())?;
            }
            return write!(f, "[{}]", connections.len());
        }

        let (branch, continuation) = self.branch(is_last);
        write!(f, "{branch}{}", extension.name())?;
        if self.options.show_types {
            write!(f, " ({})", extension.type_name())?;
        }
        if base.is_blocked() {
            write!(f, " [blocked]")?;
        }
        writeln!(f, " connections: {}", connections.len())?;

        if self.options.show_connections {
            for connection in connections.iter() {
                let (arrow, peer) = if connection.is_source(base) {
                    ("->", connection.target())
                } else {
                    ("<-", connection.source())
                };
                let peer = peer.map(|peer| peer.name().to_string());
                writeln!(
                    f,
                    "{continuation}  {arrow} {} {}{}",
                    peer.as_deref().unwrap_or("(dropped)"),
                    connection.id(),
                    if connection.is_valid() { "" } else { " (invalid)" }
                )?;
            }
        }
        Ok(())
    }
}

struct Rendered<'a> {
    debug: &'a ObjectDebug,
    object: &'a Object,
}

impl fmt::Display for Rendered<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut extensions = self.object.extensions();
        extensions.sort_by(|a, b| a.name().cmp(b.name()));

        let name = if self.object.name().is_empty() {
            "(unnamed)"
        } else {
            self.object.name()
        };

        if self.debug.options.style == TreeStyle::Compact {
            write!(f, "{name}:")?;
            for extension in &extensions {
                self.debug.write_extension(f, extension.as_ref(), false)?;
            }
            return writeln!(f);
        }

        writeln!(f, "{name} ({} extensions)", extensions.len())?;
        let count = extensions.len();
        for (i, extension) in extensions.iter().enumerate() {
            self.debug
                .write_extension(f, extension.as_ref(), i + 1 == count)?;
        }
        Ok(())
    }
}

/// A guard that keeps a tracing span entered until dropped.
///
/// Useful for measuring how long a dispatch or setup phase takes.
#[derive(Debug)]
pub struct PerfSpan {
    _span: tracing::span::EnteredSpan,
}

impl PerfSpan {
    /// Enter a performance span for `name`.
    pub fn new(name: &'static str) -> Self {
        let span = tracing::info_span!(target: "tether::perf", "perf", operation = name);
        Self {
            _span: span.entered(),
        }
    }
}

/// Log at `trace` under the core target.
#[macro_export]
macro_rules! tether_trace {
    ($($arg:tt)*) => {
        tracing::trace!(target: "tether_core", $($arg)*)
    };
}

/// Log at `debug` under the core target.
#[macro_export]
macro_rules! tether_debug {
    ($($arg:tt)*) => {
        tracing::debug!(target: "tether_core", $($arg)*)
    };
}

/// Log at `info` under the core target.
#[macro_export]
macro_rules! tether_info {
    ($($arg:tt)*) => {
        tracing::info!(target: "tether_core", $($arg)*)
    };
}

/// Log at `warn` under the core target.
#[macro_export]
macro_rules! tether_warn {
    ($($arg:tt)*) => {
        tracing::warn!(target: "tether_core", $($arg)*)
    };
}

/// Log at `error` under the core target.
#[macro_export]
macro_rules! tether_error {
    ($($arg:tt)*) => {
        tracing::error!(target: "tether_core", $($arg)*)
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arguments::ReturnValue;
    use crate::extension::CallbackExtension;
    use crate::signal::SignalExtension;

    fn sample() -> std::sync::Arc<Object> {
        let object = Object::create("button");
        let clicked = SignalExtension::new("clicked");
        let on_click = CallbackExtension::new("on_click", |_, _| ReturnValue::empty());
        object.add_extension(clicked.clone()).unwrap();
        object.add_extension(on_click.clone()).unwrap();
        clicked.connect(on_click);
        object
    }

    #[test]
    fn test_format_default() {
        let object = sample();
        let output = ObjectDebug::new().format(&object);

        assert!(output.starts_with("button (2 extensions)"));
        assert!(output.contains("clicked (SignalExtension) connections: 1"));
        assert!(output.contains("on_click (CallbackExtension) connections: 1"));
    }

    #[test]
    fn test_format_detailed_lists_connections() {
        let object = sample();
        let output = ObjectDebug::with_options(FormatOptions::detailed()).format(&object);

        assert!(output.contains("-> on_click #"));
        assert!(output.contains("<- clicked #"));
    }

    #[test]
    fn test_format_minimal() {
        let object = sample();
        let output = ObjectDebug::with_options(FormatOptions::minimal()).format(&object);

        assert!(output.contains("clicked"));
        assert!(!output.contains("SignalExtension"));
    }

    #[test]
    fn test_format_compact_and_ascii() {
        let object = sample();
        let compact = ObjectDebug::with_options(FormatOptions {
            style: TreeStyle::Compact,
            ..Default::default()
        })
        .format(&object);
        assert_eq!(compact.lines().count(), 1);
        assert!(compact.contains("clicked:SignalExtension[1]"));

        let ascii = ObjectDebug::with_options(FormatOptions {
            style: TreeStyle::Ascii,
            ..Default::default()
        })
        .format(&object);
        assert!(ascii.contains("+-- clicked"));
        assert!(ascii.contains("`-- on_click"));
    }

    #[test]
    fn test_blocked_marker() {
        let object = sample();
        object
            .find_extension("clicked")
            .unwrap()
            .base()
            .set_blocked(true);
        let output = ObjectDebug::new().format(&object);
        assert!(output.contains("[blocked]"));
    }

    #[test]
    fn test_perf_span() {
        let _span = PerfSpan::new("test_operation");
    }
}
