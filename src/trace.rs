//! Calculation trace log.
//!
//! A per-invocation diagnostic buffer handed down the call chain by `&mut`.
//! There is no process-wide logger: concurrent calculations each own their
//! log, and parallel variant evaluations write to child logs that are merged
//! back in enumeration order.
//!
//! Nothing in the engine reads the log, so it cannot change a result.

/// Appends a formatted line only when the log is enabled.
///
/// Formatting is skipped entirely for disabled logs.
#[macro_export]
macro_rules! trace_line {
    ($log:expr, $($arg:tt)+) => {
        if $log.is_enabled() {
            $log.append(format!($($arg)+));
        }
    };
}

/// Developer-facing trace of one calculation.
#[derive(Clone, Debug, Default)]
pub struct CalculationLog {
    enabled: bool,
    lines: Vec<String>,
}

impl CalculationLog {
    /// Creates an empty log.
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            lines: Vec::new(),
        }
    }

    /// A log that discards every line.
    pub fn disabled() -> Self {
        Self::new(false)
    }

    pub fn enable(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Records one line. Ignored while disabled.
    pub fn append(&mut self, line: impl Into<String>) {
        if !self.enabled {
            return;
        }
        let line = line.into();
        tracing::trace!(target: "box_calculator::trace", "{}", line);
        self.lines.push(line);
    }

    /// Lines recorded so far.
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Takes all recorded lines, leaving the log empty.
    pub fn drain(&mut self) -> Vec<String> {
        std::mem::take(&mut self.lines)
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    /// Empty log with the same enabled state, for a parallel sub-calculation.
    pub fn child(&self) -> Self {
        Self::new(self.enabled)
    }

    /// Appends the lines of a child log, preserving their order.
    pub fn merge(&mut self, mut child: CalculationLog) {
        if self.enabled {
            self.lines.append(&mut child.lines);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_log_records_nothing() {
        let mut log = CalculationLog::disabled();
        log.append("ignored");
        trace_line!(log, "also {}", "ignored");
        assert!(log.lines().is_empty());
    }

    #[test]
    fn enabled_log_drains_in_order() {
        let mut log = CalculationLog::new(true);
        log.append("first");
        trace_line!(log, "second {}", 2);

        assert_eq!(log.lines(), ["first".to_string(), "second 2".to_string()]);
        let drained = log.drain();
        assert_eq!(drained.len(), 2);
        assert!(log.lines().is_empty());
    }

    #[test]
    fn toggling_and_clearing() {
        let mut log = CalculationLog::disabled();
        log.enable(true);
        log.append("kept");
        log.enable(false);
        log.append("dropped");
        assert_eq!(log.lines().len(), 1);

        log.clear();
        assert!(log.lines().is_empty());
    }

    #[test]
    fn merge_appends_child_lines_after_existing_ones() {
        let mut root = CalculationLog::new(true);
        root.append("root");

        let mut child = root.child();
        child.append("child-a");
        child.append("child-b");
        root.merge(child);

        assert_eq!(root.lines(), ["root", "child-a", "child-b"]);
    }
}
