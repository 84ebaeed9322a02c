//! Reporting channels for field-local problems.
//!
//! Transformers never fail on these; they report and return the original value.

use std::cell::RefCell;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The field could not be normalized and is left untouched.
    Critical,
    /// Soft warning; the field is left untouched.
    Info,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub severity: Severity,
    pub message: String,
}

pub trait Reporter {
    fn report(&self, severity: Severity, message: &str);

    fn critical(&self, message: &str) {
        self.report(Severity::Critical, message);
    }

    fn info(&self, message: &str) {
        self.report(Severity::Info, message);
    }
}

/// Forwards reports to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn report(&self, severity: Severity, message: &str) {
        match severity {
            Severity::Critical => tracing::error!("{message}"),
            Severity::Info => tracing::info!("{message}"),
        }
    }
}

/// Keeps every report in memory.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    reports: RefCell<Vec<Report>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> Vec<Report> {
        self.reports.borrow().clone()
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.reports
            .borrow()
            .iter()
            .filter(|r| r.severity == severity)
            .count()
    }
}

impl Reporter for RecordingReporter {
    fn report(&self, severity: Severity, message: &str) {
        self.reports.borrow_mut().push(Report {
            severity,
            message: message.to_string(),
        });
    }
}

/// Prefixes every message with the record and field it concerns.
pub struct FieldReporter<'a> {
    inner: &'a dyn Reporter,
    record: &'a str,
    field: &'a str,
}

impl<'a> FieldReporter<'a> {
    pub fn new(inner: &'a dyn Reporter, record: &'a str, field: &'a str) -> Self {
        Self {
            inner,
            record,
            field,
        }
    }
}

impl Reporter for FieldReporter<'_> {
    fn report(&self, severity: Severity, message: &str) {
        self.inner.report(
            severity,
            &format!("{} / {}: {message}", self.record, self.field),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_reporter_prefixes_messages() {
        let sink = RecordingReporter::new();
        let scoped = FieldReporter::new(&sink, "1700000000", "Date");
        scoped.critical("bad date");
        scoped.info("fyi");
        assert_eq!(
            sink.reports(),
            vec![
                Report {
                    severity: Severity::Critical,
                    message: "1700000000 / Date: bad date".to_string(),
                },
                Report {
                    severity: Severity::Info,
                    message: "1700000000 / Date: fyi".to_string(),
                },
            ]
        );
        assert_eq!(sink.count(Severity::Critical), 1);
    }
}
