// src/formatting.rs

use crate::core::CanonicalAlert;

/// A trait for rendering an alert into the text sent to the notification channel.
pub trait TextFormatter: Send + Sync {
    fn format_alert(&self, alert: &CanonicalAlert) -> String;
}

/// Renders the single-line form: `[status] name on instance — summary`.
pub struct PlainTextFormatter;

impl TextFormatter for PlainTextFormatter {
    fn format_alert(&self, alert: &CanonicalAlert) -> String {
        alert.to_string()
    }
}
