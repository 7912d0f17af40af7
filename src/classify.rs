//! Content-based failure classification for model output.
//!
//! The model service reports refusals and degraded answers as ordinary
//! text, so the pipeline decides whether an output is usable by looking
//! at its content. The check sits behind [`ErrorClassifier`] so a
//! stricter implementation can replace the keyword heuristic.

/// Decides whether a piece of model output should be treated as failed.
pub trait ErrorClassifier: Send + Sync {
    /// Returns true if `text` looks like an error rather than a usable answer.
    fn is_error_shaped(&self, text: &str) -> bool;
}

/// Default failure indicators, matched against the lowercased text.
pub const DEFAULT_INDICATORS: [&str; 5] = ["error", "unable to", "cannot", "quota", "failed to"];

/// Keyword heuristic: empty text, or text containing any indicator substring.
#[derive(Debug, Clone)]
pub struct KeywordClassifier {
    indicators: Vec<String>,
}

impl KeywordClassifier {
    /// Create a classifier from a list of indicator substrings.
    ///
    /// Indicators are lowercased once here; blank entries are dropped.
    pub fn new<I, S>(indicators: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let indicators = indicators
            .into_iter()
            .map(|s| s.as_ref().trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect();
        Self { indicators }
    }
}

impl Default for KeywordClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_INDICATORS)
    }
}

impl ErrorClassifier for KeywordClassifier {
    fn is_error_shaped(&self, text: &str) -> bool {
        if text.trim().is_empty() {
            return true;
        }

        let lowered = text.to_lowercase();
        self.indicators.iter().any(|needle| lowered.contains(needle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CLINICAL_REPORT: &str = "The patient presents with intermittent palpitations \
        and mild exertional dyspnea. Blood pressure is elevated at 148/92 mmHg. \
        An ECG and a 24-hour Holter monitor are recommended to characterize the rhythm.";

    #[test]
    fn test_empty_text_is_error() {
        let classifier = KeywordClassifier::default();
        assert!(classifier.is_error_shaped(""));
        assert!(classifier.is_error_shaped("   \n\t"));
    }

    #[test]
    fn test_quota_exceeded_is_error() {
        let classifier = KeywordClassifier::default();
        assert!(classifier.is_error_shaped("Quota exceeded for this project"));
        assert!(classifier.is_error_shaped("Error: 503 UNAVAILABLE"));
        assert!(classifier.is_error_shaped("I am unable to provide a diagnosis."));
    }

    #[test]
    fn test_clinical_report_is_not_error() {
        let classifier = KeywordClassifier::default();
        assert!(!classifier.is_error_shaped(CLINICAL_REPORT));
    }

    #[test]
    fn test_custom_indicators() {
        let classifier = KeywordClassifier::new(["REFUSED", "  "]);
        assert!(classifier.is_error_shaped("request refused"));
        assert!(!classifier.is_error_shaped("an error occurred"));
    }
}
