//! Language detection
//!
//! The pipeline only needs to know whether a query is English. Detection is
//! a pure function behind [`LanguageDetector`]; the default implementation
//! uses `whatlang` trigram statistics. Any failure to classify, including a
//! guess below [`MIN_CONFIDENCE`], yields [`DetectedLanguage::Unknown`],
//! which the pipeline treats as English.

use std::fmt;

/// ISO 639-3 code of English as reported by the default detector
pub const ENGLISH: &str = "eng";

/// Whatlang confidence below which a guess is reported as unknown
///
/// Short greetings are routinely misread as Danish or Zulu with a confidence
/// close to zero.
pub const MIN_CONFIDENCE: f64 = 0.5;

/// Outcome of language detection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetectedLanguage {
    /// Language code (ISO 639-3 for the default detector)
    Code(String),

    /// Detection was not possible
    Unknown,
}

impl DetectedLanguage {
    /// Whether the query should go through translation
    ///
    /// Unknown is treated as English.
    pub fn needs_translation(&self) -> bool {
        match self {
            Self::Code(code) => !is_english_code(code),
            Self::Unknown => false,
        }
    }
}

impl fmt::Display for DetectedLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Code(code) => write!(f, "{}", code),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Accept both the two- and three-letter forms of English
fn is_english_code(code: &str) -> bool {
    code.eq_ignore_ascii_case(ENGLISH) || code.eq_ignore_ascii_case("en")
}

/// Pure language detection function
pub trait LanguageDetector: Send + Sync {
    fn detect(&self, text: &str) -> DetectedLanguage;
}

/// Detector backed by the `whatlang` crate
#[derive(Debug, Clone, Copy, Default)]
pub struct WhatlangDetector;

impl LanguageDetector for WhatlangDetector {
    fn detect(&self, text: &str) -> DetectedLanguage {
        if text.trim().is_empty() {
            return DetectedLanguage::Unknown;
        }
        match whatlang::detect(text) {
            Some(info) if info.confidence() >= MIN_CONFIDENCE => {
                DetectedLanguage::Code(info.lang().code().to_string())
            }
            Some(info) => {
                tracing::debug!(
                    "Discarding language guess {} (confidence {:.2})",
                    info.lang().code(),
                    info.confidence()
                );
                DetectedLanguage::Unknown
            }
            None => DetectedLanguage::Unknown,
        }
    }
}

/// Detector that always reports the same language
///
/// Useful for deployments that know their callers' language up front.
#[derive(Debug, Clone)]
pub struct FixedDetector(pub DetectedLanguage);

impl LanguageDetector for FixedDetector {
    fn detect(&self, _text: &str) -> DetectedLanguage {
        self.0.clone()
    }
}
