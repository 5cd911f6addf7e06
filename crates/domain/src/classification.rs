//! Classification request and result types.
//!
//! The classification itself happens remotely; these types only mirror the
//! wire shapes of `POST /classify`.

use serde::{Deserialize, Serialize};

/// Body of a classification request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationRequest {
    /// Free-text product description.
    pub product_description: String,
    /// Country where the product was made.
    pub country_of_origin: String,
}

impl ClassificationRequest {
    /// Creates a request.
    pub fn new(
        product_description: impl Into<String>,
        country_of_origin: impl Into<String>,
    ) -> Self {
        Self {
            product_description: product_description.into(),
            country_of_origin: country_of_origin.into(),
        }
    }
}

/// A code with its tariff-schedule description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CodeDescription {
    /// Code at this level of the hierarchy (e.g. `69`, `6912`, `6912.00`).
    #[serde(default)]
    pub code: String,
    /// Schedule text for the code.
    #[serde(default)]
    pub description: String,
}

/// Chapter, heading and subheading breakdown of a tariff code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct HtsStructure {
    /// Two-digit chapter.
    #[serde(default)]
    pub chapter: CodeDescription,
    /// Four-digit heading.
    #[serde(default)]
    pub heading: CodeDescription,
    /// Six-digit subheading.
    #[serde(default)]
    pub subheading: CodeDescription,
}

/// The classification proper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    /// Full tariff code, e.g. `6912.00.45`.
    pub hts_code: String,
    /// Description of the full code.
    #[serde(default)]
    pub description: String,
    /// Service-reported confidence in `[0, 1]`.
    #[serde(default)]
    pub confidence: f64,
    /// Hierarchical breakdown.
    #[serde(default)]
    pub structure: HtsStructure,
}

/// Response of `POST /classify`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    /// Code and breakdown.
    pub classification: Classification,
    /// Markdown justification text.
    #[serde(default)]
    pub justification: String,
}

impl ClassificationResult {
    /// Shortcut for the full tariff code.
    #[must_use]
    pub fn hts_code(&self) -> &str {
        &self.classification.hts_code
    }

    /// Confidence as a whole percentage, clamped to `0..=100`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn confidence_percent(&self) -> u8 {
        (self.classification.confidence.clamp(0.0, 1.0) * 100.0).round() as u8
    }
}
