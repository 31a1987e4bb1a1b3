//! Color safety filter.
//!
//! The rasterizer only understands sRGB color syntax. Any computed value that
//! uses a newer color function is swapped for a safe fallback, or dropped
//! when no sensible fallback exists for the property.

use serde::{Deserialize, Serialize};

/// Substrings that mark a value the rasterizer cannot parse.
pub const UNSUPPORTED_COLOR_TOKENS: [&str; 6] = ["oklch", "oklab", "lch(", "lab(", "hwb(", "color("];

/// Whether `value` contains any unsupported color syntax.
pub fn is_unsupported(value: &str) -> bool {
    UNSUPPORTED_COLOR_TOKENS.iter().any(|t| value.contains(t))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SafetyDecision {
    /// Value is safe and is written unchanged.
    PassThrough(String),
    /// Value is unsafe; write this replacement instead.
    Fallback(String),
    /// Value is unsafe and the property is not written at all.
    Drop,
}

impl SafetyDecision {
    /// The value to write, if any.
    pub fn value(&self) -> Option<&str> {
        match self {
            SafetyDecision::PassThrough(v) | SafetyDecision::Fallback(v) => Some(v),
            SafetyDecision::Drop => None,
        }
    }
}

/// Replacement values used for unsupported colors.
///
/// Every palette keeps the same shape: text color, background color and
/// border colors get a concrete fallback; all other properties either drop
/// or use `other`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackPalette {
    pub text: String,
    pub background: String,
    pub border: String,
    /// Fallback for any other property; `None` drops it.
    pub other: Option<String>,
    /// When set, dropping an unsupported `background-image` also forces
    /// `background-color` to this value.
    pub background_image_backdrop: Option<String>,
}

impl Default for FallbackPalette {
    fn default() -> Self {
        Self::generic()
    }
}

const BLACK: &str = "rgb(0, 0, 0)";
const WHITE: &str = "rgb(255, 255, 255)";
const SLATE_200: &str = "rgb(226, 232, 240)";

impl FallbackPalette {
    pub fn generic() -> Self {
        Self {
            text: BLACK.to_string(),
            background: WHITE.to_string(),
            border: BLACK.to_string(),
            other: None,
            background_image_backdrop: None,
        }
    }

    /// Invoices and payment receipts.
    pub fn document() -> Self {
        Self {
            border: SLATE_200.to_string(),
            background_image_backdrop: Some(WHITE.to_string()),
            ..Self::generic()
        }
    }

    pub fn credit_note() -> Self {
        Self {
            text: BLACK.to_string(),
            background: "rgb(243, 244, 246)".to_string(),
            border: "rgb(209, 213, 219)".to_string(),
            other: Some("inherit".to_string()),
            background_image_backdrop: None,
        }
    }

    pub fn vendor_credit() -> Self {
        Self {
            text: "rgb(15, 23, 42)".to_string(),
            background: "transparent".to_string(),
            border: SLATE_200.to_string(),
            other: Some("inherit".to_string()),
            background_image_backdrop: None,
        }
    }

    pub fn purchase_order() -> Self {
        Self::generic()
    }

    /// Decide what to write for `property: value`.
    ///
    /// Callers skip empty values; they are never classified.
    pub fn classify(&self, property: &str, value: &str) -> SafetyDecision {
        if !is_unsupported(value) {
            return SafetyDecision::PassThrough(value.to_string());
        }
        let fallback = if property == "color" {
            Some(&self.text)
        } else if property == "background-color" {
            Some(&self.background)
        } else if is_border_color(property) {
            Some(&self.border)
        } else {
            self.other.as_ref()
        };
        match fallback {
            Some(v) => SafetyDecision::Fallback(v.clone()),
            None => SafetyDecision::Drop,
        }
    }

    /// Extra declaration to apply when `property` was dropped.
    pub fn companion(&self, property: &str) -> Option<(&'static str, &str)> {
        match (property, &self.background_image_backdrop) {
            ("background-image", Some(bg)) => Some(("background-color", bg.as_str())),
            _ => None,
        }
    }
}

fn is_border_color(property: &str) -> bool {
    property == "border-color"
        || (property.starts_with("border-") && property.ends_with("-color"))
}

/// Classify with the generic palette.
pub fn classify(property: &str, value: &str) -> SafetyDecision {
    FallbackPalette::generic().classify(property, value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_token_is_unsupported() {
        for token in UNSUPPORTED_COLOR_TOKENS {
            let value = format!("{token}0.5 0.1 200)");
            assert!(is_unsupported(&value), "{value}");
            assert_ne!(
                classify("outline-color", &value),
                SafetyDecision::PassThrough(value.clone())
            );
        }
    }

    #[test]
    fn generic_fallbacks() {
        assert_eq!(
            classify("color", "oklch(0.2 0.1 250)"),
            SafetyDecision::Fallback("rgb(0, 0, 0)".into())
        );
        assert_eq!(
            classify("background-color", "lab(50% 40 59)"),
            SafetyDecision::Fallback("rgb(255, 255, 255)".into())
        );
        assert_eq!(
            classify("border-top-color", "hwb(0 0% 0%)"),
            SafetyDecision::Fallback("rgb(0, 0, 0)".into())
        );
        assert_eq!(classify("box-shadow", "0 0 0 1px oklab(0.5 0 0)"), SafetyDecision::Drop);
        assert_eq!(classify("outline-color", "color(display-p3 1 0 0)"), SafetyDecision::Drop);
    }

    #[test]
    fn supported_values_pass_through_untouched() {
        for v in ["rgb(10, 20, 30)", "#fff", "transparent", "12px", "Arial, sans-serif"] {
            assert_eq!(classify("color", v), SafetyDecision::PassThrough(v.to_string()));
        }
    }

    #[test]
    fn presets_keep_the_three_way_shape() {
        let cn = FallbackPalette::credit_note();
        assert_eq!(
            cn.classify("background-color", "oklch(1 0 0)").value(),
            Some("rgb(243, 244, 246)")
        );
        assert_eq!(cn.classify("fill", "oklch(1 0 0)").value(), Some("inherit"));

        let vc = FallbackPalette::vendor_credit();
        assert_eq!(vc.classify("color", "oklab(0 0 0)").value(), Some("rgb(15, 23, 42)"));

        let doc = FallbackPalette::document();
        assert_eq!(doc.classify("border-left-color", "lch(1 0 0)").value(), Some(SLATE_200));
        assert_eq!(
            doc.classify("background-image", "linear-gradient(oklch(1 0 0), white)"),
            SafetyDecision::Drop
        );
        assert_eq!(
            doc.companion("background-image"),
            Some(("background-color", WHITE))
        );
        assert_eq!(FallbackPalette::generic().companion("background-image"), None);
    }

    #[test]
    fn palette_deserializes_with_defaults() {
        let p: FallbackPalette = serde_json::from_str(r#"{"border": "rgb(1, 2, 3)"}"#).unwrap();
        assert_eq!(p.border, "rgb(1, 2, 3)");
        assert_eq!(p.text, BLACK);
        assert_eq!(p.other, None);
    }
}
