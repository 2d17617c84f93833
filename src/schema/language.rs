/// Target languages and their script metadata.
///
/// Right-to-left languages carry a dedicated print font stack so exported
/// documents stay legible after rasterization.
use serde::{Deserialize, Serialize};

/// Direction the script is written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScriptDirection {
    LeftToRight,
    RightToLeft,
}

/// A story output language, as offered by the request form. Serializes as a
/// bare string across the WASM boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Language {
    name: String,
}

/// Print-style overrides for a right-to-left script: font stack, a slightly
/// larger base size, and a raised line height for legibility.
#[derive(Debug, Clone, PartialEq)]
pub struct RtlPrintStyle {
    pub font_family: &'static str,
    pub font_size: &'static str,
    pub line_height: &'static str,
}

impl Default for Language {
    fn default() -> Self {
        Language::new("English")
    }
}

impl Language {
    pub fn new(name: impl Into<String>) -> Self {
        Language { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn direction(&self) -> ScriptDirection {
        match self.name.as_str() {
            "Urdu" | "Arabic" => ScriptDirection::RightToLeft,
            _ => ScriptDirection::LeftToRight,
        }
    }

    pub fn is_rtl(&self) -> bool {
        self.direction() == ScriptDirection::RightToLeft
    }

    /// CSS class applied to the story container for language-specific fonts,
    /// if this language has one.
    pub fn font_class(&self) -> Option<&'static str> {
        match self.name.as_str() {
            "Urdu" => Some("lang-ur"),
            "Arabic" => Some("lang-ar"),
            _ => None,
        }
    }

    /// Print-style overrides used by the export pipeline for RTL scripts.
    pub fn rtl_print_style(&self) -> Option<RtlPrintStyle> {
        match self.name.as_str() {
            "Urdu" => Some(RtlPrintStyle {
                font_family: "'Jameel Noori Nastaleeq', sans-serif",
                font_size: "1.2rem",
                line_height: "2.2",
            }),
            "Arabic" => Some(RtlPrintStyle {
                font_family: "'Tahoma', 'Arial', sans-serif",
                font_size: "1.1rem",
                line_height: "2.0",
            }),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urdu_and_arabic_are_rtl() {
        assert!(Language::new("Urdu").is_rtl());
        assert!(Language::new("Arabic").is_rtl());
        assert!(!Language::new("English").is_rtl());
        assert!(!Language::new("Spanish").is_rtl());
    }

    #[test]
    fn font_classes_only_for_rtl_languages() {
        assert_eq!(Language::new("Urdu").font_class(), Some("lang-ur"));
        assert_eq!(Language::new("Arabic").font_class(), Some("lang-ar"));
        assert_eq!(Language::new("French").font_class(), None);
    }

    #[test]
    fn rtl_print_styles_differ_per_language() {
        let urdu = Language::new("Urdu").rtl_print_style().unwrap();
        let arabic = Language::new("Arabic").rtl_print_style().unwrap();
        assert_ne!(urdu.font_family, arabic.font_family);
        assert!(Language::new("English").rtl_print_style().is_none());
    }
}
