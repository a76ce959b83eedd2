//! Minifier profiles per build mode

use serde::Serialize;

use crate::cli::BuildMode;

/// Output layout of the minified stylesheet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// One declaration per line, indented
    Beautify,
}

/// clean-css style settings selected by [`BuildMode`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CleanCssProfile {
    pub compatibility: &'static str,
    pub level: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<OutputFormat>,
}

impl CleanCssProfile {
    pub fn for_mode(mode: BuildMode) -> Self {
        match mode {
            BuildMode::Dev => Self {
                compatibility: "*",
                level: 2,
                format: Some(OutputFormat::Beautify),
            },
            BuildMode::Prod => Self {
                compatibility: "*",
                level: 2,
                format: None,
            },
        }
    }

    /// Level 2 merges and restructures rules, not just whitespace
    pub fn restructures(&self) -> bool {
        self.level >= 2
    }

    /// Whether the printed stylesheet is compacted onto minimal whitespace
    pub fn compacts_output(&self) -> bool {
        self.format.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_values() {
        let dev = serde_json::to_string(&CleanCssProfile::for_mode(BuildMode::Dev)).unwrap();
        let prod = serde_json::to_string(&CleanCssProfile::for_mode(BuildMode::Prod)).unwrap();

        assert_eq!(dev, r#"{"compatibility":"*","level":2,"format":"beautify"}"#);
        assert_eq!(prod, r#"{"compatibility":"*","level":2}"#);
    }

    #[test]
    fn test_output_layout() {
        assert!(!CleanCssProfile::for_mode(BuildMode::Dev).compacts_output());
        assert!(CleanCssProfile::for_mode(BuildMode::Prod).compacts_output());
        assert!(CleanCssProfile::for_mode(BuildMode::Prod).restructures());
    }
}
