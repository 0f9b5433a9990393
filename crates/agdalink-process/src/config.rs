use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// How highlighting spans travel back to the editor: inline in the
/// response, or indirectly through a temp file the response points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HighlightingMethod {
    #[default]
    Direct,
    Indirect,
}

impl HighlightingMethod {
    /// Wire token used in the interaction envelope.
    pub fn as_token(self) -> &'static str {
        match self {
            HighlightingMethod::Direct => "Direct",
            HighlightingMethod::Indirect => "Indirect",
        }
    }
}

/// User-facing connection settings.
///
/// Persistence lives with the editor; this crate only consumes the values.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Explicit executable path. Searched on PATH when absent.
    pub executable: Option<PathBuf>,
    /// Program name used for the PATH search.
    pub program: String,
    /// Extra arguments for the long-lived interaction process.
    pub args: Vec<String>,
    /// Library include paths substituted into requests.
    pub library_paths: Vec<String>,
    pub highlighting: HighlightingMethod,
    /// Compiler backend substituted into compile-style requests.
    pub backend: Option<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            executable: None,
            program: "agda".to_string(),
            args: Vec::new(),
            library_paths: Vec::new(),
            highlighting: HighlightingMethod::default(),
            backend: None,
        }
    }
}
