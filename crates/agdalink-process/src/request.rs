use std::path::{Path, PathBuf};

use crate::config::SessionConfig;
use crate::metadata::expand_tilde;

/// One outbound interaction command.
///
/// The command layer builds the `body`; this crate only wraps it in the
/// interaction envelope. Two placeholders are substituted at encode time:
/// `{file}` (the quoted, normalized file path), `{libraries}` (the
/// configured library paths as a bracketed list), and `{backend}` (the
/// configured compiler backend).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// File the command targets.
    pub file: PathBuf,
    /// Interaction command body, e.g. `Cmd_load {file} {libraries}`.
    pub body: String,
}

impl Request {
    pub fn new(file: impl Into<PathBuf>, body: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            body: body.into(),
        }
    }
}

/// Encode a request into one interaction line.
///
/// Shape: `IOTCM "<file>" NonInteractive <method> (<body>)`. The exchange
/// method comes from configuration, downgraded to `Direct` for provers
/// older than 2.6 (the indirect temp-file exchange postdates them). The
/// file path is absolutized and tilde-expanded before quoting.
pub fn encode(request: &Request, version: &str, config: &SessionConfig) -> String {
    let file = quote(&normalize_path(&request.file));
    let method = if supports_indirect(version) {
        config.highlighting.as_token()
    } else {
        "Direct"
    };

    let libraries = format!(
        "[{}]",
        config
            .library_paths
            .iter()
            .map(|path| quote(path))
            .collect::<Vec<_>>()
            .join(", ")
    );

    let body = request
        .body
        .replace("{file}", &file)
        .replace("{libraries}", &libraries)
        .replace("{backend}", config.backend.as_deref().unwrap_or("GHC"));

    format!("IOTCM {file} NonInteractive {method} ({body})")
}

/// Absolutize and tilde-expand a file path for the wire.
fn normalize_path(path: &Path) -> String {
    let expanded = expand_tilde(path);
    let absolute = if expanded.is_absolute() {
        expanded
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(&expanded))
            .unwrap_or(expanded)
    };
    absolute.to_string_lossy().into_owned()
}

/// Whether this prover version understands the indirect exchange method.
fn supports_indirect(version: &str) -> bool {
    let mut parts = version.split(['.', '-']);
    let major = parts.next().and_then(|p| p.parse::<u32>().ok());
    let minor = parts.next().and_then(|p| p.parse::<u32>().ok());
    match (major, minor) {
        (Some(major), _) if major > 2 => true,
        (Some(2), Some(minor)) => minor >= 6,
        _ => false,
    }
}

/// Quote a string for the S-expression wire form.
fn quote(text: &str) -> String {
    let escaped = text.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{escaped}\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HighlightingMethod;

    fn config() -> SessionConfig {
        SessionConfig::default()
    }

    #[test]
    fn wraps_body_in_interaction_envelope() {
        let request = Request::new("/tmp/Proof.agda", "Cmd_load {file} {libraries}");
        let line = encode(&request, "2.6.4", &config());
        assert_eq!(
            line,
            "IOTCM \"/tmp/Proof.agda\" NonInteractive Direct \
             (Cmd_load \"/tmp/Proof.agda\" [])"
        );
    }

    #[test]
    fn substitutes_library_paths() {
        let mut config = config();
        config.library_paths = vec!["/opt/agda/std-lib".to_string(), "/opt/agda/cubical".to_string()];
        let request = Request::new("/tmp/A.agda", "Cmd_load {file} {libraries}");
        let line = encode(&request, "2.6.4", &config);
        assert!(line.contains("[\"/opt/agda/std-lib\", \"/opt/agda/cubical\"]"));
    }

    #[test]
    fn indirect_highlighting_respected_on_new_provers() {
        let mut config = config();
        config.highlighting = HighlightingMethod::Indirect;
        let request = Request::new("/tmp/A.agda", "Cmd_metas");
        let line = encode(&request, "2.6.4", &config);
        assert!(line.contains("NonInteractive Indirect"));
    }

    #[test]
    fn indirect_highlighting_downgraded_on_old_provers() {
        let mut config = config();
        config.highlighting = HighlightingMethod::Indirect;
        let request = Request::new("/tmp/A.agda", "Cmd_metas");
        let line = encode(&request, "2.5.4", &config);
        assert!(line.contains("NonInteractive Direct"));
    }

    #[test]
    fn substitutes_the_configured_backend() {
        let request = Request::new("/tmp/A.agda", "Cmd_compile {backend} {file} []");
        let default_line = encode(&request, "2.6.4", &config());
        assert!(default_line.contains("Cmd_compile GHC"));

        let mut config = config();
        config.backend = Some("JS".to_string());
        let line = encode(&request, "2.6.4", &config);
        assert!(line.contains("Cmd_compile JS"));
    }

    #[test]
    fn quotes_and_escapes_paths() {
        let request = Request::new("/tmp/weird \"dir\"/A.agda", "Cmd_metas");
        let line = encode(&request, "2.6.4", &config());
        assert!(line.starts_with("IOTCM \"/tmp/weird \\\"dir\\\"/A.agda\""));
    }

    #[test]
    fn relative_paths_are_absolutized() {
        let request = Request::new("Local.agda", "Cmd_metas");
        let line = encode(&request, "2.6.4", &config());
        let cwd = std::env::current_dir().unwrap();
        assert!(line.contains(&format!("{}", cwd.join("Local.agda").display())));
    }
}
