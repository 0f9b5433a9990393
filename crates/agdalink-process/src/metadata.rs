use std::path::{Path, PathBuf};

use tokio::process::Command;
use tracing::debug;

use crate::config::SessionConfig;
use crate::error::{ConnectionError, Result};

/// Immutable identity of a validated prover installation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionMetadata {
    /// Absolute, tilde-expanded executable path.
    pub path: PathBuf,
    /// Arguments for the long-lived interaction process.
    pub args: Vec<String>,
    /// Version negotiated by the probe invocation.
    pub version: String,
}

/// Expand a leading `~` to the user's home directory.
///
/// `~user` forms are left untouched, as is everything when no home
/// directory is resolvable.
pub fn expand_tilde(path: &Path) -> PathBuf {
    let Some(rest) = path.to_str().and_then(|text| text.strip_prefix('~')) else {
        return path.to_path_buf();
    };
    let Some(home) = dirs::home_dir() else {
        return path.to_path_buf();
    };
    if rest.is_empty() {
        home
    } else if let Some(tail) = rest.strip_prefix('/') {
        home.join(tail)
    } else {
        path.to_path_buf()
    }
}

/// Search the PATH environment for an executable named `program`.
pub fn search_path(program: &str) -> Option<PathBuf> {
    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths)
        .map(|dir| dir.join(program))
        .find(|candidate| is_executable(candidate))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// Pick the version out of the probe invocation's output.
///
/// Accepts the `Agda version 2.6.4.3` banner as well as a bare dotted
/// version on a line of its own.
pub fn extract_version(output: &str) -> Option<String> {
    for line in output.lines() {
        let words: Vec<&str> = line.split_whitespace().collect();
        for pair in words.windows(2) {
            if pair[0].eq_ignore_ascii_case("version") && looks_like_version(pair[1]) {
                return Some(pair[1].to_string());
            }
        }
        if let [only] = words.as_slice() {
            if looks_like_version(only) {
                return Some((*only).to_string());
            }
        }
    }
    None
}

fn looks_like_version(word: &str) -> bool {
    word.contains('.')
        && word
            .split('.')
            .all(|part| part.chars().next().is_some_and(|c| c.is_ascii_digit()))
}

/// Resolve the executable from configuration, else by PATH search.
pub fn resolve_executable(config: &SessionConfig) -> Result<PathBuf> {
    if let Some(path) = &config.executable {
        return Ok(expand_tilde(path));
    }
    search_path(&config.program).ok_or_else(|| ConnectionError::PathSearchFailed {
        program: config.program.clone(),
    })
}

/// Run the one-shot `--version` probe and assemble session metadata.
///
/// A spawn/pipe failure is a process error; a probe that runs but exits
/// nonzero or prints no recognizable version fails validation.
pub async fn probe(path: &Path, args: &[String]) -> Result<SessionMetadata> {
    let path = expand_tilde(path);
    let output = Command::new(&path).arg("--version").output().await?;
    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();

    if !output.status.success() {
        return Err(ConnectionError::ValidationFailed {
            path,
            output: stdout,
        });
    }

    let version = extract_version(&stdout).ok_or_else(|| ConnectionError::ValidationFailed {
        path: path.clone(),
        output: stdout.clone(),
    })?;

    debug!(path = %path.display(), %version, "probe validated executable");

    Ok(SessionMetadata {
        path,
        args: args.to_vec(),
        version,
    })
}
