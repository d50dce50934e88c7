//! Shared helper utilities used across ControlDeck components.

use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};

struct ProgramCache {
    // Snapshot of PATH used to invalidate cached entries when environment changes.
    path: Option<String>,
    // Cached program presence results keyed by program name.
    results: HashMap<String, bool>,
}

static PROGRAM_CACHE: OnceLock<Mutex<ProgramCache>> = OnceLock::new();
const DEFAULT_LOG_LIMIT: usize = 160;
const DIAGNOSTIC_LOG_LIMIT: usize = 512;

/// Check whether a program exists in $PATH, caching results to avoid repeated scans.
pub fn program_in_path(program: &str) -> bool {
    if program.contains(std::path::MAIN_SEPARATOR) {
        return Path::new(program).is_file();
    }
    let current_path = env::var("PATH").ok();
    let cache = PROGRAM_CACHE.get_or_init(|| {
        Mutex::new(ProgramCache {
            path: None,
            results: HashMap::new(),
        })
    });
    if let Ok(mut cache) = cache.lock() {
        // Reset cached lookups whenever PATH changes.
        if cache.path.as_deref() != current_path.as_deref() {
            cache.path = current_path.clone();
            cache.results.clear();
        }
        if let Some(result) = cache.results.get(program) {
            return *result;
        }
    }

    let found = current_path
        .as_ref()
        .map(|paths| env::split_paths(paths).any(|dir| dir.join(program).is_file()))
        .unwrap_or(false);

    if let Ok(mut cache) = cache.lock() {
        cache.results.insert(program.to_string(), found);
    }

    found
}

/// Parse the usual INI spellings of a boolean. Returns `None` for anything else.
pub fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Expand a leading `~/` against $HOME.
pub fn expand_home(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    match env::var_os("HOME") {
        Some(home) => PathBuf::from(home).join(rest),
        None => path.to_path_buf(),
    }
}

/// Default tracing filter when RUST_LOG is unset: `-D` beats `-v`, which beats
/// the configured level.
pub fn log_directive(trace: bool, verbose: bool, configured: Option<&str>) -> String {
    if trace {
        return "trace".to_string();
    }
    if verbose {
        return "debug".to_string();
    }
    configured
        .map(str::trim)
        .filter(|level| !level.is_empty())
        .unwrap_or("info")
        .to_string()
}

/// Returns true when diagnostics are explicitly enabled via environment.
pub fn diagnostic_mode() -> bool {
    diagnostic_mode_from(env::var("CONTROLDECK_DIAGNOSTIC").ok().as_deref())
}

fn diagnostic_mode_from(value: Option<&str>) -> bool {
    value.and_then(parse_flag).unwrap_or(false)
}

/// Returns the effective log snippet limit for the current mode.
pub fn log_limit() -> usize {
    log_limit_for(diagnostic_mode())
}

fn log_limit_for(diagnostic: bool) -> usize {
    if diagnostic {
        DIAGNOSTIC_LOG_LIMIT
    } else {
        DEFAULT_LOG_LIMIT
    }
}

/// Sanitizes a log string by stripping newlines and capping length.
pub fn sanitize_log_value(value: &str, max_len: usize) -> String {
    if max_len == 0 {
        return String::new();
    }
    let mut cleaned = String::with_capacity(max_len.min(value.len()));
    let mut count = 0usize;
    let mut truncated = false;
    for ch in value.chars() {
        let ch = if ch == '\n' || ch == '\r' { ' ' } else { ch };
        cleaned.push(ch);
        count += 1;
        if count >= max_len {
            truncated = true;
            break;
        }
    }
    let trimmed = cleaned.trim();
    if truncated {
        format!("{trimmed}...")
    } else {
        trimmed.to_string()
    }
}

/// Produces a safe log snippet honoring diagnostic mode limits.
pub fn log_snippet(value: &str) -> String {
    sanitize_log_value(value, log_limit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_log_value_strips_newlines_and_caps() {
        let sanitized = sanitize_log_value("ab\ncd\rEF", 5);
        assert_eq!(sanitized, "ab cd...");
        assert_eq!(sanitize_log_value("ok", 5), "ok");
    }

    #[test]
    fn parse_flag_accepts_ini_spellings() {
        assert_eq!(parse_flag("True"), Some(true));
        assert_eq!(parse_flag(" yes "), Some(true));
        assert_eq!(parse_flag("ON"), Some(true));
        assert_eq!(parse_flag("0"), Some(false));
        assert_eq!(parse_flag("off"), Some(false));
        assert_eq!(parse_flag("maybe"), None);
        assert_eq!(parse_flag(""), None);
    }

    #[test]
    fn diagnostic_mode_parses_expected_values() {
        assert!(diagnostic_mode_from(Some("1")));
        assert!(diagnostic_mode_from(Some("YES")));
        assert!(!diagnostic_mode_from(Some("false")));
        assert!(!diagnostic_mode_from(None));
    }

    #[test]
    fn log_limit_respects_mode() {
        assert_eq!(log_limit_for(false), DEFAULT_LOG_LIMIT);
        assert_eq!(log_limit_for(true), DIAGNOSTIC_LOG_LIMIT);
    }

    #[test]
    fn log_directive_precedence() {
        assert_eq!(log_directive(true, true, Some("warn")), "trace");
        assert_eq!(log_directive(false, true, Some("warn")), "debug");
        assert_eq!(log_directive(false, false, Some(" warn ")), "warn");
        assert_eq!(log_directive(false, false, Some("")), "info");
        assert_eq!(log_directive(false, false, None), "info");
    }

    #[test]
    fn expand_home_leaves_plain_paths() {
        assert_eq!(
            expand_home(Path::new("/etc/controldeck.conf")),
            PathBuf::from("/etc/controldeck.conf")
        );
    }
}
