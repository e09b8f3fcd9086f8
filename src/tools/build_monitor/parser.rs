//! Extracts structured errors from `next build` / `tsc` output.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

static TS_ERROR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.+):(\d+):(\d+) - error TS(\d+): (.+)$").unwrap());
static LOCATION: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(.+):(\d+):(\d+)$").unwrap());
pub(crate) static MODULE_NOT_FOUND: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Module not found: Can't resolve '(.+)'").unwrap());
static ESLINT_ERROR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+):(\d+)\s+error\s+(.+)").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    TypeScript,
    Eslint,
    Build,
    Dependency,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// One error reported by the build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildError {
    /// Path relative to the project, empty when the error is not tied to a file
    pub file: String,
    pub line: u32,
    pub column: u32,
    pub message: String,
    pub kind: ErrorKind,
    pub severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl BuildError {
    fn new(file: &str, line: u32, column: u32, message: &str, kind: ErrorKind) -> Self {
        Self {
            file: file.to_string(),
            line,
            column,
            message: message.to_string(),
            kind,
            severity: Severity::Error,
            code: None,
        }
    }
}

fn number(s: &str) -> u32 {
    s.parse().unwrap_or(0)
}

/// Parse a build log into errors, in the order they appear.
pub fn parse_build_output(log: &str) -> Vec<BuildError> {
    let lines: Vec<&str> = log.lines().map(|l| l.trim_end_matches('\r')).collect();
    let mut errors = Vec::new();

    for (i, line) in lines.iter().enumerate() {
        if let Some(caps) = TS_ERROR.captures(line) {
            let mut error = BuildError::new(
                &caps[1],
                number(&caps[2]),
                number(&caps[3]),
                &caps[5],
                ErrorKind::TypeScript,
            );
            error.code = Some(format!("TS{}", &caps[4]));
            errors.push(error);
            continue;
        }

        // Next.js prints the location on its own line, the message below it
        if let Some(caps) = LOCATION.captures(line)
            && let Some(next) = lines.get(i + 1)
            && next.contains("Type error:")
        {
            let message = next.replacen("Type error: ", "", 1);
            errors.push(BuildError::new(
                &caps[1],
                number(&caps[2]),
                number(&caps[3]),
                message.trim(),
                ErrorKind::TypeScript,
            ));
            continue;
        }

        if MODULE_NOT_FOUND.is_match(line) {
            errors.push(BuildError::new("", 0, 0, line.trim(), ErrorKind::Dependency));
        }

        if (line.contains("ESLint:") || line.contains("eslint"))
            && let Some(caps) = ESLINT_ERROR.captures(line)
        {
            errors.push(BuildError::new(
                "",
                number(&caps[1]),
                number(&caps[2]),
                &caps[3],
                ErrorKind::Eslint,
            ));
        }
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typescript_error_line() {
        let log = "src/app/page.tsx:12:5 - error TS2304: Cannot find name 'useState'.";
        let errors = parse_build_output(log);
        assert_eq!(errors.len(), 1);
        let e = &errors[0];
        assert_eq!(e.file, "src/app/page.tsx");
        assert_eq!((e.line, e.column), (12, 5));
        assert_eq!(e.code.as_deref(), Some("TS2304"));
        assert_eq!(e.kind, ErrorKind::TypeScript);
        assert_eq!(e.message, "Cannot find name 'useState'.");
    }

    #[test]
    fn test_nextjs_location_followed_by_type_error() {
        let log = "Failed to compile.\n\n./app/api/route.ts:40:7\nType error: Element implicitly has an 'any' type\n";
        let errors = parse_build_output(log);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].file, "./app/api/route.ts");
        assert_eq!(errors[0].line, 40);
        assert_eq!(errors[0].message, "Element implicitly has an 'any' type");
        assert!(errors[0].code.is_none());
    }

    #[test]
    fn test_location_without_type_error_is_ignored() {
        let errors = parse_build_output("./app/page.tsx:1:1\nsomething else");
        assert!(errors.is_empty());
    }

    #[test]
    fn test_module_not_found_is_dependency_error() {
        let log = "Module not found: Can't resolve 'date-fns'";
        let errors = parse_build_output(log);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, ErrorKind::Dependency);
        assert_eq!(errors[0].file, "");
        assert_eq!(errors[0].message, log);
    }

    #[test]
    fn test_eslint_error() {
        let log = "ESLint: 14:3  error  'x' is assigned a value but never used";
        let errors = parse_build_output(log);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, ErrorKind::Eslint);
        assert_eq!((errors[0].line, errors[0].column), (14, 3));
        assert_eq!(errors[0].message, "'x' is assigned a value but never used");
    }

    #[test]
    fn test_clean_log_has_no_errors() {
        let log = "▲ Next.js 14.2.3\n✓ Compiled successfully\n✓ Generating static pages (12/12)";
        assert!(parse_build_output(log).is_empty());
    }

    #[test]
    fn test_windows_line_endings() {
        let log = "a.ts:1:2 - error TS6133: 'x' is declared but its value is never read.\r\n";
        let errors = parse_build_output(log);
        assert_eq!(errors.len(), 1);
        assert!(!errors[0].message.ends_with('\r'));
    }
}
