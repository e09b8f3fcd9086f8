//! Review inputs: which files to send, how to render them and how to split
//! the result into model-sized chunks.

use glob::Pattern;
use std::sync::LazyLock;

use super::github::ChangedFile;
use super::openai::ChatMessage;

pub const REVIEWER_SYSTEM_PROMPT: &str = "Be a strict but helpful security reviewer.";

pub const STANDARDS_SYSTEM_PROMPT: &str = "You are a staff engineer. Extract enforceable project rules from the documents.
Group by: Security, Code Style, Testing, Dependencies, API, Infra, Other.
Quote exact rules when helpful. Keep under 500 words.";

pub const NO_STANDARDS: &str =
    "No explicit project standards found. Review will proceed with general security best practices.";

const EXCLUDED_GLOBS: &[&str] = &[
    "node_modules/**",
    "**/node_modules/**",
    "dist/**",
    "build/**",
    "out/**",
    "vendor/**",
    ".next/**",
    "coverage/**",
    "package-lock.json",
    "pnpm-lock.yaml",
    "yarn.lock",
    "Cargo.lock",
    "**/*.min.js",
];

const BINARY_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "webp", "svg", "pdf", "zip", "gz", "tar", "tgz", "mp4", "mov",
    "exe", "dll", "wasm", "ico",
];

const CODE_EXTENSIONS: &[&str] = &[
    "ts", "tsx", "js", "jsx", "mjs", "cjs", "py", "rs", "go", "java", "sql", "sh", "yml", "yaml",
    "json", "toml",
];

/// Always-considered standards documents.
pub const STANDARD_DOCS: &[&str] = &[
    "README.md",
    "README",
    "SECURITY.md",
    "CONTRIBUTING.md",
    "CODE_OF_CONDUCT.md",
    "CODEOWNERS",
    ".github/CODEOWNERS",
    ".github/SECURITY.md",
    ".github/CONTRIBUTING.md",
];

static EXCLUDED: LazyLock<Vec<Pattern>> = LazyLock::new(|| {
    EXCLUDED_GLOBS
        .iter()
        .filter_map(|g| Pattern::new(g).ok())
        .collect()
});

fn extension(path: &str) -> Option<String> {
    let name = path.rsplit('/').next().unwrap_or(path);
    name.rsplit_once('.')
        .filter(|(stem, _)| !stem.is_empty())
        .map(|(_, ext)| ext.to_lowercase())
}

pub fn is_binary(path: &str) -> bool {
    extension(path).is_some_and(|ext| BINARY_EXTENSIONS.contains(&ext.as_str()))
}

pub fn is_excluded(path: &str) -> bool {
    EXCLUDED.iter().any(|p| p.matches(path))
}

pub fn is_code_file(path: &str) -> bool {
    extension(path).is_some_and(|ext| CODE_EXTENSIONS.contains(&ext.as_str()))
}

/// Whether a changed file is worth sending to the model at all.
pub fn should_review(file: &ChangedFile) -> bool {
    file.status != "removed"
        && !is_binary(&file.filename)
        && !is_excluded(&file.filename)
        && is_code_file(&file.filename)
}

/// Documentation paths in the repository tree that feed the standards digest.
pub fn standards_doc_paths(tree: &[String]) -> Vec<String> {
    let mut paths: Vec<String> = STANDARD_DOCS.iter().map(|s| s.to_string()).collect();
    for path in tree {
        let lower = path.to_lowercase();
        let is_doc = lower.ends_with(".md")
            && (lower.starts_with("docs/") || lower.starts_with(".github/") || !path.contains('/'));
        if is_doc && !paths.contains(path) {
            paths.push(path.clone());
        }
    }
    paths
}

/// Truncate to `max` characters, appending `marker` when anything was cut.
pub fn cap_text(text: &str, max: usize, marker: &str) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut capped: String = text.chars().take(max).collect();
    capped.push('\n');
    capped.push_str(marker);
    capped
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewTarget {
    pub path: String,
    pub patch: Option<String>,
    pub content: Option<String>,
}

impl ReviewTarget {
    pub fn is_empty(&self) -> bool {
        self.patch.is_none() && self.content.is_none()
    }

    pub fn render(&self) -> String {
        let mut parts = vec![format!("\n=== FILE: {} ===", self.path)];
        if let Some(patch) = &self.patch {
            parts.push(format!("--- DIFF:\n{}", patch));
        }
        if let Some(content) = &self.content {
            let numbered: Vec<String> = content
                .lines()
                .enumerate()
                .map(|(i, line)| format!("{}: {}", i + 1, line))
                .collect();
            parts.push(format!(
                "--- CONTENT WITH LINE NUMBERS:\n{}",
                numbered.join("\n")
            ));
        }
        parts.join("\n")
    }
}

/// Split into consecutive slices of at most `max` characters.
pub fn chunk_text(text: &str, max: usize) -> Vec<String> {
    if max == 0 || text.is_empty() {
        return if text.is_empty() {
            Vec::new()
        } else {
            vec![text.to_string()]
        };
    }
    let chars: Vec<char> = text.chars().collect();
    chars.chunks(max).map(|c| c.iter().collect()).collect()
}

pub fn standards_messages(docs: &[(String, String)]) -> Vec<ChatMessage> {
    let joined = docs
        .iter()
        .map(|(path, text)| format!("FILE: {}\n{}", path, text))
        .collect::<Vec<_>>()
        .join("\n\n-----\n\n");
    vec![
        ChatMessage::system(STANDARDS_SYSTEM_PROMPT),
        ChatMessage::user(joined),
    ]
}

pub fn review_header(standards_digest: &str) -> String {
    format!(
        r#"You are a principal security engineer performing a comprehensive code review.

PRIMARY GOAL: Identify ALL security risks and violations with precise locations and examples.
SECONDARY GOALS: correctness, reliability, performance, maintainability.

Severity levels:
- Critical: Immediate security threats (RCE, SQL injection, auth bypass, secret exposure)
- High: Likely exploitable vulnerabilities (XSS, SSRF, IDOR, weak crypto, insecure defaults)
- Medium: Risky patterns (unsafe parsing, weak validation, trust boundary issues, DoS vectors)
- Low: Defense-in-depth improvements (hardening, security headers, input sanitization)

For EVERY finding provide the exact file path, exact line numbers, the vulnerable code,
a concrete fix with example code and the security impact.

Project Standards (digest):
{standards_digest}

Do not include a summary section; it is generated from your findings.

OUTPUT FORMAT (STRICT MARKDOWN):

## 🔍 Detailed Security Findings

### 🚨 Critical Issues
**File**: `path`
**Lines**: 45-48
**Issue**: short title
**Vulnerable Code**:
```
...
```
**Risk**: impact and exploitation scenario
**Fix**:
```
...
```

### ⚠️ High Priority Issues
[same format]

### 🔶 Medium Priority Issues
[same format]

### 📝 Low Priority Issues
[same format]

## ✅ Standards Compliance Analysis
[2-3 sentences]

## 🧪 Recommended Security Tests
- **Unit Tests**: ...
- **Integration Tests**: ...
- **E2E Tests**: ...

## 📋 Prioritized Action Items
- [ ] **file:line** - action

Use markdown checkboxes (- [ ]) for all action items.
If NO issues are found, state "No security issues detected in the analyzed files"."#
    )
}

/// One message batch per chunk of the rendered review input.
pub fn review_message_batches(
    standards_digest: &str,
    targets: &[ReviewTarget],
    max_input_chars: usize,
) -> Vec<Vec<ChatMessage>> {
    let files: Vec<String> = targets.iter().map(ReviewTarget::render).collect();
    let combined = format!("{}\n{}", review_header(standards_digest), files.join("\n"));
    chunk_text(&combined, max_input_chars)
        .into_iter()
        .enumerate()
        .map(|(i, chunk)| {
            let content = if i == 0 {
                chunk
            } else {
                format!("Continuation chunk {}:\n{}", i + 1, chunk)
            };
            vec![
                ChatMessage::system(REVIEWER_SYSTEM_PROMPT),
                ChatMessage::user(content),
            ]
        })
        .collect()
}
