//! The fixed pattern tables the scanner matches source lines against.

use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::sync::LazyLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Security,
    Performance,
    Quality,
    TypeScript,
    Eslint,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Category::Security => "security",
            Category::Performance => "performance",
            Category::Quality => "quality",
            Category::TypeScript => "typescript",
            Category::Eslint => "eslint",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        };
        f.write_str(s)
    }
}

/// How a matching line is rewritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rewrite {
    /// Regex replacement template applied to the first match.
    Replace(&'static str),
    /// Turn the statement into a line comment, keeping indentation.
    CommentOut,
    /// Turn a bare `TODO:`-style marker into a `//` comment.
    FormatMarker,
    /// Report only.
    Manual,
}

#[derive(Debug)]
pub struct Rule {
    pub id: &'static str,
    pub category: Category,
    pub severity: Severity,
    pub pattern: Regex,
    pub message: &'static str,
    pub suggestion: &'static str,
    pub before: &'static str,
    pub after: &'static str,
    /// Percentage, 0..=100.
    pub confidence: u8,
    pub rewrite: Rewrite,
}

static BARE_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\s*)(TODO|FIXME|HACK)\s*:").unwrap());

impl Rule {
    pub fn matches(&self, line: &str) -> Option<usize> {
        self.pattern.find(line).map(|m| m.start())
    }

    /// The rewritten line, or `None` when this rule has no mechanical fix for it.
    pub fn rewrite(&self, line: &str) -> Option<String> {
        if !self.pattern.is_match(line) {
            return None;
        }
        let fixed = match self.rewrite {
            Rewrite::Replace(template) => self.pattern.replace(line, template).into_owned(),
            Rewrite::CommentOut => {
                let trimmed = line.trim_start();
                if trimmed.starts_with("//") {
                    return None;
                }
                let indent = &line[..line.len() - trimmed.len()];
                format!("{}// {}", indent, trimmed)
            }
            Rewrite::FormatMarker => BARE_MARKER.replace(line, "$1// $2:").into_owned(),
            Rewrite::Manual => return None,
        };
        (fixed != line).then_some(fixed)
    }
}

#[allow(clippy::too_many_arguments)]
fn rule(
    id: &'static str,
    category: Category,
    severity: Severity,
    pattern: &str,
    message: &'static str,
    suggestion: &'static str,
    (before, after): (&'static str, &'static str),
    confidence: u8,
    rewrite: Rewrite,
) -> Rule {
    Rule {
        id,
        category,
        severity,
        // Literal patterns from the tables below
        pattern: Regex::new(pattern).unwrap(),
        message,
        suggestion,
        before,
        after,
        confidence,
        rewrite,
    }
}

static RULES: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    use Category::*;
    use Severity::*;
    vec![
        rule(
            "eval-usage",
            Security,
            Critical,
            r"\beval\s*\(",
            "eval() executes arbitrary code",
            "Replace eval() with JSON.parse or an explicit dispatch table",
            ("eval(code)", "// eval(code)"),
            60,
            Rewrite::CommentOut,
        ),
        rule(
            "inner-html",
            Security,
            High,
            r"\.innerHTML\s*=",
            "Assigning innerHTML allows script injection",
            "Use textContent for plain text",
            ("el.innerHTML = text", "el.textContent = text"),
            85,
            Rewrite::Replace(".textContent ="),
        ),
        rule(
            "document-write",
            Security,
            High,
            r"\bdocument\.write\s*\(",
            "document.write() can inject unescaped markup",
            "Use DOM manipulation instead",
            ("document.write(html)", "// document.write(html)"),
            50,
            Rewrite::CommentOut,
        ),
        rule(
            "set-timeout-zero",
            Security,
            Low,
            r"\bsetTimeout\s*\(\s*([^,]+?)\s*,\s*0\s*\)",
            "setTimeout with a zero delay",
            "Use queueMicrotask() or Promise.resolve().then()",
            ("setTimeout(fn, 0)", "queueMicrotask(fn)"),
            75,
            Rewrite::Replace("queueMicrotask(${1})"),
        ),
        rule(
            "console-log",
            Security,
            Low,
            r"\bconsole\.log\s*\(",
            "console.log statement left in code",
            "Remove console.log in production code",
            ("console.log(value)", "// console.log(value)"),
            90,
            Rewrite::CommentOut,
        ),
        rule(
            "index-loop",
            Performance,
            Low,
            r"for\s*\(\s*let\s+\w+\s*=\s*0\s*;\s*\w+\s*<\s*([\w.]+)\.length\s*;\s*\w+\+\+\s*\)",
            "Index-based loop over an array",
            "Use for...of when the index is not needed",
            ("for (let i = 0; i < items.length; i++)", "for (const item of items)"),
            60,
            Rewrite::Manual,
        ),
        rule(
            "foreach-function",
            Performance,
            Low,
            r"\.forEach\s*\(\s*function\s*\(([^)]*)\)\s*\{",
            "forEach with a function expression",
            "Use an arrow function",
            (".forEach(function(x) {", ".forEach((x) => {"),
            90,
            Rewrite::Replace(".forEach((${1}) => {"),
        ),
        rule(
            "new-array",
            Performance,
            Low,
            r"\bnew\s+Array\s*\(\s*\)",
            "new Array() instead of an array literal",
            "Use []",
            ("new Array()", "[]"),
            95,
            Rewrite::Replace("[]"),
        ),
        rule(
            "new-object",
            Performance,
            Low,
            r"\bnew\s+Object\s*\(\s*\)",
            "new Object() instead of an object literal",
            "Use {}",
            ("new Object()", "{}"),
            95,
            Rewrite::Replace("{}"),
        ),
        rule(
            "index-of-includes",
            Performance,
            Low,
            r"\.indexOf\s*\(([^)]+)\)\s*!==\s*-1",
            "indexOf() comparison used as a membership test",
            "Use includes()",
            (".indexOf(x) !== -1", ".includes(x)"),
            85,
            Rewrite::Replace(".includes(${1})"),
        ),
        rule(
            "todo-comment",
            Quality,
            Low,
            r"\bTODO\s*:",
            "TODO marker",
            "Resolve the TODO or track it in an issue",
            ("TODO: ...", "// TODO: ..."),
            90,
            Rewrite::FormatMarker,
        ),
        rule(
            "fixme-comment",
            Quality,
            Medium,
            r"\bFIXME\s*:",
            "FIXME marker",
            "Fix the underlying problem",
            ("FIXME: ...", "// FIXME: ..."),
            90,
            Rewrite::FormatMarker,
        ),
        rule(
            "hack-comment",
            Quality,
            High,
            r"\bHACK\s*:",
            "HACK marker",
            "Replace the workaround with a proper solution",
            ("HACK: ...", "// HACK: ..."),
            80,
            Rewrite::FormatMarker,
        ),
        rule(
            "var-declaration",
            Quality,
            Low,
            r"\bvar\s+",
            "var declaration",
            "Use let or const",
            ("var x = 1", "let x = 1"),
            85,
            Rewrite::Replace("let "),
        ),
        rule(
            "explicit-any",
            TypeScript,
            Medium,
            r":\s*any\b",
            "Explicit any type",
            "Use unknown and narrow the type",
            (": any", ": unknown"),
            70,
            Rewrite::Replace(": unknown"),
        ),
        rule(
            "redundant-string-annotation",
            TypeScript,
            Low,
            r#"\b(const|let)\s+([A-Za-z_$][\w$]*)\s*:\s*string\s*=\s*(['"`])"#,
            "Redundant string annotation on a string literal",
            "Let TypeScript infer the type",
            (r#"const x: string = "value""#, r#"const x = "value""#),
            90,
            Rewrite::Replace("${1} ${2} = ${3}"),
        ),
        rule(
            "empty-interface",
            TypeScript,
            Low,
            r"\binterface\s+([A-Za-z_$][\w$]*)\s*\{\s*\}",
            "Empty interface",
            "Use Record<string, never>",
            ("interface Name {}", "type Name = Record<string, never>"),
            85,
            Rewrite::Replace("type ${1} = Record<string, never>"),
        ),
        rule(
            "trailing-whitespace",
            Eslint,
            Low,
            r"(\S)[ \t]+$",
            "Trailing whitespace",
            "Remove trailing whitespace",
            ("x = 1;   ", "x = 1;"),
            99,
            Rewrite::Replace("${1}"),
        ),
        rule(
            "missing-semicolon",
            Eslint,
            Low,
            r#"^\s*(?:(?:const|let)\s+[A-Za-z_$][\w$]*\s*=\s*[\w$."'`]+|return\s+[\w$."'`]+|[A-Za-z_$][\w$]*(?:\.[A-Za-z_$][\w$]*)*\([^()]*\))$"#,
            "Missing semicolon",
            "Terminate the statement with a semicolon",
            ("const x = 1", "const x = 1;"),
            75,
            Rewrite::Replace("${0};"),
        ),
    ]
});

pub fn default_rules() -> &'static [Rule] {
    &RULES
}

pub fn find_rule(id: &str) -> Option<&'static Rule> {
    RULES.iter().find(|r| r.id == id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fix(id: &str, line: &str) -> Option<String> {
        find_rule(id).unwrap().rewrite(line)
    }

    #[test]
    fn test_every_category_has_rules() {
        for category in [
            Category::Security,
            Category::Performance,
            Category::Quality,
            Category::TypeScript,
            Category::Eslint,
        ] {
            assert!(
                default_rules().iter().any(|r| r.category == category),
                "no rules for {}",
                category
            );
        }
    }

    #[test]
    fn test_rule_ids_unique() {
        let mut ids: Vec<_> = default_rules().iter().map(|r| r.id).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), default_rules().len());
    }

    #[test]
    fn test_security_rewrites() {
        assert_eq!(
            fix("inner-html", "  el.innerHTML = name;").as_deref(),
            Some("  el.textContent = name;")
        );
        assert_eq!(
            fix("console-log", "    console.log(user);").as_deref(),
            Some("    // console.log(user);")
        );
        assert_eq!(fix("console-log", "// console.log(user);"), None);
        assert_eq!(
            fix("set-timeout-zero", "setTimeout(flush, 0);").as_deref(),
            Some("queueMicrotask(flush);")
        );
        assert_eq!(find_rule("eval-usage").unwrap().severity, Severity::Critical);
    }

    #[test]
    fn test_performance_rewrites() {
        assert_eq!(
            fix("foreach-function", "items.forEach(function(item) {").as_deref(),
            Some("items.forEach((item) => {")
        );
        assert_eq!(fix("new-array", "const a = new Array();").as_deref(), Some("const a = [];"));
        assert_eq!(
            fix("index-of-includes", "if (list.indexOf(x) !== -1) {").as_deref(),
            Some("if (list.includes(x)) {")
        );
        assert!(find_rule("index-loop").unwrap().matches("for (let i = 0; i < beds.length; i++) {").is_some());
        assert_eq!(fix("index-loop", "for (let i = 0; i < beds.length; i++) {"), None);
    }

    #[test]
    fn test_quality_and_typescript_rewrites() {
        assert_eq!(fix("var-declaration", "var count = 0;").as_deref(), Some("let count = 0;"));
        assert_eq!(fix("todo-comment", "  TODO: wire up").as_deref(), Some("  // TODO: wire up"));
        // Already a comment: reported but not rewritten
        assert!(find_rule("todo-comment").unwrap().matches("// TODO: later").is_some());
        assert_eq!(fix("todo-comment", "// TODO: later"), None);
        assert_eq!(
            fix("explicit-any", "function f(x: any) {").as_deref(),
            Some("function f(x: unknown) {")
        );
        assert_eq!(
            fix("redundant-string-annotation", "const name: string = 'Rozen';").as_deref(),
            Some("const name = 'Rozen';")
        );
        assert_eq!(
            fix("empty-interface", "export interface Props {}").as_deref(),
            Some("export type Props = Record<string, never>")
        );
    }

    #[test]
    fn test_eslint_rewrites() {
        assert_eq!(fix("trailing-whitespace", "x = 1;  ").as_deref(), Some("x = 1;"));
        assert_eq!(fix("trailing-whitespace", "   "), None);
        assert_eq!(fix("missing-semicolon", "const x = 1").as_deref(), Some("const x = 1;"));
        assert_eq!(fix("missing-semicolon", "  return value").as_deref(), Some("  return value;"));
        assert_eq!(fix("missing-semicolon", "save(bed)").as_deref(), Some("save(bed);"));
        assert_eq!(fix("missing-semicolon", "const x = 1;"), None);
        assert_eq!(fix("missing-semicolon", "if (x) {"), None);
    }
}
