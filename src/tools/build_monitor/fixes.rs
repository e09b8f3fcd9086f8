//! Fix rules the build monitor may apply, and the source rewrites behind them.

use regex::Regex;
use std::sync::LazyLock;

use super::parser::{BuildError, MODULE_NOT_FOUND};
use crate::config::SafetyLevel;

static CANNOT_FIND_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Cannot find name '(.+)'").unwrap());
static UNUSED_VARIABLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"'(.+)' is declared but its value is never read").unwrap());
static REACT_STRICT_MODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"reactStrictMode:\s*true,?\s*").unwrap());
static SWC_MINIFY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"swcMinify:\s*true,?\s*").unwrap());
static EMPTY_COMPILER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"compiler:\s*\{\s*\},?\s*").unwrap());

/// Packages the monitor is allowed to install on its own.
pub const SAFE_PACKAGES: &[&str] = &[
    "@types/node",
    "@types/react",
    "@types/react-dom",
    "lucide-react",
    "clsx",
    "tailwind-merge",
    "date-fns",
    "zod",
    "bcryptjs",
    "@types/bcryptjs",
];

/// Imports added for well-known undefined names.
const KNOWN_IMPORTS: &[(&str, &str)] = &[
    ("React", "import React from 'react';"),
    ("useState", "import { useState } from 'react';"),
    ("useEffect", "import { useEffect } from 'react';"),
    ("NextRequest", "import { NextRequest } from 'next/server';"),
    ("NextResponse", "import { NextResponse } from 'next/server';"),
    (
        "supabase",
        "import { createClient } from '@supabase/supabase-js';",
    ),
];

/// What a rule does once it matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixAction {
    AnnotateHeaders,
    AddImport,
    PrefixUnused,
    InstallPackage,
    CleanNextConfig,
}

impl FixAction {
    /// Rewrites the file the error points at, as opposed to acting on the project.
    pub fn edits_source(self) -> bool {
        matches!(
            self,
            FixAction::AnnotateHeaders | FixAction::AddImport | FixAction::PrefixUnused
        )
    }
}

#[derive(Debug, Clone)]
pub struct FixRule {
    pub id: &'static str,
    pub pattern: Regex,
    pub description: &'static str,
    pub safety: SafetyLevel,
    pub dnb_compliant: bool,
    pub action: FixAction,
}

impl FixRule {
    fn new(
        id: &'static str,
        pattern: &str,
        description: &'static str,
        safety: SafetyLevel,
        action: FixAction,
    ) -> Self {
        Self {
            id,
            // Literal patterns from default_rules
            pattern: Regex::new(pattern).unwrap(),
            description,
            safety,
            dnb_compliant: true,
            action,
        }
    }

    /// Rewrite `content` for `error`. Project-level actions return it untouched.
    pub fn rewrite(&self, error: &BuildError, content: &str) -> String {
        match self.action {
            FixAction::AnnotateHeaders => annotate_headers(content, error.line as usize),
            FixAction::AddImport => match CANNOT_FIND_NAME.captures(&error.message) {
                Some(caps) => add_missing_import(content, &caps[1]),
                None => content.to_string(),
            },
            FixAction::PrefixUnused => match UNUSED_VARIABLE.captures(&error.message) {
                Some(caps) => prefix_unused(content, error.line as usize, &caps[1]),
                None => content.to_string(),
            },
            FixAction::InstallPackage | FixAction::CleanNextConfig => content.to_string(),
        }
    }
}

/// The built-in rule table.
pub fn default_rules() -> Vec<FixRule> {
    vec![
        FixRule::new(
            "implicit-any-index",
            r"Element implicitly has an 'any' type because expression of type .* can't be used to index type",
            "Fix implicit any type in index access",
            SafetyLevel::Safe,
            FixAction::AnnotateHeaders,
        ),
        FixRule::new(
            "missing-import",
            r"Cannot find name '(.+)'",
            "Add missing imports for undefined variables",
            SafetyLevel::Moderate,
            FixAction::AddImport,
        ),
        FixRule::new(
            "unused-variable",
            r"'(.+)' is declared but its value is never read",
            "Remove unused variables or mark as used",
            SafetyLevel::Safe,
            FixAction::PrefixUnused,
        ),
        FixRule::new(
            "missing-module",
            r"Module not found: Can't resolve '(.+)'",
            "Install missing npm packages",
            SafetyLevel::Moderate,
            FixAction::InstallPackage,
        ),
        FixRule::new(
            "next-config",
            r"Invalid next\.config\.(js|mjs) options detected",
            "Fix Next.js configuration issues",
            SafetyLevel::Safe,
            FixAction::CleanNextConfig,
        ),
    ]
}

/// Rules that match `error` and are allowed at `level`.
pub fn applicable_rules<'a>(
    rules: &'a [FixRule],
    error: &BuildError,
    level: SafetyLevel,
) -> Vec<&'a FixRule> {
    rules
        .iter()
        .filter(|r| r.dnb_compliant && r.safety <= level && r.pattern.is_match(&error.message))
        .collect()
}

/// Module name from a "Module not found" message.
pub fn missing_module(message: &str) -> Option<String> {
    MODULE_NOT_FOUND
        .captures(message)
        .map(|caps| caps[1].to_string())
}

pub fn is_safe_package(name: &str) -> bool {
    SAFE_PACKAGES.contains(&name)
}

fn join_lines(lines: &[String], trailing_newline: bool) -> String {
    let mut out = lines.join("\n");
    if trailing_newline {
        out.push('\n');
    }
    out
}

fn split_lines(content: &str) -> (Vec<String>, bool) {
    let lines = content.lines().map(str::to_string).collect();
    (lines, content.ends_with('\n'))
}

/// Annotate `const headers = {` within the ten lines above a `headers[..] =` assignment.
pub fn annotate_headers(content: &str, error_line: usize) -> String {
    let (mut lines, trailing) = split_lines(content);
    let Some(line) = error_line.checked_sub(1).and_then(|i| lines.get(i)) else {
        return content.to_string();
    };
    if !(line.contains("headers[") && line.contains("] =")) {
        return content.to_string();
    }

    let start = error_line.saturating_sub(10);
    for i in start..error_line.saturating_sub(1) {
        if lines[i].contains("const headers = {") {
            lines[i] = lines[i].replacen(
                "const headers = {",
                "const headers: Record<string, string> = {",
                1,
            );
            return join_lines(&lines, trailing);
        }
    }
    content.to_string()
}

/// Insert a known import after the leading import block.
pub fn add_missing_import(content: &str, name: &str) -> String {
    let Some((_, import)) = KNOWN_IMPORTS.iter().find(|(n, _)| *n == name) else {
        return content.to_string();
    };
    let (mut lines, trailing) = split_lines(content);

    let mut insert_at = 0;
    for (i, line) in lines.iter().enumerate() {
        if line.starts_with("import ") {
            insert_at = i + 1;
        } else if line.trim().is_empty() || line.starts_with("//") {
            continue;
        } else {
            break;
        }
    }
    lines.insert(insert_at, import.to_string());
    join_lines(&lines, trailing)
}

/// Prefix an unused destructured binding with `_`.
pub fn prefix_unused(content: &str, error_line: usize, name: &str) -> String {
    let (mut lines, trailing) = split_lines(content);
    let Some(idx) = error_line.checked_sub(1).filter(|i| *i < lines.len()) else {
        return content.to_string();
    };
    let line = &lines[idx];
    if !(line.contains("const {") || line.contains("const [")) {
        return content.to_string();
    }
    let Ok(word) = Regex::new(&format!(r"\b{}\b", regex::escape(name))) else {
        return content.to_string();
    };
    if !word.is_match(line) {
        return content.to_string();
    }
    lines[idx] = word.replacen(line, 1, format!("_{}", name)).into_owned();
    join_lines(&lines, trailing)
}

/// Drop deprecated options from a `next.config.*` file.
pub fn clean_next_config(content: &str) -> String {
    let content = REACT_STRICT_MODE.replace_all(content, "");
    let content = SWC_MINIFY.replace_all(&content, "");
    EMPTY_COMPILER.replace_all(&content, "").into_owned()
}
