//! Content rules for submitted source
//!
//! Rules are plain text scans run before anything is written to disk. They
//! stop naive attempts to reach the host (a bare `require(` call, an
//! `import subprocess` line) and nothing more: a dynamically built import
//! string passes straight through. They are not an isolation boundary.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A per-language content rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContentRule {
    /// Reject code containing `pattern` unless `marker` appears anywhere in it
    ForbidUnlessMarked { pattern: String, marker: String },

    /// Reject `import`/`from ... import` lines naming a denied top-level module
    DenyImports { modules: Vec<String> },
}

/// Reason a submission was rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GuardError {
    #[error("use of `{pattern}` is not allowed unless the source contains `{marker}`")]
    UnmarkedPattern { pattern: String, marker: String },

    #[error("import of module '{module}' is not allowed (line {line})")]
    DeniedImport { module: String, line: usize },
}

impl ContentRule {
    /// Check code against this rule
    pub fn check(&self, code: &str) -> Result<(), GuardError> {
        match self {
            ContentRule::ForbidUnlessMarked { pattern, marker } => {
                if code.contains(pattern.as_str()) && !code.contains(marker.as_str()) {
                    return Err(GuardError::UnmarkedPattern {
                        pattern: pattern.clone(),
                        marker: marker.clone(),
                    });
                }
                Ok(())
            }
            ContentRule::DenyImports { modules } => {
                for (index, line) in code.lines().enumerate() {
                    if let Some(module) = imported_modules(line)
                        .into_iter()
                        .find(|module| modules.iter().any(|denied| denied == module))
                    {
                        return Err(GuardError::DeniedImport {
                            module: module.to_owned(),
                            line: index + 1,
                        });
                    }
                }
                Ok(())
            }
        }
    }
}

/// Run the language's rule, if it has one
pub fn validate(code: &str, rule: Option<&ContentRule>) -> Result<(), GuardError> {
    match rule {
        Some(rule) => rule.check(code),
        None => Ok(()),
    }
}

/// Top-level module names imported on a single line
fn imported_modules(line: &str) -> Vec<&str> {
    let mut found = Vec::new();
    // Simple statements start a line, follow `;` or follow a compound header's `:`
    for statement in line.split([';', ':']) {
        let statement = statement.trim_start();
        if let Some(rest) = after_keyword(statement, "import") {
            // import a, b.c as d
            found.extend(
                rest.split(',')
                    .filter_map(|part| part.split_whitespace().next())
                    .map(top_level),
            );
        } else if let Some(rest) = after_keyword(statement, "from") {
            // from a.b import c
            found.extend(rest.split_whitespace().next().map(top_level));
        }
    }
    found
}

fn after_keyword<'a>(statement: &'a str, keyword: &str) -> Option<&'a str> {
    let rest = statement.strip_prefix(keyword)?;
    rest.starts_with(char::is_whitespace).then_some(rest)
}

fn top_level(module: &str) -> &str {
    module.split('.').next().unwrap_or(module)
}
