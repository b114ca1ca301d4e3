//! `#define` rewriting for firmware configuration headers.
//!
//! A directive line is recognized in two forms:
//!
//! ```text
//!   #define NAME VALUE // comment     active
//! //#define NAME VALUE // comment     disabled
//! ```
//!
//! For each directive whose `NAME` has an override in the profile the line is
//! replaced by a freshly formatted one; everything else is copied byte for
//! byte. Only the first occurrence of a name in a template is rewritten, later
//! occurrences are copied unchanged.

use std::collections::HashSet;

use crate::profile::Profile;

/// Directive keyword.
pub const DIRECTIVE: &str = "#define";

/// Trailing annotation on every rewritten line.
pub const MODIFIED_MARKER: &str = "//Modified by BigBoxFirmware Plugin";

/// Rewrites one template against a profile.
///
/// The set of already rewritten identifiers lives as long as the rewriter, so
/// use a fresh one per template file.
pub struct DirectiveRewriter<'a> {
    profile: &'a Profile,
    processed: HashSet<String>,
}

impl<'a> DirectiveRewriter<'a> {
    pub fn new(profile: &'a Profile) -> Self {
        Self {
            profile,
            processed: HashSet::new(),
        }
    }

    /// Rewrite a whole template, preserving line terminators.
    ///
    /// Headers are not required to be UTF-8; lines that are not rewritten
    /// are copied as raw bytes.
    pub fn rewrite(&mut self, template: &[u8]) -> Vec<u8> {
        let mut merged = Vec::with_capacity(template.len());
        for line in template.split_inclusive(|&b| b == b'\n') {
            match self.rewrite_line(line) {
                Some(replacement) => merged.extend_from_slice(replacement.as_bytes()),
                None => merged.extend_from_slice(line),
            }
        }
        merged
    }

    /// Identifiers rewritten so far.
    pub fn processed(&self) -> &HashSet<String> {
        &self.processed
    }

    /// Replacement for `line`, or `None` to keep it verbatim.
    fn rewrite_line(&mut self, line: &[u8]) -> Option<String> {
        let text = String::from_utf8_lossy(line);
        let identifier = directive_identifier(&text)?;
        if self.processed.contains(identifier) {
            return None;
        }

        let param = self.profile.find(identifier)?;
        let prefix = if param.enabled { "" } else { "//" };
        let indent = " ".repeat(indentation(&text));
        let terminator = if line.ends_with(b"\r\n") { "\r\n" } else { "\n" };

        self.processed.insert(param.identifier.clone());
        Some(format!(
            "{prefix}{indent}{DIRECTIVE} {} {} {MODIFIED_MARKER}{terminator}",
            param.identifier, param.value
        ))
    }
}

/// Rewrite `template` with a fresh rewriter.
pub fn rewrite_template(template: &[u8], profile: &Profile) -> Vec<u8> {
    DirectiveRewriter::new(profile).rewrite(template)
}

/// Name of the directive on `line`, active or commented out.
///
/// The line is split on `//` into at most three parts. The code before the
/// first marker is checked first; failing that, the text between the first
/// and second marker (a commented-out directive).
pub fn directive_identifier(line: &str) -> Option<&str> {
    let mut parts = line.splitn(3, "//");
    let code = parts.next()?;
    if let Some(identifier) = identifier_after_keyword(code) {
        return Some(identifier);
    }
    parts.next().and_then(identifier_after_keyword)
}

fn identifier_after_keyword(fragment: &str) -> Option<&str> {
    let rest = fragment.trim().strip_prefix(DIRECTIVE)?;
    rest.split_whitespace().next()
}

/// Column of the keyword once comment markers are removed.
fn indentation(line: &str) -> usize {
    let uncommented = line.replace("//", "");
    uncommented
        .find(DIRECTIVE)
        .map(|at| uncommented[..at].chars().count())
        .unwrap_or(0)
}
