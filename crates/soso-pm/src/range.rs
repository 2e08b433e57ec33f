//! Version range oracle
//!
//! Answers "does version V satisfy range R?" and orders versions by precedence.
//! Range strings use the npm-style syntax found in `package.json` files and are
//! translated onto [`semver::VersionReq`], which does the actual matching.

use semver::{Version, VersionReq};
use std::fmt;
use thiserror::Error;

/// Errors that can occur while parsing ranges or versions
#[derive(Debug, Error)]
pub enum RangeError {
    /// Range string could not be translated into a version requirement
    #[error("Invalid version range '{range}': {reason}")]
    InvalidRange { range: String, reason: String },

    /// Version string is not valid semver
    #[error("Invalid version '{version}': {reason}")]
    InvalidVersion { version: String, reason: String },
}

/// A version range: the literal string plus its parsed alternatives
///
/// The literal is kept verbatim. It is the identity of the range for
/// visited-edge bookkeeping and is what diagnostics print.
#[derive(Debug, Clone)]
pub struct VersionRange {
    raw: String,
    alternatives: Vec<VersionReq>,
}

impl VersionRange {
    /// Parse a range string
    ///
    /// Supports `^`, `~`, comparison operators, bare and partial versions,
    /// `x`/`*` wildcards, space-separated intersections, hyphen ranges and
    /// `||` unions. An empty string means any version.
    pub fn parse(raw: &str) -> Result<Self, RangeError> {
        let mut alternatives = Vec::new();

        for alternative in raw.split("||") {
            let translated = translate_alternative(alternative).map_err(|reason| {
                RangeError::InvalidRange {
                    range: raw.to_string(),
                    reason,
                }
            })?;

            let req = VersionReq::parse(&translated).map_err(|e| RangeError::InvalidRange {
                range: raw.to_string(),
                reason: e.to_string(),
            })?;
            alternatives.push(req);
        }

        Ok(Self {
            raw: raw.to_string(),
            alternatives,
        })
    }

    /// The literal range string
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Check whether a version satisfies this range
    pub fn satisfies(&self, version: &Version) -> bool {
        self.alternatives.iter().any(|req| req.matches(version))
    }

    /// Select the highest version satisfying this range
    pub fn max_satisfying<'a, I>(&self, versions: I) -> Option<&'a Version>
    where
        I: IntoIterator<Item = &'a Version>,
    {
        versions.into_iter().filter(|v| self.satisfies(v)).max()
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl PartialEq for VersionRange {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl Eq for VersionRange {}

/// Parse a version string, tolerating a leading `v`
pub fn parse_version(s: &str) -> Result<Version, RangeError> {
    let trimmed = s.trim();
    let trimmed = trimmed.strip_prefix('v').unwrap_or(trimmed);

    Version::parse(trimmed).map_err(|e| RangeError::InvalidVersion {
        version: s.to_string(),
        reason: e.to_string(),
    })
}

/// Translate one `||` alternative into `VersionReq` syntax
fn translate_alternative(alternative: &str) -> Result<String, String> {
    let tokens = merge_operators(alternative.split_whitespace());
    let mut comparators = Vec::new();

    let mut i = 0;
    while i < tokens.len() {
        // Hyphen range: "a - b" => ">=a, <=b"
        if tokens.get(i + 1).map(String::as_str) == Some("-") {
            let upper = tokens
                .get(i + 2)
                .ok_or_else(|| "hyphen range is missing its upper bound".to_string())?;
            if let Some(lower) = translate_comparator(&format!(">={}", tokens[i]))? {
                comparators.push(lower);
            }
            if let Some(upper) = translate_comparator(&format!("<={}", upper))? {
                comparators.push(upper);
            }
            i += 3;
            continue;
        }

        if let Some(c) = translate_comparator(&tokens[i])? {
            comparators.push(c);
        }
        i += 1;
    }

    if comparators.is_empty() {
        Ok("*".to_string())
    } else {
        Ok(comparators.join(", "))
    }
}

/// Join a lone operator token with the version that follows it (">= 1.0.0")
fn merge_operators<'a>(tokens: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut merged: Vec<String> = Vec::new();
    let mut pending: Option<&str> = None;

    for token in tokens {
        if let Some(op) = pending.take() {
            merged.push(format!("{}{}", op, token));
        } else if matches!(token, ">=" | "<=" | ">" | "<" | "=" | "^" | "~") {
            pending = Some(token);
        } else {
            merged.push(token.to_string());
        }
    }

    if let Some(op) = pending {
        merged.push(op.to_string());
    }

    merged
}

/// Translate a single comparator; `None` means it matches everything
fn translate_comparator(token: &str) -> Result<Option<String>, String> {
    let (op, rest) = split_operator(token);
    let rest = rest.strip_prefix('v').unwrap_or(rest);

    if rest.is_empty() {
        return if op.is_empty() {
            Ok(None)
        } else {
            Err(format!("operator '{}' has no version", op))
        };
    }

    // Prerelease or build metadata: pass through untouched
    let core = if rest.contains('-') || rest.contains('+') {
        rest.to_string()
    } else {
        let kept: Vec<&str> = rest
            .split('.')
            .take_while(|part| !matches!(*part, "x" | "X" | "*"))
            .collect();
        if kept.is_empty() {
            return Ok(None);
        }
        kept.join(".")
    };

    // A bare version means exactly that version, not a caret range
    let op = if op.is_empty() { "=" } else { op };
    Ok(Some(format!("{}{}", op, core)))
}

fn split_operator(token: &str) -> (&str, &str) {
    for op in [">=", "<=", ">", "<", "=", "^", "~"] {
        if let Some(rest) = token.strip_prefix(op) {
            return (op, rest);
        }
    }
    ("", token)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    #[test]
    fn test_bare_version_is_exact() {
        let r = VersionRange::parse("1.2.3").unwrap();
        assert!(r.satisfies(&v("1.2.3")));
        assert!(!r.satisfies(&v("1.2.4")));
    }

    #[test]
    fn test_space_separated_intersection() {
        let r = VersionRange::parse(">=1.0.0 <2.0.0").unwrap();
        assert!(r.satisfies(&v("1.9.0")));
        assert!(!r.satisfies(&v("2.0.0")));
        assert!(!r.satisfies(&v("0.9.0")));
    }

    #[test]
    fn test_detached_operator() {
        let r = VersionRange::parse(">= 1.5.0").unwrap();
        assert!(r.satisfies(&v("1.5.0")));
        assert!(!r.satisfies(&v("1.4.9")));
    }

    #[test]
    fn test_wildcards() {
        let r = VersionRange::parse("1.x").unwrap();
        assert!(r.satisfies(&v("1.0.0")));
        assert!(r.satisfies(&v("1.99.0")));
        assert!(!r.satisfies(&v("2.0.0")));

        let any = VersionRange::parse("*").unwrap();
        assert!(any.satisfies(&v("0.0.1")));

        let empty = VersionRange::parse("").unwrap();
        assert!(empty.satisfies(&v("42.0.0")));
    }

    #[test]
    fn test_hyphen_range() {
        let r = VersionRange::parse("1.2.0 - 1.4.0").unwrap();
        assert!(r.satisfies(&v("1.2.0")));
        assert!(r.satisfies(&v("1.4.0")));
        assert!(!r.satisfies(&v("1.4.1")));
    }

    #[test]
    fn test_union() {
        let r = VersionRange::parse("^1.0.0 || ^3.0.0").unwrap();
        assert!(r.satisfies(&v("1.2.0")));
        assert!(r.satisfies(&v("3.1.0")));
        assert!(!r.satisfies(&v("2.0.0")));
    }

    #[test]
    fn test_max_satisfying() {
        let versions = vec![v("2.3.0"), v("2.5.0"), v("3.0.0")];
        let r = VersionRange::parse("^2.0.0").unwrap();
        assert_eq!(r.max_satisfying(&versions), Some(&v("2.5.0")));

        let none = VersionRange::parse("^4.0.0").unwrap();
        assert_eq!(none.max_satisfying(&versions), None);
    }

    #[test]
    fn test_invalid_range() {
        assert!(VersionRange::parse("latest").is_err());
        assert!(VersionRange::parse(">=").is_err());
    }

    #[test]
    fn test_parse_version_with_prefix() {
        assert_eq!(parse_version("v1.0.0").unwrap(), v("1.0.0"));
        assert!(parse_version("1.0").is_err());
    }
}
