//! Evaluation of package-declared constraints on a toolchain version.
//!
//! Two dialects are understood: `Requires-Python` specifiers and npm
//! `engines` ranges. npm ranges are rewritten into [`semver::VersionReq`]
//! syntax; Python specifiers are evaluated directly on [`ToolchainVersion`].

use std::cmp::Ordering;

use thiserror::Error;
use toolup_backend::{ConstraintDialect, ToolchainVersion, normalize_version_text};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Cannot evaluate constraint {constraint:?}: {reason}")]
pub struct ConstraintError {
    pub constraint: String,
    pub reason: String,
}

impl ConstraintError {
    fn new(constraint: &str, reason: impl Into<String>) -> Self {
        Self {
            constraint: constraint.to_string(),
            reason: reason.into(),
        }
    }
}

/// `true` when `candidate` satisfies `constraint`.
///
/// # Errors
/// Returns an error when the constraint cannot be parsed.
pub fn allows(
    constraint: &str,
    dialect: ConstraintDialect,
    candidate: &ToolchainVersion,
) -> Result<bool, ConstraintError> {
    match dialect {
        ConstraintDialect::Pep440 => pep440_allows(constraint, candidate),
        ConstraintDialect::Npm => npm_allows(constraint, candidate),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Arbitrary,
    Compatible,
    Equal,
    NotEqual,
    LessEqual,
    GreaterEqual,
    Less,
    Greater,
}

const PEP440_OPERATORS: &[(&str, Op)] = &[
    ("===", Op::Arbitrary),
    ("~=", Op::Compatible),
    ("==", Op::Equal),
    ("!=", Op::NotEqual),
    ("<=", Op::LessEqual),
    (">=", Op::GreaterEqual),
    ("<", Op::Less),
    (">", Op::Greater),
];

fn pep440_allows(constraint: &str, candidate: &ToolchainVersion) -> Result<bool, ConstraintError> {
    for clause in constraint.split(',').map(str::trim).filter(|c| !c.is_empty()) {
        if !pep440_clause_allows(constraint, clause, candidate)? {
            return Ok(false);
        }
    }
    Ok(true)
}

fn pep440_clause_allows(
    constraint: &str,
    clause: &str,
    candidate: &ToolchainVersion,
) -> Result<bool, ConstraintError> {
    let Some((op, rest)) = PEP440_OPERATORS
        .iter()
        .find_map(|(text, op)| clause.strip_prefix(text).map(|rest| (*op, rest.trim())))
    else {
        return Err(ConstraintError::new(
            constraint,
            format!("missing operator in {clause:?}"),
        ));
    };

    if op == Op::Arbitrary {
        return Ok(normalize_version_text(rest) == candidate.as_str());
    }
    if let Some(prefix) = rest.strip_suffix(".*") {
        let prefix = parse_version(constraint, prefix)?;
        let matches = candidate.starts_with(prefix.components());
        return match op {
            Op::Equal => Ok(matches),
            Op::NotEqual => Ok(!matches),
            _ => Err(ConstraintError::new(
                constraint,
                format!("wildcard not allowed in {clause:?}"),
            )),
        };
    }

    let bound = parse_version(constraint, rest)?;
    let ordering = candidate.cmp(&bound);
    Ok(match op {
        Op::Compatible => {
            let components = bound.components();
            if components.len() < 2 {
                return Err(ConstraintError::new(
                    constraint,
                    format!("~= needs at least two components in {clause:?}"),
                ));
            }
            ordering != Ordering::Less
                && candidate.starts_with(&components[..components.len() - 1])
        }
        Op::Equal => ordering == Ordering::Equal,
        Op::NotEqual => ordering != Ordering::Equal,
        Op::LessEqual => ordering != Ordering::Greater,
        Op::GreaterEqual => ordering != Ordering::Less,
        Op::Less => ordering == Ordering::Less,
        Op::Greater => ordering == Ordering::Greater,
        Op::Arbitrary => normalize_version_text(rest) == candidate.as_str(),
    })
}

fn parse_version(constraint: &str, text: &str) -> Result<ToolchainVersion, ConstraintError> {
    text.parse::<ToolchainVersion>()
        .map_err(|error| ConstraintError::new(constraint, error.to_string()))
}

fn npm_allows(constraint: &str, candidate: &ToolchainVersion) -> Result<bool, ConstraintError> {
    let components = candidate.components();
    let version = semver::Version::new(
        candidate.major(),
        candidate.minor(),
        components.get(2).copied().unwrap_or(0),
    );

    for alternative in constraint.split("||").map(str::trim) {
        let requirement = npm_to_semver(alternative);
        if requirement.is_empty() {
            return Ok(true);
        }
        let requirement = semver::VersionReq::parse(&requirement)
            .map_err(|error| ConstraintError::new(constraint, error.to_string()))?;
        if requirement.matches(&version) {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Rewrite one npm range (no `||`) as a comma-separated `VersionReq`.
/// Returns an empty string for ranges that match everything.
fn npm_to_semver(range: &str) -> String {
    let tokens: Vec<&str> = range.split_whitespace().collect();
    let mut comparators = Vec::new();
    let mut index = 0;

    while index < tokens.len() {
        let token = tokens[index];

        if tokens.get(index + 1) == Some(&"-")
            && let Some(upper) = tokens.get(index + 2)
        {
            comparators.push(format!(">={}", strip_v(token)));
            comparators.push(format!("<={}", strip_v(upper)));
            index += 3;
            continue;
        }

        let is_operator_only = !token.is_empty()
            && token.chars().all(|c| matches!(c, '<' | '>' | '=' | '^' | '~'));
        if is_operator_only && let Some(next) = tokens.get(index + 1) {
            comparators.push(format!("{token}{}", strip_v(next)));
            index += 2;
            continue;
        }

        if matches!(token, "*" | "x" | "X" | "") {
            index += 1;
            continue;
        }

        let has_operator = token.starts_with(['<', '>', '=', '^', '~']);
        let is_wildcard = token.contains(['*', 'x', 'X']);
        if has_operator {
            let split = token
                .find(|c: char| !matches!(c, '<' | '>' | '=' | '^' | '~'))
                .unwrap_or(token.len());
            let (op, version) = token.split_at(split);
            comparators.push(format!("{op}{}", strip_v(version)));
        } else if is_wildcard {
            comparators.push(strip_v(token).to_string());
        } else {
            comparators.push(format!("={}", strip_v(token)));
        }
        index += 1;
    }

    comparators.join(", ")
}

fn strip_v(text: &str) -> &str {
    text.strip_prefix(['v', 'V'])
        .filter(|rest| rest.starts_with(|c: char| c.is_ascii_digit()))
        .unwrap_or(text)
}
