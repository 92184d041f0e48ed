//! Left- and right-hand sides of `MapAddress` directives.
//!
//! A pattern is either an exact address (`www.torproject.org`, `4.4.4.4`) or a
//! wildcard `*.domain` that covers `domain` and every name below it. A target
//! may only carry a `*.` slot when its pattern does; the labels the wildcard
//! consumed are substituted into that slot.

use std::{fmt, net::IpAddr};

use crate::error::PatternError;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Pattern {
    domain: String,
    wildcard: bool,
}

impl Pattern {
    pub fn parse(text: &str) -> Result<Self, PatternError> {
        let s = normalize(text)?;

        if let Some(domain) = s.strip_prefix("*.") {
            check_labels(domain, &s)?;
            return Ok(Self {
                domain: domain.to_string(),
                wildcard: true,
            });
        }

        check_literal(&s)?;
        Ok(Self {
            domain: s,
            wildcard: false,
        })
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn is_wildcard(&self) -> bool {
        self.wildcard
    }

    /// Labels of `candidate` not covered by this pattern's domain, or `None`
    /// if the pattern does not cover `candidate` at all.
    ///
    /// `candidate` must already be normalized with [`normalize_host`].
    pub fn matched_prefix<'a>(&self, candidate: &'a str) -> Option<&'a str> {
        if candidate == self.domain {
            return Some("");
        }
        if !self.wildcard {
            return None;
        }

        candidate
            .strip_suffix(self.domain.as_str())
            .and_then(|p| p.strip_suffix('.'))
            .filter(|p| !p.is_empty())
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.wildcard {
            write!(f, "*.{}", self.domain)
        } else {
            f.write_str(&self.domain)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    literal: String,
    wildcard: bool,
}

impl Target {
    pub fn parse(text: &str, pattern: &Pattern) -> Result<Self, PatternError> {
        let s = normalize(text)?;

        if let Some(literal) = s.strip_prefix("*.") {
            if !pattern.is_wildcard() {
                return Err(PatternError::WildcardTarget(s));
            }
            check_labels(literal, &s)?;
            return Ok(Self {
                literal: literal.to_string(),
                wildcard: true,
            });
        }

        check_literal(&s)?;
        Ok(Self {
            literal: s,
            wildcard: false,
        })
    }

    pub fn literal(&self) -> &str {
        &self.literal
    }

    pub fn is_wildcard(&self) -> bool {
        self.wildcard
    }

    pub fn substitute(&self, prefix: &str) -> String {
        if self.wildcard && !prefix.is_empty() {
            format!("{}.{}", prefix, self.literal)
        } else {
            self.literal.clone()
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.wildcard {
            write!(f, "*.{}", self.literal)
        } else {
            f.write_str(&self.literal)
        }
    }
}

/// Lower-cases `host` and drops a single trailing root dot.
pub fn normalize_host(host: &str) -> String {
    let mut h = host.trim().to_ascii_lowercase();
    if h.len() > 1 && h.ends_with('.') {
        h.pop();
    }
    h
}

fn normalize(text: &str) -> Result<String, PatternError> {
    let s = normalize_host(text);

    if s.is_empty() {
        return Err(PatternError::Empty);
    }
    if s == "*" {
        return Err(PatternError::BareWildcard);
    }
    if s.starts_with('.') {
        return Err(PatternError::LeadingDot(s));
    }

    Ok(s)
}

fn check_literal(s: &str) -> Result<(), PatternError> {
    let unbracketed = s
        .strip_prefix('[')
        .and_then(|v| v.strip_suffix(']'))
        .unwrap_or(s);
    if unbracketed.parse::<IpAddr>().is_ok() {
        return Ok(());
    }
    check_labels(s, s)
}

fn check_labels(domain: &str, whole: &str) -> Result<(), PatternError> {
    if domain.is_empty() {
        return Err(PatternError::EmptyLabel(whole.to_string()));
    }

    for label in domain.split('.') {
        if label.is_empty() {
            return Err(PatternError::EmptyLabel(whole.to_string()));
        }
        if label.contains('*') {
            return Err(PatternError::MisplacedWildcard(whole.to_string()));
        }
        if !label
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(PatternError::IllegalCharacter(whole.to_string()));
        }
    }

    Ok(())
}
