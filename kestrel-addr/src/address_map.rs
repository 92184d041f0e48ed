use std::{collections::HashMap, net::Ipv4Addr, time::SystemTime};

use serde::Serialize;

use crate::{
    error::PatternError,
    pattern::{normalize_host, Pattern, Target},
};

/// When a rule stops applying. Rules from the configuration never expire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Expiry {
    At(SystemTime),
    Never,
}

impl Expiry {
    pub fn is_expired(&self, now: SystemTime) -> bool {
        matches!(self, Expiry::At(t) if *t <= now)
    }
}

#[derive(Debug, Clone)]
pub struct RewriteRule {
    pattern: Pattern,
    target: Target,
    expiry: Expiry,
}

impl RewriteRule {
    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn expiry(&self) -> Expiry {
        self.expiry
    }

    pub fn is_pattern_wildcard(&self) -> bool {
        self.pattern.is_wildcard()
    }

    /// Rewrites a normalized `candidate`, or returns `None` if this rule does
    /// not cover it.
    pub fn apply(&self, candidate: &str) -> Option<String> {
        self.pattern
            .matched_prefix(candidate)
            .map(|prefix| self.target.substitute(prefix))
    }
}

#[derive(Debug, Clone, Default)]
pub struct AddressMap {
    map: HashMap<String, RewriteRule>,
}

impl AddressMap {
    pub fn new() -> Self {
        Self {
            map: HashMap::new(),
        }
    }

    pub fn register(
        &mut self,
        pattern: &str,
        target: &str,
        expiry: Expiry,
    ) -> Result<(), PatternError> {
        let pattern = Pattern::parse(pattern)?;
        let target = Target::parse(target, &pattern)?;
        let key = pattern.to_string();

        let rule = RewriteRule {
            pattern,
            target,
            expiry,
        };

        if let Some(old) = self.map.insert(key, rule) {
            log::debug!("MapAddress {} replaces earlier target {}", old.pattern, old.target);
        }

        Ok(())
    }

    /// Registers the value of one `MapAddress` directive (`<pattern> <target>`).
    pub fn register_directive(&mut self, value: &str) -> Result<(), PatternError> {
        let mut args = value.split_whitespace();

        let (Some(from), Some(to)) = (args.next(), args.next()) else {
            return Err(PatternError::TooFewArguments(value.trim().to_string()));
        };

        if args.next().is_some() {
            log::warn!("Ignoring extra arguments to MapAddress '{}'", value.trim());
        }

        self.register(from, to, Expiry::Never)
    }

    /// Registers directives in order, skipping invalid ones. Returns how many
    /// were accepted.
    pub fn load<I, S>(&mut self, directives: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut accepted = 0;

        for directive in directives {
            let directive = directive.as_ref();
            match self.register_directive(directive) {
                Ok(()) => accepted += 1,
                Err(e) => log::warn!("Skipping MapAddress '{}': {}", directive.trim(), e),
            }
        }

        accepted
    }

    pub fn remove(&mut self, pattern: &str) -> Option<RewriteRule> {
        let key = Pattern::parse(pattern).ok()?.to_string();
        self.map.remove(&key)
    }

    pub fn clear(&mut self) {
        self.map.clear();
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn snapshot(&self) -> impl Iterator<Item = &RewriteRule> {
        self.map.values()
    }

    pub fn list(&self) -> Vec<(String, String)> {
        let mut rules: Vec<(String, String)> = self
            .map
            .values()
            .map(|r| (r.pattern.to_string(), r.target.to_string()))
            .collect();
        rules.sort();
        rules
    }

    pub fn purge_expired(&mut self, now: SystemTime) -> usize {
        let before = self.map.len();
        self.map.retain(|_, r| !r.expiry.is_expired(now));
        before - self.map.len()
    }

    /// Finds the rule that applies to `candidate`.
    ///
    /// An exact rule always wins. Otherwise the wildcard with the longest
    /// domain covering the candidate is chosen; IPv4 literals are never
    /// matched by wildcards.
    pub fn find_match(&self, candidate: &str, now: SystemTime) -> Option<&RewriteRule> {
        let lc = normalize_host(candidate);

        if let Some(rule) = self.live(&lc, now) {
            if !rule.is_pattern_wildcard() {
                return Some(rule);
            }
        }

        if lc.parse::<Ipv4Addr>().is_ok() {
            return None;
        }

        let labels: Vec<&str> = lc.split('.').collect();
        for i in 0..labels.len() {
            let wildcard = format!("*.{}", labels[i..].join("."));

            if let Some(rule) = self.live(&wildcard, now) {
                return Some(rule);
            }
        }

        None
    }

    fn live(&self, key: &str, now: SystemTime) -> Option<&RewriteRule> {
        self.map.get(key).filter(|r| !r.expiry.is_expired(now))
    }
}
