use std::{collections::HashSet, time::SystemTime};

use serde::Serialize;

use crate::{
    address_map::{AddressMap, Expiry},
    error::RewriteError,
    pattern::normalize_host,
};

/// Upper bound on hops in one walk. Wildcard targets can grow a name without
/// ever revisiting it (`*.com -> *.a.com`).
pub const MAX_REWRITES: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rewrite {
    pub changed: bool,
    pub address: String,
    pub expiry: Expiry,
}

impl Rewrite {
    fn unchanged(address: &str) -> Self {
        Self {
            changed: false,
            address: address.to_string(),
            expiry: Expiry::Never,
        }
    }
}

impl AddressMap {
    /// Follows the chain of rules starting at `address` until no rule applies.
    ///
    /// Unmapped, cyclic and runaway chains all come back unchanged.
    pub fn rewrite(&self, address: &str, now: SystemTime) -> Rewrite {
        match self.walk(address, now) {
            Ok(r) => r,
            Err(e) => {
                log::warn!("Not rewriting {}: {}", address, e);
                Rewrite::unchanged(address)
            }
        }
    }

    pub fn walk(&self, address: &str, now: SystemTime) -> Result<Rewrite, RewriteError> {
        let start = normalize_host(address);
        let mut current = start.clone();
        let mut visited = HashSet::from([start.clone()]);
        let mut expiry = Expiry::Never;
        let mut hops = 0;

        loop {
            let Some((rule, next)) = self
                .find_match(&current, now)
                .and_then(|rule| rule.apply(&current).map(|next| (rule, next)))
            else {
                break;
            };

            // A rule mapping an address onto itself ends the chain there.
            if next == current {
                expiry = expiry.min(rule.expiry());
                break;
            }

            if hops == MAX_REWRITES {
                return Err(RewriteError::TooManyRewrites(address.to_string(), MAX_REWRITES));
            }

            log::debug!("{} -> {} (MapAddress {})", current, next, rule.pattern());

            if !visited.insert(next.clone()) {
                return Err(RewriteError::Cycle(address.to_string()));
            }

            expiry = expiry.min(rule.expiry());
            current = next;
            hops += 1;
        }

        if current == start {
            return Ok(Rewrite::unchanged(address));
        }

        Ok(Rewrite {
            changed: true,
            address: current,
            expiry,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn map(directives: &[&str]) -> AddressMap {
        let mut am = AddressMap::new();
        am.load(directives.iter().copied());
        am
    }

    #[test]
    fn test_chain_resolves_to_final_value() {
        let am = map(&[
            "www.example.org 4.4.4.4",
            "4.4.4.4 7.7.7.7",
            "4.4.4.4 5.5.5.5",
        ]);

        let r = am.rewrite("www.example.org", SystemTime::now());
        assert!(r.changed);
        assert_eq!(r.address, "5.5.5.5");
        assert_eq!(r.expiry, Expiry::Never);
    }

    #[test]
    fn test_cycle_is_a_no_op() {
        let am = map(&["www.infiniteloop.org 6.6.6.6", "6.6.6.6 www.infiniteloop.org"]);
        let now = SystemTime::now();

        for start in ["www.infiniteloop.org", "6.6.6.6"] {
            assert_eq!(am.walk(start, now), Err(RewriteError::Cycle(start.to_string())));

            let r = am.rewrite(start, now);
            assert!(!r.changed);
            assert_eq!(r.address, start);
        }
    }

    #[test]
    fn test_self_mapping_is_unchanged() {
        let am = map(&["loop.example loop.example"]);
        let now = SystemTime::now();

        assert!(am.walk("loop.example", now).is_ok());
        assert!(!am.rewrite("loop.example", now).changed);
    }

    #[test]
    fn test_fixed_point_ends_the_chain() {
        let am = map(&["*.cnn.com www.cnn.com", "*.cn.com www.cnn.com"]);
        let now = SystemTime::now();

        for start in ["cnn.com", "www.cn.com", "a.b.cnn.com"] {
            let r = am.walk(start, now).unwrap();
            assert!(r.changed, "{}", start);
            assert_eq!(r.address, "www.cnn.com");
        }
        assert!(!am.rewrite("www.cnn.com", now).changed);
    }

    #[test]
    fn test_runaway_wildcard_is_bounded() {
        let am = map(&["*.com *.a.com"]);
        let now = SystemTime::now();

        assert!(matches!(
            am.walk("x.com", now),
            Err(RewriteError::TooManyRewrites(_, MAX_REWRITES))
        ));
        assert_eq!(am.rewrite("x.com", now).address, "x.com");
    }

    #[test]
    fn test_unmapped_passes_through_verbatim() {
        let am = map(&["www.google.com 3.3.3.3"]);
        let r = am.rewrite("WWW.Example.com", SystemTime::now());
        assert!(!r.changed);
        assert_eq!(r.address, "WWW.Example.com");
    }

    #[test]
    fn test_candidate_is_normalized() {
        let am = map(&["www.google.com 3.3.3.3"]);
        let r = am.rewrite("WWW.GOOGLE.COM.", SystemTime::now());
        assert!(r.changed);
        assert_eq!(r.address, "3.3.3.3");
    }

    #[test]
    fn test_rewrite_serializes_for_reports() {
        let am = map(&["www.google.com 3.3.3.3"]);
        let value = serde_json::to_value(am.rewrite("www.google.com", SystemTime::now())).unwrap();

        assert_eq!(
            value,
            serde_json::json!({ "changed": true, "address": "3.3.3.3", "expiry": "Never" })
        );
    }

    #[test]
    fn test_chain_reports_earliest_expiry() {
        let now = SystemTime::now();
        let soon = now + Duration::from_secs(30);
        let later = now + Duration::from_secs(300);

        let mut am = AddressMap::new();
        am.register("a.example", "b.example", Expiry::At(later)).unwrap();
        am.register("b.example", "c.example", Expiry::At(soon)).unwrap();
        am.register("c.example", "d.example", Expiry::Never).unwrap();

        let r = am.rewrite("a.example", now);
        assert_eq!(r.address, "d.example");
        assert_eq!(r.expiry, Expiry::At(soon));
    }
}
