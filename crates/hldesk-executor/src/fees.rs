//! Builder fee selection.
//!
//! Fee rates come from venue configuration as strings of one or two
//! integers ("20 25", "20,25", or just "20"); the first applies to limit
//! orders, the second to market orders, and a single value covers both.
//! Rates are in tenths of a basis point, the unit the venue's builder
//! field expects.

use std::collections::HashMap;

use hldesk_core::Scope;

/// Parsed (limit, market) fee pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeePair {
    pub limit: u64,
    pub market: u64,
}

/// Per-venue fee configuration, keyed the way operators express it.
#[derive(Debug, Clone, Default)]
pub struct FeeSchedule {
    /// DEX-specific overrides, keyed by lower-case DEX name.
    pub per_dex: HashMap<String, String>,
    /// Default for any builder DEX without an override.
    pub dex_common: Option<String>,
    /// Main-venue rate.
    pub main: Option<String>,
    /// Single legacy value predating the split schedule.
    pub legacy: Option<String>,
}

/// Parse a fee string into a (limit, market) pair.
///
/// Accepts one or two non-negative integers separated by whitespace or a
/// comma. Returns `None` for anything else.
pub fn parse_fee_pair(raw: &str) -> Option<FeePair> {
    let parts: Vec<&str> = raw
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|p| !p.is_empty())
        .collect();
    match parts.as_slice() {
        [single] => {
            let fee = single.parse().ok()?;
            Some(FeePair {
                limit: fee,
                market: fee,
            })
        }
        [limit, market] => Some(FeePair {
            limit: limit.parse().ok()?,
            market: market.parse().ok()?,
        }),
        _ => None,
    }
}

/// Pick the fee for an order on `scope`.
///
/// Priority: DEX-specific override, then DEX-common default, then the
/// main-venue rate, then the legacy single value. Unparsable entries are
/// skipped rather than blocking the chain.
pub fn select_fee(schedule: &FeeSchedule, scope: &Scope, is_market: bool) -> Option<u64> {
    let mut candidates: Vec<&String> = Vec::new();
    if let Scope::Dex(name) = scope {
        if let Some(specific) = schedule.per_dex.get(&name.to_lowercase()) {
            candidates.push(specific);
        }
        if let Some(common) = &schedule.dex_common {
            candidates.push(common);
        }
    }
    if let Some(main) = &schedule.main {
        candidates.push(main);
    }
    if let Some(legacy) = &schedule.legacy {
        candidates.push(legacy);
    }

    candidates.into_iter().find_map(|raw| {
        parse_fee_pair(raw).map(|pair| if is_market { pair.market } else { pair.limit })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_space_separated_pair() {
        assert_eq!(
            parse_fee_pair("20 25"),
            Some(FeePair {
                limit: 20,
                market: 25
            })
        );
    }

    #[test]
    fn test_parse_comma_separated_pair() {
        assert_eq!(
            parse_fee_pair("20,25"),
            Some(FeePair {
                limit: 20,
                market: 25
            })
        );
    }

    #[test]
    fn test_parse_single_applies_to_both() {
        assert_eq!(
            parse_fee_pair("20"),
            Some(FeePair {
                limit: 20,
                market: 20
            })
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!(parse_fee_pair(""), None);
        assert_eq!(parse_fee_pair("a b"), None);
        assert_eq!(parse_fee_pair("1 2 3"), None);
    }

    #[test]
    fn test_dex_specific_wins_over_all_defaults() {
        let mut schedule = FeeSchedule {
            dex_common: Some("30".to_string()),
            main: Some("40".to_string()),
            legacy: Some("50".to_string()),
            ..Default::default()
        };
        schedule.per_dex.insert("xyz".to_string(), "20 25".to_string());

        let scope = Scope::Dex("xyz".to_string());
        assert_eq!(select_fee(&schedule, &scope, false), Some(20));
        assert_eq!(select_fee(&schedule, &scope, true), Some(25));
    }

    #[test]
    fn test_dex_common_covers_unlisted_dex() {
        let schedule = FeeSchedule {
            dex_common: Some("30".to_string()),
            main: Some("40".to_string()),
            ..Default::default()
        };
        let scope = Scope::Dex("abc".to_string());
        assert_eq!(select_fee(&schedule, &scope, true), Some(30));
    }

    #[test]
    fn test_main_scope_skips_dex_entries() {
        let mut schedule = FeeSchedule {
            dex_common: Some("30".to_string()),
            main: Some("40".to_string()),
            ..Default::default()
        };
        schedule.per_dex.insert("xyz".to_string(), "20".to_string());

        assert_eq!(select_fee(&schedule, &Scope::Main, false), Some(40));
    }

    #[test]
    fn test_legacy_is_last_resort() {
        let schedule = FeeSchedule {
            legacy: Some("15".to_string()),
            ..Default::default()
        };
        assert_eq!(select_fee(&schedule, &Scope::Main, true), Some(15));
        assert_eq!(
            select_fee(&schedule, &Scope::Dex("xyz".to_string()), true),
            Some(15)
        );
    }

    #[test]
    fn test_no_configuration_means_no_fee() {
        let schedule = FeeSchedule::default();
        assert_eq!(select_fee(&schedule, &Scope::Main, false), None);
    }

    #[test]
    fn test_unparsable_entry_falls_through() {
        let mut schedule = FeeSchedule {
            main: Some("40".to_string()),
            ..Default::default()
        };
        schedule.per_dex.insert("xyz".to_string(), "bogus".to_string());

        let scope = Scope::Dex("xyz".to_string());
        assert_eq!(select_fee(&schedule, &scope, false), Some(40));
    }
}
