//! Blacklist / whitelist membership over `(chain, account, action)` triples.

use std::collections::HashSet;

use crate::config::HistConfig;
use crate::error::ConfigError;

const WILDCARD: &str = "*";

/// Inclusion/exclusion policy for actions.
///
/// Entries are stored in their `chain::account::action` string form, so a
/// membership test is two set lookups: the account wildcard, then the exact
/// action.
#[derive(Debug, Clone, Default)]
pub struct PolicyFilter {
    blacklist: HashSet<String>,
    whitelist: HashSet<String>,
}

impl PolicyFilter {
    /// Build a filter from raw entries, rejecting malformed ones.
    pub fn new<B, W>(blacklist: B, whitelist: W) -> Result<Self, ConfigError>
    where
        B: IntoIterator,
        B::Item: AsRef<str>,
        W: IntoIterator,
        W::Item: AsRef<str>,
    {
        Ok(Self {
            blacklist: parse_entries(blacklist)?,
            whitelist: parse_entries(whitelist)?,
        })
    }

    pub fn from_config(config: &HistConfig) -> Result<Self, ConfigError> {
        Self::new(&config.blacklist, &config.whitelist)
    }

    pub fn is_blacklisted(&self, chain: &str, account: &str, action: &str) -> bool {
        matches(&self.blacklist, chain, account, action)
    }

    pub fn is_whitelisted(&self, chain: &str, account: &str, action: &str) -> bool {
        matches(&self.whitelist, chain, account, action)
    }

    /// `true` when the whitelist is enforced (non-empty).
    pub fn has_whitelist(&self) -> bool {
        !self.whitelist.is_empty()
    }

    /// Blacklist first; the whitelist is consulted only when non-empty.
    pub fn accepts(&self, chain: &str, account: &str, action: &str) -> bool {
        if self.is_blacklisted(chain, account, action) {
            return false;
        }
        !self.has_whitelist() || self.is_whitelisted(chain, account, action)
    }
}

fn matches(set: &HashSet<String>, chain: &str, account: &str, action: &str) -> bool {
    if set.is_empty() {
        return false;
    }
    set.contains(&entry_key(chain, account, WILDCARD))
        || set.contains(&entry_key(chain, account, action))
}

fn entry_key(chain: &str, account: &str, action: &str) -> String {
    format!("{chain}::{account}::{action}")
}

fn parse_entries<I>(entries: I) -> Result<HashSet<String>, ConfigError>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    entries
        .into_iter()
        .map(|e| {
            let entry = e.as_ref().trim();
            let parts: Vec<&str> = entry.split("::").collect();
            if parts.len() != 3 || parts.iter().any(|p| p.is_empty()) {
                return Err(ConfigError::InvalidPolicyEntry {
                    entry: entry.to_string(),
                });
            }
            Ok(entry.to_string())
        })
        .collect()
}
