//! New-vs-existing classification of an extracted domain set.

use serde::Serialize;
use std::collections::HashSet;

/// Outcome of comparing extracted domains against already-known ones.
///
/// The field names follow the response contract of the service consuming
/// these reports.
#[derive(Debug, Clone, Serialize)]
pub struct ChangeReport {
    pub number_of_companies_to_add: usize,
    pub number_of_companies_to_update: usize,
    pub new_domains: Vec<String>,
    pub existing_domains: Vec<String>,
}

impl ChangeReport {
    /// Split `domains` by membership in `known`, preserving their order.
    ///
    /// Producing `known` (typically a database lookup restricted to the
    /// extracted values) is the caller's concern; this is the pure
    /// set-difference half of the contract.
    pub fn classify(domains: Vec<String>, known: &HashSet<String>) -> Self {
        let (existing, new): (Vec<_>, Vec<_>) =
            domains.into_iter().partition(|domain| known.contains(domain));

        Self {
            number_of_companies_to_add: new.len(),
            number_of_companies_to_update: existing.len(),
            new_domains: new,
            existing_domains: existing,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.new_domains.is_empty() && self.existing_domains.is_empty()
    }
}
