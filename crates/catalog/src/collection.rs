use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use merchkit_core::{CollectionId, DomainError, DomainResult};

use crate::rule::Rule;

/// Presentation sort mode for a collection's members.
///
/// Serialized keys match the storage-boundary choice strings.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortOrder {
    #[serde(rename = "manual")]
    Manual,
    #[serde(rename = "best-selling")]
    BestSelling,
    #[serde(rename = "alpha-asc")]
    AlphaAsc,
    #[serde(rename = "alpha-desc")]
    AlphaDesc,
    #[serde(rename = "price-asc")]
    PriceAsc,
    #[serde(rename = "price-desc")]
    PriceDesc,
    #[serde(rename = "created")]
    Created,
    #[serde(rename = "created-descending")]
    CreatedDesc,
}

impl Default for SortOrder {
    fn default() -> Self {
        SortOrder::Manual
    }
}

/// A collection definition: rule-driven ("smart") when it has rules,
/// manual (curated) when it has none.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collection {
    pub id: CollectionId,
    pub title: String,
    pub handle: String,
    /// false = all rules must match (AND), true = any rule matches (OR).
    pub disjunctive: bool,
    rules: Vec<Rule>,
    pub sort_order: SortOrder,
    pub published: bool,
    pub published_at: Option<DateTime<Utc>>,
}

impl Collection {
    /// Build a collection, enforcing the duplicate-rule invariant and
    /// keeping rules ordered by position.
    pub fn new(
        id: CollectionId,
        title: impl Into<String>,
        disjunctive: bool,
        rules: Vec<Rule>,
    ) -> DomainResult<Self> {
        let title = title.into();
        let handle = crate::product::handle_from_title(&title);
        let rules = validated_rules(rules)?;
        Ok(Self {
            id,
            title,
            handle,
            disjunctive,
            rules,
            sort_order: SortOrder::default(),
            published: true,
            published_at: None,
        })
    }

    /// Manual collection: zero rules, membership is explicit curation only.
    pub fn manual(id: CollectionId, title: impl Into<String>) -> Self {
        // Empty rule sets cannot violate the duplicate invariant.
        Self::new(id, title, false, Vec::new()).expect("empty rule set is always valid")
    }

    pub fn with_sort_order(mut self, sort_order: SortOrder) -> Self {
        self.sort_order = sort_order;
        self
    }

    pub fn with_published(mut self, published: bool, published_at: Option<DateTime<Utc>>) -> Self {
        self.published = published;
        self.published_at = published_at;
        self
    }

    /// Rules in evaluation order (ascending position).
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// A collection with zero rules is manual: recomputation never touches it.
    pub fn is_manual(&self) -> bool {
        self.rules.is_empty()
    }

    /// Replace the rule set (rule CRUD is externally driven; the caller is
    /// expected to emit a rules-changed event afterwards).
    pub fn set_rules(&mut self, rules: Vec<Rule>) -> DomainResult<()> {
        self.rules = validated_rules(rules)?;
        Ok(())
    }
}

fn validated_rules(mut rules: Vec<Rule>) -> DomainResult<Vec<Rule>> {
    let mut seen = HashSet::new();
    for rule in &rules {
        if !seen.insert(rule.identity()) {
            return Err(DomainError::conflict(format!("duplicate rule: {rule}")));
        }
    }
    rules.sort_by_key(|r| r.position);
    Ok(rules)
}
