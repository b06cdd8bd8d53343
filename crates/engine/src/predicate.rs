//! Predicate evaluator: one rule against one product attribute.
//!
//! Pure and total. Evaluation never panics and never surfaces an error on
//! the verdict path: a condition that cannot be coerced to the column's type
//! resolves to a non-match and is reported separately as
//! [`MalformedCondition`].
//!
//! Coercion table:
//! - `title`/`type`/`vendor`/`variant_title` — string comparison; `equals`
//!   is exact, substring relations are case-insensitive
//! - `tag` — multi-valued; the rule matches if ANY tag satisfies the relation
//! - `variant_price`/`variant_compare_at_price`/`variant_weight`/
//!   `variant_inventory` — exact decimal comparison; substring relations
//!   compare canonical decimal renderings
//! - `greater_than`/`less_than` on non-numeric columns — always non-match
//! - absent source value — `not_equals`/`not_contains` match, everything
//!   else does not

use core::str::FromStr;

use merchkit_catalog::{Product, Rule, RuleColumn, RuleRelation};
use merchkit_core::Decimal;

/// A rule condition that cannot be coerced to its column's expected type.
///
/// Recorded for surfacing (recompute report, logs); the owning rule simply
/// does not match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedCondition {
    pub column: RuleColumn,
    pub condition: String,
}

impl core::fmt::Display for MalformedCondition {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "condition {:?} does not coerce for column {:?}", self.condition, self.column)
    }
}

/// Evaluate one rule against one product. Malformed conditions are folded
/// into a non-match.
pub fn evaluate(product: &Product, rule: &Rule) -> bool {
    try_evaluate(product, rule).unwrap_or(false)
}

/// Evaluate one rule, surfacing a malformed condition for reporting.
///
/// `Err` always corresponds to a non-match verdict.
pub fn try_evaluate(product: &Product, rule: &Rule) -> Result<bool, MalformedCondition> {
    match rule.column {
        RuleColumn::Title => Ok(eval_str(&product.title, rule.relation, &rule.condition)),
        RuleColumn::ProductType => Ok(eval_str(&product.product_type, rule.relation, &rule.condition)),
        RuleColumn::Vendor => Ok(eval_str(&product.vendor, rule.relation, &rule.condition)),
        RuleColumn::VariantTitle => Ok(eval_optional_str(
            product.variant_title.as_deref(),
            rule.relation,
            &rule.condition,
        )),
        RuleColumn::Tag => {
            if product.tags.is_empty() {
                return Ok(absent_matches(rule.relation));
            }
            Ok(product
                .tags
                .iter()
                .any(|tag| eval_str(tag, rule.relation, &rule.condition)))
        }
        RuleColumn::VariantPrice => eval_number(Some(product.price), rule),
        RuleColumn::VariantCompareAtPrice => eval_number(product.compare_at_price, rule),
        RuleColumn::VariantWeight => eval_number(product.weight, rule),
        RuleColumn::VariantInventory => eval_number(Some(Decimal::from_i64(product.inventory)), rule),
    }
}

/// An absent source value only satisfies negated relations.
fn absent_matches(relation: RuleRelation) -> bool {
    relation.is_negated()
}

fn eval_optional_str(value: Option<&str>, relation: RuleRelation, condition: &str) -> bool {
    match value {
        Some(v) => eval_str(v, relation, condition),
        None => absent_matches(relation),
    }
}

fn eval_str(value: &str, relation: RuleRelation, condition: &str) -> bool {
    match relation {
        RuleRelation::Equals => value == condition,
        RuleRelation::NotEquals => value != condition,
        // Ordering is undefined for strings.
        RuleRelation::GreaterThan | RuleRelation::LessThan => false,
        RuleRelation::StartsWith => value.to_lowercase().starts_with(&condition.to_lowercase()),
        RuleRelation::EndsWith => value.to_lowercase().ends_with(&condition.to_lowercase()),
        RuleRelation::Contains => value.to_lowercase().contains(&condition.to_lowercase()),
        RuleRelation::NotContains => !value.to_lowercase().contains(&condition.to_lowercase()),
    }
}

fn eval_number(value: Option<Decimal>, rule: &Rule) -> Result<bool, MalformedCondition> {
    // Coerce the condition first: a malformed condition is a non-match even
    // for negated relations (it is the rule that is broken, not the value).
    let condition = Decimal::from_str(rule.condition.trim()).map_err(|_| MalformedCondition {
        column: rule.column,
        condition: rule.condition.clone(),
    })?;

    let Some(value) = value else {
        return Ok(absent_matches(rule.relation));
    };

    Ok(match rule.relation {
        RuleRelation::Equals => value == condition,
        RuleRelation::NotEquals => value != condition,
        RuleRelation::GreaterThan => value > condition,
        RuleRelation::LessThan => value < condition,
        // Substring relations on numeric columns compare canonical renderings.
        RuleRelation::StartsWith
        | RuleRelation::EndsWith
        | RuleRelation::Contains
        | RuleRelation::NotContains => {
            eval_str(&value.to_string(), rule.relation, &condition.to_string())
        }
    })
}
