use serde::{Deserialize, Serialize};

/// Product attribute a rule tests against.
///
/// Closed set: unknown columns are unrepresentable, so the predicate
/// evaluator's coercion table is exhaustive at compile time.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RuleColumn {
    #[serde(rename = "title")]
    Title,
    #[serde(rename = "type")]
    ProductType,
    #[serde(rename = "vendor")]
    Vendor,
    #[serde(rename = "variant_price")]
    VariantPrice,
    #[serde(rename = "tag")]
    Tag,
    #[serde(rename = "variant_compare_at_price")]
    VariantCompareAtPrice,
    #[serde(rename = "variant_weight")]
    VariantWeight,
    #[serde(rename = "variant_inventory")]
    VariantInventory,
    #[serde(rename = "variant_title")]
    VariantTitle,
}

impl RuleColumn {
    /// Columns whose values coerce to exact decimals.
    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            RuleColumn::VariantPrice
                | RuleColumn::VariantCompareAtPrice
                | RuleColumn::VariantWeight
                | RuleColumn::VariantInventory
        )
    }
}

/// Comparison applied between a column value and a rule condition.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleRelation {
    Equals,
    NotEquals,
    GreaterThan,
    LessThan,
    StartsWith,
    EndsWith,
    Contains,
    NotContains,
}

impl RuleRelation {
    /// Relations that match when the source value is legitimately absent.
    pub fn is_negated(self) -> bool {
        matches!(self, RuleRelation::NotEquals | RuleRelation::NotContains)
    }
}

/// A single membership predicate: (column, relation, condition).
///
/// `position` orders rules within their collection for evaluation and
/// display. The condition is always authored as a string; numeric columns
/// coerce it at evaluation time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub column: RuleColumn,
    pub relation: RuleRelation,
    pub condition: String,
    pub position: u32,
}

impl Rule {
    pub fn new(column: RuleColumn, relation: RuleRelation, condition: impl Into<String>, position: u32) -> Self {
        Self {
            column,
            relation,
            condition: condition.into(),
            position,
        }
    }

    /// Identity tuple for the duplicate-rule invariant (position excluded).
    pub fn identity(&self) -> (RuleColumn, RuleRelation, &str) {
        (self.column, self.relation, self.condition.as_str())
    }
}

impl core::fmt::Display for Rule {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:?} {:?} {:?}", self.column, self.relation, self.condition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn columns_serialize_to_storage_keys() {
        let json = serde_json::to_string(&RuleColumn::VariantCompareAtPrice).unwrap();
        assert_eq!(json, "\"variant_compare_at_price\"");
        let back: RuleColumn = serde_json::from_str("\"type\"").unwrap();
        assert_eq!(back, RuleColumn::ProductType);
    }

    #[test]
    fn relations_serialize_snake_case() {
        let json = serde_json::to_string(&RuleRelation::NotContains).unwrap();
        assert_eq!(json, "\"not_contains\"");
    }

    #[test]
    fn identity_ignores_position() {
        let a = Rule::new(RuleColumn::Vendor, RuleRelation::Equals, "Acme", 0);
        let b = Rule::new(RuleColumn::Vendor, RuleRelation::Equals, "Acme", 7);
        assert_eq!(a.identity(), b.identity());
    }

    #[test]
    fn numeric_columns_are_flagged() {
        assert!(RuleColumn::VariantPrice.is_numeric());
        assert!(RuleColumn::VariantInventory.is_numeric());
        assert!(!RuleColumn::Tag.is_numeric());
        assert!(!RuleColumn::Title.is_numeric());
    }
}
