//! Rule set evaluator: combines a collection's rules into one verdict.
//!
//! Zero rules never match (a zero-rule collection is manual and handled
//! outside this evaluator). Conjunctive collections require every rule,
//! disjunctive collections require any rule. Predicates are pure, so
//! short-circuiting cannot change the verdict.

use merchkit_catalog::{Collection, Product};

use crate::predicate::{self, MalformedCondition};

/// Membership verdict for one product against one collection.
pub fn matches(product: &Product, collection: &Collection) -> bool {
    matches_reporting(product, collection, &mut Vec::new())
}

/// Membership verdict, collecting malformed conditions along the way.
///
/// Rules past a short-circuit point are not evaluated, so their conditions
/// are not inspected; the verdict itself is unaffected either way.
pub fn matches_reporting(
    product: &Product,
    collection: &Collection,
    issues: &mut Vec<MalformedCondition>,
) -> bool {
    let rules = collection.rules();
    if rules.is_empty() {
        return false;
    }

    if collection.disjunctive {
        for rule in rules {
            match predicate::try_evaluate(product, rule) {
                Ok(true) => return true,
                Ok(false) => {}
                Err(issue) => issues.push(issue),
            }
        }
        false
    } else {
        for rule in rules {
            match predicate::try_evaluate(product, rule) {
                Ok(true) => {}
                Ok(false) => return false,
                Err(issue) => {
                    issues.push(issue);
                    return false;
                }
            }
        }
        true
    }
}
