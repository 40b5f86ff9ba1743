//! Scan filters
//!
//! The three predicate shapes the table service evaluates while scanning a
//! table: attribute equality, membership in a candidate list, and set
//! containment.

use crate::models::{AttributeValue, Attributes};

/// Predicate applied to every item of a scan
#[derive(Debug, Clone, PartialEq)]
pub enum ScanFilter {
    /// Every item
    All,
    /// Every listed attribute equals the given value (AND)
    ///
    /// An empty map matches every item.
    Equals(Attributes),
    /// The attribute intersects the candidates (OR)
    ///
    /// A set matches when it holds any candidate, a scalar when it equals
    /// one. No candidates, no matches.
    In {
        attribute: String,
        candidates: Vec<AttributeValue>,
    },
    /// The set attribute holds the value
    Contains {
        attribute: String,
        value: AttributeValue,
    },
}

impl ScanFilter {
    /// Equality filter on a single attribute
    pub fn equals(attribute: impl Into<String>, value: AttributeValue) -> Self {
        let mut conditions = Attributes::new();
        conditions.insert(attribute.into(), value);
        ScanFilter::Equals(conditions)
    }

    /// Whether an item's attributes satisfy this filter
    pub fn matches(&self, attributes: &Attributes) -> bool {
        match self {
            ScanFilter::All => true,
            ScanFilter::Equals(conditions) => conditions
                .iter()
                .all(|(name, expected)| attributes.get(name) == Some(expected)),
            ScanFilter::In {
                attribute,
                candidates,
            } => match attributes.get(attribute) {
                Some(stored) if stored.is_set() => {
                    candidates.iter().any(|c| stored.set_contains(c))
                }
                Some(stored) => candidates.iter().any(|c| c == stored),
                None => false,
            },
            ScanFilter::Contains { attribute, value } => attributes
                .get(attribute)
                .is_some_and(|stored| stored.set_contains(value)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(pairs: &[(&str, AttributeValue)]) -> Attributes {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn tags(values: &[&str]) -> AttributeValue {
        AttributeValue::StringSet(values.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn test_equals_is_conjunction() {
        let apple = item(&[
            ("color", AttributeValue::from("red")),
            ("quantity", AttributeValue::from(20)),
        ]);

        let both = ScanFilter::Equals(item(&[
            ("color", AttributeValue::from("red")),
            ("quantity", AttributeValue::from(20)),
        ]));
        assert!(both.matches(&apple));

        let wrong_quantity = ScanFilter::Equals(item(&[
            ("color", AttributeValue::from("red")),
            ("quantity", AttributeValue::from(3)),
        ]));
        assert!(!wrong_quantity.matches(&apple));

        assert!(!ScanFilter::equals("missing", AttributeValue::from("x")).matches(&apple));
    }

    #[test]
    fn test_empty_equals_matches_everything() {
        let filter = ScanFilter::Equals(Attributes::new());
        assert!(filter.matches(&Attributes::new()));
        assert!(filter.matches(&item(&[("id", AttributeValue::from("1"))])));
    }

    #[test]
    fn test_in_intersects_sets() {
        let post = item(&[("tags", tags(&["rails", "mince"]))]);

        let filter = ScanFilter::In {
            attribute: "tags".to_string(),
            candidates: vec![AttributeValue::from("helpful"), AttributeValue::from("mince")],
        };
        assert!(filter.matches(&post));

        let miss = ScanFilter::In {
            attribute: "tags".to_string(),
            candidates: vec![AttributeValue::from("helpful")],
        };
        assert!(!miss.matches(&post));
    }

    #[test]
    fn test_in_with_no_candidates_matches_nothing() {
        let post = item(&[("tags", tags(&["new"]))]);
        let filter = ScanFilter::In {
            attribute: "tags".to_string(),
            candidates: Vec::new(),
        };
        assert!(!filter.matches(&post));
    }

    #[test]
    fn test_in_on_scalar_attribute() {
        let fruit = item(&[("color", AttributeValue::from("red"))]);
        let filter = ScanFilter::In {
            attribute: "color".to_string(),
            candidates: vec![AttributeValue::from("green"), AttributeValue::from("red")],
        };
        assert!(filter.matches(&fruit));
    }

    #[test]
    fn test_contains() {
        let post = item(&[("tags", tags(&["new", "rust"]))]);
        let filter = ScanFilter::Contains {
            attribute: "tags".to_string(),
            value: AttributeValue::from("new"),
        };
        assert!(filter.matches(&post));

        let scalar = item(&[("tags", AttributeValue::from("new"))]);
        assert!(!filter.matches(&scalar));
    }
}
