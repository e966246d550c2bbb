//! The filter-state contract as plain predicates over observed visible sets.

use std::collections::BTreeMap;

use thiserror::Error;

use crate::catalog::CatalogCard;

/// A broken filter-state invariant
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvariantViolation {
    #[error("{page}: no visible cards after load")]
    EmptyLoad { page: String },

    #[error("{filter}: no visible cards after filtering")]
    EmptyFilter { filter: String },

    #[error("{filter}: {filtered} visible cards exceeds the {initial} before filtering")]
    FilterGrew {
        filter: String,
        initial: usize,
        filtered: usize,
    },

    #[error("{filter}: visible count stayed at {initial}, expected a reduction")]
    NoReduction { filter: String, initial: usize },

    #[error("{first} ∧ {second}: {both} visible cards exceeds min({first_count}, {second_count})")]
    CombinationGrew {
        first: String,
        second: String,
        first_count: usize,
        second_count: usize,
        both: usize,
    },

    #[error("clear restored {restored} cards, baseline had {baseline}")]
    ClearCountMismatch { baseline: usize, restored: usize },

    #[error("clear restored a different set: missing {missing:?}, unexpected {unexpected:?}")]
    ClearSetMismatch {
        missing: Vec<String>,
        unexpected: Vec<String>,
    },

    #[error("{0}")]
    Expectation(String),
}

type Check = Result<(), InvariantViolation>;

/// A loaded listing shows at least one card
pub fn non_empty_load(page: &str, visible: usize) -> Check {
    if visible == 0 {
        return Err(InvariantViolation::EmptyLoad {
            page: page.to_string(),
        });
    }
    Ok(())
}

/// One filter keeps `0 < filtered <= initial`
pub fn single_filter_reduction(filter: &str, initial: usize, filtered: usize) -> Check {
    if filtered == 0 {
        return Err(InvariantViolation::EmptyFilter {
            filter: filter.to_string(),
        });
    }
    if filtered > initial {
        return Err(InvariantViolation::FilterGrew {
            filter: filter.to_string(),
            initial,
            filtered,
        });
    }
    Ok(())
}

/// `filtered < initial`, for checks that need a filter with a visible effect
pub fn strictly_reduces(filter: &str, initial: usize, filtered: usize) -> Check {
    if filtered > initial {
        return Err(InvariantViolation::FilterGrew {
            filter: filter.to_string(),
            initial,
            filtered,
        });
    }
    if filtered == initial {
        return Err(InvariantViolation::NoReduction {
            filter: filter.to_string(),
            initial,
        });
    }
    Ok(())
}

/// Two independent facets combine as AND: `both <= min(first, second)`
pub fn and_combination(
    (first, first_count): (&str, usize),
    (second, second_count): (&str, usize),
    both: usize,
) -> Check {
    if both > first_count.min(second_count) {
        return Err(InvariantViolation::CombinationGrew {
            first: first.to_string(),
            second: second.to_string(),
            first_count,
            second_count,
            both,
        });
    }
    Ok(())
}

fn name_counts(cards: &[CatalogCard]) -> BTreeMap<&str, usize> {
    let mut counts = BTreeMap::new();
    for card in cards {
        *counts.entry(card.name.as_str()).or_insert(0) += 1;
    }
    counts
}

/// After clearing, the visible set matches the baseline in size and membership
pub fn clear_restores(baseline: &[CatalogCard], restored: &[CatalogCard]) -> Check {
    if baseline.len() != restored.len() {
        return Err(InvariantViolation::ClearCountMismatch {
            baseline: baseline.len(),
            restored: restored.len(),
        });
    }

    let before = name_counts(baseline);
    let after = name_counts(restored);
    if before == after {
        return Ok(());
    }

    let short = |a: &BTreeMap<&str, usize>, b: &BTreeMap<&str, usize>| -> Vec<String> {
        a.iter()
            .filter(|(name, n)| b.get(*name).copied().unwrap_or(0) < **n)
            .map(|(name, _)| name.to_string())
            .collect()
    };
    Err(InvariantViolation::ClearSetMismatch {
        missing: short(&before, &after),
        unexpected: short(&after, &before),
    })
}

/// Fail with `message` unless `condition` holds
pub fn expect(condition: bool, message: impl FnOnce() -> String) -> Check {
    if condition {
        Ok(())
    } else {
        Err(InvariantViolation::Expectation(message()))
    }
}
