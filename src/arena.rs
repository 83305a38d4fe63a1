use std::collections::HashMap;

use crate::db::VariantRow;

/// The unordered pair of distinct variants shown the fewest times so far.
/// Ties go to the first pair in id order. Needs at least two variants.
pub fn least_compared_pair<'a>(
    variants: &'a [VariantRow],
    counts: &HashMap<(String, String), usize>,
) -> Option<(&'a VariantRow, &'a VariantRow)> {
    let mut sorted: Vec<&VariantRow> = variants.iter().collect();
    sorted.sort_by(|a, b| a.id.cmp(&b.id));
    sorted.dedup_by(|a, b| a.id == b.id);

    let mut candidates = Vec::new();
    for (i, a) in sorted.iter().enumerate() {
        for b in &sorted[i + 1..] {
            let shown = counts
                .get(&(a.id.clone(), b.id.clone()))
                .copied()
                .unwrap_or(0);
            candidates.push((shown, *a, *b));
        }
    }

    candidates
        .into_iter()
        .min_by_key(|(shown, _, _)| *shown)
        .map(|(_, a, b)| (a, b))
}

/// Put the pair in display order; `swap` comes from a coin flip at the call site.
pub fn orient<'a>(
    pair: (&'a VariantRow, &'a VariantRow),
    swap: bool,
) -> (&'a VariantRow, &'a VariantRow) {
    if swap {
        (pair.1, pair.0)
    } else {
        pair
    }
}

// ── Tests ──
