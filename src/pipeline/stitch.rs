//! Stitching: regroup per-unit outcomes into one result per original input.
//!
//! Only successful outcomes contribute. Pages of a multi-page input are
//! joined in page order (not completion order) with the configured
//! separator; a single-unit input is passed through as-is. An input with no
//! successful unit has no result.

use crate::config::PageSeparator;
use crate::model::{Outcome, Recognition, SourceResult};
use std::collections::BTreeMap;
use tracing::warn;

/// Build one optional result per original input, index-aligned with the inputs.
pub fn stitch(
    input_count: usize,
    outcomes: &[Outcome],
    separator: &PageSeparator,
) -> Vec<Option<SourceResult>> {
    let mut groups: BTreeMap<usize, Vec<(Option<usize>, &Recognition)>> = BTreeMap::new();
    for outcome in outcomes {
        let Ok(recognition) = &outcome.result else {
            continue;
        };
        if outcome.id.origin >= input_count {
            warn!(
                "{}: origin out of range for {} inputs, dropped",
                outcome.id, input_count
            );
            continue;
        }
        groups
            .entry(outcome.id.origin)
            .or_default()
            .push((outcome.id.page, recognition));
    }

    let mut results: Vec<Option<SourceResult>> = vec![None; input_count];
    for (origin, mut pages) in groups {
        results[origin] = Some(if pages.len() == 1 {
            let (_, r) = pages[0];
            SourceResult {
                text: r.text.clone(),
                images: r.images.clone(),
                metadata: r.metadata.clone(),
            }
        } else {
            // `None` sorts first; a stable sort keeps submission order for ties.
            pages.sort_by_key(|(page, _)| *page);
            join_pages(&pages, separator)
        });
    }
    results
}

fn join_pages(pages: &[(Option<usize>, &Recognition)], separator: &PageSeparator) -> SourceResult {
    let mut out = SourceResult::default();
    for (i, (page, r)) in pages.iter().enumerate() {
        if i > 0 {
            out.text.push_str(&separator.render(page.unwrap_or(i)));
        }
        out.text.push_str(&r.text);
        out.images.extend(r.images.iter().cloned());
        if out.metadata.is_empty() && !r.metadata.is_empty() {
            out.metadata = r.metadata.clone();
        }
    }
    out
}
