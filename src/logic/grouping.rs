use std::collections::BTreeSet;
use std::hash::Hash;

use indexmap::IndexMap;
use itertools::Itertools;

use crate::model::GenomeRow;

/// Keep the most recent release of every assembly.
///
/// Rows are grouped by *consecutive* runs of the same assembly accession, so the
/// caller must hand them over already ordered by accession: two runs of the same
/// accession separated by another accession form two groups. Within a run the row
/// with the highest release version wins; on equal versions the earliest row read
/// is kept. Unreleased rows rank below any release.
pub fn most_recent_per_assembly(rows: Vec<GenomeRow>) -> Vec<GenomeRow> {
    let runs = rows
        .into_iter()
        .chunk_by(|row| row.assembly.accession.clone());

    let most_recent: Vec<GenomeRow> = runs
        .into_iter()
        .filter_map(|(_, run)| {
            let mut run: Vec<GenomeRow> = run.collect();
            // stable, so equal versions keep their read order
            run.sort_by(|a, b| b.release_version().cmp(&a.release_version()));
            run.into_iter().next()
        })
        .collect();

    most_recent
}

/// Group values under their key, keys in first-seen order and values in arrival order.
pub fn group_in_arrival_order<K, V, I>(items: I) -> IndexMap<K, Vec<V>>
where
    K: Hash + Eq,
    I: IntoIterator<Item = (K, V)>,
{
    let mut groups: IndexMap<K, Vec<V>> = IndexMap::new();
    for (key, value) in items {
        groups.entry(key).or_default().push(value);
    }
    groups
}

/// Union of the taxon synonyms and its GenBank common name, deduplicated and sorted.
pub fn alternative_names(synonyms: &[String], genbank_common_name: Option<&str>) -> Vec<String> {
    let names: BTreeSet<&str> = synonyms
        .iter()
        .map(String::as_str)
        .chain(genbank_common_name)
        .collect();

    names.into_iter().map(str::to_string).collect()
}

/// Distinct values in first-seen order.
pub fn distinct_in_order<'a, I>(values: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    values
        .into_iter()
        .unique()
        .map(str::to_string)
        .collect()
}
