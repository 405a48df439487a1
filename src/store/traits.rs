use std::collections::HashMap;

use anyhow::Result;
use futures::stream::BoxStream;
use futures::TryStreamExt;

use crate::model::{
    DatasetFilter, DatasetRow, GenomeFilter, GenomeReleaseFilter, GenomeRow, KeywordFilter, OrganismGroupCountRow,
    ReleaseFilter, ReleaseRow, SequenceFilter, SequenceRow, TaxonomyNames,
};

/// Rows of a multi-row fetch. The stream owns its connection and keeps the
/// cursor open until it is exhausted or dropped.
pub type RowStream<T> = BoxStream<'static, Result<T>>;

/// Read-only access to the genome metadata and taxonomy stores
#[async_trait::async_trait]
pub trait MetadataStore: Send + Sync + 'static {
    fn fetch_genomes(&self, filter: GenomeFilter) -> RowStream<GenomeRow>;

    /// Genomes matching a keyword, ordered by assembly accession then release version
    fn fetch_genome_by_keyword(&self, filter: KeywordFilter) -> RowStream<GenomeRow>;

    fn fetch_sequences(&self, filter: SequenceFilter) -> RowStream<SequenceRow>;

    fn fetch_genome_datasets(&self, filter: DatasetFilter) -> RowStream<DatasetRow>;

    fn fetch_releases(&self, filter: ReleaseFilter) -> RowStream<ReleaseRow>;

    fn fetch_releases_for_genome(&self, filter: GenomeReleaseFilter) -> RowStream<ReleaseRow>;

    /// Names per taxonomy ID; IDs unknown to the taxonomy store are absent from the map
    async fn fetch_taxonomy_names(&self, taxonomy_ids: &[u32]) -> Result<HashMap<u32, TaxonomyNames>>;

    /// Genome counts per species, most populated species first
    async fn fetch_organisms_group_counts(
        &self,
        release_version: Option<u32>,
        allow_unreleased: bool,
    ) -> Result<Vec<OrganismGroupCountRow>>;

    /// Number of assemblies sharing the species of the given organism
    async fn fetch_related_assemblies_count(&self, organism_uuid: &str, allow_unreleased: bool) -> Result<u32>;
}

/// Drain a row stream.
pub async fn collect_rows<T>(rows: RowStream<T>) -> Result<Vec<T>> {
    rows.try_collect().await
}

/// The only row of a stream, or `None` when it yields zero or several rows.
/// Reads at most two rows.
pub async fn unique_row<T>(mut rows: RowStream<T>) -> Result<Option<T>> {
    let Some(first) = rows.try_next().await? else {
        return Ok(None);
    };
    if rows.try_next().await?.is_some() {
        return Ok(None);
    }
    Ok(Some(first))
}

/// The first row of a stream, if any.
pub async fn first_row<T>(mut rows: RowStream<T>) -> Result<Option<T>> {
    rows.try_next().await
}
