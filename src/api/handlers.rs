//! Request handlers: validate the identifying input, run the store fetch with
//! the request filters plus the configured unreleased-data flag, then shape the
//! rows. Missing identifying input short-circuits to the empty message (or an
//! empty stream) without touching the store.

use std::sync::Arc;

use futures::stream::{self, BoxStream};
use futures::StreamExt;

use crate::config::AppConfig;
use crate::error::MetadataError;
use crate::logic::factory::{
    create_assembly_info, create_dataset_infos, create_datasets, create_genome, create_genome_sequence,
    create_genome_uuid, create_karyotype, create_organisms_group_count, create_release, create_species,
    create_sub_species, create_top_level_statistics, create_top_level_statistics_by_uuid, GenomeContext,
};
use crate::logic::grouping::{self, most_recent_per_assembly};
use crate::model::{
    DatasetFilter, GenomeFilter, GenomeReleaseFilter, KeywordFilter, ReleaseFilter, SequenceFilter, TaxonomyNames,
};
use crate::proto;
use crate::store::{collect_rows, first_row, unique_row, MetadataStore};

/// Lazily shaped records of a streaming lookup
pub type RecordStream<T> = BoxStream<'static, Result<T, MetadataError>>;

pub struct MetadataService<S> {
    store: Arc<S>,
    allow_unreleased: bool,
}

impl<S> Clone for MetadataService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            allow_unreleased: self.allow_unreleased,
        }
    }
}

/// proto3 strings have no "unset"; an empty string is an absent input
pub fn present(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

/// Release version 0 means "no release requested"
pub fn requested_release(version: u32) -> Option<u32> {
    (version != 0).then_some(version)
}

fn empty_genome() -> proto::Genome {
    create_genome(None, &GenomeContext::default())
}

impl<S: MetadataStore> MetadataService<S> {
    pub fn new(store: Arc<S>, config: &AppConfig) -> Self {
        Self {
            store,
            allow_unreleased: config.allow_unreleased,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Genome with its dataset attributes, related assembly count and alternative names
    pub async fn genome_by_uuid(
        &self,
        genome_uuid: Option<String>,
        release_version: Option<u32>,
    ) -> Result<proto::Genome, MetadataError> {
        let Some(genome_uuid) = genome_uuid else {
            return Ok(empty_genome());
        };

        let filter = GenomeFilter {
            genome_uuid: Some(genome_uuid.clone()),
            release_version,
            allow_unreleased: self.allow_unreleased,
            ..Default::default()
        };
        let Some(row) = unique_row(self.store.fetch_genomes(filter)).await? else {
            return Ok(empty_genome());
        };

        let attributes = collect_rows(self.store.fetch_genome_datasets(DatasetFilter {
            genome_uuid: Some(genome_uuid),
            release_version,
            allow_unreleased: self.allow_unreleased,
            ..Default::default()
        }))
        .await?;

        let related_assemblies_count = self
            .store
            .fetch_related_assemblies_count(&row.organism.organism_uuid, self.allow_unreleased)
            .await?;

        let taxonomy_id = row.organism.taxonomy_id;
        let taxonomy_names = self.store.fetch_taxonomy_names(&[taxonomy_id]).await?;
        let alternative_names = taxonomy_names
            .get(&taxonomy_id)
            .map(|names| grouping::alternative_names(&names.synonyms, names.genbank_common_name.as_deref()));

        let context = GenomeContext {
            attributes: Some(attributes),
            related_assemblies_count: Some(related_assemblies_count),
            alternative_names,
        };
        Ok(create_genome(Some(&row), &context))
    }

    pub async fn species_information(&self, genome_uuid: Option<String>) -> Result<proto::Species, MetadataError> {
        let Some(genome_uuid) = genome_uuid else {
            return Ok(create_species(None, &[]));
        };

        let filter = GenomeFilter {
            genome_uuid: Some(genome_uuid),
            allow_unreleased: self.allow_unreleased,
            ..Default::default()
        };
        let Some(row) = unique_row(self.store.fetch_genomes(filter)).await? else {
            return Ok(create_species(None, &[]));
        };

        let taxonomy_id = row.organism.taxonomy_id;
        let names = self
            .store
            .fetch_taxonomy_names(&[taxonomy_id])
            .await?
            .remove(&taxonomy_id)
            .unwrap_or_else(TaxonomyNames::default);
        let alternative_names =
            grouping::alternative_names(&names.synonyms, names.genbank_common_name.as_deref());

        Ok(create_species(Some((&row, &names)), &alternative_names))
    }

    /// Only short-circuits when both the Ensembl name and the site name are missing
    pub async fn genome_by_name(
        &self,
        ensembl_name: Option<String>,
        site_name: Option<String>,
        release_version: Option<u32>,
    ) -> Result<proto::Genome, MetadataError> {
        if ensembl_name.is_none() && site_name.is_none() {
            return Ok(empty_genome());
        }

        let filter = GenomeFilter {
            ensembl_name,
            site_name,
            release_version,
            allow_unreleased: self.allow_unreleased,
            ..Default::default()
        };
        let row = unique_row(self.store.fetch_genomes(filter)).await?;
        Ok(create_genome(row.as_ref(), &GenomeContext::default()))
    }

    pub async fn genome_uuid(
        &self,
        ensembl_name: Option<String>,
        assembly_name: Option<String>,
    ) -> Result<proto::GenomeUuid, MetadataError> {
        let (Some(ensembl_name), Some(assembly_name)) = (ensembl_name, assembly_name) else {
            return Ok(create_genome_uuid(None));
        };

        let filter = GenomeFilter {
            ensembl_name: Some(ensembl_name),
            assembly_name: Some(assembly_name),
            allow_unreleased: self.allow_unreleased,
            ..Default::default()
        };
        let row = unique_row(self.store.fetch_genomes(filter)).await?;
        Ok(create_genome_uuid(row.as_ref()))
    }

    /// Built from the first sequence of the assembly; any sequence carries the assembly columns
    pub async fn assembly_information(
        &self,
        assembly_uuid: Option<String>,
    ) -> Result<proto::AssemblyInfo, MetadataError> {
        let Some(assembly_uuid) = assembly_uuid else {
            return Ok(create_assembly_info(None));
        };

        let filter = SequenceFilter {
            assembly_uuid: Some(assembly_uuid),
            allow_unreleased: self.allow_unreleased,
            ..Default::default()
        };
        let row = first_row(self.store.fetch_sequences(filter)).await?;
        Ok(create_assembly_info(row.as_ref()))
    }

    pub async fn sub_species_information(
        &self,
        organism_uuid: Option<String>,
    ) -> Result<proto::SubSpecies, MetadataError> {
        let Some(organism_uuid) = organism_uuid else {
            return Ok(create_sub_species("", &[]));
        };

        let filter = GenomeFilter {
            organism_uuid: Some(organism_uuid.clone()),
            allow_unreleased: self.allow_unreleased,
            ..Default::default()
        };
        let rows = collect_rows(self.store.fetch_genomes(filter)).await?;
        Ok(create_sub_species(&organism_uuid, &rows))
    }

    pub async fn karyotype_information(
        &self,
        genome_uuid: Option<String>,
    ) -> Result<proto::Karyotype, MetadataError> {
        let Some(genome_uuid) = genome_uuid else {
            return Ok(create_karyotype("", None));
        };

        let filter = SequenceFilter {
            genome_uuid: Some(genome_uuid.clone()),
            allow_unreleased: self.allow_unreleased,
            ..Default::default()
        };
        let row = unique_row(self.store.fetch_sequences(filter)).await?;
        Ok(create_karyotype(&genome_uuid, row.as_ref()))
    }

    pub async fn top_level_statistics(
        &self,
        organism_uuid: Option<String>,
    ) -> Result<proto::TopLevelStatistics, MetadataError> {
        let Some(organism_uuid) = organism_uuid else {
            return Ok(create_top_level_statistics("", &[]));
        };

        let filter = DatasetFilter {
            organism_uuid: Some(organism_uuid.clone()),
            allow_unreleased: self.allow_unreleased,
            ..Default::default()
        };
        let rows = collect_rows(self.store.fetch_genome_datasets(filter)).await?;
        Ok(create_top_level_statistics(&organism_uuid, &rows))
    }

    pub async fn top_level_statistics_by_uuid(
        &self,
        genome_uuid: Option<String>,
    ) -> Result<proto::TopLevelStatisticsByUuid, MetadataError> {
        let Some(genome_uuid) = genome_uuid else {
            return Ok(create_top_level_statistics_by_uuid("", &[]));
        };

        let filter = DatasetFilter {
            genome_uuid: Some(genome_uuid.clone()),
            allow_unreleased: self.allow_unreleased,
            ..Default::default()
        };
        let rows = collect_rows(self.store.fetch_genome_datasets(filter)).await?;
        Ok(create_top_level_statistics_by_uuid(&genome_uuid, &rows))
    }

    pub async fn dataset_information(
        &self,
        genome_uuid: Option<String>,
        dataset_type: String,
    ) -> Result<proto::DatasetInfos, MetadataError> {
        let Some(genome_uuid) = genome_uuid else {
            return Ok(create_dataset_infos(None, "", &[]));
        };

        let filter = DatasetFilter {
            genome_uuid: Some(genome_uuid.clone()),
            dataset_type: present(dataset_type.clone()),
            allow_unreleased: self.allow_unreleased,
            ..Default::default()
        };
        let rows = collect_rows(self.store.fetch_genome_datasets(filter)).await?;
        Ok(create_dataset_infos(Some(&genome_uuid), &dataset_type, &rows))
    }

    pub async fn datasets_list(
        &self,
        genome_uuid: Option<String>,
        release_version: Option<u32>,
    ) -> Result<proto::Datasets, MetadataError> {
        let Some(genome_uuid) = genome_uuid else {
            return Ok(create_datasets("", &[]));
        };

        let filter = DatasetFilter {
            genome_uuid: Some(genome_uuid.clone()),
            release_version,
            allow_unreleased: self.allow_unreleased,
            ..Default::default()
        };
        let rows = collect_rows(self.store.fetch_genome_datasets(filter)).await?;
        Ok(create_datasets(&genome_uuid, &rows))
    }

    pub async fn organisms_group_count(
        &self,
        release_version: Option<u32>,
    ) -> Result<proto::OrganismsGroupCount, MetadataError> {
        let rows = self
            .store
            .fetch_organisms_group_counts(release_version, self.allow_unreleased)
            .await?;
        Ok(create_organisms_group_count(&rows, release_version))
    }

    /// Keyword search keeping the most recent release of each assembly.
    /// Reads every matching row before yielding the first record.
    pub async fn genomes_by_keyword(
        &self,
        keyword: Option<String>,
        release_version: Option<u32>,
    ) -> Result<RecordStream<proto::Genome>, MetadataError> {
        let Some(keyword) = keyword else {
            return Ok(stream::empty().boxed());
        };

        let filter = KeywordFilter {
            keyword,
            release_version,
            allow_unreleased: self.allow_unreleased,
        };
        let rows = collect_rows(self.store.fetch_genome_by_keyword(filter)).await?;
        let most_recent = most_recent_per_assembly(rows);

        Ok(stream::iter(most_recent)
            .map(|row| Ok(create_genome(Some(&row), &GenomeContext::default())))
            .boxed())
    }

    pub fn genomes_by_assembly_accession(
        &self,
        assembly_accession: Option<String>,
        release_version: Option<u32>,
    ) -> RecordStream<proto::Genome> {
        let Some(assembly_accession) = assembly_accession else {
            return stream::empty().boxed();
        };

        let filter = GenomeFilter {
            assembly_accession: Some(assembly_accession),
            release_version,
            allow_unreleased: self.allow_unreleased,
            ..Default::default()
        };
        self.store
            .fetch_genomes(filter)
            .map(|row| {
                row.map(|row| create_genome(Some(&row), &GenomeContext::default()))
                    .map_err(MetadataError::from)
            })
            .boxed()
    }

    /// Releases matching the filters; empty lists filter nothing
    pub fn releases(
        &self,
        site_names: Vec<String>,
        release_versions: Vec<u32>,
        current_only: bool,
    ) -> RecordStream<proto::Release> {
        let filter = ReleaseFilter {
            release_versions,
            site_names,
            current_only,
            allow_unreleased: self.allow_unreleased,
        };
        self.store
            .fetch_releases(filter)
            .map(|row| row.map(|row| create_release(Some(&row))).map_err(MetadataError::from))
            .boxed()
    }

    pub fn releases_by_uuid(&self, genome_uuid: Option<String>) -> RecordStream<proto::Release> {
        let Some(genome_uuid) = genome_uuid else {
            return stream::empty().boxed();
        };

        let filter = GenomeReleaseFilter {
            genome_uuid,
            allow_unreleased: self.allow_unreleased,
        };
        self.store
            .fetch_releases_for_genome(filter)
            .map(|row| row.map(|row| create_release(Some(&row))).map_err(MetadataError::from))
            .boxed()
    }

    pub fn genome_sequences(
        &self,
        genome_uuid: Option<String>,
        chromosomal_only: bool,
    ) -> RecordStream<proto::GenomeSequence> {
        let Some(genome_uuid) = genome_uuid else {
            return stream::empty().boxed();
        };

        let filter = SequenceFilter {
            genome_uuid: Some(genome_uuid),
            chromosomal_only,
            allow_unreleased: self.allow_unreleased,
            ..Default::default()
        };
        self.store
            .fetch_sequences(filter)
            .map(|row| {
                row.map(|row| create_genome_sequence(Some(&row)))
                    .map_err(MetadataError::from)
            })
            .boxed()
    }
}
