use std::collections::HashMap;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use parking_lot::Mutex;
use tonic::{Code, Request};

use ensembl_metadata_grpc::config::AppConfig;
use ensembl_metadata_grpc::model::{
    AssemblyRecord, AssemblySequenceRecord, AttributeRecord, DatasetFilter, DatasetRow, GenomeFilter,
    GenomeRecord, GenomeReleaseFilter, GenomeRow, KeywordFilter, OrganismGroupCountRow, OrganismGroupRecord, OrganismRecord,
    ReleaseFilter, ReleaseRow, SequenceFilter, SequenceRow, SiteRecord, TaxonomyNames,
};
use ensembl_metadata_grpc::proto::{self, ensembl_metadata_server::EnsemblMetadata};
use ensembl_metadata_grpc::store::{MetadataStore, RowStream};
use ensembl_metadata_grpc::MetadataService;

// In-memory store returning canned rows and recording every fetch
#[derive(Default)]
struct StubState {
    genomes: Vec<GenomeRow>,
    keyword_genomes: Vec<GenomeRow>,
    sequences: Vec<SequenceRow>,
    datasets: Vec<DatasetRow>,
    releases: Vec<ReleaseRow>,
    taxonomy: HashMap<u32, TaxonomyNames>,
    group_counts: Vec<OrganismGroupCountRow>,
    related_assemblies: u32,
    unavailable: bool,

    calls: Vec<&'static str>,
    genome_filters: Vec<GenomeFilter>,
    keyword_filters: Vec<KeywordFilter>,
    sequence_filters: Vec<SequenceFilter>,
    dataset_filters: Vec<DatasetFilter>,
    release_filters: Vec<ReleaseFilter>,
    genome_release_filters: Vec<GenomeReleaseFilter>,
    unreleased_args: Vec<bool>,
}

#[derive(Default)]
struct StubStore {
    state: Mutex<StubState>,
}

impl StubStore {
    fn with(setup: impl FnOnce(&mut StubState)) -> Self {
        let store = StubStore::default();
        setup(&mut *store.state.lock());
        store
    }

    fn calls(&self) -> Vec<&'static str> {
        self.state.lock().calls.clone()
    }

    fn rows<T: Send + 'static>(&self, call: &'static str, rows: Vec<T>) -> RowStream<T> {
        let mut state = self.state.lock();
        state.calls.push(call);
        if state.unavailable {
            return stream::once(async { Err(anyhow::Error::from(sqlx::Error::PoolTimedOut)) }).boxed();
        }
        stream::iter(rows.into_iter().map(Ok)).boxed()
    }

    fn check(&self, call: &'static str) -> anyhow::Result<()> {
        let mut state = self.state.lock();
        state.calls.push(call);
        if state.unavailable {
            return Err(sqlx::Error::PoolTimedOut.into());
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl MetadataStore for StubStore {
    fn fetch_genomes(&self, filter: GenomeFilter) -> RowStream<GenomeRow> {
        let rows = {
            let mut state = self.state.lock();
            state.genome_filters.push(filter);
            state.genomes.clone()
        };
        self.rows("fetch_genomes", rows)
    }

    fn fetch_genome_by_keyword(&self, filter: KeywordFilter) -> RowStream<GenomeRow> {
        let rows = {
            let mut state = self.state.lock();
            state.keyword_filters.push(filter);
            state.keyword_genomes.clone()
        };
        self.rows("fetch_genome_by_keyword", rows)
    }

    fn fetch_sequences(&self, filter: SequenceFilter) -> RowStream<SequenceRow> {
        let rows = {
            let mut state = self.state.lock();
            state.sequence_filters.push(filter);
            state.sequences.clone()
        };
        self.rows("fetch_sequences", rows)
    }

    fn fetch_genome_datasets(&self, filter: DatasetFilter) -> RowStream<DatasetRow> {
        let rows = {
            let mut state = self.state.lock();
            state.dataset_filters.push(filter);
            state.datasets.clone()
        };
        self.rows("fetch_genome_datasets", rows)
    }

    fn fetch_releases(&self, filter: ReleaseFilter) -> RowStream<ReleaseRow> {
        let rows = {
            let mut state = self.state.lock();
            state.release_filters.push(filter);
            state.releases.clone()
        };
        self.rows("fetch_releases", rows)
    }

    fn fetch_releases_for_genome(&self, filter: GenomeReleaseFilter) -> RowStream<ReleaseRow> {
        let rows = {
            let mut state = self.state.lock();
            state.genome_release_filters.push(filter);
            state.releases.clone()
        };
        self.rows("fetch_releases_for_genome", rows)
    }

    async fn fetch_taxonomy_names(&self, taxonomy_ids: &[u32]) -> anyhow::Result<HashMap<u32, TaxonomyNames>> {
        self.check("fetch_taxonomy_names")?;
        let state = self.state.lock();
        Ok(taxonomy_ids
            .iter()
            .filter_map(|id| state.taxonomy.get(id).map(|names| (*id, names.clone())))
            .collect())
    }

    async fn fetch_organisms_group_counts(
        &self,
        _release_version: Option<u32>,
        allow_unreleased: bool,
    ) -> anyhow::Result<Vec<OrganismGroupCountRow>> {
        self.check("fetch_organisms_group_counts")?;
        self.state.lock().unreleased_args.push(allow_unreleased);
        Ok(self.state.lock().group_counts.clone())
    }

    async fn fetch_related_assemblies_count(&self, _organism_uuid: &str, allow_unreleased: bool) -> anyhow::Result<u32> {
        self.check("fetch_related_assemblies_count")?;
        self.state.lock().unreleased_args.push(allow_unreleased);
        Ok(self.state.lock().related_assemblies)
    }
}

fn service(store: StubStore) -> MetadataService<StubStore> {
    MetadataService::new(Arc::new(store), &AppConfig::default())
}

fn release(version: u32) -> ReleaseRow {
    ReleaseRow {
        version,
        release_date: chrono::NaiveDate::from_ymd_opt(2023, 10, 18),
        label: Some(format!("Beta Release {version}")),
        is_current: false,
        site: Some(SiteRecord {
            name: "Ensembl".to_string(),
            label: Some("Ensembl Genome Browser".to_string()),
            uri: Some("https://beta.ensembl.org".to_string()),
        }),
    }
}

fn genome(genome_uuid: &str, accession: &str, release_version: Option<u32>) -> GenomeRow {
    GenomeRow {
        genome: GenomeRecord {
            genome_uuid: genome_uuid.to_string(),
            created: None,
        },
        organism: OrganismRecord {
            organism_uuid: "organism-hs".to_string(),
            taxonomy_id: 9606,
            species_taxonomy_id: Some(9606),
            ensembl_name: "homo_sapiens".to_string(),
            url_name: Some("Homo_sapiens".to_string()),
            display_name: Some("Human".to_string()),
            common_name: Some("human".to_string()),
            scientific_name: Some("Homo sapiens".to_string()),
            strain: None,
        },
        assembly: AssemblyRecord {
            assembly_uuid: format!("assembly-{accession}"),
            accession: accession.to_string(),
            name: "GRCh38.p14".to_string(),
            ucsc_name: Some("hg38".to_string()),
            level: Some("chromosome".to_string()),
        },
        release: release_version.map(release),
        is_current: true,
        organism_group: None,
    }
}

fn dataset(dataset_type: &str, attribute: &str, value: &str) -> DatasetRow {
    DatasetRow {
        dataset_uuid: format!("dataset-{dataset_type}"),
        dataset_name: dataset_type.to_string(),
        dataset_version: Some("1.0".to_string()),
        dataset_label: Some(format!("{dataset_type} label")),
        dataset_type: dataset_type.to_string(),
        attribute: AttributeRecord {
            name: attribute.to_string(),
            label: None,
            attribute_type: Some("integer".to_string()),
        },
        value: value.to_string(),
        release_version: Some(110),
    }
}

fn sequence(name: &str, chromosomal: bool) -> SequenceRow {
    SequenceRow {
        assembly_uuid: "assembly-GCA_000001405.29".to_string(),
        assembly_accession: "GCA_000001405.29".to_string(),
        assembly_name: "GRCh38.p14".to_string(),
        assembly_level: Some("chromosome".to_string()),
        sequence: AssemblySequenceRecord {
            accession: format!("CM000{name}"),
            name: name.to_string(),
            sequence_location: Some("SO:0000738".to_string()),
            length: 248_956_422,
            chromosomal,
        },
    }
}

fn genome_request(genome_uuid: &str) -> Request<proto::GenomeUuidRequest> {
    Request::new(proto::GenomeUuidRequest {
        genome_uuid: genome_uuid.to_string(),
        release_version: 0,
    })
}

#[tokio::test]
async fn test_missing_genome_uuid_returns_empty_genome_without_store_access() {
    let service = service(StubStore::with(|s| s.genomes = vec![genome("g1", "GCA_1", Some(110))]));

    let genome = service.get_genome_by_uuid(genome_request("")).await.unwrap().into_inner();

    assert_eq!(genome.genome_uuid, "");
    assert_eq!(genome.assembly, Some(proto::Assembly::default()));
    assert_eq!(genome.taxon, Some(proto::Taxon::default()));
    assert_eq!(genome.release, Some(proto::Release::default()));
    assert!(service.store().calls().is_empty());
}

#[tokio::test]
async fn test_genome_by_uuid_combines_attributes_count_and_names() {
    let service = service(StubStore::with(|s| {
        s.genomes = vec![genome("g1", "GCA_000001405.29", Some(110))];
        s.datasets = vec![
            dataset("assembly", "assembly.contig_n50", "56413054"),
            dataset("genebuild", "genebuild.coding_genes", "20446"),
        ];
        s.related_assemblies = 3;
        s.taxonomy.insert(
            9606,
            TaxonomyNames {
                scientific_name: Some("Homo sapiens".to_string()),
                genbank_common_name: Some("human".to_string()),
                synonyms: vec!["Homo sapiens Linnaeus, 1758".to_string(), "human".to_string()],
            },
        );
    }));

    let genome = service
        .get_genome_by_uuid(genome_request("g1"))
        .await
        .unwrap()
        .into_inner();

    assert_eq!(genome.genome_uuid, "g1");
    assert_eq!(genome.ensembl_name, "homo_sapiens");
    assert_eq!(genome.related_assemblies_count, 3);
    assert_eq!(genome.attributes.len(), 2);
    assert_eq!(genome.attributes[0].name, "assembly.contig_n50");
    let taxon = genome.taxon.unwrap();
    assert_eq!(taxon.alternative_names, vec!["Homo sapiens Linnaeus, 1758", "human"]);
    assert_eq!(genome.release.unwrap().release_version, 110);
}

#[tokio::test]
async fn test_genome_without_attributes_is_still_populated() {
    let service = service(StubStore::with(|s| {
        s.genomes = vec![genome("g1", "GCA_1", Some(110))];
    }));

    let genome = service
        .get_genome_by_uuid(genome_request("g1"))
        .await
        .unwrap()
        .into_inner();

    assert_eq!(genome.genome_uuid, "g1");
    assert!(genome.attributes.is_empty());
    assert_eq!(genome.taxon.unwrap().taxonomy_id, 9606);
}

#[tokio::test]
async fn test_ambiguous_genome_lookup_returns_empty_genome() {
    let service = service(StubStore::with(|s| {
        s.genomes = vec![genome("g1", "GCA_1", Some(110)), genome("g2", "GCA_1", Some(111))];
    }));

    let genome = service
        .get_genome_by_uuid(genome_request("g1"))
        .await
        .unwrap()
        .into_inner();

    assert_eq!(genome.genome_uuid, "");
    assert_eq!(service.store().calls(), vec!["fetch_genomes"]);
}

#[tokio::test]
async fn test_species_alternative_names_are_deduplicated_and_sorted() {
    let service = service(StubStore::with(|s| {
        s.genomes = vec![genome("g1", "GCA_1", Some(110))];
        s.taxonomy.insert(
            9606,
            TaxonomyNames {
                scientific_name: None,
                genbank_common_name: Some("bar".to_string()),
                synonyms: vec!["Foo".to_string(), "bar".to_string(), "Foo".to_string()],
            },
        );
    }));

    let species = service
        .get_species_information(genome_request("g1"))
        .await
        .unwrap()
        .into_inner();

    assert_eq!(species.genome_uuid, "g1");
    assert_eq!(species.ncbi_common_name, "bar");
    assert_eq!(species.taxon_id, 9606);
    assert_eq!(species.alternative_names, vec!["Foo", "bar"]);
}

#[tokio::test]
async fn test_repeated_requests_give_equal_responses() {
    let service = service(StubStore::with(|s| {
        s.genomes = vec![genome("g1", "GCA_1", Some(110))];
    }));

    let first = service.get_species_information(genome_request("g1")).await.unwrap().into_inner();
    let second = service.get_species_information(genome_request("g1")).await.unwrap().into_inner();
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_genome_by_name_needs_only_one_input() {
    let service = service(StubStore::with(|s| {
        s.genomes = vec![genome("g1", "GCA_1", Some(110))];
    }));

    let genome = service
        .get_genome_by_name(Request::new(proto::GenomeNameRequest {
            ensembl_name: String::new(),
            site_name: "Ensembl".to_string(),
            release_version: 110,
        }))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(genome.genome_uuid, "g1");

    let filters = service.store().state.lock().genome_filters.clone();
    assert_eq!(filters[0].ensembl_name, None);
    assert_eq!(filters[0].site_name.as_deref(), Some("Ensembl"));
    assert_eq!(filters[0].release_version, Some(110));
}

#[tokio::test]
async fn test_genome_uuid_needs_both_names() {
    let service = service(StubStore::with(|s| {
        s.genomes = vec![genome("g1", "GCA_1", Some(110))];
    }));

    let missing = service
        .get_genome_uuid(Request::new(proto::GenomeInfoRequest {
            ensembl_name: "homo_sapiens".to_string(),
            assembly_name: String::new(),
        }))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(missing.genome_uuid, "");
    assert!(service.store().calls().is_empty());

    let found = service
        .get_genome_uuid(Request::new(proto::GenomeInfoRequest {
            ensembl_name: "homo_sapiens".to_string(),
            assembly_name: "GRCh38.p14".to_string(),
        }))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(found.genome_uuid, "g1");
}

#[tokio::test]
async fn test_keyword_search_keeps_most_recent_release_per_assembly() {
    let service = service(StubStore::with(|s| {
        s.keyword_genomes = vec![
            genome("a-110", "GCA_A", Some(3)),
            genome("a-112", "GCA_A", Some(5)),
            genome("b-101", "GCA_B", Some(1)),
        ];
    }));

    let genomes: Vec<_> = service
        .get_genomes_by_keyword(Request::new(proto::GenomeKeywordRequest {
            keyword: "Human".to_string(),
            release_version: 0,
        }))
        .await
        .unwrap()
        .into_inner()
        .collect()
        .await;

    let uuids: Vec<_> = genomes.into_iter().map(|g| g.unwrap().genome_uuid).collect();
    assert_eq!(uuids, vec!["a-112", "b-101"]);

    let filters = service.store().state.lock().keyword_filters.clone();
    assert_eq!(filters[0].keyword, "Human");
    assert_eq!(filters[0].release_version, None);
}

#[tokio::test]
async fn test_streams_without_input_are_empty() {
    let service = service(StubStore::with(|s| {
        s.keyword_genomes = vec![genome("g1", "GCA_1", Some(1))];
        s.genomes = vec![genome("g1", "GCA_1", Some(1))];
        s.sequences = vec![sequence("1", true)];
        s.releases = vec![release(110)];
    }));

    let keyword = service
        .get_genomes_by_keyword(Request::new(proto::GenomeKeywordRequest::default()))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(keyword.count().await, 0);

    let by_accession = service
        .get_genomes_by_assembly_accession_id(Request::new(proto::AssemblyAccessionIdRequest::default()))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(by_accession.count().await, 0);

    let sequences = service
        .get_genome_sequence(Request::new(proto::GenomeSequenceRequest::default()))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(sequences.count().await, 0);

    let releases = service.get_release_by_uuid(genome_request("")).await.unwrap().into_inner();
    assert_eq!(releases.count().await, 0);

    assert!(service.store().calls().is_empty());
}

#[tokio::test]
async fn test_genome_sequence_streams_rows_in_order() {
    let service = service(StubStore::with(|s| {
        s.sequences = vec![sequence("1", true), sequence("2", true), sequence("MT", false)];
    }));

    let sequences: Vec<_> = service
        .get_genome_sequence(Request::new(proto::GenomeSequenceRequest {
            genome_uuid: "g1".to_string(),
            chromosomal_only: true,
        }))
        .await
        .unwrap()
        .into_inner()
        .map(|s| s.unwrap().name)
        .collect()
        .await;

    assert_eq!(sequences, vec!["1", "2", "MT"]);
    let filters = service.store().state.lock().sequence_filters.clone();
    assert_eq!(filters[0].genome_uuid.as_deref(), Some("g1"));
    assert!(filters[0].chromosomal_only);
}

#[tokio::test]
async fn test_release_filters_are_forwarded() {
    let service = service(StubStore::with(|s| {
        s.releases = vec![release(110)];
    }));

    let releases: Vec<_> = service
        .get_release(Request::new(proto::ReleaseRequest {
            site_name: vec!["Ensembl".to_string()],
            release_version: vec![110],
            current_only: true,
        }))
        .await
        .unwrap()
        .into_inner()
        .collect()
        .await;

    assert_eq!(releases.len(), 1);
    let release = releases.into_iter().next().unwrap().unwrap();
    assert_eq!(release.release_version, 110);
    assert_eq!(release.release_date, "2023-10-18");
    assert_eq!(release.site_name, "Ensembl");

    let filters = service.store().state.lock().release_filters.clone();
    assert_eq!(
        filters,
        vec![ReleaseFilter {
            release_versions: vec![110],
            site_names: vec!["Ensembl".to_string()],
            current_only: true,
            allow_unreleased: false,
        }]
    );
}

#[tokio::test]
async fn test_karyotype_needs_exactly_one_sequence() {
    let service = service(StubStore::with(|s| {
        s.sequences = vec![sequence("1", true)];
    }));
    let karyotype = service
        .get_karyotype_information(genome_request("g1"))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(karyotype.genome_uuid, "g1");
    assert_eq!(karyotype.code, "1");

    let service = service_with_sequences(vec![sequence("1", true), sequence("2", true)]);
    let karyotype = service
        .get_karyotype_information(genome_request("g1"))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(karyotype, proto::Karyotype::default());
}

fn service_with_sequences(sequences: Vec<SequenceRow>) -> MetadataService<StubStore> {
    service(StubStore::with(|s| s.sequences = sequences))
}

#[tokio::test]
async fn test_assembly_information_uses_first_sequence() {
    let service = service_with_sequences(vec![sequence("1", true), sequence("2", true)]);

    let assembly = service
        .get_assembly_information(Request::new(proto::AssemblyIdRequest {
            assembly_uuid: "assembly-GCA_000001405.29".to_string(),
        }))
        .await
        .unwrap()
        .into_inner();

    assert_eq!(assembly.accession, "GCA_000001405.29");
    assert_eq!(assembly.length, 248_956_422);
    assert!(assembly.chromosomal);
}

#[tokio::test]
async fn test_sub_species_lists_distinct_groups() {
    let mut first = genome("g1", "GCA_1", Some(110));
    first.organism_group = Some(OrganismGroupRecord {
        group_type: "breeds".to_string(),
        name: "Cattle breeds".to_string(),
    });
    let mut second = genome("g2", "GCA_2", Some(110));
    second.organism_group = first.organism_group.clone();
    let service = service(StubStore::with(move |s| s.genomes = vec![first, second]));

    let sub_species = service
        .get_sub_species_information(Request::new(proto::OrganismIdRequest {
            organism_uuid: "organism-bt".to_string(),
            group: String::new(),
        }))
        .await
        .unwrap()
        .into_inner();

    assert_eq!(sub_species.organism_uuid, "organism-bt");
    assert_eq!(sub_species.species_type, vec!["breeds"]);
    assert_eq!(sub_species.species_name, vec!["Cattle breeds"]);
}

#[tokio::test]
async fn test_datasets_are_grouped_by_type_in_first_seen_order() {
    let service = service(StubStore::with(|s| {
        s.datasets = vec![
            dataset("assembly", "assembly.contig_n50", "56413054"),
            dataset("genebuild", "genebuild.coding_genes", "20446"),
            dataset("assembly", "assembly.total_length", "3099734149"),
        ];
    }));

    let datasets = service
        .get_datasets_list_by_uuid(Request::new(proto::DatasetsRequest {
            genome_uuid: "g1".to_string(),
            release_version: 0,
        }))
        .await
        .unwrap()
        .into_inner();

    assert_eq!(datasets.genome_uuid, "g1");
    let keys: Vec<_> = datasets.datasets.iter().map(|entry| entry.key.as_str()).collect();
    assert_eq!(keys, vec!["assembly", "genebuild"]);
    let assembly = datasets.datasets[0].value.as_ref().unwrap();
    assert_eq!(assembly.dataset_infos.len(), 2);
    assert_eq!(assembly.dataset_infos[1].value, "3099734149");
}

#[tokio::test]
async fn test_dataset_information_keeps_genome_without_rows() {
    let service = service(StubStore::default());

    let infos = service
        .get_dataset_information(Request::new(proto::GenomeDatatypeRequest {
            genome_uuid: "g1".to_string(),
            dataset_type: "genebuild".to_string(),
        }))
        .await
        .unwrap()
        .into_inner();

    assert_eq!(infos.genome_uuid, "g1");
    assert_eq!(infos.dataset_type, "genebuild");
    assert!(infos.dataset_infos.is_empty());

    let filters = service.store().state.lock().dataset_filters.clone();
    assert_eq!(filters[0].dataset_type.as_deref(), Some("genebuild"));
}

#[tokio::test]
async fn test_organisms_group_count_ranks_rows() {
    let service = service(StubStore::with(|s| {
        s.group_counts = vec![
            OrganismGroupCountRow {
                species_taxonomy_id: 9606,
                ensembl_name: "homo_sapiens".to_string(),
                common_name: Some("human".to_string()),
                scientific_name: Some("Homo sapiens".to_string()),
                count: 4,
            },
            OrganismGroupCountRow {
                species_taxonomy_id: 10090,
                ensembl_name: "mus_musculus".to_string(),
                common_name: None,
                scientific_name: Some("Mus musculus".to_string()),
                count: 2,
            },
        ];
    }));

    let counts = service
        .get_organisms_group_count(Request::new(proto::OrganismsGroupRequest { release_version: 110 }))
        .await
        .unwrap()
        .into_inner();

    assert_eq!(counts.release_version, 110);
    let ranks: Vec<_> = counts
        .organisms_group_count
        .iter()
        .map(|c| (c.ensembl_name.as_str(), c.order, c.count))
        .collect();
    assert_eq!(ranks, vec![("homo_sapiens", 1, 4), ("mus_musculus", 2, 2)]);
}

#[tokio::test]
async fn test_grouping_information_is_unimplemented() {
    let service = service(StubStore::default());

    let status = service
        .get_grouping_information(Request::new(proto::OrganismIdRequest::default()))
        .await
        .unwrap_err();

    assert_eq!(status.code(), Code::Unimplemented);
    assert!(service.store().calls().is_empty());
}

#[tokio::test]
async fn test_store_outage_is_reported_as_unavailable() {
    let service = service(StubStore::with(|s| s.unavailable = true));

    let status = service.get_genome_by_uuid(genome_request("g1")).await.unwrap_err();
    assert_eq!(status.code(), Code::Unavailable);

    let status = service
        .get_organisms_group_count(Request::new(proto::OrganismsGroupRequest::default()))
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::Unavailable);

    let items: Vec<_> = service
        .get_release(Request::new(proto::ReleaseRequest::default()))
        .await
        .unwrap()
        .into_inner()
        .collect()
        .await;
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].as_ref().unwrap_err().code(), Code::Unavailable);
}

/// Calls every lookup that reaches the store once
async fn exercise_every_lookup(service: &MetadataService<StubStore>) {
    service.get_genome_by_uuid(genome_request("g1")).await.unwrap();
    service.get_species_information(genome_request("g1")).await.unwrap();
    service
        .get_genome_by_name(Request::new(proto::GenomeNameRequest {
            ensembl_name: "homo_sapiens".to_string(),
            site_name: String::new(),
            release_version: 0,
        }))
        .await
        .unwrap();
    service
        .get_genome_uuid(Request::new(proto::GenomeInfoRequest {
            ensembl_name: "homo_sapiens".to_string(),
            assembly_name: "GRCh38.p14".to_string(),
        }))
        .await
        .unwrap();
    service
        .get_assembly_information(Request::new(proto::AssemblyIdRequest {
            assembly_uuid: "assembly-GCA_1".to_string(),
        }))
        .await
        .unwrap();
    let organism = || {
        Request::new(proto::OrganismIdRequest {
            organism_uuid: "organism-hs".to_string(),
            group: String::new(),
        })
    };
    service.get_sub_species_information(organism()).await.unwrap();
    service.get_top_level_statistics(organism()).await.unwrap();
    service.get_top_level_statistics_by_uuid(genome_request("g1")).await.unwrap();
    service.get_karyotype_information(genome_request("g1")).await.unwrap();
    service
        .get_dataset_information(Request::new(proto::GenomeDatatypeRequest {
            genome_uuid: "g1".to_string(),
            dataset_type: "assembly".to_string(),
        }))
        .await
        .unwrap();
    service
        .get_datasets_list_by_uuid(Request::new(proto::DatasetsRequest {
            genome_uuid: "g1".to_string(),
            release_version: 0,
        }))
        .await
        .unwrap();
    service
        .get_organisms_group_count(Request::new(proto::OrganismsGroupRequest::default()))
        .await
        .unwrap();

    let keyword = service
        .get_genomes_by_keyword(Request::new(proto::GenomeKeywordRequest {
            keyword: "human".to_string(),
            release_version: 0,
        }))
        .await
        .unwrap()
        .into_inner();
    keyword.count().await;
    let by_accession = service
        .get_genomes_by_assembly_accession_id(Request::new(proto::AssemblyAccessionIdRequest {
            assembly_accession: "GCA_1".to_string(),
            release_version: 0,
        }))
        .await
        .unwrap()
        .into_inner();
    by_accession.count().await;
    let releases = service
        .get_release(Request::new(proto::ReleaseRequest::default()))
        .await
        .unwrap()
        .into_inner();
    releases.count().await;
    let genome_releases = service.get_release_by_uuid(genome_request("g1")).await.unwrap().into_inner();
    genome_releases.count().await;
    let sequences = service
        .get_genome_sequence(Request::new(proto::GenomeSequenceRequest {
            genome_uuid: "g1".to_string(),
            chromosomal_only: false,
        }))
        .await
        .unwrap()
        .into_inner();
    sequences.count().await;
}

fn unreleased_genome_store() -> StubStore {
    StubStore::with(|s| {
        s.genomes = vec![genome("g1", "GCA_1", None)];
        s.keyword_genomes = vec![genome("g1", "GCA_1", None)];
    })
}

#[tokio::test]
async fn test_unreleased_flag_reaches_every_filter() {
    let mut config = AppConfig::default();
    config.allow_unreleased = true;
    let service = MetadataService::new(Arc::new(unreleased_genome_store()), &config);

    let genome = service
        .get_genome_by_uuid(genome_request("g1"))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(genome.genome_uuid, "g1");
    assert_eq!(genome.release, Some(proto::Release::default()));

    exercise_every_lookup(&service).await;

    let state = service.store().state.lock();
    assert!(!state.genome_filters.is_empty());
    assert!(state.genome_filters.iter().all(|f| f.allow_unreleased));
    assert!(!state.dataset_filters.is_empty());
    assert!(state.dataset_filters.iter().all(|f| f.allow_unreleased));
    assert!(!state.keyword_filters.is_empty());
    assert!(state.keyword_filters.iter().all(|f| f.allow_unreleased));
    assert!(!state.sequence_filters.is_empty());
    assert!(state.sequence_filters.iter().all(|f| f.allow_unreleased));
    assert_eq!(state.release_filters.len(), 1);
    assert!(state.release_filters[0].allow_unreleased);
    assert_eq!(
        state.genome_release_filters,
        vec![GenomeReleaseFilter {
            genome_uuid: "g1".to_string(),
            allow_unreleased: true,
        }]
    );
    assert!(!state.unreleased_args.is_empty());
    assert!(state.unreleased_args.iter().all(|flag| *flag));
}

#[tokio::test]
async fn test_unreleased_data_is_hidden_by_default() {
    let service = service(unreleased_genome_store());

    exercise_every_lookup(&service).await;

    let state = service.store().state.lock();
    assert!(state.genome_filters.iter().all(|f| !f.allow_unreleased));
    assert!(state.dataset_filters.iter().all(|f| !f.allow_unreleased));
    assert!(state.keyword_filters.iter().all(|f| !f.allow_unreleased));
    assert!(!state.sequence_filters.is_empty());
    assert!(state.sequence_filters.iter().all(|f| !f.allow_unreleased));
    assert!(state.release_filters.iter().all(|f| !f.allow_unreleased));
    assert!(!state.genome_release_filters.is_empty());
    assert!(state.genome_release_filters.iter().all(|f| !f.allow_unreleased));
    assert!(state.unreleased_args.iter().all(|flag| !*flag));
}

#[tokio::test]
async fn test_unknown_genome_skips_secondary_fetches() {
    let service = service(StubStore::default());

    let genome = service
        .get_genome_by_uuid(genome_request("missing"))
        .await
        .unwrap()
        .into_inner();

    assert_eq!(genome.genome_uuid, "");
    assert!(genome.attributes.is_empty());
    assert_eq!(genome.assembly, Some(proto::Assembly::default()));
    assert_eq!(genome.taxon, Some(proto::Taxon::default()));
    assert_eq!(genome.release, Some(proto::Release::default()));
    let calls = service.store().calls();
    assert_eq!(calls, vec!["fetch_genomes"]);
    assert!(!calls.contains(&"fetch_genome_datasets"));
    assert!(!calls.contains(&"fetch_related_assemblies_count"));
    assert!(!calls.contains(&"fetch_taxonomy_names"));
}

#[tokio::test]
async fn test_unary_lookups_without_rows_return_empty_records() {
    let service = service(StubStore::default());

    let species = service
        .get_species_information(genome_request("missing"))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(species, proto::Species::default());
    assert_eq!(service.store().calls(), vec!["fetch_genomes"]);

    let by_name = service
        .get_genome_by_name(Request::new(proto::GenomeNameRequest {
            ensembl_name: "no_such_species".to_string(),
            site_name: "Ensembl".to_string(),
            release_version: 110,
        }))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(by_name.genome_uuid, "");
    assert_eq!(by_name.assembly, Some(proto::Assembly::default()));

    let genome_uuid = service
        .get_genome_uuid(Request::new(proto::GenomeInfoRequest {
            ensembl_name: "no_such_species".to_string(),
            assembly_name: "GRCh38.p14".to_string(),
        }))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(genome_uuid, proto::GenomeUuid::default());

    let assembly = service
        .get_assembly_information(Request::new(proto::AssemblyIdRequest {
            assembly_uuid: "missing".to_string(),
        }))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(assembly, proto::AssemblyInfo::default());

    let karyotype = service
        .get_karyotype_information(genome_request("missing"))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(karyotype, proto::Karyotype::default());

    let organism = || {
        Request::new(proto::OrganismIdRequest {
            organism_uuid: "missing".to_string(),
            group: String::new(),
        })
    };
    let sub_species = service.get_sub_species_information(organism()).await.unwrap().into_inner();
    assert_eq!(sub_species, proto::SubSpecies::default());
    let statistics = service.get_top_level_statistics(organism()).await.unwrap().into_inner();
    assert_eq!(statistics, proto::TopLevelStatistics::default());

    let statistics = service
        .get_top_level_statistics_by_uuid(genome_request("missing"))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(statistics, proto::TopLevelStatisticsByUuid::default());

    let datasets = service
        .get_datasets_list_by_uuid(Request::new(proto::DatasetsRequest {
            genome_uuid: "missing".to_string(),
            release_version: 0,
        }))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(datasets, proto::Datasets::default());
}
