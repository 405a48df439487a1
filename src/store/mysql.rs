use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Context, Result};
use async_stream::try_stream;
use futures::{Stream, TryStreamExt};
use sqlx::mysql::{MySqlPoolOptions, MySqlRow};
use sqlx::{MySql, MySqlPool, QueryBuilder, Row};

use crate::config::{AppConfig, DatabaseConfig};
use crate::model::{
    AssemblyRecord, AssemblySequenceRecord, AttributeRecord, DatasetFilter, DatasetRow, GenomeFilter,
    GenomeRecord, GenomeReleaseFilter, GenomeRow, KeywordFilter, OrganismGroupCountRow, OrganismGroupRecord,
    OrganismRecord, ReleaseFilter, ReleaseRow, SequenceFilter, SequenceRow, SiteRecord,
    TaxonomyNames,
};
use crate::store::traits::{MetadataStore, RowStream};

const GENOME_COLUMNS: &str = r#"
    SELECT g.genome_uuid, g.created,
           o.organism_uuid,
           CAST(o.taxonomy_id AS UNSIGNED) AS taxonomy_id,
           CAST(o.species_taxonomy_id AS UNSIGNED) AS species_taxonomy_id,
           o.ensembl_name, o.url_name, o.display_name, o.common_name, o.scientific_name, o.strain,
           a.assembly_uuid, a.accession AS assembly_accession, a.name AS assembly_name,
           a.ucsc_name, a.level AS assembly_level,
           CAST(r.version AS UNSIGNED) AS release_version, r.release_date,
           r.label AS release_label, r.is_current AS release_is_current,
           s.name AS site_name, s.label AS site_label, s.uri AS site_uri,
           gr.is_current AS genome_is_current"#;

const GENOME_JOINS: &str = r#"
    FROM genome g
    JOIN organism o ON o.organism_id = g.organism_id
    JOIN assembly a ON a.assembly_id = g.assembly_id
    LEFT JOIN genome_release gr ON gr.genome_id = g.genome_id
    LEFT JOIN ensembl_release r ON r.release_id = gr.release_id
    LEFT JOIN ensembl_site s ON s.site_id = r.site_id"#;

const RELEASE_COLUMNS: &str = r#"
    SELECT CAST(r.version AS UNSIGNED) AS release_version, r.release_date,
           r.label AS release_label, r.is_current AS release_is_current,
           s.name AS site_name, s.label AS site_label, s.uri AS site_uri"#;

/// MySQL backed store over the genome metadata and NCBI taxonomy schemas
#[derive(Debug, Clone)]
pub struct MySqlStore {
    metadata: MySqlPool,
    taxonomy: MySqlPool,
}

impl MySqlStore {
    /// Create both connection pools from the database configuration
    pub async fn new(config: &AppConfig) -> Result<Self> {
        let database = &config.database;

        let metadata = pool_options(database)
            .connect(&database.metadata_uri)
            .await
            .context("Failed to create metadata connection pool")?;

        let taxonomy = pool_options(database)
            .connect(&database.taxonomy_uri)
            .await
            .context("Failed to create taxonomy connection pool")?;

        Ok(Self { metadata, taxonomy })
    }
}

fn pool_options(database: &DatabaseConfig) -> MySqlPoolOptions {
    MySqlPoolOptions::new()
        .max_connections(database.max_connections())
        .max_lifetime(Duration::from_secs(database.pool_recycle))
}

/// Stream rows of a query built per subscription. The query and the pool handle
/// live inside the stream, so dropping it closes the cursor.
fn stream_rows<T, B, M>(pool: MySqlPool, build: B, map: M, what: &'static str) -> RowStream<T>
where
    T: Send + 'static,
    B: FnOnce() -> QueryBuilder<'static, MySql> + Send + 'static,
    M: Fn(&MySqlRow) -> Result<T> + Send + Sync + 'static,
{
    boxed(try_stream! {
        let mut query = build();
        let mut rows = query.build().fetch(&pool);
        while let Some(row) = rows.try_next().await.with_context(|| format!("Failed to fetch {what}"))? {
            yield map(&row)?;
        }
    })
}

fn boxed<T, S>(stream: S) -> RowStream<T>
where
    S: Stream<Item = Result<T>> + Send + 'static,
{
    Box::pin(stream)
}

pub(crate) fn genome_query(filter: &GenomeFilter) -> QueryBuilder<'static, MySql> {
    let with_groups = filter.organism_uuid.is_some();

    let mut query = QueryBuilder::new(GENOME_COLUMNS);
    if with_groups {
        query.push(", og.type AS group_type, og.name AS group_name");
    } else {
        query.push(", NULL AS group_type, NULL AS group_name");
    }
    query.push(GENOME_JOINS);
    if with_groups {
        query.push(
            " LEFT JOIN organism_group_member ogm ON ogm.organism_id = o.organism_id \
             LEFT JOIN organism_group og ON og.organism_group_id = ogm.organism_group_id",
        );
    }
    query.push(" WHERE 1 = 1");

    if let Some(genome_uuid) = &filter.genome_uuid {
        query.push(" AND g.genome_uuid = ").push_bind(genome_uuid.clone());
    }
    if let Some(ensembl_name) = &filter.ensembl_name {
        query.push(" AND o.ensembl_name = ").push_bind(ensembl_name.clone());
    }
    if let Some(accession) = &filter.assembly_accession {
        query.push(" AND a.accession = ").push_bind(accession.clone());
    }
    if let Some(assembly_name) = &filter.assembly_name {
        query.push(" AND a.name = ").push_bind(assembly_name.clone());
    }
    if let Some(organism_uuid) = &filter.organism_uuid {
        query.push(" AND o.organism_uuid = ").push_bind(organism_uuid.clone());
    }
    if let Some(site_name) = &filter.site_name {
        query.push(" AND s.name = ").push_bind(site_name.clone());
    }

    // one row per genome: the requested release, else its current one
    match filter.release_version {
        Some(version) => {
            query.push(" AND r.version = ").push_bind(version);
        }
        None if filter.allow_unreleased => {
            query.push(" AND (gr.is_current = 1 OR gr.genome_release_id IS NULL)");
        }
        None => {
            query.push(" AND gr.is_current = 1");
        }
    }

    query.push(" ORDER BY a.accession, r.version");
    query
}

pub(crate) fn keyword_query(filter: &KeywordFilter) -> QueryBuilder<'static, MySql> {
    let mut query = QueryBuilder::new(GENOME_COLUMNS);
    query.push(", NULL AS group_type, NULL AS group_name");
    query.push(GENOME_JOINS);
    query.push(" WHERE (");

    let mut matches = query.separated(" OR ");
    for column in [
        "g.genome_uuid",
        "a.accession",
        "a.name",
        "a.ucsc_name",
        "o.ensembl_name",
        "o.display_name",
        "o.common_name",
        "o.scientific_name",
        "CAST(o.taxonomy_id AS CHAR)",
    ] {
        matches.push(column);
        matches.push_unseparated(" = ");
        matches.push_bind_unseparated(filter.keyword.clone());
    }
    query.push(")");

    if let Some(version) = filter.release_version {
        query.push(" AND r.version <= ").push_bind(version);
    }
    if !filter.allow_unreleased {
        query.push(" AND r.release_id IS NOT NULL");
    }

    // grouping by accession downstream relies on this order
    query.push(" ORDER BY a.accession, r.version");
    query
}

pub(crate) fn sequence_query(filter: &SequenceFilter) -> QueryBuilder<'static, MySql> {
    let mut query = QueryBuilder::new(
        r#"
    SELECT a.assembly_uuid, a.accession AS assembly_accession, a.name AS assembly_name,
           a.level AS assembly_level,
           s.accession, s.name, s.sequence_location,
           CAST(s.length AS UNSIGNED) AS length, s.chromosomal
    FROM assembly a
    JOIN assembly_sequence s ON s.assembly_id = a.assembly_id"#,
    );
    if filter.genome_uuid.is_some() {
        query.push(" JOIN genome g ON g.assembly_id = a.assembly_id");
    }
    query.push(" WHERE 1 = 1");

    if let Some(genome_uuid) = &filter.genome_uuid {
        query.push(" AND g.genome_uuid = ").push_bind(genome_uuid.clone());
    }
    if let Some(assembly_uuid) = &filter.assembly_uuid {
        query.push(" AND a.assembly_uuid = ").push_bind(assembly_uuid.clone());
    }
    if filter.chromosomal_only {
        query.push(" AND s.chromosomal = 1");
    }
    if !filter.allow_unreleased {
        if filter.genome_uuid.is_some() {
            query.push(" AND EXISTS (SELECT 1 FROM genome_release gr WHERE gr.genome_id = g.genome_id)");
        } else {
            query.push(
                " AND EXISTS (SELECT 1 FROM genome rg \
                 JOIN genome_release rgr ON rgr.genome_id = rg.genome_id \
                 WHERE rg.assembly_id = a.assembly_id)",
            );
        }
    }

    query.push(" ORDER BY s.assembly_sequence_id");
    query
}

pub(crate) fn dataset_query(filter: &DatasetFilter) -> QueryBuilder<'static, MySql> {
    let mut query = QueryBuilder::new(
        r#"
    SELECT d.dataset_uuid, d.name AS dataset_name, d.version AS dataset_version,
           d.label AS dataset_label, dt.name AS dataset_type,
           at.name AS attribute_name, at.label AS attribute_label, at.type AS attribute_type,
           da.value, CAST(r.version AS UNSIGNED) AS release_version
    FROM genome g
    JOIN organism o ON o.organism_id = g.organism_id
    JOIN genome_dataset gd ON gd.genome_id = g.genome_id
    JOIN dataset d ON d.dataset_id = gd.dataset_id
    JOIN dataset_type dt ON dt.dataset_type_id = d.dataset_type_id
    JOIN dataset_attribute da ON da.dataset_id = d.dataset_id
    JOIN attribute at ON at.attribute_id = da.attribute_id
    LEFT JOIN ensembl_release r ON r.release_id = gd.release_id
    WHERE 1 = 1"#,
    );

    if let Some(genome_uuid) = &filter.genome_uuid {
        query.push(" AND g.genome_uuid = ").push_bind(genome_uuid.clone());
    }
    if let Some(organism_uuid) = &filter.organism_uuid {
        query.push(" AND o.organism_uuid = ").push_bind(organism_uuid.clone());
    }
    if let Some(dataset_type) = &filter.dataset_type {
        query.push(" AND dt.name = ").push_bind(dataset_type.clone());
    }
    if let Some(version) = filter.release_version {
        query.push(" AND r.version <= ").push_bind(version);
    }
    if !filter.allow_unreleased {
        query.push(" AND gd.release_id IS NOT NULL");
    }

    query.push(" ORDER BY gd.genome_dataset_id, da.dataset_attribute_id");
    query
}

pub(crate) fn release_query(filter: &ReleaseFilter) -> QueryBuilder<'static, MySql> {
    let mut query = QueryBuilder::new(RELEASE_COLUMNS);
    query.push(
        " FROM ensembl_release r \
         LEFT JOIN ensembl_site s ON s.site_id = r.site_id \
         WHERE 1 = 1",
    );

    if !filter.release_versions.is_empty() {
        query.push(" AND r.version IN (");
        let mut versions = query.separated(", ");
        for version in &filter.release_versions {
            versions.push_bind(*version);
        }
        versions.push_unseparated(")");
    }
    if !filter.site_names.is_empty() {
        query.push(" AND s.name IN (");
        let mut sites = query.separated(", ");
        for site in &filter.site_names {
            sites.push_bind(site.clone());
        }
        sites.push_unseparated(")");
    }
    if filter.current_only {
        query.push(" AND r.is_current = 1");
    }
    if !filter.allow_unreleased {
        query.push(" AND r.release_date IS NOT NULL");
    }

    query.push(" ORDER BY r.version");
    query
}

pub(crate) fn releases_for_genome_query(filter: &GenomeReleaseFilter) -> QueryBuilder<'static, MySql> {
    let mut query = QueryBuilder::new(RELEASE_COLUMNS);
    query.push(
        " FROM ensembl_release r \
         JOIN genome_release gr ON gr.release_id = r.release_id \
         JOIN genome g ON g.genome_id = gr.genome_id \
         LEFT JOIN ensembl_site s ON s.site_id = r.site_id \
         WHERE g.genome_uuid = ",
    );
    query.push_bind(filter.genome_uuid.clone());
    if !filter.allow_unreleased {
        query.push(" AND r.release_date IS NOT NULL");
    }
    query.push(" ORDER BY r.version");
    query
}

fn get_u32(row: &MySqlRow, column: &str) -> Result<u32> {
    let value: u64 = row.try_get(column)?;
    u32::try_from(value).with_context(|| format!("{column} out of range: {value}"))
}

fn get_opt_u32(row: &MySqlRow, column: &str) -> Result<Option<u32>> {
    let value: Option<u64> = row.try_get(column)?;
    value
        .map(|v| u32::try_from(v).with_context(|| format!("{column} out of range: {v}")))
        .transpose()
}

fn release_row(row: &MySqlRow) -> Result<Option<ReleaseRow>> {
    let Some(version) = get_opt_u32(row, "release_version")? else {
        return Ok(None);
    };

    let site = row
        .try_get::<Option<String>, _>("site_name")?
        .map(|name| -> Result<SiteRecord> {
            Ok(SiteRecord {
                name,
                label: row.try_get("site_label")?,
                uri: row.try_get("site_uri")?,
            })
        })
        .transpose()?;

    Ok(Some(ReleaseRow {
        version,
        release_date: row.try_get("release_date")?,
        label: row.try_get("release_label")?,
        is_current: row.try_get::<Option<bool>, _>("release_is_current")?.unwrap_or(false),
        site,
    }))
}

fn genome_row(row: &MySqlRow) -> Result<GenomeRow> {
    let organism_group = match row.try_get::<Option<String>, _>("group_type")? {
        Some(group_type) => Some(OrganismGroupRecord {
            group_type,
            name: row.try_get::<Option<String>, _>("group_name")?.unwrap_or_default(),
        }),
        None => None,
    };

    Ok(GenomeRow {
        genome: GenomeRecord {
            genome_uuid: row.try_get("genome_uuid")?,
            created: row.try_get("created")?,
        },
        organism: OrganismRecord {
            organism_uuid: row.try_get("organism_uuid")?,
            taxonomy_id: get_u32(row, "taxonomy_id")?,
            species_taxonomy_id: get_opt_u32(row, "species_taxonomy_id")?,
            ensembl_name: row.try_get("ensembl_name")?,
            url_name: row.try_get("url_name")?,
            display_name: row.try_get("display_name")?,
            common_name: row.try_get("common_name")?,
            scientific_name: row.try_get("scientific_name")?,
            strain: row.try_get("strain")?,
        },
        assembly: AssemblyRecord {
            assembly_uuid: row.try_get("assembly_uuid")?,
            accession: row.try_get("assembly_accession")?,
            name: row.try_get("assembly_name")?,
            ucsc_name: row.try_get("ucsc_name")?,
            level: row.try_get("assembly_level")?,
        },
        release: release_row(row)?,
        is_current: row.try_get::<Option<bool>, _>("genome_is_current")?.unwrap_or(false),
        organism_group,
    })
}

fn sequence_row(row: &MySqlRow) -> Result<SequenceRow> {
    Ok(SequenceRow {
        assembly_uuid: row.try_get("assembly_uuid")?,
        assembly_accession: row.try_get("assembly_accession")?,
        assembly_name: row.try_get("assembly_name")?,
        assembly_level: row.try_get("assembly_level")?,
        sequence: AssemblySequenceRecord {
            accession: row.try_get("accession")?,
            name: row.try_get("name")?,
            sequence_location: row.try_get("sequence_location")?,
            length: row.try_get("length")?,
            chromosomal: row.try_get("chromosomal")?,
        },
    })
}

fn dataset_row(row: &MySqlRow) -> Result<DatasetRow> {
    Ok(DatasetRow {
        dataset_uuid: row.try_get("dataset_uuid")?,
        dataset_name: row.try_get("dataset_name")?,
        dataset_version: row.try_get("dataset_version")?,
        dataset_label: row.try_get("dataset_label")?,
        dataset_type: row.try_get("dataset_type")?,
        attribute: AttributeRecord {
            name: row.try_get("attribute_name")?,
            label: row.try_get("attribute_label")?,
            attribute_type: row.try_get("attribute_type")?,
        },
        value: row.try_get::<Option<String>, _>("value")?.unwrap_or_default(),
        release_version: get_opt_u32(row, "release_version")?,
    })
}

fn required_release_row(row: &MySqlRow) -> Result<ReleaseRow> {
    release_row(row)?.context("Release row without a version")
}

#[async_trait::async_trait]
impl MetadataStore for MySqlStore {
    fn fetch_genomes(&self, filter: GenomeFilter) -> RowStream<GenomeRow> {
        stream_rows(self.metadata.clone(), move || genome_query(&filter), genome_row, "genomes")
    }

    fn fetch_genome_by_keyword(&self, filter: KeywordFilter) -> RowStream<GenomeRow> {
        stream_rows(self.metadata.clone(), move || keyword_query(&filter), genome_row, "genomes by keyword")
    }

    fn fetch_sequences(&self, filter: SequenceFilter) -> RowStream<SequenceRow> {
        stream_rows(self.metadata.clone(), move || sequence_query(&filter), sequence_row, "sequences")
    }

    fn fetch_genome_datasets(&self, filter: DatasetFilter) -> RowStream<DatasetRow> {
        stream_rows(self.metadata.clone(), move || dataset_query(&filter), dataset_row, "genome datasets")
    }

    fn fetch_releases(&self, filter: ReleaseFilter) -> RowStream<ReleaseRow> {
        stream_rows(self.metadata.clone(), move || release_query(&filter), required_release_row, "releases")
    }

    fn fetch_releases_for_genome(&self, filter: GenomeReleaseFilter) -> RowStream<ReleaseRow> {
        stream_rows(
            self.metadata.clone(),
            move || releases_for_genome_query(&filter),
            required_release_row,
            "releases for genome",
        )
    }

    async fn fetch_taxonomy_names(&self, taxonomy_ids: &[u32]) -> Result<HashMap<u32, TaxonomyNames>> {
        let mut names: HashMap<u32, TaxonomyNames> = HashMap::new();
        if taxonomy_ids.is_empty() {
            return Ok(names);
        }

        let mut query = QueryBuilder::<MySql>::new(
            "SELECT CAST(taxon_id AS UNSIGNED) AS taxon_id, name, name_class \
             FROM ncbi_taxa_name \
             WHERE name_class IN ('scientific name', 'genbank common name', 'synonym') \
             AND taxon_id IN (",
        );
        let mut ids = query.separated(", ");
        for id in taxonomy_ids {
            ids.push_bind(*id);
        }
        ids.push_unseparated(")");
        query.push(" ORDER BY taxon_id, name");

        let rows = query
            .build()
            .fetch_all(&self.taxonomy)
            .await
            .context("Failed to fetch taxonomy names")?;

        for row in rows {
            let taxon_id = get_u32(&row, "taxon_id")?;
            let name: String = row.try_get("name")?;
            let name_class: String = row.try_get("name_class")?;

            let entry = names.entry(taxon_id).or_default();
            match name_class.as_str() {
                "scientific name" => entry.scientific_name = Some(name),
                "genbank common name" => entry.genbank_common_name = Some(name),
                _ => entry.synonyms.push(name),
            }
        }

        Ok(names)
    }

    async fn fetch_organisms_group_counts(
        &self,
        release_version: Option<u32>,
        allow_unreleased: bool,
    ) -> Result<Vec<OrganismGroupCountRow>> {
        let mut query = QueryBuilder::<MySql>::new(
            r#"
    SELECT CAST(o.species_taxonomy_id AS UNSIGNED) AS species_taxonomy_id,
           MIN(o.ensembl_name) AS ensembl_name,
           MIN(o.common_name) AS common_name,
           MIN(o.scientific_name) AS scientific_name,
           COUNT(DISTINCT g.genome_id) AS genome_count
    FROM organism o
    JOIN genome g ON g.organism_id = o.organism_id
    LEFT JOIN genome_release gr ON gr.genome_id = g.genome_id
    LEFT JOIN ensembl_release r ON r.release_id = gr.release_id
    WHERE o.species_taxonomy_id IS NOT NULL"#,
        );
        if let Some(version) = release_version {
            query.push(" AND r.version <= ").push_bind(version);
        }
        if !allow_unreleased {
            query.push(" AND gr.genome_release_id IS NOT NULL");
        }
        query.push(" GROUP BY o.species_taxonomy_id ORDER BY genome_count DESC, species_taxonomy_id");

        let rows = query
            .build()
            .fetch_all(&self.metadata)
            .await
            .context("Failed to fetch organism group counts")?;

        rows.iter()
            .map(|row| -> Result<OrganismGroupCountRow> {
                Ok(OrganismGroupCountRow {
                    species_taxonomy_id: get_u32(row, "species_taxonomy_id")?,
                    ensembl_name: row.try_get::<Option<String>, _>("ensembl_name")?.unwrap_or_default(),
                    common_name: row.try_get("common_name")?,
                    scientific_name: row.try_get("scientific_name")?,
                    count: row.try_get("genome_count")?,
                })
            })
            .collect()
    }

    async fn fetch_related_assemblies_count(&self, organism_uuid: &str, allow_unreleased: bool) -> Result<u32> {
        let mut query = QueryBuilder::<MySql>::new(
            r#"
    SELECT COUNT(DISTINCT g.assembly_id) AS related_count
    FROM organism o
    JOIN organism related ON related.species_taxonomy_id = o.species_taxonomy_id
    JOIN genome g ON g.organism_id = related.organism_id"#,
        );
        if !allow_unreleased {
            query.push(" JOIN genome_release gr ON gr.genome_id = g.genome_id");
        }
        query.push(" WHERE o.organism_uuid = ").push_bind(organism_uuid.to_string());

        let row = query
            .build()
            .fetch_one(&self.metadata)
            .await
            .context("Failed to count related assemblies")?;

        let count: i64 = row.try_get("related_count")?;
        u32::try_from(count).context("Related assembly count out of range")
    }
}
