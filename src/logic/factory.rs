//! Shapes store rows into response messages.
//!
//! Every builder is total: given no row it returns the message's empty value,
//! and composite messages carry empty nested messages rather than missing ones.
//! Nothing here touches the database; secondary data (counts, alternative names,
//! attribute rows) arrives through [`GenomeContext`] already fetched.

use crate::logic::grouping::{distinct_in_order, group_in_arrival_order};
use crate::model::{
    AssemblyRecord, DatasetRow, GenomeRow, OrganismGroupCountRow, OrganismRecord, ReleaseRow,
    SequenceRow, TaxonomyNames,
};
use crate::proto;

/// Secondary inputs folded into a [`proto::Genome`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenomeContext {
    pub attributes: Option<Vec<DatasetRow>>,
    pub related_assemblies_count: Option<u32>,
    pub alternative_names: Option<Vec<String>>,
}

const CREATED_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const RELEASE_DATE_FORMAT: &str = "%Y-%m-%d";

pub fn create_assembly(assembly: Option<&AssemblyRecord>) -> proto::Assembly {
    let Some(assembly) = assembly else {
        return proto::Assembly::default();
    };

    proto::Assembly {
        accession: assembly.accession.clone(),
        name: assembly.name.clone(),
        ucsc_name: assembly.ucsc_name.clone().unwrap_or_default(),
        level: assembly.level.clone().unwrap_or_default(),
    }
}

pub fn create_taxon(organism: Option<&OrganismRecord>, alternative_names: &[String]) -> proto::Taxon {
    let Some(organism) = organism else {
        return proto::Taxon::default();
    };

    proto::Taxon {
        taxonomy_id: organism.taxonomy_id,
        scientific_name: organism.scientific_name.clone().unwrap_or_default(),
        strain: organism.strain.clone().unwrap_or_default(),
        common_name: organism.common_name.iter().cloned().collect(),
        alternative_names: alternative_names.to_vec(),
    }
}

pub fn create_release(release: Option<&ReleaseRow>) -> proto::Release {
    let Some(release) = release else {
        return proto::Release::default();
    };
    let site = release.site.as_ref();

    proto::Release {
        release_version: release.version,
        release_date: release
            .release_date
            .map(|date| date.format(RELEASE_DATE_FORMAT).to_string())
            .unwrap_or_default(),
        release_label: release.label.clone().unwrap_or_default(),
        is_current: release.is_current,
        site_name: site.map(|s| s.name.clone()).unwrap_or_default(),
        site_label: site.and_then(|s| s.label.clone()).unwrap_or_default(),
        site_uri: site.and_then(|s| s.uri.clone()).unwrap_or_default(),
    }
}

pub fn create_genome(row: Option<&GenomeRow>, context: &GenomeContext) -> proto::Genome {
    let Some(row) = row else {
        return proto::Genome {
            assembly: Some(create_assembly(None)),
            taxon: Some(create_taxon(None, &[])),
            release: Some(create_release(None)),
            ..Default::default()
        };
    };

    let alternative_names = context.alternative_names.as_deref().unwrap_or_default();
    let attributes = context
        .attributes
        .iter()
        .flatten()
        .map(create_dataset_info)
        .collect();

    proto::Genome {
        genome_uuid: row.genome.genome_uuid.clone(),
        ensembl_name: row.organism.ensembl_name.clone(),
        url_name: row.organism.url_name.clone().unwrap_or_default(),
        display_name: row.organism.display_name.clone().unwrap_or_default(),
        is_current: row.is_current,
        assembly: Some(create_assembly(Some(&row.assembly))),
        taxon: Some(create_taxon(Some(&row.organism), alternative_names)),
        created: row
            .genome
            .created
            .map(|created| created.format(CREATED_FORMAT).to_string())
            .unwrap_or_default(),
        related_assemblies_count: context.related_assemblies_count.unwrap_or_default(),
        release: Some(create_release(row.release.as_ref())),
        attributes,
    }
}

/// Species view of a genome; `alternative_names` must already be deduplicated and sorted.
pub fn create_species(
    species: Option<(&GenomeRow, &TaxonomyNames)>,
    alternative_names: &[String],
) -> proto::Species {
    let Some((row, names)) = species else {
        return proto::Species::default();
    };

    proto::Species {
        genome_uuid: row.genome.genome_uuid.clone(),
        common_name: row.organism.common_name.clone().unwrap_or_default(),
        ncbi_common_name: names.genbank_common_name.clone().unwrap_or_default(),
        taxon_id: row.organism.taxonomy_id,
        scientific_name: row
            .organism
            .scientific_name
            .clone()
            .or_else(|| names.scientific_name.clone())
            .unwrap_or_default(),
        alternative_names: alternative_names.to_vec(),
    }
}

pub fn create_genome_uuid(row: Option<&GenomeRow>) -> proto::GenomeUuid {
    proto::GenomeUuid {
        genome_uuid: row.map(|r| r.genome.genome_uuid.clone()).unwrap_or_default(),
    }
}

pub fn create_assembly_info(row: Option<&SequenceRow>) -> proto::AssemblyInfo {
    let Some(row) = row else {
        return proto::AssemblyInfo::default();
    };

    proto::AssemblyInfo {
        assembly_uuid: row.assembly_uuid.clone(),
        accession: row.assembly_accession.clone(),
        level: row.assembly_level.clone().unwrap_or_default(),
        name: row.assembly_name.clone(),
        chromosomal: row.sequence.chromosomal,
        length: row.sequence.length,
        sequence_location: row.sequence.sequence_location.clone().unwrap_or_default(),
    }
}

pub fn create_karyotype(genome_uuid: &str, row: Option<&SequenceRow>) -> proto::Karyotype {
    let Some(row) = row else {
        return proto::Karyotype::default();
    };

    proto::Karyotype {
        genome_uuid: genome_uuid.to_string(),
        code: row.sequence.name.clone(),
        chromosomal: row.sequence.chromosomal,
        location: row.sequence.sequence_location.clone().unwrap_or_default(),
    }
}

pub fn create_genome_sequence(row: Option<&SequenceRow>) -> proto::GenomeSequence {
    let Some(row) = row else {
        return proto::GenomeSequence::default();
    };

    proto::GenomeSequence {
        accession: row.sequence.accession.clone(),
        name: row.sequence.name.clone(),
        sequence_location: row.sequence.sequence_location.clone().unwrap_or_default(),
        // u32 on the wire; longer regions saturate
        length: u32::try_from(row.sequence.length).unwrap_or(u32::MAX),
        chromosomal: row.sequence.chromosomal,
    }
}

/// Organism groups the rows belong to. No rows means no organism was found.
pub fn create_sub_species(organism_uuid: &str, rows: &[GenomeRow]) -> proto::SubSpecies {
    if rows.is_empty() {
        return proto::SubSpecies::default();
    }

    let groups: Vec<_> = rows.iter().filter_map(|r| r.organism_group.as_ref()).collect();

    proto::SubSpecies {
        organism_uuid: organism_uuid.to_string(),
        species_type: distinct_in_order(groups.iter().map(|g| g.group_type.as_str())),
        species_name: distinct_in_order(groups.iter().map(|g| g.name.as_str())),
    }
}

pub fn create_statistic(row: &DatasetRow) -> proto::Statistic {
    proto::Statistic {
        name: row.attribute.name.clone(),
        label: row.attribute.label.clone().unwrap_or_default(),
        statistic_type: row.attribute.attribute_type.clone().unwrap_or_default(),
        statistic_value: row.value.clone(),
    }
}

pub fn create_top_level_statistics(organism_uuid: &str, rows: &[DatasetRow]) -> proto::TopLevelStatistics {
    if rows.is_empty() {
        return proto::TopLevelStatistics::default();
    }

    proto::TopLevelStatistics {
        organism_uuid: organism_uuid.to_string(),
        statistics: rows.iter().map(create_statistic).collect(),
    }
}

pub fn create_top_level_statistics_by_uuid(
    genome_uuid: &str,
    rows: &[DatasetRow],
) -> proto::TopLevelStatisticsByUuid {
    if rows.is_empty() {
        return proto::TopLevelStatisticsByUuid::default();
    }

    proto::TopLevelStatisticsByUuid {
        genome_uuid: genome_uuid.to_string(),
        statistics: rows.iter().map(create_statistic).collect(),
    }
}

pub fn create_dataset_info(row: &DatasetRow) -> proto::DatasetInfo {
    proto::DatasetInfo {
        dataset_uuid: row.dataset_uuid.clone(),
        dataset_name: row.dataset_name.clone(),
        name: row.attribute.name.clone(),
        r#type: row.attribute.attribute_type.clone().unwrap_or_default(),
        dataset_version: row.dataset_version.clone().unwrap_or_default(),
        dataset_label: row.dataset_label.clone().unwrap_or_default(),
        version: row.release_version.unwrap_or_default(),
        value: row.value.clone(),
    }
}

/// Datasets of one type for a genome. A missing genome gives the empty message;
/// a known genome with no matching rows keeps its identity and an empty list.
pub fn create_dataset_infos(
    genome_uuid: Option<&str>,
    dataset_type: &str,
    rows: &[DatasetRow],
) -> proto::DatasetInfos {
    let Some(genome_uuid) = genome_uuid else {
        return proto::DatasetInfos::default();
    };

    proto::DatasetInfos {
        genome_uuid: genome_uuid.to_string(),
        dataset_type: dataset_type.to_string(),
        dataset_infos: rows.iter().map(create_dataset_info).collect(),
    }
}

/// All datasets of a genome, grouped by dataset type in first-seen order.
pub fn create_datasets(genome_uuid: &str, rows: &[DatasetRow]) -> proto::Datasets {
    if rows.is_empty() {
        return proto::Datasets::default();
    }

    let grouped = group_in_arrival_order(
        rows.iter()
            .map(|row| (row.dataset_type.as_str(), create_dataset_info(row))),
    );

    proto::Datasets {
        genome_uuid: genome_uuid.to_string(),
        datasets: grouped
            .into_iter()
            .map(|(dataset_type, dataset_infos)| proto::DatasetTypeEntry {
                key: dataset_type.to_string(),
                value: Some(proto::DatasetInfos {
                    genome_uuid: genome_uuid.to_string(),
                    dataset_type: dataset_type.to_string(),
                    dataset_infos,
                }),
            })
            .collect(),
    }
}

/// Per-species genome counts; `order` is the 1-based rank in the order rows arrive.
pub fn create_organisms_group_count(
    rows: &[OrganismGroupCountRow],
    release_version: Option<u32>,
) -> proto::OrganismsGroupCount {
    proto::OrganismsGroupCount {
        organisms_group_count: rows
            .iter()
            .zip(1..)
            .map(|(row, order)| proto::OrganismGroupCount {
                species_taxonomy_id: row.species_taxonomy_id,
                ensembl_name: row.ensembl_name.clone(),
                common_name: row.common_name.clone().unwrap_or_default(),
                scientific_name: row.scientific_name.clone().unwrap_or_default(),
                order,
                count: i32::try_from(row.count).unwrap_or(i32::MAX),
            })
            .collect(),
        release_version: release_version.unwrap_or_default(),
    }
}
