use chrono::NaiveDateTime;

use crate::model::ReleaseRow;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenomeRecord {
    pub genome_uuid: String,
    pub created: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrganismRecord {
    pub organism_uuid: String,
    pub taxonomy_id: u32,
    pub species_taxonomy_id: Option<u32>,
    pub ensembl_name: String,
    pub url_name: Option<String>,
    pub display_name: Option<String>,
    pub common_name: Option<String>,
    pub scientific_name: Option<String>,
    pub strain: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssemblyRecord {
    pub assembly_uuid: String,
    pub accession: String,
    pub name: String,
    pub ucsc_name: Option<String>,
    pub level: Option<String>,
}

/// Organism group membership, only joined for sub-species lookups
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrganismGroupRecord {
    pub group_type: String,
    pub name: String,
}

/// One joined genome row: genome, organism, assembly and (if any) the release it belongs to
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenomeRow {
    pub genome: GenomeRecord,
    pub organism: OrganismRecord,
    pub assembly: AssemblyRecord,
    pub release: Option<ReleaseRow>,
    pub is_current: bool,
    pub organism_group: Option<OrganismGroupRecord>,
}

impl GenomeRow {
    /// Release version of the row; unreleased rows sort below every release
    pub fn release_version(&self) -> Option<u32> {
        self.release.as_ref().map(|release| release.version)
    }
}

/// Names recorded for one taxon in the NCBI taxonomy store
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaxonomyNames {
    pub scientific_name: Option<String>,
    pub genbank_common_name: Option<String>,
    pub synonyms: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrganismGroupCountRow {
    pub species_taxonomy_id: u32,
    pub ensembl_name: String,
    pub common_name: Option<String>,
    pub scientific_name: Option<String>,
    pub count: i64,
}
