//! Query filters handed to the store. Every field left as `None` means
//! "do not filter on this"; `allow_unreleased` is injected by the service
//! from configuration, never taken from a request.

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenomeFilter {
    pub genome_uuid: Option<String>,
    pub ensembl_name: Option<String>,
    pub assembly_accession: Option<String>,
    pub assembly_name: Option<String>,
    pub organism_uuid: Option<String>,
    pub site_name: Option<String>,
    pub release_version: Option<u32>,
    pub allow_unreleased: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeywordFilter {
    pub keyword: String,
    pub release_version: Option<u32>,
    pub allow_unreleased: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SequenceFilter {
    pub genome_uuid: Option<String>,
    pub assembly_uuid: Option<String>,
    pub chromosomal_only: bool,
    pub allow_unreleased: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DatasetFilter {
    pub genome_uuid: Option<String>,
    pub organism_uuid: Option<String>,
    pub dataset_type: Option<String>,
    pub release_version: Option<u32>,
    pub allow_unreleased: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReleaseFilter {
    pub release_versions: Vec<u32>,
    pub site_names: Vec<String>,
    pub current_only: bool,
    pub allow_unreleased: bool,
}

/// Releases a single genome belongs to
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenomeReleaseFilter {
    pub genome_uuid: String,
    pub allow_unreleased: bool,
}
