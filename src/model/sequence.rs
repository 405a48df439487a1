#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssemblySequenceRecord {
    pub accession: String,
    pub name: String,
    pub sequence_location: Option<String>,
    pub length: u64,
    pub chromosomal: bool,
}

/// A sequence region joined with the assembly it belongs to
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SequenceRow {
    pub assembly_uuid: String,
    pub assembly_accession: String,
    pub assembly_name: String,
    pub assembly_level: Option<String>,
    pub sequence: AssemblySequenceRecord,
}
