#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributeRecord {
    pub name: String,
    pub label: Option<String>,
    pub attribute_type: Option<String>,
}

/// One dataset attribute value, flattened with its dataset and dataset type
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DatasetRow {
    pub dataset_uuid: String,
    pub dataset_name: String,
    pub dataset_version: Option<String>,
    pub dataset_label: Option<String>,
    pub dataset_type: String,
    pub attribute: AttributeRecord,
    pub value: String,
    pub release_version: Option<u32>,
}
