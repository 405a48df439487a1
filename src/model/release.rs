use chrono::NaiveDate;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SiteRecord {
    pub name: String,
    pub label: Option<String>,
    pub uri: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReleaseRow {
    pub version: u32,
    pub release_date: Option<NaiveDate>,
    pub label: Option<String>,
    pub is_current: bool,
    pub site: Option<SiteRecord>,
}
