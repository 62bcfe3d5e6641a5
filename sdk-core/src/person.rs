//! `GetPersonInfo` response

use crate::error::{HealthVaultError, Result};
use crate::xml::Element;
use serde::Serialize;

pub const GET_PERSON_INFO_METHOD: &str = "GetPersonInfo";
pub const GET_PERSON_INFO_VERSION: u32 = 1;

/// A record the person may act on
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordInfo {
    pub id: String,
    pub display_name: Option<String>,
    pub relationship: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PersonInfo {
    pub person_id: String,
    pub name: Option<String>,
    pub selected_record_id: String,
    pub records: Vec<RecordInfo>,
}

impl PersonInfo {
    /// Both identifiers must be present; no partial result is returned
    pub fn from_response(root: &Element) -> Result<Self> {
        let missing = |what: &str| {
            HealthVaultError::protocol(
                GET_PERSON_INFO_METHOD,
                format!("response has no <{what}>"),
            )
        };
        let person_id = root.text_at(".//person-id").ok_or_else(|| missing("person-id"))?;
        let selected_record_id = root
            .text_at(".//selected-record-id")
            .ok_or_else(|| missing("selected-record-id"))?;

        let records = root
            .find(".//person-info")
            .map(|info| {
                info.find_all("record")
                    .into_iter()
                    .filter_map(|r| {
                        Some(RecordInfo {
                            id: r.attr("id")?.to_string(),
                            display_name: r.attr("display-name").map(str::to_string),
                            relationship: r.attr("rel-name").map(str::to_string),
                            name: r.text().map(str::to_string),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            person_id,
            name: root.text_at(".//person-info/name"),
            selected_record_id,
            records,
        })
    }
}
