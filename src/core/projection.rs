//! Maps flattened studies onto the fixed output columns.

use crate::domain::model::{FlatRecord, ProjectedRow};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMapping {
    /// Dotted path in the flattened record.
    pub source: String,
    /// Column header in the output sheet.
    pub name: String,
}

impl ColumnMapping {
    pub fn new(source: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            name: name.into(),
        }
    }
}

/// Derived column holding the registry detail page of each study.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetailLink {
    pub column: String,
    pub base_url: String,
    pub identifier_path: String,
}

impl Default for DetailLink {
    fn default() -> Self {
        Self {
            column: "Trial Link".to_string(),
            base_url: "https://clinicaltrials.gov/study".to_string(),
            identifier_path: "protocolSection.identificationModule.nctId".to_string(),
        }
    }
}

pub fn default_columns() -> Vec<ColumnMapping> {
    [
        ("protocolSection.identificationModule.nctId", "Trial Registry Number (.gov)"),
        ("protocolSection.sponsorCollaboratorsModule.leadSponsor.name", "Sponsor Name"),
        ("protocolSection.sponsorCollaboratorsModule.leadSponsor.class", "Sponsor Type"),
        ("protocolSection.contactsLocationsModule.centralContacts.0.name", "Contact Person"),
        ("protocolSection.contactsLocationsModule.centralContacts.0.role", "Role"),
        ("protocolSection.contactsLocationsModule.centralContacts.0.phone", "Phone Number"),
        ("protocolSection.contactsLocationsModule.centralContacts.0.email", "Email"),
        ("protocolSection.identificationModule.briefTitle", "Trial Name"),
        ("protocolSection.identificationModule.officialTitle", "Trial/Project Title"),
        ("protocolSection.designModule.phases", "Trial Phase"),
        ("protocolSection.statusModule.overallStatus", "Trial Status"),
        ("protocolSection.conditionsModule.conditions", "Therapeutic Area/Research Category"),
        ("protocolSection.armsInterventionsModule.interventions.0.name", "Intervention/Investigational Product"),
        ("protocolSection.statusModule.startDateStruct.date", "Trial Start Date"),
        ("protocolSection.statusModule.completionDateStruct.date", "Trial End Date"),
        ("protocolSection.contactsLocationsModule.combined_locations_string", "Location"),
    ]
    .into_iter()
    .map(|(source, name)| ColumnMapping::new(source, name))
    .collect()
}

/// Left blank for whoever works through the sheet afterwards.
pub fn default_operator_columns() -> Vec<String> {
    [
        "Num.",
        "CCSN PI Previous Sponsorship History",
        "Regions with Opened Feasibility",
        "Potential Sites at CCSN?",
        "CCSN Contact Notes",
        "Additional Notes/Comments",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

#[derive(Debug, Clone)]
pub struct Projector {
    columns: Vec<ColumnMapping>,
    link: Option<DetailLink>,
    operator_columns: Vec<String>,
}

impl Projector {
    pub fn new(
        columns: Vec<ColumnMapping>,
        link: Option<DetailLink>,
        operator_columns: Vec<String>,
    ) -> Self {
        Self {
            columns,
            link,
            operator_columns,
        }
    }

    /// Mapped columns, then the link column, then operator columns.
    pub fn header(&self) -> Vec<String> {
        self.columns
            .iter()
            .map(|c| c.name.clone())
            .chain(self.link.iter().map(|l| l.column.clone()))
            .chain(self.operator_columns.iter().cloned())
            .collect()
    }

    pub fn project(&self, record: &FlatRecord) -> ProjectedRow {
        let mut row = ProjectedRow::new();

        for mapping in &self.columns {
            let value = record
                .get(&mapping.source)
                .map(|v| v.to_string())
                .unwrap_or_default();
            row.set(mapping.name.clone(), value);
        }

        if let Some(link) = &self.link {
            row.set(link.column.clone(), Self::detail_link(link, record));
        }

        for column in &self.operator_columns {
            row.set(column.clone(), String::new());
        }

        row
    }

    fn detail_link(link: &DetailLink, record: &FlatRecord) -> String {
        match record.get(&link.identifier_path).map(|v| v.to_string()) {
            Some(id) if !id.trim().is_empty() => {
                format!("{}/{}", link.base_url.trim_end_matches('/'), id.trim())
            }
            _ => String::new(),
        }
    }
}

impl Default for Projector {
    fn default() -> Self {
        Self::new(
            default_columns(),
            Some(DetailLink::default()),
            default_operator_columns(),
        )
    }
}
