//! Typed model of one clinical-trial study record as published in the
//! ClinicalTrials.gov JSON export.
//!
//! Every optional module and sub-object is default-constructed when it is
//! absent (or explicitly `null`), so code reading a [`Study`] never has to
//! chase optionals: missing lists are empty and missing scalars are `None`.

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Study {
    pub protocol_section: ProtocolSection,
    #[serde(default, deserialize_with = "or_default")]
    pub derived_section: DerivedSection,
    #[serde(default)]
    pub results_section: Option<serde_json::Value>,
}

impl Study {
    pub fn nct_id(&self) -> &str {
        &self.protocol_section.identification_module.nct_id
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtocolSection {
    pub identification_module: IdentificationModule,
    #[serde(default, deserialize_with = "or_default")]
    pub status_module: StatusModule,
    #[serde(default, deserialize_with = "or_default")]
    pub sponsor_collaborators_module: SponsorCollaboratorsModule,
    #[serde(default, deserialize_with = "or_default")]
    pub oversight_module: OversightModule,
    #[serde(default, deserialize_with = "or_default")]
    pub description_module: DescriptionModule,
    #[serde(default, deserialize_with = "or_default")]
    pub conditions_module: ConditionsModule,
    #[serde(default, deserialize_with = "or_default")]
    pub design_module: DesignModule,
    #[serde(default, deserialize_with = "or_default")]
    pub arms_interventions_module: ArmsInterventionsModule,
    #[serde(default, deserialize_with = "or_default")]
    pub outcomes_module: OutcomesModule,
    #[serde(default, deserialize_with = "or_default")]
    pub eligibility_module: EligibilityModule,
    #[serde(default, deserialize_with = "or_default")]
    pub contacts_locations_module: ContactsLocationsModule,
}

// --- identification ---

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentificationModule {
    pub nct_id: String,
    #[serde(default, deserialize_with = "or_default")]
    pub nct_id_alias: Vec<String>,
    #[serde(default)]
    pub num_nct_aliases: Option<i32>,
    #[serde(default, deserialize_with = "or_default")]
    pub org_study_id_info: OrgStudyIdInfo,
    #[serde(default, deserialize_with = "or_default")]
    pub secondary_id_info: SecondaryIdInfo,
    #[serde(default)]
    pub num_secondary_ids: Option<i32>,
    pub organization: Organization,
    pub brief_title: String,
    #[serde(default)]
    pub official_title: Option<String>,
    #[serde(default)]
    pub acronym: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct OrgStudyIdInfo {
    pub id: String,
    #[serde(rename = "type")]
    pub id_type: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SecondaryIdInfo {
    pub secondary_id: String,
    pub secondary_id_type: Option<String>,
    pub secondary_id_domain: Option<String>,
    pub secondary_id_link: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Organization {
    pub full_name: String,
    #[serde(default, rename = "class")]
    pub class: Option<String>,
}

// --- status ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DateType {
    Actual,
    Estimated,
    Anticipated,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct DateStruct {
    #[serde(deserialize_with = "partial_date")]
    pub date: Option<NaiveDate>,
    #[serde(rename = "type")]
    pub date_type: Option<DateType>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ExpandedAccessInfo {
    pub has_expanded_access: Option<bool>,
    pub individual: Option<bool>,
    pub intermediate: Option<bool>,
    pub treatment: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StatusModule {
    #[serde(deserialize_with = "partial_date")]
    pub status_verified_date: Option<NaiveDate>,
    pub overall_status: Option<String>,
    pub last_known_status: Option<String>,
    pub delayed_posting: Option<bool>,
    #[serde(deserialize_with = "or_default")]
    pub expanded_access_info: ExpandedAccessInfo,
    #[serde(deserialize_with = "or_default")]
    pub start_date_struct: DateStruct,
    #[serde(deserialize_with = "or_default")]
    pub primary_completion_date_struct: DateStruct,
    #[serde(deserialize_with = "or_default")]
    pub completion_date_struct: DateStruct,
    #[serde(deserialize_with = "partial_date")]
    pub study_first_submit_date: Option<NaiveDate>,
    #[serde(deserialize_with = "partial_date")]
    pub study_first_submit_qc_date: Option<NaiveDate>,
    #[serde(deserialize_with = "or_default")]
    pub study_first_post_date_struct: DateStruct,
    #[serde(deserialize_with = "partial_date")]
    pub last_update_submit_date: Option<NaiveDate>,
    #[serde(deserialize_with = "or_default")]
    pub last_update_post_date_struct: DateStruct,
    pub why_stopped: Option<String>,
    pub results_waived: Option<bool>,
    #[serde(deserialize_with = "partial_date")]
    pub results_first_submit_date: Option<NaiveDate>,
    #[serde(deserialize_with = "partial_date")]
    pub results_first_submit_qc_date: Option<NaiveDate>,
    #[serde(deserialize_with = "or_default")]
    pub results_first_post_date_struct: DateStruct,
}

// --- sponsors ---

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ResponsibleParty {
    #[serde(rename = "type")]
    pub party_type: Option<String>,
    pub investigator_title: Option<String>,
    pub investigator_affiliation: Option<String>,
    pub investigator_full_name: Option<String>,
    pub old_name_title: Option<String>,
    pub old_organization: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Sponsor {
    pub name: Option<String>,
    #[serde(rename = "class")]
    pub class: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SponsorCollaboratorsModule {
    #[serde(deserialize_with = "or_default")]
    pub responsible_party: ResponsibleParty,
    #[serde(deserialize_with = "or_default")]
    pub lead_sponsor: Sponsor,
    #[serde(deserialize_with = "or_default")]
    pub collaborators: Vec<Sponsor>,
}

// --- oversight, description, conditions ---

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OversightModule {
    pub oversight_has_dmc: Option<bool>,
    pub is_fda_regulated_drug: Option<bool>,
    pub is_fda_regulated_device: Option<bool>,
    pub is_us_export: Option<bool>,
    pub is_ppsd: Option<bool>,
    pub is_unapproved_device: Option<bool>,
    #[serde(rename = "fdaaa801Violation")]
    pub is_fda_violation: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DescriptionModule {
    pub brief_summary: Option<String>,
    pub detailed_description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ConditionsModule {
    #[serde(deserialize_with = "or_default")]
    pub conditions: Vec<String>,
    #[serde(deserialize_with = "or_default")]
    pub keywords: Vec<String>,
}

// --- design ---

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DesignInfo {
    pub allocation: Option<String>,
    pub intervention_model: Option<String>,
    pub primary_purpose: Option<String>,
    pub observational_model: Option<String>,
    pub time_perspective: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct EnrollmentInfo {
    pub count: i32,
    #[serde(rename = "type")]
    pub enrollment_type: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct BioSpec {
    pub retention: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DesignModule {
    pub study_type: Option<String>,
    #[serde(deserialize_with = "or_default")]
    pub phases: Vec<String>,
    #[serde(deserialize_with = "or_default")]
    pub expanded_access_types: ExpandedAccessInfo,
    #[serde(deserialize_with = "or_default")]
    pub design_info: DesignInfo,
    #[serde(deserialize_with = "or_default")]
    pub enrollment_info: EnrollmentInfo,
    #[serde(deserialize_with = "or_default")]
    pub bio_spec: BioSpec,
    pub num_phases: Option<i32>,
}

// --- arms & interventions ---

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArmGroup {
    pub label: String,
    #[serde(default, rename = "type")]
    pub group_type: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "or_default")]
    pub intervention_names: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Intervention {
    #[serde(rename = "type")]
    pub intervention_type: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    #[serde(deserialize_with = "or_default")]
    pub arm_group_labels: Vec<String>,
    #[serde(deserialize_with = "or_default")]
    pub other_names: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ArmsInterventionsModule {
    #[serde(deserialize_with = "or_default")]
    pub arm_groups: Vec<ArmGroup>,
    #[serde(deserialize_with = "or_default")]
    pub interventions: Vec<Intervention>,
}

// --- outcomes ---

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Outcome {
    pub measure: Option<String>,
    pub description: Option<String>,
    pub time_frame: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OutcomesModule {
    #[serde(deserialize_with = "or_default")]
    pub primary_outcomes: Vec<Outcome>,
    #[serde(deserialize_with = "or_default")]
    pub secondary_outcomes: Vec<Outcome>,
    #[serde(deserialize_with = "or_default")]
    pub other_outcomes: Vec<Outcome>,
}

// --- eligibility ---

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EligibilityModule {
    pub eligibility_criteria: Option<String>,
    pub healthy_volunteers: Option<bool>,
    pub sex: Option<String>,
    #[serde(deserialize_with = "age")]
    pub minimum_age: Option<String>,
    #[serde(deserialize_with = "age")]
    pub maximum_age: Option<String>,
    #[serde(deserialize_with = "or_default")]
    pub std_ages: Vec<String>,
    pub study_population: Option<String>,
    pub sampling_method: Option<String>,
    pub gender_based: Option<bool>,
    pub gender_description: Option<String>,
}

// --- contacts & locations ---

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Contact {
    pub name: Option<String>,
    pub role: Option<String>,
    pub phone: Option<String>,
    pub phone_ext: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Official {
    pub name: Option<String>,
    pub affiliation: Option<String>,
    pub role: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Location {
    pub facility: Option<String>,
    pub status: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip: Option<String>,
    pub country: Option<String>,
    #[serde(deserialize_with = "or_default")]
    pub contacts: Vec<Contact>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ContactsLocationsModule {
    #[serde(deserialize_with = "or_default")]
    pub central_contacts: Vec<Contact>,
    #[serde(deserialize_with = "or_default")]
    pub overall_officials: Vec<Official>,
    #[serde(deserialize_with = "or_default")]
    pub locations: Vec<Location>,
}

// --- derived ---

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DerivedSection {
    pub has_results: Option<bool>,
}

/// Treats an explicit `null` like a missing field.
fn or_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Accepts `YYYY-MM-DD` and month-precision `YYYY-MM` dates; the latter are
/// pinned to the first of the month.
fn partial_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        Some(raw) => parse_partial_date(&raw).map(Some).map_err(serde::de::Error::custom),
        None => Ok(None),
    }
}

const AGE_UNITS: [&str; 7] = ["Year", "Month", "Week", "Day", "Hour", "Minute", "Second"];

/// Ages are free text that must end in a time unit, e.g. `18 Years`.
fn age<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        Some(raw) if !has_age_unit(&raw) => Err(serde::de::Error::custom(format!(
            "age must end with a time unit such as Years or Days, got {raw:?}"
        ))),
        value => Ok(value),
    }
}

fn has_age_unit(raw: &str) -> bool {
    let raw = raw.strip_suffix('s').unwrap_or(raw);
    AGE_UNITS.iter().any(|unit| raw.ends_with(unit))
}

pub fn parse_partial_date(raw: &str) -> Result<NaiveDate, String> {
    let full = match raw.split('-').count() {
        2 => format!("{raw}-01"),
        3 => raw.to_string(),
        _ => return Err(format!("date must be YYYY-MM or YYYY-MM-DD, got {raw:?}")),
    };
    NaiveDate::parse_from_str(&full, "%Y-%m-%d").map_err(|e| format!("invalid date {raw:?}: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn minimal() -> serde_json::Value {
        json!({
            "protocolSection": {
                "identificationModule": {
                    "nctId": "NCT001",
                    "briefTitle": "A study",
                    "organization": {"fullName": "Org", "class": "OTHER"}
                }
            }
        })
    }

    #[test]
    fn test_absent_modules_default_to_empty() {
        let study: Study = serde_json::from_value(minimal()).unwrap();
        let protocol = &study.protocol_section;

        assert_eq!(study.nct_id(), "NCT001");
        assert!(protocol.conditions_module.conditions.is_empty());
        assert!(protocol.contacts_locations_module.locations.is_empty());
        assert_eq!(protocol.design_module.enrollment_info.count, 0);
        assert_eq!(protocol.status_module.start_date_struct.date, None);
        assert_eq!(protocol.identification_module.org_study_id_info.id, "");
        assert_eq!(protocol.sponsor_collaborators_module.lead_sponsor.name, None);
    }

    #[test]
    fn test_null_modules_default_to_empty() {
        let mut raw = minimal();
        raw["protocolSection"]["designModule"] = json!(null);
        raw["protocolSection"]["conditionsModule"] = json!({"conditions": null});

        let study: Study = serde_json::from_value(raw).unwrap();
        assert!(study.protocol_section.design_module.phases.is_empty());
        assert!(study.protocol_section.conditions_module.conditions.is_empty());
    }

    #[test]
    fn test_partial_dates_are_pinned_to_first_of_month() {
        let mut raw = minimal();
        raw["protocolSection"]["statusModule"] = json!({
            "statusVerifiedDate": "2023-04",
            "startDateStruct": {"date": "2019-11-15", "type": "ACTUAL"},
            "completionDateStruct": {"date": "2024-02", "type": "ESTIMATED"}
        });

        let study: Study = serde_json::from_value(raw).unwrap();
        let status = &study.protocol_section.status_module;
        assert_eq!(status.status_verified_date, NaiveDate::from_ymd_opt(2023, 4, 1));
        assert_eq!(status.start_date_struct.date, NaiveDate::from_ymd_opt(2019, 11, 15));
        assert_eq!(status.completion_date_struct.date_type, Some(DateType::Estimated));
    }

    #[test]
    fn test_malformed_dates_are_rejected() {
        assert!(parse_partial_date("2023").is_err());
        assert!(parse_partial_date("2023-13").is_err());
        assert!(parse_partial_date("2023-02-30").is_err());

        let mut raw = minimal();
        raw["protocolSection"]["statusModule"] = json!({
            "startDateStruct": {"date": "2019-11-15", "type": "GUESSED"}
        });
        assert!(serde_json::from_value::<Study>(raw).is_err());
    }

    #[test]
    fn test_missing_required_fields_are_rejected() {
        let mut raw = minimal();
        raw["protocolSection"]["identificationModule"]
            .as_object_mut()
            .unwrap()
            .remove("briefTitle");
        assert!(serde_json::from_value::<Study>(raw).is_err());
    }

    #[test]
    fn test_ages_need_a_unit() {
        let mut raw = minimal();
        raw["protocolSection"]["eligibilityModule"] =
            json!({"minimumAge": "18 Years", "maximumAge": "1 Month"});
        let study: Study = serde_json::from_value(raw).unwrap();
        let eligibility = &study.protocol_section.eligibility_module;
        assert_eq!(eligibility.minimum_age.as_deref(), Some("18 Years"));
        assert_eq!(eligibility.maximum_age.as_deref(), Some("1 Month"));

        let mut raw = minimal();
        raw["protocolSection"]["eligibilityModule"] = json!({"minimumAge": "eighteen"});
        assert!(serde_json::from_value::<Study>(raw).is_err());

        let mut raw = minimal();
        raw["protocolSection"]["eligibilityModule"] = json!({"maximumAge": "65 Yearss"});
        assert!(serde_json::from_value::<Study>(raw).is_err());

        let mut raw = minimal();
        raw["protocolSection"]["eligibilityModule"] = json!({"maximumAge": null});
        let study: Study = serde_json::from_value(raw).unwrap();
        assert_eq!(study.protocol_section.eligibility_module.maximum_age, None);
    }

    #[test]
    fn test_fda_violation_alias() {
        let mut raw = minimal();
        raw["protocolSection"]["oversightModule"] = json!({"fdaaa801Violation": true});
        let study: Study = serde_json::from_value(raw).unwrap();
        assert_eq!(study.protocol_section.oversight_module.is_fda_violation, Some(true));
    }
}
