#![allow(dead_code)]

use serde_json::{json, Value};

use ctgov_core::Study;

/// A study exercising every list-driven table.
pub fn full_study_json(nct_id: &str) -> Value {
    json!({
        "protocolSection": {
            "identificationModule": {
                "nctId": nct_id,
                "orgStudyIdInfo": {"id": "GH-2021-07"},
                "organization": {"fullName": "General Hospital", "class": "OTHER"},
                "briefTitle": "Inhaled therapy for moderate asthma",
                "officialTitle": "A Randomized Trial of Drug X in Adults With Moderate Asthma",
                "acronym": "BREATHE"
            },
            "statusModule": {
                "statusVerifiedDate": "2024-03",
                "overallStatus": "RECRUITING",
                "startDateStruct": {"date": "2021-06-01", "type": "ACTUAL"},
                "primaryCompletionDateStruct": {"date": "2025-12", "type": "ESTIMATED"},
                "studyFirstSubmitDate": "2021-05-10",
                "lastUpdatePostDateStruct": {"date": "2024-03-15", "type": "ACTUAL"}
            },
            "sponsorCollaboratorsModule": {
                "responsibleParty": {"type": "SPONSOR"},
                "leadSponsor": {"name": "General Hospital", "class": "OTHER"},
                "collaborators": [{"name": "Acme Pharma", "class": "INDUSTRY"}]
            },
            "oversightModule": {"oversightHasDmc": true, "isFdaRegulatedDrug": true},
            "descriptionModule": {"briefSummary": "Tests Drug X."},
            "conditionsModule": {"conditions": ["Asthma", "Airway Inflammation"]},
            "designModule": {
                "studyType": "INTERVENTIONAL",
                "phases": ["PHASE2"],
                "designInfo": {"allocation": "RANDOMIZED", "primaryPurpose": "TREATMENT"},
                "enrollmentInfo": {"count": 240, "type": "ESTIMATED"}
            },
            "armsInterventionsModule": {
                "armGroups": [
                    {"label": "Drug X", "type": "EXPERIMENTAL"},
                    {"label": "Placebo", "type": "PLACEBO_COMPARATOR"}
                ],
                "interventions": [
                    {"type": "DRUG", "name": "Drug X", "armGroupLabels": ["Drug X"]}
                ]
            },
            "outcomesModule": {
                "primaryOutcomes": [{"measure": "FEV1 change", "timeFrame": "12 weeks"}]
            },
            "eligibilityModule": {
                "healthyVolunteers": false,
                "sex": "ALL",
                "minimumAge": "18 Years"
            },
            "contactsLocationsModule": {
                "centralContacts": [{"name": "Study Desk", "role": "CONTACT"}],
                "overallOfficials": [{"name": "Jane Roe", "role": "PRINCIPAL_INVESTIGATOR"}],
                "locations": [{
                    "facility": "General Hospital",
                    "status": "RECRUITING",
                    "city": "Springfield",
                    "country": "United States",
                    "contacts": [{"name": "Site Nurse", "role": "CONTACT", "phone": "555-0100"}]
                }]
            }
        },
        "derivedSection": {},
        "resultsSection": null
    })
}

pub fn minimal_study_json(nct_id: &str) -> Value {
    json!({
        "protocolSection": {
            "identificationModule": {
                "nctId": nct_id,
                "briefTitle": format!("Minimal study {nct_id}"),
                "organization": {"fullName": "Org"}
            }
        }
    })
}

pub fn study(raw: Value) -> Study {
    serde_json::from_value(raw).expect("fixture must deserialize")
}
