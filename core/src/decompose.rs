//! Flattens one [`Study`] into rows for every destination table it touches.
//!
//! Every row leads with the study's `nct_id`. Single-row tables always get
//! exactly one row; list-driven tables get one row per list element, in
//! source order, and none when the list is empty.

use serde_json::json;

use crate::codec::Table;
use crate::errors::Result;
use crate::sink::Sink;
use crate::study::{Contact, Outcome, Study};
use crate::value::{Row, SqlValue};

pub const LEAD_SPONSOR: &str = "lead sponsor";
pub const COLLABORATOR: &str = "collaborator";

/// The rows derived from one study. The primary (identification) row comes
/// first, followed by dependent rows grouped by table.
#[derive(Debug, Clone)]
pub struct Decomposition {
    rows: Vec<(Table, Row)>,
}

impl Decomposition {
    pub fn primary(&self) -> &Row {
        &self.rows[0].1
    }

    pub fn rows(&self) -> &[(Table, Row)] {
        &self.rows
    }

    pub fn rows_for(&self, table: Table) -> Vec<&Row> {
        self.rows
            .iter()
            .filter(|(t, _)| *t == table)
            .map(|(_, row)| row)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Splits off the primary row from the dependents.
    pub fn into_parts(self) -> (Row, Vec<(Table, Row)>) {
        let mut rows = self.rows.into_iter();
        let primary = rows.next().map(|(_, row)| row).unwrap_or_default();
        (primary, rows.collect())
    }

    /// Submits every row, primary first; returns how many were submitted.
    pub async fn submit<K: Sink>(self, sink: &mut K) -> Result<usize> {
        let count = self.rows.len();
        for (table, row) in self.rows {
            sink.submit(table, row).await?;
        }
        Ok(count)
    }
}

/// Decomposes `study` and feeds the rows to `sink`.
pub async fn migrate<K: Sink>(study: &Study, sink: &mut K) -> Result<usize> {
    decompose(study).submit(sink).await
}

pub fn decompose(study: &Study) -> Decomposition {
    let mut rows = Vec::new();
    let nct_id = study.nct_id();

    rows.push((Table::Identification, identification(study)));
    rows.push((Table::Status, status(study)));
    rows.extend(conditions(study).map(|row| (Table::Conditions, row)));
    rows.extend(collaborators(study).into_iter().map(|row| (Table::Collaborators, row)));
    rows.push((Table::Oversight, oversight(study)));
    rows.push((Table::Design, design(study)));
    rows.extend(phases(study).map(|row| (Table::Phases, row)));
    rows.push((Table::Eligibility, eligibility(study)));
    rows.extend(groups(study).map(|row| (Table::Groups, row)));
    rows.extend(interventions(study).map(|row| (Table::Interventions, row)));
    rows.extend(outcomes(study).into_iter().map(|row| (Table::Outcome, row)));
    rows.extend(facilities(study).map(|row| (Table::Facility, row)));
    rows.extend(
        study
            .protocol_section
            .contacts_locations_module
            .central_contacts
            .iter()
            .map(|contact| (Table::Contact, contact_row(nct_id, contact))),
    );
    rows.extend(officials(study).map(|row| (Table::Officials, row)));

    Decomposition { rows }
}

fn identification(study: &Study) -> Row {
    let protocol = &study.protocol_section;
    let id = &protocol.identification_module;
    let description = &protocol.description_module;
    let num_conditions =
        i32::try_from(protocol.conditions_module.conditions.len()).unwrap_or(i32::MAX);

    vec![
        id.nct_id.as_str().into(),
        id.nct_id_alias.clone().into(),
        id.num_nct_aliases.into(),
        id.org_study_id_info.id.as_str().into(),
        (&id.org_study_id_info.id_type).into(),
        (&id.secondary_id_info.secondary_id_link).into(),
        id.num_secondary_ids.into(),
        id.brief_title.as_str().into(),
        (&id.official_title).into(),
        (&id.acronym).into(),
        id.organization.full_name.as_str().into(),
        (&id.organization.class).into(),
        (&description.brief_summary).into(),
        (&description.detailed_description).into(),
        num_conditions.into(),
    ]
}

fn status(study: &Study) -> Row {
    let s = &study.protocol_section.status_module;
    vec![
        study.nct_id().into(),
        s.status_verified_date.into(),
        (&s.overall_status).into(),
        (&s.last_known_status).into(),
        (&s.why_stopped).into(),
        s.start_date_struct.date.into(),
        s.primary_completion_date_struct.date.into(),
        s.completion_date_struct.date.into(),
        s.study_first_submit_date.into(),
        s.study_first_submit_qc_date.into(),
        s.study_first_post_date_struct.date.into(),
        s.results_waived.into(),
        s.results_first_submit_date.into(),
        s.results_first_submit_qc_date.into(),
        s.results_first_post_date_struct.date.into(),
        s.last_update_submit_date.into(),
        s.last_update_post_date_struct.date.into(),
    ]
}

fn conditions(study: &Study) -> impl Iterator<Item = Row> + '_ {
    let nct_id = study.nct_id();
    study
        .protocol_section
        .conditions_module
        .conditions
        .iter()
        .map(move |name| -> Row { vec![nct_id.into(), name.as_str().into()] })
}

fn phases(study: &Study) -> impl Iterator<Item = Row> + '_ {
    let nct_id = study.nct_id();
    study
        .protocol_section
        .design_module
        .phases
        .iter()
        .map(move |phase| -> Row { vec![nct_id.into(), phase.as_str().into()] })
}

/// One row for the lead sponsor plus one per additional collaborator, all
/// carrying the same responsible-party fields.
fn collaborators(study: &Study) -> Vec<Row> {
    let module = &study.protocol_section.sponsor_collaborators_module;
    let party = &module.responsible_party;

    std::iter::once((&module.lead_sponsor, LEAD_SPONSOR))
        .chain(module.collaborators.iter().map(|sponsor| (sponsor, COLLABORATOR)))
        .map(|(sponsor, tag)| -> Row {
            vec![
                study.nct_id().into(),
                (&party.party_type).into(),
                (&party.investigator_full_name).into(),
                (&party.investigator_affiliation).into(),
                (&sponsor.name).into(),
                (&sponsor.class).into(),
                tag.into(),
            ]
        })
        .collect()
}

fn oversight(study: &Study) -> Row {
    let o = &study.protocol_section.oversight_module;
    vec![
        study.nct_id().into(),
        o.oversight_has_dmc.into(),
        o.is_fda_regulated_drug.into(),
        o.is_fda_regulated_device.into(),
        o.is_ppsd.into(),
        o.is_us_export.into(),
        o.is_unapproved_device.into(),
        o.is_fda_violation.into(),
    ]
}

fn design(study: &Study) -> Row {
    let d = &study.protocol_section.design_module;
    let patient_registry = d.study_type.as_deref().map(|t| t == "PATIENT_REGISTRY");
    vec![
        study.nct_id().into(),
        (&d.study_type).into(),
        d.expanded_access_types.individual.into(),
        d.expanded_access_types.intermediate.into(),
        d.expanded_access_types.treatment.into(),
        patient_registry.into(),
        d.num_phases.into(),
        (&d.design_info.allocation).into(),
        (&d.design_info.intervention_model).into(),
        (&d.design_info.primary_purpose).into(),
        (&d.design_info.observational_model).into(),
        (&d.bio_spec.retention).into(),
        (&d.bio_spec.description).into(),
        d.enrollment_info.count.into(),
    ]
}

fn eligibility(study: &Study) -> Row {
    let e = &study.protocol_section.eligibility_module;
    vec![
        study.nct_id().into(),
        e.healthy_volunteers.into(),
        (&e.sex).into(),
        e.gender_based.into(),
        (&e.minimum_age).into(),
        (&e.maximum_age).into(),
        (&e.study_population).into(),
        (&e.sampling_method).into(),
    ]
}

fn groups(study: &Study) -> impl Iterator<Item = Row> + '_ {
    let nct_id = study.nct_id();
    study
        .protocol_section
        .arms_interventions_module
        .arm_groups
        .iter()
        .map(move |group| -> Row {
            vec![
                nct_id.into(),
                (&group.group_type).into(),
                (&group.description).into(),
                group.label.as_str().into(),
            ]
        })
}

/// Interventions keep only their first arm-group label.
fn interventions(study: &Study) -> impl Iterator<Item = Row> + '_ {
    let nct_id = study.nct_id();
    study
        .protocol_section
        .arms_interventions_module
        .interventions
        .iter()
        .map(move |intervention| -> Row {
            vec![
                nct_id.into(),
                (&intervention.intervention_type).into(),
                (&intervention.name).into(),
                (&intervention.description).into(),
                intervention.arm_group_labels.first().cloned().into(),
            ]
        })
}

fn outcomes(study: &Study) -> Vec<Row> {
    let module = &study.protocol_section.outcomes_module;

    let mut rows: Vec<Row> = Vec::new();
    for (kind, list) in [
        ("primary", &module.primary_outcomes),
        ("secondary", &module.secondary_outcomes),
        ("other", &module.other_outcomes),
    ] {
        rows.extend(list.iter().map(|outcome: &Outcome| -> Row {
            vec![
                study.nct_id().into(),
                kind.into(),
                (&outcome.measure).into(),
                (&outcome.description).into(),
                (&outcome.time_frame).into(),
            ]
        }));
    }
    rows
}

/// Location contacts travel as one JSON document, or NULL when the location
/// lists none.
fn facilities(study: &Study) -> impl Iterator<Item = Row> + '_ {
    let nct_id = study.nct_id();
    study
        .protocol_section
        .contacts_locations_module
        .locations
        .iter()
        .map(move |location| -> Row {
            let contacts = (!location.contacts.is_empty())
                .then(|| json!({ "contacts": location.contacts }));
            vec![
                nct_id.into(),
                (&location.facility).into(),
                (&location.status).into(),
                (&location.city).into(),
                (&location.state).into(),
                (&location.zip).into(),
                (&location.country).into(),
                SqlValue::Json(contacts),
            ]
        })
}

fn contact_row(nct_id: &str, contact: &Contact) -> Row {
    vec![
        nct_id.into(),
        (&contact.name).into(),
        (&contact.role).into(),
        (&contact.phone).into(),
        (&contact.email).into(),
    ]
}

fn officials(study: &Study) -> impl Iterator<Item = Row> + '_ {
    let nct_id = study.nct_id();
    study
        .protocol_section
        .contacts_locations_module
        .overall_officials
        .iter()
        .map(move |official| -> Row {
            vec![
                nct_id.into(),
                (&official.name).into(),
                (&official.role).into(),
                (&official.affiliation).into(),
            ]
        })
}
