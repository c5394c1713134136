//! DDL for the destination tables.
//!
//! Column names mirror [`Table::columns`] one to one; the type of each column
//! matches the [`SqlValue`](crate::value::SqlValue) variant the decomposer
//! puts in that position.

use tracing::info;

use crate::codec::Table;
use crate::errors::Result;
use crate::store::Store;
use crate::upsert::{join_quoted, quote_ident};

type Layout = &'static [(&'static str, &'static str)];

const IDENTIFICATION: Layout = &[
    ("nct_id", "TEXT"),
    ("nct_id_alias", "TEXT[]"),
    ("num_nct_aliases", "INTEGER"),
    ("org_study_id", "TEXT"),
    ("org_study_id_type", "TEXT"),
    ("org_study_id_link", "TEXT"),
    ("num_secondary_ids", "INTEGER"),
    ("brief_title", "TEXT"),
    ("official_title", "TEXT"),
    ("acronym", "TEXT"),
    ("org_name", "TEXT"),
    ("org_class", "TEXT"),
    ("brief_summary", "TEXT"),
    ("detailed_description", "TEXT"),
    ("num_conditions", "INTEGER"),
];

const STATUS: Layout = &[
    ("nct_id", "TEXT"),
    ("status_verified_date", "DATE"),
    ("overall_status", "TEXT"),
    ("last_known_status", "TEXT"),
    ("why_stopped", "TEXT"),
    ("start_date", "DATE"),
    ("primary_completion_date", "DATE"),
    ("completion_date", "DATE"),
    ("study_first_submit_date", "DATE"),
    ("study_first_submit_qc_date", "DATE"),
    ("study_first_post_date", "DATE"),
    ("results_waived", "BOOLEAN"),
    ("results_first_submit_date", "DATE"),
    ("results_first_submit_qc_date", "DATE"),
    ("results_first_post_date", "DATE"),
    ("last_update_submit_date", "DATE"),
    ("last_update_post_date", "DATE"),
];

const CONDITIONS: Layout = &[("nct_id", "TEXT"), ("name", "TEXT")];

const COLLABORATORS: Layout = &[
    ("nct_id", "TEXT"),
    ("responsible_party_type", "TEXT"),
    ("investigator_name", "TEXT"),
    ("investigator_affiliation", "TEXT"),
    ("collaborator_name", "TEXT"),
    ("collaborator_class", "TEXT"),
    ("collaborator_type", "TEXT"),
];

const OVERSIGHT: Layout = &[
    ("nct_id", "TEXT"),
    ("oversight_has_dmc", "BOOLEAN"),
    ("is_fda_regulated_drug", "BOOLEAN"),
    ("is_fda_regulated_device", "BOOLEAN"),
    ("is_ppsd", "BOOLEAN"),
    ("is_us_export", "BOOLEAN"),
    ("is_unapproved_device", "BOOLEAN"),
    ("is_fda_violation", "BOOLEAN"),
];

const DESIGN: Layout = &[
    ("nct_id", "TEXT"),
    ("study_type", "TEXT"),
    ("expanded_access_individual", "BOOLEAN"),
    ("expanded_access_intermediate", "BOOLEAN"),
    ("expanded_access_treatment", "BOOLEAN"),
    ("patient_registry", "BOOLEAN"),
    ("num_phases", "INTEGER"),
    ("allocation", "TEXT"),
    ("intervention_model", "TEXT"),
    ("primary_purpose", "TEXT"),
    ("observational_model", "TEXT"),
    ("biospec_retention", "TEXT"),
    ("biospec_description", "TEXT"),
    ("enrollment_count", "INTEGER"),
];

const PHASES: Layout = &[("nct_id", "TEXT"), ("phase", "TEXT")];

const ELIGIBILITY: Layout = &[
    ("nct_id", "TEXT"),
    ("accepts_healthy_volunteers", "BOOLEAN"),
    ("gender", "TEXT"),
    ("gender_based", "BOOLEAN"),
    ("min_age", "TEXT"),
    ("max_age", "TEXT"),
    ("population_description", "TEXT"),
    ("sampling_method", "TEXT"),
];

const GROUPS: Layout = &[
    ("nct_id", "TEXT"),
    ("group_type", "TEXT"),
    ("group_description", "TEXT"),
    ("group_label", "TEXT"),
];

const INTERVENTIONS: Layout = &[
    ("nct_id", "TEXT"),
    ("intervention_type", "TEXT"),
    ("intervention_name", "TEXT"),
    ("intervention_description", "TEXT"),
    ("group_label", "TEXT"),
];

const OUTCOME: Layout = &[
    ("nct_id", "TEXT"),
    ("type", "TEXT"),
    ("measure", "TEXT"),
    ("description", "TEXT"),
    ("time_frame", "TEXT"),
];

const FACILITY: Layout = &[
    ("nct_id", "TEXT"),
    ("name", "TEXT"),
    ("status", "TEXT"),
    ("city", "TEXT"),
    ("state", "TEXT"),
    ("zip", "TEXT"),
    ("country", "TEXT"),
    ("contacts", "JSONB"),
];

const CONTACT: Layout = &[
    ("nct_id", "TEXT"),
    ("name", "TEXT"),
    ("role", "TEXT"),
    ("phone", "TEXT"),
    ("email", "TEXT"),
];

const OFFICIALS: Layout = &[
    ("nct_id", "TEXT"),
    ("name", "TEXT"),
    ("role", "TEXT"),
    ("affiliation", "TEXT"),
];

/// `(column, SQL type)` pairs for `table`, in column order.
pub fn column_types(table: Table) -> Layout {
    match table {
        Table::Identification => IDENTIFICATION,
        Table::Status => STATUS,
        Table::Conditions => CONDITIONS,
        Table::Collaborators => COLLABORATORS,
        Table::Oversight => OVERSIGHT,
        Table::Design => DESIGN,
        Table::Phases => PHASES,
        Table::Eligibility => ELIGIBILITY,
        Table::Groups => GROUPS,
        Table::Interventions => INTERVENTIONS,
        Table::Outcome => OUTCOME,
        Table::Facility => FACILITY,
        Table::Contact => CONTACT,
        Table::Officials => OFFICIALS,
    }
}

pub fn create_table_sql(table: Table) -> String {
    let mut definitions: Vec<String> = column_types(table)
        .iter()
        .map(|(column, sql_type)| {
            let constraint = if table == Table::PRIMARY && *column == "nct_id" {
                " PRIMARY KEY"
            } else if *column == "nct_id" {
                " NOT NULL"
            } else {
                ""
            };
            format!("{} {sql_type}{constraint}", quote_ident(column))
        })
        .collect();

    if table != Table::PRIMARY {
        definitions.push(format!(
            "FOREIGN KEY (\"nct_id\") REFERENCES {} (\"nct_id\") ON DELETE CASCADE",
            quote_ident(Table::PRIMARY.name())
        ));
    }
    definitions.push(format!(
        "CONSTRAINT {} UNIQUE NULLS NOT DISTINCT ({})",
        quote_ident(&format!("{}_conflict_key", table.name())),
        join_quoted(table.conflict_columns().iter().copied())
    ));

    format!(
        "CREATE TABLE {} (\n    {}\n)",
        quote_ident(table.name()),
        definitions.join(",\n    ")
    )
}

/// Drop statements (reverse dependency order) followed by create statements
/// (dependency order).
pub fn schema_statements() -> Vec<String> {
    let drops = Table::ALL
        .iter()
        .rev()
        .map(|table| format!("DROP TABLE IF EXISTS {} CASCADE", quote_ident(table.name())));
    let creates = Table::ALL.iter().map(|table| create_table_sql(*table));
    drops.chain(creates).collect()
}

/// Recreates every destination table from scratch. Existing rows are lost.
pub async fn init_schema<S: Store>(store: &S) -> Result<()> {
    let statements = schema_statements();
    store.reset_schema(&statements).await?;
    info!(tables = Table::ALL.len(), "Initialized schema");
    Ok(())
}
