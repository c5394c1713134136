//! Registry of destination tables: the ordered column list of every table and
//! the subset of columns that identifies a row (the conflict key).
//!
//! The set of tables is closed. Rows produced anywhere in the crate are
//! positionally aligned to [`Table::columns`].

use std::fmt;
use std::str::FromStr;

use crate::errors::UnknownTableError;

/// A destination table, in dependency order: `Identification` holds the
/// primary key every other table references.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Table {
    Identification,
    Status,
    Conditions,
    Collaborators,
    Oversight,
    Design,
    Phases,
    Eligibility,
    Groups,
    Interventions,
    Outcome,
    Facility,
    Contact,
    Officials,
}

pub struct TableDescriptor {
    pub name: &'static str,
    pub columns: &'static [&'static str],
    pub conflict_columns: &'static [&'static str],
}

const IDENTIFICATION: TableDescriptor = TableDescriptor {
    name: "identification",
    columns: &[
        "nct_id",
        "nct_id_alias",
        "num_nct_aliases",
        "org_study_id",
        "org_study_id_type",
        "org_study_id_link",
        "num_secondary_ids",
        "brief_title",
        "official_title",
        "acronym",
        "org_name",
        "org_class",
        "brief_summary",
        "detailed_description",
        "num_conditions",
    ],
    conflict_columns: &["nct_id"],
};

const STATUS: TableDescriptor = TableDescriptor {
    name: "status",
    columns: &[
        "nct_id",
        "status_verified_date",
        "overall_status",
        "last_known_status",
        "why_stopped",
        "start_date",
        "primary_completion_date",
        "completion_date",
        "study_first_submit_date",
        "study_first_submit_qc_date",
        "study_first_post_date",
        "results_waived",
        "results_first_submit_date",
        "results_first_submit_qc_date",
        "results_first_post_date",
        "last_update_submit_date",
        "last_update_post_date",
    ],
    conflict_columns: &["nct_id"],
};

const CONDITIONS: TableDescriptor = TableDescriptor {
    name: "conditions",
    columns: &["nct_id", "name"],
    conflict_columns: &["nct_id", "name"],
};

const COLLABORATORS: TableDescriptor = TableDescriptor {
    name: "collaborators",
    columns: &[
        "nct_id",
        "responsible_party_type",
        "investigator_name",
        "investigator_affiliation",
        "collaborator_name",
        "collaborator_class",
        "collaborator_type",
    ],
    conflict_columns: &[
        "nct_id",
        "responsible_party_type",
        "investigator_name",
        "investigator_affiliation",
        "collaborator_name",
        "collaborator_class",
        "collaborator_type",
    ],
};

const OVERSIGHT: TableDescriptor = TableDescriptor {
    name: "oversight",
    columns: &[
        "nct_id",
        "oversight_has_dmc",
        "is_fda_regulated_drug",
        "is_fda_regulated_device",
        "is_ppsd",
        "is_us_export",
        "is_unapproved_device",
        "is_fda_violation",
    ],
    conflict_columns: &["nct_id"],
};

const DESIGN: TableDescriptor = TableDescriptor {
    name: "design",
    columns: &[
        "nct_id",
        "study_type",
        "expanded_access_individual",
        "expanded_access_intermediate",
        "expanded_access_treatment",
        "patient_registry",
        "num_phases",
        "allocation",
        "intervention_model",
        "primary_purpose",
        "observational_model",
        "biospec_retention",
        "biospec_description",
        "enrollment_count",
    ],
    conflict_columns: &["nct_id"],
};

const PHASES: TableDescriptor = TableDescriptor {
    name: "phases",
    columns: &["nct_id", "phase"],
    conflict_columns: &["nct_id", "phase"],
};

const ELIGIBILITY: TableDescriptor = TableDescriptor {
    name: "eligibility",
    columns: &[
        "nct_id",
        "accepts_healthy_volunteers",
        "gender",
        "gender_based",
        "min_age",
        "max_age",
        "population_description",
        "sampling_method",
    ],
    conflict_columns: &["nct_id"],
};

const GROUPS: TableDescriptor = TableDescriptor {
    name: "groups",
    columns: &["nct_id", "group_type", "group_description", "group_label"],
    conflict_columns: &["nct_id", "group_type", "group_description", "group_label"],
};

const INTERVENTIONS: TableDescriptor = TableDescriptor {
    name: "interventions",
    columns: &[
        "nct_id",
        "intervention_type",
        "intervention_name",
        "intervention_description",
        "group_label",
    ],
    conflict_columns: &[
        "nct_id",
        "intervention_type",
        "intervention_name",
        "intervention_description",
        "group_label",
    ],
};

const OUTCOME: TableDescriptor = TableDescriptor {
    name: "outcome",
    columns: &["nct_id", "type", "measure", "description", "time_frame"],
    conflict_columns: &["nct_id", "type", "measure", "description", "time_frame"],
};

const FACILITY: TableDescriptor = TableDescriptor {
    name: "facility",
    columns: &[
        "nct_id", "name", "status", "city", "state", "zip", "country", "contacts",
    ],
    conflict_columns: &["nct_id", "name", "status", "city", "state", "zip", "country"],
};

const CONTACT: TableDescriptor = TableDescriptor {
    name: "contact",
    columns: &["nct_id", "name", "role", "phone", "email"],
    conflict_columns: &["nct_id", "name", "role", "phone", "email"],
};

const OFFICIALS: TableDescriptor = TableDescriptor {
    name: "officials",
    columns: &["nct_id", "name", "role", "affiliation"],
    conflict_columns: &["nct_id", "name", "role", "affiliation"],
};

impl Table {
    pub const ALL: [Table; 14] = [
        Table::Identification,
        Table::Status,
        Table::Conditions,
        Table::Collaborators,
        Table::Oversight,
        Table::Design,
        Table::Phases,
        Table::Eligibility,
        Table::Groups,
        Table::Interventions,
        Table::Outcome,
        Table::Facility,
        Table::Contact,
        Table::Officials,
    ];

    /// The table every other table references by `nct_id`.
    pub const PRIMARY: Table = Table::Identification;

    pub fn descriptor(self) -> &'static TableDescriptor {
        match self {
            Table::Identification => &IDENTIFICATION,
            Table::Status => &STATUS,
            Table::Conditions => &CONDITIONS,
            Table::Collaborators => &COLLABORATORS,
            Table::Oversight => &OVERSIGHT,
            Table::Design => &DESIGN,
            Table::Phases => &PHASES,
            Table::Eligibility => &ELIGIBILITY,
            Table::Groups => &GROUPS,
            Table::Interventions => &INTERVENTIONS,
            Table::Outcome => &OUTCOME,
            Table::Facility => &FACILITY,
            Table::Contact => &CONTACT,
            Table::Officials => &OFFICIALS,
        }
    }

    pub fn name(self) -> &'static str {
        self.descriptor().name
    }

    pub fn columns(self) -> &'static [&'static str] {
        self.descriptor().columns
    }

    pub fn conflict_columns(self) -> &'static [&'static str] {
        self.descriptor().conflict_columns
    }

    /// Columns rewritten when an incoming row collides with a stored one.
    pub fn update_columns(self) -> impl Iterator<Item = &'static str> {
        let conflict = self.conflict_columns();
        self.columns()
            .iter()
            .copied()
            .filter(move |column| !conflict.contains(column))
    }

    /// Positions of the conflict columns within [`Table::columns`].
    pub fn conflict_positions(self) -> Vec<usize> {
        let columns = self.columns();
        self.conflict_columns()
            .iter()
            .filter_map(|key| columns.iter().position(|column| column == key))
            .collect()
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Table {
    type Err = UnknownTableError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        Table::ALL
            .into_iter()
            .find(|table| table.name() == name)
            .ok_or_else(|| UnknownTableError {
                table: name.to_string(),
            })
    }
}

pub fn columns_for(table: &str) -> Result<&'static [&'static str], UnknownTableError> {
    Ok(table.parse::<Table>()?.columns())
}

pub fn conflict_columns_for(table: &str) -> Result<&'static [&'static str], UnknownTableError> {
    Ok(table.parse::<Table>()?.conflict_columns())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_columns_lookup_by_name() {
        let columns = columns_for("phases").unwrap();
        assert_eq!(columns, &["nct_id", "phase"]);

        let conflict = conflict_columns_for("status").unwrap();
        assert_eq!(conflict, &["nct_id"]);
    }

    #[test]
    fn test_unknown_table_is_rejected() {
        let err = columns_for("adverse_events").unwrap_err();
        assert_eq!(err.table, "adverse_events");
        assert!(conflict_columns_for("").is_err());
    }

    #[test]
    fn test_conflict_columns_are_non_empty_subset() {
        for table in Table::ALL {
            let columns = table.columns();
            let conflict = table.conflict_columns();
            assert!(!conflict.is_empty(), "{table} has no conflict key");
            for key in conflict {
                assert!(columns.contains(key), "{table}: {key} is not a column");
            }
            assert_eq!(table.conflict_positions().len(), conflict.len());
        }
    }

    #[test]
    fn test_every_table_leads_with_primary_identifier() {
        for table in Table::ALL {
            assert_eq!(table.columns()[0], "nct_id", "{table}");
        }
    }

    #[test]
    fn test_names_round_trip_through_registry() {
        for table in Table::ALL {
            assert_eq!(table.name().parse::<Table>().unwrap(), table);
        }
    }

    #[test]
    fn test_update_columns_exclude_conflict_key() {
        let updates: Vec<_> = Table::Facility.update_columns().collect();
        assert_eq!(updates, vec!["contacts"]);

        assert_eq!(Table::Conditions.update_columns().count(), 0);
        assert_eq!(
            Table::Identification.update_columns().count(),
            Table::Identification.columns().len() - 1
        );
    }

    #[test]
    fn test_primary_table_sorts_first() {
        let mut tables = Table::ALL.to_vec();
        tables.reverse();
        tables.sort();
        assert_eq!(tables[0], Table::PRIMARY);
    }
}
