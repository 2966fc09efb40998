// ── Node classification ──
//
// Partitions a device's data-point names into fixed categories by exact
// membership in a reference table. Names in no table are left out of
// every category. Results follow table order, so the same name set always
// yields the same partition whatever order it arrives in.

use std::collections::HashSet;

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

use crate::command::ControlKind;
use crate::error::CoreError;

// ── Built-in reference table ─────────────────────────────────────────

const MEASUREMENTS: &[&str] = &[
    "Active_Power_kW",
    "Reactive_Power_kVAr",
    "Apparent_Power_kVA",
    "Power_Factor",
    "Frequency_Hz",
    "Voltage_L1_V",
    "Voltage_L2_V",
    "Voltage_L3_V",
    "Current_L1_A",
    "Current_L2_A",
    "Current_L3_A",
    "Energy_Exported_kWh",
    "Energy_Imported_kWh",
    "Irradiance_W_m2",
    "Module_Temperature_C",
    "Ambient_Temperature_C",
];

const DIGITAL_SIGNALS: &[&str] = &[
    "DI_Main_Breaker_Closed",
    "DI_Main_Breaker_Tripped",
    "DI_Grid_Protection_Trip",
    "DI_Inverter_Fault",
    "DI_Transformer_Alarm",
    "DI_Door_Open",
    "DI_UPS_On_Battery",
    "DI_Status_Bits",
];

const COMMANDS: &[&str] = &[
    "CMD_Instant_Cutoff_Feedback",
    "CMD_Active_Power_Setpoint_Feedback",
    "CMD_Reactive_Power_Setpoint_Feedback",
    "CMD_Power_Factor_Setpoint_Feedback",
    "CMD_Remote_Reset_Feedback",
];

const USER_COMMANDS: &[&str] = &[
    "CMD_Instant_Cutoff",
    "CMD_Active_Power_Setpoint_kW",
    "CMD_Reactive_Power_Setpoint_kVAr",
    "CMD_Power_Factor_Setpoint",
    "CMD_Remote_Reset",
    "CMD_Curtailment_Enabled",
];

const TOGGLES: &[&str] = &["CMD_Instant_Cutoff", "CMD_Remote_Reset"];

const SETPOINTS: &[&str] = &[
    "CMD_Active_Power_Setpoint_kW",
    "CMD_Reactive_Power_Setpoint_kVAr",
    "CMD_Power_Factor_Setpoint",
];

// ── NodeCategory ─────────────────────────────────────────────────────

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display, strum::EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum NodeCategory {
    Measurement,
    DigitalSignal,
    Command,
    UserCommand,
}

// ── Tables ───────────────────────────────────────────────────────────

/// Serializable form of the reference table, as read from configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifierTables {
    #[serde(default)]
    pub measurements: Vec<String>,
    #[serde(default)]
    pub digital_signals: Vec<String>,
    #[serde(default)]
    pub commands: Vec<String>,
    #[serde(default)]
    pub user_commands: Vec<String>,
    /// Writable user-commands driven by an on/off switch.
    #[serde(default)]
    pub toggles: Vec<String>,
    /// Writable user-commands taking a numeric setpoint.
    #[serde(default)]
    pub setpoints: Vec<String>,
}

impl Default for ClassifierTables {
    fn default() -> Self {
        let owned = |names: &[&str]| names.iter().map(|s| (*s).to_owned()).collect();
        Self {
            measurements: owned(MEASUREMENTS),
            digital_signals: owned(DIGITAL_SIGNALS),
            commands: owned(COMMANDS),
            user_commands: owned(USER_COMMANDS),
            toggles: owned(TOGGLES),
            setpoints: owned(SETPOINTS),
        }
    }
}

// ── Classification ───────────────────────────────────────────────────

/// One device's data points grouped by category, in table order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub measurements: Vec<String>,
    pub digital_signals: Vec<String>,
    pub commands: Vec<String>,
    pub user_commands: Vec<String>,
}

impl Classification {
    pub fn category(&self, category: NodeCategory) -> &[String] {
        match category {
            NodeCategory::Measurement => &self.measurements,
            NodeCategory::DigitalSignal => &self.digital_signals,
            NodeCategory::Command => &self.commands,
            NodeCategory::UserCommand => &self.user_commands,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.measurements.is_empty()
            && self.digital_signals.is_empty()
            && self.commands.is_empty()
            && self.user_commands.is_empty()
    }
}

// ── NodeClassifier ───────────────────────────────────────────────────

/// Validated reference table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeClassifier {
    measurements: IndexSet<String>,
    digital_signals: IndexSet<String>,
    commands: IndexSet<String>,
    user_commands: IndexSet<String>,
    writable: IndexMap<String, ControlKind>,
}

impl Default for NodeClassifier {
    fn default() -> Self {
        // Built-in tables are known to be valid.
        Self::build(ClassifierTables::default())
    }
}

impl NodeClassifier {
    /// Validate and load a reference table.
    ///
    /// The four category sets must be pairwise disjoint, toggles and
    /// setpoints must not overlap, and every writable name must be a
    /// user-command.
    pub fn from_tables(tables: ClassifierTables) -> Result<Self, CoreError> {
        let sets: [(&str, &Vec<String>); 4] = [
            ("measurements", &tables.measurements),
            ("digital_signals", &tables.digital_signals),
            ("commands", &tables.commands),
            ("user_commands", &tables.user_commands),
        ];
        let mut owner: IndexMap<&str, &str> = IndexMap::new();
        for (table, names) in sets {
            for name in names {
                if let Some(prev) = owner.insert(name.as_str(), table) {
                    if prev != table {
                        return Err(invalid(format!(
                            "'{name}' appears in both {prev} and {table}"
                        )));
                    }
                }
            }
        }

        let user: HashSet<&str> = tables.user_commands.iter().map(String::as_str).collect();
        let toggles: HashSet<&str> = tables.toggles.iter().map(String::as_str).collect();
        for name in tables.toggles.iter().chain(&tables.setpoints) {
            if !user.contains(name.as_str()) {
                return Err(invalid(format!("writable '{name}' is not a user-command")));
            }
        }
        if let Some(both) = tables.setpoints.iter().find(|n| toggles.contains(n.as_str())) {
            return Err(invalid(format!("'{both}' is both a toggle and a setpoint")));
        }

        Ok(Self::build(tables))
    }

    fn build(tables: ClassifierTables) -> Self {
        let mut writable = IndexMap::new();
        for name in tables.toggles {
            writable.insert(name, ControlKind::Toggle);
        }
        for name in tables.setpoints {
            writable.insert(name, ControlKind::Setpoint);
        }
        Self {
            measurements: tables.measurements.into_iter().collect(),
            digital_signals: tables.digital_signals.into_iter().collect(),
            commands: tables.commands.into_iter().collect(),
            user_commands: tables.user_commands.into_iter().collect(),
            writable,
        }
    }

    /// The category `name` belongs to, if any.
    pub fn category_of(&self, name: &str) -> Option<NodeCategory> {
        if self.measurements.contains(name) {
            Some(NodeCategory::Measurement)
        } else if self.digital_signals.contains(name) {
            Some(NodeCategory::DigitalSignal)
        } else if self.commands.contains(name) {
            Some(NodeCategory::Command)
        } else if self.user_commands.contains(name) {
            Some(NodeCategory::UserCommand)
        } else {
            None
        }
    }

    /// How a writable user-command is driven; `None` if it has no control.
    pub fn writable_kind(&self, name: &str) -> Option<ControlKind> {
        self.writable.get(name).copied()
    }

    /// Partition `names`. Unknown names are dropped.
    pub fn classify<'a, I>(&self, names: I) -> Classification
    where
        I: IntoIterator<Item = &'a str>,
    {
        let present: HashSet<&str> = names.into_iter().collect();
        let pick = |table: &IndexSet<String>| {
            table
                .iter()
                .filter(|n| present.contains(n.as_str()))
                .cloned()
                .collect()
        };
        Classification {
            measurements: pick(&self.measurements),
            digital_signals: pick(&self.digital_signals),
            commands: pick(&self.commands),
            user_commands: pick(&self.user_commands),
        }
    }

    /// Export the table, e.g. for `config show`.
    pub fn tables(&self) -> ClassifierTables {
        let kind = |k: ControlKind| {
            self.writable
                .iter()
                .filter(|(_, v)| **v == k)
                .map(|(n, _)| n.clone())
                .collect()
        };
        ClassifierTables {
            measurements: self.measurements.iter().cloned().collect(),
            digital_signals: self.digital_signals.iter().cloned().collect(),
            commands: self.commands.iter().cloned().collect(),
            user_commands: self.user_commands.iter().cloned().collect(),
            toggles: kind(ControlKind::Toggle),
            setpoints: kind(ControlKind::Setpoint),
        }
    }
}

fn invalid(message: String) -> CoreError {
    CoreError::Config {
        message: format!("classifier table: {message}"),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn unknown_field_is_in_no_category() {
        let c = NodeClassifier::default();
        let out = c.classify(["Unknown_Field_X"]);
        assert!(out.is_empty());
        assert_eq!(c.category_of("Unknown_Field_X"), None);
    }

    #[test]
    fn instant_cutoff_is_a_writable_toggle() {
        let c = NodeClassifier::default();
        let out = c.classify(["CMD_Instant_Cutoff"]);
        assert_eq!(out.user_commands, ["CMD_Instant_Cutoff"]);
        assert_eq!(c.writable_kind("CMD_Instant_Cutoff"), Some(ControlKind::Toggle));
        assert_eq!(
            c.writable_kind("CMD_Active_Power_Setpoint_kW"),
            Some(ControlKind::Setpoint)
        );
        assert_eq!(c.writable_kind("CMD_Curtailment_Enabled"), None);
    }

    #[test]
    fn partition_is_independent_of_input_order() {
        let c = NodeClassifier::default();
        let a = c.classify(["DI_Door_Open", "Frequency_Hz", "Active_Power_kW", "CMD_Remote_Reset"]);
        let b = c.classify(["CMD_Remote_Reset", "Active_Power_kW", "DI_Door_Open", "Frequency_Hz"]);
        assert_eq!(a, b);
        assert_eq!(a.measurements, ["Active_Power_kW", "Frequency_Hz"]);
        assert_eq!(a.category(NodeCategory::DigitalSignal), ["DI_Door_Open"]);
    }

    #[test]
    fn overlapping_tables_are_rejected() {
        let tables = ClassifierTables {
            measurements: vec!["X".into()],
            commands: vec!["X".into()],
            ..ClassifierTables::default()
        };
        let err = NodeClassifier::from_tables(tables).unwrap_err();
        assert!(err.to_string().contains("'X' appears in both"));
    }

    #[test]
    fn writable_must_be_a_user_command() {
        let tables = ClassifierTables {
            toggles: vec!["Active_Power_kW".into()],
            ..ClassifierTables::default()
        };
        assert!(NodeClassifier::from_tables(tables).is_err());
    }

    #[test]
    fn toggle_and_setpoint_cannot_overlap() {
        let tables = ClassifierTables {
            setpoints: vec!["CMD_Instant_Cutoff".into()],
            ..ClassifierTables::default()
        };
        assert!(NodeClassifier::from_tables(tables).is_err());
    }

    #[test]
    fn default_tables_round_trip_through_validation() {
        let c = NodeClassifier::from_tables(ClassifierTables::default()).unwrap();
        assert_eq!(c, NodeClassifier::default());
        assert_eq!(c.tables(), ClassifierTables::default());
    }
}
