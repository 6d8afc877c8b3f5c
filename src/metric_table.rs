//! Mapping from the position of a field in a simulation result line
//! to the name of the metric it carries.
//!
//! Different simulator versions write different field sets; the
//! built-in tables are *not* interchangeable, the table must match the
//! log format that produced the files.

use std::{collections::BTreeMap, fmt::Display, str::FromStr, sync::Arc};

use kstring::KString;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum MetricTableError {
    #[error("metric table {0:?} has no entries")]
    Empty(KString),
    #[error("metric table {table:?}: name {name:?} is used for both positions {first} and {second}")]
    DuplicateName {
        table: KString,
        name: KString,
        first: usize,
        second: usize,
    },
    #[error("metric table {0:?}: empty name at position {1}")]
    EmptyName(KString, usize),
    #[error("metric table {0:?}: positions must be contiguous from 0, missing position {1}")]
    Gap(KString, usize),
    #[error("unknown built-in metric table {0:?}, valid are: all_apps_generic, index_to_name")]
    UnknownBuiltin(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricIndexTable {
    table_name: KString,
    names: Vec<KString>,
}

impl MetricIndexTable {
    pub fn new(table_name: KString, names: Vec<KString>) -> Result<Self, MetricTableError> {
        if names.is_empty() {
            return Err(MetricTableError::Empty(table_name));
        }
        let mut seen: BTreeMap<&str, usize> = BTreeMap::new();
        for (i, name) in names.iter().enumerate() {
            if name.is_empty() {
                return Err(MetricTableError::EmptyName(table_name, i));
            }
            if let Some(first) = seen.insert(name.as_str(), i) {
                return Err(MetricTableError::DuplicateName {
                    table: table_name.clone(),
                    name: name.clone(),
                    first,
                    second: i,
                });
            }
        }
        Ok(Self { table_name, names })
    }

    /// From an explicit position map, as found in config files.
    pub fn from_positions(
        table_name: KString,
        positions: &BTreeMap<usize, KString>,
    ) -> Result<Self, MetricTableError> {
        let mut names = Vec::with_capacity(positions.len());
        for (expected, (position, name)) in positions.iter().enumerate() {
            if *position != expected {
                return Err(MetricTableError::Gap(table_name, expected));
            }
            names.push(name.clone());
        }
        Self::new(table_name, names)
    }

    pub fn builtin(which: BuiltinTable) -> Arc<Self> {
        let names = match which {
            BuiltinTable::AllAppsGeneric => ALL_APPS_GENERIC,
            BuiltinTable::IndexToName => INDEX_TO_NAME,
        };
        Arc::new(
            Self::new(
                KString::from_static(which.as_str()),
                names.iter().map(|s| KString::from_static(*s)).collect(),
            )
            .expect("built-in tables are valid"),
        )
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Number of positions
    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn name_at(&self, position: usize) -> Option<&str> {
        self.names.get(position).map(KString::as_str)
    }

    pub fn position_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n.as_str() == name)
    }

    /// The names in position order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(KString::as_str)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
#[value(rename_all = "snake_case")]
pub enum BuiltinTable {
    /// The layout of the three tier simulator with mobile processing
    AllAppsGeneric,
    /// The layout of the older two tier simulator (no mobile group)
    IndexToName,
}

impl BuiltinTable {
    pub const ALL: [BuiltinTable; 2] = [BuiltinTable::AllAppsGeneric, BuiltinTable::IndexToName];

    pub fn as_str(self) -> &'static str {
        match self {
            BuiltinTable::AllAppsGeneric => "all_apps_generic",
            BuiltinTable::IndexToName => "index_to_name",
        }
    }
}

impl Display for BuiltinTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BuiltinTable {
    type Err = MetricTableError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BuiltinTable::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| MetricTableError::UnknownBuiltin(s.into()))
    }
}

const ALL_APPS_GENERIC: &[&str] = &[
    // ALL
    "num_of_completed_tasks(ALL)",
    "num_of_failed_tasks(ALL)",
    "num_of_uncompleted_tasks(ALL)",
    "num_of_failed_tasks_due_network",
    "average_service_time(ALL)_(sec)",
    "average_processing_time(ALL)_(sec)",
    "average_network_delay(ALL)_(sec)",
    "average_cost",
    "unknown1",
    "num_of_failed_tasks_due_vm_capacity(ALL)",
    "num_of_failed_tasks_due_mobility",
    "unknown2",
    "unknown3",
    "unknown4",
    // Edge
    "num_of_completed_tasks(Edge)",
    "num_of_failed_tasks(Edge)",
    "num_of_uncompleted_tasks(Edge)",
    "unknown5",
    "average_service_time(Edge)_(sec)",
    "average_processing_time(Edge)_(sec)",
    "unknown6",
    "average_server_utilization(Edge)_(%)",
    "num_of_failed_tasks_due_vm_capacity(Edge)",
    // Cloud
    "num_of_completed_tasks(Cloud)",
    "num_of_failed_tasks(Cloud)",
    "num_of_uncompleted_tasks(Cloud)",
    "unknown7",
    "average_service_time(Cloud)_(sec)",
    "average_processing_time(Cloud)_(sec)",
    "unknown8",
    "average_server_utilization(Cloud)_(%)",
    "num_of_failed_tasks_due_vm_capacity(CLOUD)",
    // Mobile
    "num_of_completed_tasks(Mobile)",
    "num_of_failed_tasks(Mobile)",
    "num_of_uncompleted_tasks(Mobile)",
    "unknown9",
    "average_service_time(Mobile)_(sec)",
    "average_processing_time(Mobile)_(sec)",
    "unknown10",
    "average_server_utilization(Mobile)_(%)",
    "num_of_failed_tasks_due_vm_capacity(Mobile)",
    // Network
    "average_network_delay(LAN_delay)_(sec)",
    "average_network_delay(MAN_delay)_(sec)",
    "average_network_delay(WAN_delay)_(sec)",
    "average_network_delay(GSM_delay)_(sec)",
    "num_of_failed_tasks_due_network(WLAN)",
    "num_of_failed_tasks_due_network(MAN)",
    "num_of_failed_tasks_due_network(WAN)",
    "num_of_failed_tasks_due_network(GSM)",
    "unknown11",
    "average_overhead(ns)",
];

/// The layout for simulations without a mobile tier: like
/// `ALL_APPS_GENERIC` without the Mobile group and the GSM/WLAN
/// metrics, with one position less in the ALL group and named
/// network delays per tier. Not verified against simulator output,
/// use a custom table if the logs at hand differ.
const INDEX_TO_NAME: &[&str] = &[
    // ALL
    "num_of_completed_tasks(ALL)",
    "num_of_failed_tasks(ALL)",
    "num_of_uncompleted_tasks(ALL)",
    "num_of_failed_tasks_due_network(ALL)",
    "average_service_time(ALL)_(sec)",
    "average_processing_time(ALL)_(sec)",
    "average_network_delay(ALL)_(sec)",
    "unused(ALL)",
    "average_cost(ALL)",
    "num_of_failed_tasks_due_vm_capacity(ALL)",
    "num_of_failed_tasks_due_mobility(ALL)",
    "average_qoe(ALL)",
    "average_orchestrator_overhead(ALL)",
    // Edge
    "num_of_completed_tasks(Edge)",
    "num_of_failed_tasks(Edge)",
    "num_of_uncompleted_tasks(Edge)",
    "unused(Edge)",
    "average_service_time(Edge)_(sec)",
    "average_processing_time(Edge)_(sec)",
    "average_network_delay(Edge)_(sec)",
    "average_server_utilization(Edge)_(%)",
    "num_of_failed_tasks_due_vm_capacity(Edge)",
    // Cloud
    "num_of_completed_tasks(Cloud)",
    "num_of_failed_tasks(Cloud)",
    "num_of_uncompleted_tasks(Cloud)",
    "unused(Cloud)",
    "average_service_time(Cloud)_(sec)",
    "average_processing_time(Cloud)_(sec)",
    "average_network_delay(Cloud)_(sec)",
    "average_server_utilization(Cloud)_(%)",
    "num_of_failed_tasks_due_vm_capacity(Cloud)",
    // Network
    "average_network_delay(LAN_delay)_(sec)",
    "average_network_delay(MAN_delay)_(sec)",
    "average_network_delay(WAN_delay)_(sec)",
    "unused(Network)",
    "num_of_failed_tasks_due_network(LAN)",
    "num_of_failed_tasks_due_network(MAN)",
    "num_of_failed_tasks_due_network(WAN)",
];
