//! Assembling parsed log records into tables, numeric coercion,
//! sorting, and per (policy, device count) averages.

use std::{borrow::Cow, cmp::Ordering, collections::BTreeMap, sync::Arc};

use genawaiter::rc::Gen;
use kstring::KString;

use crate::{
    log_line::parse_record_line,
    log_tree::SelectedLog,
    metric_table::MetricIndexTable,
    tables::table_view::{ColumnFormatting, Highlight, TableView, format_number},
    warn,
};

/// Key columns preceding the metric columns in the record tables
pub const RECORD_KEY_COLUMNS: [&str; 4] = ["ite", "policy_name", "devices", "category"];
/// Key columns preceding the metric columns in the mean table
pub const MEAN_KEY_COLUMNS: [&str; 2] = ["policy_name", "devices"];

/// One log file's metrics, as text.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    pub ite: KString,
    pub policy: KString,
    pub devices: Option<u64>,
    pub category: KString,
    /// One entry per metric table position
    pub fields: Vec<Option<KString>>,
}

impl LogRecord {
    pub fn from_selected(log: &SelectedLog, table: &MetricIndexTable) -> Self {
        Self {
            ite: KString::from_ref(log.ite),
            policy: KString::from_ref(log.policy),
            devices: log.entry.devices,
            category: KString::from_ref(log.category),
            fields: parse_record_line(&log.entry.line, table),
        }
    }
}

/// Text to number; anything unparseable is missing.
pub fn coerce_numeric(value: Option<&str>) -> Option<f64> {
    let x: f64 = value?.trim().parse().ok()?;
    if x.is_nan() { None } else { Some(x) }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NumericRecord {
    pub ite: KString,
    pub policy: KString,
    pub devices: Option<u64>,
    pub category: KString,
    pub values: Vec<Option<f64>>,
}

impl From<&LogRecord> for NumericRecord {
    fn from(record: &LogRecord) -> Self {
        let LogRecord {
            ite,
            policy,
            devices,
            category,
            fields,
        } = record;
        Self {
            ite: ite.clone(),
            policy: policy.clone(),
            devices: *devices,
            category: category.clone(),
            values: fields
                .iter()
                .map(|field| coerce_numeric(field.as_deref()))
                .collect(),
        }
    }
}

/// Missing device counts sort last.
fn cmp_devices(a: Option<u64>, b: Option<u64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// The per-log-file table (coerced), as written to the raw and
/// sorted CSV files.
#[derive(Debug, Clone)]
pub struct RecordTable {
    name: &'static str,
    metric_table: Arc<MetricIndexTable>,
    pub records: Vec<NumericRecord>,
}

impl RecordTable {
    pub fn from_selected(logs: &[SelectedLog], metric_table: Arc<MetricIndexTable>) -> Self {
        let records = logs
            .iter()
            .map(|log| NumericRecord::from(&LogRecord::from_selected(log, &metric_table)))
            .collect();
        Self {
            name: "logs",
            metric_table,
            records,
        }
    }

    pub fn metric_table(&self) -> &MetricIndexTable {
        &self.metric_table
    }

    /// Stable sort by policy name, then device count.
    pub fn sorted(&self) -> Self {
        let mut records = self.records.clone();
        records.sort_by(|a, b| {
            a.policy
                .cmp(&b.policy)
                .then_with(|| cmp_devices(a.devices, b.devices))
        });
        Self {
            name: "logs_sorted",
            metric_table: self.metric_table.clone(),
            records,
        }
    }

    /// The arithmetic mean of every metric per (policy, device
    /// count), skipping missing values. Records without a device
    /// count are not included.
    pub fn group_means(&self) -> MeanTable {
        // (sum, count) per metric
        let mut groups: BTreeMap<(KString, u64), Vec<(f64, usize)>> = BTreeMap::new();
        let width = self.metric_table.len();
        for record in &self.records {
            let Some(devices) = record.devices else {
                continue;
            };
            let sums = groups
                .entry((record.policy.clone(), devices))
                .or_insert_with(|| vec![(0., 0); width]);
            for (sum, value) in sums.iter_mut().zip(&record.values) {
                if let Some(value) = value {
                    sum.0 += value;
                    sum.1 += 1;
                }
            }
        }

        let rows = groups
            .into_iter()
            .map(|((policy, devices), sums)| MeanRow {
                policy,
                devices,
                values: sums
                    .into_iter()
                    .map(|(sum, count)| {
                        if count == 0 {
                            None
                        } else {
                            Some(sum / count as f64)
                        }
                    })
                    .collect(),
            })
            .collect();

        MeanTable {
            columns: self
                .metric_table
                .names()
                .map(KString::from_ref)
                .collect(),
            rows,
        }
    }
}

impl TableView for RecordTable {
    fn table_name(&self) -> Cow<'_, str> {
        self.name.into()
    }

    fn table_view_header(&self) -> Box<dyn AsRef<[(Cow<'static, str>, ColumnFormatting)]> + '_> {
        let key = ColumnFormatting::String { width_chars: None };
        let mut header: Vec<(Cow<'static, str>, ColumnFormatting)> = vec![
            (RECORD_KEY_COLUMNS[0].into(), key),
            (RECORD_KEY_COLUMNS[1].into(), key),
            (RECORD_KEY_COLUMNS[2].into(), ColumnFormatting::Number),
            (RECORD_KEY_COLUMNS[3].into(), key),
        ];
        header.extend(
            self.metric_table
                .names()
                .map(|name| (Cow::Owned(name.to_string()), ColumnFormatting::Number)),
        );
        Box::new(header)
    }

    fn table_view_body<'s>(
        &'s self,
    ) -> Box<dyn Iterator<Item = Cow<'s, [(Cow<'s, str>, Highlight)]>> + 's> {
        Box::new(
            Gen::new(|co| async move {
                for record in &self.records {
                    let mut vals: Vec<(Cow<str>, Highlight)> = Vec::new();
                    vals.push((record.ite.as_str().into(), Highlight::Neutral));
                    vals.push((record.policy.as_str().into(), Highlight::Neutral));
                    vals.push(format_number(record.devices.map(|d| d as f64)));
                    vals.push((record.category.as_str().into(), Highlight::Neutral));
                    vals.extend(record.values.iter().map(|v| format_number(*v)));
                    co.yield_(vals.into()).await;
                }
            })
            .into_iter(),
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MeanRow {
    pub policy: KString,
    pub devices: u64,
    pub values: Vec<Option<f64>>,
}

/// Averages per (policy, device count), ordered by policy name, then
/// device count.
#[derive(Debug, Clone, PartialEq)]
pub struct MeanTable {
    /// The metric columns (after the key columns)
    pub columns: Vec<KString>,
    pub rows: Vec<MeanRow>,
}

/// A column computed as the sum of other columns.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DerivedMetric {
    pub name: KString,
    pub sum_of: Vec<KString>,
}

impl DerivedMetric {
    pub fn default_metrics() -> Vec<DerivedMetric> {
        vec![DerivedMetric {
            name: KString::from_static("num_of_completed_plus_failed_tasks(ALL)"),
            sum_of: vec![
                KString::from_static("num_of_completed_tasks(ALL)"),
                KString::from_static("num_of_failed_tasks(ALL)"),
            ],
        }]
    }
}

impl MeanTable {
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.as_str() == name)
    }

    pub fn value(&self, row: &MeanRow, column: &str) -> Option<f64> {
        let i = self.column_index(column)?;
        row.values.get(i).copied().flatten()
    }

    /// The distinct policy names, in table order
    pub fn policies(&self) -> Vec<&str> {
        let mut policies: Vec<&str> = self.rows.iter().map(|r| r.policy.as_str()).collect();
        policies.dedup();
        policies
    }

    /// Append the derived column; a sum with a missing input is
    /// missing. Returns false (after a warning) if an input column
    /// does not exist or the name is already taken.
    pub fn add_derived(&mut self, derived: &DerivedMetric) -> bool {
        if self.column_index(&derived.name).is_some() {
            warn!(
                "derived metric {:?} clashes with an existing column, skipping it",
                derived.name
            );
            return false;
        }
        let mut inputs = Vec::with_capacity(derived.sum_of.len());
        for input in &derived.sum_of {
            let Some(i) = self.column_index(input) else {
                warn!(
                    "derived metric {:?}: input column {input:?} does not exist in the \
                     metric table, skipping it",
                    derived.name
                );
                return false;
            };
            inputs.push(i);
        }
        for row in &mut self.rows {
            let sum = inputs
                .iter()
                .map(|i| row.values[*i])
                .try_fold(0., |acc, v| Some(acc + v?));
            row.values.push(sum);
        }
        self.columns.push(derived.name.clone());
        true
    }
}

impl TableView for MeanTable {
    fn table_name(&self) -> Cow<'_, str> {
        "logs_mean".into()
    }

    fn table_view_header(&self) -> Box<dyn AsRef<[(Cow<'static, str>, ColumnFormatting)]> + '_> {
        let mut header: Vec<(Cow<'static, str>, ColumnFormatting)> = vec![
            (
                MEAN_KEY_COLUMNS[0].into(),
                ColumnFormatting::String { width_chars: None },
            ),
            (MEAN_KEY_COLUMNS[1].into(), ColumnFormatting::Number),
        ];
        header.extend(
            self.columns
                .iter()
                .map(|name| (Cow::Owned(name.to_string()), ColumnFormatting::Number)),
        );
        Box::new(header)
    }

    fn table_view_body<'s>(
        &'s self,
    ) -> Box<dyn Iterator<Item = Cow<'s, [(Cow<'s, str>, Highlight)]>> + 's> {
        Box::new(
            Gen::new(|co| async move {
                for row in &self.rows {
                    let mut vals: Vec<(Cow<str>, Highlight)> = Vec::new();
                    vals.push((row.policy.as_str().into(), Highlight::Neutral));
                    vals.push(format_number(Some(row.devices as f64)));
                    vals.extend(row.values.iter().map(|v| format_number(*v)));
                    co.yield_(vals.into()).await;
                }
            })
            .into_iter(),
        )
    }
}
