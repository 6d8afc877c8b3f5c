//! The configuration of an evaluation: where to find the simulation
//! output, how to read it, what to derive and how to chart it.

use std::{collections::BTreeMap, path::PathBuf, sync::Arc};

use anyhow::Result;
use kstring::KString;

use crate::{
    aggregate::DerivedMetric,
    config_file::LoadConfigFile,
    log_filename::FilenameLayout,
    metric_table::{BuiltinTable, MetricIndexTable},
    plot::PlotConfig,
};

pub const DEFAULT_CONFIG_FILE_STEM: &str = "edgesim-eval";

/// Either the name of a built-in table, or a custom position -> name
/// map.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum MetricTableConfig {
    Builtin(BuiltinTable),
    Custom {
        name: KString,
        positions: BTreeMap<usize, KString>,
    },
}

impl Default for MetricTableConfig {
    fn default() -> Self {
        MetricTableConfig::Builtin(BuiltinTable::AllAppsGeneric)
    }
}

impl MetricTableConfig {
    pub fn load(&self) -> Result<Arc<MetricIndexTable>> {
        match self {
            MetricTableConfig::Builtin(which) => Ok(MetricIndexTable::builtin(*which)),
            MetricTableConfig::Custom { name, positions } => Ok(Arc::new(
                MetricIndexTable::from_positions(name.clone(), positions)?,
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct EvalConfig {
    /// The directory containing the `<date_time>/default_config/`
    /// directories written by the simulator
    pub input_base: PathBuf,
    /// Where `<date_time>/` evaluation directories are created
    pub evaluation_dir: PathBuf,
    pub metric_table: MetricTableConfig,
    pub filename_layout: FilenameLayout,
    /// Columns appended to the table of means
    pub derived_metrics: Vec<DerivedMetric>,
    pub plot: PlotConfig,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            input_base: "output".into(),
            evaluation_dir: "evaluation".into(),
            metric_table: MetricTableConfig::default(),
            filename_layout: FilenameLayout::default(),
            derived_metrics: DerivedMetric::default_metrics(),
            plot: PlotConfig::default(),
        }
    }
}

impl LoadConfigFile for EvalConfig {
    fn default_config_path_without_suffix() -> Result<Option<PathBuf>> {
        Ok(Some(DEFAULT_CONFIG_FILE_STEM.into()))
    }
}

impl EvalConfig {
    /// Load from `path`, or the default location, or use the
    /// defaults.
    pub fn load(path: Option<&PathBuf>) -> Result<Self> {
        let config = Self::load_config(path, |_| Ok(Self::default()))?;
        config.plot.check()?;
        Ok(config)
    }
}
