//! Reading the categorized `<date>/<iteration>/<policy>/<category>/`
//! tree back in, and selecting from it.

use std::{collections::BTreeMap, fmt::Display, path::Path, str::FromStr};

use anyhow::{Context, Result, anyhow, bail};
use itertools::Itertools;
use kstring::KString;

use crate::{
    debug, info,
    log_filename::FilenameLayout,
    log_line::{convert_to_single_line, read_record_line},
    utillib::natural_sort::{natural_cmp, natural_sort},
    warn,
};

/// Directories in the date directory that hold our own output, not
/// iterations.
pub const OUTPUT_DIRS: &[&str] = &["csv", "graph"];

#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub file_name: KString,
    /// None if the file name does not carry a (unique) device count
    pub devices: Option<u64>,
    /// The record line, i.e. the single-line contents of the file
    pub line: String,
}

/// Category name -> log entries in natural file name order
pub type CategoryLogs = BTreeMap<KString, Vec<LogEntry>>;
/// Policy name -> categories
pub type PolicyLogs = BTreeMap<KString, CategoryLogs>;

#[derive(Debug, Default, Clone, PartialEq)]
pub struct LogTree {
    /// Iteration name -> policies
    pub iterations: BTreeMap<KString, PolicyLogs>,
}

/// The names of the subdirectories of `dir`, naturally sorted.
fn sub_dirs(dir: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in std::fs::read_dir(dir).with_context(|| anyhow!("opening dir {dir:?}"))? {
        let entry = entry.with_context(|| anyhow!("listing dir {dir:?}"))?;
        let file_type = entry
            .file_type()
            .with_context(|| anyhow!("getting file type of {:?}", entry.path()))?;
        if file_type.is_dir() {
            match entry.file_name().into_string() {
                Ok(name) => names.push(name),
                Err(name) => warn!("ignoring dir with non-UTF-8 name {name:?} in {dir:?}"),
            }
        }
    }
    natural_sort(&mut names);
    Ok(names)
}

fn read_category_dir(dir: &Path, layout: &FilenameLayout) -> Result<Vec<LogEntry>> {
    let mut file_names = Vec::new();
    for entry in std::fs::read_dir(dir).with_context(|| anyhow!("opening dir {dir:?}"))? {
        let entry = entry.with_context(|| anyhow!("listing dir {dir:?}"))?;
        if let Ok(name) = entry.file_name().into_string() {
            if layout.is_log_file(&name) && entry.path().is_file() {
                file_names.push(name);
            }
        }
    }
    natural_sort(&mut file_names);

    let mut entries = Vec::with_capacity(file_names.len());
    for file_name in file_names {
        let path = dir.join(&file_name);
        if let Err(e) = convert_to_single_line(&path) {
            warn!("error converting log file to a single line: {e:#}");
            continue;
        }
        let line = match read_record_line(&path) {
            Ok(Some(line)) => line,
            Ok(None) => {
                warn!("skipping empty log file {path:?}");
                continue;
            }
            Err(e) => {
                warn!("{e:#}");
                continue;
            }
        };
        let devices = match layout.device_count(&file_name) {
            Ok(devices) => devices,
            Err(e) => {
                warn!("{e}");
                None
            }
        };
        debug!("read {path:?}");
        entries.push(LogEntry {
            file_name: file_name.into(),
            devices,
            line,
        });
    }
    Ok(entries)
}

impl LogTree {
    /// Read all log files below `date_dir`, converting them to
    /// single-line form on the way.
    pub fn read(date_dir: &Path, layout: &FilenameLayout) -> Result<Self> {
        let mut tree = LogTree::default();
        let mut num_logs = 0;
        for ite in sub_dirs(date_dir)? {
            if OUTPUT_DIRS.contains(&ite.as_str()) {
                continue;
            }
            let ite_dir = date_dir.join(&ite);
            let mut policies = PolicyLogs::new();
            for policy in sub_dirs(&ite_dir)? {
                let policy_dir = ite_dir.join(&policy);
                let mut categories = CategoryLogs::new();
                for category in sub_dirs(&policy_dir)? {
                    let entries = read_category_dir(&policy_dir.join(&category), layout)?;
                    if entries.is_empty() {
                        continue;
                    }
                    num_logs += entries.len();
                    categories.insert(category.into(), entries);
                }
                // Left-over directories from the extraction
                if categories.is_empty() {
                    debug!("no logs in {policy_dir:?}, ignoring it");
                    continue;
                }
                policies.insert(policy.into(), categories);
            }
            tree.iterations.insert(ite.into(), policies);
        }
        info!(
            "read {num_logs} log files: {} iterations, {} policies, {} categories",
            tree.iterations.len(),
            tree.all_policies().len(),
            tree.all_categories().len()
        );
        Ok(tree)
    }

    pub fn num_logs(&self) -> usize {
        self.iterations
            .values()
            .flat_map(|policies| policies.values())
            .flat_map(|categories| categories.values())
            .map(Vec::len)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.num_logs() == 0
    }

    /// Iteration names, naturally sorted
    pub fn iteration_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.iterations.keys().map(KString::as_str).collect();
        natural_sort(&mut names);
        names
    }

    fn policies_of<'s>(&'s self, ites: &[&str]) -> Vec<&'s str> {
        ites.iter()
            .filter_map(|ite| self.iterations.get(*ite))
            .flat_map(|policies| policies.keys().map(KString::as_str))
            .sorted_by(|a, b| natural_cmp(a, b))
            .dedup()
            .collect()
    }

    fn categories_of<'s>(&'s self, ites: &[&str], policies: &[&str]) -> Vec<&'s str> {
        let mut names: Vec<&str> = Vec::new();
        for ite in ites {
            let Some(policy_logs) = self.iterations.get(*ite) else {
                continue;
            };
            for policy in policies {
                if let Some(categories) = policy_logs.get(*policy) {
                    names.extend(categories.keys().map(KString::as_str));
                }
            }
        }
        names.sort_by(|a, b| natural_cmp(a, b));
        names.dedup();
        names
    }

    pub fn all_policies(&self) -> Vec<&str> {
        self.policies_of(&self.iteration_names())
    }

    pub fn all_categories(&self) -> Vec<&str> {
        let ites = self.iteration_names();
        self.categories_of(&ites, &self.policies_of(&ites))
    }

    /// The log entries matching the selection, ordered by iteration,
    /// policy, category (each naturally sorted), then file name. A
    /// selection of a single name that does not occur among the
    /// candidates left by the previous selections is an error.
    pub fn select(&self, selection: &TreeSelection) -> Result<Vec<SelectedLog<'_>>> {
        let ites = selection
            .ite
            .apply(self.iteration_names())
            .context("selecting iteration")?;
        let policies = selection
            .policy
            .apply(self.policies_of(&ites))
            .context("selecting policy")?;
        let categories = selection
            .category
            .apply(self.categories_of(&ites, &policies))
            .context("selecting category")?;

        let mut selected = Vec::new();
        for &ite in &ites {
            let Some(policy_logs) = self.iterations.get(ite) else {
                continue;
            };
            for &policy in &policies {
                let Some(category_logs) = policy_logs.get(policy) else {
                    continue;
                };
                for &category in &categories {
                    let Some(entries) = category_logs.get(category) else {
                        continue;
                    };
                    for entry in entries {
                        selected.push(SelectedLog {
                            ite,
                            policy,
                            category,
                            entry,
                        });
                    }
                }
            }
        }
        Ok(selected)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectedLog<'t> {
    pub ite: &'t str,
    pub policy: &'t str,
    pub category: &'t str,
    pub entry: &'t LogEntry,
}

/// Choice of all or one of the available names.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Selection {
    #[default]
    All,
    One(KString),
}

impl Selection {
    fn apply<'s>(&self, candidates: Vec<&'s str>) -> Result<Vec<&'s str>> {
        match self {
            Selection::All => Ok(candidates),
            Selection::One(name) => {
                if let Some(found) = candidates.iter().find(|c| **c == name.as_str()) {
                    Ok(vec![*found])
                } else {
                    bail!("{name:?} is not available, valid choices are: {candidates:?}")
                }
            }
        }
    }

    /// The part representing this selection in output file names,
    /// e.g. `all_ites`.
    pub fn file_name_part<'s>(&'s self, all_name: &'s str) -> &'s str {
        match self {
            Selection::All => all_name,
            Selection::One(name) => name.as_str(),
        }
    }
}

impl FromStr for Selection {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "" => bail!("empty selection, give a name or \"all\""),
            "all" | "ALL" | "0" => Ok(Selection::All),
            _ => Ok(Selection::One(KString::from_ref(s))),
        }
    }
}

impl Display for Selection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Selection::All => f.write_str("all"),
            Selection::One(name) => f.write_str(name),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TreeSelection {
    pub ite: Selection,
    pub policy: Selection,
    pub category: Selection,
}

impl TreeSelection {
    /// `<ite>_<policy>_<category>` as used in the table file names
    pub fn file_name_part(&self) -> String {
        format!(
            "{}_{}_{}",
            self.ite.file_name_part("all_ites"),
            self.policy.file_name_part("all_policies"),
            self.category.file_name_part("all_categories")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(path: &Path, contents: &str) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    }

    fn sample_tree() -> (tempfile::TempDir, LogTree) {
        let dir = tempfile::tempdir().unwrap();
        let d = dir.path();
        write(&d.join("ite10/ONLY_EDGE/APP/S_TIER_ONLY_EDGE_100DEVICES_APP.log"), "1;2");
        write(&d.join("ite2/ONLY_EDGE/APP/S_TIER_ONLY_EDGE_1000DEVICES_APP.log"), "h\n5;6\n");
        write(&d.join("ite2/ONLY_EDGE/APP/S_TIER_ONLY_EDGE_200DEVICES_APP.log"), "3;4");
        write(&d.join("ite2/ONLY_EDGE/APP/empty.log"), "");
        write(&d.join("ite2/ONLY_EDGE/APP/notes.txt"), "x");
        write(&d.join("ite2/FUZZY_BASED/OTHER/S_TIER_FUZZY_BASED_100DEVICES_OTHER.log"), "7");
        write(&d.join("csv/x.csv"), "");
        let tree = LogTree::read(d, &FilenameLayout::default()).unwrap();
        (dir, tree)
    }

    #[test]
    fn t_read() {
        let (dir, tree) = sample_tree();
        assert_eq!(tree.iteration_names(), ["ite2", "ite10"]);
        assert_eq!(tree.all_policies(), ["FUZZY_BASED", "ONLY_EDGE"]);
        assert_eq!(tree.all_categories(), ["APP", "OTHER"]);
        assert_eq!(tree.num_logs(), 4);

        let entries = &tree.iterations["ite2"]["ONLY_EDGE"]["APP"];
        let names: Vec<&str> = entries.iter().map(|e| e.file_name.as_str()).collect();
        assert_eq!(
            names,
            [
                "S_TIER_ONLY_EDGE_200DEVICES_APP.log",
                "S_TIER_ONLY_EDGE_1000DEVICES_APP.log"
            ]
        );
        assert_eq!(entries[1].devices, Some(1000));
        assert_eq!(entries[1].line, "5;6");
        // rewritten on disk
        assert_eq!(
            std::fs::read_to_string(
                dir.path()
                    .join("ite2/ONLY_EDGE/APP/S_TIER_ONLY_EDGE_1000DEVICES_APP.log")
            )
            .unwrap(),
            "5;6"
        );
    }

    #[test]
    fn t_select() {
        let (_dir, tree) = sample_tree();
        let all = tree.select(&TreeSelection::default()).unwrap();
        let keys: Vec<(&str, &str, u64)> = all
            .iter()
            .map(|s| (s.ite, s.policy, s.entry.devices.unwrap()))
            .collect();
        assert_eq!(
            keys,
            [
                ("ite2", "FUZZY_BASED", 100),
                ("ite2", "ONLY_EDGE", 200),
                ("ite2", "ONLY_EDGE", 1000),
                ("ite10", "ONLY_EDGE", 100)
            ]
        );

        let sel = TreeSelection {
            ite: "ite10".parse().unwrap(),
            policy: "0".parse().unwrap(),
            category: "all".parse().unwrap(),
        };
        assert_eq!(tree.select(&sel).unwrap().len(), 1);
        assert_eq!(sel.file_name_part(), "ite10_all_policies_all_categories");

        // FUZZY_BASED does not occur in ite10
        let sel = TreeSelection {
            policy: "FUZZY_BASED".parse().unwrap(),
            ..sel
        };
        assert!(tree.select(&sel).is_err());
    }

    #[test]
    fn t_selection_parse() {
        assert_eq!("0".parse::<Selection>().unwrap(), Selection::All);
        assert_eq!("ALL".parse::<Selection>().unwrap(), Selection::All);
        assert_eq!(
            "ite1".parse::<Selection>().unwrap(),
            Selection::One(KString::from_static("ite1"))
        );
        assert!("".parse::<Selection>().is_err());
        assert_eq!(
            TreeSelection::default().file_name_part(),
            "all_ites_all_policies_all_categories"
        );
    }
}
