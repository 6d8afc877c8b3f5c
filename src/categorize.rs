//! Moving extracted log files into a `<policy>/<category>/` tree.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use walkdir::WalkDir;

use crate::{
    debug, info,
    io_utils::div::{create_dir_if_not_exists, move_path},
    log_filename::{FilenameLayout, LogFileName},
    warn,
};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CategorizeStats {
    pub moved: usize,
    /// Files that were already in their target directory
    pub in_place: usize,
    /// Log files whose policy or category could not be determined
    pub skipped: usize,
    pub ambiguous: usize,
}

impl std::ops::AddAssign for CategorizeStats {
    fn add_assign(&mut self, other: Self) {
        self.moved += other.moved;
        self.in_place += other.in_place;
        self.skipped += other.skipped;
        self.ambiguous += other.ambiguous;
    }
}

/// The directory a log file belongs in, below `root`.
pub fn target_dir(root: &Path, name: &LogFileName) -> PathBuf {
    root.join(name.policy.as_str()).join(name.category.as_str())
}

/// Walk all files below `root` and move each log file with a
/// parseable name into `root/<policy>/<category>/`. Files already
/// there are left alone, hence running this again has no effect.
pub fn categorize_logs(root: &Path, layout: &FilenameLayout) -> Result<CategorizeStats> {
    let mut stats = CategorizeStats::default();

    // Collect first, as we modify the tree.
    let mut files: Vec<PathBuf> = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.with_context(|| anyhow!("walking dir {root:?}"))?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }

    for path in files {
        let Some(file_name) = path.file_name().and_then(|s| s.to_str()) else {
            continue;
        };
        if !layout.is_log_file(file_name) {
            continue;
        }
        let name = match layout.parse(file_name) {
            Ok(Some(name)) => name,
            Ok(None) => {
                debug!("cannot categorize log file {path:?}, skipping");
                stats.skipped += 1;
                continue;
            }
            Err(e) => {
                warn!("{e}, leaving {path:?} in place");
                stats.ambiguous += 1;
                continue;
            }
        };

        let dir = target_dir(root, &name);
        if path.parent() == Some(dir.as_path()) {
            stats.in_place += 1;
            continue;
        }
        create_dir_if_not_exists(&dir)?;
        let target = dir.join(file_name);
        if target.exists() {
            warn!("replacing {target:?} with {path:?}");
        }
        move_path(&path, &target)?;
        info!("moved {path:?} to {target:?}");
        stats.moved += 1;
    }

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FUZZY: &str = "SIMRESULT_TWO_TIER_WITH_EO_FUZZY_BASED_2000DEVICES_ALL_APPS_GENERIC.log";

    fn files_below(root: &Path) -> Vec<String> {
        let mut v: Vec<String> = WalkDir::new(root)
            .into_iter()
            .map(|e| e.unwrap())
            .filter(|e| e.file_type().is_file())
            .map(|e| {
                e.path()
                    .strip_prefix(root)
                    .unwrap()
                    .to_string_lossy()
                    .into_owned()
            })
            .collect();
        v.sort();
        v
    }

    #[test]
    fn t_categorize() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("nested")).unwrap();
        std::fs::write(root.join("nested").join(FUZZY), "h\n1;2").unwrap();
        std::fs::write(
            root.join("SIMRESULT_THREE_TIER_ONLY_EDGE_100DEVICES_HEALTH_APP.log"),
            "1",
        )
        .unwrap();
        std::fs::write(root.join("notes.log"), "x").unwrap();
        std::fs::write(root.join("readme.txt"), "x").unwrap();
        std::fs::write(root.join("THREE_TIER_A_TIER_B_10DEVICES_C.log"), "x").unwrap();

        let layout = FilenameLayout::default();
        let stats = categorize_logs(root, &layout).unwrap();
        assert_eq!(
            stats,
            CategorizeStats {
                moved: 2,
                in_place: 0,
                skipped: 1,
                ambiguous: 1
            }
        );
        let expected = [
            format!("FUZZY_BASED/ALL_APPS_GENERIC/{FUZZY}"),
            "ONLY_EDGE/HEALTH_APP/SIMRESULT_THREE_TIER_ONLY_EDGE_100DEVICES_HEALTH_APP.log".into(),
            "THREE_TIER_A_TIER_B_10DEVICES_C.log".into(),
            "notes.log".into(),
            "readme.txt".into(),
        ];
        assert_eq!(files_below(root), expected);

        // Idempotent
        let stats = categorize_logs(root, &layout).unwrap();
        assert_eq!(
            stats,
            CategorizeStats {
                moved: 0,
                in_place: 2,
                skipped: 1,
                ambiguous: 1
            }
        );
        assert_eq!(files_below(root), expected);
    }
}
