use std::{
    ffi::OsString,
    fs::rename,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, anyhow};

/// Append `.{extension}` to the file name, keeping any existing
/// extensions. None if `path` has no file name.
pub fn add_extension(path: &Path, extension: &str) -> Option<PathBuf> {
    let mut file_name: OsString = path.file_name()?.to_owned();
    file_name.push(".");
    file_name.push(extension);
    Some(path.with_file_name(file_name))
}

pub fn xrename(from: &Path, to: &Path) -> Result<()> {
    rename(from, to).with_context(|| anyhow!("renaming {from:?} to {to:?}"))?;
    Ok(())
}

/// Returns true if the directory was created.
pub fn create_dir_if_not_exists(dir: &Path) -> Result<bool> {
    if dir.is_dir() {
        return Ok(false);
    }
    std::fs::create_dir_all(dir).with_context(|| anyhow!("creating directory {dir:?}"))?;
    Ok(true)
}

/// Returns true if the directory existed and was removed.
pub fn remove_dir_all_if_exists(dir: &Path) -> Result<bool> {
    match std::fs::remove_dir_all(dir) {
        Ok(()) => Ok(true),
        Err(e) => match e.kind() {
            std::io::ErrorKind::NotFound => Ok(false),
            _ => Err(e).with_context(|| anyhow!("removing directory {dir:?}")),
        },
    }
}

/// Move `from` to `to`, falling back to copy and delete when a plain
/// rename is not possible (e.g. across file systems).
pub fn move_path(from: &Path, to: &Path) -> Result<()> {
    if rename(from, to).is_ok() {
        return Ok(());
    }
    if from.is_dir() {
        move_dir_entries(from, to)
    } else {
        std::fs::copy(from, to).with_context(|| anyhow!("copying {from:?} to {to:?}"))?;
        std::fs::remove_file(from).with_context(|| anyhow!("removing {from:?} after copy"))?;
        Ok(())
    }
}

fn move_dir_entries(from: &Path, to: &Path) -> Result<()> {
    create_dir_if_not_exists(to)?;
    for entry in std::fs::read_dir(from).with_context(|| anyhow!("opening dir {from:?}"))? {
        let entry = entry.with_context(|| anyhow!("listing dir {from:?}"))?;
        move_path(&entry.path(), &to.join(entry.file_name()))?;
    }
    std::fs::remove_dir(from).with_context(|| anyhow!("removing emptied dir {from:?}"))
}
