//! Loading configuration files in any of the supported formats,
//! chosen by file name extension.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use serde::de::DeserializeOwned;

use crate::{info, io_utils::div::add_extension};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigBackend {
    Json5,
    Ron,
    Yaml,
}

impl ConfigBackend {
    pub fn load_config_file<T: DeserializeOwned>(self, path: &Path) -> Result<T> {
        let s = std::fs::read_to_string(path)
            .with_context(|| anyhow!("loading config file from {path:?}"))?;
        self.parse_str(&s)
            .with_context(|| anyhow!("config file {path:?}"))
    }

    pub fn parse_str<T: DeserializeOwned>(self, s: &str) -> Result<T> {
        match self {
            ConfigBackend::Json5 => {
                serde_json5::from_str(s).map_err(|e| anyhow!("decoding JSON5: {e}"))
            }
            ConfigBackend::Ron => ron::from_str(s).map_err(|e| anyhow!("decoding RON: {e}")),
            ConfigBackend::Yaml => {
                serde_yml::from_str(s).map_err(|e| anyhow!("decoding YAML: {e}"))
            }
        }
    }
}

/// In the order in which they are tried at the default location.
pub const FILE_EXTENSIONS: &[(&str, ConfigBackend)] = &[
    ("json5", ConfigBackend::Json5),
    ("json", ConfigBackend::Json5),
    ("ron", ConfigBackend::Ron),
    ("yml", ConfigBackend::Yaml),
    ("yaml", ConfigBackend::Yaml),
];

fn backend_for_extension(extension: &str) -> Option<ConfigBackend> {
    FILE_EXTENSIONS
        .iter()
        .find(|(e, _)| *e == extension)
        .map(|(_, backend)| *backend)
}

pub fn backend_from_path(path: &Path) -> Result<ConfigBackend> {
    let Some(extension) = path.extension() else {
        bail!("config file path has no extension to determine the format from: {path:?}")
    };
    let Some(extension) = extension.to_str() else {
        bail!("config file path has a non-unicode extension: {path:?}")
    };
    backend_for_extension(extension).ok_or_else(|| {
        anyhow!(
            "config file path has unknown extension {extension:?} (known: {}): {path:?}",
            FILE_EXTENSIONS
                .iter()
                .map(|(e, _)| *e)
                .collect::<Vec<_>>()
                .join(", ")
        )
    })
}

/// The existing file among `stem` plus each of `FILE_EXTENSIONS`;
/// more than one is an error.
fn find_config_file(stem: &Path) -> Result<Option<(PathBuf, ConfigBackend)>> {
    let mut found: Vec<(PathBuf, ConfigBackend)> = Vec::new();
    for (extension, backend) in FILE_EXTENSIONS {
        let path = add_extension(stem, extension)
            .ok_or_else(|| anyhow!("config path is missing a file name: {stem:?}"))?;
        if path.exists() {
            found.push((path, *backend));
        }
    }
    if found.len() > 1 {
        let paths: Vec<&PathBuf> = found.iter().map(|(path, _)| path).collect();
        bail!("multiple config files found, it is unclear which to use: {paths:?}")
    }
    Ok(found.pop())
}

pub trait LoadConfigFile: DeserializeOwned {
    /// The location checked when no path is given, without extension
    /// (each of `FILE_EXTENSIONS` is tried).
    fn default_config_path_without_suffix() -> Result<Option<PathBuf>>;

    /// An explicitly given `path` must exist. Otherwise the default
    /// location is used if a file exists there, else `or_else` is
    /// called with a description of what was tried, which can return
    /// an error or a default value.
    fn load_config<P: AsRef<Path>>(
        path: Option<P>,
        or_else: impl FnOnce(String) -> Result<Self>,
    ) -> Result<Self> {
        if let Some(path) = path {
            let path = path.as_ref();
            return backend_from_path(path)?.load_config_file(path);
        }
        let Some(stem) = Self::default_config_path_without_suffix()? else {
            return or_else("no path was given and there is no default config location".into());
        };
        match find_config_file(&stem)? {
            Some((path, backend)) => {
                info!("loading config file {path:?}");
                backend.load_config_file(&path)
            }
            None => or_else(format!("no config file at {stem:?} with any known extension")),
        }
    }
}
