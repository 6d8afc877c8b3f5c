//! Recovering policy, category and device count from the file names
//! the simulator gives its result logs, e.g.
//! `SIMRESULT_TWO_TIER_WITH_EO_FUZZY_BASED_2000DEVICES_ALL_APPS_GENERIC.log`.
//!
//! The name is split at underscores. The policy is found between a
//! sentinel (scenario name part) and the device count segment
//! (`<N>DEVICES`), the category is what follows the device count
//! segment.

use kstring::KString;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum FilenameError {
    #[error("ambiguous log file name {file_name:?}: {reason}")]
    Ambiguous { file_name: String, reason: String },
}

/// How the start of the policy name is found.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub enum PolicyAnchor {
    /// The policy starts after a sentinel, which can consist of
    /// multiple segments (e.g. "TIER_WITH_EO"). The sentinels are
    /// tried in the given order, the first one that occurs before the
    /// device count segment is used.
    Sentinels(Vec<String>),
    /// The policy starts after the first `skip` segments; if the
    /// result starts with `strip_prefix`, that is removed.
    SkipSegments {
        skip: usize,
        strip_prefix: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FilenameLayout {
    pub policy_anchor: PolicyAnchor,
    /// The text following the device count, e.g. "DEVICES" in
    /// "2000DEVICES"
    pub device_marker: String,
    /// Including the dot
    pub log_suffix: String,
}

impl Default for FilenameLayout {
    fn default() -> Self {
        Self {
            policy_anchor: PolicyAnchor::Sentinels(vec![
                "TIER_WITH_EO".into(),
                "TIER".into(),
                "SCENARIO".into(),
            ]),
            device_marker: "DEVICES".into(),
            log_suffix: ".log".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFileName {
    pub policy: KString,
    pub category: KString,
    pub devices: u64,
}

impl FilenameLayout {
    pub fn is_log_file(&self, file_name: &str) -> bool {
        file_name.ends_with(&self.log_suffix)
    }

    fn device_count_of_segment(&self, segment: &str) -> Option<u64> {
        let digits = segment.strip_suffix(self.device_marker.as_str())?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        digits.parse().ok()
    }

    /// Position and value of the device count segment.
    fn find_device_segment(
        &self,
        file_name: &str,
        parts: &[&str],
    ) -> Result<Option<(usize, u64)>, FilenameError> {
        let mut found = parts
            .iter()
            .enumerate()
            .filter_map(|(i, part)| Some((i, self.device_count_of_segment(part)?)));
        let first = found.next();
        if let Some((second, _)) = found.next() {
            return Err(FilenameError::Ambiguous {
                file_name: file_name.into(),
                reason: format!(
                    "more than one device count segment ({:?} and {:?})",
                    parts[first.expect("have a second hence a first").0],
                    parts[second]
                ),
            });
        }
        Ok(first)
    }

    /// Just the device count, for files whose directory placement
    /// already gives policy and category.
    pub fn device_count(&self, file_name: &str) -> Result<Option<u64>, FilenameError> {
        let stem = file_name
            .strip_suffix(self.log_suffix.as_str())
            .unwrap_or(file_name);
        let parts: Vec<&str> = stem.split('_').collect();
        Ok(self
            .find_device_segment(file_name, &parts)?
            .map(|(_, devices)| devices))
    }

    /// `Ok(None)` if the file is not a log file or policy or category
    /// cannot be determined; an error if the name is ambiguous.
    pub fn parse(&self, file_name: &str) -> Result<Option<LogFileName>, FilenameError> {
        let Some(stem) = file_name.strip_suffix(self.log_suffix.as_str()) else {
            return Ok(None);
        };
        let parts: Vec<&str> = stem.split('_').collect();

        let Some((device_pos, devices)) = self.find_device_segment(file_name, &parts)? else {
            return Ok(None);
        };

        let category = parts[device_pos + 1..].join("_");
        if category.is_empty() {
            return Ok(None);
        }

        let policy = match &self.policy_anchor {
            PolicyAnchor::Sentinels(sentinels) => {
                let mut policy = None;
                for sentinel in sentinels {
                    let tokens: Vec<&str> = sentinel.split('_').collect();
                    let before_devices = &parts[..device_pos];
                    let positions: Vec<usize> = before_devices
                        .windows(tokens.len())
                        .enumerate()
                        .filter(|(_, window)| *window == tokens.as_slice())
                        .map(|(i, _)| i)
                        .collect();
                    match positions.as_slice() {
                        [] => continue,
                        [start] => {
                            policy = Some(parts[start + tokens.len()..device_pos].join("_"));
                            break;
                        }
                        _ => {
                            return Err(FilenameError::Ambiguous {
                                file_name: file_name.into(),
                                reason: format!(
                                    "sentinel {sentinel:?} occurs {} times before the \
                                     device count segment",
                                    positions.len()
                                ),
                            });
                        }
                    }
                }
                policy
            }
            PolicyAnchor::SkipSegments { skip, strip_prefix } => {
                if device_pos <= *skip {
                    None
                } else {
                    let joined = parts[*skip..device_pos].join("_");
                    if let Some(prefix) = strip_prefix {
                        Some(
                            joined
                                .strip_prefix(prefix.as_str())
                                .map(String::from)
                                .unwrap_or(joined),
                        )
                    } else {
                        Some(joined)
                    }
                }
            }
        };

        match policy {
            Some(policy) if !policy.is_empty() => Ok(Some(LogFileName {
                policy: policy.into(),
                category: category.into(),
                devices,
            })),
            _ => Ok(None),
        }
    }
}
