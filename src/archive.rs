//! Extraction of the compressed simulation output into an iteration
//! directory.

use std::{
    fs::File,
    io::Read,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, anyhow, bail};
use flate2::read::GzDecoder;
use ruzstd::StreamingDecoder;

use crate::{debug, info, io_utils::div::move_path};

/// Iteration directories are named like "ite1", "ite2" etc.
pub const ITERATION_PREFIX: &str = "ite";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    TarGz,
    TarZstd,
    /// An uncompressed log file, copied instead of extracted
    Log,
}

impl InputKind {
    pub fn is_archive(self) -> bool {
        match self {
            InputKind::TarGz | InputKind::TarZstd => true,
            InputKind::Log => false,
        }
    }
}

const SUFFIXES: &[(&str, InputKind)] = &[
    (".tar.gz", InputKind::TarGz),
    (".tgz", InputKind::TarGz),
    (".tar.zstd", InputKind::TarZstd),
    (".tar.zst", InputKind::TarZstd),
    (".log", InputKind::Log),
];

/// The kind of input file by file name suffix, None for files that
/// are not simulation output.
pub fn input_kind(file_name: &str) -> Option<InputKind> {
    SUFFIXES
        .iter()
        .find(|(suffix, _)| file_name.len() > suffix.len() && file_name.ends_with(suffix))
        .map(|(_, kind)| *kind)
}

/// The iteration an input file represents: its name up to the first
/// dot.
pub fn iteration_name(file_name: &str) -> &str {
    file_name.split('.').next().unwrap_or(file_name)
}

/// Open the archive, transparently decompressing.
fn open_archive(path: &Path, kind: InputKind) -> Result<tar::Archive<Box<dyn Read>>> {
    let input = File::open(path).with_context(|| anyhow!("opening archive {path:?}"))?;
    let decoded: Box<dyn Read> = match kind {
        InputKind::TarGz => Box::new(GzDecoder::new(input)),
        InputKind::TarZstd => Box::new(
            StreamingDecoder::new(input).with_context(|| anyhow!("zstd-decoding {path:?}"))?,
        ),
        InputKind::Log => bail!("not an archive: {path:?}"),
    };
    Ok(tar::Archive::new(decoded))
}

/// Unpack the archive at `path` into `out_dir` (created if missing),
/// then flatten redundant top-level directories (see
/// `flatten_redundant_dir`). Entries that would land outside of
/// `out_dir` are skipped by the tar reader. On error, what was
/// extracted so far stays in place.
pub fn extract_archive(path: &Path, out_dir: &Path) -> Result<()> {
    let file_name = path
        .file_name()
        .and_then(|s| s.to_str())
        .ok_or_else(|| anyhow!("archive path without a usable file name: {path:?}"))?;
    let kind = input_kind(file_name)
        .ok_or_else(|| anyhow!("unknown archive file name extension: {path:?}"))?;

    std::fs::create_dir_all(out_dir).with_context(|| anyhow!("creating dir {out_dir:?}"))?;
    let mut archive = open_archive(path, kind)?;
    archive
        .unpack(out_dir)
        .with_context(|| anyhow!("extracting {path:?} to {out_dir:?}"))?;
    info!("extracted {path:?} to {out_dir:?}");

    flatten_redundant_dir(out_dir, Some(path))?;
    Ok(())
}

/// If `dir` contains nothing but a single directory that is named
/// like `dir` itself or like an iteration directory, move the
/// contents of that directory up into `dir` and remove it, repeated
/// until no such directory is left. `ignore` (the archive that was
/// just extracted, if it lives in `dir`) is not counted. Returns
/// whether flattening happened.
pub fn flatten_redundant_dir(dir: &Path, ignore: Option<&Path>) -> Result<bool> {
    let mut flattened = false;
    while flatten_once(dir, ignore)? {
        flattened = true;
    }
    Ok(flattened)
}

fn flatten_once(dir: &Path, ignore: Option<&Path>) -> Result<bool> {
    let mut entries: Vec<PathBuf> = Vec::new();
    for entry in std::fs::read_dir(dir).with_context(|| anyhow!("opening dir {dir:?}"))? {
        let entry = entry.with_context(|| anyhow!("listing dir {dir:?}"))?;
        let path = entry.path();
        if Some(path.as_path()) == ignore {
            continue;
        }
        entries.push(path);
    }

    let [single] = entries.as_slice() else {
        return Ok(false);
    };
    if !single.is_dir() {
        return Ok(false);
    }
    let Some(single_name) = single.file_name().and_then(|s| s.to_str()) else {
        return Ok(false);
    };
    let is_redundant = single_name.starts_with(ITERATION_PREFIX)
        || dir.file_name().and_then(|s| s.to_str()) == Some(single_name);
    if !is_redundant {
        return Ok(false);
    }

    // The nested dir may contain an entry with its own name, thus
    // move it out of the way first.
    let shell = dir.join(format!(".{single_name}.flatten"));
    move_path(single, &shell)?;
    for entry in std::fs::read_dir(&shell).with_context(|| anyhow!("opening dir {shell:?}"))? {
        let entry = entry.with_context(|| anyhow!("listing dir {shell:?}"))?;
        move_path(&entry.path(), &dir.join(entry.file_name()))?;
    }
    std::fs::remove_dir(&shell).with_context(|| anyhow!("removing emptied dir {shell:?}"))?;
    debug!("flattened {single:?} into {dir:?}");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use flate2::{Compression, write::GzEncoder};

    use super::*;

    fn write_tar_gz(path: &Path, files: &[(&str, &str)]) {
        let file = File::create(path).unwrap();
        let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));
        for (name, contents) in files {
            let mut header = tar::Header::new_gnu();
            header.set_size(contents.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder
                .append_data(&mut header, name, contents.as_bytes())
                .unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap().flush().unwrap();
    }

    #[test]
    fn t_input_kind() {
        assert_eq!(input_kind("ite1.tar.gz"), Some(InputKind::TarGz));
        assert_eq!(input_kind("ite1.tgz"), Some(InputKind::TarGz));
        assert_eq!(input_kind("ite1.tar.zst"), Some(InputKind::TarZstd));
        assert_eq!(input_kind("ite1.log"), Some(InputKind::Log));
        assert_eq!(input_kind("ite1.zip"), None);
        assert_eq!(input_kind(".log"), None);
        assert_eq!(iteration_name("ite1.tar.gz"), "ite1");
        assert_eq!(iteration_name("ite2"), "ite2");
    }

    #[test]
    fn t_extract_flattens() {
        let base = tempfile::tempdir().unwrap();
        let archive = base.path().join("ite1.tar.gz");
        write_tar_gz(
            &archive,
            &[
                ("ite1/A_TIER_P_10DEVICES_C.log", "h\n1;2"),
                ("ite1/sub/x.txt", "x"),
            ],
        );
        let out = base.path().join("out").join("ite1");
        extract_archive(&archive, &out).unwrap();
        assert!(out.join("A_TIER_P_10DEVICES_C.log").is_file());
        assert!(out.join("sub/x.txt").is_file());
        assert!(!out.join("ite1").exists());
    }

    #[test]
    fn t_extract_no_flatten() {
        let base = tempfile::tempdir().unwrap();
        let archive = base.path().join("ite3.tar.gz");
        write_tar_gz(&archive, &[("results/a.log", "1"), ("b.log", "2")]);
        let out = base.path().join("ite3");
        extract_archive(&archive, &out).unwrap();
        assert!(out.join("results/a.log").is_file());
        assert!(out.join("b.log").is_file());

        // A single unrelated directory stays
        let archive = base.path().join("ite4.tar.gz");
        write_tar_gz(&archive, &[("results/a.log", "1")]);
        let out = base.path().join("ite4");
        extract_archive(&archive, &out).unwrap();
        assert!(out.join("results/a.log").is_file());
    }

    #[test]
    fn t_flatten_same_name_inside() {
        let base = tempfile::tempdir().unwrap();
        let dir = base.path().join("ite2");
        std::fs::create_dir_all(dir.join("ite2/ite2")).unwrap();
        std::fs::write(dir.join("ite2/ite2/a.log"), "1").unwrap();
        let archive = dir.join("ite2.tar.gz");
        std::fs::write(&archive, "").unwrap();
        assert!(flatten_redundant_dir(&dir, Some(&archive)).unwrap());
        assert!(dir.join("a.log").is_file());
        assert!(!dir.join("ite2").exists());
        assert!(archive.is_file());
        assert!(!flatten_redundant_dir(&dir, Some(&archive)).unwrap());
    }

    #[test]
    fn t_extract_nested_same_name() {
        let base = tempfile::tempdir().unwrap();
        let archive = base.path().join("ite2.tar.gz");
        write_tar_gz(&archive, &[("ite2/ite2/notes.txt", "n")]);
        let out = base.path().join("ite2");
        extract_archive(&archive, &out).unwrap();
        assert!(out.join("notes.txt").is_file());
        assert!(!out.join("ite2").exists());
    }

    /// A zstd frame storing `data` in raw (uncompressed) blocks.
    fn zstd_raw_frame(data: &[u8]) -> Vec<u8> {
        // Magic number, no flags, 128 KiB window
        let mut out = vec![0x28, 0xb5, 0x2f, 0xfd, 0x00, 0x38];
        let chunks: Vec<&[u8]> = data.chunks(1 << 16).collect();
        for (i, chunk) in chunks.iter().enumerate() {
            let last = u32::from(i + 1 == chunks.len());
            let header = last | ((chunk.len() as u32) << 3);
            out.extend_from_slice(&header.to_le_bytes()[..3]);
            out.extend_from_slice(chunk);
        }
        out
    }

    #[test]
    fn t_extract_zstd() {
        let base = tempfile::tempdir().unwrap();
        let mut builder = tar::Builder::new(Vec::new());
        let contents = "h\n1;2";
        let mut header = tar::Header::new_gnu();
        header.set_size(contents.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, "ite6/A_TIER_P_10DEVICES_C.log", contents.as_bytes())
            .unwrap();
        let tar_bytes = builder.into_inner().unwrap();

        for name in ["ite6.tar.zst", "ite6.tar.zstd"] {
            let archive = base.path().join(name);
            std::fs::write(&archive, zstd_raw_frame(&tar_bytes)).unwrap();
            let out = base.path().join(name.replace('.', "_")).join("ite6");
            extract_archive(&archive, &out).unwrap();
            assert_eq!(
                std::fs::read_to_string(out.join("A_TIER_P_10DEVICES_C.log")).unwrap(),
                contents
            );
            assert!(!out.join("ite6").exists());
        }

        let archive = base.path().join("ite7.tar.zst");
        std::fs::write(&archive, "not zstd").unwrap();
        assert!(extract_archive(&archive, &base.path().join("ite7")).is_err());
    }

    #[test]
    fn t_extract_error() {
        let base = tempfile::tempdir().unwrap();
        let archive = base.path().join("ite5.tar.gz");
        std::fs::write(&archive, "not gzip").unwrap();
        assert!(extract_archive(&archive, &base.path().join("ite5")).is_err());
        assert!(extract_archive(&base.path().join("missing.tar.gz"), base.path()).is_err());
    }
}
