//! Circuit source bundles.
//!
//! A bundle is either an archive that is uploaded as-is, or a directory that is
//! packed into a gzipped tarball in memory right before upload.

use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use flate2::{Compression, write::GzEncoder};
use tar::{Builder, HeaderMode};

use crate::error::{Error, Result};

/// Circuit sources to upload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SourceBundle {
    /// An existing archive (`.tar.gz`, `.zip`, ...), uploaded verbatim.
    Archive(PathBuf),
    /// A directory, packed into `<dirname>.tar.gz` on upload.
    Directory(PathBuf),
}

/// Bundle bytes ready for a multipart upload.
#[derive(Clone, Debug)]
pub struct PackagedBundle {
    /// File name presented to the service.
    pub file_name: String,
    /// Archive contents.
    pub bytes: Vec<u8>,
}

impl SourceBundle {
    /// Classifies `path` as an archive or a directory.
    pub fn from_path(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let metadata = fs::metadata(&path).map_err(|e| Error::bundle(&path, e))?;
        if metadata.is_dir() {
            Ok(Self::Directory(path))
        } else {
            Ok(Self::Archive(path))
        }
    }

    /// Path of the archive or directory.
    pub fn path(&self) -> &Path {
        match self {
            Self::Archive(path) | Self::Directory(path) => path,
        }
    }

    /// Reads or builds the archive.
    ///
    /// Directory archives are deterministic: entries are sorted, ownership and
    /// timestamps are normalized, and every entry lives under a root named after
    /// the directory.
    pub fn package(&self) -> Result<PackagedBundle> {
        match self {
            Self::Archive(path) => {
                let bytes = fs::read(path).map_err(|e| Error::bundle(path, e))?;
                Ok(PackagedBundle {
                    file_name: file_name(path),
                    bytes,
                })
            }
            Self::Directory(path) => {
                let root = file_name(path);
                let bytes = tar_gz_dir(path, &root).map_err(|e| Error::bundle(path, e))?;
                Ok(PackagedBundle {
                    file_name: format!("{root}.tar.gz"),
                    bytes,
                })
            }
        }
    }
}

fn file_name(path: &Path) -> String {
    path.canonicalize()
        .ok()
        .as_deref()
        .unwrap_or(path)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload".to_string())
}

fn tar_gz_dir(dir: &Path, root: &str) -> std::io::Result<Vec<u8>> {
    let mut builder = Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
    builder.mode(HeaderMode::Deterministic);
    builder.follow_symlinks(false);
    builder.append_dir(root, dir)?;
    append_sorted(&mut builder, dir, Path::new(root))?;
    let mut encoder = builder.into_inner()?;
    encoder.flush()?;
    encoder.finish()
}

fn append_sorted<W: Write>(
    builder: &mut Builder<W>,
    dir: &Path,
    prefix: &Path,
) -> std::io::Result<()> {
    let mut entries = fs::read_dir(dir)?.collect::<std::io::Result<Vec<_>>>()?;
    entries.sort_by_key(|entry| entry.file_name());

    for entry in entries {
        let path = entry.path();
        let name = prefix.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            builder.append_dir(&name, &path)?;
            append_sorted(builder, &path, &name)?;
        } else {
            builder.append_path_with_name(&path, &name)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::{fs, io::Read, path::Path};

    use flate2::read::GzDecoder;

    use crate::{bundle::SourceBundle, error::Error};

    fn entry_names(bytes: &[u8]) -> Vec<String> {
        let mut archive = tar::Archive::new(GzDecoder::new(bytes));
        archive
            .entries()
            .unwrap()
            .map(|entry| {
                let path = entry.unwrap().path().unwrap().to_string_lossy().into_owned();
                path.trim_end_matches('/').to_string()
            })
            .collect()
    }

    fn write_circuit(dir: &Path) {
        fs::create_dir_all(dir.join("circuits")).unwrap();
        fs::write(dir.join("sindri.json"), r#"{"circuitType": "circom"}"#).unwrap();
        fs::write(dir.join("circuits/multiplier2.circom"), "template Multiplier2() {}").unwrap();
    }

    #[test]
    fn test_directory_is_packed_under_its_name() {
        let temp = tempfile::tempdir().unwrap();
        let dir = temp.path().join("multiplier2");
        write_circuit(&dir);

        let bundle = SourceBundle::from_path(&dir).unwrap();
        assert_eq!(bundle, SourceBundle::Directory(dir.clone()));

        let packaged = bundle.package().unwrap();
        assert_eq!(packaged.file_name, "multiplier2.tar.gz");
        assert_eq!(
            entry_names(&packaged.bytes),
            vec![
                "multiplier2",
                "multiplier2/circuits",
                "multiplier2/circuits/multiplier2.circom",
                "multiplier2/sindri.json",
            ]
        );

        let mut archive = tar::Archive::new(GzDecoder::new(packaged.bytes.as_slice()));
        let mut entry = archive
            .entries()
            .unwrap()
            .map(Result::unwrap)
            .find(|entry| entry.path().unwrap().ends_with("sindri.json"))
            .unwrap();
        let mut content = String::new();
        entry.read_to_string(&mut content).unwrap();
        assert_eq!(content, r#"{"circuitType": "circom"}"#);
    }

    #[test]
    fn test_directory_packing_is_deterministic() {
        let temp = tempfile::tempdir().unwrap();
        let dir = temp.path().join("multiplier2");
        write_circuit(&dir);

        let first = SourceBundle::Directory(dir.clone()).package().unwrap();
        let second = SourceBundle::Directory(dir).package().unwrap();
        assert_eq!(first.bytes, second.bytes);
    }

    #[test]
    fn test_archive_is_uploaded_verbatim() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("multiplier2.tar.gz");
        fs::write(&path, b"not really gzip").unwrap();

        let packaged = SourceBundle::from_path(&path).unwrap().package().unwrap();
        assert_eq!(packaged.file_name, "multiplier2.tar.gz");
        assert_eq!(packaged.bytes, b"not really gzip");
    }

    #[test]
    fn test_missing_path() {
        let temp = tempfile::tempdir().unwrap();
        let result = SourceBundle::from_path(temp.path().join("nope"));
        assert!(matches!(result, Err(Error::Bundle { .. })));
    }
}
