//! Lambda deployment package construction.
//!
//! Builds zip deployment packages in memory. A handler package is either a
//! single source file (archived as `lambda_function.py`) or a directory whose
//! contents are archived with their relative paths, so vendored dependencies
//! ride along unchanged.

use anyhow::{bail, Context, Result};
use std::io::{Cursor, Write};
use std::path::Path;
use walkdir::WalkDir;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Entry point file every handler package must provide.
pub const HANDLER_FILE: &str = "lambda_function.py";

/// A finished deployment package ready for upload.
#[derive(Debug)]
pub struct DeploymentPackage {
    pub bytes: Vec<u8>,
    pub file_count: usize,
}

/// Build a deployment package from a handler path.
pub fn package_handler(handler: &Path) -> Result<DeploymentPackage> {
    if handler.is_file() {
        package_single_file(handler)
    } else if handler.is_dir() {
        package_directory(handler)
    } else {
        bail!("Handler path {} does not exist", handler.display())
    }
}

fn zip_options() -> FileOptions {
    FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .unix_permissions(0o644)
}

fn package_single_file(file: &Path) -> Result<DeploymentPackage> {
    let code = std::fs::read(file)
        .with_context(|| format!("Failed to read handler file {}", file.display()))?;

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    writer
        .start_file(HANDLER_FILE, zip_options())
        .context("Failed to start zip entry")?;
    writer.write_all(&code).context("Failed to write zip entry")?;
    let cursor = writer.finish().context("Failed to finish zip archive")?;

    Ok(DeploymentPackage {
        bytes: cursor.into_inner(),
        file_count: 1,
    })
}

fn package_directory(dir: &Path) -> Result<DeploymentPackage> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let mut file_count = 0usize;
    let mut has_handler = false;

    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry
            .with_context(|| format!("Failed to walk handler directory {}", dir.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }

        let relative = entry
            .path()
            .strip_prefix(dir)
            .context("Walked path outside handler directory")?;
        let archive_name = relative.to_string_lossy().replace('\\', "/");
        if archive_name == HANDLER_FILE {
            has_handler = true;
        }

        let contents = std::fs::read(entry.path())
            .with_context(|| format!("Failed to read {}", entry.path().display()))?;
        writer
            .start_file(&archive_name, zip_options())
            .with_context(|| format!("Failed to start zip entry {}", archive_name))?;
        writer
            .write_all(&contents)
            .with_context(|| format!("Failed to write zip entry {}", archive_name))?;
        file_count += 1;
    }

    if !has_handler {
        bail!(
            "Handler directory {} does not contain {}",
            dir.display(),
            HANDLER_FILE
        );
    }

    let cursor = writer.finish().context("Failed to finish zip archive")?;
    Ok(DeploymentPackage {
        bytes: cursor.into_inner(),
        file_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    fn archive_names(bytes: &[u8]) -> Vec<String> {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes.to_vec())).unwrap();
        (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect()
    }

    #[test]
    fn test_package_single_file_renames_to_handler() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("sentiment_tool.py");
        std::fs::write(&source, "def lambda_handler(event, context):\n    pass\n").unwrap();

        let package = package_handler(&source).unwrap();
        assert_eq!(package.file_count, 1);
        assert_eq!(archive_names(&package.bytes), vec![HANDLER_FILE.to_string()]);
    }

    #[test]
    fn test_package_directory_preserves_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(HANDLER_FILE), "# handler\n").unwrap();
        std::fs::create_dir_all(dir.path().join("package/requests")).unwrap();
        std::fs::write(dir.path().join("package/requests/__init__.py"), "# dep\n").unwrap();

        let package = package_handler(dir.path()).unwrap();
        assert_eq!(package.file_count, 2);
        let names = archive_names(&package.bytes);
        assert!(names.contains(&HANDLER_FILE.to_string()));
        assert!(names.contains(&"package/requests/__init__.py".to_string()));
    }

    #[test]
    fn test_package_directory_contents_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let body = "def lambda_handler(event, context):\n    return {}\n";
        std::fs::write(dir.path().join(HANDLER_FILE), body).unwrap();

        let package = package_handler(dir.path()).unwrap();
        let mut archive = zip::ZipArchive::new(Cursor::new(package.bytes)).unwrap();
        let mut entry = archive.by_name(HANDLER_FILE).unwrap();
        let mut contents = String::new();
        entry.read_to_string(&mut contents).unwrap();
        assert_eq!(contents, body);
    }

    #[test]
    fn test_directory_without_handler_rejected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("helper.py"), "# no entry point\n").unwrap();
        let err = package_handler(dir.path()).unwrap_err();
        assert!(err.to_string().contains(HANDLER_FILE), "{}", err);
    }

    #[test]
    fn test_missing_path_rejected() {
        assert!(package_handler(Path::new("/nonexistent/handler")).is_err());
    }
}
