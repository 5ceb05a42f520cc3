use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use log::info;
use walkdir::WalkDir;
use zip::CompressionMethod;
use zip::write::{SimpleFileOptions, ZipWriter};

use crate::StorageError;

/// Zips every file under `source_dir` into `<source_dir>.zip` next to it.
///
/// Entry names are relative to `source_dir` and use `/` separators.
/// Blocking; call from `spawn_blocking` inside async code.
pub fn zip_directory(source_dir: &Path) -> Result<PathBuf, StorageError> {
    let dir_name = source_dir
        .file_name()
        .ok_or_else(|| {
            StorageError::io(
                source_dir,
                io::Error::new(io::ErrorKind::InvalidInput, "directory has no name"),
            )
        })?
        .to_string_lossy()
        .into_owned();
    let zip_path = source_dir.with_file_name(format!("{}.zip", dir_name));

    let file = File::create(&zip_path).map_err(|e| StorageError::io(&zip_path, e))?;
    let mut writer = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let archive_err = |source| StorageError::Archive {
        path: zip_path.clone(),
        source,
    };

    let mut entries = 0usize;
    for entry in WalkDir::new(source_dir).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| source_dir.to_path_buf());
            StorageError::io(path, io::Error::other(e))
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(source_dir) else {
            continue;
        };
        let name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        writer.start_file(name, options).map_err(archive_err)?;
        let mut source = File::open(entry.path()).map_err(|e| StorageError::io(entry.path(), e))?;
        io::copy(&mut source, &mut writer).map_err(|e| StorageError::io(entry.path(), e))?;
        entries += 1;
    }
    writer.finish().map_err(archive_err)?;

    info!("Archived {} files into {}", entries, zip_path.display());
    Ok(zip_path)
}
