//! File system access for loggers.

use crate::error::{DbError, DbResult};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

/// File operations a logger needs.
///
/// Boolean results report whether the operation had an effect; I/O failures are errors.
pub trait FileExplorer: Send + Sync {
    /// Create an empty file `file_name` inside `path`. Returns `false` if it already exists.
    fn create_file(&self, path: &Path, file_name: &str) -> DbResult<bool>;

    /// Create directory `dir_name` inside `path`. Returns `false` if it already exists.
    fn create_dir(&self, path: &Path, dir_name: &str) -> DbResult<bool>;

    fn check_path_is_exists(&self, path: &Path) -> DbResult<bool>;

    fn read_from_file(&self, path: &Path) -> DbResult<String>;

    fn overwrite_file(&self, path: &Path, content: &str) -> DbResult<bool>;

    fn append_to_file(&self, path: &Path, content: &str) -> DbResult<bool>;

    /// Size in bytes; `0` for a missing file.
    fn file_size(&self, path: &Path) -> DbResult<u64>;
}

/// `FileExplorer` over `std::fs`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFileExplorer;

fn io_error(path: &Path, source: std::io::Error) -> DbError {
    DbError::io(path.display().to_string(), source)
}

impl FileExplorer for LocalFileExplorer {
    fn create_file(&self, path: &Path, file_name: &str) -> DbResult<bool> {
        let target = path.join(file_name);
        match OpenOptions::new().write(true).create_new(true).open(&target) {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(io_error(&target, e)),
        }
    }

    fn create_dir(&self, path: &Path, dir_name: &str) -> DbResult<bool> {
        let target = path.join(dir_name);
        if target.is_dir() {
            return Ok(false);
        }
        fs::create_dir_all(&target).map_err(|e| io_error(&target, e))?;
        Ok(true)
    }

    fn check_path_is_exists(&self, path: &Path) -> DbResult<bool> {
        path.try_exists().map_err(|e| io_error(path, e))
    }

    fn read_from_file(&self, path: &Path) -> DbResult<String> {
        fs::read_to_string(path).map_err(|e| io_error(path, e))
    }

    fn overwrite_file(&self, path: &Path, content: &str) -> DbResult<bool> {
        fs::write(path, content).map_err(|e| io_error(path, e))?;
        Ok(true)
    }

    fn append_to_file(&self, path: &Path, content: &str) -> DbResult<bool> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| io_error(path, e))?;
        file.write_all(content.as_bytes())
            .map_err(|e| io_error(path, e))?;
        Ok(true)
    }

    fn file_size(&self, path: &Path) -> DbResult<u64> {
        match fs::metadata(path) {
            Ok(meta) => Ok(meta.len()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(0),
            Err(e) => Err(io_error(path, e)),
        }
    }
}

/// Stand-in used before a real explorer is injected.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullFileExplorer;

impl FileExplorer for NullFileExplorer {
    fn create_file(&self, _path: &Path, _file_name: &str) -> DbResult<bool> {
        Err(DbError::null_object("FileExplorer::create_file"))
    }

    fn create_dir(&self, _path: &Path, _dir_name: &str) -> DbResult<bool> {
        Err(DbError::null_object("FileExplorer::create_dir"))
    }

    fn check_path_is_exists(&self, _path: &Path) -> DbResult<bool> {
        Err(DbError::null_object("FileExplorer::check_path_is_exists"))
    }

    fn read_from_file(&self, _path: &Path) -> DbResult<String> {
        Err(DbError::null_object("FileExplorer::read_from_file"))
    }

    fn overwrite_file(&self, _path: &Path, _content: &str) -> DbResult<bool> {
        Err(DbError::null_object("FileExplorer::overwrite_file"))
    }

    fn append_to_file(&self, _path: &Path, _content: &str) -> DbResult<bool> {
        Err(DbError::null_object("FileExplorer::append_to_file"))
    }

    fn file_size(&self, _path: &Path) -> DbResult<u64> {
        Err(DbError::null_object("FileExplorer::file_size"))
    }
}
