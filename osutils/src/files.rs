use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::Path,
};

use anyhow::{Context, Error};
use log::debug;

/// Creates all directories in a path if they don't exist
pub fn create_dirs<S>(path: S) -> Result<(), Error>
where
    S: AsRef<Path>,
{
    fs::create_dir_all(path.as_ref()).context(format!(
        "Could not create path: {}",
        path.as_ref().display()
    ))
}

/// Reads the content of a file and trims it
pub fn read_file_trim<S>(file_path: &S) -> Result<String, Error>
where
    S: AsRef<Path>,
{
    let content = fs::read_to_string(file_path.as_ref()).context(format!(
        "Could not read file contents: {:?}",
        file_path.as_ref()
    ))?;
    Ok(content.trim().to_string())
}

/// Appends `contents` to the file at `path`, creating it if needed.
pub fn append_file<S>(path: S, contents: &str) -> Result<(), Error>
where
    S: AsRef<Path>,
{
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path.as_ref())
        .context(format!(
            "Could not open file for appending: {}",
            path.as_ref().display()
        ))?;
    file.write_all(contents.as_bytes()).context(format!(
        "Could not append to file: {}",
        path.as_ref().display()
    ))
}

/// Recursively deletes `path`. A missing path is not an error.
pub fn remove_all<S>(path: S) -> Result<(), Error>
where
    S: AsRef<Path>,
{
    let path = path.as_ref();
    match fs::symlink_metadata(path) {
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("Nothing to remove at '{}'", path.display());
            Ok(())
        }
        Err(e) => Err(e).context(format!("Could not stat: {}", path.display())),
        Ok(metadata) if metadata.is_dir() => fs::remove_dir_all(path)
            .context(format!("Could not remove directory: {}", path.display())),
        Ok(_) => {
            fs::remove_file(path).context(format!("Could not remove file: {}", path.display()))
        }
    }
}
