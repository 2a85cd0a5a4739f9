use log::debug;
use std::fs;
use std::io::{self, ErrorKind};
use std::path::Path;
use std::time::Instant;

/// Reads a whole file, mapping "not found" to `None`.
pub fn read_optional(path: &Path) -> io::Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(contents) => Ok(Some(contents)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

/// Writes next to the target first and renames over it, so readers never see a torn file.
pub fn write_atomic(path: &Path, contents: &str) -> io::Result<()> {
    let start = Instant::now();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    fs::write(&tmp, contents)?;
    fs::rename(&tmp, path)?;

    debug!("write_atomic took: {} ms", start.elapsed().as_millis());
    Ok(())
}
