//! Package archives (`*.pkg`): gzip-compressed tarballs with a
//! `package.toml` descriptor at the root

use crate::descriptor::PackageDescriptor;
use crate::{PackageError, Result};
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::Read;
use std::path::{Component, Path, PathBuf};
use tar::Archive;

/// File extension of package archives
pub const EXTENSION: &str = "pkg";

/// Name of the descriptor entry inside an archive
pub const DESCRIPTOR_FILE: &str = "package.toml";

/// Archive file name for a descriptor, `<full_name>.pkg`
pub fn file_name(descriptor: &PackageDescriptor) -> String {
    format!("{}.{}", descriptor.full_name(), EXTENSION)
}

pub fn is_archive(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == EXTENSION)
}

/// Read the descriptor stored in a package archive
pub fn read_descriptor(path: &Path) -> Result<PackageDescriptor> {
    let file = File::open(path)?;
    let mut archive = Archive::new(GzDecoder::new(file));

    for entry in archive.entries().map_err(|e| invalid(path, e))? {
        let mut entry = entry.map_err(|e| invalid(path, e))?;
        let entry_path = entry.path().map_err(|e| invalid(path, e))?.into_owned();

        if is_descriptor_entry(&entry_path) {
            let mut content = String::new();
            entry
                .read_to_string(&mut content)
                .map_err(|e| invalid(path, e))?;
            return Ok(PackageDescriptor::from_str(&content)?);
        }
    }

    Err(PackageError::InvalidArchive {
        path: path.to_path_buf(),
        reason: format!("missing {}", DESCRIPTOR_FILE),
    })
}

/// Unpack every entry of an archive into `dest`
pub fn unpack(path: &Path, dest: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(dest)?;
    let file = File::open(path)?;
    let mut archive = Archive::new(GzDecoder::new(file));
    archive.unpack(dest).map_err(|e| invalid(path, e))?;
    Ok(dest.to_path_buf())
}

/// `package.toml` or `./package.toml`, never a nested one
fn is_descriptor_entry(path: &Path) -> bool {
    let mut components = path
        .components()
        .filter(|c| !matches!(c, Component::CurDir));
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(name)), None) if name == DESCRIPTOR_FILE
    )
}

fn invalid(path: &Path, error: std::io::Error) -> PackageError {
    PackageError::InvalidArchive {
        path: path.to_path_buf(),
        reason: error.to_string(),
    }
}
