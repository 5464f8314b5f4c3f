//! Writing generated documents to disk.
//!
//! [`write_all`] creates the output directory, then writes `PE<a>.json` and
//! `INJ<a>.json` for every address followed by `PlatformConfig.json`. Each
//! file is first written to a hidden temporary sibling and then renamed
//! into place, so a failed write never leaves a truncated document behind.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::derive::DerivedTables;
use crate::error::{FlowError, FlowResult};
use crate::platform::Platform;
use crate::types::Address;
use crate::wire::{to_pretty_json, InjectorDocument, PeDocument, PlatformDocument};

/// File name of the platform summary document.
pub const PLATFORM_FILE: &str = "PlatformConfig.json";

/// File name of the endpoint document for `address`.
pub fn pe_file_name(address: Address) -> String {
    format!("PE{}.json", address)
}

/// File name of the injector document for `address`.
pub fn injector_file_name(address: Address) -> String {
    format!("INJ{}.json", address)
}

/// Summary of a completed write.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EmitReport {
    pub directory: PathBuf,
    pub files_written: usize,
}

/// Writes `contents` to `path` atomically.
pub fn write_file(path: &Path, contents: &str) -> FlowResult<()> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = path.with_file_name(format!(".{}.tmp", file_name));

    let result = fs::write(&tmp, contents).and_then(|_| fs::rename(&tmp, path));
    if let Err(source) = result {
        let _ = fs::remove_file(&tmp);
        return Err(FlowError::Write {
            path: path.to_path_buf(),
            source,
        });
    }
    Ok(())
}

fn write_document<T: Serialize>(dir: &Path, name: &str, document: &T) -> FlowResult<()> {
    let json = to_pretty_json(document)?;
    write_file(&dir.join(name), &json)
}

/// Creates `dir` (and its parents) if absent.
pub fn prepare_directory(dir: &Path) -> FlowResult<()> {
    fs::create_dir_all(dir).map_err(|source| FlowError::OutputDirectory {
        path: dir.to_path_buf(),
        source,
    })
}

/// Writes every endpoint, injector and platform document into `dir`.
pub fn write_all(dir: impl AsRef<Path>, platform: &Platform, tables: &DerivedTables) -> FlowResult<EmitReport> {
    let dir = dir.as_ref();
    prepare_directory(dir)?;

    let mut files_written = 0;
    for (endpoint, injector) in tables.endpoints.iter().zip(&tables.injectors) {
        write_document(dir, &injector_file_name(injector.address), &InjectorDocument::from(injector))?;
        write_document(dir, &pe_file_name(endpoint.address), &PeDocument::from(endpoint))?;
        files_written += 2;
    }

    write_document(dir, PLATFORM_FILE, &PlatformDocument::from(platform))?;
    files_written += 1;

    tracing::info!("JSON files created at {}", dir.display());

    Ok(EmitReport {
        directory: dir.to_path_buf(),
        files_written,
    })
}
