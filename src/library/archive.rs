// src/library/archive.rs
use std::fmt::Display;
use std::fs::File;
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use walkdir::WalkDir;
use zip::{write::FileOptions, CompressionMethod, ZipArchive, ZipWriter};

use super::LibraryManager;
use crate::{
    crypto,
    errors::GameBoxError,
    game::{determine_asset_type, sanitize_filename, AssetInfo, AssetType, GameEntry, GameMetadata},
};

pub const ARCHIVE_MANIFEST_NAME: &str = "gamebox.json";
pub const ARCHIVE_FORMAT_VERSION: u32 = 1;
const FILES_DIR: &str = "files";
/// Refuse archives that would unpack to more than this.
const MAX_UNPACKED_BYTES: u64 = 512 * 1024 * 1024;

/// Written at the root of every exported archive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveManifest {
    pub format_version: u32,
    pub app_version: String,
    pub entry: GameEntry,
    pub files: Vec<AssetInfo>,
}

impl LibraryManager {
    /// Bundles the game's folder into `<destination>/<name>-<version>-<id8>.zip`.
    /// The archive only appears under its final name once complete, and an
    /// existing file of that name is never replaced.
    pub fn export_game(&self, id: &Uuid, destination: &Path) -> Result<PathBuf, GameBoxError> {
        let entry = self.index.get(id).ok_or(GameBoxError::NotFound(*id))?;
        let folder = self.folder_of(entry);
        if !folder.is_dir() {
            return Err(GameBoxError::ExportError(format!(
                "game folder {} is missing",
                folder.display()
            )));
        }

        std::fs::create_dir_all(destination).map_err(export_error)?;
        let file_name = format!(
            "{}-{}-{}.zip",
            sanitize_filename(&entry.name),
            sanitize_filename(&entry.version),
            &entry.id.simple().to_string()[..8]
        );
        let final_path = destination.join(&file_name);
        if final_path.exists() {
            return Err(GameBoxError::ExportError(format!("{} already exists", final_path.display())));
        }
        let tmp_path = destination.join(format!(".{}.{}.tmp", file_name, Uuid::new_v4().simple()));

        let written = write_archive(&tmp_path, &folder, entry)
            .and_then(|_| std::fs::rename(&tmp_path, &final_path).map_err(export_error));
        if let Err(e) = written {
            let _ = std::fs::remove_file(&tmp_path);
            return Err(e);
        }

        log::info!("Exported '{}' to {}", entry.name, final_path.display());
        Ok(final_path)
    }

    /// Unpacks an exported archive as a new game with a fresh id and zeroed
    /// counters.
    pub(crate) fn import_archive(&mut self, archive_path: &Path, metadata: Option<GameMetadata>) -> Result<GameEntry, GameBoxError> {
        let staging = self.create_staging()?;
        let manifest = match extract_archive(archive_path, &staging) {
            Ok(manifest) => manifest,
            Err(e) => {
                let _ = std::fs::remove_dir_all(&staging);
                return Err(e);
            }
        };

        let metadata = match metadata {
            Some(mut metadata) => {
                if metadata.entry_file.is_none() {
                    metadata.entry_file = Some(manifest.entry.entry_file.clone());
                }
                metadata
            }
            None => manifest.entry.to_metadata(),
        };
        self.commit_staged(staging, metadata)
    }
}

fn export_error(e: impl Display) -> GameBoxError {
    GameBoxError::ExportError(e.to_string())
}

fn import_error(e: impl Display) -> GameBoxError {
    GameBoxError::ImportError(e.to_string())
}

/// Archive member name for a path relative to the game folder.
fn member_name(relative: &Path) -> String {
    relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().to_string()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

fn collect_assets(folder: &Path) -> Result<Vec<(PathBuf, AssetInfo)>, GameBoxError> {
    let mut assets = Vec::new();
    for entry in WalkDir::new(folder).sort_by(|a, b| a.file_name().cmp(b.file_name())) {
        let entry = entry.map_err(export_error)?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path().to_path_buf();
        let relative = path.strip_prefix(folder).map_err(export_error)?;
        let info = AssetInfo {
            path: member_name(relative),
            checksum: crypto::hash_file(&path).map_err(export_error)?,
            size: entry.metadata().map_err(export_error)?.len(),
            asset_type: determine_asset_type(&path).unwrap_or(AssetType::Binary),
        };
        assets.push((path, info));
    }
    Ok(assets)
}

fn write_archive(target: &Path, folder: &Path, entry: &GameEntry) -> Result<(), GameBoxError> {
    let assets = collect_assets(folder)?;

    let file = File::create(target).map_err(export_error)?;
    let mut zip = ZipWriter::new(file);
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    for (path, info) in &assets {
        zip.start_file(format!("{}/{}", FILES_DIR, info.path), options)
            .map_err(export_error)?;
        let mut source = File::open(path).map_err(export_error)?;
        std::io::copy(&mut source, &mut zip).map_err(export_error)?;
    }

    let manifest = ArchiveManifest {
        format_version: ARCHIVE_FORMAT_VERSION,
        app_version: env!("CARGO_PKG_VERSION").to_string(),
        entry: entry.clone(),
        files: assets.into_iter().map(|(_, info)| info).collect(),
    };
    let manifest_json = serde_json::to_vec_pretty(&manifest).map_err(export_error)?;
    zip.start_file(ARCHIVE_MANIFEST_NAME, options).map_err(export_error)?;
    zip.write_all(&manifest_json).map_err(export_error)?;

    let file = zip.finish().map_err(export_error)?;
    file.sync_all().map_err(export_error)?;
    Ok(())
}

fn read_manifest(archive: &mut ZipArchive<File>) -> Result<ArchiveManifest, GameBoxError> {
    let member = archive.by_name(ARCHIVE_MANIFEST_NAME).map_err(|_| {
        GameBoxError::ImportError(format!("archive has no {}, not a GameBox export", ARCHIVE_MANIFEST_NAME))
    })?;
    let manifest: ArchiveManifest = serde_json::from_reader(member)
        .map_err(|e| GameBoxError::ImportError(format!("archive manifest is unreadable: {}", e)))?;
    if manifest.format_version != ARCHIVE_FORMAT_VERSION {
        return Err(GameBoxError::ImportError(format!(
            "unsupported archive format version {}",
            manifest.format_version
        )));
    }
    Ok(manifest)
}

/// Unpacks `files/` into `staging` and checks every file against the manifest.
fn extract_archive(archive_path: &Path, staging: &Path) -> Result<ArchiveManifest, GameBoxError> {
    let file = File::open(archive_path).map_err(import_error)?;
    let mut archive = ZipArchive::new(file)
        .map_err(|e| GameBoxError::ImportError(format!("{} is not a readable zip: {}", archive_path.display(), e)))?;
    let manifest = read_manifest(&mut archive)?;

    let mut unpacked = 0u64;
    for i in 0..archive.len() {
        let mut member = archive.by_index(i).map_err(import_error)?;
        if member.name() == ARCHIVE_MANIFEST_NAME {
            continue;
        }
        let enclosed = member
            .enclosed_name()
            .map(|p| p.to_path_buf())
            .ok_or_else(|| GameBoxError::ImportError(format!("unsafe path in archive: {}", member.name())))?;
        let relative = enclosed
            .strip_prefix(FILES_DIR)
            .map_err(|_| GameBoxError::ImportError(format!("unexpected archive member: {}", member.name())))?
            .to_path_buf();

        let target = staging.join(&relative);
        if member.is_dir() {
            std::fs::create_dir_all(&target).map_err(import_error)?;
            continue;
        }

        unpacked = unpacked.saturating_add(member.size());
        if unpacked > MAX_UNPACKED_BYTES {
            return Err(GameBoxError::ImportError("archive is too large to import".to_string()));
        }
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent).map_err(import_error)?;
        }
        let mut out = File::create(&target).map_err(import_error)?;
        std::io::copy(&mut member, &mut out).map_err(import_error)?;
    }

    for asset in &manifest.files {
        let path = staging.join(Path::new(&asset.path));
        if !path.starts_with(staging) || asset.path.split('/').any(|part| part == "..") {
            return Err(GameBoxError::ImportError(format!("unsafe path in manifest: {}", asset.path)));
        }
        if !path.is_file() {
            return Err(GameBoxError::ImportError(format!("archive is missing {}", asset.path)));
        }
        let checksum = crypto::hash_file(&path).map_err(import_error)?;
        if checksum != asset.checksum {
            return Err(GameBoxError::ImportError(format!("checksum mismatch for {}", asset.path)));
        }
    }

    Ok(manifest)
}
