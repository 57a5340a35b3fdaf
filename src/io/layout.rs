use crate::io::source::{ProductSource, SceneFile};
use crate::types::{Polarization, SarResult};

/// Enumerates candidate raster files in the per-channel scene folders
pub struct SceneFileLocator;

impl SceneFileLocator {
    /// Channel folders in traversal order
    pub fn channel_folders() -> Vec<String> {
        Polarization::ALL.iter().map(|p| p.scene_folder()).collect()
    }

    /// All candidate files, folder by folder. Absent folders contribute nothing.
    pub fn locate(source: &mut ProductSource) -> SarResult<Vec<SceneFile>> {
        let mut candidates = Vec::new();
        for folder in Self::channel_folders() {
            let files = source.list_folder(&folder)?;
            if files.is_empty() {
                log::debug!("No files in {}", folder);
            } else {
                log::debug!("Found {} candidate file(s) in {}", files.len(), folder);
            }
            candidates.extend(files);
        }
        Ok(candidates)
    }
}
