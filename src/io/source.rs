//! Access to a delivered scene: a plain directory or a zipped delivery

use crate::types::{SarError, SarResult};
use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use zip::ZipArchive;

/// Vendor header at the image-folder root
pub const BAND_HEADER_NAME: &str = "BAND_META.txt";

/// Upper bound on the buffer reserved up front for an archive entry; the declared size is untrusted
const MAX_ENTRY_PREALLOCATION: u64 = 1 << 26;

/// Byte stream over one scene file
#[derive(Debug)]
pub enum SceneStream {
    File(BufReader<File>),
    Memory(Cursor<Vec<u8>>),
}

impl SceneStream {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        SceneStream::Memory(Cursor::new(bytes))
    }

    /// Bytes left between the current position and the end of the stream
    pub fn available(&mut self) -> SarResult<u64> {
        let pos = self.stream_position()?;
        let end = self.seek(SeekFrom::End(0))?;
        self.seek(SeekFrom::Start(pos))?;
        Ok(end.saturating_sub(pos))
    }

    /// Up to `len` leading bytes; the position is restored afterwards
    pub fn peek_header(&mut self, len: usize) -> SarResult<Vec<u8>> {
        let pos = self.stream_position()?;
        let mut header = Vec::with_capacity(len);
        self.by_ref().take(len as u64).read_to_end(&mut header)?;
        self.seek(SeekFrom::Start(pos))?;
        Ok(header)
    }
}

impl Read for SceneStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            SceneStream::File(f) => f.read(buf),
            SceneStream::Memory(c) => c.read(buf),
        }
    }
}

impl Seek for SceneStream {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        match self {
            SceneStream::File(f) => f.seek(pos),
            SceneStream::Memory(c) => c.seek(pos),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum FileLocation {
    Disk(PathBuf),
    Archive(String),
}

/// Candidate file inside the image folder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SceneFile {
    /// Path relative to the image-folder root, `/` separated (e.g. `scene_HH/imagery_HH.tif`)
    pub relative_path: String,
    /// Lower-cased file name, used for classification and as the logical name
    pub file_name: String,
    location: FileLocation,
}

impl SceneFile {
    fn new(relative_path: String, location: FileLocation) -> Self {
        let file_name = relative_path
            .rsplit('/')
            .next()
            .unwrap_or(&relative_path)
            .to_lowercase();
        Self {
            relative_path,
            file_name,
            location,
        }
    }

    pub fn on_disk(relative_path: impl Into<String>, path: PathBuf) -> Self {
        Self::new(relative_path.into(), FileLocation::Disk(path))
    }

    pub fn in_archive(relative_path: impl Into<String>, entry: impl Into<String>) -> Self {
        Self::new(relative_path.into(), FileLocation::Archive(entry.into()))
    }

    /// Location on disk, `None` for archive entries
    pub fn disk_path(&self) -> Option<&Path> {
        match &self.location {
            FileLocation::Disk(p) => Some(p),
            FileLocation::Archive(_) => None,
        }
    }

    /// File name without extension, as delivered
    pub fn stem(&self) -> String {
        let name = self.relative_path.rsplit('/').next().unwrap_or(&self.relative_path);
        match name.rfind('.') {
            Some(idx) if idx > 0 => name[..idx].to_string(),
            _ => name.to_string(),
        }
    }
}

/// Where the scene lives
pub enum ProductSource {
    Directory {
        root: PathBuf,
    },
    Archive {
        archive_path: PathBuf,
        archive: ZipArchive<File>,
        root_prefix: String,
    },
}

impl std::fmt::Debug for ProductSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.description())
    }
}

impl ProductSource {
    /// Resolve the header file, the directory holding it, or a zip archive
    pub fn open<P: AsRef<Path>>(input: P) -> SarResult<Self> {
        let input = input.as_ref();

        if !input.exists() {
            return Err(SarError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("File not found: {}", input.display()),
            )));
        }

        if input.is_dir() {
            let header = Self::find_header_in_dir(input, 2).ok_or_else(|| {
                SarError::InvalidFormat(format!(
                    "No {} found under {}",
                    BAND_HEADER_NAME,
                    input.display()
                ))
            })?;
            return Self::from_header_path(&header);
        }

        let is_zip = input
            .extension()
            .map(|e| e.eq_ignore_ascii_case("zip"))
            .unwrap_or(false);
        if is_zip {
            return Self::open_archive(input);
        }

        if Self::is_header_name(input) {
            return Self::from_header_path(input);
        }

        Err(SarError::InvalidFormat(format!(
            "Not a RISAT-1 product: {}",
            input.display()
        )))
    }

    fn is_header_name(path: &Path) -> bool {
        path.file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.eq_ignore_ascii_case(BAND_HEADER_NAME))
            .unwrap_or(false)
    }

    fn from_header_path(header: &Path) -> SarResult<Self> {
        let root = header
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Ok(ProductSource::Directory { root })
    }

    fn find_header_in_dir(dir: &Path, depth: usize) -> Option<PathBuf> {
        let mut entries: Vec<PathBuf> = std::fs::read_dir(dir)
            .ok()?
            .filter_map(|e| e.ok().map(|e| e.path()))
            .collect();
        entries.sort();

        if let Some(header) = entries.iter().find(|p| p.is_file() && Self::is_header_name(p)) {
            return Some(header.clone());
        }
        if depth == 0 {
            return None;
        }
        entries
            .iter()
            .filter(|p| p.is_dir())
            .find_map(|p| Self::find_header_in_dir(p, depth - 1))
    }

    fn open_archive(path: &Path) -> SarResult<Self> {
        let file = File::open(path)?;
        let archive = ZipArchive::new(file)?;

        let mut headers: Vec<String> = archive
            .file_names()
            .filter(|name| {
                name.rsplit('/')
                    .next()
                    .map(|n| n.eq_ignore_ascii_case(BAND_HEADER_NAME))
                    .unwrap_or(false)
            })
            .map(str::to_string)
            .collect();
        // shallowest header wins
        headers.sort_by_key(|name| (name.matches('/').count(), name.clone()));

        let header = headers.into_iter().next().ok_or_else(|| {
            SarError::InvalidFormat(format!(
                "No {} found in archive {}",
                BAND_HEADER_NAME,
                path.display()
            ))
        })?;
        let root_prefix = match header.rfind('/') {
            Some(idx) => header[..=idx].to_string(),
            None => String::new(),
        };

        Ok(ProductSource::Archive {
            archive_path: path.to_path_buf(),
            archive,
            root_prefix,
        })
    }

    /// True when the scene is read out of an archive
    pub fn is_compressed(&self) -> bool {
        matches!(self, ProductSource::Archive { .. })
    }

    pub fn description(&self) -> String {
        match self {
            ProductSource::Directory { root } => format!("directory {}", root.display()),
            ProductSource::Archive {
                archive_path,
                root_prefix,
                ..
            } => format!("archive {} ({})", archive_path.display(), root_prefix),
        }
    }

    /// Contents of the vendor header
    pub fn read_header(&mut self) -> SarResult<String> {
        match self {
            ProductSource::Directory { root } => {
                let path = std::fs::read_dir(root.as_path())?
                    .filter_map(|e| e.ok().map(|e| e.path()))
                    .find(|p| p.is_file() && Self::is_header_name(p))
                    .ok_or_else(|| {
                        SarError::InvalidFormat(format!(
                            "No {} in {}",
                            BAND_HEADER_NAME,
                            root.display()
                        ))
                    })?;
                Ok(std::fs::read_to_string(path)?)
            }
            ProductSource::Archive {
                archive,
                root_prefix,
                ..
            } => {
                let name = archive
                    .file_names()
                    .find(|n| {
                        n.strip_prefix(root_prefix.as_str())
                            .map(|rest| rest.eq_ignore_ascii_case(BAND_HEADER_NAME))
                            .unwrap_or(false)
                    })
                    .map(str::to_string)
                    .ok_or_else(|| {
                        SarError::InvalidFormat(format!("No {} in archive", BAND_HEADER_NAME))
                    })?;
                let mut entry = archive.by_name(&name)?;
                let mut content = String::new();
                entry.read_to_string(&mut content)?;
                Ok(content)
            }
        }
    }

    /// Files directly inside `folder` (relative to the image-folder root), sorted by name.
    /// A missing folder yields an empty list.
    pub fn list_folder(&mut self, folder: &str) -> SarResult<Vec<SceneFile>> {
        let mut files = match self {
            ProductSource::Directory { root } => {
                let dir = root.join(folder);
                if !dir.is_dir() {
                    return Ok(Vec::new());
                }
                let mut files = Vec::new();
                for entry in std::fs::read_dir(&dir)? {
                    let path = entry?.path();
                    if !path.is_file() {
                        continue;
                    }
                    if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                        let relative = format!("{}/{}", folder, name);
                        files.push(SceneFile::new(relative, FileLocation::Disk(path.clone())));
                    }
                }
                files
            }
            ProductSource::Archive {
                archive,
                root_prefix,
                ..
            } => {
                let prefix = format!("{}{}/", root_prefix, folder);
                archive
                    .file_names()
                    .filter_map(|name| {
                        let rest = name.strip_prefix(prefix.as_str())?;
                        if rest.is_empty() || rest.contains('/') {
                            return None;
                        }
                        let relative = format!("{}/{}", folder, rest);
                        Some(SceneFile::new(relative, FileLocation::Archive(name.to_string())))
                    })
                    .collect()
            }
        };
        files.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
        Ok(files)
    }

    /// Open a byte stream over a scene file
    pub fn open_stream(&mut self, file: &SceneFile) -> SarResult<SceneStream> {
        match (&file.location, self) {
            (FileLocation::Disk(path), _) => Ok(SceneStream::File(BufReader::new(File::open(path)?))),
            (FileLocation::Archive(name), ProductSource::Archive { archive, .. }) => {
                let mut entry = archive.by_name(name)?;
                let mut bytes = Vec::with_capacity(entry.size().min(MAX_ENTRY_PREALLOCATION) as usize);
                entry.read_to_end(&mut bytes)?;
                Ok(SceneStream::from_bytes(bytes))
            }
            (FileLocation::Archive(name), ProductSource::Directory { .. }) => Err(
                SarError::Processing(format!("Archive entry {} requested from a directory source", name)),
            ),
        }
    }
}
