//! The archive: its byte store, entry table and cursor.

use std::borrow::Cow;
use std::fmt;
use std::io::Write;

use indexmap::IndexMap;

use crate::codec::{FileNameCodec, decode_with_flag, encode_for_header};
use crate::read::{Codecs, find_central_directory, read_central_directory};
use crate::result::{ZipError, ZipResult, invalid_state};
use crate::store::ZipStore;
use crate::types::{FileInfo64, ZipFileData, flags};
use crate::write::write_central_directory;

/// How [`ZipArchive::open`] treats the store.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum OpenMode {
    /// Write a new archive from the start of the store, replacing its contents.
    Create,
    /// Read an existing archive.
    Unzip,
    /// Write a new archive after the existing bytes of the store, e.g. behind an executable
    /// stub.
    Append,
    /// Add entries to an existing archive, keeping the ones it has.
    Add,
}

impl OpenMode {
    pub const fn is_writing(self) -> bool {
        !matches!(self, OpenMode::Unzip)
    }
}

/// Name comparison used by [`ZipArchive::set_current_file`].
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum CaseSensitivity {
    /// Insensitive on Windows, sensitive elsewhere.
    #[default]
    Default,
    Sensitive,
    Insensitive,
}

impl CaseSensitivity {
    pub const fn is_sensitive(self) -> bool {
        match self {
            CaseSensitivity::Default => !cfg!(windows),
            CaseSensitivity::Sensitive => true,
            CaseSensitivity::Insensitive => false,
        }
    }
}

/// Settings applied when an archive is opened. The per-archive setters change them later.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArchiveConfig {
    /// Write zip64 records for every entry and for the end of central directory.
    pub zip64: bool,
    /// Codec for names without the UTF-8 flag. `None` means cp437 on read, and cp437 or
    /// flagged UTF-8 (whichever fits) on write.
    pub file_name_codec: Option<FileNameCodec>,
    /// Codec for entry and archive comments, with the same defaults.
    pub comment_codec: Option<FileNameCodec>,
    /// Whether closing an archive with no entries writes an empty archive or fails.
    pub allow_empty: bool,
    /// Always write names as flagged UTF-8.
    pub utf8_names: bool,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        ArchiveConfig {
            zip64: false,
            file_name_codec: None,
            comment_codec: None,
            allow_empty: true,
            utf8_names: false,
        }
    }
}

impl ArchiveConfig {
    #[must_use]
    pub fn zip64(mut self, enabled: bool) -> Self {
        self.zip64 = enabled;
        self
    }

    #[must_use]
    pub fn file_name_codec(mut self, codec: FileNameCodec) -> Self {
        self.file_name_codec = Some(codec);
        self
    }

    #[must_use]
    pub fn comment_codec(mut self, codec: FileNameCodec) -> Self {
        self.comment_codec = Some(codec);
        self
    }

    #[must_use]
    pub fn allow_empty(mut self, allow: bool) -> Self {
        self.allow_empty = allow;
        self
    }

    #[must_use]
    pub fn utf8_names(mut self, enabled: bool) -> Self {
        self.utf8_names = enabled;
        self
    }

    pub(crate) fn codecs(&self) -> Codecs {
        Codecs {
            file_name: self.file_name_codec.unwrap_or_default(),
            comment: self.comment_codec.unwrap_or_default(),
        }
    }
}

/// A ZIP archive over a byte store, with a cursor selecting one entry at a time.
///
/// Entries are read and written through a [`crate::ZipFile`] borrowed from the archive.
///
/// ```no_run
/// use std::fs::File;
/// use zipio::{CaseSensitivity, OpenMode, ZipArchive, ZipFile};
///
/// fn first_line(path: &str) -> zipio::result::ZipResult<String> {
///     let mut archive = ZipArchive::open(File::open(path)?, OpenMode::Unzip)?;
///     if !archive.set_current_file("README.txt", CaseSensitivity::Insensitive) {
///         return Ok(String::new());
///     }
///     let mut file = ZipFile::new(&mut archive);
///     file.open_read(None)?;
///     let text = String::from_utf8_lossy(&file.read_all()?).into_owned();
///     Ok(text.lines().next().unwrap_or_default().to_owned())
/// }
/// ```
pub struct ZipArchive<S: ZipStore> {
    pub(crate) store: Option<S>,
    pub(crate) mode: OpenMode,
    pub(crate) config: ArchiveConfig,
    pub(crate) files: Vec<ZipFileData>,
    /// First entry of each name, for case-sensitive lookups.
    pub(crate) names_map: IndexMap<Box<str>, usize>,
    pub(crate) current: Option<usize>,
    pub(crate) comment: Box<[u8]>,
    /// Bytes in front of the archive inside the store.
    pub(crate) archive_offset: u64,
    /// Absolute position where the next local header goes.
    pub(crate) write_offset: u64,
    pub(crate) is_zip64: bool,
    pub(crate) stream_open: bool,
    pub(crate) closed: bool,
}

impl<S: ZipStore> fmt::Debug for ZipArchive<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ZipArchive")
            .field("mode", &self.mode)
            .field("open", &self.is_open())
            .field("entries", &self.files.len())
            .field("current", &self.current)
            .field("archive_offset", &self.archive_offset)
            .finish_non_exhaustive()
    }
}

impl<S: ZipStore> ZipArchive<S> {
    /// Open `store` with the default configuration.
    pub fn open(store: S, mode: OpenMode) -> ZipResult<Self> {
        Self::open_with_config(store, mode, ArchiveConfig::default())
    }

    pub fn open_with_config(mut store: S, mode: OpenMode, config: ArchiveConfig) -> ZipResult<Self> {
        if mode.is_writing() && !store.is_writable() {
            return invalid_state("store is read-only");
        }
        let mut archive = ZipArchive {
            store: None,
            mode,
            is_zip64: config.zip64,
            config,
            files: Vec::new(),
            names_map: IndexMap::new(),
            current: None,
            comment: Box::default(),
            archive_offset: 0,
            write_offset: 0,
            stream_open: false,
            // Nothing to finalize until the store is attached.
            closed: true,
        };
        match mode {
            OpenMode::Create => {}
            OpenMode::Append => {
                let start = store.size()?;
                archive.archive_offset = start;
                archive.write_offset = start;
            }
            OpenMode::Unzip | OpenMode::Add => {
                let info = find_central_directory(&mut store)?;
                archive.files =
                    read_central_directory(&mut store, &info, archive.config.codecs())?;
                archive.comment = info.comment;
                archive.archive_offset = info.archive_offset;
                archive.write_offset = info.directory_start;
                archive.is_zip64 |= info.is_zip64;
                archive.rebuild_names_map();
            }
        }
        log::debug!(
            "opened archive in {mode:?} mode: {} entries, archive offset {}",
            archive.files.len(),
            archive.archive_offset
        );
        archive.store = Some(store);
        archive.closed = false;
        Ok(archive)
    }

    fn rebuild_names_map(&mut self) {
        self.names_map.clear();
        for (index, file) in self.files.iter().enumerate() {
            self.names_map.entry(file.file_name.clone()).or_insert(index);
        }
    }

    pub(crate) fn store_mut(&mut self) -> ZipResult<&mut S> {
        match self.store.as_mut() {
            Some(store) if !self.closed => Ok(store),
            _ => invalid_state("archive is closed"),
        }
    }

    /// The store together with entry `index`, borrowed at once.
    pub(crate) fn entry_and_store(&mut self, index: usize) -> ZipResult<(&ZipFileData, &mut S)> {
        match (self.store.as_mut(), self.files.get(index)) {
            (Some(store), Some(data)) if !self.closed => Ok((data, store)),
            (_, None) => invalid_state("no such entry"),
            _ => invalid_state("archive is closed"),
        }
    }

    pub(crate) fn ensure_writable(&self) -> ZipResult<()> {
        if !self.is_open() {
            return invalid_state("archive is closed");
        }
        if !self.mode.is_writing() {
            return invalid_state("archive was not opened for writing");
        }
        Ok(())
    }

    pub(crate) fn push_entry(&mut self, file: ZipFileData) {
        let index = self.files.len();
        self.names_map.entry(file.file_name.clone()).or_insert(index);
        self.files.push(file);
    }

    /// Whether the archive has not been closed yet.
    pub fn is_open(&self) -> bool {
        !self.closed
    }

    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    pub fn config(&self) -> &ArchiveConfig {
        &self.config
    }

    /// Whether the archive was read with, or will be written with, zip64 end records.
    pub fn is_zip64(&self) -> bool {
        self.is_zip64
    }

    /// Bytes found (or kept) in front of the archive.
    pub fn offset(&self) -> u64 {
        self.archive_offset
    }

    pub fn set_zip64_enabled(&mut self, enabled: bool) {
        self.config.zip64 = enabled;
        self.is_zip64 = enabled;
    }

    pub fn set_allow_empty(&mut self, allow: bool) {
        self.config.allow_empty = allow;
    }

    pub fn set_utf8_names(&mut self, enabled: bool) {
        self.config.utf8_names = enabled;
    }

    /// Change the name codec. Names already read are decoded again with it.
    pub fn set_file_name_codec(&mut self, codec: FileNameCodec) {
        self.config.file_name_codec = Some(codec);
        for file in &mut self.files {
            let is_utf8 = file.flags & flags::UTF8 != 0;
            file.file_name = decode_with_flag(codec, &file.file_name_raw, is_utf8).into();
        }
        self.rebuild_names_map();
    }

    /// Change the comment codec. Comments already read are decoded again with it.
    pub fn set_comment_codec(&mut self, codec: FileNameCodec) {
        self.config.comment_codec = Some(codec);
        for file in &mut self.files {
            let is_utf8 = file.flags & flags::UTF8 != 0;
            file.file_comment = decode_with_flag(codec, &file.file_comment_raw, is_utf8).into();
        }
    }

    /// The global archive comment.
    ///
    /// The end record has no UTF-8 flag, so without a comment codec the comment is taken as
    /// UTF-8 when it is valid UTF-8 and as cp437 otherwise.
    pub fn comment(&self) -> Cow<'_, str> {
        match self.config.comment_codec {
            Some(codec) => codec.decode(&self.comment),
            None => match std::str::from_utf8(&self.comment) {
                Ok(text) => Cow::Borrowed(text),
                Err(_) => FileNameCodec::Cp437.decode(&self.comment),
            },
        }
    }

    /// The global archive comment, as stored.
    pub fn comment_raw(&self) -> &[u8] {
        &self.comment
    }

    /// Set the comment written when the archive is closed.
    pub fn set_comment(&mut self, comment: &str) -> ZipResult<()> {
        self.ensure_writable()?;
        let raw = match self.config.comment_codec {
            Some(codec) => encode_for_header(codec, true, false, comment).0,
            None => comment.as_bytes().to_vec(),
        };
        if raw.len() > usize::from(u16::MAX) {
            return Err(ZipError::InvalidArchive("Archive comment is too long".into()));
        }
        self.comment = raw.into_boxed_slice();
        Ok(())
    }

    /// Number of entries in the central directory, including ones written in this session.
    pub fn entries_count(&self) -> usize {
        self.files.len()
    }

    /// Select the first entry. Returns `false` if the archive is empty.
    pub fn go_to_first_file(&mut self) -> bool {
        self.current = (!self.files.is_empty()).then_some(0);
        self.current.is_some()
    }

    /// Select the next entry. Returns `false`, leaving no entry selected, after the last one.
    pub fn go_to_next_file(&mut self) -> bool {
        self.current = match self.current {
            Some(index) if index + 1 < self.files.len() => Some(index + 1),
            _ => None,
        };
        self.current.is_some()
    }

    /// Select the first entry called `name`.
    ///
    /// On failure `false` is returned and the previous selection is kept.
    pub fn set_current_file(&mut self, name: &str, cs: CaseSensitivity) -> bool {
        match self.find_index(name, cs) {
            Some(index) => {
                self.current = Some(index);
                true
            }
            None => false,
        }
    }

    pub(crate) fn find_index(&self, name: &str, cs: CaseSensitivity) -> Option<usize> {
        if cs.is_sensitive() {
            return self.names_map.get(name).copied();
        }
        let wanted = name.to_lowercase();
        self.files
            .iter()
            .position(|file| file.file_name.to_lowercase() == wanted)
    }

    /// Select the entry at `index` in central directory order.
    pub fn set_current_index(&mut self, index: usize) -> bool {
        if index < self.files.len() {
            self.current = Some(index);
            true
        } else {
            false
        }
    }

    pub fn has_current_file(&self) -> bool {
        self.current.is_some()
    }

    pub fn current_file_index(&self) -> Option<usize> {
        self.current
    }

    pub fn current_file_name(&self) -> Option<&str> {
        self.current.map(|index| &*self.files[index].file_name)
    }

    pub fn current_file_info(&self) -> Option<FileInfo64> {
        self.current.map(|index| self.files[index].info64())
    }

    /// Names of all entries, in central directory order.
    pub fn file_names(&self) -> impl Iterator<Item = &str> {
        self.files.iter().map(|file| &*file.file_name)
    }

    pub fn file_info_list(&self) -> Vec<FileInfo64> {
        self.files.iter().map(ZipFileData::info64).collect()
    }

    /// Write the central directory (in writing modes) and flush the store.
    ///
    /// Closing twice is a no-op. Refusing to write an empty archive leaves it open.
    pub fn close(&mut self) -> ZipResult<()> {
        if self.closed {
            return Ok(());
        }
        if self.stream_open {
            return invalid_state("a file stream is still open");
        }
        if self.mode.is_writing() && self.files.is_empty() && !self.config.allow_empty {
            return invalid_state("refusing to write an archive without entries");
        }
        if let (Some(store), true) = (self.store.as_mut(), self.mode.is_writing()) {
            // a failed write leaves the archive open so that closing can be retried
            let end = write_central_directory(
                store,
                &self.files,
                &self.comment,
                self.archive_offset,
                self.write_offset,
                self.is_zip64,
            )?;
            store.truncate(end)?;
            store.flush()?;
            log::debug!(
                "wrote central directory of {} entries; archive ends at {end}",
                self.files.len()
            );
        }
        self.closed = true;
        Ok(())
    }

    /// Close the archive and hand back the store.
    pub fn into_inner(mut self) -> ZipResult<S> {
        self.close()?;
        match self.store.take() {
            Some(store) => Ok(store),
            None => invalid_state("archive is closed"),
        }
    }
}

impl<S: ZipStore> Drop for ZipArchive<S> {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            log::warn!("error closing zip archive: {e}");
        }
    }
}
