//! Streams over a single entry of an archive.

use std::fmt;
use std::io::{self, Read, Seek, SeekFrom, Write};

use crate::archive::{CaseSensitivity, ZipArchive};
use crate::codec::{FileNameCodec, encode_for_header};
use crate::compression::{CompressionMethod, EntryDecoder, EntryEncoder};
use crate::crc32::Crc32Check;
use crate::read::find_data_start;
use crate::result::{ZipError, ZipResult, invalid_state};
use crate::store::ZipStore;
use crate::types::{
    FileInfo64, System, VERSION_DEFLATE, VERSION_STORED, VERSION_ZIP64, ZipFileData, flags,
};
use crate::write::{
    FileOptions, NewFileInfo, update_local_file_header, write_data_descriptor,
    write_local_file_header,
};
use crate::zipcrypto::{self, ZipCryptoKeys, ZipCryptoValidator};

/// Compressed bytes pulled from the store per refill.
const INPUT_CHUNK: usize = 32 * 1024;
/// Upper bound on what `read_all` reserves before any data is decoded.
const READ_ALL_RESERVE: usize = 64 * 1024;

/// A stream over one entry of a [`ZipArchive`], opened either for reading or for writing.
///
/// The stream borrows the archive mutably, so the archive outlives it and no other stream can
/// exist at the same time. Dropping an open stream closes it and discards any error.
///
/// ```
/// use std::io::Cursor;
/// use zipio::{FileOptions, NewFileInfo, OpenMode, ZipArchive, ZipFile};
///
/// let mut archive = ZipArchive::open(Cursor::new(Vec::new()), OpenMode::Create)?;
/// let mut file = ZipFile::new(&mut archive);
/// file.open_write(NewFileInfo::new("hello.txt"), None, FileOptions::default())?;
/// file.write(b"Hello, world!")?;
/// file.close()?;
/// drop(file);
/// let bytes = archive.into_inner()?.into_inner();
///
/// let mut archive = ZipArchive::open(Cursor::new(bytes), OpenMode::Unzip)?;
/// assert!(archive.go_to_first_file());
/// let mut file = ZipFile::new(&mut archive);
/// file.open_read(None)?;
/// assert_eq!(file.bytes_available(), 13);
/// assert_eq!(file.read_all()?, b"Hello, world!");
/// assert!(file.at_end());
/// # Ok::<(), zipio::result::ZipError>(())
/// ```
pub struct ZipFile<'a, S: ZipStore> {
    archive: &'a mut ZipArchive<S>,
    state: StreamState,
    /// Entry the last session was bound to.
    last_entry: Option<usize>,
}

enum StreamState {
    Closed,
    Reading(Box<ReadSession>),
    Writing(Box<WriteSession>),
}

impl fmt::Debug for StreamState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamState::Closed => f.write_str("Closed"),
            StreamState::Reading(session) => f
                .debug_struct("Reading")
                .field("name", &session.name)
                .field("pos", &session.pos)
                .field("size", &session.size)
                .finish(),
            StreamState::Writing(session) => f
                .debug_struct("Writing")
                .field("name", &session.data.file_name)
                .field("written", &session.written)
                .finish(),
        }
    }
}

impl<S: ZipStore> fmt::Debug for ZipFile<'_, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ZipFile")
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

struct ReadSession {
    index: usize,
    name: Box<str>,
    size: u64,
    compressed_size: u64,
    pos: u64,
    /// Absolute store position of the next compressed byte to pull.
    next_input: u64,
    /// Compressed bytes not pulled from the store yet.
    input_left: u64,
    /// Pulled and decrypted bytes, consumed from `input_start`.
    input: Vec<u8>,
    input_start: usize,
    keys: Option<ZipCryptoKeys>,
    decoder: EntryDecoder,
    crc: Crc32Check,
    verified: bool,
}

impl ReadSession {
    fn refill<S: ZipStore>(&mut self, store: &mut S) -> ZipResult<()> {
        let n = (INPUT_CHUNK as u64).min(self.input_left) as usize;
        self.input.resize(n, 0);
        store.seek(SeekFrom::Start(self.next_input))?;
        store.read_exact(&mut self.input)?;
        if let Some(keys) = self.keys.as_mut() {
            keys.decrypt(&mut self.input);
        }
        self.next_input += n as u64;
        self.input_left -= n as u64;
        self.input_start = 0;
        Ok(())
    }

    fn read<S: ZipStore>(&mut self, store: &mut S, buf: &mut [u8]) -> ZipResult<usize> {
        let want = (self.size - self.pos).min(buf.len() as u64) as usize;
        let mut filled = 0;
        while filled < want {
            if self.input_start == self.input.len() && self.input_left > 0 {
                self.refill(store)?;
            }
            let step = self
                .decoder
                .decode(&self.input[self.input_start..], &mut buf[filled..want])?;
            self.input_start += step.consumed;
            filled += step.produced;
            if filled < want && (step.stream_end || (step.consumed == 0 && step.produced == 0)) {
                if step.stream_end
                    || (self.input_start == self.input.len() && self.input_left == 0)
                {
                    return Err(ZipError::Codec(
                        format!(
                            "compressed data of {} ended after {} of {} bytes",
                            self.name,
                            self.pos + filled as u64,
                            self.size
                        )
                        .into(),
                    ));
                }
                if self.input_start < self.input.len() {
                    return Err(ZipError::Codec("decoder made no progress".into()));
                }
            }
        }
        self.crc.update(&buf[..filled]);
        self.pos += filled as u64;
        if self.pos == self.size && !self.verified {
            self.verified = true;
            self.crc.check_matches()?;
        }
        Ok(filled)
    }
}

struct WriteSession {
    data: ZipFileData,
    header_abs: u64,
    /// Absolute store position of the next compressed byte.
    next_output: u64,
    encoder: EntryEncoder,
    keys: Option<ZipCryptoKeys>,
    crc: Crc32Check,
    written: u64,
    compressed: u64,
    out: Vec<u8>,
}

impl WriteSession {
    fn flush_out<S: ZipStore>(&mut self, store: &mut S) -> ZipResult<()> {
        if self.out.is_empty() {
            return Ok(());
        }
        if let Some(keys) = self.keys.as_mut() {
            keys.encrypt(&mut self.out);
        }
        store.seek(SeekFrom::Start(self.next_output))?;
        store.write_all(&self.out)?;
        self.next_output += self.out.len() as u64;
        self.compressed += self.out.len() as u64;
        self.out.clear();
        Ok(())
    }

    fn write<S: ZipStore>(&mut self, store: &mut S, buf: &[u8]) -> ZipResult<usize> {
        self.crc.update(buf);
        self.written += buf.len() as u64;
        self.encoder.encode(buf, &mut self.out)?;
        self.flush_out(store)?;
        Ok(buf.len())
    }

    /// Finish the data, patch the header and return the completed entry and its end.
    fn finish<S: ZipStore>(mut self, store: &mut S) -> ZipResult<(ZipFileData, u64)> {
        self.encoder.finish(&mut self.out)?;
        self.flush_out(store)?;
        self.data.crc32 = self.crc.value();
        self.data.uncompressed_size = self.written;
        self.data.compressed_size = self.compressed;

        let mut end = self.next_output;
        if self.data.using_data_descriptor() {
            store.seek(SeekFrom::Start(end))?;
            end += write_data_descriptor(store, &self.data)?;
        }
        update_local_file_header(store, &self.data, self.header_abs)?;
        Ok((self.data, end))
    }
}

impl<'a, S: ZipStore> ZipFile<'a, S> {
    /// A closed stream over `archive`.
    pub fn new(archive: &'a mut ZipArchive<S>) -> Self {
        ZipFile {
            archive,
            state: StreamState::Closed,
            last_entry: None,
        }
    }

    pub fn archive(&self) -> &ZipArchive<S> {
        &*self.archive
    }

    /// The archive, for moving its cursor between sessions. Fails while the stream is open.
    pub fn archive_mut(&mut self) -> ZipResult<&mut ZipArchive<S>> {
        if self.is_open() {
            return invalid_state("cannot access the archive while the stream is open");
        }
        Ok(&mut *self.archive)
    }

    pub fn is_open(&self) -> bool {
        !matches!(self.state, StreamState::Closed)
    }

    fn ensure_closed(&self) -> ZipResult<()> {
        match self.state {
            StreamState::Closed if self.archive.stream_open => {
                invalid_state("another stream is open on this archive")
            }
            StreamState::Closed => Ok(()),
            _ => invalid_state("stream is already open"),
        }
    }

    /// Open the archive's current entry for reading.
    ///
    /// Encrypted entries need `password`; a missing or wrong one fails with
    /// [`ZipError::InvalidPassword`] before any data is returned.
    pub fn open_read(&mut self, password: Option<&[u8]>) -> ZipResult<()> {
        self.ensure_closed()?;
        if self.archive.mode.is_writing() {
            return invalid_state("archive was not opened for reading");
        }
        let Some(index) = self.archive.current else {
            return invalid_state("no current file");
        };
        let archive_offset = self.archive.archive_offset;
        let (data, store) = self.archive.entry_and_store(index)?;
        let session = begin_read(store, data, index, archive_offset, password)?;
        log::debug!("opened {} for reading", data.file_name);
        self.archive.stream_open = true;
        self.last_entry = Some(index);
        self.state = StreamState::Reading(Box::new(session));
        Ok(())
    }

    /// Select the entry called `name` and open it for reading.
    ///
    /// Fails with [`ZipError::FileNotFound`], leaving the cursor where it was, if there is no
    /// such entry.
    pub fn open_read_by_name(
        &mut self,
        name: &str,
        cs: CaseSensitivity,
        password: Option<&[u8]>,
    ) -> ZipResult<()> {
        self.ensure_closed()?;
        if !self.archive.set_current_file(name, cs) {
            return Err(ZipError::FileNotFound(name.into()));
        }
        self.open_read(password)
    }

    /// Start a new entry at the end of the archive.
    ///
    /// With a password the entry is encrypted, and its CRC and sizes also follow the data in a
    /// data descriptor.
    pub fn open_write(
        &mut self,
        info: NewFileInfo,
        password: Option<&[u8]>,
        options: FileOptions,
    ) -> ZipResult<()> {
        self.ensure_closed()?;
        self.archive.ensure_writable()?;
        let encoder = EntryEncoder::new(options.compression_method, options.level())?;

        let config = &self.archive.config;
        let (file_name_raw, mut is_utf8) = encode_for_header(
            config.file_name_codec.unwrap_or_default(),
            config.file_name_codec.is_some(),
            config.utf8_names,
            &info.name,
        );
        let file_comment_raw = encode_comment(
            config.comment_codec,
            &info.comment,
            &info.name,
            &mut is_utf8,
        );

        let large_file = options.large_file || config.zip64;
        let encrypted = password.is_some();
        let mut entry_flags = 0;
        if is_utf8 {
            entry_flags |= flags::UTF8;
        }
        if encrypted {
            entry_flags |= flags::ENCRYPTED | flags::DATA_DESCRIPTOR;
        }
        let version_needed = if large_file {
            VERSION_ZIP64
        } else if encrypted || options.compression_method == CompressionMethod::Deflated {
            VERSION_DEFLATE
        } else {
            VERSION_STORED
        };

        let header_abs = self.archive.write_offset;
        let mut data = ZipFileData {
            system: System::native(),
            version_made_by: VERSION_ZIP64 as u8,
            version_needed,
            flags: entry_flags,
            compression_method: options.compression_method,
            last_modified_time: info.date_time,
            crc32: 0,
            compressed_size: 0,
            uncompressed_size: 0,
            file_name: info.name.into_boxed_str(),
            file_name_raw: file_name_raw.into_boxed_slice(),
            extra_field: info.extra_global.into_boxed_slice(),
            local_extra_field: info.extra_local.into_boxed_slice(),
            file_comment: info.comment.into_boxed_str(),
            file_comment_raw: file_comment_raw.into_boxed_slice(),
            header_start: header_abs - self.archive.archive_offset,
            disk_number_start: 0,
            internal_attributes: info.internal_attr,
            external_attributes: info.external_attr,
            large_file,
        };

        let store = self.archive.store_mut()?;
        store.seek(SeekFrom::Start(header_abs))?;
        let mut next_output = header_abs + write_local_file_header(store, &data)?;

        let mut keys = None;
        let mut compressed = 0;
        if let Some(password) = password {
            let validator =
                ZipCryptoValidator::InfoZipMsdosTime(data.last_modified_time.timepart());
            let (header, header_keys) = zipcrypto::seal_header(password, validator)?;
            store.write_all(&header)?;
            next_output += header.len() as u64;
            compressed += header.len() as u64;
            keys = Some(header_keys);
        }
        data.compressed_size = compressed;

        log::debug!("opened {} for writing at {header_abs}", data.file_name);
        self.archive.stream_open = true;
        self.last_entry = None;
        self.state = StreamState::Writing(Box::new(WriteSession {
            data,
            header_abs,
            next_output,
            encoder,
            keys,
            crc: Crc32Check::new(),
            written: 0,
            compressed,
            out: Vec::new(),
        }));
        Ok(())
    }

    /// Read up to `buf.len()` bytes, never more than [`ZipFile::bytes_available`].
    ///
    /// The read that reaches the end of the entry checks its CRC-32 and fails with
    /// [`ZipError::Integrity`] on mismatch; the position still advances.
    pub fn read(&mut self, buf: &mut [u8]) -> ZipResult<usize> {
        let session = match &mut self.state {
            StreamState::Reading(session) => session,
            StreamState::Writing(_) => return invalid_state("stream was opened for writing"),
            StreamState::Closed => return invalid_state("stream is not open"),
        };
        let store = self.archive.store_mut()?;
        session.read(store, buf)
    }

    /// Read the rest of the entry.
    ///
    /// The buffer grows with the data actually decoded, so a corrupt size field can't force a
    /// huge allocation. An entry already at its end is still checked against its CRC-32.
    pub fn read_all(&mut self) -> ZipResult<Vec<u8>> {
        let reserve = self.bytes_available().min(READ_ALL_RESERVE as u64) as usize;
        let mut out = Vec::with_capacity(reserve);
        let mut chunk = vec![0; INPUT_CHUNK];
        loop {
            let n = ZipFile::read(self, &mut chunk)?;
            if n == 0 {
                return Ok(out);
            }
            out.extend_from_slice(&chunk[..n]);
        }
    }

    /// Compress (and encrypt) `buf` into the entry being written.
    pub fn write(&mut self, buf: &[u8]) -> ZipResult<usize> {
        let session = match &mut self.state {
            StreamState::Writing(session) => session,
            StreamState::Reading(_) => return invalid_state("stream was opened for reading"),
            StreamState::Closed => return invalid_state("stream is not open"),
        };
        let store = self.archive.store_mut()?;
        session.write(store, buf)
    }

    /// Close the stream. A written entry is completed and added to the central directory.
    ///
    /// Closing a closed stream does nothing.
    pub fn close(&mut self) -> ZipResult<()> {
        match std::mem::replace(&mut self.state, StreamState::Closed) {
            StreamState::Closed => Ok(()),
            StreamState::Reading(session) => {
                self.archive.stream_open = false;
                log::debug!("closed {} after {} bytes", session.name, session.pos);
                Ok(())
            }
            StreamState::Writing(session) => {
                self.archive.stream_open = false;
                let store = self.archive.store_mut()?;
                let (data, end) = session.finish(store)?;
                log::debug!(
                    "closed {}: {} bytes, {} compressed, crc {:#010x}",
                    data.file_name,
                    data.uncompressed_size,
                    data.compressed_size,
                    data.crc32
                );
                self.archive.write_offset = end;
                self.last_entry = Some(self.archive.files.len());
                self.archive.push_entry(data);
                Ok(())
            }
        }
    }

    /// Uncompressed bytes read or written so far.
    pub fn pos(&self) -> u64 {
        match &self.state {
            StreamState::Reading(session) => session.pos,
            StreamState::Writing(session) => session.written,
            StreamState::Closed => 0,
        }
    }

    /// Bytes left to read in the entry.
    pub fn bytes_available(&self) -> u64 {
        match &self.state {
            StreamState::Reading(session) => session.size - session.pos,
            _ => 0,
        }
    }

    pub fn at_end(&self) -> bool {
        self.bytes_available() == 0
    }

    /// Uncompressed size of the entry; for an entry being written, the bytes written so far.
    pub fn size(&self) -> ZipResult<u64> {
        match &self.state {
            StreamState::Reading(session) => Ok(session.size),
            StreamState::Writing(session) => Ok(session.written),
            StreamState::Closed => Ok(self.last_entry_data()?.uncompressed_size),
        }
    }

    /// Compressed size of the entry, including any encryption header.
    ///
    /// For a written entry this is known once the stream is closed.
    pub fn csize(&self) -> ZipResult<u64> {
        match &self.state {
            StreamState::Reading(session) => Ok(session.compressed_size),
            StreamState::Writing(_) => invalid_state("compressed size is known after close"),
            StreamState::Closed => Ok(self.last_entry_data()?.compressed_size),
        }
    }

    /// Metadata of the entry the stream is (or was last) bound to.
    pub fn file_info(&self) -> ZipResult<FileInfo64> {
        match &self.state {
            StreamState::Reading(session) => Ok(self.archive.files[session.index].info64()),
            StreamState::Writing(session) => Ok(session.data.info64()),
            StreamState::Closed => Ok(self.last_entry_data()?.info64()),
        }
    }

    /// Name of the entry as stored in the archive.
    pub fn actual_file_name(&self) -> ZipResult<String> {
        Ok(self.file_info()?.name)
    }

    fn last_entry_data(&self) -> ZipResult<&ZipFileData> {
        match self.last_entry.and_then(|index| self.archive.files.get(index)) {
            Some(data) => Ok(data),
            None => invalid_state("stream is not open"),
        }
    }
}

/// Comment bytes for a new entry. The UTF-8 flag covers name and comment alike, so a comment
/// that needs it can only get it when the name is unaffected by the flag.
fn encode_comment(
    codec: Option<FileNameCodec>,
    comment: &str,
    name: &str,
    is_utf8: &mut bool,
) -> Vec<u8> {
    if *is_utf8 {
        return comment.as_bytes().to_vec();
    }
    let (raw, wants_utf8) =
        encode_for_header(codec.unwrap_or_default(), codec.is_some(), false, comment);
    if !wants_utf8 {
        return raw;
    }
    if name.is_ascii() {
        *is_utf8 = true;
        return raw;
    }
    encode_for_header(codec.unwrap_or_default(), true, false, comment).0
}

fn begin_read<S: ZipStore>(
    store: &mut S,
    data: &ZipFileData,
    index: usize,
    archive_offset: u64,
    password: Option<&[u8]>,
) -> ZipResult<ReadSession> {
    let decoder = EntryDecoder::new(data.compression_method)?;
    let data_start = find_data_start(data, archive_offset, store)?;
    let data_end = data_start
        .checked_add(data.compressed_size)
        .ok_or(ZipError::InvalidArchive("Entry data is too large".into()))?;
    if data_end > store.size()? {
        return Err(ZipError::InvalidArchive(
            format!("data of {} runs past the end of the archive", data.file_name).into(),
        ));
    }

    let mut next_input = data_start;
    let mut input_left = data.compressed_size;
    let mut keys = None;
    if data.encrypted() {
        let Some(password) = password else {
            return Err(ZipError::InvalidPassword {
                filename: data.file_name.clone(),
            });
        };
        let Some(left) = input_left.checked_sub(zipcrypto::HEADER_LEN as u64) else {
            return Err(ZipError::InvalidArchive(
                "Encrypted entry is shorter than its header".into(),
            ));
        };
        let mut header = [0u8; zipcrypto::HEADER_LEN];
        store.seek(SeekFrom::Start(data_start))?;
        store.read_exact(&mut header)?;
        let validator = if data.using_data_descriptor() {
            ZipCryptoValidator::InfoZipMsdosTime(data.last_modified_time.timepart())
        } else {
            ZipCryptoValidator::PkzipCrc32(data.crc32)
        };
        keys = Some(zipcrypto::open_header(
            password,
            header,
            validator,
            &data.file_name,
        )?);
        next_input += zipcrypto::HEADER_LEN as u64;
        input_left = left;
    }
    if data.compression_method == CompressionMethod::Stored && input_left != data.uncompressed_size
    {
        return Err(ZipError::InvalidArchive(
            format!(
                "stored entry {} declares {} bytes but holds {input_left}",
                data.file_name, data.uncompressed_size
            )
            .into(),
        ));
    }

    Ok(ReadSession {
        index,
        name: data.file_name.clone(),
        size: data.uncompressed_size,
        compressed_size: data.compressed_size,
        pos: 0,
        next_input,
        input_left,
        input: Vec::new(),
        input_start: 0,
        keys,
        decoder,
        crc: Crc32Check::expecting(data.crc32),
        verified: false,
    })
}

impl<S: ZipStore> Read for ZipFile<'_, S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        ZipFile::read(self, buf).map_err(io::Error::from)
    }
}

impl<S: ZipStore> Write for ZipFile<'_, S> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        ZipFile::write(self, buf).map_err(io::Error::from)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<S: ZipStore> Drop for ZipFile<'_, S> {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            log::warn!("error closing zip entry: {e}");
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::archive::OpenMode;
    use crate::types::DateTime;
    use std::io::Cursor;

    fn archive_with(entries: &[(&str, &[u8])], password: Option<&[u8]>) -> Vec<u8> {
        let mut archive = ZipArchive::open(Cursor::new(Vec::new()), OpenMode::Create).unwrap();
        let mut file = ZipFile::new(&mut archive);
        for (name, contents) in entries {
            let info = NewFileInfo::new(*name)
                .with_date_time(DateTime::from_date_and_time(2020, 5, 17, 10, 38, 30).unwrap());
            file.open_write(info, password, FileOptions::default()).unwrap();
            file.write(contents).unwrap();
            file.close().unwrap();
        }
        drop(file);
        archive.into_inner().unwrap().into_inner()
    }

    #[test]
    fn mode_mismatch() {
        let bytes = archive_with(&[("a.txt", b"hello")], None);
        let mut archive = ZipArchive::open(Cursor::new(bytes), OpenMode::Unzip).unwrap();
        let mut file = ZipFile::new(&mut archive);
        assert!(matches!(file.read(&mut [0; 4]), Err(ZipError::InvalidState(_))));
        assert!(matches!(file.open_read(None), Err(ZipError::InvalidState(_))));

        file.archive_mut().unwrap().go_to_first_file();
        file.open_read(None).unwrap();
        assert!(matches!(file.write(b"x"), Err(ZipError::InvalidState(_))));
        assert!(matches!(file.open_read(None), Err(ZipError::InvalidState(_))));
        assert!(file.archive_mut().is_err());
        file.close().unwrap();
        file.close().unwrap();
        assert!(file.archive_mut().is_ok());
    }

    #[test]
    fn reopen_resets_position() {
        let bytes = archive_with(&[("a.txt", b"hello")], None);
        let mut archive = ZipArchive::open(Cursor::new(bytes), OpenMode::Unzip).unwrap();
        archive.go_to_first_file();
        let mut file = ZipFile::new(&mut archive);
        file.open_read(None).unwrap();
        assert_eq!(file.read_all().unwrap(), b"hello");
        assert!(file.at_end());
        file.close().unwrap();

        file.open_read(None).unwrap();
        assert_eq!(file.pos(), 0);
        assert!(!file.at_end());
        let mut two = [0u8; 2];
        assert_eq!(file.read(&mut two).unwrap(), 2);
        assert_eq!(&two, b"he");
        assert_eq!(file.bytes_available(), 3);
    }

    #[test]
    fn encrypted_round_trip() {
        let bytes = archive_with(&[("secret.txt", b"attack at dawn")], Some(b"PassPass"));
        let mut archive = ZipArchive::open(Cursor::new(bytes), OpenMode::Unzip).unwrap();
        archive.go_to_first_file();
        assert!(archive.current_file_info().unwrap().is_encrypted());

        let mut file = ZipFile::new(&mut archive);
        assert!(matches!(
            file.open_read(None),
            Err(ZipError::InvalidPassword { .. })
        ));
        assert!(!file.is_open());
        file.open_read(Some(b"PassPass")).unwrap();
        assert_eq!(file.read_all().unwrap(), b"attack at dawn");
        assert_eq!(file.csize().unwrap(), file.file_info().unwrap().compressed_size);
    }

    #[test]
    fn crc_mismatch_is_reported_at_the_end() {
        let mut archive = ZipArchive::open(Cursor::new(Vec::new()), OpenMode::Create).unwrap();
        let mut file = ZipFile::new(&mut archive);
        file.open_write(
            NewFileInfo::new("a.txt"),
            None,
            FileOptions::default().compression_method(CompressionMethod::Stored),
        )
        .unwrap();
        file.write(b"hello").unwrap();
        file.close().unwrap();
        drop(file);
        let mut bytes = archive.into_inner().unwrap().into_inner();
        // stored data follows the 30 byte header and the 5 byte name
        bytes[35] = b'j';

        let mut archive = ZipArchive::open(Cursor::new(bytes), OpenMode::Unzip).unwrap();
        archive.go_to_first_file();
        let mut file = ZipFile::new(&mut archive);
        file.open_read(None).unwrap();
        let mut buf = [0u8; 4];
        assert_eq!(file.read(&mut buf).unwrap(), 4);
        let err = file.read(&mut buf).unwrap_err();
        assert!(matches!(err, ZipError::Integrity { .. }));
        assert!(file.at_end());
    }

    #[test]
    fn write_info_after_close() {
        let mut archive = ZipArchive::open(Cursor::new(Vec::new()), OpenMode::Create).unwrap();
        let mut file = ZipFile::new(&mut archive);
        file.open_write(NewFileInfo::new("a.txt"), None, FileOptions::default())
            .unwrap();
        file.write(&[b'a'; 1000]).unwrap();
        assert!(file.csize().is_err());
        assert_eq!(file.pos(), 1000);
        file.close().unwrap();
        assert_eq!(file.size().unwrap(), 1000);
        assert!(file.csize().unwrap() < 1000);
        assert_eq!(file.actual_file_name().unwrap(), "a.txt");
    }
}
