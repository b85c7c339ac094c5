use std::fs;
use std::io::Cursor;

use walkdir::WalkDir;
use zipio::dir::{compress_dir, extract_dir};
use zipio::result::ZipError;
use zipio::{
    ArchiveConfig, CompressionMethod, FileNameCodec, FileOptions, NewFileInfo, OpenMode,
    ZipArchive, ZipFile,
};

#[test]
fn directory_tree_round_trip() {
    let source = tempfile::tempdir().unwrap();
    fs::create_dir_all(source.path().join("sub/deeper")).unwrap();
    fs::create_dir_all(source.path().join("empty")).unwrap();
    fs::write(source.path().join("a.txt"), b"top level").unwrap();
    fs::write(source.path().join("sub/b.txt"), "nested ".repeat(1000)).unwrap();
    let binary: Vec<u8> = (0..100_000u32).map(|i| (i * 7 % 251) as u8).collect();
    fs::write(source.path().join("sub/deeper/c.bin"), &binary).unwrap();
    fs::write(source.path().join("sub/deeper/zero.txt"), b"").unwrap();

    let work = tempfile::tempdir().unwrap();
    let zip_path = work.path().join("tree.zip");
    assert_eq!(compress_dir(&zip_path, source.path(), true).unwrap(), 7);

    let target = tempfile::tempdir().unwrap();
    let extracted = extract_dir(&zip_path, target.path()).unwrap();
    assert_eq!(extracted.len(), 7);

    for entry in WalkDir::new(source.path()).min_depth(1) {
        let entry = entry.unwrap();
        let relative = entry.path().strip_prefix(source.path()).unwrap();
        let extracted = target.path().join(relative);
        if entry.file_type().is_dir() {
            assert!(extracted.is_dir(), "{} missing", relative.display());
        } else {
            assert_eq!(
                fs::read(entry.path()).unwrap(),
                fs::read(&extracted).unwrap(),
                "{} differs",
                relative.display()
            );
        }
    }
}

#[test]
fn flat_directory_skips_subdirectories() {
    let source = tempfile::tempdir().unwrap();
    fs::create_dir_all(source.path().join("sub")).unwrap();
    fs::write(source.path().join("b.txt"), b"second").unwrap();
    fs::write(source.path().join("a.txt"), b"first").unwrap();
    fs::write(source.path().join("sub/hidden.txt"), b"not added").unwrap();

    let work = tempfile::tempdir().unwrap();
    let zip_path = work.path().join("flat.zip");
    assert_eq!(compress_dir(&zip_path, source.path(), false).unwrap(), 2);

    let archive = ZipArchive::open(fs::File::open(&zip_path).unwrap(), OpenMode::Unzip).unwrap();
    assert_eq!(archive.file_names().collect::<Vec<_>>(), ["a.txt", "b.txt"]);
}

#[cfg(unix)]
#[test]
fn extracted_files_keep_permissions() {
    use std::os::unix::fs::PermissionsExt;

    let source = tempfile::tempdir().unwrap();
    let script = source.path().join("run.sh");
    fs::write(&script, b"#!/bin/sh\n").unwrap();
    fs::set_permissions(&script, fs::Permissions::from_mode(0o750)).unwrap();

    let work = tempfile::tempdir().unwrap();
    let zip_path = work.path().join("modes.zip");
    compress_dir(&zip_path, source.path(), true).unwrap();
    extract_dir(&zip_path, work.path().join("out")).unwrap();

    let mode = fs::metadata(work.path().join("out/run.sh")).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o750);
}

#[test]
fn oem_code_page_names() {
    let ibm866 = FileNameCodec::for_label("IBM866").unwrap();
    let config = ArchiveConfig::default().file_name_codec(ibm866);
    let mut archive =
        ZipArchive::open_with_config(Cursor::new(Vec::new()), OpenMode::Create, config.clone())
            .unwrap();
    let mut file = ZipFile::new(&mut archive);
    file.open_write(NewFileInfo::new("Привет.txt"), None, FileOptions::default())
        .unwrap();
    file.write(b"hello").unwrap();
    file.close().unwrap();
    drop(file);
    let bytes = archive.into_inner().unwrap().into_inner();

    let mut archive =
        ZipArchive::open_with_config(Cursor::new(bytes.clone()), OpenMode::Unzip, config).unwrap();
    assert!(archive.go_to_first_file());
    assert_eq!(archive.current_file_name(), Some("Привет.txt"));
    let info = archive.current_file_info().unwrap();
    assert_eq!(info.flags & (1 << 11), 0);

    // one byte per character in the code page
    let archive = ZipArchive::open(Cursor::new(bytes), OpenMode::Unzip).unwrap();
    let name = archive.file_names().next().unwrap().to_owned();
    assert_ne!(name, "Привет.txt");
    assert_eq!(name.chars().count(), "Привет.txt".chars().count());
}

#[test]
fn non_ascii_names_default_to_utf8() {
    let mut archive = ZipArchive::open(Cursor::new(Vec::new()), OpenMode::Create).unwrap();
    let mut file = ZipFile::new(&mut archive);
    file.open_write(NewFileInfo::new("日本語.txt"), None, FileOptions::default())
        .unwrap();
    file.close().unwrap();
    drop(file);
    let bytes = archive.into_inner().unwrap().into_inner();

    let mut archive = ZipArchive::open(Cursor::new(bytes), OpenMode::Unzip).unwrap();
    archive.go_to_first_file();
    assert_eq!(archive.current_file_name(), Some("日本語.txt"));
    assert_ne!(archive.current_file_info().unwrap().flags & (1 << 11), 0);
}

#[test]
fn encrypted_entries() {
    let mut archive = ZipArchive::open(Cursor::new(Vec::new()), OpenMode::Create).unwrap();
    let mut file = ZipFile::new(&mut archive);
    for (name, method) in [
        ("stored.txt", CompressionMethod::Stored),
        ("deflated.txt", CompressionMethod::Deflated),
    ] {
        let options = FileOptions::default().compression_method(method);
        file.open_write(NewFileInfo::new(name), Some(b"PassPass"), options)
            .unwrap();
        file.write(b"some secret text, some secret text").unwrap();
        file.close().unwrap();
    }
    drop(file);
    let bytes = archive.into_inner().unwrap().into_inner();

    let mut archive = ZipArchive::open(Cursor::new(bytes), OpenMode::Unzip).unwrap();
    for info in archive.file_info_list() {
        assert!(info.is_encrypted());
        assert_eq!(info.uncompressed_size, 34);
    }
    let names: Vec<String> = archive.file_names().map(str::to_owned).collect();
    for name in names {
        let mut file = ZipFile::new(&mut archive);
        let cs = zipio::CaseSensitivity::Sensitive;
        let err = file.open_read_by_name(&name, cs, Some(b"wrong")).unwrap_err();
        assert!(matches!(err, ZipError::InvalidPassword { .. }));
        file.open_read_by_name(&name, cs, Some(b"PassPass")).unwrap();
        assert_eq!(file.read_all().unwrap(), b"some secret text, some secret text");
    }
}

#[test]
fn zip64_archive() {
    let config = ArchiveConfig::default().zip64(true);
    let mut archive =
        ZipArchive::open_with_config(Cursor::new(Vec::new()), OpenMode::Create, config).unwrap();
    let mut file = ZipFile::new(&mut archive);
    for i in 0..3 {
        file.open_write(
            NewFileInfo::new(format!("file{i}.txt")),
            None,
            FileOptions::default(),
        )
        .unwrap();
        file.write(format!("contents of {i}").as_bytes()).unwrap();
        file.close().unwrap();
    }
    drop(file);
    let bytes = archive.into_inner().unwrap().into_inner();

    let mut archive = ZipArchive::open(Cursor::new(bytes), OpenMode::Unzip).unwrap();
    assert!(archive.is_zip64());
    assert_eq!(archive.entries_count(), 3);
    archive.set_current_index(2);
    assert_eq!(archive.current_file_info().unwrap().version_needed, 45);
    let mut file = ZipFile::new(&mut archive);
    file.open_read(None).unwrap();
    assert_eq!(file.read_all().unwrap(), b"contents of 2");
}

#[test]
fn archive_and_entry_comments() {
    let mut archive = ZipArchive::open(Cursor::new(Vec::new()), OpenMode::Create).unwrap();
    archive.set_comment("Test comment").unwrap();
    let mut file = ZipFile::new(&mut archive);
    file.open_write(
        NewFileInfo::new("a.txt").with_comment("entry comment"),
        None,
        FileOptions::default(),
    )
    .unwrap();
    file.close().unwrap();
    drop(file);
    let bytes = archive.into_inner().unwrap().into_inner();

    let mut archive = ZipArchive::open(Cursor::new(bytes), OpenMode::Unzip).unwrap();
    assert_eq!(archive.comment(), "Test comment");
    assert_eq!(archive.comment_raw(), b"Test comment");
    archive.go_to_first_file();
    assert_eq!(archive.current_file_info().unwrap().comment, "entry comment");
}

#[test]
fn zip64_switched_on_after_open() {
    let mut archive = ZipArchive::open(Cursor::new(Vec::new()), OpenMode::Create).unwrap();
    assert!(!archive.is_zip64());
    archive.set_zip64_enabled(true);
    assert!(archive.is_zip64());
    let mut file = ZipFile::new(&mut archive);
    file.open_write(NewFileInfo::new("a.txt"), None, FileOptions::default())
        .unwrap();
    file.write(b"small").unwrap();
    file.close().unwrap();
    drop(file);
    let bytes = archive.into_inner().unwrap().into_inner();

    let mut archive = ZipArchive::open(Cursor::new(bytes), OpenMode::Unzip).unwrap();
    assert!(archive.is_zip64());
    archive.go_to_first_file();
    assert_eq!(archive.current_file_info().unwrap().version_needed, 45);
    let mut file = ZipFile::new(&mut archive);
    file.open_read(None).unwrap();
    assert_eq!(file.read_all().unwrap(), b"small");
}

#[test]
fn comment_codec_switched_after_open() {
    let ibm866 = FileNameCodec::for_label("IBM866").unwrap();
    let mut archive = ZipArchive::open(Cursor::new(Vec::new()), OpenMode::Create).unwrap();
    archive.set_comment_codec(ibm866);
    archive.set_comment("Комментарий").unwrap();
    assert_eq!(archive.comment_raw().len(), "Комментарий".chars().count());
    let mut file = ZipFile::new(&mut archive);
    file.open_write(
        NewFileInfo::new("a.txt").with_comment("Заметка"),
        None,
        FileOptions::default(),
    )
    .unwrap();
    file.close().unwrap();
    drop(file);
    let bytes = archive.into_inner().unwrap().into_inner();

    let mut archive = ZipArchive::open(Cursor::new(bytes), OpenMode::Unzip).unwrap();
    archive.go_to_first_file();
    assert_ne!(archive.comment(), "Комментарий");
    assert_ne!(archive.current_file_info().unwrap().comment, "Заметка");

    archive.set_comment_codec(ibm866);
    assert_eq!(archive.comment(), "Комментарий");
    assert_eq!(archive.current_file_info().unwrap().comment, "Заметка");
    assert_eq!(archive.current_file_info().unwrap().flags & (1 << 11), 0);
}

#[test]
fn utf8_names_forced_after_open() {
    let write = |utf8: bool| {
        let mut archive = ZipArchive::open(Cursor::new(Vec::new()), OpenMode::Create).unwrap();
        archive.set_utf8_names(utf8);
        let mut file = ZipFile::new(&mut archive);
        file.open_write(NewFileInfo::new("café.txt"), None, FileOptions::default())
            .unwrap();
        file.close().unwrap();
        drop(file);
        archive.into_inner().unwrap().into_inner()
    };

    // cp437 stores é in one byte, UTF-8 in two
    for (utf8, name_len) in [(false, 8), (true, 9)] {
        let bytes = write(utf8);
        assert_eq!(u16::from_le_bytes([bytes[26], bytes[27]]), name_len);
        let mut archive = ZipArchive::open(Cursor::new(bytes), OpenMode::Unzip).unwrap();
        archive.go_to_first_file();
        let info = archive.current_file_info().unwrap();
        assert_eq!(info.name, "café.txt");
        assert_eq!(info.flags & (1 << 11) != 0, utf8);
    }
}

#[test]
fn write_reopen_iterate() {
    let entries = [("a.txt", "hello"), ("dir/b.txt", "world")];
    let mut archive = ZipArchive::open(Cursor::new(Vec::new()), OpenMode::Create).unwrap();
    let mut file = ZipFile::new(&mut archive);
    for (name, contents) in entries {
        file.open_write(NewFileInfo::new(name), None, FileOptions::default())
            .unwrap();
        file.write(contents.as_bytes()).unwrap();
        file.close().unwrap();
    }
    drop(file);
    let bytes = archive.into_inner().unwrap().into_inner();

    let mut archive = ZipArchive::open(Cursor::new(bytes), OpenMode::Unzip).unwrap();
    let mut expected = entries.iter();
    let mut more = archive.go_to_first_file();
    while more {
        let (name, contents) = expected.next().unwrap();
        assert_eq!(archive.current_file_name(), Some(*name));
        let mut file = ZipFile::new(&mut archive);
        file.open_read(None).unwrap();
        assert_eq!(file.read_all().unwrap(), contents.as_bytes());
        assert!(file.at_end());
        drop(file);
        more = archive.go_to_next_file();
    }
    assert!(expected.next().is_none());
}
