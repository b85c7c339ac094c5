use std::io::Cursor;

use zipio::result::ZipError;
use zipio::{CaseSensitivity, FileOptions, NewFileInfo, OpenMode, ZipArchive, ZipFile};

fn archive_of(entries: &[(&str, &str)]) -> ZipArchive<Cursor<Vec<u8>>> {
    let mut archive = ZipArchive::open(Cursor::new(Vec::new()), OpenMode::Create).unwrap();
    let mut file = ZipFile::new(&mut archive);
    for (name, contents) in entries {
        file.open_write(NewFileInfo::new(*name), None, FileOptions::default())
            .unwrap();
        file.write(contents.as_bytes()).unwrap();
        file.close().unwrap();
    }
    drop(file);
    let bytes = archive.into_inner().unwrap().into_inner();
    ZipArchive::open(Cursor::new(bytes), OpenMode::Unzip).unwrap()
}

#[test]
fn cursor_walk() {
    let mut archive = archive_of(&[("one", "1"), ("two", "2"), ("three", "3")]);
    assert!(!archive.has_current_file());

    let mut seen = Vec::new();
    let mut more = archive.go_to_first_file();
    while more {
        seen.push(archive.current_file_name().unwrap().to_owned());
        more = archive.go_to_next_file();
    }
    assert_eq!(seen, ["one", "two", "three"]);
    assert!(!archive.has_current_file());
    assert!(!archive.go_to_next_file());
    assert_eq!(archive.file_names().collect::<Vec<_>>(), seen);
}

#[test]
fn empty_archive_has_no_first_file() {
    let mut archive = archive_of(&[]);
    assert_eq!(archive.entries_count(), 0);
    assert!(!archive.go_to_first_file());
    assert!(archive.current_file_info().is_none());
}

#[test]
fn case_sensitivity() {
    let mut archive = archive_of(&[("Dir/File.TXT", "x")]);
    assert!(!archive.set_current_file("dir/file.txt", CaseSensitivity::Sensitive));
    assert_eq!(
        archive.set_current_file("dir/file.txt", CaseSensitivity::Default),
        cfg!(windows)
    );
    assert!(archive.set_current_file("dir/file.txt", CaseSensitivity::Insensitive));
    assert!(archive.set_current_file("Dir/File.TXT", CaseSensitivity::Default));
}

#[test]
fn case_folding_beyond_ascii() {
    let mut archive = archive_of(&[("Привет.txt", "hi"), ("Straße.txt", "street")]);
    assert!(!archive.set_current_file("ПРИВЕТ.TXT", CaseSensitivity::Sensitive));
    assert!(archive.set_current_file("ПРИВЕТ.TXT", CaseSensitivity::Insensitive));
    assert_eq!(archive.current_file_name(), Some("Привет.txt"));
    // lowercasing maps characters one to one, so ß never matches "ss"
    assert!(!archive.set_current_file("STRASSE.TXT", CaseSensitivity::Insensitive));
    assert!(archive.set_current_file("straße.TXT", CaseSensitivity::Insensitive));

    let mut file = ZipFile::new(&mut archive);
    file.open_read_by_name("привет.TXT", CaseSensitivity::Insensitive, None)
        .unwrap();
    assert_eq!(file.read_all().unwrap(), b"hi");
}

#[test]
fn failed_lookup_keeps_selection() {
    let mut archive = archive_of(&[("a", "1"), ("b", "2")]);
    assert!(archive.set_current_file("b", CaseSensitivity::Sensitive));
    assert!(!archive.set_current_file("missing", CaseSensitivity::Sensitive));
    assert_eq!(archive.current_file_name(), Some("b"));

    let mut file = ZipFile::new(&mut archive);
    let err = file
        .open_read_by_name("missing", CaseSensitivity::Sensitive, None)
        .unwrap_err();
    assert!(matches!(err, ZipError::FileNotFound(_)));
    assert_eq!(file.archive().current_file_name(), Some("b"));
}

#[test]
fn duplicate_names_resolve_to_the_first() {
    let mut archive = archive_of(&[("dup", "first"), ("other", ""), ("dup", "second")]);
    assert_eq!(archive.entries_count(), 3);
    assert!(archive.set_current_file("dup", CaseSensitivity::Sensitive));
    assert_eq!(archive.current_file_index(), Some(0));

    let mut file = ZipFile::new(&mut archive);
    file.open_read(None).unwrap();
    assert_eq!(file.read_all().unwrap(), b"first");
    file.close().unwrap();

    // the later duplicate is still reachable by index
    file.archive_mut().unwrap().set_current_index(2);
    file.open_read(None).unwrap();
    assert_eq!(file.read_all().unwrap(), b"second");
}

#[test]
fn lookup_by_name_then_read() {
    let mut archive = archive_of(&[("a.txt", "alpha"), ("b.txt", "beta")]);
    let mut file = ZipFile::new(&mut archive);
    file.open_read_by_name("B.TXT", CaseSensitivity::Insensitive, None)
        .unwrap();
    assert_eq!(file.actual_file_name().unwrap(), "b.txt");
    assert_eq!(file.read_all().unwrap(), b"beta");
}
