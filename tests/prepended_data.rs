use std::io::Cursor;

use zipio::{ArchiveConfig, FileOptions, NewFileInfo, OpenMode, ZipArchive, ZipFile};

fn sample_archive(config: ArchiveConfig) -> Vec<u8> {
    let mut archive =
        ZipArchive::open_with_config(Cursor::new(Vec::new()), OpenMode::Create, config).unwrap();
    let mut file = ZipFile::new(&mut archive);
    for (name, contents) in [("one.txt", "first file"), ("two.txt", "second file")] {
        file.open_write(NewFileInfo::new(name), None, FileOptions::default())
            .unwrap();
        file.write(contents.as_bytes()).unwrap();
        file.close().unwrap();
    }
    drop(file);
    archive.into_inner().unwrap().into_inner()
}

fn check_readable(bytes: Vec<u8>, expected_offset: u64) {
    let mut archive = ZipArchive::open(Cursor::new(bytes), OpenMode::Unzip)
        .expect("couldn't open test zip file");
    assert_eq!(archive.offset(), expected_offset);
    assert_eq!(archive.entries_count(), 2);

    let mut more = archive.go_to_first_file();
    let mut contents = Vec::new();
    while more {
        let mut file = ZipFile::new(&mut archive);
        file.open_read(None).unwrap();
        contents.push(String::from_utf8(file.read_all().unwrap()).unwrap());
        drop(file);
        more = archive.go_to_next_file();
    }
    assert_eq!(contents, ["first file", "second file"]);
}

#[test]
fn test_prepended_garbage() {
    let mut v = vec![0, 1, 2, 3];
    v.extend_from_slice(&sample_archive(ArchiveConfig::default()));
    check_readable(v, 4);
}

#[test]
fn prepended_garbage_zip64() {
    let mut v = b"MZ".repeat(300);
    v.extend_from_slice(&sample_archive(ArchiveConfig::default().zip64(true)));
    check_readable(v, 600);
}

#[test]
fn no_prepended_data() {
    check_readable(sample_archive(ArchiveConfig::default()), 0);
}
