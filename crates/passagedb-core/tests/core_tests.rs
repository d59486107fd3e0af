use std::fs;
use std::io::Write;
use tempfile::TempDir;

use passagedb_core::chunking::{list_documents, passages, read_document, ParagraphChunker};

#[test]
fn read_document_single_small_file() {
    let tmp = TempDir::new().unwrap();
    let file_path = tmp.path().join("a.txt");
    let mut f = fs::File::create(&file_path).unwrap();
    writeln!(f, "Short text").unwrap();

    let doc = read_document(&file_path, None).expect("read");
    assert_eq!(doc.name, "a.txt", "name defaults to the file name");

    let chunker = ParagraphChunker::default();
    let ps = passages(&chunker, &doc);
    assert_eq!(ps.len(), 1, "one small paragraph becomes one passage");
    assert_eq!(ps[0].text, "Short text");
    assert_eq!(ps[0].source_document_name, "a.txt");
}

#[test]
fn explicit_name_wins_and_invalid_utf8_is_lossy() {
    let tmp = TempDir::new().unwrap();
    let file_path = tmp.path().join("b.md");
    fs::write(&file_path, [b'o', b'k', b' ', 0xff, b'!']).unwrap();

    let doc = read_document(&file_path, Some("A Definition of AGI")).expect("read");
    assert_eq!(doc.name, "A Definition of AGI");
    assert!(doc.raw_text.starts_with("ok "));
}

#[test]
fn list_documents_filters_and_sorts() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    fs::create_dir_all(dir.join("sub")).unwrap();
    fs::write(dir.join("b.txt"), "bravo").unwrap();
    fs::write(dir.join("sub/a.md"), "alpha").unwrap();
    fs::write(dir.join("skip.bin"), "x").unwrap();

    let files = list_documents(dir);
    assert_eq!(files.len(), 2);
    assert!(files[0].ends_with("b.txt"));
    assert!(files[1].ends_with("sub/a.md"));
}
