//! End-to-end ingestion tests over in-memory EPUB containers.

use std::io::{Cursor, Write};

use folio::{materialize_chapters, resolve_manifest, Error, Package};
use zip::write::SimpleFileOptions;

/// Build a minimal EPUB container in memory.
fn build_epub(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();
    for (path, data) in entries {
        writer.start_file(*path, options).unwrap();
        writer.write_all(data).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

const CONTAINER_XML: &[u8] = br#"<?xml version="1.0"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>"#;

fn opf(manifest_items: &str, spine_refs: &str) -> Vec<u8> {
    format!(
        r#"<?xml version="1.0"?>
<package xmlns="http://www.idpf.org/2007/opf" version="3.0">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
    <dc:title>Test Book</dc:title>
    <dc:creator>Test Author</dc:creator>
    <dc:language>en</dc:language>
    <dc:identifier>urn:test:1</dc:identifier>
  </metadata>
  <manifest>
{manifest_items}
  </manifest>
  <spine>
{spine_refs}
  </spine>
</package>"#
    )
    .into_bytes()
}

fn two_chapter_epub() -> Vec<u8> {
    let opf = opf(
        r#"    <item id="ch1" href="ch1.xhtml" media-type="application/xhtml+xml"/>
    <item id="ch2" href="text/ch2.xhtml" media-type="application/xhtml+xml"/>"#,
        r#"    <itemref idref="ch1"/>
    <itemref idref="ch2"/>"#,
    );
    build_epub(&[
        ("META-INF/container.xml", CONTAINER_XML),
        ("OEBPS/content.opf", &opf),
        (
            "OEBPS/ch1.xhtml",
            b"<html><body><h1>The Beginning</h1><p>First chapter text.</p></body></html>",
        ),
        (
            "OEBPS/text/ch2.xhtml",
            b"<html><body><p>Second chapter, no heading.</p></body></html>",
        ),
    ])
}

#[test]
fn test_resolve_manifest() {
    let mut package = Package::open(two_chapter_epub()).unwrap();
    let outline = resolve_manifest(&mut package).unwrap();

    assert_eq!(outline.metadata.title, "Test Book");
    assert_eq!(outline.metadata.authors, vec!["Test Author"]);
    assert_eq!(outline.metadata.identifier, "urn:test:1");

    assert_eq!(outline.chapters.len(), 2);
    assert_eq!(outline.chapters[0].source_path, "OEBPS/ch1.xhtml");
    assert_eq!(outline.chapters[0].order, 0);
    assert_eq!(outline.chapters[0].title, "Chapter 1");
    assert_eq!(outline.chapters[1].source_path, "OEBPS/text/ch2.xhtml");
    assert_eq!(outline.chapters[1].order, 1);
}

#[test]
fn test_missing_pointer_file() {
    let bytes = build_epub(&[("OEBPS/content.opf", b"<package/>")]);
    let mut package = Package::open(bytes).unwrap();
    let result = resolve_manifest(&mut package);
    assert!(matches!(result, Err(Error::MissingPointerFile(_))));
}

#[test]
fn test_malformed_pointer_file() {
    let bytes = build_epub(&[("META-INF/container.xml", b"<container><rootfiles/></container>")]);
    let mut package = Package::open(bytes).unwrap();
    let result = resolve_manifest(&mut package);
    assert!(matches!(result, Err(Error::MalformedPointerFile(_))));
}

#[test]
fn test_empty_spine() {
    let opf = opf(
        r#"    <item id="ch1" href="ch1.xhtml" media-type="application/xhtml+xml"/>"#,
        "",
    );
    let bytes = build_epub(&[
        ("META-INF/container.xml", CONTAINER_XML),
        ("OEBPS/content.opf", &opf),
    ]);
    let mut package = Package::open(bytes).unwrap();
    assert!(matches!(resolve_manifest(&mut package), Err(Error::EmptySpine)));
}

#[test]
fn test_spine_ref_without_manifest_entry_is_skipped() {
    let opf = opf(
        r#"    <item id="ch1" href="ch1.xhtml" media-type="application/xhtml+xml"/>"#,
        r#"    <itemref idref="ghost"/>
    <itemref idref="ch1"/>"#,
    );
    let bytes = build_epub(&[
        ("META-INF/container.xml", CONTAINER_XML),
        ("OEBPS/content.opf", &opf),
        ("OEBPS/ch1.xhtml", b"<body><p>hello</p></body>"),
    ]);
    let mut package = Package::open(bytes).unwrap();
    let outline = resolve_manifest(&mut package).unwrap();

    assert_eq!(outline.chapters.len(), 1);
    assert_eq!(outline.chapters[0].source_path, "OEBPS/ch1.xhtml");
    assert_eq!(outline.chapters[0].title, "Chapter 1");
}

#[test]
fn test_materialize_refines_titles() {
    let mut package = Package::open(two_chapter_epub()).unwrap();
    let outline = resolve_manifest(&mut package).unwrap();
    let chapters = materialize_chapters(&mut package, &outline);

    // h1 overrides the spine-derived default; its absence keeps it.
    assert_eq!(chapters[0].descriptor.title, "The Beginning");
    assert_eq!(chapters[1].descriptor.title, "Chapter 2");
}

#[test]
fn test_materialize_missing_chapter_placeholder() {
    let opf = opf(
        r#"    <item id="ch1" href="gone.xhtml" media-type="application/xhtml+xml"/>"#,
        r#"    <itemref idref="ch1"/>"#,
    );
    let bytes = build_epub(&[
        ("META-INF/container.xml", CONTAINER_XML),
        ("OEBPS/content.opf", &opf),
    ]);
    let mut package = Package::open(bytes).unwrap();
    let outline = resolve_manifest(&mut package).unwrap();
    let chapters = materialize_chapters(&mut package, &outline);

    assert_eq!(chapters.len(), 1);
    assert_eq!(chapters[0].markup, "<p>Chapter content not available</p>");
}

#[test]
fn test_materialize_inlines_images() {
    let opf = opf(
        r#"    <item id="ch1" href="text/ch1.xhtml" media-type="application/xhtml+xml"/>"#,
        r#"    <itemref idref="ch1"/>"#,
    );
    let png = [0x89u8, b'P', b'N', b'G', 0, 1, 2, 3];
    let bytes = build_epub(&[
        ("META-INF/container.xml", CONTAINER_XML),
        ("OEBPS/content.opf", &opf),
        (
            "OEBPS/text/ch1.xhtml",
            br#"<body><p>pic:</p><img src="../images/fig.png"/><img src="missing.jpg"/></body>"#,
        ),
        ("OEBPS/images/fig.png", &png),
    ]);
    let mut package = Package::open(bytes).unwrap();
    let outline = resolve_manifest(&mut package).unwrap();
    let chapters = materialize_chapters(&mut package, &outline);

    let markup = &chapters[0].markup;
    // Resolved image becomes a data URI; the markup is self-contained.
    assert!(markup.contains("data:image/png;base64,"));
    assert!(!markup.contains("../images/fig.png"));
    // Missing image reference is left untouched (broken image, non-fatal).
    assert!(markup.contains(r#"src="missing.jpg""#));
}

#[test]
fn test_materialize_ignores_remote_images() {
    let opf = opf(
        r#"    <item id="ch1" href="ch1.xhtml" media-type="application/xhtml+xml"/>"#,
        r#"    <itemref idref="ch1"/>"#,
    );
    let bytes = build_epub(&[
        ("META-INF/container.xml", CONTAINER_XML),
        ("OEBPS/content.opf", &opf),
        (
            "OEBPS/ch1.xhtml",
            br#"<body><img src="https://example.com/x.png"/></body>"#,
        ),
    ]);
    let mut package = Package::open(bytes).unwrap();
    let outline = resolve_manifest(&mut package).unwrap();
    let chapters = materialize_chapters(&mut package, &outline);

    assert!(chapters[0].markup.contains("https://example.com/x.png"));
    assert!(!chapters[0].markup.contains("data:image"));
}

#[test]
fn test_open_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("book.epub");
    std::fs::write(&path, two_chapter_epub()).unwrap();

    let mut package = Package::open(std::fs::read(&path).unwrap()).unwrap();
    let outline = resolve_manifest(&mut package).unwrap();
    assert_eq!(outline.chapters.len(), 2);
}

#[test]
fn test_corrupt_archive() {
    assert!(matches!(
        Package::open(b"garbage".to_vec()),
        Err(Error::CorruptArchive(_))
    ));
}
