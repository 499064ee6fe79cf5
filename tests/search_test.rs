//! Session-level search and highlight behavior.

use std::io::{Cursor, Write};

use folio::{CharCountMeasure, MemoryStore, ReaderConfig, ReaderSession, Viewport};
use zip::write::SimpleFileOptions;

fn build_epub(body: &str) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();

    writer
        .start_file("META-INF/container.xml", options)
        .unwrap();
    writer
        .write_all(
            br#"<container><rootfiles>
<rootfile full-path="content.opf" media-type="application/oebps-package+xml"/>
</rootfiles></container>"#,
        )
        .unwrap();

    writer.start_file("content.opf", options).unwrap();
    writer
        .write_all(
            br#"<package>
<metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
<dc:title>Search Book</dc:title><dc:identifier>urn:search:1</dc:identifier>
</metadata>
<manifest><item id="ch0" href="ch0.xhtml" media-type="application/xhtml+xml"/></manifest>
<spine><itemref idref="ch0"/></spine>
</package>"#,
        )
        .unwrap();

    writer.start_file("ch0.xhtml", options).unwrap();
    writer
        .write_all(format!("<html><body>{body}</body></html>").as_bytes())
        .unwrap();

    writer.finish().unwrap().into_inner()
}

fn open_session(body: &str) -> ReaderSession {
    let viewport = Viewport::new(400.0, 620.0);
    let mut session = ReaderSession::open(
        build_epub(body),
        ReaderConfig::new(viewport),
        Box::new(MemoryStore::new()),
    )
    .unwrap();
    session.paginate_current(&CharCountMeasure::default());
    session
}

fn long_body_with_marker(words: usize) -> String {
    let filler: Vec<String> = (0..words).map(|i| format!("word{i}")).collect();
    format!("<p>{} needle {}</p>", filler.join(" "), filler.join(" "))
}

#[test]
fn test_search_finds_match_on_later_page() {
    let session = open_session(&long_body_with_marker(400));
    let matches = session.search("needle");

    assert_eq!(matches.len(), 1);
    assert!(matches[0].page_index > 0, "marker should land past page 0");
    assert!(matches[0].context.contains("needle"));
}

#[test]
fn test_search_does_not_alter_position() {
    let session = open_session(&long_body_with_marker(400));
    let before = session.position();

    let hits = session.search("needle");
    assert!(!hits.is_empty());
    let misses = session.search("zxqvw-not-present");
    assert!(misses.is_empty());

    assert_eq!(session.position(), before);
}

#[test]
fn test_search_matches_in_reading_order() {
    let session = open_session(&long_body_with_marker(400).repeat(2));
    let matches = session.search("needle");

    assert_eq!(matches.len(), 2);
    let ordered = matches.windows(2).all(|w| {
        w[0].page_index < w[1].page_index
            || (w[0].page_index == w[1].page_index
                && w[0].char_offset_in_page <= w[1].char_offset_in_page)
    });
    assert!(ordered);
}

#[test]
fn test_highlight_and_clear_roundtrip() {
    let mut session = open_session("<p>some searchable text here</p>");
    let pristine = session.pages().to_vec();

    let matches = session.search("searchable");
    assert_eq!(matches.len(), 1);
    session.highlight(&matches[0]);

    let highlighted = folio::markup::serialize(&session.pages()[0].nodes);
    assert!(highlighted.contains("<mark>searchable</mark>"));

    session.clear_highlights();
    assert_eq!(session.pages(), &pristine[..]);
}

#[test]
fn test_highlighting_preserves_search_results() {
    let mut session = open_session("<p>echo echo echo</p>");
    let matches = session.search("echo");
    assert_eq!(matches.len(), 3);

    for m in &matches {
        session.highlight(m);
    }

    // Flattened text is unchanged by highlighting, so a re-search finds
    // the same offsets.
    assert_eq!(session.search("echo"), matches);
}
