use std::fs;
use std::path::Path;
use std::sync::Arc;

use txt_reader::config::parse_config;
use txt_reader::{
    BookParser, FsByteSource, Navigation, Parser, ReaderConfig, ReadingSession, RecordStore,
    SessionState, TextEncoding, TomlStore,
};

fn write_gb18030(path: &Path, text: &str) {
    let (bytes, _, had_errors) = encoding_rs::GB18030.encode(text);
    assert!(!had_errors);
    fs::write(path, bytes).unwrap();
}

fn session(store: &Arc<TomlStore>, config: ReaderConfig) -> ReadingSession {
    let parser = Parser::txt(Arc::new(FsByteSource), config.segmenter_options());
    ReadingSession::new(parser, store.clone(), config)
}

fn config() -> ReaderConfig {
    parse_config("[reading]\ncharacters_per_page = 12\nresume_page_position = true\n").unwrap()
}

#[test]
fn reads_gb18030_book_across_sessions() {
    let dir = tempfile::tempdir().unwrap();
    let book_path = dir.path().join("西游记.txt");
    write_gb18030(
        &book_path,
        "序言\n天地之数\n第一回 灵根孕育源流出\n花果山上一块仙石\n迸裂产一石卵\n第二回 悟彻菩提真妙理\n美猴王拜师学艺\n",
    );
    let store = Arc::new(TomlStore::open(dir.path().join("store")).unwrap());

    let mut reader = session(&store, config());
    reader.open_path(&book_path).unwrap();
    let book = reader.book().cloned().unwrap();
    assert_eq!(book.title, "西游记");
    assert_eq!(book.encoding, Some(TextEncoding::Gb18030));

    let titles: Vec<_> = reader.chapters().iter().map(|c| c.title.as_str()).collect();
    assert_eq!(titles, vec!["Chapter 1", "第一回 灵根孕育源流出", "第二回 悟彻菩提真妙理"]);
    let file_len = fs::metadata(&book_path).unwrap().len();
    assert_eq!(reader.chapters().last().unwrap().end_offset, file_len);
    assert_eq!(reader.current_page(), Some("序言\n天地之数"));

    assert_eq!(reader.next_page().unwrap(), Navigation::ChapterChanged);
    assert_eq!(reader.current_page(), Some("第一回 灵根孕育源流出"));
    assert_eq!(reader.next_page().unwrap(), Navigation::Moved);
    assert_eq!(reader.current_page(), Some("花果山上一块仙石"));
    reader.close().unwrap();

    let stored = store.load_book(&book.id).unwrap().unwrap();
    assert!(stored.is_reading);
    assert_eq!(stored.last_read_chapter, 1);

    let mut reader = session(&store, config());
    reader.open_path(&book_path).unwrap();
    match reader.state() {
        SessionState::ChapterLoaded {
            chapter_index,
            page_index,
            ..
        } => assert_eq!((*chapter_index, *page_index), (1, 1)),
        other => panic!("unexpected state {other:?}"),
    }
}

#[test]
fn book_without_headings_is_one_chapter() {
    let dir = tempfile::tempdir().unwrap();
    let book_path = dir.path().join("notes.txt");
    fs::write(&book_path, "just some notes\nwith no headings at all\n").unwrap();
    let store = Arc::new(TomlStore::open(dir.path().join("store")).unwrap());

    let mut reader = session(&store, ReaderConfig::default());
    reader.open_path(&book_path).unwrap();
    assert_eq!(reader.chapters().len(), 1);
    assert_eq!(reader.chapters()[0].title, "Full Text");
    assert_eq!(reader.next_page().unwrap(), Navigation::AtBoundary);

    let parser = reader.parser().clone();
    let book = reader.book().cloned().unwrap();
    let text = parser
        .load_chapter_content(&book, &reader.chapters()[0])
        .unwrap();
    assert_eq!(text, "just some notes\nwith no headings at all\n");
}

#[test]
fn deleting_book_drops_cached_chapters() {
    let dir = tempfile::tempdir().unwrap();
    let book_path = dir.path().join("short.txt");
    fs::write(&book_path, "Chapter 1\none\nChapter 2\ntwo\n").unwrap();
    let store = Arc::new(TomlStore::open(dir.path().join("store")).unwrap());

    let mut reader = session(&store, ReaderConfig::default());
    reader.open_path(&book_path).unwrap();
    let book = reader.close().unwrap().unwrap();
    assert_eq!(store.query_chapters_for(&book.id).unwrap().len(), 2);

    store.delete_book(&book.id).unwrap();
    assert!(store.load_book(&book.id).unwrap().is_none());
    assert!(store.query_chapters_for(&book.id).unwrap().is_empty());
}
