//! Slide deck packaging tests.

use std::io::{Cursor, Read};

use chrono::{Local, TimeZone};
use video2ppt::{
    DeckBuilder, ExtractOptions, MAX_SLIDES, SlideExtractor, SyntheticSource, Video2PptError,
    read_deck_images,
};
use zip::ZipArchive;

fn part(bytes: &[u8], name: &str) -> String {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
    let mut entry = archive.by_name(name).unwrap();
    let mut text = String::new();
    entry.read_to_string(&mut text).unwrap();
    text
}

fn fake_images(count: usize) -> Vec<Vec<u8>> {
    (0..count)
        .map(|index| format!("image-{index}").into_bytes())
        .collect()
}

// ── Packaging ──────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn extracted_slides_survive_packaging() {
    let mut source = SyntheticSource::new(120.0)
        .with_scene(0.0, [0, 0, 0, 255])
        .with_scene(60.0, [255, 255, 255, 255]);
    let slides = SlideExtractor::new(ExtractOptions::new().with_threshold(20.0))
        .extract(&mut source)
        .await
        .unwrap();

    let deck = DeckBuilder::new().build(&slides).unwrap();
    assert_eq!(deck.slide_count(), 2);

    let images = read_deck_images(deck.bytes()).unwrap();
    assert_eq!(images.len(), 2);
    for (image, slide) in images.iter().zip(slides.iter()) {
        assert_eq!(image.as_slice(), slide.jpeg());
    }
}

#[test]
fn images_keep_their_order() {
    let images = fake_images(5);
    let deck = DeckBuilder::new().build_from_images(&images).unwrap();

    assert_eq!(read_deck_images(deck.bytes()).unwrap(), images);
}

#[test]
fn presentation_is_widescreen() {
    let deck = DeckBuilder::new().build_from_images(&fake_images(1)).unwrap();

    let presentation = part(deck.bytes(), "ppt/presentation.xml");
    assert!(presentation.contains(r#"<p:sldSz cx="12192000" cy="6858000""#));
    assert!(presentation.contains(r#"<p:sldId id="256" r:id="rId5"/>"#));
}

#[test]
fn slide_references_its_image() {
    let deck = DeckBuilder::new().build_from_images(&fake_images(3)).unwrap();

    let rels = part(deck.bytes(), "ppt/slides/_rels/slide3.xml.rels");
    assert!(rels.contains("../media/image3.jpeg"));
    assert!(rels.contains("../slideLayouts/slideLayout1.xml"));

    let content_types = part(deck.bytes(), "[Content_Types].xml");
    assert!(content_types.contains(r#"<Default Extension="jpeg" ContentType="image/jpeg"/>"#));
    assert!(content_types.contains("/ppt/slides/slide3.xml"));
}

#[test]
fn title_is_escaped_into_properties() {
    let deck = DeckBuilder::new()
        .with_title("Q&A <draft>")
        .build_from_images(&fake_images(1))
        .unwrap();

    let core = part(deck.bytes(), "docProps/core.xml");
    assert!(core.contains("Q&amp;A &lt;draft&gt;"));
}

// ── Limits ─────────────────────────────────────────────────────────

#[test]
fn decks_are_capped_at_max_slides() {
    let images = fake_images(MAX_SLIDES + 44);
    let deck = DeckBuilder::new().build_from_images(&images).unwrap();

    assert_eq!(deck.slide_count(), MAX_SLIDES);
    let read_back = read_deck_images(deck.bytes()).unwrap();
    assert_eq!(read_back.len(), MAX_SLIDES);
    assert_eq!(read_back.last(), images.get(MAX_SLIDES - 1));
}

#[test]
fn builder_cap_never_exceeds_max_slides() {
    let deck = DeckBuilder::new()
        .with_max_slides(10_000)
        .build_from_images(&fake_images(MAX_SLIDES + 1))
        .unwrap();
    assert_eq!(deck.slide_count(), MAX_SLIDES);
}

#[test]
fn smaller_cap_truncates() {
    let deck = DeckBuilder::new()
        .with_max_slides(2)
        .build_from_images(&fake_images(4))
        .unwrap();
    assert_eq!(deck.slide_count(), 2);
}

#[test]
fn empty_input_is_rejected() {
    let images: Vec<Vec<u8>> = Vec::new();
    let result = DeckBuilder::new().build_from_images(&images);
    assert!(matches!(result, Err(Video2PptError::EmptyDeck)));

    let result = DeckBuilder::new()
        .with_max_slides(0)
        .build_from_images(&fake_images(1));
    assert!(matches!(result, Err(Video2PptError::EmptyDeck)));
}

// ── Naming and saving ──────────────────────────────────────────────

#[test]
fn file_name_follows_creation_time() {
    let created = Local.with_ymd_and_hms(2025, 11, 2, 9, 7, 30).unwrap();
    let builder = DeckBuilder::new().with_created(created);
    assert_eq!(builder.file_name(), "Video2PPT_2025-11-02_0907.pptx");

    let deck = builder.build_from_images(&fake_images(1)).unwrap();
    assert_eq!(deck.file_name(), "Video2PPT_2025-11-02_0907.pptx");
}

#[test]
fn save_in_creates_the_directory() {
    let directory = tempfile::tempdir().unwrap();
    let target = directory.path().join("decks").join("lecture");
    let created = Local.with_ymd_and_hms(2025, 1, 31, 23, 59, 0).unwrap();

    let deck = DeckBuilder::new()
        .with_created(created)
        .build_from_images(&fake_images(2))
        .unwrap();
    let path = deck.save_in(&target).unwrap();

    assert_eq!(path, target.join("Video2PPT_2025-01-31_2359.pptx"));
    assert_eq!(std::fs::read(&path).unwrap(), deck.bytes());
}

#[test]
fn save_writes_the_exact_bytes() {
    let directory = tempfile::tempdir().unwrap();
    let path = directory.path().join("talk.pptx");

    let deck = DeckBuilder::new().build_from_images(&fake_images(1)).unwrap();
    deck.save(&path).unwrap();

    let written = std::fs::read(&path).unwrap();
    assert_eq!(read_deck_images(&written).unwrap(), fake_images(1));
}

// ── Reading ────────────────────────────────────────────────────────

#[test]
fn garbage_is_not_a_deck() {
    let result = read_deck_images(b"definitely not a zip archive");
    assert!(matches!(result, Err(Video2PptError::ZipError(_))));
}
