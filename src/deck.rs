//! Slide deck serialization.
//!
//! [`DeckBuilder`] packages slide images into an Office Open XML
//! presentation (`.pptx`): a 16:9 deck with one full-bleed picture per
//! slide. The package is written in memory with the `zip` crate, so a
//! failure never leaves a partial file behind.
//!
//! # Example
//!
//! ```no_run
//! use video2ppt::{DeckBuilder, ExtractOptions, SlideExtractor, SyntheticSource};
//!
//! # async fn example() -> Result<(), video2ppt::Video2PptError> {
//! let mut source = SyntheticSource::new(60.0);
//! let slides = SlideExtractor::new(ExtractOptions::new()).extract(&mut source).await?;
//!
//! let deck = DeckBuilder::new().with_title("Lecture 3").build(&slides)?;
//! deck.save_in("decks")?;
//! # Ok(())
//! # }
//! ```

use std::fmt::Write as _;
use std::fs;
use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, Utc};
use zip::{CompressionMethod, ZipArchive, ZipWriter, write::SimpleFileOptions};

use crate::configuration::MAX_SLIDES;
use crate::error::Video2PptError;
use crate::slides::SlideSet;

/// Slide width in EMU (13.333 in).
pub const SLIDE_WIDTH_EMU: u64 = 12_192_000;
/// Slide height in EMU (7.5 in).
pub const SLIDE_HEIGHT_EMU: u64 = 6_858_000;

const NS_A: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";
const NS_R: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const NS_P: &str = "http://schemas.openxmlformats.org/presentationml/2006/main";
const NS_RELS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
const REL: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const XML_HEADER: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#;

/// Relationship ids in `presentation.xml.rels` before the first slide.
const FIXED_PRESENTATION_RELS: usize = 4;

/// A serialized presentation.
#[derive(Debug, Clone)]
pub struct Deck {
    bytes: Vec<u8>,
    file_name: String,
    slide_count: usize,
}

impl Deck {
    /// The `.pptx` package.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Suggested file name, `Video2PPT_YYYY-MM-DD_HHMM.pptx`.
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn slide_count(&self) -> usize {
        self.slide_count
    }

    /// Write the deck to `path`.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), Video2PptError> {
        fs::write(path, &self.bytes)?;
        Ok(())
    }

    /// Write the deck into `directory` under its suggested name, returning
    /// the full path.
    pub fn save_in<P: AsRef<Path>>(&self, directory: P) -> Result<PathBuf, Video2PptError> {
        let directory = directory.as_ref();
        fs::create_dir_all(directory)?;
        let path = directory.join(&self.file_name);
        self.save(&path)?;
        Ok(path)
    }
}

/// Builds [`Deck`]s.
#[derive(Debug, Clone)]
pub struct DeckBuilder {
    title: String,
    max_slides: usize,
    created: DateTime<Local>,
}

impl Default for DeckBuilder {
    fn default() -> Self {
        Self {
            title: "Video2PPT".to_string(),
            max_slides: MAX_SLIDES,
            created: Local::now(),
        }
    }
}

impl DeckBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Document title stored in the package properties.
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Keep at most this many slides (never more than 256).
    #[must_use]
    pub fn with_max_slides(mut self, max_slides: usize) -> Self {
        self.max_slides = max_slides.min(MAX_SLIDES);
        self
    }

    /// Creation time used for the file name and properties.
    #[must_use]
    pub fn with_created(mut self, created: DateTime<Local>) -> Self {
        self.created = created;
        self
    }

    /// Suggested file name for a deck created at the builder's time.
    pub fn file_name(&self) -> String {
        suggested_file_name(&self.created)
    }

    /// Serialize a slide set.
    ///
    /// # Errors
    ///
    /// Returns [`Video2PptError::EmptyDeck`] for an empty set and
    /// [`Video2PptError::Serialization`] if packaging fails.
    pub fn build(&self, slides: &SlideSet) -> Result<Deck, Video2PptError> {
        let images: Vec<&[u8]> = slides.iter().map(|slide| slide.jpeg()).collect();
        self.build_from_images(&images)
    }

    /// Serialize JPEG images, one per slide, in order. Images beyond the
    /// slide cap are left out.
    ///
    /// # Errors
    ///
    /// Same as [`build`](DeckBuilder::build).
    pub fn build_from_images<I: AsRef<[u8]>>(&self, images: &[I]) -> Result<Deck, Video2PptError> {
        if images.is_empty() || self.max_slides == 0 {
            return Err(Video2PptError::EmptyDeck);
        }
        let images = &images[..images.len().min(self.max_slides)];

        let bytes = self
            .package(images)
            .map_err(|error| Video2PptError::Serialization(error.to_string()))?;
        log::debug!("Packaged {} slides into {} bytes", images.len(), bytes.len());

        Ok(Deck {
            bytes,
            file_name: self.file_name(),
            slide_count: images.len(),
        })
    }

    fn package<I: AsRef<[u8]>>(&self, images: &[I]) -> Result<Vec<u8>, Video2PptError> {
        let count = images.len();
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let xml = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        let media = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);

        write_part(&mut zip, "[Content_Types].xml", content_types(count).as_bytes(), xml)?;
        write_part(&mut zip, "_rels/.rels", root_rels().as_bytes(), xml)?;
        write_part(&mut zip, "docProps/app.xml", app_properties(count).as_bytes(), xml)?;
        write_part(
            &mut zip,
            "docProps/core.xml",
            core_properties(&self.title, &self.created.with_timezone(&Utc)).as_bytes(),
            xml,
        )?;
        write_part(&mut zip, "ppt/presentation.xml", presentation(count).as_bytes(), xml)?;
        write_part(
            &mut zip,
            "ppt/_rels/presentation.xml.rels",
            presentation_rels(count).as_bytes(),
            xml,
        )?;
        write_part(&mut zip, "ppt/presProps.xml", presentation_properties().as_bytes(), xml)?;
        write_part(&mut zip, "ppt/tableStyles.xml", table_styles().as_bytes(), xml)?;
        write_part(&mut zip, "ppt/theme/theme1.xml", THEME.as_bytes(), xml)?;
        write_part(
            &mut zip,
            "ppt/slideMasters/slideMaster1.xml",
            slide_master().as_bytes(),
            xml,
        )?;
        write_part(
            &mut zip,
            "ppt/slideMasters/_rels/slideMaster1.xml.rels",
            slide_master_rels().as_bytes(),
            xml,
        )?;
        write_part(
            &mut zip,
            "ppt/slideLayouts/slideLayout1.xml",
            slide_layout().as_bytes(),
            xml,
        )?;
        write_part(
            &mut zip,
            "ppt/slideLayouts/_rels/slideLayout1.xml.rels",
            slide_layout_rels().as_bytes(),
            xml,
        )?;

        for (index, image) in images.iter().enumerate() {
            let number = index + 1;
            write_part(
                &mut zip,
                &format!("ppt/slides/slide{number}.xml"),
                slide(number).as_bytes(),
                xml,
            )?;
            write_part(
                &mut zip,
                &format!("ppt/slides/_rels/slide{number}.xml.rels"),
                slide_rels(number).as_bytes(),
                xml,
            )?;
            write_part(
                &mut zip,
                &format!("ppt/media/image{number}.jpeg"),
                image.as_ref(),
                media,
            )?;
        }

        Ok(zip.finish()?.into_inner())
    }
}

fn write_part(
    zip: &mut ZipWriter<Cursor<Vec<u8>>>,
    name: &str,
    body: &[u8],
    options: SimpleFileOptions,
) -> Result<(), Video2PptError> {
    zip.start_file(name, options)?;
    zip.write_all(body)?;
    Ok(())
}

/// `Video2PPT_YYYY-MM-DD_HHMM.pptx` for the given local time.
///
/// ```
/// use chrono::{Local, TimeZone};
/// use video2ppt::suggested_file_name;
///
/// let at = Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 0).unwrap();
/// assert_eq!(suggested_file_name(&at), "Video2PPT_2024-03-09_1405.pptx");
/// ```
pub fn suggested_file_name(at: &DateTime<Local>) -> String {
    format!("Video2PPT_{}.pptx", at.format("%Y-%m-%d_%H%M"))
}

/// Read the slide images of a deck back, in slide order.
///
/// Only understands decks laid out the way [`DeckBuilder`] writes them.
///
/// # Errors
///
/// Returns [`Video2PptError::ZipError`] if the bytes are not a readable
/// package, and [`Video2PptError::Serialization`] if a slide's image is
/// missing.
pub fn read_deck_images(bytes: &[u8]) -> Result<Vec<Vec<u8>>, Video2PptError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    let slide_count = archive
        .file_names()
        .filter(|name| {
            name.strip_prefix("ppt/slides/slide")
                .and_then(|rest| rest.strip_suffix(".xml"))
                .is_some_and(|number| number.parse::<usize>().is_ok())
        })
        .count();

    let mut images = Vec::with_capacity(slide_count);
    for number in 1..=slide_count {
        let name = format!("ppt/media/image{number}.jpeg");
        let mut entry = archive.by_name(&name).map_err(|error| {
            Video2PptError::Serialization(format!("slide {number} has no image ({error})"))
        })?;
        let mut image = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut image)?;
        images.push(image);
    }
    Ok(images)
}

fn escape_xml(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for character in text.chars() {
        match character {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(character),
        }
    }
    escaped
}

fn content_types(count: usize) -> String {
    let mut xml = format!(
        "{XML_HEADER}<Types xmlns=\"http://schemas.openxmlformats.org/package/2006/content-types\">\
<Default Extension=\"rels\" ContentType=\"application/vnd.openxmlformats-package.relationships+xml\"/>\
<Default Extension=\"xml\" ContentType=\"application/xml\"/>\
<Default Extension=\"jpeg\" ContentType=\"image/jpeg\"/>\
<Override PartName=\"/ppt/presentation.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.presentationml.presentation.main+xml\"/>\
<Override PartName=\"/ppt/slideMasters/slideMaster1.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.presentationml.slideMaster+xml\"/>\
<Override PartName=\"/ppt/slideLayouts/slideLayout1.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.presentationml.slideLayout+xml\"/>\
<Override PartName=\"/ppt/theme/theme1.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.theme+xml\"/>\
<Override PartName=\"/ppt/presProps.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.presentationml.presProps+xml\"/>\
<Override PartName=\"/ppt/tableStyles.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.presentationml.tableStyles+xml\"/>\
<Override PartName=\"/docProps/core.xml\" ContentType=\"application/vnd.openxmlformats-package.core-properties+xml\"/>\
<Override PartName=\"/docProps/app.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.extended-properties+xml\"/>"
    );
    for number in 1..=count {
        let _ = write!(
            xml,
            "<Override PartName=\"/ppt/slides/slide{number}.xml\" \
ContentType=\"application/vnd.openxmlformats-officedocument.presentationml.slide+xml\"/>"
        );
    }
    xml.push_str("</Types>");
    xml
}

fn root_rels() -> String {
    format!(
        "{XML_HEADER}<Relationships xmlns=\"{NS_RELS}\">\
<Relationship Id=\"rId1\" Type=\"{REL}/officeDocument\" Target=\"ppt/presentation.xml\"/>\
<Relationship Id=\"rId2\" Type=\"http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties\" Target=\"docProps/core.xml\"/>\
<Relationship Id=\"rId3\" Type=\"{REL}/extended-properties\" Target=\"docProps/app.xml\"/>\
</Relationships>"
    )
}

fn app_properties(count: usize) -> String {
    format!(
        "{XML_HEADER}<Properties xmlns=\"http://schemas.openxmlformats.org/officeDocument/2006/extended-properties\">\
<Application>Video2PPT</Application><Slides>{count}</Slides></Properties>"
    )
}

fn core_properties(title: &str, created: &DateTime<Utc>) -> String {
    let stamp = created.format("%Y-%m-%dT%H:%M:%SZ");
    format!(
        "{XML_HEADER}<cp:coreProperties \
xmlns:cp=\"http://schemas.openxmlformats.org/package/2006/metadata/core-properties\" \
xmlns:dc=\"http://purl.org/dc/elements/1.1/\" xmlns:dcterms=\"http://purl.org/dc/terms/\" \
xmlns:dcmitype=\"http://purl.org/dc/dcmitype/\" xmlns:xsi=\"http://www.w3.org/2001/XMLSchema-instance\">\
<dc:title>{}</dc:title><dc:creator>Video2PPT</dc:creator>\
<dcterms:created xsi:type=\"dcterms:W3CDTF\">{stamp}</dcterms:created>\
<dcterms:modified xsi:type=\"dcterms:W3CDTF\">{stamp}</dcterms:modified>\
</cp:coreProperties>",
        escape_xml(title)
    )
}

fn presentation(count: usize) -> String {
    let mut slide_ids = String::new();
    for index in 0..count {
        let _ = write!(
            slide_ids,
            "<p:sldId id=\"{}\" r:id=\"rId{}\"/>",
            256 + index,
            FIXED_PRESENTATION_RELS + 1 + index
        );
    }
    format!(
        "{XML_HEADER}<p:presentation xmlns:a=\"{NS_A}\" xmlns:r=\"{NS_R}\" xmlns:p=\"{NS_P}\" saveSubsetFonts=\"1\">\
<p:sldMasterIdLst><p:sldMasterId id=\"2147483648\" r:id=\"rId1\"/></p:sldMasterIdLst>\
<p:sldIdLst>{slide_ids}</p:sldIdLst>\
<p:sldSz cx=\"{SLIDE_WIDTH_EMU}\" cy=\"{SLIDE_HEIGHT_EMU}\"/>\
<p:notesSz cx=\"6858000\" cy=\"9144000\"/>\
</p:presentation>"
    )
}

fn presentation_rels(count: usize) -> String {
    let mut xml = format!(
        "{XML_HEADER}<Relationships xmlns=\"{NS_RELS}\">\
<Relationship Id=\"rId1\" Type=\"{REL}/slideMaster\" Target=\"slideMasters/slideMaster1.xml\"/>\
<Relationship Id=\"rId2\" Type=\"{REL}/presProps\" Target=\"presProps.xml\"/>\
<Relationship Id=\"rId3\" Type=\"{REL}/theme\" Target=\"theme/theme1.xml\"/>\
<Relationship Id=\"rId4\" Type=\"{REL}/tableStyles\" Target=\"tableStyles.xml\"/>"
    );
    for index in 0..count {
        let _ = write!(
            xml,
            "<Relationship Id=\"rId{}\" Type=\"{REL}/slide\" Target=\"slides/slide{}.xml\"/>",
            FIXED_PRESENTATION_RELS + 1 + index,
            index + 1
        );
    }
    xml.push_str("</Relationships>");
    xml
}

fn presentation_properties() -> String {
    format!("{XML_HEADER}<p:presentationPr xmlns:a=\"{NS_A}\" xmlns:r=\"{NS_R}\" xmlns:p=\"{NS_P}\"/>")
}

fn table_styles() -> String {
    format!(
        "{XML_HEADER}<a:tblStyleLst xmlns:a=\"{NS_A}\" def=\"{{5C22544A-7EE6-4342-B048-85BDC9FD1C3A}}\"/>"
    )
}

fn empty_shape_tree() -> &'static str {
    "<p:nvGrpSpPr><p:cNvPr id=\"1\" name=\"\"/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr>\
<p:grpSpPr><a:xfrm><a:off x=\"0\" y=\"0\"/><a:ext cx=\"0\" cy=\"0\"/>\
<a:chOff x=\"0\" y=\"0\"/><a:chExt cx=\"0\" cy=\"0\"/></a:xfrm></p:grpSpPr>"
}

fn slide_master() -> String {
    format!(
        "{XML_HEADER}<p:sldMaster xmlns:a=\"{NS_A}\" xmlns:r=\"{NS_R}\" xmlns:p=\"{NS_P}\">\
<p:cSld><p:bg><p:bgRef idx=\"1001\"><a:schemeClr val=\"bg1\"/></p:bgRef></p:bg>\
<p:spTree>{}</p:spTree></p:cSld>\
<p:clrMap bg1=\"lt1\" tx1=\"dk1\" bg2=\"lt2\" tx2=\"dk2\" accent1=\"accent1\" accent2=\"accent2\" \
accent3=\"accent3\" accent4=\"accent4\" accent5=\"accent5\" accent6=\"accent6\" hlink=\"hlink\" folHlink=\"folHlink\"/>\
<p:sldLayoutIdLst><p:sldLayoutId id=\"2147483649\" r:id=\"rId1\"/></p:sldLayoutIdLst>\
<p:txStyles><p:titleStyle/><p:bodyStyle/><p:otherStyle/></p:txStyles>\
</p:sldMaster>",
        empty_shape_tree()
    )
}

fn slide_master_rels() -> String {
    format!(
        "{XML_HEADER}<Relationships xmlns=\"{NS_RELS}\">\
<Relationship Id=\"rId1\" Type=\"{REL}/slideLayout\" Target=\"../slideLayouts/slideLayout1.xml\"/>\
<Relationship Id=\"rId2\" Type=\"{REL}/theme\" Target=\"../theme/theme1.xml\"/>\
</Relationships>"
    )
}

fn slide_layout() -> String {
    format!(
        "{XML_HEADER}<p:sldLayout xmlns:a=\"{NS_A}\" xmlns:r=\"{NS_R}\" xmlns:p=\"{NS_P}\" type=\"blank\" preserve=\"1\">\
<p:cSld name=\"Blank\"><p:spTree>{}</p:spTree></p:cSld>\
<p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr></p:sldLayout>",
        empty_shape_tree()
    )
}

fn slide_layout_rels() -> String {
    format!(
        "{XML_HEADER}<Relationships xmlns=\"{NS_RELS}\">\
<Relationship Id=\"rId1\" Type=\"{REL}/slideMaster\" Target=\"../slideMasters/slideMaster1.xml\"/>\
</Relationships>"
    )
}

fn slide(number: usize) -> String {
    format!(
        "{XML_HEADER}<p:sld xmlns:a=\"{NS_A}\" xmlns:r=\"{NS_R}\" xmlns:p=\"{NS_P}\">\
<p:cSld><p:spTree>{}\
<p:pic><p:nvPicPr><p:cNvPr id=\"2\" name=\"Slide image {number}\"/>\
<p:cNvPicPr><a:picLocks noChangeAspect=\"1\"/></p:cNvPicPr><p:nvPr/></p:nvPicPr>\
<p:blipFill><a:blip r:embed=\"rId2\"/><a:stretch><a:fillRect/></a:stretch></p:blipFill>\
<p:spPr><a:xfrm><a:off x=\"0\" y=\"0\"/><a:ext cx=\"{SLIDE_WIDTH_EMU}\" cy=\"{SLIDE_HEIGHT_EMU}\"/></a:xfrm>\
<a:prstGeom prst=\"rect\"><a:avLst/></a:prstGeom></p:spPr></p:pic>\
</p:spTree></p:cSld><p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr></p:sld>",
        empty_shape_tree()
    )
}

fn slide_rels(number: usize) -> String {
    format!(
        "{XML_HEADER}<Relationships xmlns=\"{NS_RELS}\">\
<Relationship Id=\"rId1\" Type=\"{REL}/slideLayout\" Target=\"../slideLayouts/slideLayout1.xml\"/>\
<Relationship Id=\"rId2\" Type=\"{REL}/image\" Target=\"../media/image{number}.jpeg\"/>\
</Relationships>"
    )
}

const THEME: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<a:theme xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" name="Video2PPT">
<a:themeElements>
<a:clrScheme name="Office">
<a:dk1><a:sysClr val="windowText" lastClr="000000"/></a:dk1>
<a:lt1><a:sysClr val="window" lastClr="FFFFFF"/></a:lt1>
<a:dk2><a:srgbClr val="44546A"/></a:dk2>
<a:lt2><a:srgbClr val="E7E6E6"/></a:lt2>
<a:accent1><a:srgbClr val="4472C4"/></a:accent1>
<a:accent2><a:srgbClr val="ED7D31"/></a:accent2>
<a:accent3><a:srgbClr val="A5A5A5"/></a:accent3>
<a:accent4><a:srgbClr val="FFC000"/></a:accent4>
<a:accent5><a:srgbClr val="5B9BD5"/></a:accent5>
<a:accent6><a:srgbClr val="70AD47"/></a:accent6>
<a:hlink><a:srgbClr val="0563C1"/></a:hlink>
<a:folHlink><a:srgbClr val="954F72"/></a:folHlink>
</a:clrScheme>
<a:fontScheme name="Office">
<a:majorFont><a:latin typeface="Calibri Light"/><a:ea typeface=""/><a:cs typeface=""/></a:majorFont>
<a:minorFont><a:latin typeface="Calibri"/><a:ea typeface=""/><a:cs typeface=""/></a:minorFont>
</a:fontScheme>
<a:fmtScheme name="Office">
<a:fillStyleLst>
<a:solidFill><a:schemeClr val="phClr"/></a:solidFill>
<a:solidFill><a:schemeClr val="phClr"/></a:solidFill>
<a:solidFill><a:schemeClr val="phClr"/></a:solidFill>
</a:fillStyleLst>
<a:lnStyleLst>
<a:ln w="6350"><a:solidFill><a:schemeClr val="phClr"/></a:solidFill></a:ln>
<a:ln w="12700"><a:solidFill><a:schemeClr val="phClr"/></a:solidFill></a:ln>
<a:ln w="19050"><a:solidFill><a:schemeClr val="phClr"/></a:solidFill></a:ln>
</a:lnStyleLst>
<a:effectStyleLst>
<a:effectStyle><a:effectLst/></a:effectStyle>
<a:effectStyle><a:effectLst/></a:effectStyle>
<a:effectStyle><a:effectLst/></a:effectStyle>
</a:effectStyleLst>
<a:bgFillStyleLst>
<a:solidFill><a:schemeClr val="phClr"/></a:solidFill>
<a:solidFill><a:schemeClr val="phClr"/></a:solidFill>
<a:solidFill><a:schemeClr val="phClr"/></a:solidFill>
</a:bgFillStyleLst>
</a:fmtScheme>
</a:themeElements>
</a:theme>"#;
