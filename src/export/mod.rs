//! PDF export of a finished coloring book.
//!
//! The document is a cover page followed by one page per drawing. Pages that
//! never got an image (failed or still pending) are left out.

pub mod embed;
pub mod layout;

use crate::{Page, Result};
use embed::RgbPixels;
use layout::{baseline, centered_x, encode_win_ansi, image_box, page_height, page_width, Rgb};
use log::debug;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, StringFormat, Stream};
use std::path::{Path, PathBuf};

const COVER_BACKGROUND: Rgb = Rgb(240, 249, 255);
const COVER_INK: Rgb = Rgb(30, 64, 175);

const FONT_RESOURCE: &str = "F1";
const IMAGE_RESOURCE: &str = "Im1";

/// `<childName>_Coloring_Book.pdf`
pub fn file_name(child_name: &str) -> String {
    format!("{}_Coloring_Book.pdf", child_name)
}

/// Pages that get a page of their own in the book, with their image
pub fn drawn_pages(pages: &[Page]) -> impl Iterator<Item = (&Page, &str)> {
    pages
        .iter()
        .filter_map(|page| page.image_url.as_deref().map(|url| (page, url)))
}

/// Build the book and return the PDF bytes
pub fn render_pdf(child_name: &str, theme: &str, pages: &[Page]) -> Result<Vec<u8>> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });

    let mut kids: Vec<Object> = Vec::new();
    let cover = add_page(&mut doc, pages_id, font_id, cover_operations(child_name, theme), None)?;
    kids.push(cover.into());

    for (page, image_url) in drawn_pages(pages) {
        let pixels = RgbPixels::from_data_uri(image_url)?;
        debug!("embedding '{}' ({}x{})", page.title, pixels.width, pixels.height);
        let image_id = doc.add_object(pixels.to_xobject()?);
        let id = add_page(&mut doc, pages_id, font_id, drawing_operations(&page.title), Some(image_id))?;
        kids.push(id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "MediaBox" => vec![0.0f32.into(), 0.0f32.into(), page_width().into(), page_height().into()],
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    let info_id = doc.add_object(dictionary! {
        "Title" => Object::string_literal(encode_win_ansi(&format!("{}'s Magic Coloring Book", child_name))),
        "Producer" => Object::string_literal(concat!("colorbook ", env!("CARGO_PKG_VERSION"))),
    });
    doc.trailer.set("Root", catalog_id);
    doc.trailer.set("Info", info_id);

    let mut out = Vec::new();
    doc.save_to(&mut out)?;
    Ok(out)
}

/// Render the book into `dir` under [`file_name`] and return the full path
pub fn save_pdf(dir: &Path, child_name: &str, theme: &str, pages: &[Page]) -> Result<PathBuf> {
    let bytes = render_pdf(child_name, theme, pages)?;
    let path = dir.join(file_name(child_name));
    std::fs::write(&path, bytes)?;
    Ok(path)
}

fn add_page(
    doc: &mut Document,
    parent: ObjectId,
    font_id: ObjectId,
    operations: Vec<Operation>,
    image: Option<ObjectId>,
) -> Result<ObjectId> {
    let content = Content { operations };
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));

    let mut resources = dictionary! {
        "Font" => dictionary! { FONT_RESOURCE => font_id },
    };
    if let Some(image_id) = image {
        resources.set("XObject", dictionary! { IMAGE_RESOURCE => image_id });
    }

    Ok(doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => parent,
        "Contents" => content_id,
        "Resources" => resources,
    }))
}

fn cover_operations(child_name: &str, theme: &str) -> Vec<Operation> {
    let [r, g, b] = COVER_BACKGROUND.components();
    let mut ops = vec![
        Operation::new("q", vec![]),
        Operation::new("rg", vec![r.into(), g.into(), b.into()]),
        Operation::new("re", vec![0.0f32.into(), 0.0f32.into(), page_width().into(), page_height().into()]),
        Operation::new("f", vec![]),
        Operation::new("Q", vec![]),
    ];

    ops.extend(centered_text(&format!("{}'s", child_name), 40.0, 60.0, COVER_INK));
    ops.extend(centered_text("Magic Coloring Book", 30.0, 80.0, COVER_INK));
    ops.extend(centered_text(&format!("Theme: {}", theme), 20.0, 100.0, COVER_INK));
    ops
}

fn drawing_operations(title: &str) -> Vec<Operation> {
    let mut ops = centered_text(title, 16.0, 15.0, Rgb::BLACK);

    let b = image_box();
    ops.extend([
        Operation::new("q", vec![]),
        Operation::new(
            "cm",
            vec![b.width.into(), 0.0f32.into(), 0.0f32.into(), b.height.into(), b.x.into(), b.y.into()],
        ),
        Operation::new("Do", vec![Object::Name(IMAGE_RESOURCE.as_bytes().to_vec())]),
        Operation::new("Q", vec![]),
    ]);
    ops
}

// One line of Helvetica text, centred, with its baseline `from_top_mm` below the top edge
fn centered_text(text: &str, size: f32, from_top_mm: f32, color: Rgb) -> Vec<Operation> {
    let [r, g, b] = color.components();
    vec![
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec![Object::Name(FONT_RESOURCE.as_bytes().to_vec()), size.into()]),
        Operation::new("rg", vec![r.into(), g.into(), b.into()]),
        Operation::new("Td", vec![centered_x(text, size).into(), baseline(from_top_mm).into()]),
        Operation::new("Tj", vec![Object::String(encode_win_ansi(text), StringFormat::Literal)]),
        Operation::new("ET", vec![]),
    ]
}
