use base64::Engine as _;
use colorbook::{export, Page, PageStatus};
use lopdf::Document;

fn png_uri(w: u32, h: u32) -> String {
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgb8(image::RgbImage::from_pixel(w, h, image::Rgb([255, 255, 255])))
        .write_to(&mut std::io::Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    format!("data:image/png;base64,{}", base64::engine::general_purpose::STANDARD.encode(buf))
}

fn page(title: &str, status: PageStatus, image_url: Option<String>) -> Page {
    Page { title: title.into(), prompt: format!("{} prompt", title), image_url, status }
}

#[test]
fn one_page_per_drawing_plus_cover() {
    let pages = vec![
        page("Barn", PageStatus::Done, Some(png_uri(3, 4))),
        page("Pond", PageStatus::Error, None),
        page("Tractor", PageStatus::Done, Some(png_uri(6, 8))),
        page("Hayride", PageStatus::Pending, None),
        page("Sunset", PageStatus::Generating, None),
    ];

    let pdf = export::render_pdf("Leo", "Farm", &pages).expect("render");
    let doc = Document::load_mem(&pdf).expect("valid pdf");
    assert_eq!(doc.get_pages().len(), 3);
}

#[test]
fn book_without_drawings_is_just_a_cover() {
    let pdf = export::render_pdf("Leo", "Farm", &[]).expect("render");
    let doc = Document::load_mem(&pdf).expect("valid pdf");
    assert_eq!(doc.get_pages().len(), 1);
}

#[test]
fn non_latin_names_still_export() {
    let pages = vec![page("Dragón 🐉", PageStatus::Done, Some(png_uri(3, 4)))];
    let pdf = export::render_pdf("Zoë", "Drachen", &pages).expect("render");
    assert_eq!(Document::load_mem(&pdf).unwrap().get_pages().len(), 2);
}

#[test]
fn save_pdf_uses_book_file_name() {
    let dir = std::env::temp_dir().join(format!("colorbook-export-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();

    let path = export::save_pdf(&dir, "Leo", "Farm", &[page("Barn", PageStatus::Done, Some(png_uri(3, 4)))])
        .expect("save");
    assert_eq!(path.file_name().unwrap(), "Leo_Coloring_Book.pdf");

    let bytes = std::fs::read(&path).unwrap();
    assert_eq!(Document::load_mem(&bytes).unwrap().get_pages().len(), 2);

    let _ = std::fs::remove_dir_all(&dir);
}
