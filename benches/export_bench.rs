use base64::Engine as _;
use colorbook::{export, Page, PageStatus};
use criterion::{criterion_group, criterion_main, Criterion};

// A 768x1024 line-art-ish page, roughly what the image service returns at 1K
fn sample_page(i: usize) -> Page {
    let img = image::RgbImage::from_fn(768, 1024, |x, y| {
        if (x / 32 + y / 32) % 7 == 0 {
            image::Rgb([0, 0, 0])
        } else {
            image::Rgb([255, 255, 255])
        }
    });
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut std::io::Cursor::new(&mut buf), image::ImageFormat::Png)
        .expect("encode png");

    Page {
        title: format!("Scene {}", i),
        prompt: String::new(),
        image_url: Some(format!(
            "data:image/png;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(buf)
        )),
        status: PageStatus::Done,
    }
}

fn bench_render_pdf(c: &mut Criterion) {
    let pages: Vec<Page> = (1..=5).map(sample_page).collect();

    c.bench_function("render_pdf_5_pages", |b| {
        b.iter(|| {
            let _ = export::render_pdf("Mia", "Space dinosaurs", &pages).unwrap();
        })
    });
}

fn bench_text_layout(c: &mut Criterion) {
    c.bench_function("centered_x", |b| {
        b.iter(|| export::layout::centered_x("Theme: Underwater castles with friendly sharks", 20.0))
    });
}

criterion_group!(benches, bench_render_pdf, bench_text_layout);
criterion_main!(benches);
