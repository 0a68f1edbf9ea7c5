use keyfall_core::{CardFont, RasterSurface, ScoreCard, ScoreCardError, CARD_SIZE};
use keyfall_ports::render::{Rect, RenderSurface, Rgba};
use pretty_assertions::assert_eq;

fn card(score: i64) -> ScoreCard {
    ScoreCard {
        title: "Piano Memory".to_string(),
        score,
        longest_combo: 7,
        difficulty: "Hard".to_string(),
    }
}

#[test]
fn card_is_a_square_png_with_rounded_corners() {
    let png = card(1_234).encode_png(None).expect("encode");
    assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");

    let decoded = image::load_from_memory(&png).expect("decode").to_rgba8();
    assert_eq!(decoded.dimensions(), (CARD_SIZE, CARD_SIZE));
    assert_eq!(decoded.get_pixel(0, 0).0[3], 0);
    assert_eq!(decoded.get_pixel(CARD_SIZE / 2, 5).0[3], 255);
}

#[test]
fn different_scores_render_differently() {
    let Some(font) = CardFont::locate(None) else {
        eprintln!("no system font installed, skipping");
        return;
    };
    assert_ne!(card(10).render(Some(&font)), card(20).render(Some(&font)));
    assert_eq!(card(10).render(Some(&font)), card(10).render(Some(&font)));
    assert_ne!(card(10).render(Some(&font)), card(10).render(None));
}

#[test]
fn text_width_grows_with_text_and_size() {
    let Some(font) = CardFont::locate(None) else {
        eprintln!("no system font installed, skipping");
        return;
    };
    assert_eq!(font.text_width("", 24.0), 0.0);
    let one = font.text_width("8", 24.0);
    assert!(one > 0.0);
    assert!(font.text_width("88", 24.0) > one);
    assert!((font.text_width("8", 48.0) - one * 2.0).abs() < 0.5);
}

#[test]
fn unreadable_fonts_are_rejected() {
    assert!(matches!(
        CardFont::from_bytes(b"not a font".to_vec()),
        Err(ScoreCardError::Font(_))
    ));
    assert!(matches!(
        CardFont::from_path(std::path::Path::new("/no/such/font.ttf")),
        Err(ScoreCardError::Font(_))
    ));
}

#[test]
fn raster_fills_clip_to_the_buffer() {
    let mut surface = RasterSurface::new(10, 10);
    surface.clear(Rgba::rgb(0, 0, 0));
    surface.fill_rect(Rect::new(-5.0, 8.0, 100.0, 100.0), Rgba::rgb(255, 0, 0));

    assert_eq!(surface.pixel(0, 9), Some(Rgba::rgb(255, 0, 0)));
    assert_eq!(surface.pixel(9, 8), Some(Rgba::rgb(255, 0, 0)));
    assert_eq!(surface.pixel(0, 7), Some(Rgba::rgb(0, 0, 0)));
    assert_eq!(surface.pixel(10, 0), None);
}

#[test]
fn translucent_fills_blend() {
    let mut surface = RasterSurface::new(2, 2);
    surface.clear(Rgba::rgb(0, 0, 0));
    surface.fill_rect(Rect::new(0.0, 0.0, 2.0, 2.0), Rgba::rgba(255, 255, 255, 128));
    let px = surface.pixel(1, 1).expect("in bounds");
    assert!(px.r > 120 && px.r < 136, "{px:?}");
    assert_eq!(px.a, 255);
}

#[test]
fn unsized_raster_reports_no_size() {
    let surface = RasterSurface::new(0, 0);
    assert_eq!(surface.size(), None);
}
