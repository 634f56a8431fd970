use std::sync::Arc;

use anyhow::Result;
use image::{DynamicImage, GenericImageView, Rgb, RgbImage};
use manga_typesetter_rust::layout::{EstimatedMetrics, LayoutConfig, LayoutEngine, TextMetrics};
use manga_typesetter_rust::{
    Compositor, Detector, FillInpainter, PassthroughTranslator, Pipeline, Region, RenderStyle,
    TextBlock,
};

struct FixedDetector;

impl Detector for FixedDetector {
    fn detect(&self, _image: &DynamicImage) -> Result<Vec<TextBlock>> {
        Ok(vec![
            TextBlock::new(Region::horizontal(20, 20, 80, 16), "Look out"),
            TextBlock::new(Region::horizontal(20, 38, 80, 16), "behind you!"),
        ])
    }
}

#[tokio::test]
async fn dry_run_batch_writes_translated_pages() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("chapter01_p03.jpg");
    let mut page = RgbImage::from_pixel(120, 90, Rgb([255, 255, 255]));
    for y in 22..52 {
        for x in 24..96 {
            page.put_pixel(x, y, Rgb([0, 0, 0]));
        }
    }
    page.save(&input).unwrap();

    let metrics: Arc<dyn TextMetrics> = Arc::new(EstimatedMetrics);
    let layout = LayoutEngine::new(LayoutConfig::default(), metrics).unwrap();
    let compositor =
        Compositor::with_database(RenderStyle::default(), usvg::fontdb::Database::new());
    let pipeline = Pipeline::new(
        FixedDetector,
        PassthroughTranslator,
        FillInpainter::new(2),
        layout,
        compositor,
    );

    let out_dir = dir.path().join("output");
    let outcomes = pipeline
        .process_batch(&[input.clone()], &out_dir, 1)
        .await
        .unwrap();
    assert_eq!(outcomes.len(), 1);
    let report = outcomes[0].result.as_ref().unwrap();
    assert_eq!(report.regions, 2);
    assert_eq!(report.groups, 1);
    assert_eq!(report.translated, 1);
    assert_eq!(report.rendered, 1);

    let output = out_dir.join("chapter01_p03_translated.jpg");
    let written = image::open(&output).unwrap();
    assert_eq!(written.dimensions(), (120, 90));
    let json = serde_json::to_value(report).unwrap();
    assert_eq!(json["rendered"], 1);
}
