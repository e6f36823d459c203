use std::sync::{Arc, Mutex};
use std::thread;

use georaster::prelude::*;

const SIZE: usize = 64;

fn uniform_value(image: &RasterImage) -> f32 {
    let first = image.data[0];
    assert!(
        image.data.iter().all(|v| *v == first),
        "level mixes samples of different versions"
    );
    first
}

#[test]
fn writes_racing_readers_never_leave_stale_levels() {
    let registry = RasterRegistry::new(SIZE, SIZE).unwrap();
    let a = registry
        .add_band("A", RasterImage::filled(SIZE, SIZE, 0.0))
        .unwrap();
    registry.add_virtual_band("B", "A + 1").unwrap();
    let c = registry.add_virtual_band("C", "B * 2").unwrap();
    let levels = registry.level_count();

    thread::scope(|s| {
        s.spawn(|| {
            for i in 1..=50 {
                let samples = vec![i as f32; SIZE * SIZE];
                registry
                    .write_pixels(a, PixelRect::of_size(SIZE, SIZE), &samples)
                    .unwrap();
            }
        });
        for t in 0..4 {
            let registry = &registry;
            s.spawn(move || {
                for i in 0..200 {
                    let image = registry.get_image_level(c, (t + i) % levels).unwrap();
                    let value = uniform_value(&image);
                    assert!((2.0..=102.0).contains(&value));
                }
            });
        }
    });

    for level in 0..levels {
        let image = registry.get_image_level(c, level).unwrap();
        assert_eq!(uniform_value(&image), 102.0, "level {level} is stale");
    }
}

#[test]
fn rewriting_many_bands_keeps_every_level_fresh() {
    const BANDS: usize = 16;
    let registry = RasterRegistry::new(8, 8).unwrap();
    let bands: Vec<NodeId> = (0..BANDS)
        .map(|b| {
            registry
                .add_band(&format!("b{b}"), RasterImage::filled(8, 8, 0.0))
                .unwrap()
        })
        .collect();
    let top = registry.level_count() - 1;

    for i in 1..=40 {
        thread::scope(|s| {
            for _ in 0..3 {
                s.spawn(|| {
                    for _ in 0..4 {
                        for b in &bands {
                            for level in (1..=top).rev() {
                                registry.get_image_level(*b, level).unwrap();
                            }
                        }
                    }
                });
            }
            for b in &bands {
                registry
                    .write_pixels(*b, PixelRect::of_size(8, 8), &[i as f32; 64])
                    .unwrap();
            }
        });

        for b in &bands {
            for level in 0..=top {
                let image = registry.get_image_level(*b, level).unwrap();
                assert_eq!(
                    uniform_value(&image),
                    i as f32,
                    "iteration {i}: band {b:?} level {level} is stale"
                );
            }
        }
    }
}

#[test]
fn events_follow_the_dependency_chain() {
    let registry = RasterRegistry::new(8, 8).unwrap();
    let sink = Arc::new(Mutex::new(VecSink::new()));
    registry.add_sink(Arc::clone(&sink));

    let a = registry.add_band("A", RasterImage::new(8, 8)).unwrap();
    let b = registry.add_virtual_band("B", "A * 3").unwrap();
    let m = registry.add_mask("M", MaskSpec::range("B", 1.0, 10.0)).unwrap();
    registry.get_image_level(m, 0).unwrap();
    sink.lock().unwrap().clear();

    registry
        .write_pixels(a, PixelRect::new(2, 2, 2, 1), &[1.0, 4.0])
        .unwrap();
    let invalidated: Vec<(NodeId, usize)> = sink
        .lock()
        .unwrap()
        .as_slice()
        .iter()
        .filter_map(|e| match e {
            RasterEvent::Invalidated {
                id, levels_dropped, ..
            } => Some((*id, *levels_dropped)),
            _ => None,
        })
        .collect();
    assert_eq!(invalidated, vec![(a, 1), (b, 1), (m, 1)]);

    let mask = registry.get_image_level(m, 0).unwrap();
    assert_eq!(mask.get(2, 2), Some(1.0));
    assert_eq!(mask.get(3, 2), Some(0.0));
    assert_eq!(mask.data.iter().sum::<f32>(), 1.0);
}

#[test]
fn statistics_over_a_derived_band() {
    let config = ImageConfig::new().with_tile_size(16, 16);
    let registry = RasterRegistry::with_config(40, 30, config).unwrap();
    registry
        .add_band("x", RasterImage::from_fn(40, 30, |x, _| x as f32))
        .unwrap();
    let scaled = registry.add_virtual_band("scaled", "x * 2.5").unwrap();
    let roi = registry
        .add_mask("roi", MaskSpec::expression("x < 20"))
        .unwrap();

    let mut histogram = HistogramStxOp::new(4, 0.0, 100.0).unwrap();
    let tiles = accumulate_raster(&registry, scaled, 0, None, &mut histogram).unwrap();
    assert_eq!(tiles, 6);
    // 0, 2.5, ..., 97.5: ten columns per bin
    assert_eq!(histogram.bins(), &[300, 300, 300, 300]);

    let mut masked = histogram.empty_like();
    accumulate_raster_parallel(&registry, scaled, 0, Some(roi), &mut masked).unwrap();
    assert_eq!(masked.bins(), &[300, 300, 0, 0]);

    let stx = Stx::compute(&registry, scaled, Some(roi), 8).unwrap();
    assert_eq!(stx.sample_count(), 600);
    assert_eq!((stx.min(), stx.max()), (0.0, 47.5));
    assert!((stx.mean() - 23.75).abs() < 1e-9);
}
