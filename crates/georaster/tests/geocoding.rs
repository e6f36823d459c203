use approx::assert_abs_diff_eq;
use georaster::prelude::*;

const W: usize = 32;
const H: usize = 32;
const LAT0: f64 = 50.0;
const LON0: f64 = 5.0;
const RES: f64 = 0.1;

fn affine() -> AffineGeoCoding {
    AffineGeoCoding::new(GeoTransform::new(LON0, LAT0, RES, -RES), W, H).unwrap()
}

fn tie_point() -> TiePointGeoCoding {
    // tie points on every 4th pixel centre
    let (gw, gh) = (9, 9);
    let at = |i: usize| 0.5 + 4.0 * i as f64;
    let lats = (0..gw * gh)
        .map(|k| (LAT0 - RES * at(k / gw)) as f32)
        .collect();
    let lons = (0..gw * gh)
        .map(|k| (LON0 + RES * at(k % gw)) as f32)
        .collect();
    let lat = TiePointGrid::new(gw, gh, 0.5, 0.5, 4.0, 4.0, lats).unwrap();
    let lon = TiePointGrid::new(gw, gh, 0.5, 0.5, 4.0, 4.0, lons).unwrap();
    TiePointGeoCoding::new(lat, lon, W, H).unwrap()
}

fn pixel() -> PixelGeoCoding {
    let lats = RasterImage::from_fn(W, H, |_, y| (LAT0 - RES * (y as f64 + 0.5)) as f32);
    let lons = RasterImage::from_fn(W, H, |x, _| (LON0 + RES * (x as f64 + 0.5)) as f32);
    PixelGeoCoding::new(lats, lons).unwrap()
}

const PROBES: [(f64, f64); 4] = [(3.3, 4.7), (15.5, 20.2), (28.9, 2.1), (0.6, 31.2)];

#[test]
fn codings_agree_on_a_regular_grid() {
    let affine = affine();
    let tie = tie_point();
    for (x, y) in PROBES {
        let p = PixelPos::new(x, y);
        let expected = affine.pixel_to_geo(&p);
        let interpolated = tie.pixel_to_geo(&p);
        assert_abs_diff_eq!(interpolated.lat, expected.lat, epsilon = 1e-4);
        assert_abs_diff_eq!(interpolated.lon, expected.lon, epsilon = 1e-4);
        assert_eq!(interpolated.datum, Datum::WGS84);
    }
}

#[test]
fn inverse_round_trips_through_the_trait() {
    let codings: Vec<(Box<dyn GeoCoding>, f64)> = vec![
        (Box::new(affine()), 1e-9),
        (Box::new(tie_point()), 1e-2),
    ];
    for (coding, eps) in &codings {
        assert!(coding.can_get_geo_pos() && coding.can_get_pixel_pos());
        for (x, y) in PROBES {
            let p = PixelPos::new(x, y);
            let back = coding.geo_to_pixel(&coding.pixel_to_geo(&p));
            assert!(back.is_valid(), "({x}, {y}) did not resolve");
            assert_abs_diff_eq!(back.x, x, epsilon = *eps);
            assert_abs_diff_eq!(back.y, y, epsilon = *eps);
        }
    }
}

#[test]
fn pixel_search_finds_the_containing_pixel() {
    let affine = affine();
    let coding = pixel();
    for (x, y) in PROBES {
        let geo = affine.pixel_to_geo(&PixelPos::new(x, y));
        let found = coding.geo_to_pixel(&geo);
        assert_eq!(found, PixelPos::new(x.floor() + 0.5, y.floor() + 0.5));
    }
}

#[test]
fn positions_off_the_raster_are_invalid() {
    let far = GeoPos::new(-30.0, 120.0);
    let codings: Vec<Box<dyn GeoCoding>> =
        vec![Box::new(affine()), Box::new(tie_point()), Box::new(pixel())];
    for coding in &codings {
        assert!(!coding.geo_to_pixel(&far).is_valid());
        assert!(!coding.crosses_antimeridian());
    }
    assert!(!affine()
        .pixel_to_geo(&PixelPos::new(-1.0, 3.0))
        .is_valid());
}

#[test]
fn row_times_of_a_ten_day_pass() {
    use chrono::{TimeZone, Utc};

    let start = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
    let end = Utc.with_ymd_and_hms(2020, 1, 11, 0, 0, 0).unwrap();
    let coding = LineTimeCoding::new(TimeSpan::between(start, end).unwrap(), W, 11).unwrap();
    assert_eq!(coding.time_at_row(0.0).unwrap(), start);
    assert_eq!(coding.time_at_row(10.0).unwrap(), end);
    assert_eq!(
        coding.time_at_row(5.0).unwrap(),
        Utc.with_ymd_and_hms(2020, 1, 6, 0, 0, 0).unwrap()
    );
    assert!(matches!(
        coding.time_at_row(11.0),
        Err(Error::OutOfBounds { .. })
    ));
}
