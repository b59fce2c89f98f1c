use atlas_fit_core::{fit_areas, AtlasFitError, FitArea, FitConfig, OutImage};

#[test]
fn empty_input_is_a_trivial_success() {
    let mut areas: Vec<FitArea<&str>> = Vec::new();
    let mut images = vec![OutImage::new(64, 64)];
    let cfg = FitConfig::builder().max_dimensions(300, 300).build();

    let report = fit_areas(&mut areas, &mut images, &cfg).expect("empty input fits trivially");
    assert!(images.is_empty());
    assert_eq!(report.fit_quality, 100.0);
    assert_eq!(report.total_out_size, 0);
}

#[test]
fn single_area_gets_an_image_of_its_own_size() {
    let mut areas = vec![FitArea::new("only", 50, 30)];
    let mut images = Vec::new();
    let cfg = FitConfig::builder().max_dimensions(300, 300).build();

    let report = fit_areas(&mut areas, &mut images, &cfg).expect("single area fits trivially");
    assert_eq!(images, vec![OutImage::new(50, 30)]);
    assert_eq!(
        (areas[0].out_image, areas[0].out_x, areas[0].out_y),
        (0, 0, 0)
    );
    assert_eq!(report.fit_quality, 100.0);
}

#[test]
fn four_area_example_fits_one_image() {
    let mut areas = vec![
        FitArea::new("a", 50, 30),
        FitArea::new("b", 250, 60),
        FitArea::new("c", 30, 260),
        FitArea::new("d", 80, 80),
    ];
    let mut images = Vec::new();
    let cfg = FitConfig::builder()
        .max_dimensions(300, 300)
        .fit_calls_limit(10_000)
        .build();

    let report = fit_areas(&mut areas, &mut images, &cfg).expect("the demo layout fits");
    assert_eq!(images.len(), 1);
    assert!(report.total_out_size <= 300 * 300);

    // quality is the ideal-to-achieved area ratio
    let ideal: i64 = 50 * 30 + 250 * 60 + 30 * 260 + 80 * 80;
    let expected = 100.0 * ideal as f64 / report.total_out_size as f64;
    assert!((report.fit_quality - expected).abs() < 1e-9);
    assert!(report.fit_quality > 0.0 && report.fit_quality <= 100.0);

    // placements inside the image, pairwise disjoint
    let img = images[0];
    assert_eq!(img.size, img.width * img.height);
    for a in &areas {
        assert_eq!(a.out_image, 0);
        assert!(a.out_x >= 0 && a.out_y >= 0);
        assert!(a.out_x + a.width <= img.width);
        assert!(a.out_y + a.height <= img.height);
    }
    for i in 0..areas.len() {
        for j in i + 1..areas.len() {
            let (a, b) = (&areas[i], &areas[j]);
            let overlap = a.out_x < b.out_x + b.width
                && b.out_x < a.out_x + a.width
                && a.out_y < b.out_y + b.height
                && b.out_y < a.out_y + a.height;
            assert!(!overlap, "{} overlaps {}", a.key, b.key);
        }
    }

    // returned areas come back in (image, x, y) order
    for w in areas.windows(2) {
        assert!(
            (w[0].out_image, w[0].out_x, w[0].out_y) <= (w[1].out_image, w[1].out_x, w[1].out_y)
        );
    }
}

#[test]
fn areas_too_wide_to_share_get_split_across_images() {
    let mut areas = vec![FitArea::new(0, 200, 200), FitArea::new(1, 200, 200)];
    let mut images = Vec::new();
    let cfg = FitConfig::builder()
        .max_dimensions(200, 200)
        .fit_calls_limit(1_000)
        .build();

    let report = fit_areas(&mut areas, &mut images, &cfg).expect("one area per image fits");
    assert_eq!(images.len(), 2);
    for img in &images {
        assert_eq!((img.width, img.height), (200, 200));
    }
    assert_eq!(areas[0].out_image, 0);
    assert_eq!(areas[1].out_image, 1);
    assert_eq!((areas[0].out_x, areas[0].out_y), (0, 0));
    assert_eq!((areas[1].out_x, areas[1].out_y), (0, 0));
    assert_eq!(report.fit_quality, 100.0);
}

#[test]
fn starved_budget_fails_cleanly() {
    let mut areas = vec![FitArea::new(0, 60, 40), FitArea::new(1, 50, 50)];
    let mut images = vec![OutImage::new(128, 128)];
    let cfg = FitConfig::builder()
        .max_dimensions(300, 300)
        .fit_calls_limit(1)
        .build();

    let result = fit_areas(&mut areas, &mut images, &cfg);
    match result {
        Err(AtlasFitError::NoFit { budget }) => {
            assert_eq!(budget, 1);
            assert!(images.is_empty());
        }
        Ok(_) => panic!("one call cannot place two areas"),
        Err(e) => panic!("unexpected error: {e}"),
    }
}

#[test]
fn preseeded_image_keeps_its_dimensions() {
    let mut areas = vec![FitArea::new("icon", 50, 50)];
    let mut images = vec![OutImage::new(100, 100)];
    let cfg = FitConfig::builder().max_dimensions(300, 300).build();

    let report = fit_areas(&mut areas, &mut images, &cfg).expect("fits inside the seed image");
    assert_eq!(images, vec![OutImage::new(100, 100)]);
    assert_eq!(
        (areas[0].out_image, areas[0].out_x, areas[0].out_y),
        (0, 0, 0)
    );
    // the seed image's full size counts against quality
    assert!((report.fit_quality - 25.0).abs() < 1e-9);
}
