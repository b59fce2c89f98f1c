use atlas_fit_core::{fit_areas, FitArea, FitConfig, OutImage};

fn main() {
    let mut areas = vec![
        FitArea::new("area0", 50, 30),
        FitArea::new("area1", 250, 60),
        FitArea::new("area2", 30, 260),
        FitArea::new("area3", 80, 80),
    ];
    let mut images: Vec<OutImage> = Vec::new();
    let cfg = FitConfig::builder()
        .max_dimensions(300, 300)
        .fit_calls_limit(10_000)
        .build();

    match fit_areas(&mut areas, &mut images, &cfg) {
        Ok(report) => {
            println!("fitting success: {}", report.summary());
            for (i, img) in images.iter().enumerate() {
                println!("image {i}: {}x{}", img.width, img.height);
            }
            for area in &areas {
                println!(
                    "{} w={:3} h={:3} img={} x={:3} y={:3}",
                    area.key, area.width, area.height, area.out_image, area.out_x, area.out_y
                );
            }
        }
        Err(e) => println!("fitting failed: {e}"),
    }
}
