use tracing::{debug, instrument};

use crate::config::FitConfig;
use crate::error::{AtlasFitError, Result};
use crate::fitter::{FitData, Fitter, SharedBest};
use crate::model::{FitArea, FitReport, OutImage};

#[instrument(skip_all)]
/// Fits every area into a set of output images whose summed size is as
/// small as the call budget allows, preferring fewer images at equal size.
///
/// On success the placements are written into `areas` (re-sorted by
/// `(out_image, out_x, out_y)`) and `out_images` is rewritten with the best
/// fit's images. Preseeded entries in `out_images` fix those images'
/// dimensions; the list is extended with zero-sized images up to
/// `cfg.min_image_count`.
///
/// Returns [`AtlasFitError::NoFit`] when the search finishes (or runs out of
/// budget) without one complete placement; `out_images` is cleared in that
/// case and `areas` keeps only its sizes.
///
/// Notes:
/// - Sorting is stable for deterministic results with `workers = 1`.
/// - `cfg.max_image_size` is raised to the largest single area, so one
///   oversized area lands alone in its own image instead of failing.
pub fn fit_areas<K>(
    areas: &mut Vec<FitArea<K>>,
    out_images: &mut Vec<OutImage>,
    cfg: &FitConfig,
) -> Result<FitReport> {
    cfg.validate()?;
    for (i, area) in areas.iter().enumerate() {
        if area.width < 0 || area.height < 0 {
            return Err(AtlasFitError::InvalidInput(format!(
                "area {} has negative dimensions ({}x{})",
                i, area.width, area.height
            )));
        }
        if (area.width as i64) * (area.height as i64) > i32::MAX as i64 {
            return Err(AtlasFitError::InvalidInput(format!(
                "area {} exceeds the representable size ({}x{})",
                i, area.width, area.height
            )));
        }
    }
    for (i, img) in out_images.iter().enumerate() {
        if img.width < 0 || img.height < 0 {
            return Err(AtlasFitError::InvalidInput(format!(
                "preseeded image {} has negative dimensions ({}x{})",
                i, img.width, img.height
            )));
        }
        if (img.width as i64) * (img.height as i64) > i32::MAX as i64 {
            return Err(AtlasFitError::InvalidInput(format!(
                "preseeded image {} exceeds the representable size ({}x{})",
                i, img.width, img.height
            )));
        }
    }

    if areas.is_empty() {
        out_images.clear();
        return Ok(FitReport {
            fit_quality: 100.0,
            total_out_size: 0,
            image_count: 0,
            calls_used: 0,
            improvements: 0,
        });
    }
    if areas.len() == 1 && out_images.is_empty() {
        let area = &mut areas[0];
        area.out_image = 0;
        area.out_x = 0;
        area.out_y = 0;
        let image = OutImage::new(area.width, area.height);
        out_images.push(image);
        return Ok(FitReport {
            fit_quality: 100.0,
            total_out_size: image.size as i64,
            image_count: 1,
            calls_used: 0,
            improvements: 0,
        });
    }

    // widest first; stable, so equal widths keep the caller's order
    areas.sort_by(|a, b| b.width.cmp(&a.width));

    let mut min_out_size: i64 = 0;
    let mut max_image_size = cfg.max_image_size;
    for area in areas.iter() {
        let size = area.width * area.height;
        if max_image_size < size {
            max_image_size = size;
        }
        min_out_size += size as i64;
    }

    let seed_count = out_images.len().max(cfg.min_image_count as usize);
    let seed_images: Vec<OutImage> = (0..seed_count)
        .map(|i| match out_images.get(i) {
            Some(img) => OutImage::new(img.width, img.height),
            None => OutImage::default(),
        })
        .collect();
    if seed_images.iter().map(|img| img.size as i64).sum::<i64>() > i32::MAX as i64 {
        return Err(AtlasFitError::InvalidInput(
            "preseeded images exceed the representable total size".to_string(),
        ));
    }

    debug!(
        areas = areas.len(),
        seed_images = seed_count,
        budget = cfg.fit_calls_limit,
        workers = cfg.workers,
        "starting fit"
    );

    let dims: Vec<(i32, i32)> = areas.iter().map(|a| (a.width, a.height)).collect();
    let shared = SharedBest::new(cfg.fit_calls_limit);
    let workers = cfg.workers.clamp(1, areas.len());

    let mut fd = FitData::new(
        &seed_images,
        areas.len(),
        cfg.max_image_width,
        cfg.max_image_height,
    );
    if workers == 1 {
        let mut fitter = Fitter::new(
            cfg.max_image_width,
            cfg.max_image_height,
            max_image_size,
            &shared,
            &dims,
            0,
        );
        fitter.run(&mut fd);
    } else {
        std::thread::scope(|scope| {
            for rotation in 1..workers {
                let mut worker_fd = fd.clone();
                let shared = &shared;
                let dims = &dims;
                scope.spawn(move || {
                    let mut fitter = Fitter::new(
                        cfg.max_image_width,
                        cfg.max_image_height,
                        max_image_size,
                        shared,
                        dims,
                        rotation,
                    );
                    fitter.run(&mut worker_fd);
                });
            }
            let mut fitter = Fitter::new(
                cfg.max_image_width,
                cfg.max_image_height,
                max_image_size,
                &shared,
                &dims,
                0,
            );
            fitter.run(&mut fd);
        });
    }

    let (best, calls_left, improvements) = shared.finish();
    match best {
        Some(best) => {
            for (area, placed) in areas.iter_mut().zip(best.fitted.iter()) {
                area.out_image = placed.out_image;
                area.out_x = placed.out_x;
                area.out_y = placed.out_y;
            }
            areas.sort_by(|a, b| {
                (a.out_image, a.out_x, a.out_y).cmp(&(b.out_image, b.out_x, b.out_y))
            });
            *out_images = best.out_images;

            let fit_quality = if best.out_size > 0 {
                100.0 * min_out_size as f64 / best.out_size as f64
            } else {
                100.0
            };
            let report = FitReport {
                fit_quality,
                total_out_size: best.out_size as i64,
                image_count: out_images.len(),
                calls_used: cfg.fit_calls_limit - calls_left,
                improvements,
            };
            debug!(
                quality = report.fit_quality,
                out_size = report.total_out_size,
                images = report.image_count,
                calls = report.calls_used,
                "fit found"
            );
            Ok(report)
        }
        None => {
            out_images.clear();
            Err(AtlasFitError::NoFit {
                budget: cfg.fit_calls_limit,
            })
        }
    }
}
