// THEORY:
// The `batch` module drives the pipeline over a directory. It owns everything that is
// about files rather than pixels: which files are intensity images, where their masks
// are, where the results go, and what to do when one image cannot be analyzed.
//
// Key principles:
// 1.  **Sequential Units of Work**: one image/mask pair is analyzed and written
//     completely before the next is touched. Nothing is shared between images
//     except the compiled output tables.
// 2.  **Skip, Don't Abort**: a missing mask or an unreadable image is logged and
//     counted; the rest of the batch still runs. A skipped image leaves no
//     partial outputs behind.
// 3.  **Deterministic Order**: files are processed in natural order (`img2` before
//     `img10`), so compiled tables are stable across runs.

use crate::core_modules::raster;
use crate::core_modules::segmentation::Segmenter;
use crate::core_modules::table::Table;
use crate::error::{AnalysisError, Result};
use crate::pipeline::{AnalysisPipeline, ImageAnalysis};
use std::cmp::Ordering;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const COMPILED_FA_TABLE: &str = "fa_data.csv";
pub const COMPILED_IMAGE_TABLE: &str = "image_data.csv";

/// An intensity image paired with its mask.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePair {
    pub basename: String,
    pub image_path: PathBuf,
    pub mask_path: PathBuf,
}

/// What happened during a batch run.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub analyzed: Vec<String>,
    /// (file name, reason) for every image that was not analyzed.
    pub skipped: Vec<(String, String)>,
    pub fa_table: Table,
    pub image_table: Table,
}

#[derive(Debug, PartialEq, Eq)]
enum NaturalChunk {
    Number(u128),
    Text(String),
}

fn natural_key(name: &str) -> Vec<NaturalChunk> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut in_digits = false;

    let flush = |current: &mut String, in_digits: bool, chunks: &mut Vec<NaturalChunk>| {
        if current.is_empty() {
            return;
        }
        let chunk = if in_digits {
            current
                .parse::<u128>()
                .map(NaturalChunk::Number)
                .unwrap_or_else(|_| NaturalChunk::Text(current.clone()))
        } else {
            NaturalChunk::Text(current.to_lowercase())
        };
        chunks.push(chunk);
        current.clear();
    };

    for c in name.chars() {
        let is_digit = c.is_ascii_digit();
        if is_digit != in_digits {
            flush(&mut current, in_digits, &mut chunks);
            in_digits = is_digit;
        }
        current.push(c);
    }
    flush(&mut current, in_digits, &mut chunks);
    chunks
}

/// Orders names so that embedded numbers compare by value and text ignores case.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let (ka, kb) = (natural_key(a), natural_key(b));
    for (ca, cb) in ka.iter().zip(kb.iter()) {
        let ord = match (ca, cb) {
            (NaturalChunk::Number(x), NaturalChunk::Number(y)) => x.cmp(y),
            (NaturalChunk::Text(x), NaturalChunk::Text(y)) => x.cmp(y),
            (NaturalChunk::Number(_), NaturalChunk::Text(_)) => Ordering::Less,
            (NaturalChunk::Text(_), NaturalChunk::Number(_)) => Ordering::Greater,
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    ka.len().cmp(&kb.len()).then_with(|| a.cmp(b))
}

/// Lists intensity images in `dir` (files ending with `file_ending` whose name does not
/// contain `mask_suffix`) in natural order.
pub fn list_images(dir: &Path, file_ending: &str, mask_suffix: &str) -> Result<Vec<String>> {
    let entries = fs::read_dir(dir).map_err(|e| AnalysisError::io(dir, e))?;
    let mut names: Vec<String> = entries
        .filter_map(|entry| {
            let entry = entry.ok()?;
            if !entry.file_type().ok()?.is_file() {
                return None;
            }
            entry.file_name().to_str().map(String::from)
        })
        .filter(|name| name.ends_with(file_ending) && !name.contains(mask_suffix))
        .collect();
    names.sort_by(|a, b| natural_cmp(a, b));
    Ok(names)
}

/// Resolves the mask of `<name><ending>` as `<name><suffix><ending>`.
pub fn pair_with_mask(dir: &Path, file_name: &str, file_ending: &str, mask_suffix: &str) -> Option<ImagePair> {
    let basename = file_name.strip_suffix(file_ending)?;
    let mask_path = dir.join(format!("{basename}{mask_suffix}{file_ending}"));
    mask_path.is_file().then(|| ImagePair {
        basename: basename.to_string(),
        image_path: dir.join(file_name),
        mask_path,
    })
}

/// Writes the label raster and the two per-image tables into `<dir>/<basename>/`.
/// If any write fails, the files already written for this image are removed so a
/// skipped image leaves no partial outputs behind.
pub fn write_image_outputs(dir: &Path, basename: &str, analysis: &ImageAnalysis) -> Result<(Table, Table)> {
    let out_dir = dir.join(basename);
    fs::create_dir_all(&out_dir).map_err(|e| AnalysisError::io(&out_dir, e))?;

    let mut written = Vec::with_capacity(3);
    let result = write_outputs(&out_dir, basename, analysis, &mut written);
    if result.is_err() {
        remove_partial_outputs(&written);
    }
    result
}

fn write_outputs(
    out_dir: &Path,
    basename: &str,
    analysis: &ImageAnalysis,
    written: &mut Vec<PathBuf>,
) -> Result<(Table, Table)> {
    let labels_path = out_dir.join(format!("{basename}_fa_labels.tif"));
    raster::save_labels(&analysis.labels, &labels_path)?;
    written.push(labels_path);

    let mut fa_table = Table::adhesions();
    fa_table.push_adhesions(basename, &analysis.adhesions);
    let fa_path = out_dir.join(format!("{basename}_fa_data.csv"));
    fa_table.write_csv(&fa_path)?;
    written.push(fa_path);

    let mut image_table = Table::images();
    image_table.push_summary(&analysis.summary);
    let image_path = out_dir.join(format!("{basename}_image_data.csv"));
    image_table.write_csv(&image_path)?;
    written.push(image_path);

    Ok((fa_table, image_table))
}

fn remove_partial_outputs(written: &[PathBuf]) {
    for path in written {
        if let Err(e) = fs::remove_file(path) {
            warn!(path = %path.display(), error = %e, "could not remove partial output");
        }
    }
}

fn analyze_pair<S: Segmenter>(pipeline: &AnalysisPipeline<S>, dir: &Path, pair: &ImagePair) -> Result<(Table, Table)> {
    let intensity = raster::load_intensity(&pair.image_path)?;
    let mask = raster::load_mask(&pair.mask_path)?;
    let analysis = pipeline.analyze(&pair.basename, &intensity, &mask)?;
    write_image_outputs(dir, &pair.basename, &analysis)
}

/// Analyzes every image in `dir` and writes per-image and compiled outputs.
pub fn analyze_directory<S: Segmenter>(pipeline: &AnalysisPipeline<S>, dir: &Path) -> Result<BatchReport> {
    let config = pipeline.config();
    info!(dir = %dir.display(), "analyzing directory");

    let mut report = BatchReport {
        fa_table: Table::adhesions(),
        image_table: Table::images(),
        ..BatchReport::default()
    };

    for file_name in list_images(dir, &config.file_ending, &config.mask_suffix)? {
        let Some(pair) = pair_with_mask(dir, &file_name, &config.file_ending, &config.mask_suffix) else {
            warn!(file = %file_name, "no mask found, skipping");
            report.skipped.push((file_name, "missing mask".to_string()));
            continue;
        };

        info!(image = %pair.image_path.display(), "analyzing image");
        match analyze_pair(pipeline, dir, &pair) {
            Ok((fa_table, image_table)) => {
                report.fa_table.append(&fa_table)?;
                report.image_table.append(&image_table)?;
                report.analyzed.push(pair.basename);
            }
            Err(e) => {
                warn!(file = %file_name, error = %e, "analysis failed, skipping");
                report.skipped.push((file_name, e.to_string()));
            }
        }
    }

    info!("saving compiled data");
    report.fa_table.write_csv(&dir.join(COMPILED_FA_TABLE))?;
    report.image_table.write_csv(&dir.join(COMPILED_IMAGE_TABLE))?;
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::PipelineConfig;
    use image::{GrayImage, ImageBuffer, Luma};

    fn write_cell(dir: &Path, basename: &str) {
        let mut image = GrayImage::from_pixel(60, 60, Luma([15]));
        for y in 20..28 {
            for x in 36..46 {
                image.put_pixel(x, y, Luma([230]));
            }
        }
        for y in 40..46 {
            for x in 14..22 {
                image.put_pixel(x, y, Luma([230]));
            }
        }
        let mask = GrayImage::from_fn(60, 60, |x, y| {
            Luma([if (5..55).contains(&x) && (5..55).contains(&y) { 255 } else { 0 }])
        });
        image.save(dir.join(format!("{basename}.tif"))).unwrap();
        mask.save(dir.join(format!("{basename}_mask.tif"))).unwrap();
    }

    #[test]
    fn natural_order_compares_numbers_by_value() {
        let mut names = vec!["img10.tif", "Img2.tif", "img1.tif", "img2b.tif"];
        names.sort_by(|a, b| natural_cmp(a, b));
        assert_eq!(names, vec!["img1.tif", "Img2.tif", "img2b.tif", "img10.tif"]);
    }

    #[test]
    fn listing_skips_masks_and_other_extensions() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["c10.tif", "c2.tif", "c2_mask.tif", "notes.txt"] {
            fs::write(dir.path().join(name), b"").unwrap();
        }
        fs::create_dir(dir.path().join("c3.tif")).unwrap();
        let names = list_images(dir.path(), ".tif", "_mask").unwrap();
        assert_eq!(names, vec!["c2.tif", "c10.tif"]);
    }

    #[test]
    fn pairing_requires_an_existing_mask() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.tif"), b"").unwrap();
        fs::write(dir.path().join("a_mask.tif"), b"").unwrap();
        fs::write(dir.path().join("b.tif"), b"").unwrap();

        let pair = pair_with_mask(dir.path(), "a.tif", ".tif", "_mask").unwrap();
        assert_eq!(pair.basename, "a");
        assert_eq!(pair.mask_path, dir.path().join("a_mask.tif"));
        assert!(pair_with_mask(dir.path(), "b.tif", ".tif", "_mask").is_none());
    }

    #[test]
    fn batch_skips_missing_masks_and_compiles_the_rest() {
        let dir = tempfile::tempdir().unwrap();
        write_cell(dir.path(), "cell1");
        write_cell(dir.path(), "cell2");
        GrayImage::new(60, 60).save(dir.path().join("orphan.tif")).unwrap();

        let pipeline = AnalysisPipeline::new(PipelineConfig::default()).unwrap();
        let report = analyze_directory(&pipeline, dir.path()).unwrap();

        assert_eq!(report.analyzed, vec!["cell1", "cell2"]);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].0, "orphan.tif");
        assert_eq!(report.image_table.rows.len(), 2);
        assert_eq!(report.fa_table.rows.len(), 4);

        for name in ["cell1/cell1_fa_labels.tif", "cell1/cell1_fa_data.csv", "cell2/cell2_image_data.csv"] {
            assert!(dir.path().join(name).is_file(), "{name} missing");
        }
        let compiled = fs::read_to_string(dir.path().join(COMPILED_IMAGE_TABLE)).unwrap();
        assert_eq!(compiled.lines().count(), 3);
        assert!(compiled.lines().nth(1).unwrap().starts_with("cell1,2500,2,"));
    }

    fn write_deep_cell(dir: &Path, basename: &str) {
        // 12-bit style data: dim spots a little above the background, mask holds 0/1.
        let mut image: ImageBuffer<Luma<u16>, Vec<u16>> = ImageBuffer::from_pixel(60, 60, Luma([800]));
        for y in 20..28 {
            for x in 36..46 {
                image.put_pixel(x, y, Luma([1000]));
            }
        }
        for y in 40..46 {
            for x in 14..22 {
                image.put_pixel(x, y, Luma([1000]));
            }
        }
        let mask: ImageBuffer<Luma<u16>, Vec<u16>> = ImageBuffer::from_fn(60, 60, |x, y| {
            Luma([if (5..55).contains(&x) && (5..55).contains(&y) { 1 } else { 0 }])
        });
        image.save(dir.join(format!("{basename}.tif"))).unwrap();
        mask.save(dir.join(format!("{basename}_mask.tif"))).unwrap();
    }

    #[test]
    fn sixteen_bit_pairs_keep_mask_and_dim_spots() {
        let dir = tempfile::tempdir().unwrap();
        write_deep_cell(dir.path(), "deep");

        let pipeline = AnalysisPipeline::new(PipelineConfig::default()).unwrap();
        let report = analyze_directory(&pipeline, dir.path()).unwrap();

        assert_eq!(report.analyzed, vec!["deep"]);
        assert_eq!(report.fa_table.rows.len(), 2);
        assert_eq!(&report.image_table.rows[0][..3], &["deep", "2500", "2"]);
    }

    #[test]
    fn failed_writes_leave_no_partial_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = AnalysisPipeline::new(PipelineConfig::default()).unwrap();
        let mask = GrayImage::from_pixel(20, 20, Luma([255]));
        let analysis = pipeline.analyze("cell", &GrayImage::new(20, 20), &mask).unwrap();

        // A directory where the per-object CSV should go makes that write fail.
        let out_dir = dir.path().join("cell");
        fs::create_dir_all(out_dir.join("cell_fa_data.csv")).unwrap();

        assert!(write_image_outputs(dir.path(), "cell", &analysis).is_err());
        assert!(!out_dir.join("cell_fa_labels.tif").exists());
        assert!(!out_dir.join("cell_image_data.csv").exists());
    }

    #[test]
    fn unreadable_images_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("broken.tif"), b"not a tiff").unwrap();
        fs::write(dir.path().join("broken_mask.tif"), b"not a tiff").unwrap();
        let pipeline = AnalysisPipeline::new(PipelineConfig::default()).unwrap();
        let report = analyze_directory(&pipeline, dir.path()).unwrap();
        assert!(report.analyzed.is_empty());
        assert_eq!(report.skipped.len(), 1);
        assert!(dir.path().join(COMPILED_FA_TABLE).is_file());
    }
}
