// THEORY:
// `table` is the output layer: it lays the per-object records and per-image rows out
// as CSV. A `Table` is a plain header-plus-rows container so that per-image tables
// can be appended into the compiled tables of a whole batch.

use crate::core_modules::summary::{ImageSummary, Metric};
use crate::error::{AnalysisError, Result};
use crate::pipeline::FocalAdhesion;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

const LINE_END: &str = "\r\n";

/// Per-object table columns, in output order.
pub const FA_COLUMNS: [&str; 12] = [
    "basename",
    "id",
    "fa_area_px",
    "perim_px",
    "x0_px",
    "y0_px",
    "orientation_deg",
    "ar",
    "sf",
    "dist_px",
    "angle_deg",
    "rel_orientation_deg",
];

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

fn format_value(value: Option<f64>) -> String {
    match value {
        Some(v) => v.to_string(),
        None => "NaN".to_string(),
    }
}

impl Table {
    /// An empty per-object table.
    pub fn adhesions() -> Self {
        Self {
            header: FA_COLUMNS.iter().map(|c| c.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    /// An empty per-image table.
    pub fn images() -> Self {
        let mut header: Vec<String> = ["basename", "mask_area_px", "no_fas", "area_fraction", "frac_periph_fas"]
            .iter()
            .map(|c| c.to_string())
            .collect();
        for metric in Metric::ALL {
            header.push(format!("{}_mean", metric.column()));
            header.push(format!("{}_std", metric.column()));
        }
        Self {
            header,
            rows: Vec::new(),
        }
    }

    pub fn push_adhesions(&mut self, basename: &str, adhesions: &[FocalAdhesion]) {
        for fa in adhesions {
            let o = &fa.object;
            let r = &fa.relation;
            self.rows.push(vec![
                basename.to_string(),
                o.id.to_string(),
                o.area_px.to_string(),
                o.perimeter_px.to_string(),
                o.centroid.0.to_string(),
                o.centroid.1.to_string(),
                o.orientation_deg.to_string(),
                o.aspect_ratio.to_string(),
                o.shape_factor.to_string(),
                r.border_distance_px.to_string(),
                r.angle_to_centroid_deg.to_string(),
                r.relative_orientation_deg.to_string(),
            ]);
        }
    }

    pub fn push_summary(&mut self, summary: &ImageSummary) {
        let mut row = vec![
            summary.basename.clone(),
            summary.mask_area_px.to_string(),
            summary.fa_count.to_string(),
            format_value(summary.area_fraction),
            format_value(summary.peripheral_fraction),
        ];
        for metric in Metric::ALL {
            let stats = summary.stats(metric);
            row.push(format_value(stats.mean));
            row.push(format_value(stats.std));
        }
        self.rows.push(row);
    }

    /// Appends the rows of another table with the same columns.
    pub fn append(&mut self, other: &Table) -> Result<()> {
        if self.header != other.header {
            return Err(AnalysisError::ColumnMismatch {
                expected: self.header.join(","),
                found: other.header.join(","),
            });
        }
        self.rows.extend(other.rows.iter().cloned());
        Ok(())
    }

    pub fn to_csv(&self) -> String {
        let mut out = String::new();
        for line in std::iter::once(&self.header).chain(self.rows.iter()) {
            out.push_str(&line.join(","));
            out.push_str(LINE_END);
        }
        out
    }

    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let file = File::create(path).map_err(|e| AnalysisError::io(path, e))?;
        let mut writer = BufWriter::new(file);
        writer
            .write_all(self.to_csv().as_bytes())
            .and_then(|_| writer.flush())
            .map_err(|e| AnalysisError::io(path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::region_props::LabeledObject;
    use crate::core_modules::relations::relations::CellRelation;
    use crate::core_modules::summary::MetricStats;

    fn sample_adhesion() -> FocalAdhesion {
        FocalAdhesion {
            object: LabeledObject {
                id: 3,
                area_px: 12.0,
                perimeter_px: 14.5,
                centroid: (4.5, 7.25),
                orientation_deg: -30.0,
                aspect_ratio: 2.5,
                shape_factor: 14.5 * 14.5 / 12.0,
            },
            relation: CellRelation {
                border_distance_px: 3.0,
                angle_to_centroid_deg: 120.0,
                relative_orientation_deg: 30.0,
            },
        }
    }

    #[test]
    fn adhesion_rows_follow_the_header() {
        let mut table = Table::adhesions();
        table.push_adhesions("cell_01", &[sample_adhesion()]);
        let csv = table.to_csv();
        let lines: Vec<&str> = csv.split("\r\n").collect();
        assert_eq!(
            lines[0],
            "basename,id,fa_area_px,perim_px,x0_px,y0_px,orientation_deg,ar,sf,dist_px,angle_deg,rel_orientation_deg"
        );
        assert!(lines[1].starts_with("cell_01,3,12,14.5,4.5,7.25,-30,2.5,"));
        assert!(lines[1].ends_with(",3,120,30"));
        assert_eq!(lines[2], "");
    }

    #[test]
    fn undefined_summary_values_are_nan() {
        let summary = ImageSummary {
            basename: "empty".to_string(),
            mask_area_px: 0.0,
            fa_count: 0,
            area_fraction: None,
            peripheral_fraction: None,
            stats: vec![MetricStats::default(); Metric::ALL.len()],
        };
        let mut table = Table::images();
        table.push_summary(&summary);
        assert_eq!(table.header.len(), 5 + 2 * Metric::ALL.len());
        assert_eq!(table.rows[0].len(), table.header.len());
        assert_eq!(&table.rows[0][..5], &["empty", "0", "0", "NaN", "NaN"]);
        assert!(table.rows[0][5..].iter().all(|v| v == "NaN"));
        assert_eq!(table.header[5], "fa_area_px_mean");
        assert_eq!(table.header[18], "rel_orientation_deg_std");
    }

    #[test]
    fn append_concatenates_rows() {
        let mut compiled = Table::adhesions();
        let mut single = Table::adhesions();
        single.push_adhesions("a", &[sample_adhesion(), sample_adhesion()]);
        compiled.append(&single).unwrap();
        compiled.append(&single).unwrap();
        assert_eq!(compiled.rows.len(), 4);
    }

    #[test]
    fn append_rejects_a_different_layout() {
        let mut compiled = Table::adhesions();
        let mut images = Table::images();
        images.push_summary(&ImageSummary {
            basename: "a".to_string(),
            mask_area_px: 10.0,
            fa_count: 0,
            area_fraction: Some(0.0),
            peripheral_fraction: None,
            stats: vec![MetricStats::default(); Metric::ALL.len()],
        });
        let err = compiled.append(&images).unwrap_err();
        assert!(matches!(err, AnalysisError::ColumnMismatch { .. }));
        assert!(compiled.rows.is_empty());
    }

    #[test]
    fn write_csv_creates_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fa_data.csv");
        let mut table = Table::adhesions();
        table.push_adhesions("x", &[sample_adhesion()]);
        table.write_csv(&path).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), table.to_csv());
    }
}
