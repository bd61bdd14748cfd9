// Page slicing for printable scan reports.
//
// A rendered report is a single tall bitmap. It is scaled to the printable
// width of the page and cut into consecutive horizontal bands, one per page.

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ReportError {
    #[error("canvas must be non-empty, got {width}x{height}")]
    EmptyCanvas { width: u32, height: u32 },

    #[error("margins leave no printable area on a {width_mm}x{height_mm} mm page")]
    NoPrintableArea { width_mm: f64, height_mm: f64 },
}

/// Physical page geometry in millimetres.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageLayout {
    pub page_width_mm: f64,
    pub page_height_mm: f64,
    pub margin_mm: f64,
}

impl PageLayout {
    pub fn a4() -> Self {
        Self {
            page_width_mm: 210.0,
            page_height_mm: 297.0,
            margin_mm: 10.0,
        }
    }

    pub fn printable_width_mm(&self) -> f64 {
        self.page_width_mm - 2.0 * self.margin_mm
    }

    pub fn printable_height_mm(&self) -> f64 {
        self.page_height_mm - 2.0 * self.margin_mm
    }
}

impl Default for PageLayout {
    fn default() -> Self {
        Self::a4()
    }
}

/// One page's slice of the source bitmap.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageBand {
    pub page_index: usize,
    pub source_y_px: u32,
    pub source_height_px: u32,
    /// Height the band occupies on the page once scaled.
    pub dest_height_mm: f64,
}

/// Slice a `canvas_width_px` x `canvas_height_px` bitmap into page bands.
///
/// Bands are contiguous, non-overlapping and cover every source row; only
/// the last one may be shorter than a full page.
pub fn paginate(
    canvas_width_px: u32,
    canvas_height_px: u32,
    layout: &PageLayout,
) -> Result<Vec<PageBand>, ReportError> {
    if canvas_width_px == 0 || canvas_height_px == 0 {
        return Err(ReportError::EmptyCanvas {
            width: canvas_width_px,
            height: canvas_height_px,
        });
    }

    let printable_w = layout.printable_width_mm();
    let printable_h = layout.printable_height_mm();
    if printable_w <= 0.0 || printable_h <= 0.0 {
        return Err(ReportError::NoPrintableArea {
            width_mm: layout.page_width_mm,
            height_mm: layout.page_height_mm,
        });
    }

    let width_px = f64::from(canvas_width_px);
    // At least one row per page so a very wide canvas still advances.
    let page_px = ((printable_h * width_px / printable_w).floor() as u32).max(1);

    let mut bands = Vec::new();
    let mut y = 0u32;
    while y < canvas_height_px {
        let height = page_px.min(canvas_height_px - y);
        bands.push(PageBand {
            page_index: bands.len(),
            source_y_px: y,
            source_height_px: height,
            dest_height_mm: f64::from(height) * printable_w / width_px,
        });
        y += height;
    }

    Ok(bands)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_canvas_fits_one_page() {
        let bands = paginate(1900, 800, &PageLayout::a4()).unwrap();
        assert_eq!(bands.len(), 1);
        assert_eq!(bands[0].source_y_px, 0);
        assert_eq!(bands[0].source_height_px, 800);
        assert!((bands[0].dest_height_mm - 80.0).abs() < 1e-9);
    }

    #[test]
    fn tall_canvas_splits_into_full_pages_and_remainder() {
        // 190 mm printable width over 1900 px: 0.1 mm per px, 2770 px per page.
        let bands = paginate(1900, 6000, &PageLayout::a4()).unwrap();
        assert_eq!(bands.len(), 3);
        assert_eq!(bands[0].source_height_px, 2770);
        assert_eq!(bands[1].source_y_px, 2770);
        assert_eq!(bands[1].source_height_px, 2770);
        assert_eq!(bands[2].source_y_px, 5540);
        assert_eq!(bands[2].source_height_px, 460);
        assert!((bands[0].dest_height_mm - 277.0).abs() < 1e-9);
    }

    #[test]
    fn bands_cover_canvas_without_overlap() {
        let height = 12_345;
        let bands = paginate(1024, height, &PageLayout::a4()).unwrap();
        let mut expected_y = 0;
        for (i, band) in bands.iter().enumerate() {
            assert_eq!(band.page_index, i);
            assert_eq!(band.source_y_px, expected_y);
            expected_y += band.source_height_px;
        }
        assert_eq!(expected_y, height);
    }

    #[test]
    fn exact_multiple_has_no_empty_trailing_page() {
        let bands = paginate(1900, 2770 * 2, &PageLayout::a4()).unwrap();
        assert_eq!(bands.len(), 2);
        assert!(bands.iter().all(|b| b.source_height_px == 2770));
    }

    #[test]
    fn empty_canvas_is_rejected() {
        assert_eq!(
            paginate(0, 100, &PageLayout::a4()),
            Err(ReportError::EmptyCanvas { width: 0, height: 100 })
        );
        assert!(paginate(100, 0, &PageLayout::a4()).is_err());
    }

    #[test]
    fn oversized_margins_are_rejected() {
        let layout = PageLayout {
            page_width_mm: 100.0,
            page_height_mm: 100.0,
            margin_mm: 60.0,
        };
        assert!(matches!(
            paginate(100, 100, &layout),
            Err(ReportError::NoPrintableArea { .. })
        ));
    }
}
