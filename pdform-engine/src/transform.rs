use pdform_core::geometry::{CanvasRect, PageSize, PdfRect, Point2, Rect, Vector2};

const FIT_MARGIN: f64 = 50.0;
const FIT_MAX_SCALE: f64 = 2.0;

/// 画布像素空间与 PDF 空间之间的换算：
/// `pdf = (canvas - offset) / scale`，`canvas = pdf * scale + offset`。
///
/// 该类型不持有任何可变状态，每次缩放或平移变化时由 `ZoomState` 重新构造。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinateTransformer {
    scale: f64,
    offset: Vector2,
}

impl CoordinateTransformer {
    /// 以标量偏移构造，偏移同时作用于 x 与 y。
    #[inline]
    pub fn new(scale: f64, canvas_offset: f64) -> Self {
        Self::with_offset(scale, Vector2::splat(canvas_offset))
    }

    pub fn with_offset(scale: f64, offset: Vector2) -> Self {
        debug_assert!(scale.is_finite() && scale > 0.0, "zoom scale must be positive");
        let scale = if scale.is_finite() && scale > 0.0 {
            scale
        } else {
            1.0
        };
        Self { scale, offset }
    }

    #[inline]
    pub fn scale(&self) -> f64 {
        self.scale
    }

    #[inline]
    pub fn offset(&self) -> Vector2 {
        self.offset
    }

    #[inline]
    pub fn to_pdf_point(&self, canvas: Point2) -> Point2 {
        Point2::from_vec((canvas.as_vec2() - self.offset.as_vec2()) / self.scale)
    }

    #[inline]
    pub fn to_canvas_point(&self, pdf: Point2) -> Point2 {
        Point2::from_vec(pdf.as_vec2() * self.scale + self.offset.as_vec2())
    }

    /// 位移换算只涉及缩放，不受偏移影响。
    #[inline]
    pub fn to_pdf_delta(&self, canvas_delta: Vector2) -> Vector2 {
        Vector2::from(canvas_delta.as_vec2() / self.scale)
    }

    #[inline]
    pub fn to_canvas_delta(&self, pdf_delta: Vector2) -> Vector2 {
        Vector2::from(pdf_delta.as_vec2() * self.scale)
    }

    pub fn to_pdf(&self, canvas: CanvasRect) -> PdfRect {
        PdfRect(Rect::new(
            self.to_pdf_point(canvas.0.min()),
            self.to_pdf_point(canvas.0.max()),
        ))
    }

    pub fn to_canvas(&self, pdf: PdfRect) -> CanvasRect {
        CanvasRect(Rect::new(
            self.to_canvas_point(pdf.0.min()),
            self.to_canvas_point(pdf.0.max()),
        ))
    }
}

/// 平移钳制：把矩形整体推回页面内，尽量保留宽高；超出页面的尺寸收缩到页面大小。
/// 钳制只在 PDF 空间进行，因此与缩放无关。
pub fn clamp_to_page(rect: PdfRect, page: PageSize) -> PdfRect {
    let r = rect.0;
    let width = r.width().min(page.width).max(0.0);
    let height = r.height().min(page.height).max(0.0);
    let x0 = r.x0().min(page.width - width).max(0.0);
    let y0 = r.y0().min(page.height - height).max(0.0);
    PdfRect::from_coords(x0, y0, x0 + width, y0 + height)
}

/// 边钳制：逐边裁到页面内并保持最小尺寸，用于缩放手柄拖动。
pub fn clamp_edges_to_page(rect: PdfRect, page: PageSize, min_size: f64) -> PdfRect {
    let r = rect.0;
    let min_width = min_size.min(page.width).max(0.0);
    let min_height = min_size.min(page.height).max(0.0);

    let x0 = r.x0().min(page.width - min_width).max(0.0);
    let y0 = r.y0().min(page.height - min_height).max(0.0);
    let x1 = r.x1().min(page.width).max(x0 + min_width);
    let y1 = r.y1().min(page.height).max(y0 + min_height);
    PdfRect::from_coords(x0, y0, x1, y1)
}

/// "适应窗口" 的缩放系数：页面完整放入画布并留出边距，且不超过 2 倍。
pub fn fit_scale(canvas_size: Vector2, page: PageSize) -> f64 {
    if page.width <= 0.0 || page.height <= 0.0 {
        return 1.0;
    }
    let scale_x = (canvas_size.x() - FIT_MARGIN) / page.width;
    let scale_y = (canvas_size.y() - FIT_MARGIN) / page.height;
    scale_x.min(scale_y).min(FIT_MAX_SCALE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canvas_to_pdf_removes_offset_then_scale() {
        let transformer = CoordinateTransformer::new(1.5, 25.0);
        let canvas = CanvasRect::from_coords(200.0, 300.0, 300.0, 330.0);
        let pdf = transformer.to_pdf(canvas);
        assert!((pdf.0.x0() - 116.666_666).abs() < 1e-3);
        assert!((pdf.0.y0() - 183.333_333).abs() < 1e-3);
        assert!((pdf.0.x1() - 183.333_333).abs() < 1e-3);
        assert!((pdf.0.y1() - 203.333_333).abs() < 1e-3);
    }

    #[test]
    fn round_trip_holds_across_supported_zoom_range() {
        let rects = [
            PdfRect::from_coords(0.0, 0.0, 10.0, 10.0),
            PdfRect::from_coords(116.7, 183.3, 183.3, 203.3),
            PdfRect::from_coords(500.5, 700.25, 611.9, 791.9),
        ];
        let mut zoom = 0.1;
        while zoom <= 4.0 + 1e-9 {
            for offset in [0.0, 25.0, -40.0] {
                let transformer = CoordinateTransformer::new(zoom, offset);
                for rect in rects {
                    let back = transformer.to_pdf(transformer.to_canvas(rect));
                    assert!(
                        back.0.approx_eq(&rect.0, 0.1),
                        "round trip drifted at zoom {zoom}: {back:?} vs {rect:?}"
                    );
                }
            }
            zoom += 0.05;
        }
    }

    #[test]
    fn deltas_ignore_offset() {
        let transformer = CoordinateTransformer::new(2.0, 25.0);
        let delta = transformer.to_pdf_delta(Vector2::new(10.0, -4.0));
        assert_eq!(delta, Vector2::new(5.0, -2.0));
        assert_eq!(transformer.to_canvas_delta(delta), Vector2::new(10.0, -4.0));
    }

    #[test]
    fn vector_offset_applies_per_axis() {
        let transformer = CoordinateTransformer::with_offset(1.0, Vector2::new(10.0, 20.0));
        let point = transformer.to_pdf_point(Point2::new(10.0, 20.0));
        assert_eq!(point, Point2::new(0.0, 0.0));
        assert_eq!(transformer.offset(), Vector2::new(10.0, 20.0));
    }

    #[test]
    fn clamp_preserves_size_when_possible() {
        let page = PageSize::LETTER;
        let clamped = clamp_to_page(PdfRect::from_coords(580.0, -15.0, 680.0, 15.0), page);
        assert_eq!(clamped.0.to_array(), [512.0, 0.0, 612.0, 30.0]);
        assert!(page.contains(&clamped));

        let inside = PdfRect::from_coords(10.0, 10.0, 50.0, 40.0);
        assert_eq!(clamp_to_page(inside, page), inside);

        let oversized = clamp_to_page(PdfRect::from_coords(-50.0, 100.0, 700.0, 150.0), page);
        assert_eq!(oversized.0.to_array(), [0.0, 100.0, 612.0, 150.0]);
    }

    #[test]
    fn edge_clamp_keeps_minimum_size() {
        let page = PageSize::new(100.0, 100.0);
        let clamped = clamp_edges_to_page(PdfRect::from_coords(98.0, -5.0, 130.0, 1.0), page, 4.0);
        assert_eq!(clamped.0.to_array(), [96.0, 0.0, 100.0, 4.0]);
    }

    #[test]
    fn fit_scale_uses_smaller_axis_and_caps() {
        let page = PageSize::LETTER;
        let scale = fit_scale(Vector2::new(850.0, 842.0), page);
        assert!((scale - 1.0).abs() < 1e-9);

        let capped = fit_scale(Vector2::new(5_000.0, 5_000.0), page);
        assert!((capped - 2.0).abs() < 1e-9);
    }
}
