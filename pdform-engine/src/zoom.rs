use pdform_core::geometry::{PageSize, Vector2};

use crate::settings::EditorSettings;
use crate::transform::{CoordinateTransformer, fit_scale};

/// 记录缩放倍数、适应窗口标记与画布平移，是构造 `CoordinateTransformer` 的唯一来源。
#[derive(Debug, Clone, Copy)]
pub struct ZoomState {
    zoom_level: f64,
    fit_to_window: bool,
    canvas_offset: f64,
    pan: Vector2,
    min_zoom: f64,
    max_zoom: f64,
    zoom_step: f64,
    default_zoom: f64,
}

impl ZoomState {
    pub fn new(settings: &EditorSettings) -> Self {
        let min_zoom = settings.min_zoom.min(settings.max_zoom);
        let max_zoom = settings.max_zoom.max(settings.min_zoom);
        Self {
            zoom_level: settings.default_zoom.clamp(min_zoom, max_zoom),
            fit_to_window: true,
            canvas_offset: settings.canvas_offset,
            pan: Vector2::zero(),
            min_zoom,
            max_zoom,
            zoom_step: settings.zoom_step,
            default_zoom: settings.default_zoom.clamp(min_zoom, max_zoom),
        }
    }

    #[inline]
    pub fn zoom(&self) -> f64 {
        self.zoom_level
    }

    #[inline]
    pub fn is_fit_to_window(&self) -> bool {
        self.fit_to_window
    }

    #[inline]
    pub fn canvas_offset(&self) -> f64 {
        self.canvas_offset
    }

    #[inline]
    pub fn pan(&self) -> Vector2 {
        self.pan
    }

    #[inline]
    pub fn limits(&self) -> (f64, f64) {
        (self.min_zoom, self.max_zoom)
    }

    /// 设置缩放倍数（自动限制在合法范围内），手动缩放会关闭适应窗口。
    /// 非有限值被忽略。
    pub fn set_zoom(&mut self, zoom: f64) -> f64 {
        if zoom.is_finite() {
            self.zoom_level = zoom.clamp(self.min_zoom, self.max_zoom);
            self.fit_to_window = false;
        }
        self.zoom_level
    }

    pub fn zoom_in(&mut self) -> f64 {
        self.set_zoom(self.zoom_level + self.zoom_step)
    }

    pub fn zoom_out(&mut self) -> f64 {
        self.set_zoom(self.zoom_level - self.zoom_step)
    }

    /// 回到默认缩放并重新启用适应窗口，平移归零。
    pub fn reset(&mut self) {
        self.zoom_level = self.default_zoom;
        self.fit_to_window = true;
        self.pan = Vector2::zero();
    }

    /// 按画布尺寸计算适应窗口的缩放倍数。
    pub fn fit_to_window(&mut self, canvas_size: Vector2, page: PageSize) -> f64 {
        let scale = fit_scale(canvas_size, page);
        if scale.is_finite() && scale > 0.0 {
            self.zoom_level = scale.clamp(self.min_zoom, self.max_zoom);
        }
        self.fit_to_window = true;
        self.pan = Vector2::zero();
        self.zoom_level
    }

    pub fn pan_by(&mut self, delta: Vector2) {
        self.pan = Vector2::from(self.pan.as_vec2() + delta.as_vec2());
    }

    #[inline]
    pub fn reset_pan(&mut self) {
        self.pan = Vector2::zero();
    }

    pub fn percentage(&self) -> String {
        format!("{}%", (self.zoom_level * 100.0).round() as i64)
    }

    /// 当前状态下的坐标换算器。
    pub fn transformer(&self) -> CoordinateTransformer {
        let offset = Vector2::from(Vector2::splat(self.canvas_offset).as_vec2() + self.pan.as_vec2());
        CoordinateTransformer::with_offset(self.zoom_level, offset)
    }
}

impl Default for ZoomState {
    fn default() -> Self {
        Self::new(&EditorSettings::default())
    }
}
