use pdform_config::EditorConfig;
use pdform_engine::settings::EditorSettings;
use tracing::warn;

/// 把配置文件中的编辑器参数映射为引擎设置。非法取值回落到默认值并记录警告。
pub fn editor_settings(config: &EditorConfig) -> EditorSettings {
    let defaults = EditorSettings::default();
    let positive = |name: &str, value: f64, fallback: f64| {
        if value.is_finite() && value > 0.0 {
            value
        } else {
            warn!(key = name, value, fallback, "编辑器参数无效，使用默认值");
            fallback
        }
    };

    let mut min_zoom = positive("min_zoom", config.min_zoom, defaults.min_zoom);
    let mut max_zoom = positive("max_zoom", config.max_zoom, defaults.max_zoom);
    if min_zoom > max_zoom {
        warn!(min_zoom, max_zoom, "min_zoom 大于 max_zoom，已交换");
        std::mem::swap(&mut min_zoom, &mut max_zoom);
    }

    EditorSettings {
        canvas_offset: if config.canvas_offset.is_finite() {
            config.canvas_offset
        } else {
            defaults.canvas_offset
        },
        min_zoom,
        max_zoom,
        zoom_step: positive("zoom_step", config.zoom_step, defaults.zoom_step),
        default_zoom: positive("default_zoom", config.default_zoom, defaults.default_zoom),
        nudge_step: positive("nudge_step", config.nudge_step, defaults.nudge_step),
        nudge_step_large: positive(
            "nudge_step_large",
            config.nudge_step_large,
            defaults.nudge_step_large,
        ),
        duplicate_offset: positive(
            "duplicate_offset",
            config.duplicate_offset,
            defaults.duplicate_offset,
        ),
        min_field_size: positive("min_field_size", config.min_field_size, defaults.min_field_size),
        handle_size: positive("handle_size", config.handle_size, defaults.handle_size),
        history_limit: config.history_limit.max(1),
    }
}
