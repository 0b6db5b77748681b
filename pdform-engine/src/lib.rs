pub mod command;
pub mod date_format;
pub mod history;
pub mod manager;
pub mod session;
pub mod transform;
pub mod zoom;

pub mod errors {
    use pdform_core::form::FieldKind;
    use thiserror::Error;

    #[derive(Debug, Clone, PartialEq, Error)]
    pub enum EngineError {
        #[error("page {page} out of range (document has {page_count} pages)")]
        PageOutOfRange { page: usize, page_count: usize },
        #[error("field with id {0} not found")]
        FieldNotFound(u64),
        #[error("invalid field name {0:?}")]
        InvalidName(String),
        #[error("field name {0:?} is already taken")]
        DuplicateName(String),
        #[error("field {field:?} of kind {kind} has no {attribute} attribute")]
        AttributeMismatch {
            field: String,
            kind: FieldKind,
            attribute: &'static str,
        },
    }
}

pub mod settings {
    /// 编辑器运行参数。由前端从配置文件映射而来，引擎本身不读取配置。
    #[derive(Debug, Clone, Copy, PartialEq)]
    pub struct EditorSettings {
        /// PDF 位图在画布上的放置偏移（像素）。
        pub canvas_offset: f64,
        pub min_zoom: f64,
        pub max_zoom: f64,
        pub zoom_step: f64,
        pub default_zoom: f64,
        /// 方向键单步位移（画布像素）。
        pub nudge_step: f64,
        /// 按住 Shift 时的位移。
        pub nudge_step_large: f64,
        /// 复制/粘贴时的 PDF 空间偏移（point）。
        pub duplicate_offset: f64,
        /// 字段最小宽高（point）。
        pub min_field_size: f64,
        /// 缩放手柄边长（像素）。
        pub handle_size: f64,
        pub history_limit: usize,
    }

    impl Default for EditorSettings {
        fn default() -> Self {
            Self {
                canvas_offset: 25.0,
                min_zoom: 0.1,
                max_zoom: 4.0,
                zoom_step: 0.25,
                default_zoom: 1.0,
                nudge_step: 5.0,
                nudge_step_large: 20.0,
                duplicate_offset: 20.0,
                min_field_size: 4.0,
                handle_size: 6.0,
                history_limit: 25,
            }
        }
    }
}
