use std::path::{Path, PathBuf};

use pdform_core::form::FormField;
use pdform_core::geometry::PageSize;
use pdform_core::widget::{FilledValue, WidgetDescriptor};
use thiserror::Error;

pub mod layout;
pub mod lopdf_backend;
pub mod memory;

pub use layout::{LAYOUT_VERSION, Layout, load_layout, save_layout};
pub use lopdf_backend::LopdfBackend;
pub use memory::MemoryBackend;

#[derive(Debug, Error)]
pub enum IoError {
    #[error("unsupported feature: {0}")]
    UnsupportedFeature(String),
    #[error("failed to read file {path:?}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write file {path:?}: {source}")]
    WriteError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("pdf engine error: {0}")]
    Pdf(String),
    #[error("invalid document structure: {0}")]
    InvalidDocument(String),
    #[error("page {page} out of range (document has {page_count} pages)")]
    PageOutOfRange { page: usize, page_count: usize },
    #[error("invalid layout json {path:?}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// 页面位图，RGBA8 行优先。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl RenderedPage {
    /// 指定缩放下的位图尺寸：`ceil(page * zoom)`，至少 1 像素。
    pub fn size_for(page: PageSize, zoom: f64) -> (u32, u32) {
        let width = (page.width * zoom).ceil().max(1.0) as u32;
        let height = (page.height * zoom).ceil().max(1.0) as u32;
        (width, height)
    }

    /// 白色空白页。
    pub fn blank(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0xFF; width as usize * height as usize * 4],
        }
    }
}

/// PDF 引擎边界。字段矩形进出此边界时均为 PDF 空间（左上原点），
/// 由具体实现负责与引擎自身坐标系之间的转换。
pub trait PdfBackend {
    fn page_sizes(&self) -> Vec<PageSize>;

    fn page_count(&self) -> usize {
        self.page_sizes().len()
    }

    fn render_page(&self, page: usize, zoom: f64) -> Result<RenderedPage, IoError>;

    fn scan_widgets(&self, page: usize) -> Result<Vec<WidgetDescriptor>, IoError>;

    /// 依次扫描全部页面。
    fn scan_all_widgets(&self) -> Result<Vec<WidgetDescriptor>, IoError> {
        let mut widgets = Vec::new();
        for page in 0..self.page_count() {
            widgets.extend(self.scan_widgets(page)?);
        }
        Ok(widgets)
    }

    /// 以字段集合为准写出表单：旧控件全部移除，每个字段对应一个控件。
    fn write_widgets(&mut self, fields: &[FormField], output: &Path) -> Result<(), IoError>;

    /// 填写模式：只改写已有控件的值。
    fn fill_widgets(&mut self, values: &[FilledValue], output: &Path) -> Result<(), IoError>;
}

pub(crate) fn check_page(page: usize, page_count: usize) -> Result<(), IoError> {
    if page < page_count {
        Ok(())
    } else {
        Err(IoError::PageOutOfRange { page, page_count })
    }
}
