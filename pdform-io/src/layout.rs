use std::fs;
use std::path::Path;

use pdform_core::form::FormField;
use pdform_core::geometry::PageSize;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::IoError;

/// 当前布局文件版本。字段枚举变化时递增并在加载时迁移。
pub const LAYOUT_VERSION: u32 = 1;

/// 字段布局文件：页面表与字段集合，矩形均为 PDF 空间。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layout {
    pub version: u32,
    pub pages: Vec<PageSize>,
    pub fields: Vec<FormField>,
}

impl Layout {
    pub fn new(pages: Vec<PageSize>, fields: Vec<FormField>) -> Self {
        Self {
            version: LAYOUT_VERSION,
            pages,
            fields,
        }
    }
}

pub fn save_layout(path: impl AsRef<Path>, layout: &Layout) -> Result<(), IoError> {
    let path = path.as_ref();
    let json = serde_json::to_string_pretty(layout).map_err(|source| IoError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(path, json).map_err(|source| IoError::WriteError {
        path: path.to_path_buf(),
        source,
    })?;
    info!(path = ?path, fields = layout.fields.len(), "已保存字段布局");
    Ok(())
}

pub fn load_layout(path: impl AsRef<Path>) -> Result<Layout, IoError> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|source| IoError::ReadError {
        path: path.to_path_buf(),
        source,
    })?;
    let layout: Layout = serde_json::from_str(&content).map_err(|source| IoError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    if layout.version != LAYOUT_VERSION {
        return Err(IoError::InvalidDocument(format!(
            "unsupported layout version {} (expected {LAYOUT_VERSION})",
            layout.version
        )));
    }
    if let Some(field) = layout
        .fields
        .iter()
        .find(|field| field.page >= layout.pages.len())
    {
        return Err(IoError::PageOutOfRange {
            page: field.page,
            page_count: layout.pages.len(),
        });
    }
    Ok(layout)
}
