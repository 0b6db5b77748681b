use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use pdform_core::form::{DateFormat, FieldAttributes, FieldId, FieldKind, FormField};
use pdform_core::geometry::{CanvasRect, PageSize, PdfRect, Point2, Rect, Vector2};
use pdform_core::widget::{WidgetClass, WidgetDescriptor, classify_widget, reserved_prefix_clash};
use tracing::{debug, info, warn};

use crate::date_format::infer_date_format;
use crate::errors::EngineError;
use crate::settings::EditorSettings;
use crate::transform::{clamp_edges_to_page, clamp_to_page};
use crate::zoom::ZoomState;

const COPY_MARKER: &str = "_copy_";

/// 选中字段的八个缩放手柄。画布与 PDF 空间都是 y 轴向下，北边对应较小的 y。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResizeHandle {
    NorthWest,
    NorthEast,
    SouthEast,
    SouthWest,
    North,
    East,
    South,
    West,
}

impl ResizeHandle {
    /// 角手柄排在边手柄之前，重叠时角优先命中。
    pub const ALL: [ResizeHandle; 8] = [
        ResizeHandle::NorthWest,
        ResizeHandle::NorthEast,
        ResizeHandle::SouthEast,
        ResizeHandle::SouthWest,
        ResizeHandle::North,
        ResizeHandle::East,
        ResizeHandle::South,
        ResizeHandle::West,
    ];

    #[inline]
    pub fn moves_north(self) -> bool {
        matches!(
            self,
            ResizeHandle::NorthWest | ResizeHandle::North | ResizeHandle::NorthEast
        )
    }

    #[inline]
    pub fn moves_south(self) -> bool {
        matches!(
            self,
            ResizeHandle::SouthWest | ResizeHandle::South | ResizeHandle::SouthEast
        )
    }

    #[inline]
    pub fn moves_east(self) -> bool {
        matches!(
            self,
            ResizeHandle::NorthEast | ResizeHandle::East | ResizeHandle::SouthEast
        )
    }

    #[inline]
    pub fn moves_west(self) -> bool {
        matches!(
            self,
            ResizeHandle::NorthWest | ResizeHandle::West | ResizeHandle::SouthWest
        )
    }

    /// 手柄在矩形上的锚点。
    pub fn anchor(self, rect: &Rect) -> Point2 {
        let center = rect.center();
        let x = if self.moves_west() {
            rect.x0()
        } else if self.moves_east() {
            rect.x1()
        } else {
            center.x()
        };
        let y = if self.moves_north() {
            rect.y0()
        } else if self.moves_south() {
            rect.y1()
        } else {
            center.y()
        };
        Point2::new(x, y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NudgeDirection {
    Up,
    Down,
    Left,
    Right,
}

impl NudgeDirection {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "up" => Some(NudgeDirection::Up),
            "down" => Some(NudgeDirection::Down),
            "left" => Some(NudgeDirection::Left),
            "right" => Some(NudgeDirection::Right),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            NudgeDirection::Up => "up",
            NudgeDirection::Down => "down",
            NudgeDirection::Left => "left",
            NudgeDirection::Right => "right",
        }
    }

    /// 画布空间位移。
    pub fn delta(self, step: f64) -> Vector2 {
        match self {
            NudgeDirection::Up => Vector2::new(0.0, -step),
            NudgeDirection::Down => Vector2::new(0.0, step),
            NudgeDirection::Left => Vector2::new(-step, 0.0),
            NudgeDirection::Right => Vector2::new(step, 0.0),
        }
    }
}

/// 会话持有的剪贴板：至多保存一个字段的副本，粘贴时显式传入。
#[derive(Debug, Clone, Default)]
pub struct Clipboard {
    field: Option<FormField>,
}

impl Clipboard {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.field.is_none()
    }

    #[inline]
    pub fn contents(&self) -> Option<&FormField> {
        self.field.as_ref()
    }

    pub fn store(&mut self, field: FormField) {
        self.field = Some(field);
    }

    pub fn clear(&mut self) {
        self.field = None;
    }
}

/// 撤销用的集合快照。
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSnapshot {
    fields: Vec<FormField>,
    selected: Option<FieldId>,
    current_page: usize,
}

/// 加载已有控件时记录的诊断信息，加载过程本身不会中断。
#[derive(Debug, Clone, PartialEq)]
pub enum LoadDiagnostic {
    UnsupportedWidget {
        page: usize,
        name: String,
        tag: String,
    },
    PageOutOfRange {
        page: usize,
        name: String,
    },
    InvalidRect {
        page: usize,
        name: String,
    },
    Renamed {
        from: String,
        to: String,
    },
}

impl fmt::Display for LoadDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadDiagnostic::UnsupportedWidget { page, name, tag } => {
                write!(f, "第 {page} 页控件 {name:?} 类型 {tag} 不受支持，已跳过")
            }
            LoadDiagnostic::PageOutOfRange { page, name } => {
                write!(f, "控件 {name:?} 位于不存在的第 {page} 页，已跳过")
            }
            LoadDiagnostic::InvalidRect { page, name } => {
                write!(f, "第 {page} 页控件 {name:?} 矩形无效，已跳过")
            }
            LoadDiagnostic::Renamed { from, to } => {
                write!(f, "字段名 {from:?} 重复，已重命名为 {to:?}")
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadReport {
    pub loaded: usize,
    pub diagnostics: Vec<LoadDiagnostic>,
}

impl LoadReport {
    /// 被跳过的控件数量（不含重命名）。
    pub fn skipped(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|diagnostic| !matches!(diagnostic, LoadDiagnostic::Renamed { .. }))
            .count()
    }
}

/// 单个文档的字段集合。字段位置只以 PDF 空间矩形存储，
/// 所有画布输入都经由调用方传入的 `ZoomState` 换算。
#[derive(Debug, Clone)]
pub struct FieldManager {
    pages: Vec<PageSize>,
    fields: Vec<FormField>,
    current_page: usize,
    selected: Option<FieldId>,
    name_counters: HashMap<FieldKind, u32>,
    next_id: u64,
    settings: EditorSettings,
}

impl FieldManager {
    pub fn new(pages: Vec<PageSize>, settings: EditorSettings) -> Self {
        Self {
            pages,
            fields: Vec::new(),
            current_page: 0,
            selected: None,
            name_counters: HashMap::new(),
            next_id: 1,
            settings,
        }
    }

    /// 替换页面表并清空字段，用于打开新文档。
    pub fn reset_document(&mut self, pages: Vec<PageSize>) {
        self.pages = pages;
        self.fields.clear();
        self.current_page = 0;
        self.selected = None;
        self.name_counters.clear();
        info!(pages = self.pages.len(), "已重置文档");
    }

    #[inline]
    pub fn settings(&self) -> &EditorSettings {
        &self.settings
    }

    #[inline]
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    #[inline]
    pub fn pages(&self) -> &[PageSize] {
        &self.pages
    }

    #[inline]
    pub fn page_size(&self, page: usize) -> Option<PageSize> {
        self.pages.get(page).copied()
    }

    #[inline]
    pub fn current_page(&self) -> usize {
        self.current_page
    }

    /// 切换当前页。越界页码返回错误而不是被静默钳制。
    pub fn set_current_page(&mut self, page: usize) -> Result<(), EngineError> {
        self.check_page(page)?;
        if self.current_page != page {
            self.current_page = page;
            self.selected = None;
            debug!(page, "已切换当前页");
        }
        Ok(())
    }

    #[inline]
    pub fn fields(&self) -> &[FormField] {
        &self.fields
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn fields_on_page(&self, page: usize) -> impl Iterator<Item = &FormField> + '_ {
        self.fields.iter().filter(move |field| field.page == page)
    }

    pub fn field(&self, id: FieldId) -> Option<&FormField> {
        self.fields.iter().find(|field| field.id == id)
    }

    pub fn field_by_name(&self, name: &str) -> Option<&FormField> {
        self.fields.iter().find(|field| field.name == name)
    }

    #[inline]
    pub fn selected_id(&self) -> Option<FieldId> {
        self.selected
    }

    pub fn selected(&self) -> Option<&FormField> {
        self.selected.and_then(|id| self.field(id))
    }

    pub fn select(&mut self, id: FieldId) -> Result<(), EngineError> {
        if self.field(id).is_none() {
            return Err(EngineError::FieldNotFound(id.get()));
        }
        self.selected = Some(id);
        Ok(())
    }

    #[inline]
    pub fn clear_selection(&mut self) {
        self.selected = None;
    }

    /// 在画布点处按默认尺寸创建字段。矩形换算到 PDF 空间后钳制到页面内。
    pub fn create_field(
        &mut self,
        kind: FieldKind,
        canvas_point: Point2,
        page: usize,
        zoom: &ZoomState,
    ) -> Result<&FormField, EngineError> {
        let page_size = self.check_page(page)?;
        let transformer = zoom.transformer();
        let (width, height) = kind.default_canvas_size();
        let canvas = CanvasRect(Rect::from_origin_size(
            canvas_point,
            Vector2::new(width, height),
        ));
        let rect = clamp_to_page(transformer.to_pdf(canvas), page_size);
        let index = self.push_new(kind, rect, page);
        self.fields[index].canvas_rect = Some(transformer.to_canvas(rect));
        Ok(&self.fields[index])
    }

    /// 直接以 PDF 空间矩形创建字段，供演示文档与脚本使用。
    pub fn create_field_in_pdf(
        &mut self,
        kind: FieldKind,
        rect: PdfRect,
        page: usize,
    ) -> Result<&FormField, EngineError> {
        let page_size = self.check_page(page)?;
        let rect = clamp_to_page(rect, page_size);
        let index = self.push_new(kind, rect, page);
        Ok(&self.fields[index])
    }

    fn push_new(&mut self, kind: FieldKind, rect: PdfRect, page: usize) -> usize {
        let id = self.allocate_id();
        let name = self.next_default_name(kind);
        let field = FormField::new(id, name, page, rect, FieldAttributes::defaults_for(kind));
        debug!(
            id = id.get(),
            name = %field.name,
            page,
            rect = ?rect.0.to_array(),
            "已创建字段"
        );
        self.fields.push(field);
        self.fields.len() - 1
    }

    /// 纯投影：不修改缓存。
    pub fn get_canvas_rect(&self, id: FieldId, zoom: &ZoomState) -> Option<CanvasRect> {
        let transformer = zoom.transformer();
        self.field(id).map(|field| transformer.to_canvas(field.rect))
    }

    /// 重绘：当前页字段的画布矩形全部由 PDF 矩形重新计算，其它页的缓存清空。
    pub fn refresh_canvas_cache(&mut self, zoom: &ZoomState) {
        let transformer = zoom.transformer();
        let current = self.current_page;
        for field in &mut self.fields {
            field.canvas_rect = if field.page == current {
                Some(transformer.to_canvas(field.rect))
            } else {
                None
            };
        }
    }

    /// 命中测试当前页字段，重叠时最近创建的字段优先。未命中会清空选中。
    pub fn select_field_at(&mut self, canvas_point: Point2, zoom: &ZoomState) -> Option<&FormField> {
        self.refresh_canvas_cache(zoom);
        let current = self.current_page;
        let hit = self
            .fields
            .iter()
            .rev()
            .filter(|field| field.page == current)
            .find(|field| {
                field
                    .canvas_rect
                    .is_some_and(|canvas| canvas.0.contains(canvas_point))
            })
            .map(|field| field.id);
        self.selected = hit;
        hit.and_then(|id| self.field(id))
    }

    /// 命中测试选中字段的缩放手柄。
    pub fn handle_at(&self, canvas_point: Point2, zoom: &ZoomState) -> Option<ResizeHandle> {
        let field = self.selected()?;
        if field.page != self.current_page {
            return None;
        }
        let canvas = zoom.transformer().to_canvas(field.rect);
        let half = self.settings.handle_size / 2.0;
        ResizeHandle::ALL.into_iter().find(|handle| {
            let anchor = handle.anchor(&canvas.0);
            Rect::from_coords(
                anchor.x() - half,
                anchor.y() - half,
                anchor.x() + half,
                anchor.y() + half,
            )
            .contains(canvas_point)
        })
    }

    /// 按画布位移移动字段：`delta_pdf = delta_canvas / zoom`，随后平移钳制。
    /// 字段不存在时返回 `false`。
    pub fn move_field(
        &mut self,
        id: FieldId,
        canvas_dx: f64,
        canvas_dy: f64,
        zoom: &ZoomState,
    ) -> bool {
        let Some(index) = self.index_of(id) else {
            return false;
        };
        let Some(page_size) = self.page_size(self.fields[index].page) else {
            return false;
        };
        let transformer = zoom.transformer();
        let delta = transformer.to_pdf_delta(Vector2::new(canvas_dx, canvas_dy));
        let field = &mut self.fields[index];
        field.rect = clamp_to_page(PdfRect(field.rect.0.translate(delta)), page_size);
        field.canvas_rect = Some(transformer.to_canvas(field.rect));
        debug!(id = id.get(), rect = ?field.rect.0.to_array(), "已移动字段");
        true
    }

    /// 把手柄对应的边移动到换算后的点，保持最小尺寸且不会翻转。
    pub fn resize_field(
        &mut self,
        id: FieldId,
        handle: ResizeHandle,
        canvas_point: Point2,
        zoom: &ZoomState,
    ) -> bool {
        let Some(index) = self.index_of(id) else {
            return false;
        };
        let Some(page_size) = self.page_size(self.fields[index].page) else {
            return false;
        };
        let transformer = zoom.transformer();
        let target = transformer.to_pdf_point(canvas_point);
        let min_size = self.settings.min_field_size;

        let field = &mut self.fields[index];
        let [mut x0, mut y0, mut x1, mut y1] = field.rect.0.to_array();
        if handle.moves_west() {
            x0 = target.x().min(x1 - min_size);
        }
        if handle.moves_east() {
            x1 = target.x().max(x0 + min_size);
        }
        if handle.moves_north() {
            y0 = target.y().min(y1 - min_size);
        }
        if handle.moves_south() {
            y1 = target.y().max(y0 + min_size);
        }
        field.rect = clamp_edges_to_page(PdfRect::from_coords(x0, y0, x1, y1), page_size, min_size);
        field.canvas_rect = Some(transformer.to_canvas(field.rect));
        debug!(id = id.get(), ?handle, rect = ?field.rect.0.to_array(), "已缩放字段");
        true
    }

    /// 方向键微调选中字段。
    pub fn nudge_selected(
        &mut self,
        direction: NudgeDirection,
        large: bool,
        zoom: &ZoomState,
    ) -> bool {
        let Some(id) = self.selected else {
            return false;
        };
        let step = if large {
            self.settings.nudge_step_large
        } else {
            self.settings.nudge_step
        };
        let delta = direction.delta(step);
        self.move_field(id, delta.x(), delta.y(), zoom)
    }

    /// 深拷贝字段到同一页，偏移固定的 PDF 距离并生成新名称；新字段成为选中项。
    pub fn duplicate_field(&mut self, id: FieldId) -> Option<&FormField> {
        let source = self.field(id)?.clone();
        let page = source.page;
        self.insert_copy(&source, page)
    }

    /// 把选中字段复制到剪贴板。
    pub fn copy_selected(&self, clipboard: &mut Clipboard) -> bool {
        match self.selected() {
            Some(field) => {
                let mut copy = field.clone();
                copy.canvas_rect = None;
                clipboard.store(copy);
                debug!(name = %field.name, "已复制字段到剪贴板");
                true
            }
            None => false,
        }
    }

    /// 把剪贴板中的字段粘贴到当前页，偏移与命名规则同复制。
    pub fn paste(&mut self, clipboard: &Clipboard) -> Option<&FormField> {
        let source = clipboard.contents()?.clone();
        let page = self.current_page;
        self.insert_copy(&source, page)
    }

    fn insert_copy(&mut self, source: &FormField, page: usize) -> Option<&FormField> {
        let page_size = self.page_size(page)?;
        let offset = Vector2::splat(self.settings.duplicate_offset);
        let rect = clamp_to_page(PdfRect(source.rect.0.translate(offset)), page_size);
        let id = self.allocate_id();
        let name = self.copy_name(&source.name);
        let mut field = FormField::new(id, name, page, rect, source.attributes.clone());
        field.origin_name = None;
        debug!(source = %source.name, name = %field.name, page, "已复制字段");
        self.fields.push(field);
        self.selected = Some(id);
        self.fields.last()
    }

    /// 重命名字段。空白名称、重复名称以及无前缀类型使用保留前缀的名称会被拒绝，
    /// 失败时集合保持不变。
    pub fn rename_field(&mut self, id: FieldId, new_name: &str) -> Result<(), EngineError> {
        let index = self
            .index_of(id)
            .ok_or(EngineError::FieldNotFound(id.get()))?;
        if new_name.trim().is_empty() {
            return Err(EngineError::InvalidName(new_name.to_string()));
        }
        if let Some(prefix) = reserved_prefix_clash(self.fields[index].kind(), new_name) {
            debug!(name = new_name, prefix, "名称使用了保留前缀");
            return Err(EngineError::InvalidName(new_name.to_string()));
        }
        if self.fields[index].name == new_name {
            return Ok(());
        }
        if self.name_taken(new_name) {
            return Err(EngineError::DuplicateName(new_name.to_string()));
        }
        let field = &mut self.fields[index];
        debug!(from = %field.name, to = new_name, "已重命名字段");
        field.name = new_name.to_string();
        Ok(())
    }

    pub fn set_value(&mut self, id: FieldId, new_value: &str) -> Result<(), EngineError> {
        let field = self.field_mut(id)?;
        if let FieldAttributes::Text { value }
        | FieldAttributes::Signature { value }
        | FieldAttributes::Date { value, .. }
        | FieldAttributes::DateTime { value, .. } = &mut field.attributes
        {
            *value = new_value.to_string();
            return Ok(());
        }
        Err(mismatch(field, "value"))
    }

    pub fn set_checked(&mut self, id: FieldId, state: bool) -> Result<(), EngineError> {
        let field = self.field_mut(id)?;
        if let FieldAttributes::Checkbox { checked } = &mut field.attributes {
            *checked = state;
            return Ok(());
        }
        Err(mismatch(field, "checked"))
    }

    pub fn set_date_format(&mut self, id: FieldId, new_format: DateFormat) -> Result<(), EngineError> {
        let field = self.field_mut(id)?;
        if let FieldAttributes::Date { format, .. } | FieldAttributes::DateTime { format, .. } =
            &mut field.attributes
        {
            *format = new_format;
            return Ok(());
        }
        Err(mismatch(field, "date_format"))
    }

    pub fn set_image_path(&mut self, id: FieldId, path: Option<PathBuf>) -> Result<(), EngineError> {
        let field = self.field_mut(id)?;
        if let FieldAttributes::Image { image_path } = &mut field.attributes {
            *image_path = path;
            return Ok(());
        }
        Err(mismatch(field, "image_path"))
    }

    /// 删除字段。重复删除同一 id 不会报错，返回是否真的删除了字段。
    pub fn delete_field(&mut self, id: FieldId) -> bool {
        let Some(index) = self.index_of(id) else {
            return false;
        };
        let removed = self.fields.remove(index);
        if self.selected == Some(id) {
            self.selected = None;
        }
        debug!(id = id.get(), name = %removed.name, "已删除字段");
        true
    }

    /// 清空指定页的全部字段，返回删除数量。
    pub fn clear_page(&mut self, page: usize) -> Result<usize, EngineError> {
        self.check_page(page)?;
        let before = self.fields.len();
        self.fields.retain(|field| field.page != page);
        if self.selected.is_some_and(|id| self.field(id).is_none()) {
            self.selected = None;
        }
        let removed = before - self.fields.len();
        info!(page, removed, "已清空页面字段");
        Ok(removed)
    }

    /// 用扫描得到的控件替换当前集合。逐个分类，不支持或越界的控件跳过并记录诊断，
    /// 整体流程不会中断。
    pub fn load_existing_fields<I>(&mut self, descriptors: I) -> LoadReport
    where
        I: IntoIterator<Item = WidgetDescriptor>,
    {
        self.begin_load();
        let mut report = LoadReport::default();
        for descriptor in descriptors {
            if self.page_size(descriptor.page).is_none() {
                warn!(page = descriptor.page, name = %descriptor.name, "控件页码越界，已跳过");
                report.diagnostics.push(LoadDiagnostic::PageOutOfRange {
                    page: descriptor.page,
                    name: descriptor.name,
                });
                continue;
            }

            let (kind, display_name) =
                match classify_widget(&descriptor.tag, &descriptor.name, &descriptor.value) {
                    WidgetClass::Supported { kind, display_name } => (kind, display_name),
                    WidgetClass::Unsupported { tag } => {
                        warn!(
                            page = descriptor.page,
                            name = %descriptor.name,
                            tag = %tag.describe(),
                            "不支持的控件类型，已跳过"
                        );
                        report.diagnostics.push(LoadDiagnostic::UnsupportedWidget {
                            page: descriptor.page,
                            name: descriptor.name,
                            tag: tag.describe(),
                        });
                        continue;
                    }
                };

            let Some(rect) =
                self.admit_rect(descriptor.page, &descriptor.name, descriptor.rect, &mut report)
            else {
                continue;
            };
            let name = self.admit_name(kind, display_name, &mut report);
            let attributes = attributes_from_widget(kind, &name, &descriptor.value);
            let id = self.allocate_id();
            let mut field = FormField::new(id, name, descriptor.page, rect, attributes);
            field.origin_name = Some(descriptor.name);
            self.fields.push(field);
            report.loaded += 1;
        }

        info!(
            loaded = report.loaded,
            skipped = report.skipped(),
            "已加载已有表单字段"
        );
        report
    }

    /// 导入布局文件中的字段并替换当前集合。id 重新分配，属性原样保留，
    /// 页码、矩形与重名的处理与加载控件相同。
    pub fn import_fields<I>(&mut self, fields: I) -> LoadReport
    where
        I: IntoIterator<Item = FormField>,
    {
        self.begin_load();
        let mut report = LoadReport::default();
        for field in fields {
            let Some(rect) = self.admit_rect(field.page, &field.name, field.rect, &mut report) else {
                continue;
            };
            let kind = field.kind();
            let name = self.admit_name(kind, field.name, &mut report);
            let id = self.allocate_id();
            let mut imported = FormField::new(id, name, field.page, rect, field.attributes);
            imported.origin_name = field.origin_name;
            self.fields.push(imported);
            report.loaded += 1;
        }

        info!(
            loaded = report.loaded,
            skipped = report.skipped(),
            "已导入字段布局"
        );
        report
    }

    fn begin_load(&mut self) {
        self.fields.clear();
        self.selected = None;
        self.name_counters.clear();
    }

    /// 页码与矩形检查：越界页、非有限坐标或钳制后退化的矩形返回 `None` 并记录诊断。
    fn admit_rect(
        &self,
        page: usize,
        name: &str,
        rect: PdfRect,
        report: &mut LoadReport,
    ) -> Option<PdfRect> {
        let Some(page_size) = self.page_size(page) else {
            warn!(page, name, "字段页码越界，已跳过");
            report.diagnostics.push(LoadDiagnostic::PageOutOfRange {
                page,
                name: name.to_string(),
            });
            return None;
        };
        let finite = rect.0.to_array().iter().all(|value| value.is_finite());
        let clamped = clamp_to_page(rect, page_size);
        if !finite || !clamped.0.is_valid() {
            warn!(page, name, "字段矩形无效，已跳过");
            report.diagnostics.push(LoadDiagnostic::InvalidRect {
                page,
                name: name.to_string(),
            });
            return None;
        }
        Some(clamped)
    }

    /// 空名取默认名，重名追加 `_n` 并记录重命名。
    fn admit_name(&mut self, kind: FieldKind, name: String, report: &mut LoadReport) -> String {
        if name.is_empty() {
            return self.next_default_name(kind);
        }
        if reserved_prefix_clash(kind, &name).is_some() {
            let renamed = self.next_default_name(kind);
            warn!(from = %name, to = %renamed, "名称使用了保留前缀，已改名");
            report.diagnostics.push(LoadDiagnostic::Renamed {
                from: name,
                to: renamed.clone(),
            });
            return renamed;
        }
        if !self.name_taken(&name) {
            return name;
        }
        let unique = self.unique_name(&name);
        report.diagnostics.push(LoadDiagnostic::Renamed {
            from: name,
            to: unique.clone(),
        });
        unique
    }

    /// 保存用的只读导出：矩形再次钳制，均为 PDF 空间，不含画布缓存。
    pub fn export_fields(&self) -> Vec<FormField> {
        self.fields
            .iter()
            .map(|field| {
                let mut exported = field.clone();
                if let Some(page_size) = self.page_size(field.page) {
                    exported.rect = clamp_to_page(field.rect, page_size);
                }
                exported.canvas_rect = None;
                exported
            })
            .collect()
    }

    pub fn snapshot(&self) -> FieldSnapshot {
        FieldSnapshot {
            fields: self.fields.clone(),
            selected: self.selected,
            current_page: self.current_page,
        }
    }

    /// 恢复快照。id 计数与命名计数器不回退，保证 id 永不复用。
    pub fn restore(&mut self, snapshot: FieldSnapshot) {
        self.fields = snapshot.fields;
        self.current_page = snapshot.current_page.min(self.pages.len().saturating_sub(1));
        self.selected = snapshot
            .selected
            .filter(|id| self.fields.iter().any(|field| field.id == *id));
    }

    fn check_page(&self, page: usize) -> Result<PageSize, EngineError> {
        self.page_size(page).ok_or(EngineError::PageOutOfRange {
            page,
            page_count: self.pages.len(),
        })
    }

    fn index_of(&self, id: FieldId) -> Option<usize> {
        self.fields.iter().position(|field| field.id == id)
    }

    fn field_mut(&mut self, id: FieldId) -> Result<&mut FormField, EngineError> {
        self.fields
            .iter_mut()
            .find(|field| field.id == id)
            .ok_or(EngineError::FieldNotFound(id.get()))
    }

    fn allocate_id(&mut self) -> FieldId {
        let id = FieldId::new(self.next_id);
        self.next_id += 1;
        id
    }

    fn name_taken(&self, name: &str) -> bool {
        self.fields.iter().any(|field| field.name == name)
    }

    /// `"{kind}_{n}"`，计数器按类型递增并跳过已占用的名称。
    fn next_default_name(&mut self, kind: FieldKind) -> String {
        loop {
            let counter = self.name_counters.entry(kind).or_insert(0);
            *counter += 1;
            let candidate = format!("{kind}_{counter}");
            if !self.name_taken(&candidate) {
                return candidate;
            }
        }
    }

    fn unique_name(&self, base: &str) -> String {
        (1u32..)
            .map(|n| format!("{base}_{n}"))
            .find(|candidate| !self.name_taken(candidate))
            .unwrap_or_else(|| base.to_string())
    }

    /// `"{name}_copy_{n}"`；源名称本身是副本时沿用其主干，避免 `_copy_1_copy_1`。
    fn copy_name(&self, source: &str) -> String {
        let stem = source
            .rfind(COPY_MARKER)
            .filter(|index| {
                let suffix = &source[index + COPY_MARKER.len()..];
                !suffix.is_empty() && suffix.chars().all(|c| c.is_ascii_digit())
            })
            .map_or(source, |index| &source[..index]);
        (1u32..)
            .map(|n| format!("{stem}{COPY_MARKER}{n}"))
            .find(|candidate| !self.name_taken(candidate))
            .unwrap_or_else(|| format!("{stem}{COPY_MARKER}{}", self.next_id))
    }
}

fn mismatch(field: &FormField, attribute: &'static str) -> EngineError {
    EngineError::AttributeMismatch {
        field: field.name.clone(),
        kind: field.kind(),
        attribute,
    }
}

fn attributes_from_widget(kind: FieldKind, name: &str, value: &str) -> FieldAttributes {
    match kind {
        FieldKind::Text => FieldAttributes::Text {
            value: value.to_string(),
        },
        FieldKind::Checkbox => FieldAttributes::Checkbox {
            checked: !value.is_empty() && !value.eq_ignore_ascii_case("off"),
        },
        FieldKind::Signature => FieldAttributes::Signature {
            value: value.to_string(),
        },
        FieldKind::Image => FieldAttributes::Image {
            image_path: (!value.is_empty()).then(|| PathBuf::from(value)),
        },
        FieldKind::Date => FieldAttributes::Date {
            format: infer_date_format(name, value),
            value: value.to_string(),
        },
        FieldKind::DateTime => FieldAttributes::DateTime {
            format: infer_date_format(name, value),
            value: value.to_string(),
        },
    }
}
