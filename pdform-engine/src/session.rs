use std::mem;

use pdform_core::form::{FieldId, FieldKind, FormField};
use pdform_core::geometry::{PageSize, Point2, Vector2};
use pdform_core::widget::WidgetDescriptor;
use tracing::{debug, warn};

use crate::command::{CommandBus, CommandContext, CommandRequest, CommandResponse};
use crate::errors::EngineError;
use crate::history::History;
use crate::manager::{Clipboard, FieldManager, FieldSnapshot, LoadReport, ResizeHandle};
use crate::settings::EditorSettings;
use crate::zoom::ZoomState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerButton {
    Primary,
    Middle,
    Secondary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
}

impl Modifiers {
    pub const NONE: Modifiers = Modifiers {
        shift: false,
        ctrl: false,
    };
    pub const SHIFT: Modifiers = Modifiers {
        shift: true,
        ctrl: false,
    };
    pub const CTRL: Modifiers = Modifiers {
        shift: false,
        ctrl: true,
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Up,
    Down,
    Left,
    Right,
    Delete,
    Backspace,
    Escape,
    Char(char),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyInput {
    pub key: Key,
    pub modifiers: Modifiers,
}

impl KeyInput {
    pub fn new(key: Key, modifiers: Modifiers) -> Self {
        Self { key, modifiers }
    }
}

/// 指针按下后的处理结果，供前端决定光标与重绘。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerOutcome {
    Ignored,
    Selected(FieldId),
    Created(FieldId),
    ResizeStarted(FieldId, ResizeHandle),
    PanStarted,
    SelectionCleared,
}

#[derive(Debug, Clone)]
enum PointerState {
    Idle,
    Dragging {
        id: FieldId,
        last: Point2,
        before: FieldSnapshot,
    },
    Resizing {
        id: FieldId,
        handle: ResizeHandle,
        before: FieldSnapshot,
    },
    Panning {
        last: Point2,
    },
}

/// 把按键映射为命令请求。未绑定的按键返回 `None`。
pub fn command_for_key(input: &KeyInput) -> Option<CommandRequest> {
    let KeyInput { key, modifiers } = *input;
    let nudge = |direction: &str| {
        let mut args = vec![direction.to_string()];
        if modifiers.shift {
            args.push("large".to_string());
        }
        CommandRequest::with_args("nudge", args)
    };
    let request = match key {
        Key::Up => nudge("up"),
        Key::Down => nudge("down"),
        Key::Left => nudge("left"),
        Key::Right => nudge("right"),
        Key::Delete | Key::Backspace => CommandRequest::new("delete_selected"),
        Key::Escape => CommandRequest::new("clear_selection"),
        Key::Char('+') | Key::Char('=') => CommandRequest::new("zoom_in"),
        Key::Char('-') => CommandRequest::new("zoom_out"),
        Key::Char(c) if modifiers.ctrl => match c.to_ascii_lowercase() {
            'c' => CommandRequest::new("copy"),
            'v' => CommandRequest::new("paste"),
            'd' => CommandRequest::new("duplicate_selected"),
            'z' if modifiers.shift => CommandRequest::new("redo"),
            'z' => CommandRequest::new("undo"),
            'y' => CommandRequest::new("redo"),
            '0' => CommandRequest::new("zoom_reset"),
            _ => return None,
        },
        Key::Char(_) => return None,
    };
    Some(request)
}

/// 单个文档的编辑会话：持有字段集合、缩放、剪贴板与撤销历史，
/// 并把画布输入事件翻译为字段操作。
pub struct EditorSession {
    manager: FieldManager,
    zoom: ZoomState,
    clipboard: Clipboard,
    history: History<FieldSnapshot>,
    bus: CommandBus,
    tool: Option<FieldKind>,
    pointer: PointerState,
}

impl EditorSession {
    pub fn new(pages: Vec<PageSize>, settings: EditorSettings) -> Self {
        Self {
            manager: FieldManager::new(pages, settings),
            zoom: ZoomState::new(&settings),
            clipboard: Clipboard::new(),
            history: History::new(settings.history_limit),
            bus: CommandBus::new(),
            tool: None,
            pointer: PointerState::Idle,
        }
    }

    #[inline]
    pub fn manager(&self) -> &FieldManager {
        &self.manager
    }

    #[inline]
    pub fn zoom(&self) -> &ZoomState {
        &self.zoom
    }

    #[inline]
    pub fn clipboard(&self) -> &Clipboard {
        &self.clipboard
    }

    #[inline]
    pub fn history(&self) -> &History<FieldSnapshot> {
        &self.history
    }

    #[inline]
    pub fn tool(&self) -> Option<FieldKind> {
        self.tool
    }

    /// 选择绘制工具；`None` 表示选择模式。
    pub fn set_tool(&mut self, tool: Option<FieldKind>) {
        self.tool = tool;
    }

    #[inline]
    pub fn is_idle(&self) -> bool {
        matches!(self.pointer, PointerState::Idle)
    }

    /// 打开新文档：清空字段、历史并重置缩放。剪贴板跨文档保留。
    pub fn open_document(&mut self, pages: Vec<PageSize>) {
        self.manager.reset_document(pages);
        self.history.clear();
        self.zoom.reset();
        self.pointer = PointerState::Idle;
    }

    pub fn load_existing_fields<I>(&mut self, descriptors: I) -> LoadReport
    where
        I: IntoIterator<Item = WidgetDescriptor>,
    {
        let report = self.manager.load_existing_fields(descriptors);
        self.history.clear();
        self.manager.refresh_canvas_cache(&self.zoom);
        report
    }

    /// 从布局文件恢复字段，同样清空撤销历史。
    pub fn import_fields<I>(&mut self, fields: I) -> LoadReport
    where
        I: IntoIterator<Item = FormField>,
    {
        let report = self.manager.import_fields(fields);
        self.history.clear();
        self.manager.refresh_canvas_cache(&self.zoom);
        report
    }

    pub fn set_current_page(&mut self, page: usize) -> Result<(), EngineError> {
        self.manager.set_current_page(page)?;
        self.pointer = PointerState::Idle;
        self.manager.refresh_canvas_cache(&self.zoom);
        Ok(())
    }

    pub fn export_fields(&self) -> Vec<FormField> {
        self.manager.export_fields()
    }

    pub fn dispatch(&mut self, request: &CommandRequest) -> CommandResponse {
        let mut context = CommandContext {
            manager: &mut self.manager,
            zoom: &mut self.zoom,
            clipboard: &mut self.clipboard,
            history: &mut self.history,
        };
        let response = self.bus.dispatch(request, &mut context);
        debug!(
            command = %request.name,
            success = response.success,
            message = response.message.as_deref().unwrap_or_default(),
            "命令已执行"
        );
        response
    }

    /// 按键：Escape 额外退出绘制工具。
    pub fn key(&mut self, input: KeyInput) -> Option<CommandResponse> {
        if input.key == Key::Escape {
            self.tool = None;
            self.pointer = PointerState::Idle;
        }
        let request = command_for_key(&input)?;
        Some(self.dispatch(&request))
    }

    /// 重命名字段并写入撤销记录。
    pub fn rename_field(&mut self, id: FieldId, new_name: &str) -> Result<(), EngineError> {
        self.record_edit(id, "Rename", |manager| manager.rename_field(id, new_name))
    }

    /// 属性编辑（取值、勾选、日期格式、图片路径）。字段确有变化时写入一条撤销记录，
    /// 与手势一样会清空重做栈；失败时不记录。
    pub fn edit_field<F>(&mut self, id: FieldId, edit: F) -> Result<(), EngineError>
    where
        F: FnOnce(&mut FieldManager) -> Result<(), EngineError>,
    {
        self.record_edit(id, "Edit", edit)
    }

    fn record_edit<F>(&mut self, id: FieldId, verb: &str, edit: F) -> Result<(), EngineError>
    where
        F: FnOnce(&mut FieldManager) -> Result<(), EngineError>,
    {
        let before = self.manager.snapshot();
        edit(&mut self.manager)?;
        if before == self.manager.snapshot() {
            return Ok(());
        }
        let name = self
            .manager
            .field(id)
            .map(|field| field.name.clone())
            .unwrap_or_default();
        let label = format!("{verb} field '{name}'");
        debug!(label = %label, "字段编辑已提交");
        self.history.record(label, before);
        self.manager.refresh_canvas_cache(&self.zoom);
        Ok(())
    }

    /// 指针按下：命中选中字段的手柄开始缩放，命中字段开始拖动，
    /// 空白处在有绘制工具时创建字段，否则清空选中。
    pub fn pointer_down(
        &mut self,
        point: Point2,
        button: PointerButton,
    ) -> Result<PointerOutcome, EngineError> {
        match button {
            PointerButton::Middle => {
                self.pointer = PointerState::Panning { last: point };
                return Ok(PointerOutcome::PanStarted);
            }
            PointerButton::Secondary => return Ok(PointerOutcome::Ignored),
            PointerButton::Primary => {}
        }

        let handle_hit = self
            .manager
            .handle_at(point, &self.zoom)
            .zip(self.manager.selected_id());
        if let Some((handle, id)) = handle_hit {
            self.pointer = PointerState::Resizing {
                id,
                handle,
                before: self.manager.snapshot(),
            };
            return Ok(PointerOutcome::ResizeStarted(id, handle));
        }

        if let Some(id) = self.manager.select_field_at(point, &self.zoom).map(|field| field.id) {
            self.pointer = PointerState::Dragging {
                id,
                last: point,
                before: self.manager.snapshot(),
            };
            return Ok(PointerOutcome::Selected(id));
        }

        let Some(kind) = self.tool else {
            return Ok(PointerOutcome::SelectionCleared);
        };
        let before = self.manager.snapshot();
        let page = self.manager.current_page();
        let (id, name) = {
            let field = self.manager.create_field(kind, point, page, &self.zoom)?;
            (field.id, field.name.clone())
        };
        self.history.record(format!("Add field '{name}'"), before);
        self.manager.select(id)?;
        self.tool = None;
        Ok(PointerOutcome::Created(id))
    }

    /// 拖动/缩放预览：直接修改 PDF 空间矩形。返回是否有字段或视图发生变化。
    pub fn pointer_move(&mut self, point: Point2) -> bool {
        match &mut self.pointer {
            PointerState::Idle => false,
            PointerState::Dragging { id, last, .. } => {
                let delta = Vector2::from_points(*last, point);
                *last = point;
                self.manager.move_field(*id, delta.x(), delta.y(), &self.zoom)
            }
            PointerState::Resizing { id, handle, .. } => {
                self.manager.resize_field(*id, *handle, point, &self.zoom)
            }
            PointerState::Panning { last } => {
                let delta = Vector2::from_points(*last, point);
                *last = point;
                self.zoom.pan_by(delta);
                self.manager.refresh_canvas_cache(&self.zoom);
                true
            }
        }
    }

    /// 指针抬起：提交手势。字段确有变化时写入一条撤销记录并返回其标签。
    pub fn pointer_up(&mut self, point: Point2) -> Option<String> {
        self.pointer_move(point);
        let (id, verb, before) = match mem::replace(&mut self.pointer, PointerState::Idle) {
            PointerState::Dragging { id, before, .. } => (id, "Move", before),
            PointerState::Resizing { id, before, .. } => (id, "Resize", before),
            PointerState::Idle | PointerState::Panning { .. } => return None,
        };
        if before == self.manager.snapshot() {
            return None;
        }
        let Some(field) = self.manager.field(id) else {
            warn!(id = id.get(), "手势结束时字段已不存在");
            return None;
        };
        let label = format!("{verb} field '{}'", field.name);
        debug!(label = %label, rect = ?field.rect.0.to_array(), "手势已提交");
        self.history.record(label.clone(), before);
        Some(label)
    }
}
