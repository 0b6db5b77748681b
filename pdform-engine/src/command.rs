use std::collections::HashMap;

use pdform_core::geometry::Vector2;

use crate::history::History;
use crate::manager::{Clipboard, FieldManager, FieldSnapshot, NudgeDirection};
use crate::zoom::ZoomState;

#[derive(Debug, Clone)]
pub struct CommandRequest {
    pub name: String,
    pub args: Vec<String>,
}

impl CommandRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
        }
    }

    pub fn with_args<I, S>(name: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CommandResponse {
    pub success: bool,
    pub message: Option<String>,
}

impl CommandResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
        }
    }
}

pub trait CommandHandler: Send + Sync {
    fn name(&self) -> &'static str;
    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse;
}

/// 命令执行时可访问的会话状态。
pub struct CommandContext<'a> {
    pub manager: &'a mut FieldManager,
    pub zoom: &'a mut ZoomState,
    pub clipboard: &'a mut Clipboard,
    pub history: &'a mut History<FieldSnapshot>,
}

impl CommandContext<'_> {
    /// 执行一次可能修改字段集合的操作；只有集合确实变化时才写入撤销记录。
    fn record_if_changed<F>(&mut self, label: impl Into<String>, mutate: F) -> bool
    where
        F: FnOnce(&mut FieldManager, &ZoomState, &mut Clipboard) -> bool,
    {
        let before = self.manager.snapshot();
        let changed = mutate(&mut *self.manager, &*self.zoom, &mut *self.clipboard);
        if changed && before != self.manager.snapshot() {
            self.history.record(label, before);
        }
        changed
    }

    fn redraw(&mut self) {
        self.manager.refresh_canvas_cache(&*self.zoom);
    }
}

pub struct CommandBus {
    handlers: HashMap<&'static str, Box<dyn CommandHandler>>,
}

impl CommandBus {
    pub fn new() -> Self {
        let mut bus = Self {
            handlers: HashMap::new(),
        };
        bus.register(ClearSelectionCommand);
        bus.register(DeleteSelectedCommand);
        bus.register(DuplicateSelectedCommand);
        bus.register(CopyCommand);
        bus.register(PasteCommand);
        bus.register(NudgeCommand);
        bus.register(ZoomInCommand);
        bus.register(ZoomOutCommand);
        bus.register(ZoomResetCommand);
        bus.register(FitCommand);
        bus.register(ClearPageCommand);
        bus.register(UndoCommand);
        bus.register(RedoCommand);
        bus
    }

    pub fn register<H: CommandHandler + 'static>(&mut self, handler: H) {
        self.handlers.insert(handler.name(), Box::new(handler));
    }

    pub fn dispatch(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        if let Some(handler) = self.handlers.get(request.name.as_str()) {
            handler.execute(request, context)
        } else {
            CommandResponse::err(format!("未知命令: {}", request.name))
        }
    }

    pub fn available_commands(&self) -> impl Iterator<Item = &&'static str> {
        self.handlers.keys()
    }
}

impl Default for CommandBus {
    fn default() -> Self {
        Self::new()
    }
}

struct ClearSelectionCommand;

impl CommandHandler for ClearSelectionCommand {
    fn name(&self) -> &'static str {
        "clear_selection"
    }

    fn execute(
        &self,
        _request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        context.manager.clear_selection();
        CommandResponse::ok("选中已清空")
    }
}

struct DeleteSelectedCommand;

impl CommandHandler for DeleteSelectedCommand {
    fn name(&self) -> &'static str {
        "delete_selected"
    }

    fn execute(
        &self,
        _request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        let Some(field) = context.manager.selected() else {
            return CommandResponse::err("没有选中的字段");
        };
        let (id, name) = (field.id, field.name.clone());
        context.record_if_changed(format!("Delete field '{name}'"), |manager, _, _| {
            manager.delete_field(id)
        });
        CommandResponse::ok(format!("已删除字段 {name}"))
    }
}

struct DuplicateSelectedCommand;

impl CommandHandler for DuplicateSelectedCommand {
    fn name(&self) -> &'static str {
        "duplicate_selected"
    }

    fn execute(
        &self,
        _request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        let Some(field) = context.manager.selected() else {
            return CommandResponse::err("没有选中的字段");
        };
        let (id, name) = (field.id, field.name.clone());
        let duplicated = context.record_if_changed(format!("Duplicate field '{name}'"), |manager, _, _| {
            manager.duplicate_field(id).is_some()
        });
        match context.manager.selected().filter(|_| duplicated) {
            Some(copy) => CommandResponse::ok(format!("已复制字段 {name} 为 {}", copy.name)),
            None => CommandResponse::err(format!("无法复制字段 {name}")),
        }
    }
}

struct CopyCommand;

impl CommandHandler for CopyCommand {
    fn name(&self) -> &'static str {
        "copy"
    }

    fn execute(
        &self,
        _request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        if context.manager.copy_selected(context.clipboard) {
            CommandResponse::ok("已复制到剪贴板")
        } else {
            CommandResponse::err("没有选中的字段")
        }
    }
}

struct PasteCommand;

impl CommandHandler for PasteCommand {
    fn name(&self) -> &'static str {
        "paste"
    }

    fn execute(
        &self,
        _request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        if context.clipboard.is_empty() {
            return CommandResponse::err("剪贴板为空");
        }
        let pasted = context.record_if_changed("Paste field", |manager, _, clipboard| {
            manager.paste(clipboard).is_some()
        });
        match context.manager.selected().filter(|_| pasted) {
            Some(field) => CommandResponse::ok(format!("已粘贴字段 {}", field.name)),
            None => CommandResponse::err("粘贴失败"),
        }
    }
}

struct NudgeCommand;

impl CommandHandler for NudgeCommand {
    fn name(&self) -> &'static str {
        "nudge"
    }

    /// 参数：`<up|down|left|right> [large]`。
    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        let Some(direction) = request
            .args
            .first()
            .and_then(|arg| NudgeDirection::parse(arg))
        else {
            return CommandResponse::err("用法: nudge <up|down|left|right> [large]");
        };
        let large = request.args.get(1).is_some_and(|arg| arg == "large");
        let Some(name) = context.manager.selected().map(|field| field.name.clone()) else {
            return CommandResponse::err("没有选中的字段");
        };
        context.record_if_changed(format!("Move field '{name}'"), |manager, zoom, _| {
            manager.nudge_selected(direction, large, zoom)
        });
        CommandResponse::ok(format!("已向 {} 微调字段 {name}", direction.as_str()))
    }
}

struct ZoomInCommand;

impl CommandHandler for ZoomInCommand {
    fn name(&self) -> &'static str {
        "zoom_in"
    }

    fn execute(
        &self,
        _request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        context.zoom.zoom_in();
        context.redraw();
        CommandResponse::ok(format!("缩放 {}", context.zoom.percentage()))
    }
}

struct ZoomOutCommand;

impl CommandHandler for ZoomOutCommand {
    fn name(&self) -> &'static str {
        "zoom_out"
    }

    fn execute(
        &self,
        _request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        context.zoom.zoom_out();
        context.redraw();
        CommandResponse::ok(format!("缩放 {}", context.zoom.percentage()))
    }
}

struct ZoomResetCommand;

impl CommandHandler for ZoomResetCommand {
    fn name(&self) -> &'static str {
        "zoom_reset"
    }

    fn execute(
        &self,
        _request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        context.zoom.reset();
        context.redraw();
        CommandResponse::ok(format!("缩放 {}", context.zoom.percentage()))
    }
}

struct FitCommand;

impl CommandHandler for FitCommand {
    fn name(&self) -> &'static str {
        "fit"
    }

    /// 参数：画布宽高（像素）。
    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        let size: Vec<f64> = request
            .args
            .iter()
            .filter_map(|arg| arg.parse::<f64>().ok())
            .collect();
        let [width, height] = size.as_slice() else {
            return CommandResponse::err("用法: fit <canvas_width> <canvas_height>");
        };
        let Some(page) = context.manager.page_size(context.manager.current_page()) else {
            return CommandResponse::err("文档没有页面");
        };
        context.zoom.fit_to_window(Vector2::new(*width, *height), page);
        context.redraw();
        CommandResponse::ok(format!("适应窗口 {}", context.zoom.percentage()))
    }
}

struct ClearPageCommand;

impl CommandHandler for ClearPageCommand {
    fn name(&self) -> &'static str {
        "clear_page"
    }

    fn execute(
        &self,
        _request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        let page = context.manager.current_page();
        let mut outcome = Ok(0);
        context.record_if_changed(format!("Clear page {}", page + 1), |manager, _, _| {
            outcome = manager.clear_page(page);
            matches!(outcome, Ok(removed) if removed > 0)
        });
        match outcome {
            Ok(removed) => CommandResponse::ok(format!("已清空第 {} 页的 {removed} 个字段", page + 1)),
            Err(error) => CommandResponse::err(error.to_string()),
        }
    }
}

struct UndoCommand;

impl CommandHandler for UndoCommand {
    fn name(&self) -> &'static str {
        "undo"
    }

    fn execute(
        &self,
        _request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        let current = context.manager.snapshot();
        match context.history.undo(current) {
            Some((label, state)) => {
                context.manager.restore(state);
                context.redraw();
                CommandResponse::ok(format!("已撤销: {label}"))
            }
            None => CommandResponse::err("没有可撤销的操作"),
        }
    }
}

struct RedoCommand;

impl CommandHandler for RedoCommand {
    fn name(&self) -> &'static str {
        "redo"
    }

    fn execute(
        &self,
        _request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        let current = context.manager.snapshot();
        match context.history.redo(current) {
            Some((label, state)) => {
                context.manager.restore(state);
                context.redraw();
                CommandResponse::ok(format!("已重做: {label}"))
            }
            None => CommandResponse::err("没有可重做的操作"),
        }
    }
}
