use std::path::PathBuf;

use glam::DVec2;
use pdform_config::AppConfig;
use pdform_core::form::{FieldId, FieldKind, FormField};
use pdform_core::geometry::{Point2, Vector2};
use pdform_core::widget::{FieldValue, FilledValue, encode_widget_name};
use pdform_engine::command::{CommandRequest, CommandResponse};
use pdform_engine::manager::{FieldManager, LoadReport};
use pdform_engine::session::{EditorSession, Key, KeyInput, Modifiers, PointerButton, PointerOutcome};
use pdform_io::{Layout, load_layout, save_layout};
use tracing::{info, warn};

use crate::errors::FrontendError;
use crate::loader::{DocumentSource, load_document};
use crate::settings::editor_settings;

/// 演示脚本假定的画布尺寸（像素）。
const DEMO_CANVAS: DVec2 = DVec2::new(1000.0, 800.0);

/// 命令行中与文档相关的参数。
#[derive(Debug, Clone, Default)]
pub struct CliOptions {
    pub input: Option<PathBuf>,
    pub output: Option<PathBuf>,
    /// 制作模式的 JSON 布局：存在则先导入，结束时写回。
    pub layout: Option<PathBuf>,
    /// 填写模式的 `名称=取值` 赋值。
    pub assignments: Vec<String>,
}

#[derive(Debug)]
pub struct MakerSummary {
    pub source: DocumentSource,
    pub report: LoadReport,
    pub fields: Vec<FormField>,
    pub undo_label: Option<String>,
}

#[derive(Debug)]
pub struct FillerSummary {
    pub source: DocumentSource,
    pub report: LoadReport,
    pub filled: Vec<FilledValue>,
}

/// 制作模式：加载文档与已有字段，以画布事件演示放置、缩放、拖动与复制，
/// 随后按参数保存 PDF 与布局。
pub fn run_maker(config: &AppConfig, options: &CliOptions) -> Result<MakerSummary, FrontendError> {
    let loaded = load_document(options.input.as_deref())?;
    let mut backend = loaded.backend;
    let mut session = EditorSession::new(backend.page_sizes(), editor_settings(&config.editor));

    let existing_layout = options.layout.as_deref().filter(|path| path.exists());
    let report = match existing_layout {
        Some(path) => {
            info!(path = %path.display(), "从布局文件导入字段");
            session.import_fields(load_layout(path)?.fields)
        }
        None => session.load_existing_fields(backend.scan_all_widgets()?),
    };

    println!("PDF 表单制作演示");
    print_report(&loaded.source, &report);
    run_demo_script(&mut session)?;
    print_fields(&session);

    let undo_label = session.history().undo_label().map(str::to_string);
    if let Some(label) = &undo_label {
        println!("可撤销: {label}");
    }

    let fields = session.export_fields();
    if let Some(output) = &options.output {
        backend.write_widgets(&fields, output)?;
        println!("已保存表单: {}", output.display());
    }
    if let Some(path) = &options.layout {
        save_layout(path, &Layout::new(backend.page_sizes(), fields.clone()))?;
        println!("已保存布局: {}", path.display());
    }

    Ok(MakerSummary {
        source: loaded.source,
        report,
        fields,
        undo_label,
    })
}

/// 填写模式：列出已有字段，并把 `名称=取值` 写回对应控件。
pub fn run_filler(config: &AppConfig, options: &CliOptions) -> Result<FillerSummary, FrontendError> {
    let loaded = load_document(options.input.as_deref())?;
    let mut backend = loaded.backend;
    let mut manager = FieldManager::new(backend.page_sizes(), editor_settings(&config.editor));
    let report = manager.load_existing_fields(backend.scan_all_widgets()?);

    println!("PDF 表单填写");
    print_report(&loaded.source, &report);
    println!("可填写的字段：");
    for field in manager.fields() {
        println!(
            "  - {} [{}] 第 {} 页, 当前值={:?}",
            field.name,
            field.kind(),
            field.page + 1,
            field.attributes.display_value()
        );
    }

    let filled = options
        .assignments
        .iter()
        .map(|assignment| filled_value(&manager, assignment))
        .collect::<Result<Vec<_>, _>>()?;

    if !filled.is_empty() {
        let output = options.output.as_ref().ok_or(FrontendError::MissingOutput)?;
        backend.fill_widgets(&filled, output)?;
        println!("已填写 {} 个字段并保存到 {}", filled.len(), output.display());
    }

    Ok(FillerSummary {
        source: loaded.source,
        report,
        filled,
    })
}

/// 模拟一次画布操作：适应窗口后放置文本与日期字段，放大后拖动日期字段，
/// 再复制、微调并撤销微调。
fn run_demo_script(session: &mut EditorSession) -> Result<(), FrontendError> {
    dispatch(
        session,
        CommandRequest::with_args(
            "fit",
            [DEMO_CANVAS.x.to_string(), DEMO_CANVAS.y.to_string()],
        ),
    );

    place(session, FieldKind::Text, Point2::new(72.0, 650.0))?;
    dispatch(session, CommandRequest::new("zoom_in"));
    let Some(date) = place(session, FieldKind::Date, Point2::new(300.0, 650.0))? else {
        return Ok(());
    };

    let transformer = session.zoom().transformer();
    let Some(center) = session.manager().field(date).map(|field| field.rect.0.center()) else {
        return Ok(());
    };
    let grab = transformer.to_canvas_point(center);
    if session.pointer_down(grab, PointerButton::Primary)? == PointerOutcome::Selected(date) {
        let drop = grab.translate(Vector2::from(DVec2::new(40.0, 0.0)));
        session.pointer_move(drop);
        if let Some(label) = session.pointer_up(drop) {
            println!("[手势] {label}");
        }
    }

    let ctrl = |c| KeyInput::new(Key::Char(c), Modifiers::CTRL);
    for input in [
        ctrl('d'),
        KeyInput::new(Key::Up, Modifiers::SHIFT),
        ctrl('z'),
    ] {
        if let Some(response) = session.key(input) {
            report_response(&response);
        }
    }
    Ok(())
}

/// 在 PDF 点对应的画布位置用绘制工具点击一次，返回新字段 id。
fn place(
    session: &mut EditorSession,
    kind: FieldKind,
    pdf_point: Point2,
) -> Result<Option<FieldId>, FrontendError> {
    let canvas = session.zoom().transformer().to_canvas_point(pdf_point);
    session.set_tool(Some(kind));
    let outcome = session.pointer_down(canvas, PointerButton::Primary)?;
    session.pointer_up(canvas);
    match outcome {
        PointerOutcome::Created(id) => Ok(Some(id)),
        other => {
            warn!(?kind, ?other, "放置位置已有字段，未创建");
            session.set_tool(None);
            Ok(None)
        }
    }
}

fn dispatch(session: &mut EditorSession, request: CommandRequest) {
    let response = session.dispatch(&request);
    report_response(&response);
}

fn report_response(response: &CommandResponse) {
    let Some(message) = &response.message else {
        return;
    };
    if response.success {
        println!("[命令] {message}");
    } else {
        warn!("CLI 命令执行失败: {message}");
    }
}

fn print_report(source: &DocumentSource, report: &LoadReport) {
    println!("文档来源：{source}");
    println!("已加载 {} 个字段，跳过 {} 个", report.loaded, report.skipped());
    for diagnostic in &report.diagnostics {
        println!("  ! {diagnostic}");
    }
}

fn print_fields(session: &EditorSession) {
    let manager = session.manager();
    println!(
        "缩放={}, 当前第 {} 页 / 共 {} 页",
        session.zoom().percentage(),
        manager.current_page() + 1,
        manager.page_count()
    );
    println!("当前字段：");
    for field in manager.fields() {
        let [x0, y0, x1, y1] = field.rect.0.to_array();
        let canvas = if field.page == manager.current_page() {
            manager
                .get_canvas_rect(field.id, session.zoom())
                .map(|rect| {
                    let [cx0, cy0, cx1, cy1] = rect.0.to_array();
                    format!(" 画布=({cx0:.1}, {cy0:.1}, {cx1:.1}, {cy1:.1})")
                })
                .unwrap_or_default()
        } else {
            String::new()
        };
        let marker = if manager.selected_id() == Some(field.id) {
            "*"
        } else {
            "-"
        };
        println!(
            "  {marker} #{} {} [{}] 第 {} 页 PDF=({x0:.1}, {y0:.1}, {x1:.1}, {y1:.1}){canvas}",
            field.id.get(),
            field.name,
            field.kind(),
            field.page + 1
        );
    }
}

/// 解析 `名称=取值`。控件名优先使用加载时的原始名称，复选框取值按真值词解析。
fn filled_value(manager: &FieldManager, assignment: &str) -> Result<FilledValue, FrontendError> {
    let Some((name, value)) = assignment.split_once('=') else {
        return Err(FrontendError::InvalidAssignment(assignment.to_string()));
    };
    let name = name.trim();
    if name.is_empty() {
        return Err(FrontendError::InvalidAssignment(assignment.to_string()));
    }
    let field = manager
        .field_by_name(name)
        .ok_or_else(|| FrontendError::UnknownField(name.to_string()))?;

    let widget_name = field
        .origin_name
        .clone()
        .unwrap_or_else(|| encode_widget_name(field.kind(), &field.name));
    let value = match field.kind() {
        FieldKind::Checkbox => FieldValue::Checked(matches!(
            value.trim().to_ascii_lowercase().as_str(),
            "yes" | "true" | "on" | "1" | "x"
        )),
        _ => FieldValue::Text(value.to_string()),
    };
    Ok(FilledValue {
        page: field.page,
        widget_name,
        value,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn demo_options() -> CliOptions {
        CliOptions::default()
    }

    #[test]
    fn maker_script_places_and_saves_layout() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let layout = dir.path().join("layout.json");
        let options = CliOptions {
            layout: Some(layout.clone()),
            ..demo_options()
        };

        let summary = run_maker(&AppConfig::default(), &options).expect("run maker");
        assert_eq!(summary.source, DocumentSource::Demo);
        assert_eq!(summary.report.loaded, 4);
        let names: Vec<&str> = summary.fields.iter().map(|field| field.name.as_str()).collect();
        assert!(names.contains(&"text_1"));
        assert!(names.contains(&"date_1"));
        assert!(names.contains(&"date_1_copy_1"));
        assert_eq!(summary.undo_label.as_deref(), Some("Duplicate field 'date_1'"));

        let saved = load_layout(&layout).expect("load layout");
        assert_eq!(saved.fields, summary.fields);

        // 第二次运行先导入布局，再追加新字段
        let again = run_maker(&AppConfig::default(), &options).expect("run maker again");
        assert_eq!(again.report.loaded, summary.fields.len());
        assert!(again.fields.len() > summary.fields.len());
        assert!(again.fields.iter().any(|field| field.name == "date_2"));
        for name in names {
            assert!(again.fields.iter().any(|field| field.name == name));
        }
    }

    #[test]
    fn filler_maps_assignments_to_widgets() {
        let options = CliOptions {
            output: Some(PathBuf::from("filled.pdf")),
            assignments: vec!["agree=yes".into(), "birth_date=01/02/2000".into()],
            ..demo_options()
        };
        let summary = run_filler(&AppConfig::default(), &options).expect("run filler");
        assert_eq!(summary.filled.len(), 2);
        assert_eq!(summary.filled[0].value, FieldValue::Checked(true));
        // 日期字段写回带前缀的原始控件名
        assert_eq!(summary.filled[1].widget_name, "date_birth_date");
    }

    #[test]
    fn filler_rejects_bad_assignments() {
        let config = AppConfig::default();
        let run = |assignments: Vec<String>, output: Option<PathBuf>| {
            run_filler(
                &config,
                &CliOptions {
                    output,
                    assignments,
                    ..demo_options()
                },
            )
        };
        assert!(matches!(
            run(vec!["full_name".into()], Some("x.pdf".into())),
            Err(FrontendError::InvalidAssignment(_))
        ));
        assert!(matches!(
            run(vec!["nobody=1".into()], Some("x.pdf".into())),
            Err(FrontendError::UnknownField(_))
        ));
        assert!(matches!(
            run(vec!["full_name=Ada".into()], None),
            Err(FrontendError::MissingOutput)
        ));
        assert!(run(Vec::new(), None).is_ok());
    }
}
