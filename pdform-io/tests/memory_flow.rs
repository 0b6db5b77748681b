use std::path::Path;

use pdform_core::form::FieldKind;
use pdform_core::geometry::{Point2, Rect};
use pdform_engine::command::CommandRequest;
use pdform_engine::session::{EditorSession, PointerButton, PointerOutcome};
use pdform_engine::settings::EditorSettings;
use pdform_io::memory::demo_backend;
use pdform_io::{IoError, PdfBackend};

fn open_demo() -> (pdform_io::MemoryBackend, EditorSession) {
    let backend = demo_backend();
    let mut session = EditorSession::new(backend.page_sizes(), EditorSettings::default());
    let report = session.load_existing_fields(backend.scan_all_widgets().expect("扫描失败"));
    assert_eq!(report.loaded, 4);
    assert_eq!(report.skipped(), 1, "下拉框应被跳过");
    (backend, session)
}

#[test]
fn edits_are_saved_in_pdf_space_regardless_of_zoom() {
    let (mut backend, mut session) = open_demo();

    session.set_tool(Some(FieldKind::Text));
    let outcome = session
        .pointer_down(Point2::new(125.0, 425.0), PointerButton::Primary)
        .expect("创建字段失败");
    let PointerOutcome::Created(id) = outcome else {
        panic!("期望创建字段，实际为 {outcome:?}");
    };
    assert_eq!(session.tool(), None);

    let created = session.manager().field(id).expect("新字段").clone();
    assert_eq!(created.name, "text_1");
    assert!(created.rect.0.approx_eq(&Rect::from_coords(100.0, 400.0, 200.0, 430.0), 1e-9));

    let before_zoom = session.export_fields();
    assert!(session.dispatch(&CommandRequest::new("zoom_in")).success);
    assert!((session.zoom().zoom() - 1.25).abs() < 1e-9);
    assert_eq!(session.export_fields(), before_zoom, "缩放不应改变 PDF 空间矩形");

    // 1.25 倍下拖动 50 像素相当于 40 point
    let grab = Point2::new(150.0 * 1.25 + 25.0, 415.0 * 1.25 + 25.0);
    assert_eq!(
        session.pointer_down(grab, PointerButton::Primary),
        Ok(PointerOutcome::Selected(id))
    );
    let label = session.pointer_up(Point2::new(grab.x() + 50.0, grab.y()));
    assert_eq!(label.as_deref(), Some("Move field 'text_1'"));
    let moved = session.manager().field(id).expect("新字段");
    assert!(moved.rect.0.approx_eq(&Rect::from_coords(140.0, 400.0, 240.0, 430.0), 1e-9));

    backend
        .write_widgets(&session.export_fields(), Path::new("out.pdf"))
        .expect("保存失败");
    assert_eq!(backend.written().len(), 5);
    let names: Vec<&str> = backend.widgets().iter().map(|widget| widget.name.as_str()).collect();
    assert!(names.contains(&"date_birth_date"));
    assert!(names.contains(&"text_1"));
    assert!(!names.contains(&"country"), "未加载的控件保存后不再存在");

    assert!(session.dispatch(&CommandRequest::new("undo")).success);
    let restored = session.manager().field(id).expect("新字段");
    assert!(restored.rect.0.approx_eq(&Rect::from_coords(100.0, 400.0, 200.0, 430.0), 1e-9));
}

#[test]
fn save_failures_propagate_and_keep_fields() {
    let (mut backend, session) = open_demo();
    backend.set_fail_writes(true);

    let fields = session.export_fields();
    let error = backend
        .write_widgets(&fields, Path::new("out.pdf"))
        .expect_err("写盘失败应当上抛");
    assert!(matches!(error, IoError::WriteError { .. }));
    assert_eq!(session.manager().len(), 4);
    assert_eq!(backend.widgets().len(), 5);
    assert!(backend.last_output().is_none());
}
