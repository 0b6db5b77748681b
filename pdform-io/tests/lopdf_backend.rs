
use std::collections::BTreeSet;

use fixtures::{appearance_state, count_annotations, needs_appearances, sample_form};
use pdform_core::form::{DateFormat, FieldAttributes, FieldKind};
use pdform_core::geometry::{PageSize, PdfRect};
use pdform_core::widget::{FieldValue, FilledValue, WidgetDescriptor, WidgetTypeTag, encode_widget_name};
use pdform_engine::manager::FieldManager;
use pdform_engine::settings::EditorSettings;
use pdform_io::{IoError, LopdfBackend, PdfBackend};

fn find<'a>(widgets: &'a [WidgetDescriptor], name: &str) -> &'a WidgetDescriptor {
    widgets
        .iter()
        .find(|widget| widget.name == name)
        .unwrap_or_else(|| panic!("未找到控件 {name}"))
}

fn assert_rect(actual: PdfRect, expected: [f64; 4]) {
    let actual = actual.0.to_array();
    for (a, e) in actual.iter().zip(expected) {
        assert!((a - e).abs() < 1e-3, "矩形不符: {actual:?} != {expected:?}");
    }
}

fn loaded_manager(backend: &LopdfBackend) -> FieldManager {
    let mut manager = FieldManager::new(backend.page_sizes(), EditorSettings::default());
    manager.load_existing_fields(backend.scan_all_widgets().expect("扫描控件失败"));
    manager
}

#[test]
fn scan_reads_widgets_with_inherited_attributes() {
    let backend = LopdfBackend::from_document(sample_form()).expect("打开表单失败");
    assert_eq!(
        backend.page_sizes(),
        vec![PageSize::LETTER, PageSize::new(595.0, 842.0)]
    );

    let widgets = backend.scan_widgets(0).expect("扫描第 1 页失败");
    assert_eq!(widgets.len(), 6, "链接注解不应计入控件");

    let name = find(&widgets, "full_name");
    assert_eq!(name.tag, WidgetTypeTag::Text);
    assert_eq!(name.value, "Ada");
    assert_rect(name.rect, [72.0, 96.0, 300.0, 120.0]);

    let date = find(&widgets, "date_birth_date");
    assert_eq!(date.value, "12/25/2024");
    assert_rect(date.rect, [72.0, 140.0, 192.0, 164.0]);

    let agree = find(&widgets, "agree");
    assert_eq!(agree.tag, WidgetTypeTag::CheckBox);
    assert_eq!(agree.value, "On");

    assert_eq!(find(&widgets, "choice").tag, WidgetTypeTag::RadioButton);
    assert_eq!(find(&widgets, "country").tag, WidgetTypeTag::ComboBox);

    // 类型与取值都继承自父字段
    let street = find(&widgets, "address.street");
    assert_eq!(street.tag, WidgetTypeTag::Text);
    assert_eq!(street.value, "Zoë");
    assert_rect(street.rect, [72.0, 228.0, 300.0, 252.0]);

    let second = backend.scan_widgets(1).expect("扫描第 2 页失败");
    assert_eq!(second.len(), 1);
    assert_eq!(second[0].tag, WidgetTypeTag::Signature);
    assert_rect(second[0].rect, [72.0, 692.0, 272.0, 742.0]);

    assert!(matches!(
        backend.scan_widgets(2),
        Err(IoError::PageOutOfRange { page: 2, page_count: 2 })
    ));
}

#[test]
fn loading_skips_unsupported_widgets_and_infers_dates() {
    let backend = LopdfBackend::from_document(sample_form()).expect("打开表单失败");
    let mut manager = FieldManager::new(backend.page_sizes(), EditorSettings::default());
    let report = manager.load_existing_fields(backend.scan_all_widgets().expect("扫描控件失败"));

    assert_eq!(report.loaded, 5);
    assert_eq!(report.skipped(), 2);

    let birth = manager.field_by_name("birth_date").expect("日期字段");
    assert_eq!(birth.kind(), FieldKind::Date);
    assert_eq!(birth.origin_name.as_deref(), Some("date_birth_date"));
    assert_eq!(
        birth.attributes,
        FieldAttributes::Date {
            format: DateFormat::MonthDayYear,
            value: "12/25/2024".into(),
        }
    );

    let agree = manager.field_by_name("agree").expect("复选框");
    assert_eq!(agree.attributes, FieldAttributes::Checkbox { checked: true });

    let signature = manager.field_by_name("applicant_signature").expect("签名字段");
    assert_eq!(signature.kind(), FieldKind::Signature);
    assert_eq!(signature.page, 1);
}

#[test]
fn write_replaces_widgets_and_survives_reopen() {
    let dir = tempfile::tempdir().expect("创建临时目录失败");
    let output = dir.path().join("form.pdf");

    let mut backend = LopdfBackend::from_document(sample_form()).expect("打开表单失败");
    let mut manager = loaded_manager(&backend);
    let id = manager
        .create_field_in_pdf(
            FieldKind::DateTime,
            PdfRect::from_coords(10.0, 10.0, 130.0, 40.0),
            0,
        )
        .expect("创建字段失败")
        .id;
    manager.set_value(id, "2024-12-25 10:30").expect("设置取值失败");
    let signature = manager.field_by_name("applicant_signature").expect("签名字段").id;
    manager.set_value(signature, "Ada Lovelace").expect("设置签名失败");

    let exported = manager.export_fields();
    backend.write_widgets(&exported, &output).expect("写出表单失败");
    assert!(output.exists());

    let reopened = LopdfBackend::open(&output).expect("重新打开失败");
    assert_eq!(reopened.source(), Some(output.as_path()));
    let widgets = reopened.scan_all_widgets().expect("重新扫描失败");

    let expected: BTreeSet<String> = exported
        .iter()
        .map(|field| encode_widget_name(field.kind(), &field.name))
        .collect();
    let actual: BTreeSet<String> = widgets.iter().map(|widget| widget.name.clone()).collect();
    assert_eq!(actual, expected, "旧控件应全部移除，每个字段对应一个控件");
    assert!(actual.contains("datetime_datetime_1"));
    assert!(!actual.contains("choice"));

    for field in &exported {
        let widget = find(&widgets, &encode_widget_name(field.kind(), &field.name));
        assert_eq!(widget.page, field.page);
        assert_eq!(widget.tag, field.kind().widget_tag());
        assert_rect(widget.rect, field.rect.0.to_array());
    }
    assert_eq!(
        find(&widgets, "datetime_datetime_1").value,
        "2024-12-25 10:30"
    );
    assert_eq!(find(&widgets, "agree").value, "Yes");

    assert_eq!(count_annotations(reopened.document(), 0, b"Link"), 1);
    assert!(needs_appearances(reopened.document()));

    // 再次加载得到相同的类型与显示名
    let reloaded = loaded_manager(&reopened);
    assert_eq!(reloaded.len(), exported.len());
    let datetime = reloaded.field_by_name("datetime_1").expect("日期时间字段");
    assert_eq!(datetime.kind(), FieldKind::DateTime);
    // 签名以文本控件落盘，取值随之保存
    assert_eq!(find(&widgets, "applicant_signature").tag, WidgetTypeTag::Text);
    let signature = reloaded.field_by_name("applicant_signature").expect("签名字段");
    assert_eq!(
        signature.attributes,
        FieldAttributes::Signature {
            value: "Ada Lovelace".into(),
        }
    );
}

#[test]
fn fill_updates_existing_widgets() {
    let dir = tempfile::tempdir().expect("创建临时目录失败");
    let output = dir.path().join("filled.pdf");

    let mut backend = LopdfBackend::from_document(sample_form()).expect("打开表单失败");
    let values = [
        FilledValue {
            page: 0,
            widget_name: "full_name".into(),
            value: FieldValue::Text("Grace".into()),
        },
        FilledValue {
            page: 0,
            widget_name: "agree".into(),
            value: FieldValue::Checked(false),
        },
        FilledValue {
            page: 0,
            widget_name: "address.street".into(),
            value: FieldValue::Text("Königstraße 1".into()),
        },
    ];
    backend.fill_widgets(&values, &output).expect("填写失败");

    let reopened = LopdfBackend::open(&output).expect("重新打开失败");
    let widgets = reopened.scan_widgets(0).expect("重新扫描失败");
    assert_eq!(find(&widgets, "full_name").value, "Grace");
    assert_eq!(find(&widgets, "agree").value, "Off");
    assert_eq!(find(&widgets, "address.street").value, "Königstraße 1");
    // 填写不改变控件集合
    assert_eq!(widgets.len(), 6);
    assert!(needs_appearances(reopened.document()));
}

#[test]
fn checkbox_fill_uses_the_widgets_on_state() {
    let dir = tempfile::tempdir().expect("创建临时目录失败");
    let cleared = dir.path().join("cleared.pdf");
    let checked = dir.path().join("checked.pdf");

    let mut backend = LopdfBackend::from_document(sample_form()).expect("打开表单失败");
    let agree = |state| FilledValue {
        page: 0,
        widget_name: "agree".into(),
        value: FieldValue::Checked(state),
    };
    backend.fill_widgets(&[agree(false)], &cleared).expect("取消勾选失败");
    let reopened = LopdfBackend::open(&cleared).expect("重新打开失败");
    assert_eq!(appearance_state(reopened.document(), 0, "agree"), Some(b"Off".to_vec()));

    backend.fill_widgets(&[agree(true)], &checked).expect("勾选失败");
    let reopened = LopdfBackend::open(&checked).expect("重新打开失败");
    assert_eq!(appearance_state(reopened.document(), 0, "agree"), Some(b"On".to_vec()));
    assert_eq!(find(&reopened.scan_widgets(0).expect("重新扫描失败"), "agree").value, "On");

    // 重新写出的复选框没有外观字典，勾选时回退到 /Yes
    let mut manager = loaded_manager(&reopened);
    let id = manager.field_by_name("agree").expect("复选框").id;
    manager.set_checked(id, false).expect("设置复选框失败");
    let mut rewritten = reopened.clone();
    rewritten
        .write_widgets(&manager.export_fields(), &dir.path().join("written.pdf"))
        .expect("写出表单失败");
    assert_eq!(appearance_state(rewritten.document(), 0, "agree"), Some(b"Off".to_vec()));
    let refilled = dir.path().join("refilled.pdf");
    rewritten.fill_widgets(&[agree(true)], &refilled).expect("勾选失败");
    let reopened = LopdfBackend::open(&refilled).expect("重新打开失败");
    assert_eq!(appearance_state(reopened.document(), 0, "agree"), Some(b"Yes".to_vec()));
}

#[test]
fn signature_widgets_are_not_filled() {
    let dir = tempfile::tempdir().expect("创建临时目录失败");
    let output = dir.path().join("signed.pdf");
    let mut backend = LopdfBackend::from_document(sample_form()).expect("打开表单失败");

    let signature = FilledValue {
        page: 1,
        widget_name: "applicant_signature".into(),
        value: FieldValue::Text("Ada".into()),
    };
    assert!(matches!(
        backend.fill_widgets(&[signature], &output),
        Err(IoError::UnsupportedFeature(_))
    ));
    assert!(!output.exists());
}

#[test]
fn failures_leave_no_output_behind() {
    let dir = tempfile::tempdir().expect("创建临时目录失败");
    let output = dir.path().join("never.pdf");
    let mut backend = LopdfBackend::from_document(sample_form()).expect("打开表单失败");

    let missing = FilledValue {
        page: 0,
        widget_name: "nope".into(),
        value: FieldValue::Text("x".into()),
    };
    assert!(matches!(
        backend.fill_widgets(&[missing], &output),
        Err(IoError::InvalidDocument(_))
    ));

    let mut manager = loaded_manager(&backend);
    manager.reset_document(vec![PageSize::LETTER; 3]);
    manager
        .create_field_in_pdf(FieldKind::Text, PdfRect::from_coords(0.0, 0.0, 50.0, 20.0), 2)
        .expect("创建字段失败");
    assert!(matches!(
        backend.write_widgets(&manager.export_fields(), &output),
        Err(IoError::PageOutOfRange { page: 2, page_count: 2 })
    ));
    assert!(!output.exists());

    assert!(matches!(
        backend.render_page(0, 1.0),
        Err(IoError::UnsupportedFeature(_))
    ));
    assert!(matches!(
        LopdfBackend::open(dir.path().join("missing.pdf")),
        Err(IoError::ReadError { .. })
    ));
    assert!(matches!(
        LopdfBackend::from_bytes(b"not a pdf"),
        Err(IoError::Pdf(_))
    ));
}
