use std::io;
use std::path::{Path, PathBuf};

use pdform_core::form::{FieldKind, FormField};
use pdform_core::geometry::PageSize;
use pdform_core::widget::{FieldValue, FilledValue, WidgetDescriptor, WidgetTypeTag, encode_widget_name};
use tracing::{debug, info};

use crate::{IoError, PdfBackend, RenderedPage, check_page};

/// 内存中的 PDF 替身：页面、控件与写出记录都保存在结构体里，
/// 供演示文档与测试使用。
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    pages: Vec<PageSize>,
    widgets: Vec<WidgetDescriptor>,
    written: Vec<FormField>,
    filled: Vec<FilledValue>,
    last_output: Option<PathBuf>,
    fail_writes: bool,
}

impl MemoryBackend {
    pub fn new(pages: Vec<PageSize>) -> Self {
        Self {
            pages,
            ..Self::default()
        }
    }

    pub fn with_widgets(mut self, widgets: impl IntoIterator<Item = WidgetDescriptor>) -> Self {
        self.widgets.extend(widgets);
        self
    }

    pub fn add_widget(&mut self, widget: WidgetDescriptor) {
        self.widgets.push(widget);
    }

    pub fn widgets(&self) -> &[WidgetDescriptor] {
        &self.widgets
    }

    /// 最近一次 `write_widgets` 收到的字段。
    pub fn written(&self) -> &[FormField] {
        &self.written
    }

    pub fn filled(&self) -> &[FilledValue] {
        &self.filled
    }

    pub fn last_output(&self) -> Option<&Path> {
        self.last_output.as_deref()
    }

    /// 模拟写盘失败，用于验证保存错误原样上抛。
    pub fn set_fail_writes(&mut self, fail: bool) {
        self.fail_writes = fail;
    }

    fn simulated_failure(&self, output: &Path) -> Result<(), IoError> {
        if self.fail_writes {
            return Err(IoError::WriteError {
                path: output.to_path_buf(),
                source: io::Error::other("simulated write failure"),
            });
        }
        Ok(())
    }
}

impl PdfBackend for MemoryBackend {
    fn page_sizes(&self) -> Vec<PageSize> {
        self.pages.clone()
    }

    fn render_page(&self, page: usize, zoom: f64) -> Result<RenderedPage, IoError> {
        check_page(page, self.pages.len())?;
        if !zoom.is_finite() || zoom <= 0.0 {
            return Err(IoError::InvalidDocument(format!("invalid zoom {zoom}")));
        }
        let (width, height) = RenderedPage::size_for(self.pages[page], zoom);
        Ok(RenderedPage::blank(width, height))
    }

    fn scan_widgets(&self, page: usize) -> Result<Vec<WidgetDescriptor>, IoError> {
        check_page(page, self.pages.len())?;
        Ok(self
            .widgets
            .iter()
            .filter(|widget| widget.page == page)
            .cloned()
            .collect())
    }

    fn write_widgets(&mut self, fields: &[FormField], output: &Path) -> Result<(), IoError> {
        self.simulated_failure(output)?;
        for field in fields {
            check_page(field.page, self.pages.len())?;
        }

        self.widgets = fields
            .iter()
            .map(|field| WidgetDescriptor {
                page: field.page,
                tag: field.kind().widget_tag(),
                name: encode_widget_name(field.kind(), &field.name),
                rect: field.rect,
                value: field.attributes.display_value(),
            })
            .collect();
        self.written = fields.to_vec();
        self.last_output = Some(output.to_path_buf());
        info!(count = fields.len(), output = ?output, "已写出表单控件");
        Ok(())
    }

    fn fill_widgets(&mut self, values: &[FilledValue], output: &Path) -> Result<(), IoError> {
        self.simulated_failure(output)?;
        let mut widgets = self.widgets.clone();
        for filled in values {
            let widget = widgets
                .iter_mut()
                .find(|widget| widget.page == filled.page && widget.name == filled.widget_name)
                .ok_or_else(|| {
                    IoError::InvalidDocument(format!(
                        "widget {:?} not found on page {}",
                        filled.widget_name, filled.page
                    ))
                })?;
            if widget.tag == WidgetTypeTag::Signature {
                return Err(IoError::UnsupportedFeature(format!(
                    "signature field {:?} cannot be filled with a value",
                    filled.widget_name
                )));
            }
            widget.value = match &filled.value {
                FieldValue::Text(text) => text.clone(),
                FieldValue::Checked(true) => "Yes".to_string(),
                FieldValue::Checked(false) => "Off".to_string(),
            };
            debug!(name = %widget.name, value = %widget.value, "已填写控件");
        }
        self.widgets = widgets;
        self.filled = values.to_vec();
        self.last_output = Some(output.to_path_buf());
        Ok(())
    }
}

/// 演示文档：两页 Letter，预置若干控件（含一个不受支持的下拉框）。
pub fn demo_backend() -> MemoryBackend {
    use pdform_core::geometry::PdfRect;

    let widget = |page, tag, name: &str, rect: [f64; 4], value: &str| WidgetDescriptor {
        page,
        tag,
        name: name.to_string(),
        rect: PdfRect::from_coords(rect[0], rect[1], rect[2], rect[3]),
        value: value.to_string(),
    };
    MemoryBackend::new(vec![PageSize::LETTER; 2]).with_widgets([
        widget(0, WidgetTypeTag::Text, "full_name", [72.0, 96.0, 300.0, 120.0], ""),
        widget(
            0,
            WidgetTypeTag::Text,
            &encode_widget_name(FieldKind::Date, "birth_date"),
            [72.0, 140.0, 192.0, 164.0],
            "12/25/2024",
        ),
        widget(0, WidgetTypeTag::CheckBox, "agree", [72.0, 190.0, 90.0, 208.0], "Off"),
        widget(0, WidgetTypeTag::ComboBox, "country", [320.0, 96.0, 460.0, 120.0], ""),
        widget(1, WidgetTypeTag::Signature, "applicant_signature", [72.0, 600.0, 272.0, 650.0], ""),
    ])
}

#[cfg(test)]
mod tests {
    use pdform_core::form::{FieldAttributes, FieldId};
    use pdform_core::geometry::PdfRect;

    use super::*;

    #[test]
    fn write_replaces_previous_widgets_with_encoded_names() {
        let mut backend = demo_backend();
        let field = FormField::new(
            FieldId::new(1),
            "start",
            0,
            PdfRect::from_coords(10.0, 10.0, 130.0, 40.0),
            FieldAttributes::defaults_for(FieldKind::DateTime),
        );
        backend
            .write_widgets(&[field], Path::new("out.pdf"))
            .expect("write widgets");

        let widgets = backend.scan_all_widgets().expect("scan");
        assert_eq!(widgets.len(), 1);
        assert_eq!(widgets[0].name, "datetime_start");
        assert_eq!(widgets[0].tag, WidgetTypeTag::Text);
        assert_eq!(backend.last_output(), Some(Path::new("out.pdf")));
    }

    #[test]
    fn failures_are_reported_and_state_is_kept() {
        let mut backend = demo_backend();
        backend.set_fail_writes(true);
        let error = backend.write_widgets(&[], Path::new("out.pdf")).unwrap_err();
        assert!(matches!(error, IoError::WriteError { .. }));
        assert_eq!(backend.widgets().len(), 5);

        backend.set_fail_writes(false);
        let missing = FilledValue {
            page: 0,
            widget_name: "nope".into(),
            value: FieldValue::Text("x".into()),
        };
        assert!(backend.fill_widgets(&[missing], Path::new("out.pdf")).is_err());
        assert!(matches!(
            backend.scan_widgets(9),
            Err(IoError::PageOutOfRange { page: 9, page_count: 2 })
        ));
        assert!(backend.render_page(0, 0.0).is_err());
    }

    #[test]
    fn fill_sets_checkbox_states() {
        let mut backend = demo_backend();
        let values = [FilledValue {
            page: 0,
            widget_name: "agree".into(),
            value: FieldValue::Checked(true),
        }];
        backend
            .fill_widgets(&values, Path::new("filled.pdf"))
            .expect("fill");
        let agree = backend
            .widgets()
            .iter()
            .find(|widget| widget.name == "agree")
            .expect("agree widget");
        assert_eq!(agree.value, "Yes");
        assert_eq!(backend.filled().len(), 1);

        let signature = FilledValue {
            page: 1,
            widget_name: "applicant_signature".into(),
            value: FieldValue::Text("Ada".into()),
        };
        assert!(matches!(
            backend.fill_widgets(&[signature], Path::new("filled.pdf")),
            Err(IoError::UnsupportedFeature(_))
        ));
        assert_eq!(backend.filled().len(), 1);
    }
}
