use std::fs::{self, File};
use std::path::{Path, PathBuf};

use lopdf::{Dictionary, Document, Object, ObjectId, StringFormat, dictionary};
use pdform_core::form::{FieldAttributes, FormField};
use pdform_core::geometry::{PageSize, PdfRect};
use pdform_core::widget::{FieldValue, FilledValue, WidgetDescriptor, WidgetTypeTag, encode_widget_name};
use tracing::{debug, info, warn};

use crate::{IoError, PdfBackend, RenderedPage, check_page};

const FLAG_RADIO: i64 = 1 << 15;
const FLAG_PUSHBUTTON: i64 = 1 << 16;
const FLAG_COMBO: i64 = 1 << 17;
/// 沿 `/Parent` 链查找的最大深度，防止循环引用。
const MAX_PARENT_DEPTH: usize = 32;
const DEFAULT_APPEARANCE: &str = "/Helv 12 Tf 0 g";
const ON_STATE: &[u8] = b"Yes";
const OFF_STATE: &[u8] = b"Off";

/// 填写时写入的取值：文本串或复选框外观状态名。
enum FillTarget {
    Text(Object),
    State(Vec<u8>),
}

/// 页面 MediaBox（PDF 原生坐标，左下原点）。
#[derive(Debug, Clone, Copy, PartialEq)]
struct MediaBox {
    left: f64,
    bottom: f64,
    right: f64,
    top: f64,
}

impl MediaBox {
    const LETTER: MediaBox = MediaBox {
        left: 0.0,
        bottom: 0.0,
        right: 612.0,
        top: 792.0,
    };

    fn from_array(values: [f64; 4]) -> Self {
        Self {
            left: values[0].min(values[2]),
            bottom: values[1].min(values[3]),
            right: values[0].max(values[2]),
            top: values[1].max(values[3]),
        }
    }

    fn size(&self) -> PageSize {
        PageSize::new(self.right - self.left, self.top - self.bottom)
    }

    /// 原生矩形 `[llx, lly, urx, ury]` 翻转为左上原点。
    fn to_top_left(&self, native: [f64; 4]) -> PdfRect {
        PdfRect::from_coords(
            native[0] - self.left,
            self.top - native[3],
            native[2] - self.left,
            self.top - native[1],
        )
    }

    fn to_native(&self, rect: PdfRect) -> [f64; 4] {
        let r = rect.0;
        [
            r.x0() + self.left,
            self.top - r.y1(),
            r.x1() + self.left,
            self.top - r.y0(),
        ]
    }
}

/// 基于 lopdf 的 PDF 后端：扫描 AcroForm 控件、写出与填写表单。不支持渲染。
#[derive(Debug, Clone)]
pub struct LopdfBackend {
    document: Document,
    page_ids: Vec<ObjectId>,
    media_boxes: Vec<MediaBox>,
    source: Option<PathBuf>,
}

impl LopdfBackend {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, IoError> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|source| IoError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        let mut backend = Self::from_bytes(&bytes)?;
        backend.source = Some(path.to_path_buf());
        info!(path = ?path, pages = backend.page_ids.len(), "已打开 PDF");
        Ok(backend)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, IoError> {
        let document = Document::load_mem(bytes)
            .map_err(|err| IoError::Pdf(format!("failed to parse PDF: {err}")))?;
        Self::from_document(document)
    }

    pub fn from_document(document: Document) -> Result<Self, IoError> {
        let page_ids: Vec<ObjectId> = document.get_pages().values().copied().collect();
        if page_ids.is_empty() {
            return Err(IoError::InvalidDocument("document has no pages".to_string()));
        }
        let media_boxes = page_ids
            .iter()
            .map(|&page_id| media_box(&document, page_id))
            .collect();
        Ok(Self {
            document,
            page_ids,
            media_boxes,
            source: None,
        })
    }

    #[inline]
    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    fn page_dict_mut(document: &mut Document, page_id: ObjectId) -> Result<&mut Dictionary, IoError> {
        document
            .get_object_mut(page_id)
            .and_then(|object| object.as_dict_mut())
            .map_err(|err| IoError::InvalidDocument(format!("page {page_id:?} is not a dictionary: {err}")))
    }
}

impl PdfBackend for LopdfBackend {
    fn page_sizes(&self) -> Vec<PageSize> {
        self.media_boxes.iter().map(MediaBox::size).collect()
    }

    fn render_page(&self, page: usize, _zoom: f64) -> Result<RenderedPage, IoError> {
        check_page(page, self.page_ids.len())?;
        Err(IoError::UnsupportedFeature(
            "page rendering is not available in the lopdf backend".to_string(),
        ))
    }

    fn scan_widgets(&self, page: usize) -> Result<Vec<WidgetDescriptor>, IoError> {
        check_page(page, self.page_ids.len())?;
        let document = &self.document;
        let media = self.media_boxes[page];

        let mut widgets = Vec::new();
        for (_, dict) in widget_entries(document, self.page_ids[page]) {
            let name = full_name(document, dict);
            let Some(native) = dict
                .get(b"Rect")
                .ok()
                .and_then(|object| number_array(document, object))
            else {
                warn!(page, name = %name, "控件缺少有效的 /Rect，已跳过");
                continue;
            };
            let value = inherited(document, dict, b"V")
                .and_then(|object| object_text(document, object))
                .or_else(|| dict.get(b"AS").ok().and_then(|object| object_text(document, object)))
                .unwrap_or_default();
            widgets.push(WidgetDescriptor {
                page,
                tag: widget_tag(document, dict),
                name,
                rect: media.to_top_left(native),
                value,
            });
        }
        debug!(page, count = widgets.len(), "已扫描页面控件");
        Ok(widgets)
    }

    fn write_widgets(&mut self, fields: &[FormField], output: &Path) -> Result<(), IoError> {
        for field in fields {
            check_page(field.page, self.page_ids.len())?;
        }
        let mut document = self.document.clone();

        for &page_id in &self.page_ids {
            let kept: Vec<Object> = annotation_entries(&document, page_id)
                .into_iter()
                .filter(|entry| !is_widget(&document, entry))
                .collect();
            let page = Self::page_dict_mut(&mut document, page_id)?;
            if kept.is_empty() {
                page.remove(b"Annots");
            } else {
                page.set("Annots", kept);
            }
        }

        let font_id = document.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
        });

        let mut field_refs = Vec::with_capacity(fields.len());
        for field in fields {
            let page_id = self.page_ids[field.page];
            let widget = widget_dictionary(field, page_id, self.media_boxes[field.page]);
            let widget_id = document.add_object(widget);
            let page = Self::page_dict_mut(&mut document, page_id)?;
            match page.get_mut(b"Annots").and_then(|annots| annots.as_array_mut()) {
                Ok(annots) => annots.push(Object::Reference(widget_id)),
                Err(_) => page.set("Annots", vec![Object::Reference(widget_id)]),
            }
            field_refs.push(Object::Reference(widget_id));
        }

        let acro_form = document.add_object(dictionary! {
            "Fields" => field_refs,
            "NeedAppearances" => true,
            "DA" => Object::string_literal("/Helv 0 Tf 0 g"),
            "DR" => Object::Dictionary(dictionary! {
                "Font" => Object::Dictionary(dictionary! {
                    "Helv" => font_id,
                }),
            }),
        });
        catalog_mut(&mut document)?.set("AcroForm", acro_form);

        save_document(&mut document, output)?;
        self.document = document;
        info!(count = fields.len(), output = ?output, "已写出表单控件");
        Ok(())
    }

    fn fill_widgets(&mut self, values: &[FilledValue], output: &Path) -> Result<(), IoError> {
        let mut targets = Vec::with_capacity(values.len());
        for filled in values {
            check_page(filled.page, self.page_ids.len())?;
            let widget_id = widget_entries(&self.document, self.page_ids[filled.page])
                .into_iter()
                .find(|(_, dict)| full_name(&self.document, dict) == filled.widget_name)
                .and_then(|(id, _)| id)
                .ok_or_else(|| {
                    IoError::InvalidDocument(format!(
                        "widget {:?} not found on page {}",
                        filled.widget_name, filled.page
                    ))
                })?;
            let widget = dict_ref(&self.document, widget_id)?;
            let is_signature = matches!(
                inherited(&self.document, widget, b"FT"),
                Some(Object::Name(name)) if name == b"Sig"
            );
            if is_signature {
                return Err(IoError::UnsupportedFeature(format!(
                    "signature field {:?} cannot be filled with a value",
                    filled.widget_name
                )));
            }
            let value = match &filled.value {
                FieldValue::Text(text) => FillTarget::Text(text_object(text)),
                FieldValue::Checked(true) => FillTarget::State(on_state(&self.document, widget)),
                FieldValue::Checked(false) => FillTarget::State(OFF_STATE.to_vec()),
            };
            let field_id = field_owner(&self.document, widget_id);
            targets.push((field_id, widget_id, value));
        }

        let mut document = self.document.clone();
        for (field_id, widget_id, value) in targets {
            match value {
                FillTarget::Text(text) => dict_mut(&mut document, field_id)?.set("V", text),
                FillTarget::State(state) => {
                    dict_mut(&mut document, field_id)?.set("V", Object::Name(state.clone()));
                    dict_mut(&mut document, widget_id)?.set("AS", Object::Name(state));
                }
            }
        }
        mark_need_appearances(&mut document)?;

        save_document(&mut document, output)?;
        self.document = document;
        info!(count = values.len(), output = ?output, "已填写表单");
        Ok(())
    }
}

fn widget_dictionary(field: &FormField, page_id: ObjectId, media: MediaBox) -> Dictionary {
    let rect: Vec<Object> = media
        .to_native(field.rect)
        .iter()
        .map(|&value| Object::Real(value as f32))
        .collect();
    let mut widget = dictionary! {
        "Type" => "Annot",
        "Subtype" => "Widget",
        "Rect" => rect,
        "T" => text_object(&encode_widget_name(field.kind(), &field.name)),
        "F" => 4i64,
        "P" => page_id,
        "DA" => Object::string_literal(DEFAULT_APPEARANCE),
    };
    match &field.attributes {
        FieldAttributes::Checkbox { checked } => {
            let state = if *checked { ON_STATE } else { OFF_STATE };
            widget.set("FT", "Btn");
            widget.set("V", Object::Name(state.to_vec()));
            widget.set("AS", Object::Name(state.to_vec()));
        }
        other => {
            widget.set("FT", "Tx");
            widget.set("V", text_object(&other.display_value()));
        }
    }
    widget
}

fn save_document(document: &mut Document, output: &Path) -> Result<(), IoError> {
    let mut file = File::create(output).map_err(|source| IoError::WriteError {
        path: output.to_path_buf(),
        source,
    })?;
    document
        .save_to(&mut file)
        .map_err(|err| IoError::Pdf(format!("failed to serialize {output:?}: {err}")))
}

fn resolve<'a>(document: &'a Document, object: &'a Object) -> &'a Object {
    let mut current = object;
    for _ in 0..MAX_PARENT_DEPTH {
        match current {
            Object::Reference(id) => match document.get_object(*id) {
                Ok(next) => current = next,
                Err(_) => return current,
            },
            _ => return current,
        }
    }
    current
}

fn parent_of<'a>(document: &'a Document, dict: &'a Dictionary) -> Option<&'a Dictionary> {
    let parent = dict.get(b"Parent").ok()?;
    resolve(document, parent).as_dict().ok()
}

/// 沿 `/Parent` 链查找可继承的键（页面树与字段树通用）。
fn inherited<'a>(document: &'a Document, dict: &'a Dictionary, key: &[u8]) -> Option<&'a Object> {
    let mut current = dict;
    for _ in 0..MAX_PARENT_DEPTH {
        if let Ok(value) = current.get(key) {
            return Some(resolve(document, value));
        }
        current = parent_of(document, current)?;
    }
    None
}

fn number(object: &Object) -> Option<f64> {
    match object {
        Object::Integer(value) => Some(*value as f64),
        Object::Real(value) => Some(f64::from(*value)),
        _ => None,
    }
}

fn number_array(document: &Document, object: &Object) -> Option<[f64; 4]> {
    let array = resolve(document, object).as_array().ok()?;
    if array.len() != 4 {
        return None;
    }
    let mut values = [0.0; 4];
    for (slot, item) in values.iter_mut().zip(array) {
        *slot = number(resolve(document, item))?;
    }
    Some(values)
}

fn media_box(document: &Document, page_id: ObjectId) -> MediaBox {
    document
        .get_object(page_id)
        .and_then(|object| object.as_dict())
        .ok()
        .and_then(|page| inherited(document, page, b"MediaBox"))
        .and_then(|object| number_array(document, object))
        .map(MediaBox::from_array)
        .filter(|media| media.size().width > 0.0 && media.size().height > 0.0)
        .unwrap_or_else(|| {
            warn!(?page_id, "页面缺少有效的 MediaBox，按 Letter 处理");
            MediaBox::LETTER
        })
}

/// PDF 文本串：UTF-16BE（带 BOM）或按 UTF-8/Latin-1 解码。
fn decode_text(bytes: &[u8]) -> String {
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let units: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => bytes.iter().map(|&byte| byte as char).collect(),
    }
}

fn text_object(text: &str) -> Object {
    if text.is_ascii() {
        return Object::string_literal(text);
    }
    let mut bytes = vec![0xFE, 0xFF];
    for unit in text.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    Object::String(bytes, StringFormat::Hexadecimal)
}

fn object_text(document: &Document, object: &Object) -> Option<String> {
    match resolve(document, object) {
        Object::String(bytes, _) => Some(decode_text(bytes)),
        Object::Name(name) => Some(String::from_utf8_lossy(name).into_owned()),
        Object::Integer(value) => Some(value.to_string()),
        _ => None,
    }
}

/// 完整字段名：沿 `/Parent` 链收集 `/T`，以点号连接。
fn full_name(document: &Document, dict: &Dictionary) -> String {
    let mut parts = Vec::new();
    let mut current = Some(dict);
    let mut depth = 0;
    while let Some(node) = current {
        if let Some(part) = node.get(b"T").ok().and_then(|object| object_text(document, object)) {
            parts.push(part);
        }
        depth += 1;
        if depth >= MAX_PARENT_DEPTH {
            break;
        }
        current = parent_of(document, node);
    }
    parts.reverse();
    parts.join(".")
}

fn widget_tag(document: &Document, dict: &Dictionary) -> WidgetTypeTag {
    let flags = inherited(document, dict, b"Ff").and_then(number).unwrap_or(0.0) as i64;
    let field_type = match inherited(document, dict, b"FT") {
        Some(Object::Name(name)) => name.as_slice(),
        Some(_) | None => return WidgetTypeTag::Unknown("none".to_string()),
    };
    match field_type {
        b"Tx" => WidgetTypeTag::Text,
        b"Btn" if flags & FLAG_RADIO != 0 => WidgetTypeTag::RadioButton,
        b"Btn" if flags & FLAG_PUSHBUTTON != 0 => WidgetTypeTag::PushButton,
        b"Btn" => WidgetTypeTag::CheckBox,
        b"Ch" if flags & FLAG_COMBO != 0 => WidgetTypeTag::ComboBox,
        b"Ch" => WidgetTypeTag::ListBox,
        b"Sig" => WidgetTypeTag::Signature,
        other => WidgetTypeTag::Unknown(String::from_utf8_lossy(other).into_owned()),
    }
}

/// 页面 `/Annots` 的原始条目（引用或内联字典）。
fn annotation_entries(document: &Document, page_id: ObjectId) -> Vec<Object> {
    document
        .get_object(page_id)
        .and_then(|object| object.as_dict())
        .ok()
        .and_then(|page| page.get(b"Annots").ok())
        .and_then(|annots| resolve(document, annots).as_array().ok())
        .cloned()
        .unwrap_or_default()
}

fn is_widget(document: &Document, entry: &Object) -> bool {
    resolve(document, entry)
        .as_dict()
        .ok()
        .and_then(|dict| dict.get(b"Subtype").ok())
        .is_some_and(|subtype| matches!(subtype, Object::Name(name) if name == b"Widget"))
}

/// 页面上的控件注解及其对象 id（内联字典没有 id）。
fn widget_entries(document: &Document, page_id: ObjectId) -> Vec<(Option<ObjectId>, &Dictionary)> {
    let Some(annots) = document
        .get_object(page_id)
        .and_then(|object| object.as_dict())
        .ok()
        .and_then(|page| page.get(b"Annots").ok())
        .and_then(|annots| resolve(document, annots).as_array().ok())
    else {
        return Vec::new();
    };

    annots
        .iter()
        .filter(|entry| is_widget(document, entry))
        .filter_map(|entry| {
            let id = match entry {
                Object::Reference(id) => Some(*id),
                _ => None,
            };
            resolve(document, entry).as_dict().ok().map(|dict| (id, dict))
        })
        .collect()
}

/// 复选框的选中状态名取自 `/AP /N` 中非 `Off` 的键，缺失时为 `Yes`。
fn on_state(document: &Document, widget: &Dictionary) -> Vec<u8> {
    widget
        .get(b"AP")
        .ok()
        .and_then(|ap| resolve(document, ap).as_dict().ok())
        .and_then(|ap| ap.get(b"N").ok())
        .and_then(|normal| resolve(document, normal).as_dict().ok())
        .and_then(|normal| {
            normal
                .iter()
                .map(|(key, _)| key)
                .find(|key| key.as_slice() != OFF_STATE)
                .cloned()
        })
        .unwrap_or_else(|| ON_STATE.to_vec())
}

/// 持有 `/T` 的最近节点：控件自身或其父字段。
fn field_owner(document: &Document, widget_id: ObjectId) -> ObjectId {
    let mut current = widget_id;
    for _ in 0..MAX_PARENT_DEPTH {
        let Ok(dict) = document.get_object(current).and_then(|object| object.as_dict()) else {
            return widget_id;
        };
        if dict.has(b"T") {
            return current;
        }
        match dict.get(b"Parent") {
            Ok(Object::Reference(parent)) => current = *parent,
            _ => return widget_id,
        }
    }
    widget_id
}

fn dict_ref(document: &Document, id: ObjectId) -> Result<&Dictionary, IoError> {
    document
        .get_object(id)
        .and_then(|object| object.as_dict())
        .map_err(|err| IoError::InvalidDocument(format!("object {id:?} is not a dictionary: {err}")))
}

fn dict_mut(document: &mut Document, id: ObjectId) -> Result<&mut Dictionary, IoError> {
    document
        .get_object_mut(id)
        .and_then(|object| object.as_dict_mut())
        .map_err(|err| IoError::InvalidDocument(format!("object {id:?} is not a dictionary: {err}")))
}

fn root_id(document: &Document) -> Result<ObjectId, IoError> {
    document
        .trailer
        .get(b"Root")
        .and_then(|root| root.as_reference())
        .map_err(|err| IoError::InvalidDocument(format!("missing document catalog: {err}")))
}

fn catalog_mut(document: &mut Document) -> Result<&mut Dictionary, IoError> {
    let id = root_id(document)?;
    dict_mut(document, id)
}

fn mark_need_appearances(document: &mut Document) -> Result<(), IoError> {
    let acro_form = catalog_mut(document)?.get(b"AcroForm").ok().cloned();
    match acro_form {
        Some(Object::Reference(id)) => {
            dict_mut(document, id)?.set("NeedAppearances", true);
        }
        Some(Object::Dictionary(mut form)) => {
            form.set("NeedAppearances", true);
            catalog_mut(document)?.set("AcroForm", form);
        }
        _ => warn!("文档缺少 AcroForm，跳过 NeedAppearances"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn media_box_flips_between_origins() {
        let media = MediaBox::from_array([0.0, 0.0, 612.0, 792.0]);
        let rect = media.to_top_left([72.0, 672.0, 300.0, 696.0]);
        assert_eq!(rect.0.to_array(), [72.0, 96.0, 300.0, 120.0]);
        assert_eq!(media.to_native(rect), [72.0, 672.0, 300.0, 696.0]);

        let shifted = MediaBox::from_array([10.0, 20.0, 210.0, 320.0]);
        assert_eq!(shifted.size(), PageSize::new(200.0, 300.0));
        let rect = shifted.to_top_left([20.0, 300.0, 60.0, 310.0]);
        assert_eq!(rect.0.to_array(), [10.0, 10.0, 50.0, 20.0]);
        assert_eq!(shifted.to_native(rect), [20.0, 300.0, 60.0, 310.0]);
    }

    #[test]
    fn text_strings_decode_utf16_and_latin1() {
        assert_eq!(decode_text(b"plain"), "plain");
        assert_eq!(decode_text(&[0xFE, 0xFF, 0x00, 0x5A, 0x00, 0xEB]), "Zë");
        assert_eq!(decode_text(&[0x5A, 0xEB]), "Zë");

        match text_object("Zoë") {
            Object::String(bytes, _) => assert_eq!(decode_text(&bytes), "Zoë"),
            other => panic!("unexpected object {other:?}"),
        }
    }
}
