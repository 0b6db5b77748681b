pub mod geometry {
    use glam::DVec2;
    use serde::{Deserialize, Serialize};

    /// 二维点，内部以 `glam::DVec2` 表示。画布坐标与 PDF 坐标共用该类型，
    /// 由调用方通过函数命名区分所在空间。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Point2(pub DVec2);

    impl Point2 {
        #[inline]
        pub fn new(x: f64, y: f64) -> Self {
            Self(DVec2::new(x, y))
        }

        #[inline]
        pub fn from_vec(vec: DVec2) -> Self {
            Self(vec)
        }

        #[inline]
        pub fn x(self) -> f64 {
            self.0.x
        }

        #[inline]
        pub fn y(self) -> f64 {
            self.0.y
        }

        #[inline]
        pub fn translate(self, offset: Vector2) -> Self {
            Self(self.0 + offset.0)
        }

        #[inline]
        pub fn as_vec2(self) -> DVec2 {
            self.0
        }
    }

    impl From<DVec2> for Point2 {
        fn from(value: DVec2) -> Self {
            Self::from_vec(value)
        }
    }

    /// 二维向量，用于位移、尺寸与画布偏移。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Vector2(pub DVec2);

    impl Vector2 {
        #[inline]
        pub fn new(x: f64, y: f64) -> Self {
            Self(DVec2::new(x, y))
        }

        #[inline]
        pub fn splat(value: f64) -> Self {
            Self(DVec2::splat(value))
        }

        #[inline]
        pub fn zero() -> Self {
            Self(DVec2::ZERO)
        }

        #[inline]
        pub fn from_points(start: Point2, end: Point2) -> Self {
            Self(end.0 - start.0)
        }

        #[inline]
        pub fn as_vec2(self) -> DVec2 {
            self.0
        }

        #[inline]
        pub fn x(self) -> f64 {
            self.0.x
        }

        #[inline]
        pub fn y(self) -> f64 {
            self.0.y
        }
    }

    impl From<DVec2> for Vector2 {
        fn from(value: DVec2) -> Self {
            Self(value)
        }
    }

    /// 轴对齐矩形，始终保持 `min <= max`。序列化为 `[x0, y0, x1, y1]`。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    #[serde(from = "[f64; 4]", into = "[f64; 4]")]
    pub struct Rect {
        min: Point2,
        max: Point2,
    }

    impl Rect {
        /// 由任意两个角点构造，倒置的坐标会被交换。
        pub fn new(a: Point2, b: Point2) -> Self {
            let min = a.as_vec2().min(b.as_vec2());
            let max = a.as_vec2().max(b.as_vec2());
            Self {
                min: Point2::from_vec(min),
                max: Point2::from_vec(max),
            }
        }

        #[inline]
        pub fn from_coords(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
            Self::new(Point2::new(x0, y0), Point2::new(x1, y1))
        }

        #[inline]
        pub fn from_origin_size(origin: Point2, size: Vector2) -> Self {
            Self::new(origin, origin.translate(size))
        }

        #[inline]
        pub fn min(&self) -> Point2 {
            self.min
        }

        #[inline]
        pub fn max(&self) -> Point2 {
            self.max
        }

        #[inline]
        pub fn x0(&self) -> f64 {
            self.min.x()
        }

        #[inline]
        pub fn y0(&self) -> f64 {
            self.min.y()
        }

        #[inline]
        pub fn x1(&self) -> f64 {
            self.max.x()
        }

        #[inline]
        pub fn y1(&self) -> f64 {
            self.max.y()
        }

        #[inline]
        pub fn width(&self) -> f64 {
            self.max.x() - self.min.x()
        }

        #[inline]
        pub fn height(&self) -> f64 {
            self.max.y() - self.min.y()
        }

        #[inline]
        pub fn size(&self) -> Vector2 {
            Vector2::from_points(self.min, self.max)
        }

        #[inline]
        pub fn center(&self) -> Point2 {
            Point2::from_vec((self.min.as_vec2() + self.max.as_vec2()) * 0.5)
        }

        /// 宽高均为正时才是合法的字段矩形。
        #[inline]
        pub fn is_valid(&self) -> bool {
            self.width() > 0.0 && self.height() > 0.0
        }

        /// 闭区间命中测试，边界上的点视为命中。
        #[inline]
        pub fn contains(&self, point: Point2) -> bool {
            point.x() >= self.min.x()
                && point.x() <= self.max.x()
                && point.y() >= self.min.y()
                && point.y() <= self.max.y()
        }

        #[inline]
        pub fn contains_rect(&self, other: &Rect) -> bool {
            self.contains(other.min) && self.contains(other.max)
        }

        #[inline]
        pub fn translate(&self, offset: Vector2) -> Self {
            Self {
                min: self.min.translate(offset),
                max: self.max.translate(offset),
            }
        }

        #[inline]
        pub fn to_array(&self) -> [f64; 4] {
            [self.x0(), self.y0(), self.x1(), self.y1()]
        }

        /// 坐标逐项比较，供测试与日志使用。
        pub fn approx_eq(&self, other: &Rect, tolerance: f64) -> bool {
            self.to_array()
                .iter()
                .zip(other.to_array().iter())
                .all(|(a, b)| (a - b).abs() <= tolerance)
        }
    }

    impl From<[f64; 4]> for Rect {
        fn from(value: [f64; 4]) -> Self {
            Self::from_coords(value[0], value[1], value[2], value[3])
        }
    }

    impl From<Rect> for [f64; 4] {
        fn from(value: Rect) -> Self {
            value.to_array()
        }
    }

    /// PDF 空间矩形（单位：point），字段位置的唯一可信来源。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct PdfRect(pub Rect);

    impl PdfRect {
        #[inline]
        pub fn from_coords(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
            Self(Rect::from_coords(x0, y0, x1, y1))
        }

        #[inline]
        pub fn rect(&self) -> &Rect {
            &self.0
        }
    }

    /// 画布空间矩形（单位：像素），随缩放与平移变化，只作为派生缓存存在。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct CanvasRect(pub Rect);

    impl CanvasRect {
        #[inline]
        pub fn from_coords(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
            Self(Rect::from_coords(x0, y0, x1, y1))
        }

        #[inline]
        pub fn rect(&self) -> &Rect {
            &self.0
        }
    }

    /// 页面尺寸（PDF point）。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct PageSize {
        pub width: f64,
        pub height: f64,
    }

    impl PageSize {
        /// US Letter，演示文档与测试的默认页面。
        pub const LETTER: PageSize = PageSize {
            width: 612.0,
            height: 792.0,
        };

        #[inline]
        pub fn new(width: f64, height: f64) -> Self {
            Self { width, height }
        }

        /// 页面在 PDF 空间中的边界 `[0, 0, width, height]`。
        #[inline]
        pub fn bounds(&self) -> PdfRect {
            PdfRect::from_coords(0.0, 0.0, self.width, self.height)
        }

        #[inline]
        pub fn contains(&self, rect: &PdfRect) -> bool {
            self.bounds().0.contains_rect(&rect.0)
        }
    }
}

pub mod form {
    use std::fmt;
    use std::path::PathBuf;

    use serde::{Deserialize, Serialize};

    use crate::geometry::{CanvasRect, PdfRect};
    use crate::widget::WidgetTypeTag;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
    pub struct FieldId(u64);

    impl FieldId {
        #[inline]
        pub fn new(raw: u64) -> Self {
            Self(raw)
        }

        /// 提供原始数值，便于序列化或日志输出。
        #[inline]
        pub fn get(self) -> u64 {
            self.0
        }
    }

    /// 字段类型。采用较新的枚举集合，RADIO/DROPDOWN/LISTBOX 不再支持。
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(rename_all = "lowercase")]
    pub enum FieldKind {
        Text,
        Checkbox,
        Signature,
        Image,
        Date,
        DateTime,
    }

    impl FieldKind {
        pub const ALL: [FieldKind; 6] = [
            FieldKind::Text,
            FieldKind::Checkbox,
            FieldKind::Signature,
            FieldKind::Image,
            FieldKind::Date,
            FieldKind::DateTime,
        ];

        pub fn as_str(self) -> &'static str {
            match self {
                FieldKind::Text => "text",
                FieldKind::Checkbox => "checkbox",
                FieldKind::Signature => "signature",
                FieldKind::Image => "image",
                FieldKind::Date => "date",
                FieldKind::DateTime => "datetime",
            }
        }

        pub fn parse(value: &str) -> Option<Self> {
            let lowered = value.trim().to_ascii_lowercase();
            Self::ALL
                .into_iter()
                .find(|kind| kind.as_str() == lowered)
        }

        /// 新建字段时的默认画布尺寸（像素）。
        pub fn default_canvas_size(self) -> (f64, f64) {
            match self {
                FieldKind::Text => (100.0, 30.0),
                FieldKind::Checkbox => (20.0, 20.0),
                FieldKind::Signature => (150.0, 50.0),
                FieldKind::Image => (120.0, 90.0),
                FieldKind::Date => (120.0, 30.0),
                FieldKind::DateTime => (160.0, 30.0),
            }
        }

        #[inline]
        pub fn is_date_like(self) -> bool {
            matches!(self, FieldKind::Date | FieldKind::DateTime)
        }

        /// 保存时使用的引擎控件类型。除复选框外都以文本控件落盘：
        /// 图像与日期类靠名称前缀区分，签名靠名称中的 "signature" 识别。
        pub fn widget_tag(self) -> WidgetTypeTag {
            match self {
                FieldKind::Checkbox => WidgetTypeTag::CheckBox,
                FieldKind::Text
                | FieldKind::Signature
                | FieldKind::Image
                | FieldKind::Date
                | FieldKind::DateTime => WidgetTypeTag::Text,
            }
        }
    }

    impl fmt::Display for FieldKind {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(self.as_str())
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub enum DateFormat {
        #[default]
        #[serde(rename = "MM/DD/YYYY")]
        MonthDayYear,
        #[serde(rename = "DD/MM/YYYY")]
        DayMonthYear,
        #[serde(rename = "YYYY-MM-DD")]
        Iso,
        #[serde(rename = "DD MMM YYYY")]
        DayMonthNameYear,
        #[serde(rename = "MMM DD, YYYY")]
        MonthNameDayYear,
    }

    impl DateFormat {
        pub const ALL: [DateFormat; 5] = [
            DateFormat::MonthDayYear,
            DateFormat::DayMonthYear,
            DateFormat::Iso,
            DateFormat::DayMonthNameYear,
            DateFormat::MonthNameDayYear,
        ];

        pub fn label(self) -> &'static str {
            match self {
                DateFormat::MonthDayYear => "MM/DD/YYYY",
                DateFormat::DayMonthYear => "DD/MM/YYYY",
                DateFormat::Iso => "YYYY-MM-DD",
                DateFormat::DayMonthNameYear => "DD MMM YYYY",
                DateFormat::MonthNameDayYear => "MMM DD, YYYY",
            }
        }

        pub fn parse(label: &str) -> Option<Self> {
            let label = label.trim();
            Self::ALL.into_iter().find(|format| format.label() == label)
        }
    }

    impl fmt::Display for DateFormat {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(self.label())
        }
    }

    /// 按字段类型区分的属性集合，每个分支只携带与该类型相关的属性。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(tag = "kind", rename_all = "lowercase")]
    pub enum FieldAttributes {
        Text {
            #[serde(default)]
            value: String,
        },
        Checkbox {
            #[serde(default)]
            checked: bool,
        },
        Signature {
            #[serde(default)]
            value: String,
        },
        Image {
            #[serde(default, skip_serializing_if = "Option::is_none")]
            image_path: Option<PathBuf>,
        },
        Date {
            #[serde(default)]
            format: DateFormat,
            #[serde(default)]
            value: String,
        },
        DateTime {
            #[serde(default)]
            format: DateFormat,
            #[serde(default)]
            value: String,
        },
    }

    impl FieldAttributes {
        /// 指定类型的空白属性。
        pub fn defaults_for(kind: FieldKind) -> Self {
            match kind {
                FieldKind::Text => FieldAttributes::Text {
                    value: String::new(),
                },
                FieldKind::Checkbox => FieldAttributes::Checkbox { checked: false },
                FieldKind::Signature => FieldAttributes::Signature {
                    value: String::new(),
                },
                FieldKind::Image => FieldAttributes::Image { image_path: None },
                FieldKind::Date => FieldAttributes::Date {
                    format: DateFormat::default(),
                    value: String::new(),
                },
                FieldKind::DateTime => FieldAttributes::DateTime {
                    format: DateFormat::default(),
                    value: String::new(),
                },
            }
        }

        pub fn kind(&self) -> FieldKind {
            match self {
                FieldAttributes::Text { .. } => FieldKind::Text,
                FieldAttributes::Checkbox { .. } => FieldKind::Checkbox,
                FieldAttributes::Signature { .. } => FieldKind::Signature,
                FieldAttributes::Image { .. } => FieldKind::Image,
                FieldAttributes::Date { .. } => FieldKind::Date,
                FieldAttributes::DateTime { .. } => FieldKind::DateTime,
            }
        }

        /// 文本型取值；复选框与图像字段返回 `None`。
        pub fn text_value(&self) -> Option<&str> {
            match self {
                FieldAttributes::Text { value }
                | FieldAttributes::Signature { value }
                | FieldAttributes::Date { value, .. }
                | FieldAttributes::DateTime { value, .. } => Some(value),
                FieldAttributes::Checkbox { .. } | FieldAttributes::Image { .. } => None,
            }
        }

        pub fn date_format(&self) -> Option<DateFormat> {
            match self {
                FieldAttributes::Date { format, .. } | FieldAttributes::DateTime { format, .. } => {
                    Some(*format)
                }
                _ => None,
            }
        }

        /// 写入 PDF 时的字符串形式。
        pub fn display_value(&self) -> String {
            match self {
                FieldAttributes::Checkbox { checked } => {
                    let state = if *checked { "Yes" } else { "Off" };
                    state.to_string()
                }
                FieldAttributes::Image { image_path } => image_path
                    .as_ref()
                    .map(|path| path.to_string_lossy().into_owned())
                    .unwrap_or_default(),
                other => other.text_value().unwrap_or_default().to_string(),
            }
        }
    }

    /// 表单字段记录。`rect` 位于 PDF 空间，是位置的唯一可信来源；
    /// `canvas_rect` 只是最近一次重绘时的派生缓存。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct FormField {
        pub id: FieldId,
        pub name: String,
        pub page: usize,
        pub rect: PdfRect,
        pub attributes: FieldAttributes,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub origin_name: Option<String>,
        #[serde(skip)]
        pub canvas_rect: Option<CanvasRect>,
    }

    impl FormField {
        pub fn new(
            id: FieldId,
            name: impl Into<String>,
            page: usize,
            rect: PdfRect,
            attributes: FieldAttributes,
        ) -> Self {
            Self {
                id,
                name: name.into(),
                page,
                rect,
                attributes,
                origin_name: None,
                canvas_rect: None,
            }
        }

        #[inline]
        pub fn kind(&self) -> FieldKind {
            self.attributes.kind()
        }
    }
}

pub mod widget {
    use serde::{Deserialize, Serialize};

    use crate::form::FieldKind;
    use crate::geometry::PdfRect;

    pub const IMAGE_PREFIX: &str = "image_";
    pub const DATE_PREFIX: &str = "date_";
    pub const DATETIME_PREFIX: &str = "datetime_";

    /// 引擎无关的控件类型标签。
    #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub enum WidgetTypeTag {
        Text,
        CheckBox,
        RadioButton,
        ComboBox,
        ListBox,
        PushButton,
        Signature,
        Unknown(String),
    }

    impl WidgetTypeTag {
        pub fn describe(&self) -> String {
            match self {
                WidgetTypeTag::Text => "text".to_string(),
                WidgetTypeTag::CheckBox => "checkbox".to_string(),
                WidgetTypeTag::RadioButton => "radiobutton".to_string(),
                WidgetTypeTag::ComboBox => "combobox".to_string(),
                WidgetTypeTag::ListBox => "listbox".to_string(),
                WidgetTypeTag::PushButton => "pushbutton".to_string(),
                WidgetTypeTag::Signature => "signature".to_string(),
                WidgetTypeTag::Unknown(raw) => format!("unknown({raw})"),
            }
        }
    }

    /// 扫描已有表单得到的控件描述，矩形已转换到 PDF 空间（左上原点）。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct WidgetDescriptor {
        pub page: usize,
        pub tag: WidgetTypeTag,
        pub name: String,
        pub rect: PdfRect,
        #[serde(default)]
        pub value: String,
    }

    /// 填写模式下写回控件的值。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub enum FieldValue {
        Text(String),
        Checked(bool),
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct FilledValue {
        pub page: usize,
        pub widget_name: String,
        pub value: FieldValue,
    }

    /// 类型前缀，仅对引擎无法原生持久化的类型生效。
    pub fn kind_prefix(kind: FieldKind) -> Option<&'static str> {
        match kind {
            FieldKind::Image => Some(IMAGE_PREFIX),
            FieldKind::Date => Some(DATE_PREFIX),
            FieldKind::DateTime => Some(DATETIME_PREFIX),
            FieldKind::Text | FieldKind::Checkbox | FieldKind::Signature => None,
        }
    }

    /// 保存时的控件名：在显示名前拼接类型前缀。
    pub fn encode_widget_name(kind: FieldKind, name: &str) -> String {
        match kind_prefix(kind) {
            Some(prefix) => format!("{prefix}{name}"),
            None => name.to_string(),
        }
    }

    /// 识别前导类型前缀并精确移除；最长前缀优先匹配。
    pub fn strip_kind_prefix(raw_name: &str) -> Option<(FieldKind, &str)> {
        const ORDERED: [(FieldKind, &str); 3] = [
            (FieldKind::DateTime, DATETIME_PREFIX),
            (FieldKind::Date, DATE_PREFIX),
            (FieldKind::Image, IMAGE_PREFIX),
        ];
        ORDERED
            .into_iter()
            .find_map(|(kind, prefix)| raw_name.strip_prefix(prefix).map(|rest| (kind, rest)))
    }

    /// 无前缀类型的显示名若以保留前缀开头，保存后会被误读为其他类型；返回冲突的前缀。
    pub fn reserved_prefix_clash(kind: FieldKind, name: &str) -> Option<&'static str> {
        if kind_prefix(kind).is_some() {
            return None;
        }
        strip_kind_prefix(name).and_then(|(prefixed, _)| kind_prefix(prefixed))
    }

    /// 控件分类结果。不支持的类型以标签形式返回，由调用方跳过并记录。
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum WidgetClass {
        Supported {
            kind: FieldKind,
            display_name: String,
        },
        Unsupported {
            tag: WidgetTypeTag,
        },
    }

    /// 将引擎控件类型映射到内部字段类型，为全函数，永不失败。
    pub fn classify_widget(tag: &WidgetTypeTag, raw_name: &str, value: &str) -> WidgetClass {
        match tag {
            WidgetTypeTag::Text => {
                if let Some((kind, rest)) = strip_kind_prefix(raw_name) {
                    return WidgetClass::Supported {
                        kind,
                        display_name: rest.to_string(),
                    };
                }
                let kind = if looks_like_signature(raw_name, value) {
                    FieldKind::Signature
                } else {
                    FieldKind::Text
                };
                WidgetClass::Supported {
                    kind,
                    display_name: raw_name.to_string(),
                }
            }
            WidgetTypeTag::CheckBox => WidgetClass::Supported {
                kind: FieldKind::Checkbox,
                display_name: raw_name.to_string(),
            },
            WidgetTypeTag::Signature => WidgetClass::Supported {
                kind: FieldKind::Signature,
                display_name: raw_name.to_string(),
            },
            WidgetTypeTag::RadioButton
            | WidgetTypeTag::ComboBox
            | WidgetTypeTag::ListBox
            | WidgetTypeTag::PushButton
            | WidgetTypeTag::Unknown(_) => WidgetClass::Unsupported { tag: tag.clone() },
        }
    }

    fn looks_like_signature(raw_name: &str, value: &str) -> bool {
        raw_name.to_lowercase().contains("signature") || value.to_lowercase().contains("signature")
    }
}
