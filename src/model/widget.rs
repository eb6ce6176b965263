//! Widgets as reported by the on-device daemon.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use image::RgbaImage;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::identity::{config_id_of, IdentitySource, LazyIdentity};

/// Screen rectangle of a widget.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Bounds {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Bounds {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Centre point, used as the gesture target.
    pub fn center(&self) -> (i32, i32) {
        (
            self.x.saturating_add(self.width / 2),
            self.y.saturating_add(self.height / 2),
        )
    }
}

/// Raw widget record from a UI-tree snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WidgetData {
    pub text: String,
    pub content_desc: String,
    pub resource_id: String,
    pub class_name: String,
    pub package_name: String,
    pub bounds: Bounds,
    pub clickable: bool,
    pub long_clickable: bool,
    pub scrollable: bool,
    /// `None` when the widget is not checkable.
    pub checked: Option<bool>,
    /// `None` when the widget is not focusable.
    pub focused: Option<bool>,
    pub enabled: bool,
    pub visible: bool,
    pub is_password: bool,
    pub selected: bool,
    /// Position in the UI tree.
    pub xpath: String,
    /// Path of the parent node, absent for the root.
    pub parent_xpath: Option<String>,
    pub is_leaf: bool,
}

impl WidgetData {
    /// Text and description, the identifying content of a widget.
    pub fn content(&self) -> String {
        format!("{}{}", self.text, self.content_desc)
    }

    pub fn has_content(&self) -> bool {
        !self.text.is_empty() || !self.content_desc.is_empty()
    }

    pub fn is_checkable(&self) -> bool {
        self.checked.is_some()
    }

    /// Whether a gesture on this widget can have an effect.
    pub fn can_be_acted_upon(&self) -> bool {
        self.enabled
            && self.visible
            && (self.clickable || self.long_clickable || self.scrollable || self.is_checkable())
    }

    /// Structural equality including screen location.
    pub fn is_equivalent(&self, other: &WidgetData) -> bool {
        self.bounds == other.bounds && self.is_equivalent_ignore_location(other)
    }

    /// Structural equality at whatever position.
    pub fn is_equivalent_ignore_location(&self, other: &WidgetData) -> bool {
        self.text == other.text
            && self.content_desc == other.content_desc
            && self.resource_id == other.resource_id
            && self.class_name == other.class_name
            && self.package_name == other.package_name
            && self.clickable == other.clickable
            && self.long_clickable == other.long_clickable
            && self.scrollable == other.scrollable
            && self.checked.is_some() == other.checked.is_some()
            && self.is_password == other.is_password
    }

    fn simple_class_name(&self) -> &str {
        self.class_name
            .rsplit('.')
            .next()
            .unwrap_or(&self.class_name)
    }
}

/// A widget with its derived identifiers.
///
/// Immutable once built. Two widgets are equal iff both their identity and
/// their configuration id match.
#[derive(Clone, Serialize, Deserialize)]
#[serde(into = "WidgetRecord", from = "WidgetRecord")]
pub struct Widget {
    data: Arc<WidgetData>,
    uid: LazyIdentity,
    config_id: Uuid,
}

impl Widget {
    /// Build a widget whose identity can only come from its content.
    pub fn new(data: WidgetData) -> Self {
        let uid = LazyIdentity::deferred(IdentitySource::from_snapshot(&data, None));
        Self::with_identity(data, uid)
    }

    /// Build a widget from a snapshot and the screen it was captured on.
    ///
    /// The widget's pixel region is copied right away; hashing is issued on
    /// the blocking pool when a tokio runtime is available.
    pub fn from_snapshot(data: WidgetData, screen: Option<&RgbaImage>) -> Self {
        let uid = LazyIdentity::spawn(IdentitySource::from_snapshot(&data, screen));
        Self::with_identity(data, uid)
    }

    fn with_identity(data: WidgetData, uid: LazyIdentity) -> Self {
        let config_id = config_id_of(&data);
        Self {
            data: Arc::new(data),
            uid,
            config_id,
        }
    }

    /// Content identity, blocking until it has been computed.
    pub fn uid(&self) -> Uuid {
        self.uid.get()
    }

    pub fn config_id(&self) -> Uuid {
        self.config_id
    }

    /// The `(uid, config_id)` pair.
    pub fn id(&self) -> (Uuid, Uuid) {
        (self.uid(), self.config_id)
    }

    pub fn data(&self) -> &WidgetData {
        &self.data
    }

    pub fn text(&self) -> &str {
        &self.data.text
    }

    pub fn resource_id(&self) -> &str {
        &self.data.resource_id
    }

    pub fn package_name(&self) -> &str {
        &self.data.package_name
    }

    pub fn bounds(&self) -> Bounds {
        self.data.bounds
    }

    pub fn can_be_acted_upon(&self) -> bool {
        self.data.can_be_acted_upon()
    }

    pub fn is_equivalent(&self, other: &Widget) -> bool {
        self.data.is_equivalent(&other.data)
    }

    pub fn is_equivalent_ignore_location(&self, other: &Widget) -> bool {
        self.data.is_equivalent_ignore_location(&other.data)
    }

    /// Compact description for logs.
    pub fn to_short_string(&self) -> String {
        let (cx, cy) = self.data.bounds.center();
        format!(
            "Wdgt:{}/\"{}\"/\"{}\"/[{},{}]",
            self.data.simple_class_name(),
            self.data.text,
            self.data.resource_id,
            cx,
            cy
        )
    }
}

impl PartialEq for Widget {
    fn eq(&self, other: &Self) -> bool {
        self.config_id == other.config_id && self.uid() == other.uid()
    }
}

impl Eq for Widget {}

impl Hash for Widget {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id().hash(state);
    }
}

impl fmt::Debug for Widget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}_{}:{}", self.uid, self.config_id, self.to_short_string())
    }
}

/// Serialized form of a [`Widget`], keeping the identity it was observed with.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct WidgetRecord {
    uid: Uuid,
    config_id: Uuid,
    data: WidgetData,
}

impl From<Widget> for WidgetRecord {
    fn from(widget: Widget) -> Self {
        Self {
            uid: widget.uid(),
            config_id: widget.config_id,
            data: (*widget.data).clone(),
        }
    }
}

impl From<WidgetRecord> for Widget {
    fn from(record: WidgetRecord) -> Self {
        Self {
            data: Arc::new(record.data),
            uid: LazyIdentity::ready(record.uid),
            config_id: record.config_id,
        }
    }
}
