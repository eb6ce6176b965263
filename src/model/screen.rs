//! Screen contexts: the set of widgets visible at one point in time.

use image::RgbaImage;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::identity::screen_identity_of;
use super::widget::{Widget, WidgetData};

/// Packages that host runtime permission dialogs.
const PERMISSION_DIALOG_PACKAGES: &[&str] = &[
    "com.android.packageinstaller",
    "com.google.android.packageinstaller",
    "com.android.permissioncontroller",
    "com.google.android.permissioncontroller",
];

/// Resource id suffix of the "allow" button in permission dialogs.
pub const PERMISSION_ALLOW_BUTTON: &str = "permission_allow_button";

/// One observed screen.
///
/// The identity is a pure function of the member widgets' identities, so
/// re-observing an identical screen yields the same id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenContext {
    uid: Uuid,
    widgets: Vec<Widget>,
}

impl ScreenContext {
    /// Build a screen from already-constructed widgets.
    pub fn new(widgets: Vec<Widget>) -> Self {
        let uid = screen_identity_of(widgets.iter().map(Widget::uid));
        Self { uid, widgets }
    }

    /// Build a screen from a raw UI-tree snapshot.
    ///
    /// Pixel hashes are issued on the blocking pool for every widget before
    /// any of them is read, so the hashing runs in parallel. Call this from a
    /// blocking worker: the screen identity waits for all of them.
    ///
    /// # Arguments
    /// * `snapshot` - Widget records in tree order.
    /// * `screen` - The captured screen, used for widgets without content.
    pub fn from_snapshot(snapshot: Vec<WidgetData>, screen: Option<&RgbaImage>) -> Self {
        let widgets = snapshot
            .into_iter()
            .map(|data| Widget::from_snapshot(data, screen))
            .collect();
        Self::new(widgets)
    }

    pub fn uid(&self) -> Uuid {
        self.uid
    }

    pub fn widgets(&self) -> &[Widget] {
        &self.widgets
    }

    pub fn is_empty(&self) -> bool {
        self.widgets.is_empty()
    }

    /// Widgets a gesture can be dispatched to.
    pub fn actionable_widgets(&self) -> impl Iterator<Item = &Widget> {
        self.widgets.iter().filter(|w| w.can_be_acted_upon())
    }

    /// Whether the device launcher is in the foreground.
    pub fn is_home_screen(&self) -> bool {
        self.widgets
            .iter()
            .any(|w| w.package_name().contains("launcher"))
    }

    /// Whether any widget belongs to `package`.
    pub fn belongs_to_app(&self, package: &str) -> bool {
        self.widgets.iter().any(|w| w.package_name() == package)
    }

    /// Whether a runtime permission dialog is in the foreground.
    pub fn is_permission_dialog(&self) -> bool {
        self.widgets
            .iter()
            .any(|w| PERMISSION_DIALOG_PACKAGES.contains(&w.package_name()))
    }

    /// First widget structurally equal to `widget`, location included.
    pub fn find_equivalent(&self, widget: &Widget) -> Option<&Widget> {
        self.widgets.iter().find(|w| w.is_equivalent(widget))
    }

    /// First widget structurally equal to `widget` at any position.
    pub fn find_equivalent_ignore_location(&self, widget: &Widget) -> Option<&Widget> {
        self.widgets
            .iter()
            .find(|w| w.is_equivalent_ignore_location(widget))
    }

    /// Fraction of this screen's widgets with an exact structural match in
    /// `other`, in `[0, 1]`. An empty screen has similarity 0.
    pub fn similarity(&self, other: &ScreenContext) -> f64 {
        if self.widgets.is_empty() {
            return 0.0;
        }

        let matched = self
            .widgets
            .iter()
            .filter(|w| other.find_equivalent(w).is_some())
            .count();
        matched as f64 / self.widgets.len() as f64
    }
}
