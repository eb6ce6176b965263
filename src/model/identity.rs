//! Content-addressed identifiers for widgets and screens.
//!
//! A widget's identity is derived from its textual content when it has any,
//! otherwise from the raw pixels it occupies on the captured screen. Pixel
//! hashing is comparatively expensive, so the identity is held in a
//! single-assignment cell that can be materialized on a blocking worker while
//! the exploration loop keeps going. Readers block until the value is set.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use image::RgbaImage;
use once_cell::sync::OnceCell;
use uuid::Uuid;

use super::widget::{Bounds, WidgetData};

/// Namespace for all identifiers produced by this module.
pub const IDENTITY_NAMESPACE: Uuid = Uuid::from_u128(0x6d1f_3c2a_8e4b_5f70_9a1d_2b3c_4d5e_6f70);

/// Identity of a widget that has neither content nor a usable screen region.
pub const EMPTY_IDENTITY: Uuid = Uuid::nil();

/// Input from which a widget identity is computed.
#[derive(Clone, PartialEq, Eq)]
pub enum IdentitySource {
    /// Concatenated text and content description.
    Content(String),
    /// Raw RGBA bytes of the widget's screen region.
    Pixels(Vec<u8>),
    /// Nothing to hash.
    Empty,
}

impl IdentitySource {
    /// Pick the identity input for a widget snapshot.
    ///
    /// # Arguments
    /// * `data` - The widget snapshot.
    /// * `screen` - The captured screen, if one was taken.
    pub fn from_snapshot(data: &WidgetData, screen: Option<&RgbaImage>) -> Self {
        let content = data.content();
        if !content.is_empty() {
            return Self::Content(content);
        }

        match screen.and_then(|img| crop_pixels(img, &data.bounds)) {
            Some(pixels) => Self::Pixels(pixels),
            None => Self::Empty,
        }
    }

    /// Hash the input into an identifier.
    pub fn compute(&self) -> Uuid {
        match self {
            Self::Content(content) => Uuid::new_v5(&IDENTITY_NAMESPACE, content.as_bytes()),
            Self::Pixels(pixels) => Uuid::new_v5(&IDENTITY_NAMESPACE, pixels),
            Self::Empty => EMPTY_IDENTITY,
        }
    }
}

impl fmt::Debug for IdentitySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Content(content) => write!(f, "Content({:?})", content),
            Self::Pixels(pixels) => write!(f, "Pixels({} bytes)", pixels.len()),
            Self::Empty => write!(f, "Empty"),
        }
    }
}

/// Copy the RGBA bytes inside `bounds`, clamped to the image.
///
/// Returns `None` when the clamped region is empty.
fn crop_pixels(img: &RgbaImage, bounds: &Bounds) -> Option<Vec<u8>> {
    let clamp = |v: i64, max: u32| v.clamp(0, max as i64) as u32;

    let x0 = clamp(bounds.x as i64, img.width());
    let y0 = clamp(bounds.y as i64, img.height());
    let x1 = clamp(bounds.x as i64 + bounds.width as i64, img.width());
    let y1 = clamp(bounds.y as i64 + bounds.height as i64, img.height());

    if x1 <= x0 || y1 <= y0 {
        return None;
    }

    let region = image::imageops::crop_imm(img, x0, y0, x1 - x0, y1 - y0).to_image();
    Some(region.into_raw())
}

struct IdentityCell {
    value: OnceCell<Uuid>,
    source: Mutex<Option<IdentitySource>>,
}

/// Single-assignment widget identity.
///
/// The cell starts out holding its [`IdentitySource`] and is materialized at
/// most once, either by a background worker ([`LazyIdentity::spawn`]) or by
/// the first reader. Concurrent readers block on the in-flight computation
/// instead of observing a partial value.
#[derive(Clone)]
pub struct LazyIdentity {
    cell: Arc<IdentityCell>,
}

impl LazyIdentity {
    /// An identity whose value is already known.
    pub fn ready(uid: Uuid) -> Self {
        Self {
            cell: Arc::new(IdentityCell {
                value: OnceCell::with_value(uid),
                source: Mutex::new(None),
            }),
        }
    }

    /// An identity computed on first read.
    pub fn deferred(source: IdentitySource) -> Self {
        Self {
            cell: Arc::new(IdentityCell {
                value: OnceCell::new(),
                source: Mutex::new(Some(source)),
            }),
        }
    }

    /// An identity whose computation is issued immediately on the tokio
    /// blocking pool. Outside a runtime this behaves like [`Self::deferred`].
    pub fn spawn(source: IdentitySource) -> Self {
        let identity = Self::deferred(source);

        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let worker = identity.clone();
            handle.spawn_blocking(move || {
                worker.get();
            });
        }

        identity
    }

    /// Read the identity, blocking until it is materialized.
    pub fn get(&self) -> Uuid {
        *self.cell.value.get_or_init(|| {
            let source = self
                .cell
                .source
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take();
            source.map(|s| s.compute()).unwrap_or(EMPTY_IDENTITY)
        })
    }

    /// Whether the value has been materialized.
    pub fn is_ready(&self) -> bool {
        self.cell.value.get().is_some()
    }
}

impl fmt::Debug for LazyIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.cell.value.get() {
            Some(uid) => write!(f, "Ready({})", uid),
            None => write!(f, "Pending"),
        }
    }
}

/// Compute a widget identity synchronously.
///
/// # Arguments
/// * `data` - The widget snapshot.
/// * `screen` - The captured screen, if one was taken.
pub fn identity_of(data: &WidgetData, screen: Option<&RgbaImage>) -> Uuid {
    IdentitySource::from_snapshot(data, screen).compute()
}

/// Hash of the volatile properties of a widget.
///
/// Two observations of the same logical widget share their identity but
/// differ here when their state or placement changed.
pub fn config_id_of(data: &WidgetData) -> Uuid {
    let config = format!(
        "checked={:?};focused={:?};enabled={};visible={};selected={};clickable={};long_clickable={};scrollable={};password={};bounds={},{},{},{};xpath={}",
        data.checked,
        data.focused,
        data.enabled,
        data.visible,
        data.selected,
        data.clickable,
        data.long_clickable,
        data.scrollable,
        data.is_password,
        data.bounds.x,
        data.bounds.y,
        data.bounds.width,
        data.bounds.height,
        data.xpath,
    );
    Uuid::new_v5(&IDENTITY_NAMESPACE, config.as_bytes())
}

/// Order-independent identity of a set of widget identities.
pub fn screen_identity_of<I>(widget_ids: I) -> Uuid
where
    I: IntoIterator<Item = Uuid>,
{
    let mut ids: Vec<Uuid> = widget_ids.into_iter().collect();
    ids.sort_unstable();

    let bytes: Vec<u8> = ids.iter().flat_map(|id| id.as_bytes().iter().copied()).collect();
    Uuid::new_v5(&IDENTITY_NAMESPACE, &bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn text_widget(text: &str, x: i32, y: i32) -> WidgetData {
        WidgetData {
            text: text.to_string(),
            bounds: Bounds::new(x, y, 10, 10),
            ..WidgetData::default()
        }
    }

    #[test]
    fn test_identity_ignores_bounds() {
        let a = text_widget("OK", 0, 0);
        let b = text_widget("OK", 50, 50);
        assert_eq!(identity_of(&a, None), identity_of(&b, None));
    }

    #[test]
    fn test_identity_is_content_sensitive() {
        let ok = text_widget("OK", 0, 0);
        let cancel = text_widget("Cancel", 0, 0);
        assert_ne!(identity_of(&ok, None), identity_of(&cancel, None));

        let spaced = text_widget("OK ", 0, 0);
        assert_ne!(identity_of(&ok, None), identity_of(&spaced, None));
    }

    #[test]
    fn test_identity_uses_description() {
        let mut a = WidgetData::default();
        a.content_desc = "Navigate up".to_string();
        assert_ne!(identity_of(&a, None), EMPTY_IDENTITY);
    }

    #[test]
    fn test_identity_without_content_or_image_is_empty() {
        let data = WidgetData {
            bounds: Bounds::new(0, 0, 10, 10),
            ..WidgetData::default()
        };
        assert_eq!(identity_of(&data, None), EMPTY_IDENTITY);
    }

    #[test]
    fn test_identity_from_pixels() {
        let mut img = RgbaImage::from_pixel(40, 40, Rgba([0, 0, 0, 255]));
        for x in 20..30 {
            for y in 20..30 {
                img.put_pixel(x, y, Rgba([255, 0, 0, 255]));
            }
        }

        let black = WidgetData {
            bounds: Bounds::new(0, 0, 10, 10),
            ..WidgetData::default()
        };
        let other_black = WidgetData {
            bounds: Bounds::new(5, 5, 10, 10),
            ..WidgetData::default()
        };
        let red = WidgetData {
            bounds: Bounds::new(20, 20, 10, 10),
            ..WidgetData::default()
        };

        let black_id = identity_of(&black, Some(&img));
        assert_ne!(black_id, EMPTY_IDENTITY);
        assert_eq!(black_id, identity_of(&other_black, Some(&img)));
        assert_ne!(black_id, identity_of(&red, Some(&img)));
    }

    #[test]
    fn test_offscreen_widget_is_empty() {
        let img = RgbaImage::from_pixel(10, 10, Rgba([0, 0, 0, 255]));
        let data = WidgetData {
            bounds: Bounds::new(100, 100, 10, 10),
            ..WidgetData::default()
        };
        assert_eq!(identity_of(&data, Some(&img)), EMPTY_IDENTITY);
    }

    #[test]
    fn test_config_id_tracks_state_not_content() {
        let mut a = text_widget("Wi-Fi", 0, 0);
        a.checked = Some(false);
        let mut b = a.clone();
        b.checked = Some(true);

        assert_eq!(identity_of(&a, None), identity_of(&b, None));
        assert_ne!(config_id_of(&a), config_id_of(&b));

        let mut renamed = a.clone();
        renamed.text = "Bluetooth".to_string();
        assert_eq!(config_id_of(&a), config_id_of(&renamed));
    }

    #[test]
    fn test_screen_identity_is_order_independent() {
        let a = identity_of(&text_widget("A", 0, 0), None);
        let b = identity_of(&text_widget("B", 0, 0), None);
        assert_eq!(screen_identity_of([a, b]), screen_identity_of([b, a]));
        assert_ne!(screen_identity_of([a]), screen_identity_of([a, b]));
    }

    #[test]
    fn test_lazy_identity_materializes_once() {
        let source = IdentitySource::Content("Settings".to_string());
        let expected = source.compute();

        let lazy = LazyIdentity::deferred(source);
        assert!(!lazy.is_ready());
        assert_eq!(lazy.get(), expected);
        assert!(lazy.is_ready());

        let copy = lazy.clone();
        assert_eq!(copy.get(), expected);
    }

    #[test]
    fn test_lazy_identity_concurrent_readers_agree() {
        let lazy = LazyIdentity::deferred(IdentitySource::Pixels(vec![7u8; 4096]));
        let readers: Vec<_> = (0..8)
            .map(|_| {
                let l = lazy.clone();
                std::thread::spawn(move || l.get())
            })
            .collect();

        let ids: Vec<Uuid> = readers.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(ids.windows(2).all(|w| w[0] == w[1]));
    }

    #[tokio::test]
    async fn test_spawned_identity_matches_sync_computation() {
        let source = IdentitySource::Content("Login".to_string());
        let expected = source.compute();
        let lazy = LazyIdentity::spawn(source);
        assert_eq!(lazy.get(), expected);
    }
}
