//! Widget and screen identity model.

mod identity;
mod screen;
mod widget;

pub use identity::{
    config_id_of, identity_of, screen_identity_of, IdentitySource, LazyIdentity, EMPTY_IDENTITY,
    IDENTITY_NAMESPACE,
};
pub use screen::{ScreenContext, PERMISSION_ALLOW_BUTTON};
pub use widget::{Bounds, Widget, WidgetData};

#[cfg(test)]
pub(crate) use widget::tests::button;
