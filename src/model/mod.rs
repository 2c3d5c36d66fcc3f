//! Identities, attribute values and state records shared by every layer.
mod identity;
mod state;
mod value;

pub use identity::{GpoKey, Identity, ObjectKind};
pub use state::{CurrentState, DesiredState, Presence, TYPE_ATTR};
pub use value::{AttrMap, AttrValue, Compare};
