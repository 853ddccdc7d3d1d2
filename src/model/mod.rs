//! Gateway data model.
//!
//! These are the shapes the gateway hands to its callers. The remote platform's
//! wire format is decoded into them in [`crate::platform`]; nothing here is
//! persisted locally.

mod account;
mod component;

pub use account::{AccountFilter, ConnectToken, ExternalAccount, ExternalApp};
pub use component::{
    Component, ComponentFilter, ComponentSummary, ComponentType, ConfiguredProps, PropDefinition,
    PropKind, PropOption,
};

use serde::{Deserialize, Serialize};

/// One page of a cursor-paginated listing.
///
/// `next_cursor` is opaque; `None` means this was the last page.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

impl<T> Page<T> {
    pub fn last(data: Vec<T>) -> Self {
        Self {
            data,
            next_cursor: None,
        }
    }
}
