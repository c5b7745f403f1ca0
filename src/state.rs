//! State management module - namespaced shared state cells
//!
//! A [`StateRegistry`] maps namespace strings to [`StateCell`]s. Each cell
//! holds the current value, notifies its subscribers synchronously on every
//! update and, when created with `persist: true`, mirrors its value into a
//! [`Storage`](crate::storage::Storage) backend.

mod binding;
mod cell;
mod registry;
mod shared;
mod types;

pub use binding::{Binding, Setter};
pub use cell::StateCell;
pub use registry::StateRegistry;
pub use shared::{install_shared, shared};
pub use types::{subscriber, StateValue, StoreOptions, Subscriber};
