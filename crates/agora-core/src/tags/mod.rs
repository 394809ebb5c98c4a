//! Hierarchical tag navigation.
//!
//! `NavigatorState` is an immutable value: the ancestor path (root at the
//! bottom) and the children currently displayed. `TagNavigator` turns a
//! state and an input into the next state, fetching children through the
//! `Repository`.

pub mod navigator;

pub use navigator::{NavigatorState, TagNavigator};
