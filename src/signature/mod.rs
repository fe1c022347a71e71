//! Page-layout signatures.
//!
//! [`compute`] maps a [`PageDescriptor`] from the layout analyzer to a fixed-layout
//! [`SignatureVector`]; [`infer_category`] assigns the page a
//! [`PatternCategory`](crate::model::PatternCategory). Both are pure.

pub mod compute;
pub mod descriptor;
pub mod vector;

#[cfg(test)]
mod tests;

pub use compute::{compute, infer_category};
pub use descriptor::{Complexity, PageDescriptor, PageKind};
pub use vector::{SignatureVector, validate_features};
