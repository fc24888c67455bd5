//! Core types for Shop Scout.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod attachment;
pub mod id;
pub mod review;
pub mod sort;

pub use attachment::{Attachment, UploadSlot};
pub use id::*;
pub use review::{Review, ReviewInput};
pub use sort::{ReviewSortOrder, SortOrderError};
