//! Content and label collaborators.

mod source;
mod types;

pub use source::{ApiLabelSource, ContentSource, IpfsManifestSource, LabelSource, RandomClipSource};
pub use types::{Content, LabelOption, MediaKind, SwipeDirection};
