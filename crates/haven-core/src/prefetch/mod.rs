//! Media prefetching: a bounded cache of locally materialized clips.

mod blob;
mod cache;
mod fetcher;
mod progress;

pub use blob::{BlobHandle, BlobStore, DiskBlobStore, MemoryBlobStore};
pub use cache::PrefetchCache;
pub use fetcher::{HttpMediaFetcher, MediaFetcher};
pub use progress::{FetchProgress, PreloadProgress, PreloadStatus};
