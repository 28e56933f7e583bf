//! Leaf action execution: SEARCH, VISIT, THINK, SAVE, plus the external
//! collaborators they call through.

pub mod actions;
pub mod chroma;
pub mod http_fetch;
pub mod http_search;
pub mod io;
pub mod registry;

pub use chroma::ChromaVectorStore;
pub use http_fetch::HttpPageFetcher;
pub use http_search::SearxSearchProvider;
pub use io::{ActionIo, FetchedPage, IoError, IoResult, PageFetcher, SearchHit, SearchProvider, VectorStore};
pub use registry::{default_registry, ActionOutcome, ActionRegistry, LeafAction};
