//! Retrieval-augmented answering over live web search results.
//!
//! - `SearchResultCollector`: searches and fetches usable results
//! - `ScratchCollectionManager`: creates and resets the per-round collection
//! - `DocumentIngestor`: embeds and stores result chunks
//! - `AnswerSynthesizer`: generates the answer and attaches citations
//! - `SearchPipeline`: runs the above as one serialised round

pub mod chunker;
pub mod collection;
pub mod collector;
pub mod ingest;
pub mod memory;
pub mod notify;
pub mod pipeline;
pub mod sqlite;
pub mod store;
pub mod synthesizer;

#[cfg(test)]
pub(crate) mod testing;

pub use chunker::{RecursiveTextSplitter, TextChunk, TextSplitter};
pub use collection::{ScratchCollectionManager, VectorMemory};
pub use collector::{SearchResult, SearchResultCollector};
pub use ingest::{DocumentIngestor, IngestHooks};
pub use memory::{InMemoryBackend, InMemoryCollection};
pub use notify::{ChannelNotifier, Notification, NotificationKind, Notifier, NullNotifier, TracingNotifier};
pub use pipeline::{RoundOutcome, SearchPipeline};
pub use sqlite::{SqliteBackend, SqliteCollection};
pub use store::{CollectionBackend, CollectionInfo, Document, Metadata, Point, PointId, ScoredPoint, VectorCollection};
pub use synthesizer::{AnswerSynthesizer, CitationEntry};
