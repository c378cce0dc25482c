use std::sync::Arc;

use crate::core::config::{AppPaths, ConfigService, Settings};
use crate::llm::{Embedder, Generator, OpenAiCompatProvider, ProviderEmbedder, ProviderGenerator, RetryPolicy};
use crate::rag::{
    AnswerSynthesizer, CollectionBackend, DocumentIngestor, InMemoryBackend, RecursiveTextSplitter,
    ScratchCollectionManager, SearchPipeline, SearchResultCollector, SqliteBackend, TextSplitter,
    VectorMemory,
};
use crate::tools::fetch::{ContentFetcher, HttpPageFetcher};
use crate::tools::search::provider_from_settings;

pub mod error;

use error::InitializationError;

/// Shared application state: configuration plus the search pipeline.
#[derive(Clone)]
pub struct AppState {
    pub paths: Arc<AppPaths>,
    pub config: ConfigService,
    pub settings: Arc<Settings>,
    pub pipeline: Arc<SearchPipeline>,
}

impl AppState {
    pub fn new(config: ConfigService, settings: Settings, pipeline: SearchPipeline) -> Arc<Self> {
        Arc::new(Self {
            paths: Arc::new(config.paths().clone()),
            config,
            settings: Arc::new(settings),
            pipeline: Arc::new(pipeline),
        })
    }

    /// Loads configuration and wires the pipeline against the configured
    /// search engine, model provider and vector backend.
    pub async fn initialize(paths: Arc<AppPaths>) -> Result<Arc<Self>, InitializationError> {
        let config = ConfigService::new(paths.clone());
        let settings = config
            .load_settings()
            .map_err(|e| InitializationError::Config(e.into()))?;

        let pipeline = build_pipeline(&settings, paths.as_ref()).await?;
        Ok(Self::new(config, settings, pipeline))
    }
}

pub async fn build_pipeline(settings: &Settings, paths: &AppPaths) -> Result<SearchPipeline, InitializationError> {
    let provider = Arc::new(
        OpenAiCompatProvider::from_settings(&settings.llm).map_err(|e| InitializationError::Llm(e.into()))?,
    );
    let retry = RetryPolicy::from_settings(&settings.llm);
    let embedder: Arc<dyn Embedder> = Arc::new(ProviderEmbedder::new(
        provider.clone(),
        settings.llm.embedding_model.clone(),
        retry,
    ));
    let generator: Arc<dyn Generator> = Arc::new(ProviderGenerator::from_settings(provider, &settings.llm));

    let backend: Arc<dyn CollectionBackend> = match settings.vector_store.backend.as_str() {
        "sqlite" => Arc::new(
            SqliteBackend::new(paths)
                .await
                .map_err(|e| InitializationError::VectorStore(e.into()))?,
        ),
        _ => Arc::new(InMemoryBackend),
    };

    let page_fetcher =
        HttpPageFetcher::from_settings(&settings.fetch).map_err(|e| InitializationError::Fetch(e.into()))?;
    let fetcher = Arc::new(ContentFetcher::new(Arc::new(page_fetcher), settings.fetch.max_chars));
    let search = provider_from_settings(&settings.search);
    tracing::info!(
        "Search provider: {}, vector backend: {}",
        search.name(),
        backend.name()
    );

    let memory = Arc::new(VectorMemory::new());
    let splitter: Arc<dyn TextSplitter> = Arc::new(RecursiveTextSplitter::from_settings(&settings.chunker));
    let collection = settings.vector_store.collection.clone();

    Ok(SearchPipeline::new(
        SearchResultCollector::new(search, fetcher, settings.search.overfetch),
        ScratchCollectionManager::new(memory.clone(), backend, embedder.clone()),
        DocumentIngestor::new(memory.clone(), embedder.clone(), &settings.ingest),
        AnswerSynthesizer::new(
            generator,
            embedder,
            splitter.clone(),
            memory,
            collection.clone(),
            settings.search_max_results,
            settings.synthesis.clone(),
        ),
        splitter,
        collection,
        settings.search_max_results,
    ))
}
