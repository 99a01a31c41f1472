//! Build a pipeline from configuration.

use cortex_core::error::CortexResult;
use cortex_core::{CortexConfig, KnowledgePipeline};

use cortex_embeddings::EmbedderFactory;
use cortex_graph_stores::GraphStoreFactory;
use cortex_llm::LlmFactory;
use cortex_vector_stores::VectorStoreFactory;

/// Create every provider named by `config` and wire them into a pipeline.
pub async fn create_pipeline(config: &CortexConfig) -> CortexResult<KnowledgePipeline> {
    config.validate()?;

    let llm = LlmFactory::from_config(&config.llm)?;
    let embedder = EmbedderFactory::from_config(&config.embedder)?;
    let vector_store = VectorStoreFactory::create(&config.vector_store)?;
    let graph_store = GraphStoreFactory::create(&config.graph_store).await?;

    tracing::info!(
        llm = %config.llm.provider,
        embedder = %config.embedder.provider,
        vector_store = %config.vector_store.provider,
        graph_store = %config.graph_store.provider,
        "Providers created"
    );

    KnowledgePipeline::new(config, llm, embedder, vector_store, graph_store)
}
