#[cfg(test)]
mod tests;

use tracing::{info, warn};

use crate::Result;
use crate::config::QdrantConfig;
use crate::openai::OpenAiClient;
use crate::qdrant::{Distance, DocumentPayload, PointStruct, QdrantClient};

/// Origin identifier attached to every seeded document.
pub const SAMPLE_SOURCE: &str = "sample_data";

/// Fixed corpus inserted when a collection is created.
pub const SAMPLE_CORPUS: [&str; 4] = [
    "KIMIA Assess is a comprehensive assessment platform for medical imaging.",
    "The platform provides AI-powered analysis of medical images.",
    "KIMIA Assess supports various medical imaging modalities.",
    "Users can upload and analyze medical images through the platform.",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootstrapOutcome {
    /// The collection was already present; nothing was created or seeded.
    AlreadyExists,
    /// The collection was created; `seeded_documents` is zero when
    /// seeding failed after the creation succeeded.
    Created { seeded_documents: usize },
}

/// Idempotently ensure the configured collection exists, seeding it with
/// the sample corpus on first creation. Creation and seeding are two
/// separate steps; seeding is best-effort once creation has succeeded.
#[inline]
pub fn ensure_collection(
    qdrant: &QdrantClient,
    openai: &OpenAiClient,
    config: &QdrantConfig,
) -> Result<BootstrapOutcome> {
    if qdrant.collection_exists(&config.collection)? {
        info!("Collection '{}' already exists", config.collection);
        return Ok(BootstrapOutcome::AlreadyExists);
    }

    qdrant.create_collection(&config.collection, config.vector_dimension, Distance::Cosine)?;
    info!(
        "Created collection '{}' (dimension {}, cosine distance)",
        config.collection, config.vector_dimension
    );

    match seed_samples(qdrant, openai, &config.collection) {
        Ok(count) => {
            info!("Seeded {} sample documents", count);
            Ok(BootstrapOutcome::Created {
                seeded_documents: count,
            })
        }
        Err(e) => {
            warn!(
                "Collection '{}' created but seeding failed: {}",
                config.collection, e
            );
            Ok(BootstrapOutcome::Created {
                seeded_documents: 0,
            })
        }
    }
}

fn seed_samples(qdrant: &QdrantClient, openai: &OpenAiClient, collection: &str) -> Result<usize> {
    let texts: Vec<String> = SAMPLE_CORPUS.iter().map(ToString::to_string).collect();
    let embeddings = openai.embed_batch(&texts)?;

    let points: Vec<PointStruct> = texts
        .into_iter()
        .zip(embeddings)
        .enumerate()
        .map(|(index, (text, vector))| PointStruct {
            id: index as u64,
            vector,
            payload: DocumentPayload {
                text,
                source: Some(SAMPLE_SOURCE.to_string()),
            },
        })
        .collect();

    qdrant.upsert_points(collection, points)?;
    Ok(SAMPLE_CORPUS.len())
}
