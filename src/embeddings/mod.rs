// Embeddings module
// Chunking, vector encoding and the embedding service client

pub mod chunking;
pub mod client;
pub mod codec;

pub use chunking::{Chunk, ChunkingConfig, chunk_text, chunk_with_config};
pub use client::{Embedder, EmbeddingClient, RetryingEmbedder};
pub use codec::{EncodedVector, decode, encode};
