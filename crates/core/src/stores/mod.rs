pub mod memory;
pub mod qdrant;

pub use memory::MemoryChunkStore;
pub use qdrant::QdrantStore;
