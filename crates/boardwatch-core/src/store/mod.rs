// # Dedup Store Implementations
//
// The in-memory implementation lives in core; the persistent SQLite
// implementation is the `boardwatch-store-sqlite` crate.

pub mod memory;

pub use memory::MemoryDedupStore;
