//! Course tree resolution for courseforge.
//!
//! Turns a course directory into the [`Course`](courseforge_shared::Course)
//! IR and back:
//! - [`index`]: per-directory `index.yaml` records and identifier pinning
//! - [`naming`]: the `NN_Display Name` convention
//! - [`extract`] and [`repl`]: block classification and workspace loading
//! - [`pool`]: the bounded per-vertical extraction pool
//! - [`resolve`]: the tree walk
//! - [`export`]: writing a course back to disk
//! - [`gittime`]: optional timestamps from `git log`

pub mod export;
pub mod extract;
pub mod gittime;
pub mod index;
pub mod naming;
pub mod pool;
pub mod repl;
pub mod resolve;

pub use export::export_course;
pub use extract::{BlockFile, VerticalJob, classify, extract_blocks};
pub use gittime::enrich_timestamps;
pub use index::{
    Assigned, ChapterRecord, CourseRecord, FsIndexBackend, INDEX_FILE, IndexBackend, IndexRecord,
    IndexStore, MemoryIndexBackend, SequentialRecord, VerticalRecord,
};
pub use pool::ExtractionPool;
pub use resolve::{NoProgress, ResolveProgress, Resolver, check_extraction};
