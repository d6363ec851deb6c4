// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Filesystem-facing concerns shared by the pipeline:
//
//   config.rs     — config.yml parsing and resolution of the
//                   dataset / embedding selectors into closed enums
//
//   embeddings.rs — word2vec (text + binary) and GloVe loaders
//                   producing vocabulary-aligned matrices
//
//   checkpoint.rs — run directory layout, vocabulary artifact,
//                   numbered snapshots with bounded retention
//
//   metrics.rs    — best-effort CSV summaries for train and dev
//
// Reference: Rust Book §9 (Error Handling with anyhow)

pub mod config;

pub mod embeddings;

pub mod checkpoint;

pub mod metrics;
