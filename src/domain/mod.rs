// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust structs and traits describing what the trainer
// works with. No burn types, no file I/O.
//
//   corpus.rs  — raw labelled sentences
//   encoded.rs — integer matrices fed to the classifier,
//                and pretrained embedding matrices
//   traits.rs  — CorpusSource, Classifier, Snapshot

pub mod corpus;

pub mod encoded;

pub mod traits;
