// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything between files on disk and the batches the
// training loop consumes:
//
//   dataset files
//       │
//       ▼
//   loader        → Corpus (raw sentences + class labels)
//       │
//       ▼
//   preprocessor  → cleaned, lower-cased sentences
//       │
//       ▼
//   vocabulary    → EncodedDataset (N × max_document_length ids)
//       │
//       ▼
//   splitter      → seeded shuffle, Train / Eval
//       │
//       ▼
//   batcher       → lazy, per-epoch reshuffled batches,
//                   then burn tensors via TextCnnBatcher
//
// Reference: Rust Book §13 (Iterators and Closures)

/// Dataset readers (mrpolarity, category directories)
pub mod loader;

/// Sentence cleaning before tokenisation
pub mod preprocessor;

/// Token ↔ id mapping and fixed-length encoding
pub mod vocabulary;

/// Seeded shuffle and train/validation split
pub mod splitter;

/// Epoch-repeated batch stream and the burn `Batcher`
pub mod batcher;
