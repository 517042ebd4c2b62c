// ============================================================
// Layer 4 - Data Pipeline
// ============================================================
// Everything from raw .txt files to tensor batches.
//
//   .txt files
//       │
//       ▼
//   TextCorpusLoader  → reads files into Documents
//       │
//       ▼
//   Preprocessor      → sentences, case-folded, punctuation stripped
//       │
//       ▼
//   Vocabulary        → frequency-ranked ids (domain layer)
//       │
//       ▼
//   Chunker           → long sentences cut into overlapping windows
//       │
//       ▼
//   splitter          → seeded train / validation / test split
//       │
//       ▼
//   SequenceDataset   → implements Burn's Dataset trait
//       │
//       ▼
//   LmBatcher         → pads each batch, shifts inputs/targets
//
// Reference: Burn Book §4 (Datasets and Dataloaders)

/// Loads .txt files from a directory
pub mod loader;

/// Cleans text and produces normalised sentences
pub mod preprocessor;

/// Splits long token sequences into overlapping windows
pub mod chunker;

/// Implements Burn's Dataset trait for token sequences
pub mod dataset;

/// Implements Burn's Batcher trait with collation-time padding
pub mod batcher;

/// Seeded three-way split
pub mod splitter;
