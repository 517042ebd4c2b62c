// ============================================================
// Layer 3 - Domain Layer
// ============================================================
// Plain Rust structs and traits describing the corpus side of
// the system: documents, vocabularies, token sequences and the
// three-way split those sequences are divided into.
//
// Rules for this layer:
//   - NO Burn framework types allowed here
//   - NO ML-specific code
//   - File I/O only through the Persistable trait
//
// Reference: Rust Book §5 (Structs), §10 (Traits)

// A loaded text document from disk
pub mod document;

// Unpadded token sequences and the train/validation/test split
pub mod sample;

// Frequency-ranked token -> index mapping
pub mod vocabulary;

// Core abstractions (traits) that other layers implement
pub mod traits;
