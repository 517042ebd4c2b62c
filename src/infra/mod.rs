// ============================================================
// Layer 6 - Infrastructure Layer
// ============================================================
// Cross-cutting persistence used by several other layers:
//
//   checkpoint.rs      model weights (burn CompactRecorder) and
//                      the model spec needed to rebuild them
//
//   tokenizer_store.rs vocabulary + WordLevel tokenizer files,
//                      encode/decode helpers over `tokenizers`
//
//   metrics.rs         per-epoch and per-meta-iteration CSV logs
//
// Reference: Rust Book §7 (Modules)
//            Burn Book §5 (Checkpointing)

/// Model checkpoint saving and loading
pub mod checkpoint;

/// Tokenizer building, saving, and loading
pub mod tokenizer_store;

/// Training metrics CSV logger
pub mod metrics;
