// ============================================================
// Layer 2 - Application / Use Cases
// ============================================================
// This layer orchestrates the other layers to accomplish one
// command: prepare, train, meta-train, or generate.
//
// Rules for this layer:
//   - No ML math or model code here
//   - No argument parsing here (that's Layer 1)
//   - Only workflow coordination and backend choice
//
// Reference: Clean Architecture pattern
//            Rust Book §7 (Module System)

/// Backend the commands run on
pub type AppBackend = burn::backend::Wgpu;

/// AppBackend with gradient tracking, used for training
pub type AppAutodiffBackend = burn::backend::Autodiff<AppBackend>;

/// Architecture choice and the persisted model spec
pub mod model_spec;

/// Loading, encoding, and splitting the corpus
pub mod corpus;

/// The supervised training workflow
pub mod train_use_case;

/// The meta-learning workflow
pub mod meta_train_use_case;

/// Text generation from a trained checkpoint
pub mod generate_use_case;
