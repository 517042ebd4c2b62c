// ============================================================
// Layer 5 - ML / Model Layer (Burn)
// ============================================================
// All tensor math lives here. The data layer only produces
// batches; the application layer only wires settings in.
//
// What's in this layer:
//
//   attention.rs  scaled dot-product self-attention with four
//                 mask patterns: global, local window, top-k
//                 sparse, and a per-head diverse mix
//
//   layers.rs     feed-forward, post-norm encoder block, and
//                 the dynamic layer that routes between blocks
//
//   model.rs      DUALM and hierarchical DUALM language models
//                 behind the LanguageModel trait
//
//   trainer.rs    supervised next-token training loop
//
//   meta.rs       first-order MAML inner/outer loop
//
//   generator.rs  greedy decoding from a prompt
//
// Reference: Burn Book §3 (Building Blocks)
//            Burn Book §5 (Training)
//            Vaswani et al. (2017) Attention Is All You Need

/// Self-attention variants
pub mod attention;

/// Encoder blocks and dynamic layer routing
pub mod layers;

/// DUALM model architectures
pub mod model;

/// Training loop with validation and checkpointing
pub mod trainer;

/// Meta-learning over per-document tasks
pub mod meta;

/// Greedy text generation
pub mod generator;
