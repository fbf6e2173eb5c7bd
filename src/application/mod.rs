// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// This layer orchestrates all the other layers to accomplish
// a specific goal (training or scoring a checkpoint).
//
// Rules for this layer:
//   - No ML math or model code here
//   - No UI or printing here (that's Layer 1)
//   - Only workflow coordination

/// Typed JSON run configuration
pub mod config;

/// The training workflow
pub mod train_use_case;

/// Checkpoint evaluation workflow
pub mod eval_use_case;
