// ============================================================
// Layer 2 - Application / Use Cases
// ============================================================
// Workflow coordination only: no model math, no printing.
// Each use case wires the data, ml and infra layers together
// for one command and returns anyhow::Result with context.

// The training workflow
pub mod train_use_case;

// Scoring a saved checkpoint on held-out data
pub mod evaluate_use_case;
