//! nailit-reconcile: repair orphaned references on ingested NailIt messages
//!
//! Finds messages whose user or project no longer exists and, on request,
//! reassigns or clears those references.

use anyhow::Result;

fn main() -> Result<()> {
    nailit_reconcile::cli::run()
}
