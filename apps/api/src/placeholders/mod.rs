// Placeholder lifecycle core: extract → name → store → update → reconcile.
// All model calls go through llm_client; persistence lives in documents::store.

pub mod extractor;
pub mod models;
pub mod namer;
pub mod prompts;
pub mod reconcile;
pub mod updater;
