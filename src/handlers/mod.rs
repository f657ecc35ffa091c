// handlers/mod.rs - two handler tiers
//
// Public (no session) → Protected (valid session, refreshed on demand)
pub mod protected;
pub mod public;
