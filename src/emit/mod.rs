//! Config emitter: turns a merged `RuleSet` plus `Globals` into the two
//! downstream artifacts (cache-tier VCL, load-balancer-tier HAProxy config).
//! Submodules build up from condition rendering to per-tier action
//! rendering to final document assembly.

pub mod cache_tier;
pub mod condition;
pub mod lb_tier;
pub mod ordering;
pub mod render;

pub use render::{render_cache_tier, render_lb_tier, EmitResult};
