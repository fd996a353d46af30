//! Well-known event names.

pub const CONSTRUCTION: &str = "Construction";
pub const POST_CONSTRUCTION: &str = "PostConstruction";
pub const PRE_FORWARD: &str = "PreForward";
pub const FORWARD: &str = "Forward";
pub const POST_FORWARD: &str = "PostForward";
pub const INVERSE: &str = "Inverse";
pub const INTERACTION: &str = "Interaction";
/// Module connector resolution. Runs before connectors are resolved.
pub const CONNECTOR: &str = "Connector";

/// Events that may change hierarchy structure.
pub fn is_construction(event: &str) -> bool {
    event == CONSTRUCTION || event == POST_CONSTRUCTION
}
