pub mod location;
pub mod router;

pub use router::{route, RouteDecision, RouteMode};
