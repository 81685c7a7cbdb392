//! Derived analyses over the merge store.
//!
//! - [`density`]: /24 blocks dense enough to warrant a second round
//! - [`expansion`]: second-round targets and trust assignment
//! - [`fanout`]: IPs serving many distinct URLs

pub mod density;
pub mod expansion;
pub mod fanout;

pub use density::DenseBlock;
pub use expansion::{
    assign_round_two_trust, second_round_targets, KnownIps, MIXED_BLOCK_LABEL,
    UNKNOWN_ORGANIZATION_LABEL,
};
pub use fanout::IpFanout;
