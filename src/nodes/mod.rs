//! Application nodes.

pub mod follower;

pub use follower::FollowerNode;
