pub mod activity;
pub mod approvals;
pub mod locks;
pub mod sessions;
pub mod steps;
