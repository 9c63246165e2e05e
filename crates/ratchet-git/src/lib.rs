//! Version-control integration.
//!
//! [`adapter::GitAdapter`] shells out to `git` and parses its textual
//! output into structured records; [`compare`] re-runs a suite at two
//! revisions and diffs the counts; [`recent`] attributes working-tree
//! failures to the commits that most recently touched them.

pub mod adapter;
pub mod compare;
pub mod recent;

pub use adapter::{BlameLine, CheckoutGuard, CommitRecord, GitAdapter, SubmoduleField};
pub use compare::{compare_refs, ComparisonResult};
pub use recent::{recently_broken, BrokenRatchet};
