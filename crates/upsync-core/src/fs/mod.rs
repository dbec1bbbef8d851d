//! Filesystem primitives shared across synchronizers.

pub mod copy;
pub mod tree_hash;

pub use copy::{PathFilter, RegexFilter, RootRelative, copy_entry, copy_filtered, copy_tree};
pub use tree_hash::hash_tree;
