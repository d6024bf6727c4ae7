//! Syntax tree, traversal and printing.
//!
//! - `syntax`: node definitions
//! - `walk`: read-only pre-order traversal
//! - `fold`: owned, post-order rewriting
//! - `print`: rendering nodes back to source text

pub mod fold;
pub mod print;
pub mod syntax;
pub mod walk;

pub use fold::{fold_block, fold_expr, fold_stmt};
pub use print::{print_block, print_expr, print_stmt};
pub use syntax::*;
pub use walk::{walk_block, walk_block_stmts, walk_expr, walk_shallow_expr, walk_stmt};
