//! Canonical names of the built-in tools.
//!
//! Tool-name string literals should reference these constants rather than
//! repeat the dotted names.

pub const FS_WRITE: &str = "fs.write";
pub const FS_READ: &str = "fs.read";
pub const FS_EDIT: &str = "fs.edit";
pub const FS_DELETE: &str = "fs.delete";
pub const FS_MKDIR: &str = "fs.mkdir";
pub const FS_RMDIR: &str = "fs.rmdir";
pub const FS_LS: &str = "fs.ls";
pub const FS_TREE: &str = "fs.tree";

/// Every filesystem tool, in catalog order.
pub const FS_ALL: &[&str] = &[
    FS_WRITE, FS_READ, FS_EDIT, FS_DELETE, FS_MKDIR, FS_RMDIR, FS_LS, FS_TREE,
];
