//! Core library for dokugit: reconstructs a chronological git history from
//! a DokuWiki installation's per-page change-logs and revision attic.
//!
//! The pipeline is a pure transform from source-tree contents to an ordered
//! operation stream: parse change-logs, merge them into one timeline,
//! cross-check against the attic, plan content operations, and replay them
//! into a committer sink. All stages run to completion sequentially; a run
//! either succeeds deterministically or fails fast on structural corruption.

pub mod attic;
pub mod changelog;
pub mod commit;
pub mod config;
pub mod convert;
pub mod plan;
pub mod runtime;
pub mod timeline;
pub mod users;
pub mod validate;
