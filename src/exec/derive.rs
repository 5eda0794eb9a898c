// src/exec/derive.rs

//! The database-derivation collaborator: builds each child's initial
//! working database from its parent's fitted one.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;

use crate::dag::ChildDatabase;
use crate::exec::BoxFuture;

pub trait DatabaseDeriver: Send + Sync {
    /// Called once per finished parent with all of its children. Each
    /// child's directory already exists.
    fn derive_children<'a>(
        &'a self,
        parent: &'a Path,
        children: &'a [ChildDatabase],
    ) -> BoxFuture<'a, Result<()>>;
}

/// Materializes every child as a copy of the parent database.
#[derive(Debug, Clone, Copy, Default)]
pub struct CopyDeriver;

impl DatabaseDeriver for CopyDeriver {
    fn derive_children<'a>(
        &'a self,
        parent: &'a Path,
        children: &'a [ChildDatabase],
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            for child in children {
                tokio::fs::copy(parent, &child.database).await.with_context(|| {
                    format!(
                        "copying {} to {}",
                        parent.display(),
                        child.database.display()
                    )
                })?;
                debug!(
                    job = %child.job_name,
                    database = %child.database.display(),
                    "derived child database"
                );
            }
            Ok(())
        })
    }
}
