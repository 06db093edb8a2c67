//! Operator commands behind the `vsearch` binary.
//!
//! Each command writes human-readable output to any [`Write`] so it can be
//! captured in tests.

use crate::client::Backend;
use crate::collection::{Collection, ImportFailure};
use crate::error::{Error, Result};
use crate::index::{Catalog, DocumentProducer, Index};
use crate::naming::{self, Version};
use std::collections::BTreeMap;
use std::io::Write;
use tracing::info;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

fn header(out: &mut impl Write, title: &str) -> Result<()> {
    writeln!(out, "==> {}", title)?;
    Ok(())
}

fn row(out: &mut impl Write, prefix: &str, version: &str, created_at: &str, documents: &str) -> Result<()> {
    writeln!(out, "{:>4} {:<20} {:<20} {:<20}", prefix, version, created_at, documents)?;
    Ok(())
}

/// List every index in `env` with its versions, newest first
pub async fn list(backend: &Backend, env: Option<&str>, out: &mut impl Write) -> Result<()> {
    let catalog = Catalog::new(backend.clone());
    let aliases = catalog.aliases().await?;

    let mut indexes: BTreeMap<String, Vec<Collection>> = BTreeMap::new();
    for collection in catalog.collections().await? {
        if collection.env() == env {
            indexes
                .entry(collection.index_name().to_string())
                .or_default()
                .push(collection);
        }
    }

    for (index_name, mut collections) in indexes {
        collections.sort_by(|a, b| {
            b.created_at()
                .cmp(&a.created_at())
                .then_with(|| b.name().cmp(a.name()))
        });
        let live = aliases.get(&naming::alias_name(&index_name, env));

        header(out, &titleize(&index_name))?;
        row(out, "", "Version", "Created At", "Documents")?;
        for collection in &collections {
            let prefix = if live.map(String::as_str) == Some(collection.name()) {
                "->"
            } else {
                ""
            };
            row(
                out,
                prefix,
                &version_label(collection),
                &collection.created_at().format(TIME_FORMAT).to_string(),
                &with_separators(collection.num_documents()),
            )?;
        }
        writeln!(out)?;
    }

    Ok(())
}

/// Build a new version from `ids`, optionally pointing the alias at it
pub async fn index<P, I>(
    index: &Index<P>,
    ids: I,
    activate: bool,
    out: &mut impl Write,
) -> Result<Vec<ImportFailure>>
where
    P: DocumentProducer,
    I: IntoIterator,
    I::Item: Into<String>,
{
    let collection = index.create().await?;
    header(
        out,
        &format!(
            "Indexing into {} (Version {})",
            titleize(index.index_name()),
            version_label(&collection)
        ),
    )?;

    let failures = index.index_many(ids, &collection).await?;
    for failure in &failures {
        writeln!(out, "{}", serde_json::to_string(failure)?)?;
    }

    if activate {
        index.update_alias(&collection).await?;
        writeln!(out, "--> {} now serves {}", index.alias_name(), collection.name())?;
    }

    Ok(failures)
}

/// Point the alias at an existing version; false when it does not exist
pub async fn update_alias<P: DocumentProducer>(
    index: &Index<P>,
    version: Version,
    out: &mut impl Write,
) -> Result<bool> {
    let title = titleize(index.index_name());
    let Some(target) = index.collection_for(version).await? else {
        writeln!(out, "--> No such version {} for {}", version, title)?;
        return Ok(false);
    };
    let current = index.collection().await?;

    header(out, &format!("Alias for {}", title))?;
    match &current {
        Some(current) => writeln!(
            out,
            "Old: {} ({})",
            version_label(current),
            current.created_at().format(TIME_FORMAT)
        )?,
        None => writeln!(out, "Old: None (N/A)")?,
    }

    index.update_alias(&target).await?;
    writeln!(
        out,
        "New: {} ({})",
        version_label(&target),
        target.created_at().format(TIME_FORMAT)
    )?;
    Ok(true)
}

/// Delete a version that the alias does not point to
pub async fn drop_version<P: DocumentProducer>(
    index: &Index<P>,
    version: Version,
    out: &mut impl Write,
) -> Result<bool> {
    let title = titleize(index.index_name());
    let Some(target) = index.collection_for(version).await? else {
        writeln!(out, "--> No such version {} for {}", version, title)?;
        return Ok(false);
    };

    if let Some(current) = index.collection().await? {
        if current.name() == target.name() {
            return Err(Error::InvalidArgument(format!(
                "version {} is served by {}; point the alias elsewhere first",
                version,
                index.alias_name()
            )));
        }
    }

    let name = target.name().to_string();
    target.delete().await?;
    info!(collection = %name, "Dropped version");
    header(out, &format!("Dropped {} (Version {})", title, version))?;
    Ok(true)
}

fn version_label(collection: &Collection) -> String {
    collection
        .version()
        .map(|version| version.to_string())
        .unwrap_or_else(|| "-".to_string())
}

/// `user_posts` becomes `User Posts`
fn titleize(name: &str) -> String {
    name.split(|c: char| c == '_' || c == '-' || c.is_whitespace())
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

fn with_separators(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_separators() {
        assert_eq!(with_separators(0), "0");
        assert_eq!(with_separators(999), "999");
        assert_eq!(with_separators(1024), "1,024");
        assert_eq!(with_separators(1234567), "1,234,567");
    }

    #[test]
    fn test_titleize() {
        assert_eq!(titleize("user_posts"), "User Posts");
        assert_eq!(titleize("posts"), "Posts");
    }

    #[test]
    fn test_row_layout() {
        let mut out = Vec::new();
        row(&mut out, "->", "1700000000", "2023-11-14 22:13:20", "1,024").unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            format!("  -> {:<20} {:<20} {:<20}\n", "1700000000", "2023-11-14 22:13:20", "1,024")
        );
    }
}
