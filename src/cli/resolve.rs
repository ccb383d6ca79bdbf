//! `resolve`: one path through the resolver.

use std::io::{Write, stdout};

use anyhow::{Context, Result, bail};
use serde_json::{Map, Value};

use crate::resolver::{Resolve, Resolver};
use crate::resource::ResourceRef;

/// Write the bytes of `path` to stdout, or its metadata with `info`.
pub fn resolve(resolver: &Resolver, path: &str, info: bool) -> Result<()> {
    let resource = lookup(resolver, path)?;
    let mut stdout = stdout().lock();
    if info {
        writeln!(stdout, "{}", serde_json::to_string_pretty(&describe(&resource))?)?;
    } else {
        stdout.write_all(&resource.bytes())?;
    }
    stdout.flush()?;
    Ok(())
}

fn lookup(resolver: &Resolver, path: &str) -> Result<ResourceRef> {
    let resource = resolver
        .resolve(path)?
        .with_context(|| format!("no bundle serves `{path}`"))?;
    if !resource.exists() {
        bail!("`{path}` does not exist");
    }
    Ok(resource)
}

fn describe(resource: &ResourceRef) -> Value {
    let path = resource.path();
    let mut info = Map::new();
    info.insert("path".into(), Value::from(&*path));
    info.insert("fullPath".into(), Value::from(resource.full_path()));
    info.insert("lastModified".into(), Value::from(resource.last_modified()));
    info.insert(
        "contentType".into(),
        Value::from(resource.content_type().mime(&path)),
    );
    if let Some(origin) = resource.origin() {
        info.insert("origin".into(), Value::from(origin));
    }
    if let Some(report) = resource.lint_report() {
        info.insert("lint".into(), Value::from(report.issues.clone()));
    }
    Value::Object(info)
}
