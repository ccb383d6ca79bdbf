//! `list`: collection summaries as JSON.

use std::io::{Write, stdout};

use anyhow::{Result, bail};
use serde_json::Value;

use super::build::manifest;
use crate::resolver::Resolver;

/// Print the summaries of `bundle`, or of every bundle keyed by name.
pub fn list(resolver: &Resolver, bundle: Option<&str>) -> Result<()> {
    let json = render(resolver, bundle)?;
    let mut stdout = stdout().lock();
    writeln!(stdout, "{json}")?;
    Ok(())
}

fn render(resolver: &Resolver, bundle: Option<&str>) -> Result<String> {
    let value = match bundle {
        Some(name) => {
            let Some(bundle) = resolver.bundle(name)? else {
                bail!("no bundle named `{name}`");
            };
            serde_json::to_value(bundle.summaries(resolver)?)?
        }
        None => Value::Object(manifest(resolver, &resolver.bundles()?)?),
    };
    Ok(serde_json::to_string_pretty(&value)?)
}
