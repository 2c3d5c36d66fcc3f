//! Command: print the recognized-options tables.
use std::io::Write;

use anyhow::Result;

use crate::cli::SchemaOpts;
use crate::error::ConfigError;
use crate::model::ObjectKind;
use crate::schema::{self, KindSchema};

/// Print one schema (or all of them) as text or JSON.
///
/// # Errors
///
/// Returns an error if the kind is unknown or `out` cannot be written.
pub fn run(opts: &SchemaOpts, json: bool, out: &mut impl Write) -> Result<()> {
    let schemas = select(opts.kind.as_deref())?;
    if json {
        serde_json::to_writer_pretty(&mut *out, &schemas)?;
        writeln!(out)?;
    } else {
        write!(out, "{}", render_all(&schemas))?;
    }
    Ok(())
}

/// Schemas for `kind`, or every schema when `kind` is `None`.
///
/// # Errors
///
/// Returns [`ConfigError::UnknownKind`] for a name no schema recognises.
pub fn select(kind: Option<&str>) -> Result<Vec<&'static KindSchema>, ConfigError> {
    match kind {
        None => Ok(schema::all().to_vec()),
        Some(name) => ObjectKind::parse(name)
            .map(|k| vec![schema::for_kind(k)])
            .ok_or_else(|| ConfigError::UnknownKind(name.to_string())),
    }
}

/// Text tables separated by blank lines.
#[must_use]
pub fn render_all(schemas: &[&KindSchema]) -> String {
    schemas
        .iter()
        .map(|s| render(s))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Text table for one kind.
#[must_use]
pub fn render(schema: &KindSchema) -> String {
    let mut lines = vec![
        format!("{} (schema v{}): {}", schema.kind, schema.version, schema.summary),
        format!("  identity: {}", schema.identity),
    ];
    if schema.is_typed() {
        let default = schema
            .default_type
            .map_or_else(String::new, |t| format!(" (default: {t})"));
        lines.push(format!("  types: {}{default}", schema.types.join("|")));
    }
    let name_width = schema.options.iter().map(|o| o.name.len()).max().unwrap_or(0);
    let value_width = schema
        .options
        .iter()
        .map(|o| o.value.label().len())
        .max()
        .unwrap_or(0);
    lines.push("  options:".to_string());
    for option in schema.options {
        let default = option
            .default
            .map_or_else(String::new, |d| format!(" (default: {d})"));
        lines.push(format!(
            "    {:<name_width$}  {:<value_width$}  {}{default}",
            option.name,
            option.value.label(),
            option.effect,
        ));
    }
    if let Some(prefix) = schema.dynamic_prefix {
        lines.push(format!("  free-form: {prefix}<name>"));
    }
    if !schema.required_on_create.is_empty() {
        lines.push(format!(
            "  required on create: {}",
            schema.required_on_create.join(", ")
        ));
    }
    if !schema.recreate_on_change.is_empty() {
        lines.push(format!(
            "  recreate on change: {}",
            schema.recreate_on_change.join(", ")
        ));
    }
    if !schema.migrations.is_empty() {
        lines.push("  migrations:".to_string());
        for m in schema.migrations {
            lines.push(format!("    v{}: {}", m.version, m.note));
        }
    }
    lines.join("\n") + "\n"
}
