use std::io::Write;

use cask_core::{ErrorKind, ResultRecord};
use cask_storage::{AddOptions, CredentialStore, Persist};
use color_eyre::{eyre::bail, Result};
use serde_json::{Map, Value};

use crate::{cli::Command, config::Config, storage};

/// Execute a store subcommand, writing human output to `out`.
pub fn handle(
    command: Command,
    store: &CredentialStore,
    config: &Config,
    out: &mut impl Write,
) -> Result<()> {
    match command {
        Command::List => {
            let sections = store.list_sections();
            if sections.is_empty() {
                writeln!(
                    out,
                    "No sections yet. Add one with `cask add <section> --field key=value`."
                )?;
            }
            for section in sections {
                writeln!(out, "{section}")?;
            }
        }
        Command::Get { section, field } => {
            let record = store.get(&section);
            ensure_ok(store, config, &record, "get")?;
            let fields = record.into_contents().unwrap_or_default();
            match field {
                Some(name) => match fields.get(&name) {
                    Some(Value::String(value)) => writeln!(out, "{value}")?,
                    Some(value) => writeln!(out, "{value}")?,
                    None => bail!("section [{section}] has no field [{name}]"),
                },
                None => writeln!(out, "{}", serde_json::to_string_pretty(&fields)?)?,
            }
        }
        Command::Add {
            section,
            fields,
            json,
            overwrite,
        } => {
            let field_map = build_field_map(fields, json)?;
            let options = AddOptions {
                overwrite,
                persist: Persist::Immediately,
            };
            let record = store.add(&section, &field_map, options);
            ensure_ok(store, config, &record, "add")?;
            writeln!(out, "Added section {section}")?;
        }
        Command::Modify {
            section,
            fields,
            json,
        } => {
            let field_map = build_field_map(fields, json)?;
            let record = store.modify(&section, &field_map, Persist::Immediately);
            ensure_ok(store, config, &record, "modify")?;
            writeln!(out, "Updated section {section}")?;
        }
        Command::Delete { section } => {
            let record = store.delete(&section, Persist::Immediately);
            ensure_ok(store, config, &record, "delete")?;
            writeln!(out, "Deleted section {section}")?;
        }
        other => bail!("{other:?} does not operate on the credential store"),
    }

    Ok(())
}

/// Combine `--json` and `--field` input. Without `--field`, JSON is passed
/// through untouched so the store can reject non-object input itself.
pub fn build_field_map(fields: Vec<(String, String)>, json: Option<String>) -> Result<Value> {
    let base = match json {
        Some(raw) => serde_json::from_str(&raw)?,
        None => Value::Object(Map::new()),
    };
    if fields.is_empty() {
        return Ok(base);
    }

    let Value::Object(mut map) = base else {
        bail!("--json must be an object when combined with --field");
    };
    for (key, value) in fields {
        map.insert(key, Value::String(value));
    }
    Ok(Value::Object(map))
}

fn ensure_ok<T>(
    store: &CredentialStore,
    config: &Config,
    record: &ResultRecord<T>,
    action: &str,
) -> Result<()> {
    if record.is_ok() {
        return Ok(());
    }
    store
        .reporter()
        .print_error(record, storage::render_options(config));
    match ErrorKind::from_status(record.status) {
        Some(kind) => bail!("{action} failed: {kind:?}"),
        None => bail!("{action} failed with status {}", record.status),
    }
}
