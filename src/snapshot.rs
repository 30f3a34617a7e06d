//! Flat-file audit snapshot.
//!
//! One CSV row per container-or-test entity. Container rows carry the
//! path, the assigned numeric id and a flag marking them container-only;
//! test rows carry the identifier, remote id (blank until a reverse sync
//! has assigned one), title, narrative fields, classifications, and the
//! step list serialized as one delimited block. The file is a derived,
//! regenerable artifact for version-control diffing — it is never read
//! back as reconciler input.

use std::{fs, path::Path};

use crate::{
    error::CasebindError,
    model::{SuitePath, TestEntity},
};

pub const SNAPSHOT_HEADER: &str =
    "kind,path,suite_id,identifier,remote_id,title,description,preconditions,postconditions,\
     severity,behavior,flaky,steps";

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn fmt_opt_id(id: Option<u64>) -> String {
    id.map(|v| v.to_string()).unwrap_or_default()
}

fn steps_block(test: &TestEntity) -> String {
    test.steps
        .iter()
        .map(|s| format!("{} | {} | {}", s.action, s.data, s.expected))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Render the snapshot. `suites` is the resolved container set in
/// root-first order; each test is paired with its remote id when known.
pub fn render(
    suites: &[(SuitePath, Option<u64>)],
    tests: &[(TestEntity, Option<u64>)],
) -> String {
    let mut out = String::from(SNAPSHOT_HEADER);
    out.push('\n');

    for (path, id) in suites {
        out.push_str(&format!(
            "suite,{},{},,,,,,,,,,\n",
            csv_field(&path.to_string()),
            fmt_opt_id(*id),
        ));
    }

    for (test, remote_id) in tests {
        let row = [
            "case".to_string(),
            csv_field(&test.suite_path.to_string()),
            String::new(),
            test.id.to_string(),
            fmt_opt_id(*remote_id),
            csv_field(&test.title),
            csv_field(test.description.as_deref().unwrap_or("")),
            csv_field(test.preconditions.as_deref().unwrap_or("")),
            csv_field(test.postconditions.as_deref().unwrap_or("")),
            format!("{:?}", test.severity).to_lowercase(),
            format!("{:?}", test.behavior).to_lowercase(),
            test.flaky.to_string(),
            csv_field(&steps_block(test)),
        ];
        out.push_str(&row.join(","));
        out.push('\n');
    }
    out
}

/// Thin persistence step for the rendered snapshot.
pub fn write_snapshot(path: &Path, content: &str) -> Result<(), CasebindError> {
    tracing::debug!("writing audit snapshot to {path:?}");
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, content)?;
    Ok(())
}
