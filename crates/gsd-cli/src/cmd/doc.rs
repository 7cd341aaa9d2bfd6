use crate::cmd::build_snapshot;
use crate::output::print_json;
use anyhow::Context;
use gsd_core::types::DocKind;
use std::path::Path;

pub fn run(root: &Path, kind: &str, json: bool) -> anyhow::Result<()> {
    let kind: DocKind = kind.parse().context("invalid document kind")?;
    let snapshot = build_snapshot(root)?;
    let doc = snapshot.phase_doc(kind);

    if json {
        return print_json(&doc);
    }

    match (doc, snapshot.current_phase()) {
        (Some(doc), _) => {
            print!("{}", doc.body);
            if !doc.body.ends_with('\n') {
                println!();
            }
        }
        (None, Some(phase)) => println!("No {kind} document for {}.", phase.name),
        (None, None) => println!("No current phase."),
    }
    Ok(())
}
