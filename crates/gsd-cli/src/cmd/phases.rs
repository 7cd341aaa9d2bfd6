use crate::cmd::build_snapshot;
use crate::output::{print_json, print_table};
use std::path::Path;

pub fn run(root: &Path, json: bool) -> anyhow::Result<()> {
    let snapshot = build_snapshot(root)?;

    if json {
        #[derive(serde::Serialize)]
        struct PhasesOutput<'a> {
            phases: &'a [gsd_core::roadmap::Phase],
            current_phase: Option<usize>,
        }
        return print_json(&PhasesOutput {
            phases: &snapshot.phases,
            current_phase: snapshot.current_phase,
        });
    }

    if snapshot.phases.is_empty() {
        println!("No phases found in ROADMAP.md.");
        return Ok(());
    }

    let rows: Vec<Vec<String>> = snapshot
        .phases
        .iter()
        .map(|p| {
            let marker = if snapshot.current_phase == Some(p.index) {
                "▶"
            } else {
                ""
            };
            vec![
                marker.to_string(),
                p.status.glyph().to_string(),
                p.name.clone(),
                p.status.to_string(),
                p.description.clone(),
            ]
        })
        .collect();
    print_table(&["", "", "PHASE", "STATUS", "DESCRIPTION"], rows);
    Ok(())
}
