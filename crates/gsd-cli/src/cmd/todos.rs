use crate::cmd::build_snapshot;
use crate::output::print_json;
use std::path::Path;

pub fn run(root: &Path, json: bool) -> anyhow::Result<()> {
    let snapshot = build_snapshot(root)?;

    if json {
        #[derive(serde::Serialize)]
        struct TodosOutput<'a> {
            pending: &'a [gsd_core::todo::Todo],
            completed: &'a [gsd_core::todo::Todo],
        }
        return print_json(&TodosOutput {
            pending: &snapshot.pending_todos,
            completed: &snapshot.completed_todos,
        });
    }

    if snapshot.pending_todos.is_empty() && snapshot.completed_todos.is_empty() {
        println!("No todos found.");
        return Ok(());
    }

    for todo in &snapshot.pending_todos {
        match &todo.area {
            Some(area) => println!("[ ] {} ({area})", todo.text),
            None => println!("[ ] {}", todo.text),
        }
    }
    for todo in &snapshot.completed_todos {
        println!("[x] {}", todo.text);
    }
    Ok(())
}
