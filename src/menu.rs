//! Interactive operator menu.

use anyhow::Result;
use dialoguer::{theme::ColorfulTheme, Confirm, Input, Select};
use rusqlite::Connection;

use crate::db;
use crate::pdf;
use crate::reconcile;
use crate::settings::Settings;

const MENU_ITEMS: &[&str] = &[
    "Process documents",
    "List records",
    "Delete record",
    "Re-import snapshots",
    "Quit",
];

pub fn run(conn: &Connection, settings: &Settings) -> Result<()> {
    loop {
        println!();
        let choice = Select::with_theme(&ColorfulTheme::default())
            .with_prompt("FISPQ extractor")
            .items(MENU_ITEMS)
            .default(0)
            .interact()?;

        match choice {
            0 => pdf::run_batch(conn, settings)?.print(),
            1 => list_records(conn)?,
            2 => delete_record(conn)?,
            3 => {
                let count = reconcile::reimport_snapshots(conn, &settings.snapshot_dir)?;
                println!("Re-imported {} snapshots.", count);
            }
            _ => break,
        }
    }
    Ok(())
}

fn list_records(conn: &Connection) -> Result<()> {
    let rows = db::fetch_all(conn)?;
    if rows.is_empty() {
        println!("No records stored.");
        return Ok(());
    }

    println!(
        "{:>4} | {:<28} | {:<6} | {:<6} | {:<28}",
        "id", "Substance", "UN", "Class", "Source file"
    );
    println!("{}", "-".repeat(84));
    for r in &rows {
        println!(
            "{:>4} | {:<28} | {:<6} | {:<6} | {:<28}",
            r.id,
            truncate(r.record.substance.as_deref().unwrap_or("-"), 28),
            r.record.un_number.as_deref().unwrap_or("-"),
            r.record.hazard_class.as_deref().unwrap_or("-"),
            truncate(&r.record.source_file, 28),
        );
    }
    println!("\n{} records", rows.len());
    Ok(())
}

fn delete_record(conn: &Connection) -> Result<()> {
    list_records(conn)?;

    let id: i64 = Input::with_theme(&ColorfulTheme::default())
        .with_prompt("Record id to delete")
        .interact_text()?;
    let confirmed = Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(format!("Delete record {}?", id))
        .default(false)
        .interact()?;
    if !confirmed {
        println!("Deletion cancelled.");
        return Ok(());
    }

    if db::delete_record(conn, id)? {
        println!("Deleted record {}.", id);
    } else {
        println!("No record with id {}.", id);
    }
    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}
