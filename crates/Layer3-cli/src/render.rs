//! Text / JSON output for each report type

use chrono::{DateTime, Local, Utc};
use serde::Serialize;
use taskmux_task::{
    format_duration, CheckReport, KillOutcome, KillReport, LaunchState, LaunchedTask,
    StatusRecord, TailEvent, TaskListing, TaskStatus,
};

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn local_time(ts: Option<DateTime<Utc>>) -> String {
    ts.map(|t| {
        t.with_timezone(&Local)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string()
    })
    .unwrap_or_else(|| "-".to_string())
}

fn outcome_mark(record: &StatusRecord) -> &'static str {
    match record.exit_code {
        Some(0) => "✓",
        Some(_) => "✗",
        None => "?",
    }
}

fn print_record(record: &StatusRecord) {
    let exit = record
        .exit_code
        .map(|c| c.to_string())
        .unwrap_or_else(|| "-".to_string());
    println!("  Exit code: {} {}", exit, outcome_mark(record));
    println!("  Command:   {}", record.command);
    println!("  Started:   {}", local_time(record.started_at));
    println!("  Finished:  {}", local_time(record.finished_at));
    if let Some(secs) = record.duration_seconds {
        println!("  Duration:  {}", format_duration(secs));
    }
    if !record.workdir.is_empty() {
        println!("  Workdir:   {}", record.workdir);
    }
    if !record.env_vars.is_empty() {
        println!("  Env:       {}", record.env_vars);
    }
    if !record.log_file.is_empty() {
        println!("  Log:       {}", record.log_file);
    }
}

fn print_lines(lines: &[String]) {
    for line in lines {
        println!("  {}", line);
    }
}

pub fn launched(task: &LaunchedTask) {
    println!("Started {}", task.name);
    println!("  Workdir: {}", task.workdir.display());
    println!("  Log:     {}", task.log_file.display());
    if let LaunchState::Finished { record } = &task.state {
        println!("\nTask already finished:");
        print_record(record);
    }
    println!("\nUse 'taskmux check {}' or 'taskmux tail {}' to follow it.", task.name, task.name);
}

pub fn check(report: &CheckReport, json: bool) -> anyhow::Result<()> {
    if json {
        return print_json(report);
    }
    match report {
        CheckReport::Running {
            name,
            output,
            record,
        } => {
            println!("{} is running", name);
            if let Some(record) = record {
                println!("  Started: {}", local_time(record.started_at));
                println!("  Workdir: {}", record.workdir);
            }
            println!("\n--- recent output ---");
            println!("{}", output);
        }
        CheckReport::Finished {
            name,
            record,
            log_tail,
        } => {
            let verdict = if record.is_success() { "succeeded" } else { "failed" };
            println!("{} {}", name, verdict);
            print_record(record);
            if !log_tail.is_empty() {
                println!("\n--- log tail ---");
                print_lines(log_tail);
            }
        }
        CheckReport::Unknown {
            name,
            log_file,
            log_tail,
        } => {
            println!("{} ended without a status record (killed or crashed)", name);
            println!("  Log: {}", log_file.display());
            if !log_tail.is_empty() {
                println!("\n--- log tail ---");
                print_lines(log_tail);
            }
        }
    }
    Ok(())
}

pub fn status(status: &TaskStatus, json: bool) -> anyhow::Result<()> {
    if json {
        return print_json(status);
    }
    match status {
        TaskStatus::Running { name, record } => {
            println!("{} is running", name);
            if let Some(record) = record {
                print_record(record);
            }
        }
        TaskStatus::Finished { name, record } => {
            let verdict = if record.is_success() { "succeeded" } else { "failed" };
            println!("{} {}", name, verdict);
            print_record(record);
        }
    }
    Ok(())
}

pub fn listing(listing: &TaskListing, json: bool) -> anyhow::Result<()> {
    if json {
        return print_json(listing);
    }

    if listing.live.is_empty() {
        println!("No running tasks.");
    } else {
        println!("Running tasks\n");
        println!("{:<32} {:<20} {}", "NAME", "STARTED", "WORKDIR");
        println!("{}", "-".repeat(80));
        for task in &listing.live {
            let workdir = task
                .record
                .as_ref()
                .map(|r| r.workdir.clone())
                .unwrap_or_default();
            println!(
                "{:<32} {:<20} {}",
                task.name,
                local_time(task.started_at),
                workdir
            );
        }
    }

    if !listing.history.is_empty() {
        println!("\nRecent tasks\n");
        println!(
            "{:<32} {:<9} {:<11} {}",
            "NAME", "RESULT", "DURATION", "COMMAND"
        );
        println!("{}", "-".repeat(80));
        for row in &listing.history {
            println!(
                "{:<32} {:<9} {:<11} {}",
                row.name, row.outcome, row.duration, row.command
            );
        }
    }
    Ok(())
}

pub fn tail_event(name: &str, event: &TailEvent) {
    match event {
        TailEvent::Snapshot { at, output } => {
            println!(
                "--- {} @ {} ---",
                name,
                at.with_timezone(&Local).format("%H:%M:%S")
            );
            println!("{}", output);
        }
        TailEvent::Ended { log_tail } => {
            println!("--- {} ended; log tail ---", name);
            for line in log_tail {
                println!("{}", line);
            }
        }
    }
}

pub fn killed(name: &str, outcome: &KillOutcome) {
    match outcome {
        KillOutcome::Killed { status_removed } => {
            println!("✓ Killed {}", name);
            if *status_removed {
                println!("  Removed status record");
            }
        }
        KillOutcome::Failed { error } => println!("✗ {}: {}", name, error),
    }
}

pub fn kill_report(report: &KillReport) {
    if report.is_empty() {
        println!("No task sessions running.");
        return;
    }
    for (name, outcome) in &report.sessions {
        killed(name, outcome);
    }
    println!(
        "\n{} killed, {} failed",
        report.killed(),
        report.failed()
    );
}
