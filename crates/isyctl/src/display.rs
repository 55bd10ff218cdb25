//! Terminal rendering for daemon responses.
//!
//! Mirrors what the chat UI shows: the narrated answer, a processing
//! stats block, and an optional per-step execution timeline.

use isy_common::{InvocationResult, InvocationStatus, TraceEntry, TraceStatus};
use owo_colors::OwoColorize;
use serde_json::Value;

use crate::client::HealthReport;

const THIN_SEP: &str = "------------------------------------------------------------";
const DETAIL_INDENT: &str = "             ";

/// Print the answer, the stats block and, on request, the timeline.
pub fn print_result(result: &InvocationResult, show_logs: bool) {
    println!("  {} {}", "🤖 ISY:".cyan().bold(), result.response);
    println!();

    print_stats(result);

    if show_logs {
        println!();
        print_timeline(&result.logs);
    }
    println!();
}

fn print_stats(result: &InvocationResult) {
    println!("  {}", "📊 Thống kê xử lý:".bold());
    println!("     ⏱️  Thời gian:  {:.2} giây", result.processing_time);
    println!("     🔄 Số vòng:    {}", result.turns_processed);

    let status = result.status.as_str().to_uppercase();
    match result.status {
        InvocationStatus::Success => println!("     ✅ Trạng thái: {}", status.green()),
        InvocationStatus::Error => println!("     ✅ Trạng thái: {}", status.red()),
    }
}

/// One line per trace entry: time, status glyph, message. Entries that
/// carry details get indented follow-up lines.
fn print_timeline(logs: &[TraceEntry]) {
    println!("  {}", format!("📋 Timeline Xử Lý ({} bước):", logs.len()).bold());
    println!("  {}", THIN_SEP.dimmed());

    if logs.is_empty() {
        println!("  {}", "Không có log nào để hiển thị".dimmed());
        return;
    }

    for entry in logs {
        let time = entry.timestamp.format("%H:%M:%S").to_string();
        let phase = format!("{:<18}", entry.phase.as_str());
        println!(
            "  {} {} {} {}",
            time.dimmed(),
            status_glyph(entry.status),
            phase.dimmed(),
            entry.message
        );
        print_details(&entry.details);
    }
}

fn status_glyph(status: TraceStatus) -> &'static str {
    match status {
        TraceStatus::Processing => "🟡",
        TraceStatus::Success => "🟢",
        TraceStatus::Error => "🔴",
        TraceStatus::Info => "🔵",
    }
}

fn print_details(details: &Value) {
    let Some(map) = details.as_object() else {
        return;
    };

    for (key, value) in map {
        match key.as_str() {
            "function_name" => {
                let name = value.as_str().unwrap_or_default();
                println!("{}🔧 Function: {}", DETAIL_INDENT, name.bold());
            }
            "arguments" => {
                println!("{}📥 Arguments: {}", DETAIL_INDENT, compact(value));
            }
            "result_preview" => {
                let preview = value.as_str().unwrap_or_default();
                println!("{}📤 Result: {}", DETAIL_INDENT, preview.dimmed());
            }
            _ => {
                println!("{}{}: {}", DETAIL_INDENT, key, compact(value));
            }
        }
    }
}

fn compact(value: &Value) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| value.to_string())
}

/// Health output for `isyctl health`.
pub fn print_health(report: &HealthReport) {
    println!();
    println!("  {}", "✅ Kết nối Backend API thành công!".green().bold());
    println!("  {}", THIN_SEP.dimmed());

    let status = if report.status == "healthy" {
        report.status.green().to_string()
    } else {
        report.status.yellow().to_string()
    };

    println!("  Service:   {}", report.service);
    println!("  Version:   {}", report.version);
    println!("  Status:    {}", status);
    println!("  Uptime:    {}", format_uptime(report.uptime_seconds));
    println!();
}

fn format_uptime(secs: u64) -> String {
    let h = secs / 3600;
    let m = (secs % 3600) / 60;
    let s = secs % 60;
    if h > 0 {
        format!("{}h {}m {}s", h, m, s)
    } else if m > 0 {
        format!("{}m {}s", m, s)
    } else {
        format!("{}s", s)
    }
}
