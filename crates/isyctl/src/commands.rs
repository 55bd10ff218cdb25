//! Command handlers for isyctl.

use anyhow::Result;
use owo_colors::OwoColorize;

use crate::client::IsydClient;
use crate::display;
use crate::progress::Spinner;

/// Send one natural-language command and render the daemon's answer.
pub async fn ask(server: &str, prompt: Vec<String>, show_logs: bool) -> Result<()> {
    let prompt = prompt.join(" ");
    if prompt.trim().is_empty() {
        anyhow::bail!(
            "Lệnh trống. Ví dụ: isyctl ask Giao cho An 3 bài tập về giải hệ phương trình"
        );
    }

    let client = IsydClient::new(server)?;

    // Fail fast with a connection hint before the model round trip.
    client.health().await?;

    println!();
    println!("  {} {}", "🎓 Gia sư:".bold(), prompt);
    println!();

    let spinner = Spinner::start("ISY đang xử lý yêu cầu của bạn...");
    let outcome = client.command(&prompt).await;
    spinner.stop();

    display::print_result(&outcome?, show_logs);
    Ok(())
}

/// Print daemon health, with a friendly hint when isyd is down.
pub async fn health(server: &str) -> Result<()> {
    let client = IsydClient::new(server)?;

    match client.health().await {
        Ok(report) => display::print_health(&report),
        Err(e) => {
            println!();
            println!(
                "  {}",
                "⚠️  Backend isyd không khả dụng. Vui lòng khởi động isyd trước khi sử dụng."
                    .yellow()
            );
            println!("  {}", format!("{e:#}").dimmed());
            println!();
        }
    }
    Ok(())
}
