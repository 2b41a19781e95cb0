use anyhow::Result;

use crate::cli::OutputFormat;
use crate::transcribe::TranscriptionResponse;
use crate::utils::format_duration;

/// Render a transcription as readable text: header, then one block per paragraph
pub fn format_as_text(response: &TranscriptionResponse) -> String {
    let mut out = String::new();

    out.push_str(&format!("Title: {}\n", response.title));
    out.push_str(&format!("URL: {}\n", response.url));
    if response.duration > 0 {
        out.push_str(&format!("Duration: {}\n", format_duration(response.duration as f64)));
    }
    out.push('\n');

    if response.transcript.paragraphs.is_empty() {
        out.push_str("(no speech detected)\n");
    } else {
        out.push_str(&response.transcript.paragraphs.join("\n\n"));
        out.push('\n');
    }

    out
}

pub fn format_as_json(response: &TranscriptionResponse) -> Result<String> {
    Ok(serde_json::to_string_pretty(response)?)
}

/// Print transcription result to console
pub fn print_to_console(response: &TranscriptionResponse, format: &OutputFormat) -> Result<()> {
    let content = match format {
        OutputFormat::Text => format_as_text(response),
        OutputFormat::Json => format_as_json(response)?,
    };

    println!("{}", content);
    Ok(())
}
