use std::fmt::Write as _;

use console::style;

use super::Config;

/// Print the effective configuration
#[inline]
pub fn show_config(config: &Config) {
    print!("{}", render_config(config));
}

#[inline]
pub fn render_config(config: &Config) -> String {
    let mut out = String::new();
    // Writing to a String cannot fail
    let _ = write_config(&mut out, config);
    out
}

fn write_config(out: &mut String, config: &Config) -> std::fmt::Result {
    writeln!(out, "{}", style("📋 Current Configuration").bold().cyan())?;
    writeln!(out)?;

    writeln!(out, "{}", style("Embedding Service:").bold().yellow())?;
    writeln!(out, "  API: {}", style(config.embedding.api.name()).cyan())?;
    match config.embedding_url() {
        Ok(url) => writeln!(out, "  Endpoint: {}", style(url).cyan())?,
        Err(e) => writeln!(out, "  Endpoint: {} ({})", style("Invalid").red(), e)?,
    }
    writeln!(out, "  Model: {}", style(&config.embedding.model).cyan())?;
    writeln!(
        out,
        "  API Key: {}",
        style(if config.embedding.api_key.is_some() {
            "set"
        } else {
            "not set"
        })
        .cyan()
    )?;
    writeln!(
        out,
        "  Timeout: {}s, {} attempt(s)",
        style(config.embedding.timeout_seconds).cyan(),
        style(config.embedding.retry_attempts).cyan()
    )?;

    writeln!(out)?;
    writeln!(out, "{}", style("Chunking:").bold().yellow())?;
    writeln!(out, "  Chunk Size: {}", style(config.chunking.chunk_size).cyan())?;
    writeln!(out, "  Overlap: {}", style(config.chunking.overlap).cyan())?;

    writeln!(out)?;
    writeln!(out, "{}", style("Index:").bold().yellow())?;
    let index = &config.index;
    writeln!(out, "  Name: {}", style(&index.name).cyan())?;
    writeln!(out, "  Key Prefix: {}", style(&index.key_prefix).cyan())?;
    writeln!(
        out,
        "  Fields: {} / {}",
        style(&index.text_field).cyan(),
        style(&index.vector_field).cyan()
    )?;
    writeln!(
        out,
        "  Vectors: {} x {} ({})",
        style(index.dimension).cyan(),
        style(index.encoding).cyan(),
        style(index.distance_metric).cyan()
    )?;

    writeln!(out)?;
    writeln!(out, "{}", style("Retrieval:").bold().yellow())?;
    writeln!(out, "  Top K: {}", style(config.retrieval.top_k).cyan())?;
    writeln!(
        out,
        "  Timeout: {}s",
        style(config.retrieval.timeout_seconds).cyan()
    )?;

    writeln!(out)?;
    writeln!(out, "{}", style("Ingestion:").bold().yellow())?;
    writeln!(out, "  Extension: .{}", style(&config.ingest.extension).cyan())?;
    writeln!(out, "  Concurrency: {}", style(config.ingest.concurrency).cyan())?;

    writeln!(out)?;
    writeln!(out, "{}", style("Chat:").bold().yellow())?;
    writeln!(out, "  Model: {}", style(&config.chat.model).cyan())?;
    writeln!(out, "  Temperature: {}", style(config.chat.temperature).cyan())?;

    writeln!(out)?;
    writeln!(
        out,
        "Vector store: {}",
        style(config.vector_database_path().display()).dim()
    )?;
    writeln!(
        out,
        "Config file: {}",
        style(config.config_file_path().display()).dim()
    )?;

    Ok(())
}
