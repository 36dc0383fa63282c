use std::io::IsTerminal;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

use crate::cmd::inspect::{ChannelSummary, FrameRecord};

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct SummaryOutput<'a> {
    frames: usize,
    channels: &'a [ChannelSummary],
}

pub fn print_frames(frames: &[FrameRecord], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            for frame in frames {
                println!("{}", to_json(frame));
            }
        }
        OutputFormat::Table => {
            let mut table = new_table(vec!["#", "CHANNEL", "KIND", "SIZE", "DETAIL"]);
            for frame in frames {
                table.add_row(vec![
                    frame.index.to_string(),
                    format!("{} ({})", frame.channel, frame.channel_name),
                    frame.kind.to_string(),
                    frame.size.to_string(),
                    frame.detail.clone(),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for frame in frames {
                println!(
                    "#{} channel={} kind={} size={} {}",
                    frame.index, frame.channel, frame.kind, frame.size, frame.detail
                );
            }
        }
    }
}

pub fn print_summary(frames: usize, channels: &[ChannelSummary], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            println!("{}", to_json(&SummaryOutput { frames, channels }));
        }
        OutputFormat::Table => {
            let mut table = new_table(vec![
                "CHANNEL", "METHODS", "HEADERS", "BODIES", "BODY BYTES", "HEARTBEATS", "LAST METHOD",
            ]);
            for summary in channels {
                table.add_row(vec![
                    summary.channel.to_string(),
                    summary.methods.to_string(),
                    summary.headers.to_string(),
                    summary.bodies.to_string(),
                    summary.body_bytes.to_string(),
                    summary.heartbeats.to_string(),
                    summary.last_method.clone().unwrap_or_else(|| "-".to_string()),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!("{frames} frames on {} channels", channels.len());
            for summary in channels {
                println!(
                    "channel={} methods={} headers={} bodies={} body_bytes={} heartbeats={} last_method={}",
                    summary.channel,
                    summary.methods,
                    summary.headers,
                    summary.bodies,
                    summary.body_bytes,
                    summary.heartbeats,
                    summary.last_method.as_deref().unwrap_or("-"),
                );
            }
        }
    }
}

fn new_table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    table
}

fn to_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
}
