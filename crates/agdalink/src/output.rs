use std::io::{IsTerminal, Write};

use agdalink_dispatch::Event;
use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
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
struct EventOutput<'a> {
    kind: &'a str,
    payload: &'a str,
}

/// Print one delivered session event.
pub fn print_event(event: &Event, format: OutputFormat) {
    let (kind, payload) = match event {
        Event::Response(payload) => ("response", payload.clone()),
        Event::TurnCompleted => ("turn-completed", String::new()),
        Event::Error(error) => ("error", error.to_string()),
    };

    match format {
        OutputFormat::Json => {
            let out = EventOutput {
                kind,
                payload: &payload,
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["KIND", "PAYLOAD"])
                .add_row(vec![kind.to_string(), payload]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!("kind={kind} payload={payload}");
        }
        OutputFormat::Raw => {
            print_raw(payload.as_bytes());
            println!();
        }
    }
}

/// Print a set of key/value pairs (probe output, version info).
pub fn print_kv(pairs: &[(&str, String)], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let map: serde_json::Map<String, serde_json::Value> = pairs
                .iter()
                .map(|(key, value)| ((*key).to_string(), serde_json::Value::from(value.clone())))
                .collect();
            println!(
                "{}",
                serde_json::to_string(&map).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["KEY", "VALUE"]);
            for (key, value) in pairs {
                table.add_row(vec![(*key).to_string(), value.clone()]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty | OutputFormat::Raw => {
            for (key, value) in pairs {
                println!("{key}: {value}");
            }
        }
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}
