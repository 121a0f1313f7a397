//! Handoff blob inspection

use std::io::Read;

use anyhow::Context;
use pawnshop_types::HandoffCodec;

use crate::display;

pub fn show_handle(blob: &str) -> anyhow::Result<()> {
    let blob = if blob == "-" {
        let mut input = String::new();
        std::io::stdin()
            .read_to_string(&mut input)
            .context("reading handoff blob from stdin")?;
        input
    } else {
        blob.to_string()
    };

    let info = HandoffCodec::decode(&blob)?;
    display::section("Contract handle");
    display::kv("network", &info.network);
    display::kv("app id", &info.app_id.to_string());
    display::success(&format!("attach with: {}", serde_json::to_string(&info)?));
    Ok(())
}
