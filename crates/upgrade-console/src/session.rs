//! Render loop over one controller

use crate::driver::{Driver, Reaction};
use crate::render::render;
use std::io::Write;
use upgrade_core::{UpgradeController, ViewState, ViewStatus};

/// Render views and let `driver` react until nothing further applies
///
/// Each distinct rendering is written once. Returns the final view status.
pub(crate) async fn run_session<W: Write>(
    controller: &mut UpgradeController,
    driver: &mut Driver,
    out: &mut W,
) -> anyhow::Result<ViewStatus> {
    let mut view = controller.view();
    let mut last_lines: Option<Vec<String>> = None;
    let mut last_status: Option<ViewStatus> = None;
    let mut last_view: Option<ViewState> = None;

    loop {
        let lines = render(&view);
        if last_lines.as_ref() != Some(&lines) {
            for line in &lines {
                writeln!(out, "{line}")?;
            }
            last_lines = Some(lines);
        }

        let status = view.status();
        if last_status != Some(status) {
            tracing::info!(status = %status, "view status changed");
            last_status = Some(status);
        }

        // Wake-ups from the other engine can repeat a view.
        if last_view.as_ref() != Some(&view) {
            let reaction = driver.react(&view);
            tracing::debug!(?reaction, status = %status, "driver reacted");
            if reaction == Reaction::Stop {
                return Ok(status);
            }
            last_view = Some(view.clone());
        }

        match controller.changed().await {
            Some(next) => view = next,
            None => {
                tracing::warn!("status query torn down");
                return Ok(status);
            }
        }
    }
}
