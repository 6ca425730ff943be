//! Text rendering of the upgrade view

use upgrade_core::ViewState;

/// Render `view` as terminal lines
pub(crate) fn render(view: &ViewState) -> Vec<String> {
    match view {
        ViewState::Loading => vec!["Loading".to_string()],
        ViewState::Failed { error, .. } => vec![
            "Fetching failed, please retry.".to_string(),
            format!("  reason: {error}"),
        ],
        ViewState::NotActive {
            transitioning,
            error,
            ..
        } => {
            let button = if *transitioning {
                "[Activating Trial]"
            } else {
                "[Activate Trial]"
            };
            let mut lines = vec![
                "You have not activated trial period!".to_string(),
                format!("  {button}"),
            ];
            if let Some(error) = error {
                lines.push(format!("  Error happened: {error}"));
            }
            lines
        }
        ViewState::ActiveTrial { expires_at } => vec![
            "Your Card is now in trial period, well done!".to_string(),
            format!("  expires at {}", expires_at.format("%Y-%m-%d %H:%M UTC")),
        ],
    }
}
