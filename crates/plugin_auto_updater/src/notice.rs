//! Player-facing text and console commands.

/// Console command that terminates the server process.
pub const TERMINATE_COMMAND: &str = "quit";

/// Renders a countdown as whole minutes from one minute up, seconds below.
pub fn format_remaining(seconds: u64) -> String {
    if seconds >= 60 {
        let minutes = seconds / 60;
        format!("{} minute{}", minutes, if minutes > 1 { "s" } else { "" })
    } else {
        format!("{} second{}", seconds, if seconds == 1 { "" } else { "s" })
    }
}

/// Chat line announcing the update.
pub fn update_notice(chat_tag: &str, required_version: u32, remaining_seconds: u64) -> String {
    format!(
        " {} New game update released (Build: {}), the server will restart in {}",
        chat_tag,
        required_version,
        format_remaining(remaining_seconds)
    )
}

/// Reason shown to kicked players.
pub fn kick_reason(required_version: u32) -> String {
    format!(
        "Due to the game update (Build: {}), the server is now restarting.",
        required_version
    )
}

/// Console command kicking `user_id` with the update reason.
pub fn kick_command(user_id: u32, required_version: u32) -> String {
    format!("kickid {} {}", user_id, kick_reason(required_version))
}
