use serde::Deserialize;
use thiserror::Error;

pub const POLL_COMMAND: &str = "/poll";

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct SlashCommandPayload {
    pub command: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub channel_id: String,
    pub user_id: String,
    pub trigger_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PollCommand {
    pub trigger_id: String,
    pub user_id: String,
    pub channel_id: String,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CommandParseError {
    #[error("unsupported slash command: {0}")]
    UnsupportedCommand(String),
    #[error("slash command is missing `{0}`")]
    MissingField(&'static str),
}

pub fn is_poll_command(command: &str) -> bool {
    command.trim() == POLL_COMMAND
}

/// Any text after the command is ignored; the poll is described in the
/// modal, not on the command line.
pub fn normalize_poll_command(payload: SlashCommandPayload) -> Result<PollCommand, CommandParseError> {
    if !is_poll_command(&payload.command) {
        return Err(CommandParseError::UnsupportedCommand(payload.command));
    }
    if payload.trigger_id.trim().is_empty() {
        return Err(CommandParseError::MissingField("trigger_id"));
    }

    Ok(PollCommand {
        trigger_id: payload.trigger_id,
        user_id: payload.user_id,
        channel_id: payload.channel_id,
    })
}

#[cfg(test)]
mod tests {
    use super::{normalize_poll_command, CommandParseError, SlashCommandPayload};

    fn payload(command: &str) -> SlashCommandPayload {
        SlashCommandPayload {
            command: command.to_owned(),
            text: "ignored words".to_owned(),
            channel_id: "C1".to_owned(),
            user_id: "U1".to_owned(),
            trigger_id: "trig-1".to_owned(),
        }
    }

    #[test]
    fn poll_command_is_normalized() {
        let command = normalize_poll_command(payload("/poll")).expect("normalize");

        assert_eq!(command.trigger_id, "trig-1");
        assert_eq!(command.user_id, "U1");
        assert_eq!(command.channel_id, "C1");
    }

    #[test]
    fn only_the_poll_command_is_handled() {
        let error = normalize_poll_command(payload("/slash")).expect_err("should reject");
        assert_eq!(error, CommandParseError::UnsupportedCommand("/slash".to_owned()));
    }

    #[test]
    fn other_commands_are_rejected() {
        let error = normalize_poll_command(payload("/vote")).expect_err("should reject");
        assert_eq!(error, CommandParseError::UnsupportedCommand("/vote".to_owned()));
    }

    #[test]
    fn command_without_trigger_cannot_open_a_modal() {
        let mut payload = payload("/poll");
        payload.trigger_id = " ".to_owned();

        let error = normalize_poll_command(payload).expect_err("should reject");
        assert_eq!(error, CommandParseError::MissingField("trigger_id"));
    }
}
