use crate::slots::{SlotIndex, SLOT_COUNT};

/// What a user typed into the poll form. Consumed when the poll message is
/// rendered; the posted message is the only place it survives.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PollDefinition {
    pub question: String,
    pub choices: [String; SLOT_COUNT],
    pub channel: Option<String>,
}

impl PollDefinition {
    pub fn new(
        question: impl Into<String>,
        choices: [String; SLOT_COUNT],
        channel: Option<String>,
    ) -> Self {
        Self {
            question: question.into(),
            choices,
            channel: channel.filter(|channel| !channel.trim().is_empty()),
        }
    }

    pub fn choice(&self, slot: SlotIndex) -> &str {
        &self.choices[slot.get()]
    }

    /// Channel the poll is posted to. Without a selected channel the poll is
    /// delivered to the submitter as a direct message.
    pub fn delivery_channel<'a>(&'a self, submitter_id: &'a str) -> &'a str {
        self.channel.as_deref().unwrap_or(submitter_id)
    }
}

/// A single button click: who clicked and which slot they asked for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClaimEvent {
    pub claimant: String,
    pub target: SlotIndex,
}

impl ClaimEvent {
    pub fn new(claimant: impl Into<String>, target: SlotIndex) -> Self {
        Self { claimant: claimant.into(), target }
    }

    pub fn for_user(user_id: &str, target: SlotIndex) -> Self {
        Self::new(mention(user_id), target)
    }
}

/// Slack mention markup for a user id.
pub fn mention(user_id: &str) -> String {
    format!("<@{user_id}>")
}
