//! Layout of the poll form and the poll message.
//!
//! The message written by [`RenderedPoll::new`] is read back by the claim
//! handler when a button is pressed, so the block order and field positions
//! below are shared by both directions and must only change together.

use slotpoll_core::{PollDefinition, SlotGroups, SlotIndex, EMPTY_SLOT, SLOT_COUNT};
use thiserror::Error;

use crate::{
    blocks::{
        Block, BlockElement, ButtonElement, MessageBuilder, MessageTemplate, ModalBuilder,
        ModalView, TextObject,
    },
    payload::ViewStateValues,
};

pub const POLL_MODAL_CALLBACK_ID: &str = "poll.create.v1";
pub const QUESTION_INPUT_ID: &str = "question";
pub const CHOICE_INPUT_IDS: [&str; SLOT_COUNT] = ["choice1", "choice2", "choice3", "choice4"];
pub const CHANNEL_BLOCK_ID: &str = "channel";
pub const CHANNEL_ACTION_ID: &str = "channelActionID";

const CHOICE_PLACEHOLDERS: [&str; SLOT_COUNT] = ["2 hours", "3 days", "4 months", "5 years"];

pub const HEADER_BLOCK_ID: &str = "poll.header.v1";
pub const CHOICES_BLOCK_ID: &str = "poll.choices.v1";
pub const SLOTS_BLOCK_ID: &str = "poll.slots.v1";

const HEADER_BLOCK: usize = 0;
const CHOICES_BLOCK: usize = 1;
const SLOTS_BLOCK: usize = 2;
const SLOT_FIELD_COUNT: usize = SLOT_COUNT * 2;

/// Form opened by `/poll`.
pub fn poll_modal(initial_channel: Option<&str>) -> ModalView {
    let mut modal = ModalBuilder::new(POLL_MODAL_CALLBACK_ID, "Fun fun poll time!")
        .close("nvm")
        .submit("Party time!")
        .text_input(QUESTION_INPUT_ID, "Name of Post", "It's time to poll!");

    for slot in SlotIndex::all() {
        modal = modal.text_input(
            CHOICE_INPUT_IDS[slot.get()],
            format!("Choice {slot}"),
            CHOICE_PLACEHOLDERS[slot.get()],
        );
    }

    modal
        .conversation_select(
            CHANNEL_BLOCK_ID,
            CHANNEL_ACTION_ID,
            "channel to post in",
            initial_channel.filter(|channel| !channel.is_empty()).map(str::to_owned),
        )
        .build()
}

/// Action id of the button that claims `slot`.
pub fn choice_action_id(slot: SlotIndex) -> String {
    format!("actionID{slot}")
}

pub fn is_choice_action(action_id: &str) -> bool {
    SlotIndex::all().any(|slot| choice_action_id(slot) == action_id)
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum LayoutError {
    #[error("poll message has {found} blocks, expected at least 3")]
    MissingBlocks { found: usize },
    #[error("block {index} is not a {expected}")]
    UnexpectedBlock { index: usize, expected: &'static str },
    #[error("slot section has {found} fields, expected {SLOT_FIELD_COUNT}")]
    SlotFieldCount { found: usize },
    #[error("poll form submission has no value for `{0}`")]
    MissingInput(&'static str),
}

/// Reads the poll form back out of a submitted view.
pub fn definition_from_submission(values: &ViewStateValues) -> Result<PollDefinition, LayoutError> {
    let text = |id: &'static str| {
        values.text(id, id).map(str::to_owned).ok_or(LayoutError::MissingInput(id))
    };

    let question = text(QUESTION_INPUT_ID)?;
    let [first, second, third, fourth] = CHOICE_INPUT_IDS;
    let choices = [text(first)?, text(second)?, text(third)?, text(fourth)?];
    let channel = values.conversation(CHANNEL_BLOCK_ID, CHANNEL_ACTION_ID).map(str::to_owned);

    Ok(PollDefinition::new(question, choices, channel))
}

/// Typed view over the blocks of a posted poll message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderedPoll {
    blocks: Vec<Block>,
}

impl RenderedPoll {
    pub fn new(poll: &PollDefinition) -> Self {
        let template = MessageBuilder::new(poll.question.clone())
            .section(HEADER_BLOCK_ID, |section| {
                section.plain(poll.question.clone());
            })
            .actions(CHOICES_BLOCK_ID, |actions| {
                for slot in SlotIndex::all() {
                    actions.button(
                        ButtonElement::new(choice_action_id(slot), poll.choice(slot))
                            .value(slot.button_value()),
                    );
                }
            })
            .section(SLOTS_BLOCK_ID, |section| {
                for slot in SlotIndex::all() {
                    section.plain_field(poll.choice(slot)).mrkdwn_field(EMPTY_SLOT);
                }
            })
            .build();

        Self { blocks: template.blocks }
    }

    /// Wraps blocks echoed back by Slack, checking the layout first.
    pub fn from_blocks(blocks: Vec<Block>) -> Result<Self, LayoutError> {
        if blocks.len() < 3 {
            return Err(LayoutError::MissingBlocks { found: blocks.len() });
        }
        if !matches!(&blocks[HEADER_BLOCK], Block::Section { text: Some(_), .. }) {
            return Err(LayoutError::UnexpectedBlock {
                index: HEADER_BLOCK,
                expected: "section with header text",
            });
        }
        match &blocks[CHOICES_BLOCK] {
            Block::Actions { elements, .. }
                if elements.len() == SLOT_COUNT
                    && elements.iter().all(|element| matches!(element, BlockElement::Button(_))) => {}
            _ => {
                return Err(LayoutError::UnexpectedBlock {
                    index: CHOICES_BLOCK,
                    expected: "row of four buttons",
                })
            }
        }
        match &blocks[SLOTS_BLOCK] {
            Block::Section { fields, .. } if fields.len() == SLOT_FIELD_COUNT => {}
            Block::Section { fields, .. } => {
                return Err(LayoutError::SlotFieldCount { found: fields.len() })
            }
            _ => {
                return Err(LayoutError::UnexpectedBlock {
                    index: SLOTS_BLOCK,
                    expected: "section with slot fields",
                })
            }
        }

        Ok(Self { blocks })
    }

    pub fn question(&self) -> &str {
        match self.blocks.get(HEADER_BLOCK) {
            Some(Block::Section { text: Some(text), .. }) => text.text(),
            _ => "",
        }
    }

    pub fn choice(&self, slot: SlotIndex) -> &str {
        self.slot_fields().get(slot.get() * 2).map(TextObject::text).unwrap_or_default()
    }

    pub fn slot_group(&self, slot: SlotIndex) -> &str {
        self.group_field(slot.get())
    }

    pub fn slot_groups(&self) -> SlotGroups {
        SlotGroups::from_display(std::array::from_fn(|index| self.group_field(index).to_owned()))
    }

    /// Rewrites the four group fields; every other block is left as it was.
    pub fn set_slot_groups(&mut self, groups: &SlotGroups) {
        let Some(Block::Section { fields, .. }) = self.blocks.get_mut(SLOTS_BLOCK) else {
            return;
        };
        for slot in SlotIndex::all() {
            if let Some(field) = fields.get_mut(slot.get() * 2 + 1) {
                field.set_text(groups.get(slot));
            }
        }
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn into_template(self) -> MessageTemplate {
        MessageTemplate { fallback_text: self.question().to_owned(), blocks: self.blocks }
    }

    fn group_field(&self, index: usize) -> &str {
        self.slot_fields().get(index * 2 + 1).map(TextObject::text).unwrap_or(EMPTY_SLOT)
    }

    fn slot_fields(&self) -> &[TextObject] {
        match self.blocks.get(SLOTS_BLOCK) {
            Some(Block::Section { fields, .. }) => fields,
            _ => &[],
        }
    }
}
