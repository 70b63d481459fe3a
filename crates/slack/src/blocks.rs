use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TextObject {
    #[serde(rename = "plain_text")]
    Plain { text: String },
    #[serde(rename = "mrkdwn")]
    Mrkdwn { text: String },
}

impl TextObject {
    pub fn plain(text: impl Into<String>) -> Self {
        Self::Plain { text: text.into() }
    }

    pub fn mrkdwn(text: impl Into<String>) -> Self {
        Self::Mrkdwn { text: text.into() }
    }

    pub fn text(&self) -> &str {
        match self {
            Self::Plain { text } | Self::Mrkdwn { text } => text,
        }
    }

    pub fn set_text(&mut self, value: impl Into<String>) {
        match self {
            Self::Plain { text } | Self::Mrkdwn { text } => *text = value.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ButtonElement {
    pub action_id: String,
    pub text: TextObject,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl ButtonElement {
    pub fn new(action_id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            action_id: action_id.into(),
            text: TextObject::plain(label),
            value: None,
        }
    }

    pub fn value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlainTextInputElement {
    pub action_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<TextObject>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationsSelectElement {
    pub action_id: String,
    pub placeholder: TextObject,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_conversation: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BlockElement {
    Button(ButtonElement),
    PlainTextInput(PlainTextInputElement),
    ConversationsSelect(ConversationsSelectElement),
}

impl BlockElement {
    pub fn action_id(&self) -> &str {
        match self {
            Self::Button(button) => &button.action_id,
            Self::PlainTextInput(input) => &input.action_id,
            Self::ConversationsSelect(select) => &select.action_id,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Section {
        #[serde(default)]
        block_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<TextObject>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        fields: Vec<TextObject>,
    },
    Actions {
        #[serde(default)]
        block_id: String,
        elements: Vec<BlockElement>,
    },
    Input {
        #[serde(default)]
        block_id: String,
        label: TextObject,
        element: BlockElement,
        #[serde(default)]
        optional: bool,
    },
}

impl Block {
    pub fn block_id(&self) -> &str {
        match self {
            Self::Section { block_id, .. }
            | Self::Actions { block_id, .. }
            | Self::Input { block_id, .. } => block_id,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MessageTemplate {
    pub fallback_text: String,
    pub blocks: Vec<Block>,
}

pub struct MessageBuilder {
    fallback_text: String,
    blocks: Vec<Block>,
}

impl MessageBuilder {
    pub fn new(fallback_text: impl Into<String>) -> Self {
        Self { fallback_text: fallback_text.into(), blocks: Vec::new() }
    }

    pub fn section<F>(mut self, block_id: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(&mut SectionBuilder),
    {
        let mut builder = SectionBuilder::default();
        build(&mut builder);
        let (text, fields) = builder.build();
        self.blocks.push(Block::Section { block_id: block_id.into(), text, fields });
        self
    }

    pub fn actions<F>(mut self, block_id: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(&mut ActionsBuilder),
    {
        let mut builder = ActionsBuilder::default();
        build(&mut builder);
        self.blocks.push(Block::Actions { block_id: block_id.into(), elements: builder.build() });
        self
    }

    pub fn build(self) -> MessageTemplate {
        MessageTemplate { fallback_text: self.fallback_text, blocks: self.blocks }
    }
}

#[derive(Default)]
pub struct SectionBuilder {
    text: Option<TextObject>,
    fields: Vec<TextObject>,
}

impl SectionBuilder {
    pub fn plain(&mut self, text: impl Into<String>) -> &mut Self {
        self.text = Some(TextObject::plain(text));
        self
    }

    pub fn plain_field(&mut self, text: impl Into<String>) -> &mut Self {
        self.fields.push(TextObject::plain(text));
        self
    }

    pub fn mrkdwn_field(&mut self, text: impl Into<String>) -> &mut Self {
        self.fields.push(TextObject::mrkdwn(text));
        self
    }

    fn build(self) -> (Option<TextObject>, Vec<TextObject>) {
        if self.text.is_none() && self.fields.is_empty() {
            return (Some(TextObject::plain(" ")), self.fields);
        }
        (self.text, self.fields)
    }
}

#[derive(Default)]
pub struct ActionsBuilder {
    elements: Vec<BlockElement>,
}

impl ActionsBuilder {
    pub fn button(&mut self, button: ButtonElement) -> &mut Self {
        self.elements.push(BlockElement::Button(button));
        self
    }

    fn build(self) -> Vec<BlockElement> {
        self.elements
    }
}

/// A `views.open` payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename = "modal")]
pub struct ModalView {
    pub callback_id: String,
    pub title: TextObject,
    pub close: TextObject,
    pub submit: TextObject,
    pub blocks: Vec<Block>,
}

pub struct ModalBuilder {
    callback_id: String,
    title: String,
    close: String,
    submit: String,
    blocks: Vec<Block>,
}

impl ModalBuilder {
    pub fn new(callback_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            callback_id: callback_id.into(),
            title: title.into(),
            close: "Cancel".to_owned(),
            submit: "Submit".to_owned(),
            blocks: Vec::new(),
        }
    }

    pub fn close(mut self, label: impl Into<String>) -> Self {
        self.close = label.into();
        self
    }

    pub fn submit(mut self, label: impl Into<String>) -> Self {
        self.submit = label.into();
        self
    }

    /// Single-line text input; the block id doubles as the action id.
    pub fn text_input(
        mut self,
        id: impl Into<String>,
        label: impl Into<String>,
        placeholder: impl Into<String>,
    ) -> Self {
        let id = id.into();
        self.blocks.push(Block::Input {
            block_id: id.clone(),
            label: TextObject::plain(label),
            element: BlockElement::PlainTextInput(PlainTextInputElement {
                action_id: id,
                placeholder: Some(TextObject::plain(placeholder)),
            }),
            optional: false,
        });
        self
    }

    pub fn conversation_select(
        mut self,
        block_id: impl Into<String>,
        action_id: impl Into<String>,
        label: impl Into<String>,
        initial_conversation: Option<String>,
    ) -> Self {
        let label = label.into();
        self.blocks.push(Block::Input {
            block_id: block_id.into(),
            label: TextObject::plain(label.clone()),
            element: BlockElement::ConversationsSelect(ConversationsSelectElement {
                action_id: action_id.into(),
                placeholder: TextObject::plain(label),
                initial_conversation,
            }),
            optional: true,
        });
        self
    }

    pub fn build(self) -> ModalView {
        ModalView {
            callback_id: self.callback_id,
            title: TextObject::plain(self.title),
            close: TextObject::plain(self.close),
            submit: TextObject::plain(self.submit),
            blocks: self.blocks,
        }
    }
}
