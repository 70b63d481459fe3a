//! Slack integration for the slot poll bot.
//!
//! - **Block Kit** (`blocks`) - typed blocks, messages and modal views
//! - **Poll layout** (`poll`) - the poll form and the posted poll message
//! - **Payloads** (`payload`) - slash command forms, interaction callbacks, Socket Mode frames
//! - **Events** (`events`) - dispatcher and the three poll handlers
//! - **Signatures** (`signature`) - `v0` request signing for the HTTP endpoints
//! - **Web API** (`api`) - `chat.postMessage`, `chat.update`, `views.open`
//! - **Socket Mode** (`socket`) - websocket runner with reconnects
//!
//! # Flow
//!
//! ```text
//! /poll ──────────────► SlashCommandHandler ──► views.open (poll form)
//! form submitted ─────► ViewSubmissionHandler ─► chat.postMessage (poll)
//! slot button pressed ► BlockActionHandler ────► reconcile ─► chat.update
//! ```
//!
//! Both transports (HTTP webhooks and Socket Mode) acknowledge Slack first and
//! then hand the decoded [`events::SlackEnvelope`] to the same
//! [`events::EventDispatcher`].

pub mod api;
pub mod blocks;
pub mod commands;
pub mod events;
pub mod payload;
pub mod poll;
pub mod signature;
pub mod socket;
