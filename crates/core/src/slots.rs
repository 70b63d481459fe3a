//! Slot groups and the claim reconciler.
//!
//! A poll carries exactly four slot groups. Each group is rendered as one
//! display string: either [`EMPTY_SLOT`] or a `", "`-separated list of member
//! mentions. A mention lives in at most one group at a time, and
//! [`reconcile`] is the only transition that moves members between groups.

use std::fmt;
use std::str::FromStr;

use crate::errors::DomainError;
use crate::poll::ClaimEvent;

/// Number of claimable slots on every poll.
pub const SLOT_COUNT: usize = 4;

/// Placeholder rendered for a group with no members. Slack rejects empty
/// field text, so a group is never serialized as `""`.
pub const EMPTY_SLOT: &str = ":";

/// Separator between member mentions inside one group.
pub const MEMBER_SEPARATOR: &str = ", ";

/// Zero-based slot position, always in `0..SLOT_COUNT`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotIndex(usize);

impl SlotIndex {
    pub fn new(index: usize) -> Result<Self, DomainError> {
        if index < SLOT_COUNT {
            Ok(Self(index))
        } else {
            Err(DomainError::InvalidSlot(index.to_string()))
        }
    }

    /// Converts a 1-based button value (`"1"` through `"4"`).
    pub fn from_button_value(value: &str) -> Result<Self, DomainError> {
        let position = value
            .trim()
            .parse::<usize>()
            .map_err(|_| DomainError::InvalidSlot(value.to_owned()))?;
        position
            .checked_sub(1)
            .and_then(|index| Self::new(index).ok())
            .ok_or_else(|| DomainError::InvalidSlot(value.to_owned()))
    }

    pub fn all() -> impl Iterator<Item = SlotIndex> {
        (0..SLOT_COUNT).map(SlotIndex)
    }

    pub fn get(self) -> usize {
        self.0
    }

    /// The 1-based value carried by the slot's button.
    pub fn button_value(self) -> String {
        (self.0 + 1).to_string()
    }
}

impl fmt::Display for SlotIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0 + 1)
    }
}

impl FromStr for SlotIndex {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::from_button_value(value)
    }
}

/// The four display strings of a poll, in slot order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlotGroups([String; SLOT_COUNT]);

impl Default for SlotGroups {
    fn default() -> Self {
        Self::empty()
    }
}

impl SlotGroups {
    pub fn empty() -> Self {
        Self(std::array::from_fn(|_| EMPTY_SLOT.to_owned()))
    }

    /// Wraps display strings read back from a rendered message. An empty
    /// string is normalized to the sentinel.
    pub fn from_display(groups: [String; SLOT_COUNT]) -> Self {
        Self(groups.map(|group| if group.is_empty() { EMPTY_SLOT.to_owned() } else { group }))
    }

    pub fn get(&self, slot: SlotIndex) -> &str {
        &self.0[slot.0]
    }

    /// Parsed member list of one group, in display order.
    pub fn members(&self, slot: SlotIndex) -> Vec<&str> {
        parse_members(self.get(slot))
    }

    /// First slot, scanning 0 to 3, whose group lists `mention`.
    pub fn position_of(&self, mention: &str) -> Option<SlotIndex> {
        SlotIndex::all().find(|slot| self.members(*slot).contains(&mention))
    }
}

/// Applies one claim to the current groups and returns the next groups.
///
/// - claimant absent everywhere: appended to the target group
/// - claimant already in the target group: removed (toggle-off)
/// - claimant in another group: removed there and appended to the target
///
/// Only the first occurrence is removed if a group ever holds duplicates.
pub fn reconcile(groups: &SlotGroups, claim: &ClaimEvent) -> SlotGroups {
    let mut parsed: [Vec<&str>; SLOT_COUNT] =
        std::array::from_fn(|index| parse_members(&groups.0[index]));

    let target = claim.target.get();
    let current = groups.position_of(&claim.claimant).map(SlotIndex::get);

    match current {
        None => parsed[target].push(claim.claimant.as_str()),
        Some(current) => {
            remove_first(&mut parsed[current], &claim.claimant);
            if current != target {
                parsed[target].push(claim.claimant.as_str());
            }
        }
    }

    SlotGroups(parsed.map(|members| render_members(&members)))
}

fn parse_members(display: &str) -> Vec<&str> {
    if display.is_empty() || display == EMPTY_SLOT {
        return Vec::new();
    }
    display.split(MEMBER_SEPARATOR).collect()
}

fn render_members(members: &[&str]) -> String {
    if members.is_empty() {
        EMPTY_SLOT.to_owned()
    } else {
        members.join(MEMBER_SEPARATOR)
    }
}

fn remove_first(members: &mut Vec<&str>, mention: &str) {
    if let Some(position) = members.iter().position(|member| *member == mention) {
        members.remove(position);
    }
}
