use crate::version::{GroupedUpdates, UpdateEntry, VersionBump};
use serde::{Deserialize, Serialize};

/// A package/version pair chosen by the operator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SelectionItem {
    pub name: String,
    pub version: String,
}

impl SelectionItem {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChoiceValue {
    /// Non-selectable group separator.
    Header { bump: VersionBump, count: usize },
    Package {
        item: SelectionItem,
        bump: VersionBump,
        current_version: String,
    },
}

/// One line of the picker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Choice {
    pub label: String,
    pub value: ChoiceValue,
    /// Always false: the operator must opt in to every update.
    pub checked: bool,
}

impl Choice {
    pub fn item(&self) -> Option<&SelectionItem> {
        match &self.value {
            ChoiceValue::Package { item, .. } => Some(item),
            ChoiceValue::Header { .. } => None,
        }
    }
}

/// Builds the picker list: patch, minor, then major, each behind a header.
pub fn build_choices(grouped: &GroupedUpdates) -> Vec<Choice> {
    let mut choices = Vec::with_capacity(grouped.len() + 3);

    for bump in VersionBump::DISPLAY_ORDER {
        let entries: &[UpdateEntry] = grouped.group(bump);
        if entries.is_empty() {
            continue;
        }

        choices.push(Choice {
            label: format!("{} ({})", bump.heading(), entries.len()),
            value: ChoiceValue::Header {
                bump,
                count: entries.len(),
            },
            checked: false,
        });

        for entry in entries {
            choices.push(Choice {
                label: format!(
                    "{}  {} → {}",
                    entry.name, entry.current_version, entry.new_version
                ),
                value: ChoiceValue::Package {
                    item: SelectionItem::new(entry.name.as_str(), entry.new_version.as_str()),
                    bump,
                    current_version: entry.current_version.clone(),
                },
                checked: false,
            });
        }
    }

    choices
}
