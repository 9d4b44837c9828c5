//! Language-agnostic names for declared entities.

use std::fmt;

use serde::{Serialize, Serializer};

/// An identifier stored as lowercase words, projectable into any case style.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Name {
    words: Vec<String>,
}

impl Name {
    /// Split an identifier written in TitleCase, camelCase, snake_case or
    /// kebab-case into its words.
    ///
    /// Runs of capitals are treated as one acronym word, so `"HTTPServer"`
    /// yields `http` and `server`.
    pub fn derive(identifier: &str) -> Self {
        let mut words = Vec::new();
        let mut current = String::new();
        let chars: Vec<char> = identifier.chars().collect();

        for (i, &c) in chars.iter().enumerate() {
            if !c.is_alphanumeric() {
                if !current.is_empty() {
                    words.push(std::mem::take(&mut current));
                }
                continue;
            }

            if c.is_uppercase() && !current.is_empty() {
                let prev = chars[i - 1];
                let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
                if prev.is_lowercase() || prev.is_numeric() || (prev.is_uppercase() && next_is_lower)
                {
                    words.push(std::mem::take(&mut current));
                }
            }

            current.extend(c.to_lowercase());
        }

        if !current.is_empty() {
            words.push(current);
        }

        Self { words }
    }

    pub fn words(&self) -> &[String] {
        &self.words
    }

    /// `ItemStat`
    pub fn title_case(&self) -> String {
        self.words.iter().map(|w| capitalize(w)).collect()
    }

    /// `itemStat`
    pub fn camel_case(&self) -> String {
        let mut words = self.words.iter();
        let mut result = words.next().cloned().unwrap_or_default();
        result.extend(words.map(|w| capitalize(w)));
        result
    }

    /// `item_stat`
    pub fn snake_case(&self) -> String {
        self.words.join("_")
    }

    /// `ITEM_STAT`
    pub fn screaming_snake_case(&self) -> String {
        self.snake_case().to_uppercase()
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.title_case())
    }
}

impl Serialize for Name {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// The registry key of a type declaration.
///
/// Aliases live in a flat namespace. Other declarations may be nested under
/// the declarations they were built inside.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum QualifiedTypeName {
    Alias { name: Name },
    Declaration { nest: Vec<Name>, name: Name },
}

impl QualifiedTypeName {
    pub fn alias(name: Name) -> Self {
        QualifiedTypeName::Alias { name }
    }

    /// A top-level declaration name.
    pub fn declaration(name: Name) -> Self {
        QualifiedTypeName::Declaration {
            nest: Vec::new(),
            name,
        }
    }

    /// A declaration nested under `nest`, outermost first.
    pub fn nested(nest: Vec<Name>, name: Name) -> Self {
        QualifiedTypeName::Declaration { nest, name }
    }

    pub fn name(&self) -> &Name {
        match self {
            QualifiedTypeName::Alias { name } | QualifiedTypeName::Declaration { name, .. } => name,
        }
    }

    pub fn nest(&self) -> &[Name] {
        match self {
            QualifiedTypeName::Alias { .. } => &[],
            QualifiedTypeName::Declaration { nest, .. } => nest,
        }
    }

    pub fn is_alias(&self) -> bool {
        matches!(self, QualifiedTypeName::Alias { .. })
    }
}

impl fmt::Display for QualifiedTypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for parent in self.nest() {
            write!(f, "{}.", parent)?;
        }
        write!(f, "{}", self.name())
    }
}

impl Serialize for QualifiedTypeName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_splits_every_case_style() {
        for input in ["ItemStat", "itemStat", "item_stat", "item-stat", "ITEM_STAT"] {
            assert_eq!(Name::derive(input).words(), ["item", "stat"], "{input}");
        }
    }

    #[test]
    fn derive_keeps_acronyms_together() {
        assert_eq!(Name::derive("HTTPServer").words(), ["http", "server"]);
        assert_eq!(Name::derive("APIKey").words(), ["api", "key"]);
        assert_eq!(Name::derive("Skin2Id").words(), ["skin2", "id"]);
    }

    #[test]
    fn projections() {
        let name = Name::derive("guild_upgrade_id");
        assert_eq!(name.title_case(), "GuildUpgradeId");
        assert_eq!(name.camel_case(), "guildUpgradeId");
        assert_eq!(name.snake_case(), "guild_upgrade_id");
        assert_eq!(name.screaming_snake_case(), "GUILD_UPGRADE_ID");
    }

    #[test]
    fn qualified_name_display() {
        let nested = QualifiedTypeName::nested(
            vec![Name::derive("Item"), Name::derive("Details")],
            Name::derive("InfixUpgrade"),
        );
        assert_eq!(nested.to_string(), "Item.Details.InfixUpgrade");
        assert!(!nested.is_alias());

        let alias = QualifiedTypeName::alias(Name::derive("item_id"));
        assert_eq!(alias.to_string(), "ItemId");
        assert!(alias.nest().is_empty());
    }
}
