//! Core vocabulary shared by the IR and the resolved schemas.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Query parameter value that requests every element of a bulk endpoint.
///
/// Only meaningful for [`QueryType::ByIds`] with `supports_all`. The value is
/// a convention callers must honor; it is not validated here.
pub const ALL_IDS_SENTINEL: &str = "all";

/// The underlying representation of an identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentifierBase {
    Integer,
    String,
}

/// A primitive value type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Primitive {
    Boolean,
    Integer,
    Decimal,
    String,
    Identifier(IdentifierBase),
    Bitfield,
}

impl Primitive {
    /// Whether values of this type can identify a resource.
    pub fn is_identifier(&self) -> bool {
        matches!(
            self,
            Primitive::Integer | Primitive::String | Primitive::Identifier(_)
        )
    }

    /// Parse the keyword used in catalogue files.
    ///
    /// Returns `None` for unknown keywords (caller should treat the keyword
    /// as a type name).
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "boolean" => Some(Primitive::Boolean),
            "integer" => Some(Primitive::Integer),
            "decimal" => Some(Primitive::Decimal),
            "string" => Some(Primitive::String),
            "bitfield" => Some(Primitive::Bitfield),
            "integer_id" => Some(Primitive::Identifier(IdentifierBase::Integer)),
            "string_id" => Some(Primitive::Identifier(IdentifierBase::String)),
            _ => None,
        }
    }
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keyword = match self {
            Primitive::Boolean => "boolean",
            Primitive::Integer => "integer",
            Primitive::Decimal => "decimal",
            Primitive::String => "string",
            Primitive::Bitfield => "bitfield",
            Primitive::Identifier(IdentifierBase::Integer) => "integer_id",
            Primitive::Identifier(IdentifierBase::String) => "string_id",
        };
        f.write_str(keyword)
    }
}

/// Access token permission required by an endpoint or a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenScope {
    Account,
    Builds,
    Characters,
    Guilds,
    Inventories,
    Progression,
    Pvp,
    Tradingpost,
    Unlocks,
    Wallet,
}

/// Whether a property is present in every payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Optionality {
    /// Always present.
    #[default]
    Required,
    /// May be absent.
    Optional,
    /// Present only when the request is authorized for the scope.
    MandatedBy(TokenScope),
}

impl Optionality {
    pub fn is_required(&self) -> bool {
        matches!(self, Optionality::Required)
    }
}

/// A language the remote API can localize responses into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Language {
    #[serde(rename = "en")]
    English,
    #[serde(rename = "de")]
    German,
    #[serde(rename = "es")]
    Spanish,
    #[serde(rename = "fr")]
    French,
    #[serde(rename = "zh")]
    Chinese,
}

impl Language {
    pub const ALL: &'static [Language] = &[
        Language::English,
        Language::German,
        Language::Spanish,
        Language::French,
        Language::Chinese,
    ];

    /// The `lang` query parameter value.
    pub fn code(&self) -> &'static str {
        match self {
            Language::English => "en",
            Language::German => "de",
            Language::Spanish => "es",
            Language::French => "fr",
            Language::Chinese => "zh",
        }
    }
}

/// How an index query accesses a collection resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryType {
    /// List every identifier.
    Ids,
    /// Fetch one element.
    ById,
    /// Fetch several elements, or every element when `supports_all` is set
    /// and the caller passes [`ALL_IDS_SENTINEL`].
    ByIds {
        #[serde(default)]
        supports_all: bool,
    },
    /// Fetch one page of elements.
    ByPage,
}

impl QueryType {
    /// Suffix distinguishing the variant's generated names.
    pub fn suffix(&self) -> &'static str {
        match self {
            QueryType::Ids => "IDs",
            QueryType::ById => "ByID",
            QueryType::ByIds { .. } => "ByIDs",
            QueryType::ByPage => "ByPage",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitive_parse_valid() {
        assert_eq!(Primitive::parse("integer"), Some(Primitive::Integer));
        assert_eq!(
            Primitive::parse("string_id"),
            Some(Primitive::Identifier(IdentifierBase::String))
        );
        assert_eq!(Primitive::parse("bitfield"), Some(Primitive::Bitfield));
    }

    #[test]
    fn primitive_parse_invalid() {
        assert_eq!(Primitive::parse("Item"), None);
        assert_eq!(Primitive::parse("int"), None);
        assert_eq!(Primitive::parse(""), None);
    }

    #[test]
    fn primitive_display_round_trips_keywords() {
        for keyword in ["boolean", "integer", "decimal", "string", "bitfield", "integer_id"] {
            assert_eq!(Primitive::parse(keyword).unwrap().to_string(), keyword);
        }
    }

    #[test]
    fn identifier_primitives() {
        assert!(Primitive::Integer.is_identifier());
        assert!(Primitive::String.is_identifier());
        assert!(Primitive::Identifier(IdentifierBase::Integer).is_identifier());
        assert!(!Primitive::Decimal.is_identifier());
        assert!(!Primitive::Boolean.is_identifier());
        assert!(!Primitive::Bitfield.is_identifier());
    }

    #[test]
    fn query_type_serde_forms() {
        let types: Vec<QueryType> =
            serde_json::from_str(r#"["ids", "by_id", {"by_ids": {"supports_all": true}}, "by_page"]"#)
                .unwrap();
        assert_eq!(
            types,
            vec![
                QueryType::Ids,
                QueryType::ById,
                QueryType::ByIds { supports_all: true },
                QueryType::ByPage
            ]
        );
    }

    #[test]
    fn optionality_serde_forms() {
        let values: Vec<Optionality> =
            serde_json::from_str(r#"["required", "optional", {"mandated_by": "wallet"}]"#).unwrap();
        assert_eq!(
            values,
            vec![
                Optionality::Required,
                Optionality::Optional,
                Optionality::MandatedBy(TokenScope::Wallet)
            ]
        );
    }

    #[test]
    fn language_codes_match_serde() {
        for language in Language::ALL {
            assert_eq!(
                serde_json::to_value(language).unwrap(),
                serde_json::json!(language.code())
            );
        }
    }
}
