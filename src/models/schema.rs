//! Schema-related data models.
//!
//! This module defines types for database schema introspection.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Role a column plays in the table's key constraints.
///
/// When a column takes part in several constraints the strongest role wins:
/// primary over foreign over unique.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum KeyRole {
    Unique,
    Foreign,
    Primary,
}

impl KeyRole {
    /// Parse a role label produced by the catalog queries.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "primary" | "primary key" | "pk" => Some(Self::Primary),
            "foreign" | "foreign key" | "fk" => Some(Self::Foreign),
            "unique" => Some(Self::Unique),
            _ => None,
        }
    }

    /// Keep the stronger of two optional roles.
    pub fn strongest(a: Option<Self>, b: Option<Self>) -> Option<Self> {
        a.max(b)
    }
}

impl std::fmt::Display for KeyRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Primary => write!(f, "primary"),
            Self::Foreign => write!(f, "foreign"),
            Self::Unique => write!(f, "unique"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ColumnDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
    pub nullable: bool,
    /// Default expression as written in the catalog.
    pub default: Option<String>,
    pub key_role: Option<KeyRole>,
}

impl ColumnDescriptor {
    /// Create a new column descriptor.
    pub fn new(name: impl Into<String>, data_type: impl Into<String>, nullable: bool) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            nullable,
            default: None,
            key_role: None,
        }
    }

    pub fn with_default(mut self, default: Option<String>) -> Self {
        self.default = default;
        self
    }

    pub fn with_key_role(mut self, role: Option<KeyRole>) -> Self {
        self.key_role = role;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TableDescriptor {
    pub schema: String,
    pub table: String,
    /// Columns in ordinal order.
    pub columns: Vec<ColumnDescriptor>,
}

impl TableDescriptor {
    pub fn new(schema: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            table: table.into(),
            columns: Vec::new(),
        }
    }

    /// Add a column definition.
    pub fn with_column(mut self, column: ColumnDescriptor) -> Self {
        self.columns.push(column);
        self
    }

    /// Get the fully qualified table name.
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.schema, self.table)
    }

    /// Names of the primary key columns, in ordinal order.
    pub fn primary_key(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| c.key_role == Some(KeyRole::Primary))
            .map(|c| c.name.as_str())
            .collect()
    }
}

/// One foreign-key column pair. Composite keys produce one descriptor per
/// column, in key order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct RelationshipDescriptor {
    pub constraint_name: String,
    pub source_table: String,
    pub source_column: String,
    pub target_table: String,
    pub target_column: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_role_parse() {
        assert_eq!(KeyRole::parse("PRIMARY KEY"), Some(KeyRole::Primary));
        assert_eq!(KeyRole::parse("foreign"), Some(KeyRole::Foreign));
        assert_eq!(KeyRole::parse("unique"), Some(KeyRole::Unique));
        assert_eq!(KeyRole::parse("check"), None);
    }

    #[test]
    fn test_key_role_strongest() {
        assert_eq!(
            KeyRole::strongest(Some(KeyRole::Unique), Some(KeyRole::Primary)),
            Some(KeyRole::Primary)
        );
        assert_eq!(
            KeyRole::strongest(None, Some(KeyRole::Foreign)),
            Some(KeyRole::Foreign)
        );
        assert_eq!(KeyRole::strongest(None, None), None);
    }

    #[test]
    fn test_table_descriptor_primary_key() {
        let table = TableDescriptor::new("public", "orders")
            .with_column(
                ColumnDescriptor::new("id", "integer", false)
                    .with_key_role(Some(KeyRole::Primary)),
            )
            .with_column(
                ColumnDescriptor::new("customer_id", "integer", true)
                    .with_key_role(Some(KeyRole::Foreign)),
            );
        assert_eq!(table.primary_key(), vec!["id"]);
        assert_eq!(table.qualified_name(), "public.orders");
    }

    #[test]
    fn test_column_descriptor_serialization() {
        let col = ColumnDescriptor::new("id", "integer", false)
            .with_default(Some("nextval('orders_id_seq'::regclass)".into()))
            .with_key_role(Some(KeyRole::Primary));
        let json = serde_json::to_value(&col).unwrap();
        assert_eq!(json["type"], "integer");
        assert_eq!(json["key_role"], "primary");
        assert_eq!(json["nullable"], false);
    }
}
