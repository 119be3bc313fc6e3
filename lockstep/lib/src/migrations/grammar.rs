//! Declaration grammar for migration files.
//!
//! A migration file declares exactly one migration class:
//!
//! ```text
//! class <Identifier> < ActiveRecord::Migration[<schema version>]
//! ```
//!
//! The bracketed schema version is optional. Anything before or after the
//! declaration (comments, magic comments, the body) is ignored.

use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

static DECLARATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"class\s+(\w+)\s*<\s*ActiveRecord::Migration(?:\[([0-9.]+)\])?")
        .expect("migration declaration pattern is valid")
});

/// A file whose content does not contain a migration declaration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeclarationError {
    #[error("no `class <Name> < ActiveRecord::Migration` declaration found")]
    Unrecognized,
}

/// The declared entity of a migration file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    /// Logical migration name (the class name)
    pub identifier: String,
    /// Framework schema version from `Migration[x.y]`, if present
    pub schema_version: Option<String>,
}

/// Extract the first migration declaration from file content.
///
/// ## Errors
///
/// Returns `DeclarationError::Unrecognized` when no declaration is present.
///
/// ## Examples
///
/// ```
/// use lockstep_lib::migrations::grammar::parse_declaration;
///
/// let decl = parse_declaration("class CreateLinks < ActiveRecord::Migration[7.0]\nend").unwrap();
/// assert_eq!(decl.identifier, "CreateLinks");
/// assert_eq!(decl.schema_version.as_deref(), Some("7.0"));
/// ```
pub fn parse_declaration(content: &str) -> Result<Declaration, DeclarationError> {
    let captures = DECLARATION
        .captures(content)
        .ok_or(DeclarationError::Unrecognized)?;

    Ok(Declaration {
        identifier: captures[1].to_string(),
        schema_version: captures.get(2).map(|m| m.as_str().to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_declaration() {
        let decl = parse_declaration("class AddColumnsToLinks < ActiveRecord::Migration\nend")
            .unwrap();
        assert_eq!(decl.identifier, "AddColumnsToLinks");
        assert_eq!(decl.schema_version, None);
    }

    #[test]
    fn test_declaration_after_comments() {
        let content = r#"# frozen_string_literal: true
# This file was renamed to avoid a collision.

class CreateLinks < ActiveRecord::Migration[8.0]
  def change
    create_table :links do |t|
      t.string :url
    end
  end
end
"#;
        let decl = parse_declaration(content).unwrap();
        assert_eq!(decl.identifier, "CreateLinks");
        assert_eq!(decl.schema_version.as_deref(), Some("8.0"));
    }

    #[test]
    fn test_loose_whitespace() {
        let decl = parse_declaration("class   Foo<ActiveRecord::Migration[6.1]").unwrap();
        assert_eq!(decl.identifier, "Foo");
    }

    #[test]
    fn test_first_declaration_wins() {
        let content = "class First < ActiveRecord::Migration\nend\nclass Second < ActiveRecord::Migration\nend";
        assert_eq!(parse_declaration(content).unwrap().identifier, "First");
    }

    #[test]
    fn test_unrecognized() {
        assert_eq!(
            parse_declaration("module Helpers\nend"),
            Err(DeclarationError::Unrecognized)
        );
        assert_eq!(
            parse_declaration("class Link < ApplicationRecord\nend"),
            Err(DeclarationError::Unrecognized)
        );
        assert_eq!(parse_declaration(""), Err(DeclarationError::Unrecognized));
    }
}
