#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::indexing_slicing
)]
//! Integration tests for the `schema` command.
//!
//! The options tables are user-facing documentation, so the rendering of one
//! kind is pinned with a snapshot and the full listing is checked for every
//! kind.

use winstate_cli::cli::SchemaOpts;
use winstate_cli::commands::schema;
use winstate_cli::model::ObjectKind;

// ---------------------------------------------------------------------------
// Snapshot: package options table
// ---------------------------------------------------------------------------

/// Regression guard for the text table layout.
#[test]
fn package_schema_table() {
    let mut out = Vec::new();
    schema::run(
        &SchemaOpts {
            kind: Some("package".to_string()),
        },
        false,
        &mut out,
    )
    .unwrap();
    let text = String::from_utf8(out).unwrap();
    insta::assert_snapshot!(text.trim_end(), @r"
    package (schema v2): Package installed with winget
      identity: id (winget package identifier, case-insensitive)
      options:
        version  text  pinned version; a change reinstalls it, a reset upgrades to the latest
        source   name  winget source to install from (default: winget)
      migrations:
        v2: one entry per package; name accepted as an alias of id
    ");
}

// ---------------------------------------------------------------------------
// Full listing
// ---------------------------------------------------------------------------

/// Every kind appears once, in manifest order.
#[test]
fn all_kinds_listed_in_order() {
    let mut out = Vec::new();
    schema::run(&SchemaOpts { kind: None }, false, &mut out).unwrap();
    let text = String::from_utf8(out).unwrap();
    let headers: Vec<&str> = text
        .lines()
        .filter(|l| l.contains("(schema v"))
        .map(|l| l.split_whitespace().next().unwrap())
        .collect();
    let expected: Vec<&str> = ObjectKind::ALL.iter().map(|k| k.as_str()).collect();
    assert_eq!(headers, expected);
}

/// Free-form LDAP attributes are documented for OUs.
#[test]
fn ou_schema_mentions_free_form_attributes() {
    let text = schema::render(winstate_cli::schema::for_kind(ObjectKind::Ou));
    assert!(text.contains("free-form: attributes.<name>"), "{text}");
}

/// Unknown kinds are an error, not an empty listing.
#[test]
fn unknown_kind_fails() {
    let mut out = Vec::new();
    let err = schema::run(
        &SchemaOpts {
            kind: Some("dns_record".to_string()),
        },
        false,
        &mut out,
    )
    .unwrap_err();
    assert!(err.to_string().contains("dns_record"));
    assert!(out.is_empty());
}
