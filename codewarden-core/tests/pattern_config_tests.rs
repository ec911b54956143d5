// codewarden-core/tests/pattern_config_tests.rs
use anyhow::Result;
use std::io::Write;
use tempfile::NamedTempFile;

use codewarden_core::{Airlock, PatternConfig, Redactor, WardenError};

#[test]
fn test_load_from_file_and_merge_over_defaults() -> Result<()> {
    let yaml_content = r#"
patterns:
  - name: order_id
    description: "Internal order references"
    pattern: 'ORD-\d{6}'
    mask: '[ORDER]'
  - name: email
    pattern: '[a-z]+@corp\.example'
    mask: '[CORP_MAIL]'
"#;
    let mut file = NamedTempFile::new()?;
    file.write_all(yaml_content.as_bytes())?;

    let custom = PatternConfig::load_from_file(file.path())?;
    assert_eq!(custom.names(), vec!["order_id", "email"]);

    let airlock = Airlock::from_parts(Some(custom), &[], &[])?;
    assert_eq!(airlock.config().names()[0], "email");
    assert_eq!(*airlock.config().names().last().unwrap(), "order_id");
    assert_eq!(
        airlock.scrub("jane@corp.example placed ORD-123456"),
        "[CORP_MAIL] placed [ORDER]"
    );
    Ok(())
}

#[test]
fn test_invalid_file_is_a_configuration_error() -> Result<()> {
    let mut file = NamedTempFile::new()?;
    file.write_all(b"patterns:\n  - name: broken\n    pattern: '(unclosed'\n")?;
    let err = PatternConfig::load_from_file(file.path()).unwrap_err();
    assert!(matches!(err, WardenError::InvalidPatternConfig(_)));

    let mut file = NamedTempFile::new()?;
    file.write_all(b"patterns: [not, a, rule, list")?;
    let err = PatternConfig::load_from_file(file.path()).unwrap_err();
    assert!(matches!(err, WardenError::Serialization(_)));
    Ok(())
}

#[test]
fn test_missing_file_is_io_error() {
    let err = PatternConfig::load_from_file("/definitely/not/here.yaml").unwrap_err();
    assert!(matches!(err, WardenError::Io(_)));
}

#[test]
fn test_disable_list_removes_rules() -> Result<()> {
    let airlock = Airlock::from_parts(None, &[], &["ip_address".to_string()])?;
    assert_eq!(airlock.scrub("host 10.0.0.1"), "host 10.0.0.1");
    assert_eq!(airlock.scrub("mail a@b.com"), "mail [EMAIL]");
    Ok(())
}

#[test]
fn test_duplicate_custom_names_are_rejected() {
    let custom = PatternConfig {
        patterns: vec![
            codewarden_core::PatternRule::new("dup", "a", "[A]"),
            codewarden_core::PatternRule::new("dup", "b", "[B]"),
        ],
    };
    let err = Airlock::from_parts(Some(custom), &[], &[]).unwrap_err();
    assert!(matches!(err, WardenError::InvalidPatternConfig(_)));
}
