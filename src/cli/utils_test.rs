use crate::cli::utils::*;

#[test]
fn test_truncate_with_ellipsis_short_string() {
    assert_eq!(truncate_with_ellipsis("hello", 10), "hello");
    assert_eq!(truncate_with_ellipsis("hello", 5), "hello");
}

#[test]
fn test_truncate_with_ellipsis_long_string() {
    let result = truncate_with_ellipsis("Which service stores objects durably?", 10);
    assert_eq!(result, "Which s...");
}

#[test]
fn test_truncate_with_ellipsis_unicode() {
    assert_eq!(truncate_with_ellipsis("hello 世界", 8), "hello 世界");
    assert_eq!(truncate_with_ellipsis("hello 世界", 7), "hell...");
}

#[test]
fn test_parse_list_none() {
    assert!(parse_list(None).is_empty());
}

#[test]
fn test_parse_list_trims_and_skips_empty() {
    let result = parse_list(Some("Design Secure Architectures, ,Cost "));
    assert_eq!(
        result,
        vec!["Design Secure Architectures".to_string(), "Cost".to_string()]
    );
}

#[test]
fn test_answer_letters() {
    assert_eq!(answer_letters(&[]), "-");
    assert_eq!(answer_letters(&[1]), "B");
    assert_eq!(answer_letters(&[0, 2]), "A, C");
    assert_eq!(answer_letters(&[30]), "30");
}

#[test]
fn test_apply_table_style() {
    use tabled::builder::Builder;

    let mut builder = Builder::default();
    builder.push_record(["Domain", "Questions"]);
    builder.push_record(["Security", "12"]);

    let mut table = builder.build();
    apply_table_style(&mut table);

    let output = table.to_string();
    // Rounded style uses ╭─╮│╰─╯ characters
    assert!(output.contains("╭"), "Table should use rounded style");
}
