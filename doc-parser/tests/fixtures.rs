use std::collections::HashSet;

use pretty_assertions::assert_eq;
use pulldown_cmark::{html, Options, Parser};

use doc_parser::parse_page;

const CASES: &[(&str, &str, &str)] = &[
    (
        "quickstart",
        include_str!("fixtures/html/quickstart.html"),
        include_str!("fixtures/expected/quickstart.md"),
    ),
    (
        "create-user",
        include_str!("fixtures/html/create-user.html"),
        include_str!("fixtures/expected/create-user.md"),
    ),
    (
        "webhooks",
        include_str!("fixtures/html/webhooks.html"),
        include_str!("fixtures/expected/webhooks.md"),
    ),
    (
        "virtualenv",
        include_str!("fixtures/html/virtualenv.html"),
        include_str!("fixtures/expected/virtualenv.md"),
    ),
];

#[test]
fn fixtures_match_expected_output() {
    for (name, html, expected) in CASES {
        let page = parse_page(html).unwrap_or_else(|err| panic!("{name}: {err}"));
        assert_eq!(
            page.markdown,
            expected.trim_end_matches('\n'),
            "fixture mismatch: {name}"
        );
    }
}

#[test]
fn fixture_metadata() {
    let quickstart = parse_page(CASES[0].1).expect("quickstart");
    assert_eq!(quickstart.title, "Quickstart");
    assert_eq!(
        quickstart.description.as_deref(),
        Some("Get Acme running in five minutes.")
    );
    assert_eq!(quickstart.code_examples.len(), 1);
    assert_eq!(quickstart.code_examples[0].language, "bash");
    assert_eq!(
        quickstart.code_examples[0].code,
        "npm install -g acme-cli\n"
    );
    assert_eq!(
        quickstart.code_examples[0].description.as_deref(),
        Some("Install the package globally:")
    );
    assert!(quickstart.api_endpoint.is_none());

    let create_user = parse_page(CASES[1].1).expect("create-user");
    let endpoint = create_user.api_endpoint.expect("endpoint");
    assert_eq!(endpoint.method, "POST");
    assert_eq!(endpoint.path, "/v1/users");
    assert_eq!(endpoint.parameters.len(), 2);
    assert!(endpoint.parameters[0].required);
    assert!(!endpoint.parameters[1].required);
    assert!(endpoint
        .response_example
        .as_deref()
        .is_some_and(|body| body.contains("usr_123")));

    let webhooks = parse_page(CASES[2].1).expect("webhooks");
    assert_eq!(webhooks.code_examples[0].language, "javascript");
}

#[test]
fn nested_code_blocks_keep_their_bodies() {
    let page = parse_page(CASES[3].1).expect("virtualenv");
    let python = "import venv\n\nvenv.create(\".venv\",  with_pip=True)\n";
    let bash = "if  [ -n \"$COMSPEC\" ]; then\n    .venv/Scripts/activate\nfi\n";

    let codes: Vec<&str> = page
        .code_examples
        .iter()
        .map(|example| example.code.as_str())
        .collect();
    assert_eq!(codes, [python, bash]);
    assert_eq!(
        page.code_examples[0].description.as_deref(),
        Some("Create the environment:")
    );

    let in_list: String = python
        .lines()
        .map(|line| {
            if line.is_empty() {
                "\n".to_string()
            } else {
                format!("   {line}\n")
            }
        })
        .collect();
    assert!(page.markdown.contains(&format!("   ```python\n{in_list}   ```")));

    let quoted: String = bash.lines().map(|line| format!("> {line}\n")).collect();
    assert!(page.markdown.contains(&format!("> ```bash\n{quoted}> ```")));
}

fn words(markdown: &str) -> HashSet<&str> {
    markdown
        .split(|ch: char| !ch.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .collect()
}

/// Rendering the markdown back to HTML and extracting again keeps every word.
#[test]
fn markdown_survives_a_second_pass() {
    for (name, html, _) in CASES {
        let first = parse_page(html).expect("first pass").markdown;

        let mut rendered = String::new();
        html::push_html(
            &mut rendered,
            Parser::new_ext(&first, Options::ENABLE_TABLES),
        );
        let second = parse_page(&rendered).expect("second pass").markdown;

        let kept = words(&second);
        let lost: Vec<&str> = words(&first)
            .into_iter()
            .filter(|word| !kept.contains(word))
            .collect();
        assert!(
            lost.is_empty(),
            "{name}: lost {lost:?} on second pass:\n{second}"
        );
    }
}
