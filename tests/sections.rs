mod common;

use common::{Block, TemplateBuilder, finding, generate, report};
use docxide_report::{Error, GenerateConfig, RiskLevel, Warning};

fn section_template(level_heading: &str) -> TemplateBuilder {
    TemplateBuilder::new()
        .para(level_heading)
        .para("{{VULN_ID}}. {{TITLE}}")
        .table(&[
            &["Description", "{{DESCRIPTION}}"],
            &["Risk", "{{RISK}}"],
            &["CVSS", "{{CVSS}}"],
        ])
}

fn p(text: &str) -> Block {
    Block::Paragraph(text.to_string())
}

#[test]
fn replicates_one_pair_per_finding_in_order() {
    let template = section_template("High Risk Findings").para("Appendix").build();
    let findings = vec![
        finding("H1", "SQL injection", RiskLevel::High),
        finding("H2", "Stored XSS", RiskLevel::High),
        finding("H3", "IDOR", RiskLevel::High),
    ];
    let out = generate(&template, &report(findings), &GenerateConfig::default());

    let blocks = out.blocks();
    let table_for = |desc: &str| {
        Block::Table(vec![
            vec!["Description".into(), format!("Description of {desc}")],
            vec!["Risk".into(), "High".into()],
            vec!["CVSS".into(), "7.5".into()],
        ])
    };
    assert_eq!(
        blocks,
        vec![
            p("High Risk Findings"),
            p("H1. SQL injection"),
            table_for("SQL injection"),
            p(""),
            p("H2. Stored XSS"),
            table_for("Stored XSS"),
            p(""),
            p("H3. IDOR"),
            table_for("IDOR"),
            p("Appendix"),
        ]
    );
    assert_eq!(out.outcome.sections.len(), 1);
    assert_eq!(out.outcome.sections[0].instances, 3);
    assert!(out.outcome.warnings.is_empty(), "{:?}", out.outcome.warnings);
}

#[test]
fn section_without_findings_is_removed() {
    let template = TemplateBuilder::new()
        .para("Medium Risk Findings")
        .para("{{VULN_ID}}. {{TITLE}}")
        .table(&[&["Description", "{{DESCRIPTION}}"]])
        .para("Low Risk Findings")
        .para("{{VULN_ID}}. {{TITLE}}")
        .table(&[&["Description", "{{DESCRIPTION}}"]])
        .build();
    let findings = vec![finding("L1", "Verbose banner", RiskLevel::Low)];
    let out = generate(&template, &report(findings), &GenerateConfig::default());

    assert_eq!(
        out.blocks(),
        vec![
            p("Medium Risk Findings"),
            p("Low Risk Findings"),
            p("L1. Verbose banner"),
            Block::Table(vec![vec![
                "Description".into(),
                "Description of Verbose banner".into()
            ]]),
        ]
    );
    let instances: Vec<(RiskLevel, usize)> = out
        .outcome
        .sections
        .iter()
        .map(|s| (s.risk_level, s.instances))
        .collect();
    assert_eq!(instances, vec![(RiskLevel::Medium, 0), (RiskLevel::Low, 1)]);
}

#[test]
fn sections_are_classified_by_preceding_text() {
    let template = section_template("Critical Risk Findings")
        .raw(&common::para(""))
        .para("High Risk Findings")
        .para("Issues in this section should be fixed soon.")
        .para("{{VULN_ID}}.{{TITLE}}")
        .table(&[&["Risk", "{{RISK_LEVEL}}"]])
        .build();
    let findings = vec![
        finding("H1", "Open redirect", RiskLevel::High),
        finding("C1", "Remote code execution", RiskLevel::Critical),
    ];
    let out = generate(&template, &report(findings), &GenerateConfig::default());

    let tables = out.tables();
    assert_eq!(tables.len(), 2);
    assert_eq!(tables[0][1][1], "Critical");
    assert_eq!(tables[1][0][1], "High");
    let blocks = out.blocks();
    assert!(blocks.contains(&p("C1. Remote code execution")));
    assert!(blocks.contains(&p("H1. Open redirect")));
}

#[test]
fn unclassified_section_falls_back_to_high_with_warning() {
    let template = TemplateBuilder::new()
        .para("Detailed Findings")
        .table(&[&["Title", "{{TITLE}}"]])
        .build();
    let findings = vec![
        finding("H1", "Weak session handling", RiskLevel::High),
        finding("M1", "Missing headers", RiskLevel::Medium),
    ];
    let out = generate(&template, &report(findings), &GenerateConfig::default());

    let tables = out.tables();
    assert_eq!(tables.len(), 1);
    assert_eq!(tables[0][0][1], "Weak session handling");
    assert!(out.outcome.warnings.iter().any(|w| matches!(
        w,
        Warning::ClassificationFallback {
            assumed: RiskLevel::High,
            ..
        }
    )));
    assert!(!out.outcome.sections[0].classified);
}

#[test]
fn heading_is_optional() {
    let template = TemplateBuilder::new()
        .para("Low Risk Findings")
        .table(&[&["ID", "{{VULN_ID}}"]])
        .build();
    let findings = vec![
        finding("L1", "Autocomplete enabled", RiskLevel::Low),
        finding("L2", "Version disclosure", RiskLevel::Low),
    ];
    let out = generate(&template, &report(findings), &GenerateConfig::default());
    assert_eq!(
        out.blocks(),
        vec![
            p("Low Risk Findings"),
            Block::Table(vec![vec!["ID".into(), "L1".into()]]),
            p(""),
            Block::Table(vec![vec!["ID".into(), "L2".into()]]),
        ]
    );
}

#[test]
fn leftover_tokens_are_reported() {
    let template = section_template("High Risk Findings")
        .para("Prepared by {{AUTHOR_NAME}}")
        .para("By {{Author}} / {{CVSS3}} / {{ CLIENT }}")
        .build();
    let out = generate(
        &template,
        &report(vec![finding("H1", "CSRF", RiskLevel::High)]),
        &GenerateConfig::default(),
    );
    let mut leftovers: Vec<&str> = out.outcome.unresolved_placeholders().collect();
    leftovers.sort();
    assert_eq!(
        leftovers,
        vec!["{{ CLIENT }}", "{{AUTHOR_NAME}}", "{{Author}}", "{{CVSS3}}"]
    );
    assert!(out.document().contains("{{AUTHOR_NAME}}"));
    assert!(out.document().contains("{{CVSS3}}"));
}

#[test]
fn inspect_lists_irregular_tokens() {
    let template = section_template("High Risk Findings")
        .para("By {{Author}} for {{ CLIENT }}")
        .build();
    let outline =
        docxide_report::inspect_template(&template, &GenerateConfig::default()).unwrap();
    assert!(outline.placeholders.contains(&"{{Author}}".to_string()));
    assert!(outline.placeholders.contains(&"{{ CLIENT }}".to_string()));
}

#[test]
fn empty_body_is_fatal() {
    let template = TemplateBuilder::new().build();
    let err = docxide_report::generate_report_bytes(
        &template,
        &report(vec![]),
        &GenerateConfig::default(),
    )
    .unwrap_err();
    assert!(matches!(err, Error::InvalidTemplate(_)), "{err}");
}

#[test]
fn non_zip_input_is_rejected() {
    let err = docxide_report::generate_report_bytes(
        b"plain text, not a package",
        &report(vec![]),
        &GenerateConfig::default(),
    )
    .unwrap_err();
    assert!(matches!(err, Error::InvalidDocx(_)), "{err}");
}

#[test]
fn output_is_not_written_on_failure() {
    let dir = tempfile::tempdir().unwrap();
    let template_path = dir.path().join("template.docx");
    let output_path = dir.path().join("out.docx");
    std::fs::write(&template_path, TemplateBuilder::new().build()).unwrap();

    let result = docxide_report::generate_report(
        &template_path,
        &report(vec![]),
        &output_path,
        &GenerateConfig::default(),
    );
    assert!(result.is_err());
    assert!(!output_path.exists());
}

#[test]
fn oversized_template_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let template_path = dir.path().join("template.docx");
    std::fs::write(&template_path, section_template("High Risk Findings").build()).unwrap();
    let config = GenerateConfig {
        max_template_bytes: 16,
        ..GenerateConfig::default()
    };
    let err = docxide_report::generate_report(
        &template_path,
        &report(vec![]),
        &dir.path().join("out.docx"),
        &config,
    )
    .unwrap_err();
    assert!(matches!(err, Error::TemplateTooLarge { limit: 16, .. }), "{err}");
}

#[test]
fn size_limit_applies_to_in_memory_templates() {
    let template = section_template("High Risk Findings").build();
    let config = GenerateConfig {
        max_template_bytes: 16,
        ..GenerateConfig::default()
    };

    let err = docxide_report::generate_report_bytes(&template, &report(vec![]), &config)
        .unwrap_err();
    let expected = template.len() as u64;
    assert!(
        matches!(err, Error::TemplateTooLarge { limit: 16, size } if size == expected),
        "{err}"
    );

    let err = docxide_report::inspect_template(&template, &config).unwrap_err();
    assert!(matches!(err, Error::TemplateTooLarge { limit: 16, .. }), "{err}");
}
