//! Discovery isolation and progressive disclosure across a real skills root.

#![allow(clippy::arithmetic_side_effects)]

mod common;

use conduit_core::OperatingMode;
use conduit_runtime::prompt::skill_catalog;
use conduit_skills::{DiscoveryError, SkillRegistry};
use conduit_test::{MockLlmTurn, SkillBundleFixture};

use common::{Harness, no_cancel};

#[test]
fn test_valid_and_malformed_bundles_are_counted_independently() {
    let fixture = SkillBundleFixture::new();
    // Interleave names so malformed bundles sort between valid ones.
    for name in ["alpha", "charlie", "echo", "golf"] {
        fixture.bundle(name, &format!("The {name} skill"), "Do the thing.\n");
    }
    fixture.malformed("bravo");
    fixture.missing_description("delta");
    fixture.bundle_raw("foxtrot", "name: [unclosed\n", "body\n", None);

    let (registry, problems) = SkillRegistry::discover(fixture.root()).unwrap();

    assert_eq!(registry.len(), 4);
    assert_eq!(problems.len(), 3);
    assert!(
        problems
            .iter()
            .all(|p| matches!(p, DiscoveryError::MalformedManifest { .. }))
    );
    let mut names: Vec<String> = registry.list().into_iter().map(|s| s.name).collect();
    names.sort();
    assert_eq!(names, vec!["alpha", "charlie", "echo", "golf"]);
}

#[test]
fn test_duplicate_name_keeps_first_and_reports_second() {
    let fixture = SkillBundleFixture::new();
    fixture.bundle_raw("a-x", "name: x\ndescription: first\n", "one\n", None);
    fixture.bundle_raw("b-x", "name: x\ndescription: second\n", "two\n", None);

    let (registry, problems) = SkillRegistry::discover(fixture.root()).unwrap();

    assert_eq!(registry.len(), 1);
    assert_eq!(registry.get("x").unwrap().description, "first");
    assert_eq!(problems.len(), 1);
    let DiscoveryError::DuplicateCapability { name, path, .. } = &problems[0] else {
        panic!("expected a duplicate error, got {:?}", problems[0]);
    };
    assert_eq!(name, "x");
    assert!(path.starts_with(fixture.root().join("b-x")));
}

#[test]
fn test_catalog_size_independent_of_instruction_length() {
    let small = SkillBundleFixture::new();
    let large = SkillBundleFixture::new();
    for i in 0..8 {
        let name = format!("skill-{i}");
        small.bundle_with_long_instructions(&name, "Handles one task", 64);
        large.bundle_with_long_instructions(&name, "Handles one task", 200_000);
    }

    let (small_reg, _) = SkillRegistry::discover(small.root()).unwrap();
    let (large_reg, _) = SkillRegistry::discover(large.root()).unwrap();

    let small_catalog = skill_catalog(&small_reg.snapshot(), "anything");
    let large_catalog = skill_catalog(&large_reg.snapshot(), "anything");
    assert_eq!(small_catalog.len(), large_catalog.len());
    assert!(!large_catalog.contains("Step 0"));
}

#[test]
fn test_catalog_grows_linearly_with_skill_count() {
    let fixture = SkillBundleFixture::new();
    let mut sizes = Vec::new();
    for i in 0..4 {
        fixture.bundle_with_long_instructions(&format!("s{i}"), "Same shape", 50_000);
        let (registry, _) = SkillRegistry::discover(fixture.root()).unwrap();
        sizes.push(skill_catalog(&registry.snapshot(), "q").len());
    }
    let steps: Vec<usize> = sizes.windows(2).map(|w| w[1] - w[0]).collect();
    assert!(steps.iter().all(|s| *s == steps[0]), "sizes: {sizes:?}");
}

#[tokio::test]
async fn test_agent_prompt_holds_no_instructions_before_activation() {
    let fixture = SkillBundleFixture::new();
    fixture.google_sheets();
    fixture.bundle_with_long_instructions("reports", "Build weekly reports", 100_000);
    let harness = Harness::new(fixture, vec![MockLlmTurn::text("Nothing to do.")]);

    harness
        .orchestrator
        .answer("hello", OperatingMode::Agent, &[], &no_cancel())
        .await
        .unwrap();

    let system = &harness.llm().recorded_systems()[0];
    assert!(system.contains("google-sheets"));
    assert!(system.contains("reports"));
    assert!(!system.contains("A1 notation"));
    assert!(!system.contains("Step 0"));
    assert_eq!(harness.orchestrator.loader().materializations(), 0);
}
