//! Property-based checks of the cross-provider fusion invariants
//! (SPEC_FULL.md §8: I1 DOI normalization idempotence, I3 citation-count
//! monotonicity, I4 fusion associativity).

use proptest::prelude::*;
use scholarfed::{merge, Author, Doi, ProviderTag, ScholarlyDocument};

fn doc(provider: ProviderTag, id: &str, title: &str, doi: Option<&str>, citation_count: u64) -> ScholarlyDocument {
    let mut d = ScholarlyDocument::new(provider, id, title);
    d.doi = doi.and_then(Doi::parse);
    d.authors = vec![Author::new("Jane Doe")];
    d.citation_count = citation_count;
    d
}

mod doi_props {
    use super::*;

    proptest! {
        #[test]
        fn parse_of_canonical_url_is_idempotent(registrant in 1000u32..9999, suffix in "[a-z0-9]{4,12}") {
            let raw = format!("10.{registrant}/{suffix}");
            let first = Doi::parse(&raw).expect("well-formed DOI should parse");
            let reparsed = Doi::parse(&first.to_url()).expect("canonical URL should re-parse");
            prop_assert_eq!(first, reparsed);
        }

        #[test]
        fn prefixed_and_bare_forms_normalize_identically(registrant in 1000u32..9999, suffix in "[a-z0-9]{4,12}") {
            let bare = format!("10.{registrant}/{suffix}");
            let prefixed = format!("https://doi.org/{bare}");
            prop_assert_eq!(Doi::parse(&bare), Doi::parse(&prefixed));
        }
    }
}

mod fusion_props {
    use super::*;

    proptest! {
        #[test]
        fn citation_count_never_decreases_under_merge(a_count in 0u64..100_000, b_count in 0u64..100_000) {
            let a = doc(ProviderTag::OpenAlex, "1", "A Study", Some("10.1038/x"), a_count);
            let b = doc(ProviderTag::Crossref, "2", "A Study", Some("10.1038/x"), b_count);
            let merged = merge(&a, &b);
            prop_assert!(merged.citation_count >= a_count.max(b_count));
        }

        #[test]
        fn fusion_is_associative_over_citation_count(
            a_count in 0u64..1000, b_count in 0u64..1000, c_count in 0u64..1000
        ) {
            let a = doc(ProviderTag::OpenAlex, "1", "A Study", Some("10.1038/x"), a_count);
            let b = doc(ProviderTag::SemanticScholar, "2", "A Study", Some("10.1038/x"), b_count);
            let c = doc(ProviderTag::Crossref, "3", "A Study", Some("10.1038/x"), c_count);

            let left = merge(&merge(&a, &b), &c);
            let right = merge(&a, &merge(&b, &c));
            prop_assert_eq!(left.citation_count, right.citation_count);
            prop_assert_eq!(left.title, right.title);
        }
    }

    #[test]
    fn merge_carries_both_sidecars() {
        let a = doc(ProviderTag::OpenAlex, "1", "A Study", Some("10.1038/x"), 10)
            .with_sidecar(scholarfed::SidecarPayload::Json(serde_json::json!({"from": "openalex"})));
        let b = doc(ProviderTag::Crossref, "2", "A Study", Some("10.1038/x"), 5)
            .with_sidecar(scholarfed::SidecarPayload::Json(serde_json::json!({"from": "crossref"})));
        let merged = merge(&a, &b);
        assert!(merged.sidecar.contains_key(&ProviderTag::OpenAlex));
        assert!(merged.sidecar.contains_key(&ProviderTag::Crossref));
    }
}
