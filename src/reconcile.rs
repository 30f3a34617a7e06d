//! Reconciliation of local test entities against the remote index.
//!
//! For every local test the reconciler decides one of create, update or
//! no-op and computes the outbound field set. Matching is an explicit
//! ordered list of strategies, evaluated in sequence until one succeeds;
//! the tie-break order is a first-class, testable artifact rather than
//! nested conditionals:
//!
//! 1. [`MatchStrategy::AnnotatedId`] — a previously assigned remote id that
//!    still resolves is authoritative, whatever the titles say. User-visible
//!    titles change over time; the id binding does not.
//! 2. [`MatchStrategy::IdentifierField`] — the remote custom identifier
//!    field equals the local identifier.
//! 3. [`MatchStrategy::Title`] — display-title equality. Exists to avoid
//!    duplicate creation on the very first reverse-sync pass, before the
//!    identifier field is populated.
//!
//! Diff semantics are field-by-field replacement: local source is
//! authoritative for every declared field (Code-First). The single
//! exception is the remote `last_result` operational field, which is read
//! from the matched record and re-sent unchanged because local source
//! carries no execution-result information.

use serde::{Deserialize, Serialize};

use crate::{
    model::{EntitySet, TestEntity},
    remote::{CaseFields, RemoteCase, RemoteIndex},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchStrategy {
    AnnotatedId,
    IdentifierField,
    Title,
}

/// Evaluation order. Earlier strategies dominate later ones.
pub const MATCH_ORDER: [MatchStrategy; 3] = [
    MatchStrategy::AnnotatedId,
    MatchStrategy::IdentifierField,
    MatchStrategy::Title,
];

impl MatchStrategy {
    /// A typed optional result; `None` hands evaluation to the next
    /// strategy in [`MATCH_ORDER`].
    pub fn evaluate<'a>(
        &self,
        test: &TestEntity,
        index: &'a RemoteIndex,
    ) -> Option<&'a RemoteCase> {
        match self {
            MatchStrategy::AnnotatedId => test
                .remote_id
                .and_then(|id| index.case_by_remote_id(id)),
            MatchStrategy::IdentifierField => index.case_by_ref(test.id.as_str()),
            MatchStrategy::Title => index.case_by_title(&test.full_title()),
        }
    }
}

/// The decided action for one local test.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncAction {
    Create { fields: CaseFields },
    Update { remote_id: u64, fields: CaseFields },
    Noop { remote_id: u64 },
}

/// One local test joined with its decided action.
#[derive(Debug, Clone)]
pub struct PlannedCase {
    pub test: TestEntity,
    pub action: SyncAction,
    /// Which strategy matched, when one did.
    pub matched_by: Option<MatchStrategy>,
}

/// Reconciler output for one run.
#[derive(Debug, Clone, Default)]
pub struct ReconcilePlan {
    pub planned: Vec<PlannedCase>,
    pub warnings: Vec<String>,
}

impl ReconcilePlan {
    pub fn creates(&self) -> impl Iterator<Item = &PlannedCase> {
        self.planned
            .iter()
            .filter(|p| matches!(p.action, SyncAction::Create { .. }))
    }

    pub fn updates(&self) -> impl Iterator<Item = &PlannedCase> {
        self.planned
            .iter()
            .filter(|p| matches!(p.action, SyncAction::Update { .. }))
    }

    pub fn noops(&self) -> impl Iterator<Item = &PlannedCase> {
        self.planned
            .iter()
            .filter(|p| matches!(p.action, SyncAction::Noop { .. }))
    }
}

/// The outbound replacement field set for `test`, carrying `last_result`
/// forward from the matched remote record when present.
fn outbound_fields(test: &TestEntity, matched: Option<&RemoteCase>) -> CaseFields {
    CaseFields {
        case_ref: test.id.to_string(),
        title: test.full_title(),
        description: test.description.clone(),
        preconditions: test.preconditions.clone(),
        postconditions: test.postconditions.clone(),
        severity: test.severity,
        behavior: test.behavior,
        flaky: test.flaky,
        steps: test.steps.clone(),
        last_result: matched.and_then(|m| m.last_result.clone()),
    }
}

/// The stored field set of a remote record, shaped for comparison with
/// [`outbound_fields`]. Equality means an update would be a no-op.
fn stored_fields(case: &RemoteCase) -> CaseFields {
    CaseFields {
        case_ref: case.case_ref.clone().unwrap_or_default(),
        title: case.title.clone(),
        description: case.description.clone(),
        preconditions: case.preconditions.clone(),
        postconditions: case.postconditions.clone(),
        severity: case.severity,
        behavior: case.behavior,
        flaky: case.flaky,
        steps: case.steps.clone(),
        last_result: case.last_result.clone(),
    }
}

/// Decide an action for every test in `set` against `index`.
pub fn reconcile(set: &EntitySet, index: &RemoteIndex) -> ReconcilePlan {
    let mut plan = ReconcilePlan::default();

    for test in &set.tests {
        // A stale annotation that no longer resolves is surfaced, not
        // silently overwritten: the record may have been deleted remotely.
        if let Some(stale) = test.remote_id {
            if index.case_by_remote_id(stale).is_none() {
                plan.warnings.push(format!(
                    "'{}': annotated remote id {stale} does not resolve remotely \
                     (possible external deletion); falling back to identifier/title matching",
                    test.id
                ));
            }
        }

        let matched = MATCH_ORDER
            .iter()
            .find_map(|strategy| strategy.evaluate(test, index).map(|case| (*strategy, case)));

        let planned = match matched {
            Some((strategy, case)) => {
                let fields = outbound_fields(test, Some(case));
                let action = if fields == stored_fields(case) {
                    SyncAction::Noop { remote_id: case.id }
                } else {
                    SyncAction::Update {
                        remote_id: case.id,
                        fields,
                    }
                };
                tracing::debug!("'{}' matched via {strategy:?} -> {action:?}", test.id);
                PlannedCase {
                    test: test.clone(),
                    action,
                    matched_by: Some(strategy),
                }
            }
            None => PlannedCase {
                test: test.clone(),
                action: SyncAction::Create {
                    fields: outbound_fields(test, None),
                },
                matched_by: None,
            },
        };
        plan.planned.push(planned);
    }

    tracing::info!(
        "reconcile: {} create, {} update, {} unchanged, {} warnings",
        plan.creates().count(),
        plan.updates().count(),
        plan.noops().count(),
        plan.warnings.len()
    );
    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        extract::parse_source,
        model::EntitySet,
        remote::{RemoteCase, RemoteSuite},
    };
    use std::path::PathBuf;

    fn local(text: &str) -> EntitySet {
        EntitySet::build(vec![(PathBuf::from("t.cb"), parse_source(text, "t.cb"))])
    }

    fn index_of(cases: Vec<RemoteCase>) -> RemoteIndex {
        RemoteIndex::seed(cases, Vec::<RemoteSuite>::new())
    }

    #[test]
    fn test_annotated_id_dominates_title() {
        let set = local(
            r#"suite("S") {
                case("TC-API-SYNC-001", "renamed since sync") { remote_id(42); }
            }"#,
        );
        let index = index_of(vec![RemoteCase {
            id: 42,
            case_ref: None,
            title: "entirely different title".to_string(),
            ..Default::default()
        }]);
        let plan = reconcile(&set, &index);
        assert_eq!(plan.planned.len(), 1);
        assert_eq!(plan.planned[0].matched_by, Some(MatchStrategy::AnnotatedId));
        assert!(
            matches!(plan.planned[0].action, SyncAction::Update { remote_id: 42, .. }),
            "id binding must dominate title matching"
        );
        assert!(plan.warnings.is_empty());
    }

    #[test]
    fn test_title_match_captures_remote_id() {
        let set = local(r#"suite("S") { case("TC-API-SYNC-001", "login works") {} }"#);
        let index = index_of(vec![RemoteCase {
            id: 7,
            case_ref: None,
            title: "TC-API-SYNC-001: login works".to_string(),
            ..Default::default()
        }]);
        let plan = reconcile(&set, &index);
        assert_eq!(plan.planned[0].matched_by, Some(MatchStrategy::Title));
        assert!(matches!(
            plan.planned[0].action,
            SyncAction::Update { remote_id: 7, .. }
        ));
    }

    #[test]
    fn test_identifier_field_precedes_title() {
        let set = local(r#"suite("S") { case("TC-API-SYNC-001", "login works") {} }"#);
        let index = index_of(vec![
            RemoteCase {
                id: 1,
                case_ref: None,
                title: "TC-API-SYNC-001: login works".to_string(),
                ..Default::default()
            },
            RemoteCase {
                id: 2,
                case_ref: Some("TC-API-SYNC-001".to_string()),
                title: "stale title".to_string(),
                ..Default::default()
            },
        ]);
        let plan = reconcile(&set, &index);
        assert_eq!(
            plan.planned[0].matched_by,
            Some(MatchStrategy::IdentifierField)
        );
        assert!(matches!(
            plan.planned[0].action,
            SyncAction::Update { remote_id: 2, .. }
        ));
    }

    #[test]
    fn test_unmatched_becomes_create() {
        let set = local(r#"suite("S") { case("TC-API-SYNC-001", "new") {} }"#);
        let plan = reconcile(&set, &index_of(vec![]));
        assert!(matches!(plan.planned[0].action, SyncAction::Create { .. }));
        assert!(plan.planned[0].matched_by.is_none());
    }

    #[test]
    fn test_stale_annotation_warns_and_falls_back() {
        let set = local(
            r#"suite("S") {
                case("TC-API-SYNC-001", "login works") { remote_id(999); }
            }"#,
        );
        let index = index_of(vec![RemoteCase {
            id: 7,
            case_ref: Some("TC-API-SYNC-001".to_string()),
            title: "whatever".to_string(),
            ..Default::default()
        }]);
        let plan = reconcile(&set, &index);
        assert_eq!(plan.warnings.len(), 1);
        assert!(plan.warnings[0].contains("999"));
        assert!(matches!(
            plan.planned[0].action,
            SyncAction::Update { remote_id: 7, .. }
        ));
    }

    #[test]
    fn test_identical_record_is_noop() {
        let set = local(r#"suite("S") { case("TC-API-SYNC-001", "stable") {} }"#);
        let index = index_of(vec![RemoteCase {
            id: 3,
            case_ref: Some("TC-API-SYNC-001".to_string()),
            title: "TC-API-SYNC-001: stable".to_string(),
            ..Default::default()
        }]);
        let plan = reconcile(&set, &index);
        assert!(matches!(
            plan.planned[0].action,
            SyncAction::Noop { remote_id: 3 }
        ));
    }

    #[test]
    fn test_last_result_carried_unchanged() {
        let set = local(r#"suite("S") { case("TC-API-SYNC-001", "ran before") {} }"#);
        let index = index_of(vec![RemoteCase {
            id: 5,
            case_ref: Some("TC-API-SYNC-001".to_string()),
            title: "old".to_string(),
            last_result: Some("passed".to_string()),
            ..Default::default()
        }]);
        let plan = reconcile(&set, &index);
        match &plan.planned[0].action {
            SyncAction::Update { fields, .. } => {
                assert_eq!(fields.last_result.as_deref(), Some("passed"));
            }
            other => panic!("expected update, got {other:?}"),
        }
    }
}
