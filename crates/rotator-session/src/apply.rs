//! Apply dispatcher: turn the current selection into either a workflow
//! trigger or a record document for the user to commit.

use std::collections::BTreeMap;

use serde::Serialize;
use time::OffsetDateTime;

use rotator_core::record::SelectionRecord;
use rotator_core::selection::SelectionState;
use rotator_core::url::{encode_component, encode_path};
use rotator_core::{ApplyMode, Result, RotatorError, SelectionStatus};

/// Where and how an apply lands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyTarget {
    pub mode: ApplyMode,
    pub owner: String,
    pub repo: String,
    pub workflow: String,
    pub git_ref: String,
    pub web_base: String,
    pub record_path: String,
}

/// What the user is shown in record mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordInstructions {
    pub path: String,
    pub document: String,
    /// Pre-filled "create file" page on the hosting platform.
    pub create_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyPlan {
    Dispatch {
        record: SelectionRecord,
        workflow: String,
        git_ref: String,
        inputs: BTreeMap<String, String>,
    },
    Record {
        record: SelectionRecord,
        instructions: RecordInstructions,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ApplyOutcome {
    /// The platform accepted the trigger; the run itself is confirmed later
    /// by the status slot.
    Dispatched {
        record: SelectionRecord,
        workflow: String,
    },
    Failed {
        record: SelectionRecord,
        kind: &'static str,
        error: String,
    },
    Instructions {
        record: SelectionRecord,
        instructions: RecordInstructions,
    },
}

impl ApplyOutcome {
    pub fn record(&self) -> &SelectionRecord {
        match self {
            ApplyOutcome::Dispatched { record, .. }
            | ApplyOutcome::Failed { record, .. }
            | ApplyOutcome::Instructions { record, .. } => record,
        }
    }
}

/// Build the record for the current selection and decide how it leaves.
pub fn plan(
    selection: &SelectionState,
    target: &ApplyTarget,
    now: OffsetDateTime,
) -> Result<ApplyPlan> {
    let selected = selection.selected().ok_or(RotatorError::NothingSelected)?;
    let record = SelectionRecord::new(
        &selected.candidate.name,
        selected.origin,
        SelectionStatus::Success,
        now,
    )?;

    match target.mode {
        ApplyMode::Dispatch => Ok(ApplyPlan::Dispatch {
            inputs: dispatch_inputs(&record),
            workflow: target.workflow.clone(),
            git_ref: target.git_ref.clone(),
            record,
        }),
        ApplyMode::Record => {
            let document = record.to_document()?;
            let instructions = RecordInstructions {
                path: target.record_path.clone(),
                create_url: create_file_url(target, &document),
                document,
            };
            Ok(ApplyPlan::Record {
                record,
                instructions,
            })
        }
    }
}

/// Workflow inputs carrying the record's fields.
pub fn dispatch_inputs(record: &SelectionRecord) -> BTreeMap<String, String> {
    BTreeMap::from([
        ("avatar_name".to_string(), record.avatar_name.clone()),
        ("mode".to_string(), record.mode.as_str().to_string()),
        ("timestamp".to_string(), record.timestamp.clone()),
    ])
}

/// `{web_base}/{owner}/{repo}/new/{ref}?filename=..&value=..`
pub fn create_file_url(target: &ApplyTarget, document: &str) -> String {
    format!(
        "{}/{}/{}/new/{}?filename={}&value={}",
        target.web_base.trim_end_matches('/'),
        encode_component(&target.owner),
        encode_component(&target.repo),
        encode_path(&target.git_ref),
        encode_component(&target.record_path),
        encode_component(document),
    )
}

/// Outcome of a dispatch attempt. On failure the record is kept with
/// `status = failure` and the error is handed back for the notice.
pub fn finish_dispatch(
    record: SelectionRecord,
    workflow: String,
    result: Result<()>,
) -> (ApplyOutcome, Option<RotatorError>) {
    match result {
        Ok(()) => (ApplyOutcome::Dispatched { record, workflow }, None),
        Err(err) => (
            ApplyOutcome::Failed {
                record: record.with_status(SelectionStatus::Failure),
                kind: err.kind(),
                error: err.to_string(),
            },
            Some(err),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rotator_core::{AvatarCandidate, SelectionMode};
    use time::format_description::well_known::Rfc3339;

    fn target(mode: ApplyMode) -> ApplyTarget {
        ApplyTarget {
            mode,
            owner: "octo".into(),
            repo: "profile".into(),
            workflow: "update-avatar.yml".into(),
            git_ref: "main".into(),
            web_base: "https://github.com".into(),
            record_path: "selected_avatar.json".into(),
        }
    }

    fn selected(name: &str, origin: SelectionMode) -> SelectionState {
        let mut state = SelectionState::default();
        state.select(
            AvatarCandidate {
                name: name.into(),
                url: format!("https://raw/{name}"),
                size: None,
            },
            origin,
        );
        state
    }

    fn now() -> OffsetDateTime {
        OffsetDateTime::parse("2026-10-16T08:30:00Z", &Rfc3339).unwrap()
    }

    #[test]
    fn nothing_selected_fails() {
        let err =
            plan(&SelectionState::default(), &target(ApplyMode::Record), now()).unwrap_err();
        assert_eq!(err, RotatorError::NothingSelected);
    }

    #[test]
    fn record_mode_builds_document_and_link() {
        let state = selected("a.png", SelectionMode::ManualInput);
        let ApplyPlan::Record {
            record,
            instructions,
        } = plan(&state, &target(ApplyMode::Record), now()).unwrap()
        else {
            panic!("expected record plan");
        };
        assert_eq!(record.avatar_name, "a.png");
        assert_eq!(record.mode, SelectionMode::ManualInput);
        assert_eq!(record.timestamp, "2026-10-16T08:30:00Z");
        assert!(record.parsed_timestamp().is_ok());

        let parsed = SelectionRecord::parse(instructions.document.as_bytes()).unwrap();
        assert_eq!(parsed, record);
        assert_eq!(instructions.path, "selected_avatar.json");
        assert!(instructions.create_url.starts_with(
            "https://github.com/octo/profile/new/main?filename=selected_avatar.json&value=%7B"
        ));
    }

    #[test]
    fn dispatch_mode_carries_record_fields_as_inputs() {
        let state = selected("b.jpg", SelectionMode::Random);
        let ApplyPlan::Dispatch {
            inputs, workflow, ..
        } = plan(&state, &target(ApplyMode::Dispatch), now()).unwrap()
        else {
            panic!("expected dispatch plan");
        };
        assert_eq!(workflow, "update-avatar.yml");
        assert_eq!(inputs["avatar_name"], "b.jpg");
        assert_eq!(inputs["mode"], "random");
        assert_eq!(inputs["timestamp"], "2026-10-16T08:30:00Z");
    }

    #[test]
    fn failed_dispatch_keeps_failure_record() {
        let record = SelectionRecord::new(
            "a.png",
            SelectionMode::ManualInput,
            SelectionStatus::Success,
            now(),
        )
        .unwrap();
        let (outcome, err) = finish_dispatch(
            record,
            "update-avatar.yml".into(),
            Err(RotatorError::Dispatch {
                status: 422,
                message: "Unexpected inputs".into(),
            }),
        );
        assert_eq!(outcome.record().status, SelectionStatus::Failure);
        assert!(matches!(outcome, ApplyOutcome::Failed { kind: "dispatch_error", .. }));
        assert!(err.unwrap().to_string().contains("422"));
    }
}
