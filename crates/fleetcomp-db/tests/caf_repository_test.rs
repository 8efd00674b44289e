//! Integration tests for CAF, attachment, signature and audit log
//! repositories using in-memory SurrealDB.

use chrono::{Duration, Utc};
use fleetcomp_core::error::FleetError;
use fleetcomp_core::models::audit::{ActorType, AuditOutcome, CreateAuditLogEntry};
use fleetcomp_core::models::caf::{
    CafCategory, CafFilter, CafPriority, CafStatus, CreateCaf, CreateCafAttachment, UpdateCaf,
};
use fleetcomp_core::models::organization::CreateOrganization;
use fleetcomp_core::models::signature::{CreateSignature, SignatureType};
use fleetcomp_core::repository::{
    AuditLogFilter, AuditLogRepository, CafRepository, OrganizationRepository, Pagination,
    SignatureRepository, Store,
};
use fleetcomp_db::SurrealStore;
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use uuid::Uuid;

async fn setup() -> (SurrealStore<Db>, Uuid) {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    fleetcomp_db::run_migrations(&db).await.unwrap();
    let store = SurrealStore::new(db);

    let org = store
        .organizations()
        .create(CreateOrganization {
            name: "Acme Freight".into(),
            slug: "acme".into(),
            dot_number: None,
        })
        .await
        .unwrap();

    (store, org.id)
}

fn caf_input(org: Uuid, year: i32, sequence: u32) -> CreateCaf {
    CreateCaf {
        organization_id: org,
        incident_id: None,
        violation_id: None,
        caf_number: format!("CAF-{year}-{sequence:04}"),
        number_year: year,
        number_sequence: sequence,
        title: "Brakes out of adjustment".into(),
        description: "Pushrod stroke beyond limit".into(),
        corrective_action: "Adjust and re-inspect".into(),
        category: CafCategory::Equipment,
        subcategory: "Brakes".into(),
        priority: CafPriority::High,
        requires_approval: true,
        assigned_to: None,
        created_by: None,
        due_date: Utc::now() + Duration::days(2),
    }
}

// -----------------------------------------------------------------------
// CAFs
// -----------------------------------------------------------------------

#[tokio::test]
async fn create_caf_starts_assigned() {
    let (store, org) = setup().await;

    let caf = store.cafs().create(caf_input(org, 2025, 1)).await.unwrap();
    assert_eq!(caf.status, CafStatus::Assigned);
    assert_eq!(caf.caf_number, "CAF-2025-0001");
    assert_eq!(caf.category, CafCategory::Equipment);
    assert!(caf.completed_at.is_none());

    let fetched = store.cafs().get_by_id(caf.id).await.unwrap();
    assert_eq!(fetched.caf_number, caf.caf_number);
    assert_eq!(fetched.priority, CafPriority::High);
}

#[tokio::test]
async fn duplicate_caf_number_rejected() {
    let (store, org) = setup().await;

    store.cafs().create(caf_input(org, 2025, 1)).await.unwrap();
    let err = store
        .cafs()
        .create(caf_input(org, 2025, 1))
        .await
        .unwrap_err();
    assert!(matches!(err, FleetError::AlreadyExists { .. }), "got {err:?}");
}

#[tokio::test]
async fn max_sequence_is_per_year() {
    let (store, org) = setup().await;

    assert_eq!(store.cafs().max_sequence_for_year(2025).await.unwrap(), None);

    store.cafs().create(caf_input(org, 2025, 1)).await.unwrap();
    store.cafs().create(caf_input(org, 2025, 7)).await.unwrap();
    store.cafs().create(caf_input(org, 2024, 12)).await.unwrap();

    assert_eq!(store.cafs().max_sequence_for_year(2025).await.unwrap(), Some(7));
    assert_eq!(store.cafs().max_sequence_for_year(2024).await.unwrap(), Some(12));
}

#[tokio::test]
async fn update_sets_and_clears_optional_fields() {
    let (store, org) = setup().await;
    let caf = store.cafs().create(caf_input(org, 2025, 1)).await.unwrap();
    let approver = Uuid::new_v4();

    let approved = store
        .cafs()
        .update(
            caf.id,
            CafStatus::Assigned,
            UpdateCaf {
                status: Some(CafStatus::Approved),
                approved_at: Some(Some(Utc::now())),
                approved_by: Some(Some(approver)),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(approved.status, CafStatus::Approved);
    assert_eq!(approved.approved_by, Some(approver));

    let cleared = store
        .cafs()
        .update(
            caf.id,
            CafStatus::Approved,
            UpdateCaf {
                approved_at: Some(None),
                approved_by: Some(None),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(cleared.status, CafStatus::Approved);
    assert!(cleared.approved_at.is_none());
    assert!(cleared.approved_by.is_none());
}

#[tokio::test]
async fn update_missing_caf_is_not_found() {
    let (store, _) = setup().await;
    let err = store
        .cafs()
        .update(Uuid::new_v4(), CafStatus::Assigned, UpdateCaf::default())
        .await
        .unwrap_err();
    assert!(matches!(err, FleetError::NotFound { .. }));
}

#[tokio::test]
async fn update_from_stale_status_is_conflict() {
    let (store, org) = setup().await;
    let caf = store.cafs().create(caf_input(org, 2025, 1)).await.unwrap();

    let err = store
        .cafs()
        .update(
            caf.id,
            CafStatus::Completed,
            UpdateCaf {
                status: Some(CafStatus::Approved),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, FleetError::Conflict { .. }), "got {err:?}");

    let unchanged = store.cafs().get_by_id(caf.id).await.unwrap();
    assert_eq!(unchanged.status, CafStatus::Assigned);
    assert!(unchanged.approved_at.is_none());
}

#[tokio::test]
async fn list_filters_by_status_and_paginates() {
    let (store, org) = setup().await;

    for seq in 1..=4 {
        store.cafs().create(caf_input(org, 2025, seq)).await.unwrap();
    }
    let last = store.cafs().create(caf_input(org, 2025, 5)).await.unwrap();
    store
        .cafs()
        .update(
            last.id,
            CafStatus::Assigned,
            UpdateCaf {
                status: Some(CafStatus::InProgress),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let all = store
        .cafs()
        .list(org, CafFilter::default(), Pagination { offset: 0, limit: 3 })
        .await
        .unwrap();
    assert_eq!(all.total, 5);
    assert_eq!(all.items.len(), 3);
    assert_eq!(all.items[0].caf_number, "CAF-2025-0005");

    let in_progress = store
        .cafs()
        .list(
            org,
            CafFilter {
                status: Some(CafStatus::InProgress),
                incident_id: None,
            },
            Pagination::default(),
        )
        .await
        .unwrap();
    assert_eq!(in_progress.total, 1);
    assert_eq!(in_progress.items[0].id, last.id);

    let other_org = store
        .cafs()
        .list(Uuid::new_v4(), CafFilter::default(), Pagination::default())
        .await
        .unwrap();
    assert_eq!(other_org.total, 0);
}

#[tokio::test]
async fn delete_removes_caf_and_attachments() {
    let (store, org) = setup().await;
    let caf = store.cafs().create(caf_input(org, 2025, 1)).await.unwrap();
    store
        .cafs()
        .add_attachment(CreateCafAttachment {
            caf_id: caf.id,
            file_name: "photo.jpg".into(),
            content_type: "image/jpeg".into(),
            storage_key: "cafs/photo.jpg".into(),
            uploaded_by: None,
        })
        .await
        .unwrap();

    store
        .signatures()
        .create(signature_input(caf.id, Uuid::new_v4(), SignatureType::Completion))
        .await
        .unwrap();

    store.cafs().delete(caf.id).await.unwrap();

    assert!(matches!(
        store.cafs().get_by_id(caf.id).await.unwrap_err(),
        FleetError::NotFound { .. }
    ));
    assert!(store.cafs().list_attachments(caf.id).await.unwrap().is_empty());
    assert!(store.signatures().list_by_caf(caf.id).await.unwrap().is_empty());
}

// -----------------------------------------------------------------------
// Attachments
// -----------------------------------------------------------------------

#[tokio::test]
async fn attachments_added_listed_and_removed() {
    let (store, org) = setup().await;
    let caf = store.cafs().create(caf_input(org, 2025, 1)).await.unwrap();

    let attachment = store
        .cafs()
        .add_attachment(CreateCafAttachment {
            caf_id: caf.id,
            file_name: "receipt.pdf".into(),
            content_type: "application/pdf".into(),
            storage_key: "cafs/receipt.pdf".into(),
            uploaded_by: Some(Uuid::new_v4()),
        })
        .await
        .unwrap();
    assert_eq!(attachment.file_name, "receipt.pdf");

    let listed = store.cafs().list_attachments(caf.id).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, attachment.id);

    store
        .cafs()
        .remove_attachment(caf.id, attachment.id)
        .await
        .unwrap();
    assert!(store.cafs().list_attachments(caf.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn removing_attachment_of_other_caf_is_not_found() {
    let (store, org) = setup().await;
    let caf = store.cafs().create(caf_input(org, 2025, 1)).await.unwrap();
    let other = store.cafs().create(caf_input(org, 2025, 2)).await.unwrap();

    let attachment = store
        .cafs()
        .add_attachment(CreateCafAttachment {
            caf_id: caf.id,
            file_name: "a.txt".into(),
            content_type: "text/plain".into(),
            storage_key: "a".into(),
            uploaded_by: None,
        })
        .await
        .unwrap();

    let err = store
        .cafs()
        .remove_attachment(other.id, attachment.id)
        .await
        .unwrap_err();
    assert!(matches!(err, FleetError::NotFound { .. }));
    assert_eq!(store.cafs().list_attachments(caf.id).await.unwrap().len(), 1);
}

// -----------------------------------------------------------------------
// Signatures
// -----------------------------------------------------------------------

fn signature_input(caf: Uuid, staff: Uuid, kind: SignatureType) -> CreateSignature {
    CreateSignature {
        caf_id: caf,
        signature_type: kind,
        staff_id: staff,
        signature_data: "data:image/png;base64,AAAA".into(),
        ip_address: Some("203.0.113.9".into()),
        notes: None,
    }
}

#[tokio::test]
async fn signatures_created_and_found() {
    let (store, org) = setup().await;
    let caf = store.cafs().create(caf_input(org, 2025, 1)).await.unwrap();
    let staff = Uuid::new_v4();

    let signature = store
        .signatures()
        .create(signature_input(caf.id, staff, SignatureType::Completion))
        .await
        .unwrap();
    assert_eq!(signature.ip_address.as_deref(), Some("203.0.113.9"));

    let found = store
        .signatures()
        .find(caf.id, staff, SignatureType::Completion)
        .await
        .unwrap();
    assert_eq!(found.map(|s| s.id), Some(signature.id));

    let absent = store
        .signatures()
        .find(caf.id, staff, SignatureType::Approval)
        .await
        .unwrap();
    assert!(absent.is_none());
}

#[tokio::test]
async fn duplicate_signature_rejected_by_index() {
    let (store, org) = setup().await;
    let caf = store.cafs().create(caf_input(org, 2025, 1)).await.unwrap();
    let staff = Uuid::new_v4();

    store
        .signatures()
        .create(signature_input(caf.id, staff, SignatureType::Completion))
        .await
        .unwrap();
    let err = store
        .signatures()
        .create(signature_input(caf.id, staff, SignatureType::Completion))
        .await
        .unwrap_err();
    assert!(matches!(err, FleetError::AlreadyExists { .. }), "got {err:?}");

    // Same staff may still sign the other type.
    store
        .signatures()
        .create(signature_input(caf.id, staff, SignatureType::Approval))
        .await
        .unwrap();
    assert_eq!(store.signatures().list_by_caf(caf.id).await.unwrap().len(), 2);
}

// -----------------------------------------------------------------------
// Audit log
// -----------------------------------------------------------------------

#[tokio::test]
async fn audit_entries_filtered_by_action() {
    let (store, org) = setup().await;
    let actor = Uuid::new_v4();
    let resource = Uuid::new_v4();

    for action in ["caf.signed", "caf.signed", "caf.transitioned"] {
        store
            .audit_log()
            .append(CreateAuditLogEntry {
                organization_id: org,
                actor_id: actor,
                actor_type: ActorType::Staff,
                action: action.into(),
                resource_id: Some(resource),
                outcome: AuditOutcome::Success,
                ip_address: None,
                metadata: Some(serde_json::json!({ "caf_number": "CAF-2025-0001" })),
            })
            .await
            .unwrap();
    }

    let signed = store
        .audit_log()
        .list(
            org,
            AuditLogFilter {
                action: Some("caf.signed".into()),
                ..Default::default()
            },
            Pagination::default(),
        )
        .await
        .unwrap();
    assert_eq!(signed.total, 2);
    assert_eq!(signed.items.len(), 2);
    assert_eq!(signed.items[0].metadata["caf_number"], "CAF-2025-0001");

    let all = store
        .audit_log()
        .list(org, AuditLogFilter::default(), Pagination::default())
        .await
        .unwrap();
    assert_eq!(all.total, 3);
}

#[tokio::test]
async fn audit_entry_defaults_metadata_to_empty_object() {
    let (store, org) = setup().await;

    let entry = store
        .audit_log()
        .append(CreateAuditLogEntry {
            organization_id: org,
            actor_id: Uuid::nil(),
            actor_type: ActorType::System,
            action: "incident.recomputed".into(),
            resource_id: None,
            outcome: AuditOutcome::Success,
            ip_address: None,
            metadata: None,
        })
        .await
        .unwrap();

    assert_eq!(entry.actor_type, ActorType::System);
    assert!(entry.metadata.as_object().is_some_and(|m| m.is_empty()));
}

// -----------------------------------------------------------------------
// Guarded signing
// -----------------------------------------------------------------------

async fn completed_caf(store: &SurrealStore<Db>, org: Uuid) -> Uuid {
    let caf = store.cafs().create(caf_input(org, 2025, 1)).await.unwrap();
    store
        .cafs()
        .update(
            caf.id,
            CafStatus::Assigned,
            UpdateCaf {
                status: Some(CafStatus::Completed),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    caf.id
}

fn completion_notes(notes: &str) -> UpdateCaf {
    UpdateCaf {
        completed_at: Some(Some(Utc::now())),
        completion_notes: Some(Some(notes.into())),
        ..Default::default()
    }
}

#[tokio::test]
async fn sign_stores_signature_and_updates_caf() {
    let (store, org) = setup().await;
    let caf_id = completed_caf(&store, org).await;
    let staff = Uuid::new_v4();

    let (signature, caf) = store
        .cafs()
        .sign(
            signature_input(caf_id, staff, SignatureType::Completion),
            CafStatus::Completed,
            completion_notes("Tires replaced"),
        )
        .await
        .unwrap();

    assert_eq!(signature.caf_id, caf_id);
    assert_eq!(signature.staff_id, staff);
    assert_eq!(caf.completion_notes.as_deref(), Some("Tires replaced"));
    assert!(caf.completed_at.is_some());
    assert_eq!(store.signatures().list_by_caf(caf_id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn sign_keeps_nothing_when_status_moved() {
    let (store, org) = setup().await;
    let caf = store.cafs().create(caf_input(org, 2025, 1)).await.unwrap();

    let err = store
        .cafs()
        .sign(
            signature_input(caf.id, Uuid::new_v4(), SignatureType::Completion),
            CafStatus::Completed,
            completion_notes("too early"),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, FleetError::Conflict { .. }), "got {err:?}");

    assert!(store.signatures().list_by_caf(caf.id).await.unwrap().is_empty());
    let unchanged = store.cafs().get_by_id(caf.id).await.unwrap();
    assert_eq!(unchanged.status, CafStatus::Assigned);
    assert!(unchanged.completion_notes.is_none());
}

#[tokio::test]
async fn duplicate_sign_leaves_caf_untouched() {
    let (store, org) = setup().await;
    let caf_id = completed_caf(&store, org).await;
    let staff = Uuid::new_v4();

    store
        .cafs()
        .sign(
            signature_input(caf_id, staff, SignatureType::Completion),
            CafStatus::Completed,
            completion_notes("first"),
        )
        .await
        .unwrap();

    let err = store
        .cafs()
        .sign(
            signature_input(caf_id, staff, SignatureType::Completion),
            CafStatus::Completed,
            completion_notes("second"),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, FleetError::AlreadyExists { .. }), "got {err:?}");

    let caf = store.cafs().get_by_id(caf_id).await.unwrap();
    assert_eq!(caf.completion_notes.as_deref(), Some("first"));
    assert_eq!(store.signatures().list_by_caf(caf_id).await.unwrap().len(), 1);
}
