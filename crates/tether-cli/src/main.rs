use std::env;
use std::error::Error;
use std::sync::Arc;

use chrono::{Duration, Utc};
use tether_core::app::{ConfigError, CoordinatorBuilder, TetherConfig};
use tether_core::domain::{FileUpload, NewAssignment, NewSubmission, SubmissionStatus};
use tether_core::impls::{LocalObjectStore, UrlSigner};
use tether_core::observability::{DEFAULT_DIRECTIVES, init_tracing};
use tether_core::ports::{Clock, ObjectStoreGateway, SystemClock};
use tracing::{info, warn};

fn load_config() -> Result<TetherConfig, ConfigError> {
    or_demo_config(TetherConfig::from_env())
}

// デモ用: 署名鍵がなければ固定値で動かす。それ以外の設定ミスはそのまま返す
fn or_demo_config(
    loaded: Result<TetherConfig, ConfigError>,
) -> Result<TetherConfig, ConfigError> {
    match loaded {
        Err(ConfigError::Missing("TETHER_SIGNING_SECRET")) => {
            warn!("TETHER_SIGNING_SECRET is not set, falling back to demo configuration");
            Ok(TetherConfig {
                signing_secret: "demo-secret".to_string(),
                ..TetherConfig::default()
            })
        }
        other => other,
    }
}

fn print_json<T: serde::Serialize>(label: &str, value: &T) -> Result<(), serde_json::Error> {
    println!("== {label}\n{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    init_tracing(DEFAULT_DIRECTIVES)?;
    let config = load_config()?;

    // (A) in-memory のストアで組み立て、コンテナと CORS を準備
    // TETHER_DATA_DIR があればファイルはディスクに置く
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let mut builder = CoordinatorBuilder::new(config.clone()).in_memory(Arc::clone(&clock))?;
    if let Ok(dir) = env::var("TETHER_DATA_DIR") {
        info!(dir = %dir, "storing objects on disk");
        let signer = UrlSigner::new(&config.public_base_url, &config.signing_secret)?;
        builder = builder.object_store(Arc::new(LocalObjectStore::new(dir, signer, clock)));
    }
    let tether = builder.build()?;
    let report = tether.provisioner.provision().await?;
    print_json("provisioned", &report)?;

    // (B) ファイル付きの課題を作る
    let assignment = tether
        .assignments
        .create_assignment(
            NewAssignment {
                issuer_id: "teacher-1".to_string(),
                course_id: "rust-101".to_string(),
                description: "Implement a linked list".to_string(),
                deadline_at: Utc::now() + Duration::days(7),
            },
            Some(FileUpload::new("instructions.pdf", vec![0x25u8; 2048])),
        )
        .await?;
    let listed = tether.assignments.list_assignments_by_course("rust-101").await?;
    print_json("assignments in rust-101", &listed)?;

    let container = tether.assignments.container();
    for key in tether.object_store.list_keys(container, "rust-101/").await? {
        let tags = tether.object_store.tags(container, &key).await?;
        print_json(&format!("tags of {key}"), &tags)?;
    }

    // (C) 提出してレビューを進める
    let submission = tether
        .submissions
        .upload_submission(
            NewSubmission {
                responder_id: "student-42".to_string(),
                assignment_id: assignment.id,
            },
            Some(FileUpload::new("list.rs", "pub struct List;")),
        )
        .await?;
    for status in [SubmissionStatus::UnderReview, SubmissionStatus::Accepted] {
        tether
            .submissions
            .update_submission_status(submission.id, status)
            .await?;
    }
    match tether
        .submissions
        .update_submission_status(submission.id, SubmissionStatus::Submitted)
        .await
    {
        Ok(_) => warn!("accepted submission moved back to submitted"),
        Err(e) => info!(error = %e, "rejected as expected"),
    }
    let submissions = tether
        .submissions
        .list_submissions_for_assignment(assignment.id, Some("student-42"))
        .await?;
    print_json("submissions", &submissions)?;

    // (D) 後片付け
    let reconciled = tether.reconciler.reconcile_once().await?;
    print_json("reconcile", &reconciled)?;

    tether.submissions.delete_submission(submission.id).await?;
    tether.assignments.delete_assignment(assignment.id).await?;
    let second_delete = tether.assignments.delete_assignment(assignment.id).await;
    println!("second delete succeeded: {}", second_delete.is_ok());

    Ok(())
}
