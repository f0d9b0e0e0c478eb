//! Integration tests for SqliteJobStore.
//!
//! These tests run against a temporary SQLite file.

mod common;

use chrono::{TimeDelta, TimeZone, Utc};
use common::TestDatabase;
use jobctl_core::{BackoffPolicy, ExecutionOutcome, Job, JobId, JobState, JobctlError};
use jobctl_repository::JobStore;
use std::collections::HashSet;

fn job_created_at(id: &str, secs: i64) -> Job {
    let created = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + TimeDelta::seconds(secs);
    Job::new(JobId::from(id), format!("echo {id}"), 3, created)
}

#[tokio::test]
async fn test_save_and_get_round_trip() {
    let db = TestDatabase::new().await;
    let store = db.store();

    let mut job = job_created_at("job-1", 0);
    store.save(&mut job).await.expect("Failed to save job");

    let found = store
        .get(&job.id)
        .await
        .expect("Query failed")
        .expect("Job not found");
    assert_eq!(found, job);
    assert!(found.output.is_none());
    assert!(found.next_retry_at.is_none());
}

#[tokio::test]
async fn test_round_trip_with_every_field_set() {
    let db = TestDatabase::new().await;
    let store = db.store();
    let now = Utc::now();

    let mut job = job_created_at("job-full", 0);
    job.claim(now).unwrap();
    job.record_outcome(&ExecutionOutcome::new(7, "out", "err"), &BackoffPolicy::default(), now)
        .unwrap();
    store.save(&mut job).await.unwrap();

    let found = store.fetch(&job.id).await.unwrap();
    assert_eq!(found, job);
    assert_eq!(found.state, JobState::Failed);
    assert_eq!(found.exit_code, Some(7));
    assert_eq!(found.next_retry_at, job.next_retry_at);
}

#[tokio::test]
async fn test_save_sets_updated_at_and_keeps_created_at() {
    let db = TestDatabase::new().await;
    let store = db.store();

    let mut job = job_created_at("job-1", 0);
    let created_at = job.created_at;
    store.save(&mut job).await.unwrap();
    let first_update = job.updated_at;
    assert!(first_update > created_at);

    let mut copy = job.clone();
    copy.created_at = Utc::now();
    store.save(&mut copy).await.unwrap();

    let found = store.fetch(&job.id).await.unwrap();
    assert_eq!(found.created_at, created_at);
    assert!(found.updated_at >= first_update);
}

#[tokio::test]
async fn test_save_is_idempotent() {
    let db = TestDatabase::new().await;
    let store = db.store();

    let mut job = job_created_at("job-1", 0);
    store.save(&mut job).await.unwrap();
    store.save(&mut job).await.unwrap();

    assert_eq!(store.list(None).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_get_missing_job() {
    let db = TestDatabase::new().await;
    let store = db.store();

    assert!(store.get(&JobId::from("nope")).await.unwrap().is_none());
    let err = store.fetch(&JobId::from("nope")).await.unwrap_err();
    assert!(matches!(err, JobctlError::NotFound { .. }));
}

#[tokio::test]
async fn test_create_rejects_duplicate_id() {
    let db = TestDatabase::new().await;
    let store = db.store();

    let job = job_created_at("dup", 0);
    assert!(store.create(&job).await.unwrap());

    let mut other = job_created_at("dup", 10);
    other.command = "rm -rf /tmp/x".to_string();
    assert!(!store.create(&other).await.unwrap());

    let found = store.fetch(&job.id).await.unwrap();
    assert_eq!(found.command, job.command);
}

#[tokio::test]
async fn test_list_newest_first_with_filter() {
    let db = TestDatabase::new().await;
    let store = db.store();

    for (id, secs) in [("old", 0), ("new", 20), ("mid", 10)] {
        store.create(&job_created_at(id, secs)).await.unwrap();
    }
    let mut done = job_created_at("done", 5);
    done.state = JobState::Completed;
    store.create(&done).await.unwrap();

    let all: Vec<String> = store
        .list(None)
        .await
        .unwrap()
        .into_iter()
        .map(|j| j.id.to_string())
        .collect();
    assert_eq!(all, ["new", "mid", "done", "old"]);

    let pending = store.list(Some(JobState::Pending)).await.unwrap();
    assert_eq!(pending.len(), 3);
    assert!(pending.iter().all(|j| j.state == JobState::Pending));

    assert!(store.list(Some(JobState::Dead)).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_claim_picks_oldest_eligible() {
    let db = TestDatabase::new().await;
    let store = db.store();

    store.create(&job_created_at("second", 10)).await.unwrap();
    store.create(&job_created_at("first", 0)).await.unwrap();

    let claimed = store.claim_next(Utc::now()).await.unwrap().expect("a job");
    assert_eq!(claimed.id.as_str(), "first");
    assert_eq!(claimed.state, JobState::Processing);
    assert_eq!(claimed.attempts, 1);

    let stored = store.fetch(&claimed.id).await.unwrap();
    assert_eq!(stored.state, JobState::Processing);
    assert_eq!(stored.attempts, 1);

    let next = store.claim_next(Utc::now()).await.unwrap().expect("a job");
    assert_eq!(next.id.as_str(), "second");
    assert!(store.claim_next(Utc::now()).await.unwrap().is_none());
}

#[tokio::test]
async fn test_claim_respects_retry_time() {
    let db = TestDatabase::new().await;
    let store = db.store();
    let now = Utc::now();

    let mut job = job_created_at("retry", 0);
    job.claim(now).unwrap();
    job.record_outcome(&ExecutionOutcome::new(1, "", ""), &BackoffPolicy::default(), now)
        .unwrap();
    store.save(&mut job).await.unwrap();
    let due = job.next_retry_at.unwrap();

    assert!(store.claim_next(due - TimeDelta::milliseconds(1)).await.unwrap().is_none());

    let claimed = store.claim_next(due).await.unwrap().expect("due job");
    assert_eq!(claimed.state, JobState::Processing);
    assert_eq!(claimed.attempts, 2);
    assert!(claimed.next_retry_at.is_none());
}

#[tokio::test]
async fn test_claim_skips_non_eligible_states() {
    let db = TestDatabase::new().await;
    let store = db.store();

    for (id, state) in [
        ("processing", JobState::Processing),
        ("completed", JobState::Completed),
        ("dead", JobState::Dead),
    ] {
        let mut job = job_created_at(id, 0);
        job.state = state;
        store.create(&job).await.unwrap();
    }

    assert!(store.claim_next(Utc::now()).await.unwrap().is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_claims_never_duplicate() {
    const JOBS: usize = 40;
    const CLAIMERS: usize = 6;

    let db = TestDatabase::new().await;
    let store = db.store();
    for i in 0..JOBS {
        store
            .create(&job_created_at(&format!("job-{i:02}"), i as i64))
            .await
            .unwrap();
    }

    let mut handles = Vec::new();
    for _ in 0..CLAIMERS {
        let claimer = db.second_store().await;
        handles.push(tokio::spawn(async move {
            let mut claimed = Vec::new();
            while let Some(job) = claimer.claim_next(Utc::now()).await.expect("claim failed") {
                assert_eq!(job.state, JobState::Processing);
                claimed.push(job.id);
            }
            claimer.close().await;
            claimed
        }));
    }

    let mut seen = HashSet::new();
    let mut total = 0;
    for handle in handles {
        for id in handle.await.unwrap() {
            total += 1;
            assert!(seen.insert(id.clone()), "job {id} claimed twice");
        }
    }
    assert_eq!(total, JOBS);
    assert_eq!(seen.len(), JOBS);

    let counts = store.count_by_state().await.unwrap();
    assert_eq!(counts.get(JobState::Processing), JOBS as u64);
}

#[tokio::test]
async fn test_count_by_state_includes_every_state() {
    let db = TestDatabase::new().await;
    let store = db.store();

    store.create(&job_created_at("a", 0)).await.unwrap();
    store.create(&job_created_at("b", 1)).await.unwrap();
    let mut dead = job_created_at("c", 2);
    dead.state = JobState::Dead;
    store.create(&dead).await.unwrap();

    let counts = store.count_by_state().await.unwrap();
    assert_eq!(counts.get(JobState::Pending), 2);
    assert_eq!(counts.get(JobState::Dead), 1);
    assert_eq!(counts.get(JobState::Completed), 0);
    assert_eq!(counts.iter().count(), 5);
    assert_eq!(counts.total(), 3);
}

#[tokio::test]
async fn test_delete() {
    let db = TestDatabase::new().await;
    let store = db.store();

    let job = job_created_at("gone", 0);
    store.create(&job).await.unwrap();

    assert!(store.delete(&job.id).await.unwrap());
    assert!(store.get(&job.id).await.unwrap().is_none());
    assert!(!store.delete(&job.id).await.unwrap());
}

#[tokio::test]
async fn test_close_is_idempotent() {
    let db = TestDatabase::new().await;
    let store = db.second_store().await;

    store.close().await;
    store.close().await;
    assert!(store.list(None).await.is_err());
}
