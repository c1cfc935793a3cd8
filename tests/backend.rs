use httpmock::prelude::*;
use serde_json::json;
use std::{fs, time::Duration};
use stem_studio_core::{
    project_id_from_stem_url, types::Credentials, Backend, ClientConfig, HttpBackend, JobPoll,
    JobSource, JobStatus, JobTracker, MemoryStore, PollOutcome, StudioError,
};
use tempfile::tempdir;

fn backend_for(server: &MockServer) -> HttpBackend {
    let cfg = ClientConfig::default()
        .with_api_base(&server.url("/api"))
        .unwrap();
    HttpBackend::new(cfg).unwrap()
}

#[test]
fn test_file_upload_is_multipart_with_bearer() {
    let server = MockServer::start();
    let upload = server.mock(|when, then| {
        when.method(POST)
            .path("/api/process_file_async")
            .header("Authorization", "Bearer tok")
            .body_contains("name=\"file\"")
            .body_contains("ID3-ish bytes");
        then.status(200).json_body(json!({ "job_id": "abc123" }));
    });

    let dir = tempdir().unwrap();
    let song = dir.path().join("song.mp3");
    fs::write(&song, b"ID3-ish bytes").unwrap();

    let backend = backend_for(&server);
    let id = backend.submit("tok", &JobSource::File(song)).unwrap();

    assert_eq!(id, "abc123");
    upload.assert();
}

#[test]
fn test_link_upload_is_form_encoded() {
    let server = MockServer::start();
    let upload = server.mock(|when, then| {
        when.method(POST)
            .path("/api/process_youtube_async")
            .header("Authorization", "Bearer tok")
            .body_contains("url=https%3A%2F%2Fyoutu.be%2Fdqw4w9");
        then.status(200).json_body(json!({ "job_id": "yt1" }));
    });

    let backend = backend_for(&server);
    let id = backend
        .submit("tok", &JobSource::Url("https://youtu.be/dqw4w9".into()))
        .unwrap();

    assert_eq!(id, "yt1");
    upload.assert();
}

#[test]
fn test_upload_rejections() {
    let server = MockServer::start();
    let expired = server.mock(|when, then| {
        when.method(POST)
            .path("/api/process_youtube_async")
            .header("Authorization", "Bearer stale");
        then.status(401).json_body(json!({ "detail": "Invalid token" }));
    });
    let broke = server.mock(|when, then| {
        when.method(POST)
            .path("/api/process_youtube_async")
            .header("Authorization", "Bearer poor");
        then.status(402).json_body(json!({ "detail": "Out of credits" }));
    });

    let backend = backend_for(&server);
    let link = JobSource::Url("https://youtu.be/x".into());

    assert!(matches!(
        backend.submit("stale", &link),
        Err(StudioError::AuthRequired)
    ));
    assert!(matches!(
        backend.submit("poor", &link),
        Err(StudioError::InsufficientCredits(detail)) if detail == "Out of credits"
    ));
    expired.assert();
    broke.assert();
}

#[test]
fn test_missing_upload_file_is_reported() {
    let server = MockServer::start();
    let backend = backend_for(&server);
    let dir = tempdir().unwrap();

    let err = backend
        .submit("tok", &JobSource::File(dir.path().join("nope.wav")))
        .unwrap_err();
    assert!(matches!(err, StudioError::UploadFailed(_)));
}

#[test]
fn test_job_status_is_parsed() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/api/jobs/abc123");
        then.status(200).json_body(json!({
            "status": "Initializing Neural Engine...",
            "progress": 10,
            "result": null,
            "error": null
        }));
    });

    match backend_for(&server).fetch_job("abc123").unwrap() {
        JobPoll::Found(snap) => {
            assert_eq!(
                snap.status,
                JobStatus::Stage("Initializing Neural Engine...".into())
            );
            assert_eq!(snap.progress, Some(10.0));
            assert!(snap.result.is_none());
        }
        JobPoll::NotFound => panic!("job should exist"),
    }
}

#[test]
fn test_unknown_job_is_not_found() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/api/jobs/gone");
        then.status(404).json_body(json!({ "detail": "Job not found" }));
    });

    assert!(matches!(
        backend_for(&server).fetch_job("gone").unwrap(),
        JobPoll::NotFound
    ));
}

#[test]
fn test_server_error_is_not_treated_as_lost() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/api/jobs/j");
        then.status(503);
    });

    assert!(matches!(
        backend_for(&server).fetch_job("j"),
        Err(StudioError::Http { status: 503, .. })
    ));
}

#[test]
fn test_lost_job_stops_network_traffic() {
    let server = MockServer::start();
    let submit = server.mock(|when, then| {
        when.method(POST).path("/api/process_youtube_async");
        then.status(200).json_body(json!({ "job_id": "gone" }));
    });
    let poll = server.mock(|when, then| {
        when.method(GET).path("/api/jobs/gone");
        then.status(404);
    });

    let mut tracker = JobTracker::new(backend_for(&server), MemoryStore::with_token("tok"));
    tracker
        .submit(JobSource::Url("https://youtu.be/x".into()))
        .unwrap();

    let outcome = tracker.run_until_terminal(Duration::ZERO, |_| {}, |_| {});
    assert_eq!(
        outcome,
        PollOutcome::Lost {
            job_id: "gone".into()
        }
    );
    for _ in 0..3 {
        assert_eq!(tracker.poll(), PollOutcome::Idle);
    }

    submit.assert_hits(1);
    poll.assert_hits(1);
}

#[test]
fn test_poll_follows_server_through_completion() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/api/process_file_async");
        then.status(200).json_body(json!({ "job_id": "abc123" }));
    });
    let mut running = server.mock(|when, then| {
        when.method(GET).path("/api/jobs/abc123");
        then.status(200)
            .json_body(json!({ "status": "Separating Stems (HTDemucs)...", "progress": 55 }));
    });

    let dir = tempdir().unwrap();
    let song = dir.path().join("song.wav");
    fs::write(&song, b"RIFF").unwrap();

    let mut tracker = JobTracker::new(backend_for(&server), MemoryStore::with_token("tok"));
    tracker.submit(JobSource::File(song)).unwrap();

    assert!(matches!(tracker.poll(), PollOutcome::InProgress { .. }));
    assert!(matches!(tracker.poll(), PollOutcome::InProgress { .. }));
    running.assert_hits(2);
    running.delete();

    server.mock(|when, then| {
        when.method(GET).path("/api/jobs/abc123");
        then.status(200).json_body(json!({
            "status": "completed",
            "progress": 100,
            "result": {
                "message": "Success",
                "credits_left": 4,
                "stems": {
                    "vocals": "/stems/htdemucs_6s/p42/vocals.wav",
                    "drums": "/stems/htdemucs_6s/p42/drums.wav"
                },
                "project": { "id": "p42", "name": "song.wav" }
            }
        }));
    });

    match tracker.poll() {
        PollOutcome::Completed { job_id, result } => {
            assert_eq!(job_id, "abc123");
            assert_eq!(result.project.id.as_deref(), Some("p42"));
            assert_eq!(result.credits_left, Some(4));
            assert_eq!(result.stems.len(), 2);
        }
        other => panic!("expected completion, got {other:?}"),
    }
}

#[test]
fn test_history_accepts_both_shapes() {
    let server = MockServer::start();
    let wrapped = server.mock(|when, then| {
        when.method(GET)
            .path("/api/history")
            .header("Authorization", "Bearer new");
        then.status(200).json_body(json!({
            "projects": [{
                "id": "p1",
                "name": "First.mp3",
                "date": "2025-01-02 10:00",
                "stems": { "vocals": "/stems/htdemucs_6s/p1/vocals.wav" },
                "thumbnail": null
            }]
        }));
    });
    server.mock(|when, then| {
        when.method(GET)
            .path("/api/history")
            .header("Authorization", "Bearer old");
        then.status(200).json_body(json!([
            { "id": "p2", "filename": "Second.wav", "status": "completed", "stems": {} }
        ]));
    });

    let backend = backend_for(&server);

    let projects = backend.history("new").unwrap();
    assert_eq!(projects.len(), 1);
    assert_eq!(projects[0].name, "First.mp3");
    assert_eq!(projects[0].date.as_deref(), Some("2025-01-02 10:00"));
    assert_eq!(
        project_id_from_stem_url(&projects[0].stems["vocals"]).as_deref(),
        Some("p1")
    );
    wrapped.assert();

    let projects = backend.history("old").unwrap();
    assert_eq!(projects[0].id, "p2");
    assert_eq!(projects[0].name, "Second.wav");
}

#[test]
fn test_history_requires_login() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/api/history");
        then.status(401);
    });

    assert!(matches!(
        backend_for(&server).history("bad"),
        Err(StudioError::AuthRequired)
    ));
}

#[test]
fn test_login_and_logout() {
    let server = MockServer::start();
    let login = server.mock(|when, then| {
        when.method(POST)
            .path("/api/login")
            .json_body(json!({ "username": "ana", "password": "pw" }));
        then.status(200).json_body(json!({
            "token": "t0k",
            "user": { "id": "u-1", "username": "ana", "is_admin": false, "credits": 5, "plan": "free" }
        }));
    });
    let denied = server.mock(|when, then| {
        when.method(POST)
            .path("/api/login")
            .json_body(json!({ "username": "ana", "password": "wrong" }));
        then.status(400).json_body(json!({ "detail": "Invalid credentials" }));
    });
    let logout = server.mock(|when, then| {
        when.method(POST)
            .path("/api/logout")
            .header("Authorization", "Bearer t0k");
        then.status(200).json_body(json!({ "message": "Logged out" }));
    });

    let backend = backend_for(&server);
    let resp = backend
        .login(&Credentials::new("ana", "pw"))
        .unwrap();
    assert_eq!(resp.token, "t0k");
    assert_eq!(resp.user.credits, 5);

    assert!(matches!(
        backend.login(&Credentials::new("ana", "wrong")),
        Err(StudioError::AuthRequired)
    ));

    backend.logout("t0k").unwrap();
    login.assert();
    denied.assert();
    logout.assert();
}

#[test]
fn test_download_zip_reports_progress() {
    let server = MockServer::start();
    let payload: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
    let zip = server.mock(|when, then| {
        when.method(GET).path("/api/download_zip/p42");
        then.status(200)
            .header("content-type", "application/zip")
            .body(payload.clone());
    });

    let dir = tempdir().unwrap();
    let dest = dir.path().join("stems_p42.zip");
    let mut last = (0u64, 0u64);

    let n = backend_for(&server)
        .download_zip("p42", &dest, &mut |done: u64, total: u64| last = (done, total))
        .unwrap();

    zip.assert();
    assert_eq!(n, payload.len() as u64);
    assert_eq!(last, (n, n));
    assert_eq!(fs::read(&dest).unwrap(), payload);
    assert!(!dest.with_extension("part").exists());
}

#[test]
fn test_download_zip_missing_project() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/api/download_zip/none");
        then.status(404);
    });

    let dir = tempdir().unwrap();
    let dest = dir.path().join("x.zip");
    let err = backend_for(&server)
        .download_zip("none", &dest, &mut |_: u64, _: u64| {})
        .unwrap_err();

    assert!(matches!(err, StudioError::Http { status: 404, .. }));
    assert!(!dest.exists());
}

#[test]
fn test_upload_failure_carries_server_detail() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/api/process_youtube_async");
        then.status(500).json_body(json!({ "detail": "yt-dlp failed" }));
    });
    server.mock(|when, then| {
        when.method(POST).path("/api/process_file_async");
        then.status(502).body("bad gateway");
    });

    let backend = backend_for(&server);
    assert!(matches!(
        backend.submit("tok", &JobSource::Url("https://youtu.be/x".into())),
        Err(StudioError::UploadFailed(detail)) if detail == "yt-dlp failed"
    ));

    let dir = tempdir().unwrap();
    let song = dir.path().join("song.wav");
    fs::write(&song, b"RIFF").unwrap();
    assert!(matches!(
        backend.submit("tok", &JobSource::File(song)),
        Err(StudioError::UploadFailed(detail)) if detail == "server answered HTTP 502"
    ));
}

#[test]
fn test_signup_sends_email_and_reports_taken_names() {
    let server = MockServer::start();
    let created = server.mock(|when, then| {
        when.method(POST)
            .path("/api/signup")
            .json_body(json!({ "username": "bo", "password": "pw", "email": "bo@example.com" }));
        then.status(200)
            .json_body(json!({ "message": "User created", "username": "bo" }));
    });
    server.mock(|when, then| {
        when.method(POST)
            .path("/api/signup")
            .json_body(json!({ "username": "ana", "password": "pw" }));
        then.status(400)
            .json_body(json!({ "detail": "Username already exists" }));
    });

    let backend = backend_for(&server);
    let mut creds = Credentials::new("bo", "pw");
    creds.email = Some("bo@example.com".into());
    backend.signup(&creds).unwrap();
    created.assert();

    assert!(matches!(
        backend.signup(&Credentials::new("ana", "pw")),
        Err(StudioError::SignupRejected(detail)) if detail == "Username already exists"
    ));
}

#[test]
fn test_unknown_user_is_signed_up_then_logged_in() {
    let server = MockServer::start();
    let mut refused = server.mock(|when, then| {
        when.method(POST).path("/api/login");
        then.status(400).json_body(json!({ "detail": "Invalid credentials" }));
    });
    let signup = server.mock(|when, then| {
        when.method(POST).path("/api/signup");
        then.status(200)
            .json_body(json!({ "message": "User created", "username": "new" }));
    });

    let backend = backend_for(&server);
    let creds = Credentials::new("new", "pw");

    // Sign-up succeeds but the server still refuses the login.
    assert!(matches!(
        backend.login_or_signup(&creds),
        Err(StudioError::AuthRequired)
    ));
    refused.assert_hits(2);
    signup.assert_hits(1);
    refused.delete();

    let login = server.mock(|when, then| {
        when.method(POST).path("/api/login");
        then.status(200).json_body(json!({
            "token": "fresh",
            "user": { "id": "u-9", "username": "new", "credits": 3, "plan": "free" }
        }));
    });
    let resp = backend.login_or_signup(&creds).unwrap();
    assert_eq!(resp.token, "fresh");
    assert_eq!(resp.user.credits, 3);
    login.assert_hits(1);
    signup.assert_hits(1);
}

#[test]
fn test_profile_and_credits() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET)
            .path("/api/me")
            .header("Authorization", "Bearer tok");
        then.status(200).json_body(json!({
            "id": "u-1",
            "username": "ana",
            "is_admin": false,
            "credits": 2,
            "plan": "pro",
            "created_at": "2025-01-01 09:00:00",
            "email": ""
        }));
    });
    server.mock(|when, then| {
        when.method(GET)
            .path("/api/me")
            .header("Authorization", "Bearer expired");
        then.status(401).json_body(json!({ "detail": "Invalid token" }));
    });

    let backend = backend_for(&server);
    let me = backend.me("tok").unwrap();
    assert_eq!(me.username, "ana");
    assert_eq!(me.credits, 2);
    assert_eq!(me.plan, "pro");
    assert!(!me.is_admin);

    assert!(matches!(backend.me("expired"), Err(StudioError::AuthRequired)));
}

#[test]
fn test_delete_project() {
    let server = MockServer::start();
    let deleted = server.mock(|when, then| {
        when.method(DELETE)
            .path("/api/projects/p42")
            .header("Authorization", "Bearer tok");
        then.status(200).json_body(json!({ "message": "Deleted" }));
    });
    server.mock(|when, then| {
        when.method(DELETE).path("/api/projects/p404");
        then.status(404).json_body(json!({ "detail": "Project not found" }));
    });
    server.mock(|when, then| {
        when.method(DELETE).path("/api/projects/theirs");
        then.status(403).json_body(json!({ "detail": "Not authorized" }));
    });

    let backend = backend_for(&server);
    backend.delete_project("tok", "p42").unwrap();
    deleted.assert();

    assert!(matches!(
        backend.delete_project("tok", "p404"),
        Err(StudioError::Http { status: 404, .. })
    ));
    assert!(matches!(
        backend.delete_project("tok", "theirs"),
        Err(StudioError::Http { status: 403, .. })
    ));
}
