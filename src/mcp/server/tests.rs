use super::*;
use crate::store::Store;
use crate::types::ProfileUpdate;
use chrono::{Duration, TimeZone, Utc};
use tempfile::TempDir;

fn test_config(dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.user.id = "me".to_string();
    config.store.db_path = dir.path().join("trainmap.db").display().to_string();
    config.display.timezone = "UTC".to_string();
    config
}

fn seed(config: &Config) {
    let store = Store::open(&config.db_path().expect("db path")).expect("store");
    let me = UserId::new("me");
    for (day, minutes) in [(3, 25), (3, 50), (10, 130)] {
        let start = Utc.with_ymd_and_hms(2025, 3, day, 8, 0, 0).unwrap();
        let id = store.start_training_at(&me, start).expect("start");
        store
            .finish_training_at(&me, &id, start + Duration::minutes(minutes))
            .expect("finish");
    }

    let ann = UserId::new("ann");
    store
        .upsert_profile(
            &ann,
            ProfileUpdate {
                name: Some("Ann".into()),
                place: Some("Kyoto".into()),
                ..ProfileUpdate::default()
            },
        )
        .expect("profile");
    store.follow(&me, &ann).expect("follow");
    store.follow(&me, &UserId::new("ghost")).expect("follow");
}

fn server() -> (TempDir, TrainmapMcpServer) {
    let dir = TempDir::new().expect("tempdir");
    let config = test_config(&dir);
    seed(&config);
    (dir, TrainmapMcpServer::with_config(config))
}

#[tokio::test]
async fn get_month_grid_returns_requested_month() {
    let (_dir, server) = server();
    let Json(response) = server
        .get_month_grid(Parameters(GetMonthGridRequest {
            month: Some("2025-03".into()),
            user: None,
        }))
        .await
        .expect("grid");

    assert_eq!(response.user, "me");
    assert_eq!(response.month, "2025-03");
    assert_eq!(response.total_minutes, 205);
    assert_eq!(response.active_days, 2);

    let cells: Vec<_> = response.weeks.iter().flatten().collect();
    assert_eq!(cells.len(), 42);
    let march_3 = cells.iter().find(|c| c.date == "2025-03-03").expect("cell");
    assert_eq!(march_3.minutes, 75);
    assert_eq!(march_3.intensity, "MEDIUM");
}

#[tokio::test]
async fn get_month_grid_rejects_bad_month() {
    let (_dir, server) = server();
    let result = server
        .get_month_grid(Parameters(GetMonthGridRequest {
            month: Some("2025-13".into()),
            user: None,
        }))
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn get_month_grid_for_other_user_is_empty() {
    let (_dir, server) = server();
    let Json(response) = server
        .get_month_grid(Parameters(GetMonthGridRequest {
            month: Some("2025-03".into()),
            user: Some("ann".into()),
        }))
        .await
        .expect("grid");
    assert_eq!(response.user, "ann");
    assert_eq!(response.total_minutes, 0);
    assert!(
        response
            .weeks
            .iter()
            .flatten()
            .all(|c| c.intensity == "NONE")
    );
}

#[tokio::test]
async fn get_daily_minutes_filters_and_limits() {
    let (_dir, server) = server();

    let Json(all) = server
        .get_daily_minutes(Parameters(GetDailyMinutesRequest::default()))
        .await
        .expect("daily");
    let dates: Vec<_> = all.results.iter().map(|r| r.date.as_str()).collect();
    assert_eq!(dates, vec!["2025-03-10", "2025-03-03"]);
    assert_eq!(all.results[0].intensity, "FULL");
    assert_eq!(all.total_minutes, 205);

    let Json(limited) = server
        .get_daily_minutes(Parameters(GetDailyMinutesRequest {
            limit: Some(1),
            ..GetDailyMinutesRequest::default()
        }))
        .await
        .expect("daily");
    assert_eq!(limited.results.len(), 1);
    assert_eq!(limited.total_minutes, 130);

    let Json(ranged) = server
        .get_daily_minutes(Parameters(GetDailyMinutesRequest {
            end_date: Some("2025-03-05".into()),
            ..GetDailyMinutesRequest::default()
        }))
        .await
        .expect("daily");
    assert_eq!(ranged.results.len(), 1);
    assert_eq!(ranged.results[0].minutes, 75);

    let err = server
        .get_daily_minutes(Parameters(GetDailyMinutesRequest {
            start_date: Some("March".into()),
            ..GetDailyMinutesRequest::default()
        }))
        .await
        .err()
        .expect("bad start_date should be rejected");
    assert!(err.contains("start_date"), "{err}");
}

#[tokio::test]
async fn start_then_finish_training() {
    let (_dir, server) = server();

    let Json(started) = server
        .start_training(Parameters(StartTrainingRequest {}))
        .await
        .expect("start");
    assert_eq!(started.session_id.len(), 20);

    let Json(finished) = server
        .finish_training(Parameters(FinishTrainingRequest::default()))
        .await
        .expect("finish");
    assert_eq!(finished.session_id, started.session_id);
    assert_eq!(finished.duration_minutes, 0);

    let err = server
        .finish_training(Parameters(FinishTrainingRequest::default()))
        .await
        .err()
        .expect("second finish should fail");
    assert!(err.contains("No training in progress"), "{err}");
}

#[tokio::test]
async fn finish_unknown_session_fails() {
    let (_dir, server) = server();
    let err = server
        .finish_training(Parameters(FinishTrainingRequest {
            session_id: Some("nope".into()),
        }))
        .await
        .err()
        .expect("unknown session should fail");
    assert!(err.contains("not found"), "{err}");
}

#[tokio::test]
async fn list_following_skips_missing_profiles() {
    let (_dir, server) = server();
    let Json(response) = server
        .list_following(Parameters(ListFollowingRequest {}))
        .await
        .expect("following");

    assert_eq!(response.users.len(), 1);
    assert_eq!(response.users[0].user_id, "ann");
    assert_eq!(response.users[0].name, "Ann");
    assert_eq!(response.users[0].place, "Kyoto");
    assert_eq!(response.users[0].profile_color, "PINK");
}

#[test]
fn today_summary_reports_zero_for_an_idle_day() {
    let dir = TempDir::new().expect("tempdir");
    let server = TrainmapMcpServer::with_config(test_config(&dir));
    let summary = server.today_summary().expect("summary");
    assert!(summary.contains("User: me"));
    assert!(summary.contains("Trained: 0m"));
    assert!(summary.contains("Intensity: NONE"));
    assert!(!summary.contains("In progress"));
}

#[test]
fn today_summary_mentions_active_session() {
    let dir = TempDir::new().expect("tempdir");
    let config = test_config(&dir);
    let store = Store::open(&config.db_path().expect("db path")).expect("store");
    store.start_training(&UserId::new("me")).expect("start");
    drop(store);

    let summary = TrainmapMcpServer::with_config(config)
        .today_summary()
        .expect("summary");
    assert!(summary.contains("In progress since"));
}
